// BIG-IQ license pool endpoints
//
// Assigning and revoking are both tasks posted to the pool member-management
// worker; the assignment list is what a read consults.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::BigIpClient;
use crate::error::ProviderError;
use crate::poller::TaskStatus;

/// Assign and revoke tasks.
pub const LICENSE_MEMBER_MANAGEMENT: &str =
    "/mgmt/cm/device/tasks/licensing/pool/member-management";
/// Current assignments.
pub const LICENSE_ASSIGNMENTS: &str = "/mgmt/cm/device/licensing/assignments";

/// How BIG-IQ reaches the device it licenses.
pub const ASSIGNMENT_TYPES: &[&str] = &["MANAGED", "UNMANAGED", "UNREACHABLE"];

/// Body of an assign or revoke request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseRequest {
    /// `assign` or `revoke`.
    pub command: String,
    /// Pool the license comes from.
    pub license_pool_name: String,
    /// One of `ASSIGNMENT_TYPES`.
    pub assignment_type: String,
    /// Device management address.
    pub address: String,
    /// Device management port.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Device user, for reachable devices.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Device password, for reachable devices.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Device MAC, for unreachable devices.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    /// Device hypervisor, for unreachable devices.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hypervisor: Option<String>,
    /// Offering filter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku_keyword1: Option<String>,
    /// Offering filter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku_keyword2: Option<String>,
    /// Billing unit of utility pools.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measure: Option<String>,
    /// Free text recorded with the assignment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
}

/// One entry of the BIG-IQ assignment list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LicenseAssignment {
    /// Assignment ID.
    pub id: String,
    /// Licensed device.
    pub device_address: String,
    /// Device MAC, when known.
    pub mac_address: Option<String>,
    /// Device hostname, when known.
    pub device_name: Option<String>,
    /// e.g. `LICENSED`.
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AssignmentList {
    items: Vec<LicenseAssignment>,
}

impl BigIpClient {
    /// Post an assign or revoke request. Returns the BIG-IQ task ID.
    pub async fn license_request(&self, request: &LicenseRequest) -> Result<String, ProviderError> {
        let resp = self
            .post(LICENSE_MEMBER_MANAGEMENT, &serde_json::to_value(request)?)
            .await?;
        let body = resp.value()?;
        body.get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                ProviderError::Internal(format!("BIG-IQ license answer carried no task id: {body}"))
            })
    }

    /// Observe a license task.
    pub async fn license_task(&self, task_id: &str) -> Result<TaskStatus, ProviderError> {
        let resp = self
            .get(&format!("{LICENSE_MEMBER_MANAGEMENT}/{task_id}"))
            .await?;
        Ok(classify_license_task(resp.value()?))
    }

    /// Every license assignment the BIG-IQ knows about.
    pub async fn license_assignments(&self) -> Result<Vec<LicenseAssignment>, ProviderError> {
        let list: AssignmentList = self.get(LICENSE_ASSIGNMENTS).await?.json()?;
        Ok(list.items)
    }
}

/// `FINISHED` is done, `FAILED` carries `errorMessage`, anything else is
/// still running.
pub fn classify_license_task(task: Value) -> TaskStatus {
    match task.get("status").and_then(Value::as_str) {
        Some("FINISHED") => TaskStatus::Done(task),
        Some("FAILED") => TaskStatus::Failed(
            task.get("errorMessage")
                .and_then(Value::as_str)
                .unwrap_or("license task failed")
                .to_string(),
        ),
        _ => TaskStatus::Pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_license_task() {
        assert_eq!(
            classify_license_task(json!({"status": "STARTED"})),
            TaskStatus::Pending
        );
        assert!(matches!(
            classify_license_task(json!({"status": "FINISHED", "id": "t"})),
            TaskStatus::Done(_)
        ));
        assert_eq!(
            classify_license_task(json!({"status": "FAILED", "errorMessage": "pool exhausted"})),
            TaskStatus::Failed("pool exhausted".into())
        );
    }

    #[test]
    fn test_request_wire_shape() {
        let request = LicenseRequest {
            command: "assign".into(),
            license_pool_name: "regkeypool".into(),
            assignment_type: "UNREACHABLE".into(),
            address: "10.1.1.4".into(),
            port: Some(443),
            mac_address: Some("FA:16:3E:1B:6D:32".into()),
            hypervisor: Some("vmware".into()),
            ..LicenseRequest::default()
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "command": "assign",
                "licensePoolName": "regkeypool",
                "assignmentType": "UNREACHABLE",
                "address": "10.1.1.4",
                "port": 443,
                "macAddress": "FA:16:3E:1B:6D:32",
                "hypervisor": "vmware"
            })
        );
    }
}
