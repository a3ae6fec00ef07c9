// vCMP guest endpoints (run against the vCMP host)

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::BigIpClient;
use crate::error::ProviderError;
use crate::poller::TaskStatus;

/// Guest collection.
pub const VCMP_GUEST: &str = "/mgmt/tm/vcmp/guest";
/// Virtual disk collection.
pub const VCMP_VIRTUAL_DISK: &str = "/mgmt/tm/vcmp/virtual-disk";

/// Guest states, in the order a guest moves through them.
pub const GUEST_STATES: &[&str] = &["configured", "provisioned", "deployed"];

/// A vCMP guest as iControl REST represents it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VcmpGuest {
    /// Guest name.
    pub name: String,
    /// As read back.
    #[serde(default, skip_serializing)]
    pub full_path: Option<String>,
    /// Image installed on first boot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_image: Option<String>,
    /// Hotfix installed on first boot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_hotfix: Option<String>,
    /// VLANs the guest is attached to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vlans: Vec<String>,
    /// `bridged`, `isolated` or `host-only`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub management_network: Option<String>,
    /// Management address in CIDR form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub management_ip: Option<String>,
    /// Management gateway.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub management_gw: Option<String>,
    /// Disk image, assigned by the host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_disk: Option<String>,
    /// Fewest slots the guest runs on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_slots: Option<i64>,
    /// Slots requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slots: Option<i64>,
    /// Cores on each slot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cores_per_slot: Option<i64>,
    /// Slots the guest may use.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_slots: Vec<i64>,
    /// One of `GUEST_STATES`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

fn guest_path(name: &str) -> String {
    format!("{VCMP_GUEST}/{name}")
}

impl BigIpClient {
    /// Create a guest.
    pub async fn vcmp_guest_create(&self, guest: &VcmpGuest) -> Result<(), ProviderError> {
        self.post(VCMP_GUEST, &serde_json::to_value(guest)?).await?;
        Ok(())
    }

    /// Fetch a guest by name.
    pub async fn vcmp_guest(&self, name: &str) -> Result<VcmpGuest, ProviderError> {
        self.get(&guest_path(name)).await?.json()
    }

    /// Modify a guest in place.
    pub async fn vcmp_guest_modify(&self, guest: &VcmpGuest) -> Result<(), ProviderError> {
        let mut body = serde_json::to_value(guest)?;
        if let Some(map) = body.as_object_mut() {
            map.remove("name");
        }
        self.patch(&guest_path(&guest.name), &body).await?;
        Ok(())
    }

    /// Move a guest to `state`.
    pub async fn vcmp_guest_set_state(&self, name: &str, state: &str) -> Result<(), ProviderError> {
        self.patch(&guest_path(name), &json!({ "state": state }))
            .await?;
        Ok(())
    }

    /// Delete a guest. It must be in the `configured` state.
    pub async fn vcmp_guest_delete(&self, name: &str) -> Result<(), ProviderError> {
        self.delete(&guest_path(name)).await?;
        Ok(())
    }

    /// Try to delete a virtual disk. A disk the host still holds after its
    /// guest went away answers 400 and is reported as pending.
    pub async fn vcmp_virtual_disk_delete(&self, disk: &str) -> Result<TaskStatus, ProviderError> {
        let resp = self
            .send(reqwest::Method::DELETE, &format!("{VCMP_VIRTUAL_DISK}/{disk}"), None)
            .await?;
        match resp.status {
            400 => Ok(TaskStatus::Pending),
            _ => {
                resp.error_for_status()?;
                Ok(TaskStatus::Done(serde_json::Value::Null))
            }
        }
    }
}
