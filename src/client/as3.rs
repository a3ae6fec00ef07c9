// AS3 endpoints
//
// Declarations are posted asynchronously (`?async=true`) and tracked through
// `/mgmt/shared/appsvcs/task/{id}`. The same endpoints serve BIG-IQ, which
// forwards the declaration to the BIG-IP named in its `target`.

use reqwest::Method;
use serde_json::Value;

use super::{task_id_from, BigIpClient};
use crate::error::ProviderError;
use crate::poller::TaskStatus;

/// AS3 declare endpoint.
pub const AS3_DECLARE: &str = "/mgmt/shared/appsvcs/declare";
/// AS3 task endpoint.
pub const AS3_TASK: &str = "/mgmt/shared/appsvcs/task";

impl BigIpClient {
    /// Submit a full declaration. Returns the AS3 task ID.
    pub async fn as3_post(&self, declaration: &Value) -> Result<String, ProviderError> {
        let resp = self
            .post(&format!("{AS3_DECLARE}?async=true"), declaration)
            .await?;
        require_task_id(&resp.value()?)
    }

    /// Submit a declaration but apply only the comma-separated `tenants`.
    pub async fn as3_post_tenants(
        &self,
        tenants: &str,
        declaration: &Value,
    ) -> Result<String, ProviderError> {
        let resp = self
            .post(&format!("{AS3_DECLARE}/{tenants}?async=true"), declaration)
            .await?;
        require_task_id(&resp.value()?)
    }

    /// Submit applications into one tenant without touching its other
    /// applications. Returns the AS3 task ID.
    pub async fn as3_post_applications(
        &self,
        tenant: &str,
        declaration: &Value,
    ) -> Result<String, ProviderError> {
        let resp = self
            .post(
                &format!("{AS3_DECLARE}/{tenant}/applications?async=true"),
                declaration,
            )
            .await?;
        require_task_id(&resp.value()?)
    }

    /// Fetch the declaration of the given comma-separated tenants.
    ///
    /// A 204 answer or an empty body (nothing declared) is reported as not
    /// found.
    pub async fn as3_get(&self, tenants: &str) -> Result<Value, ProviderError> {
        let resp = self.get(&format!("{AS3_DECLARE}/{tenants}")).await?;
        let document = if resp.status == 204 {
            Value::Null
        } else {
            resp.value()?
        };
        if document.is_null() {
            return Err(ProviderError::NotFound(format!("AS3 tenants {tenants}")));
        }
        Ok(document)
    }

    /// Fetch every declaration known to the device (BIG-IQ lists one per
    /// target).
    pub async fn as3_get_all(&self) -> Result<Value, ProviderError> {
        let resp = self.get(AS3_DECLARE).await?;
        if resp.status == 204 {
            return Ok(Value::Null);
        }
        resp.value()
    }

    /// Delete the given comma-separated tenants. Returns a task ID when the
    /// device processes the deletion asynchronously.
    pub async fn as3_delete_tenants(&self, tenants: &str) -> Result<Option<String>, ProviderError> {
        let resp = self.delete(&format!("{AS3_DECLARE}/{tenants}")).await?;
        deletion_task(resp.status, &resp.value()?)
    }

    /// Delete one application of a tenant.
    pub async fn as3_delete_application(
        &self,
        tenant: &str,
        application: &str,
    ) -> Result<Option<String>, ProviderError> {
        let resp = self
            .delete(&format!("{AS3_DECLARE}/{tenant}/applications/{application}"))
            .await?;
        deletion_task(resp.status, &resp.value()?)
    }

    /// Observe an AS3 task.
    pub async fn as3_task(&self, task_id: &str) -> Result<TaskStatus, ProviderError> {
        let resp = self
            .send(Method::GET, &format!("{AS3_TASK}/{task_id}"), None)
            .await?;
        if resp.status == 202 {
            return Ok(TaskStatus::Pending);
        }
        let resp = resp.error_for_status()?;
        Ok(classify_as3_task(resp.value()?))
    }
}

fn require_task_id(body: &Value) -> Result<String, ProviderError> {
    task_id_from(body)
        .ok_or_else(|| ProviderError::Internal(format!("AS3 answer carried no task id: {body}")))
}

fn deletion_task(status: u16, body: &Value) -> Result<Option<String>, ProviderError> {
    if status == 202 {
        return Ok(task_id_from(body));
    }
    match classify_as3_task(body.clone()) {
        TaskStatus::Failed(message) => Err(ProviderError::TaskFailed {
            task_id: task_id_from(body).unwrap_or_default(),
            message,
        }),
        _ => Ok(None),
    }
}

/// Classify an AS3 task document by its `results`.
///
/// Any result still `in progress`/`pending` keeps the task pending; every
/// result `success` or `no change` completes it; otherwise the first
/// failing result's message is reported.
pub fn classify_as3_task(task: Value) -> TaskStatus {
    let Some(results) = task.get("results").and_then(Value::as_array) else {
        return TaskStatus::Pending;
    };
    if results.is_empty() {
        return TaskStatus::Pending;
    }

    let message_of = |result: &Value| {
        result
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    if results.iter().any(|r| {
        matches!(
            message_of(r).to_ascii_lowercase().as_str(),
            "in progress" | "pending"
        )
    }) {
        return TaskStatus::Pending;
    }

    let failure = results.iter().find(|r| {
        let message = message_of(r).to_ascii_lowercase();
        let code = r.get("code").and_then(Value::as_u64).unwrap_or(200);
        !(message == "success" || message == "no change") || code >= 400
    });

    match failure {
        None => TaskStatus::Done(task),
        Some(result) => {
            let tenant = result
                .get("tenant")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let mut message = message_of(result);
            if let Some(errors) = result.get("errors").and_then(Value::as_array) {
                let joined: Vec<String> = errors
                    .iter()
                    .map(|e| e.as_str().map_or_else(|| e.to_string(), str::to_string))
                    .collect();
                if !joined.is_empty() {
                    message = format!("{message}: {}", joined.join("; "));
                }
            }
            if !tenant.is_empty() {
                message = format!("tenant {tenant}: {message}");
            }
            TaskStatus::Failed(message)
        }
    }
}
