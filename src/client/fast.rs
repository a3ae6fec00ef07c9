// FAST endpoints
//
// Applications are rendered from templates by the FAST service; every
// mutation returns a task that must be polled at `/mgmt/shared/fast/tasks`.

use reqwest::Method;
use serde_json::{json, Value};

use super::{task_id_from, BigIpClient};
use crate::error::ProviderError;
use crate::poller::TaskStatus;

/// FAST applications endpoint.
pub const FAST_APPLICATIONS: &str = "/mgmt/shared/fast/applications";
/// FAST task endpoint.
pub const FAST_TASKS: &str = "/mgmt/shared/fast/tasks";
/// Installed template sets.
pub const FAST_TEMPLATESETS: &str = "/mgmt/shared/fast/templatesets";

fn application_path(tenant: &str, application: &str) -> String {
    format!("{FAST_APPLICATIONS}/{tenant}/{application}")
}

impl BigIpClient {
    /// Render `template` with `parameters`. Returns the FAST task ID.
    pub async fn fast_create(
        &self,
        template: &str,
        parameters: &Value,
    ) -> Result<String, ProviderError> {
        let body = json!({ "name": template, "parameters": parameters });
        let resp = self.post(FAST_APPLICATIONS, &body).await?;
        require_task_id(&resp.value()?)
    }

    /// Fetch a deployed application. An empty answer means the
    /// application is gone.
    pub async fn fast_application(
        &self,
        tenant: &str,
        application: &str,
    ) -> Result<Value, ProviderError> {
        let resp = self.get(&application_path(tenant, application)).await?;
        match resp.value()? {
            Value::Null => Err(ProviderError::NotFound(format!(
                "FAST application {tenant}/{application}"
            ))),
            document => Ok(document),
        }
    }

    /// Re-render an application with new parameters. Returns the task ID.
    pub async fn fast_update(
        &self,
        tenant: &str,
        application: &str,
        parameters: &Value,
    ) -> Result<String, ProviderError> {
        let body = json!({ "parameters": parameters });
        let resp = self
            .patch(&application_path(tenant, application), &body)
            .await?;
        require_task_id(&resp.value()?)
    }

    /// Remove an application. Returns the task ID when the device reports
    /// one.
    pub async fn fast_delete(
        &self,
        tenant: &str,
        application: &str,
    ) -> Result<Option<String>, ProviderError> {
        let resp = self.delete(&application_path(tenant, application)).await?;
        Ok(task_id_from(&resp.value()?))
    }

    /// Install a template set from `{name}.zip`, previously uploaded
    /// through the file-transfer worker.
    pub async fn fast_templateset_install(&self, name: &str) -> Result<(), ProviderError> {
        self.post(FAST_TEMPLATESETS, &json!({ "name": name })).await?;
        Ok(())
    }

    /// Fetch an installed template set.
    pub async fn fast_templateset(&self, name: &str) -> Result<Value, ProviderError> {
        let resp = self.get(&format!("{FAST_TEMPLATESETS}/{name}")).await?;
        match resp.value()? {
            Value::Null => Err(ProviderError::NotFound(format!("FAST template set {name}"))),
            document => Ok(document),
        }
    }

    /// Remove an installed template set.
    pub async fn fast_templateset_delete(&self, name: &str) -> Result<(), ProviderError> {
        self.delete(&format!("{FAST_TEMPLATESETS}/{name}")).await?;
        Ok(())
    }

    /// Observe a FAST task.
    pub async fn fast_task(&self, task_id: &str) -> Result<TaskStatus, ProviderError> {
        let resp = self
            .send(Method::GET, &format!("{FAST_TASKS}/{task_id}"), None)
            .await?;
        if resp.status == 202 {
            return Ok(TaskStatus::Pending);
        }
        let resp = resp.error_for_status()?;
        Ok(classify_fast_task(resp.value()?))
    }
}

fn require_task_id(body: &Value) -> Result<String, ProviderError> {
    task_id_from(body).ok_or_else(|| {
        ProviderError::Internal(format!("FAST answer carried no task id: {body}"))
    })
}

/// Classify a FAST task document by its `message` and `code`.
pub fn classify_fast_task(task: Value) -> TaskStatus {
    let message = task
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let code = task.get("code").and_then(Value::as_u64).unwrap_or(0);

    match message.to_ascii_lowercase().as_str() {
        "success" | "no change" => TaskStatus::Done(task),
        "" | "in progress" | "pending" if code < 400 => TaskStatus::Pending,
        _ => TaskStatus::Failed(if message.is_empty() {
            format!("FAST task ended with code {code}")
        } else {
            message
        }),
    }
}
