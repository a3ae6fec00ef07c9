// Declarative Onboarding endpoints

use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use super::{task_id_from, BigIpClient};
use crate::error::ProviderError;
use crate::poller::TaskStatus;

/// DO declare endpoint.
pub const DO_DECLARE: &str = "/mgmt/shared/declarative-onboarding";
/// DO task endpoint.
pub const DO_TASK: &str = "/mgmt/shared/declarative-onboarding/task";

impl BigIpClient {
    /// Submit a DO declaration. Returns the DO task ID.
    pub async fn do_post(&self, declaration: &Value) -> Result<String, ProviderError> {
        let resp = self.post(DO_DECLARE, declaration).await?;
        let body = resp.value()?;
        task_id_from(&body)
            .ok_or_else(|| ProviderError::Internal(format!("DO answer carried no task id: {body}")))
    }

    /// Observe a DO task: 202 is pending, 200 is done, anything else failed.
    pub async fn do_task(&self, task_id: &str) -> Result<TaskStatus, ProviderError> {
        let resp = self
            .send(Method::GET, &format!("{DO_TASK}/{task_id}"), None)
            .await?;
        let resp = if resp.status == 401 {
            resp.error_for_status()?
        } else {
            resp
        };
        let body = match resp.value() {
            Ok(body) => body,
            // A failing task may answer with a non-JSON error page; its
            // status alone classifies it.
            Err(e) if !matches!(resp.status, 200 | 202) => {
                debug!(task_id, status = resp.status, error = %e, "DO task body is not JSON");
                Value::Null
            }
            Err(e) => return Err(e),
        };
        Ok(match TaskStatus::from_status(resp.status, body.clone()) {
            TaskStatus::Failed(status_message) => TaskStatus::Failed(
                body.pointer("/result/message")
                    .and_then(Value::as_str)
                    .map_or(status_message, str::to_string),
            ),
            status => status,
        })
    }

    /// Fetch the task document of a finished DO run (declaration included).
    pub async fn do_task_document(&self, task_id: &str) -> Result<Value, ProviderError> {
        let resp = self.get(&format!("{DO_TASK}/{task_id}")).await?;
        resp.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::auth::Session;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn device(status: u16, body: &str) -> (MockServer, BigIpClient) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{DO_TASK}/t1")))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&server)
            .await;
        let client = BigIpClient::with_client(
            reqwest::Client::new(),
            Url::parse(&server.uri()).unwrap(),
            Session::token("t0ken"),
        );
        (server, client)
    }

    #[tokio::test]
    async fn test_task_failure_message() {
        let (_server, client) =
            device(422, r#"{"result": {"code": 422, "message": "invalid config"}}"#).await;
        assert_eq!(
            client.do_task("t1").await.unwrap(),
            TaskStatus::Failed("invalid config".into())
        );
    }

    #[tokio::test]
    async fn test_failed_task_with_html_body() {
        let (_server, client) = device(500, "<html>Internal Server Error</html>").await;
        assert!(matches!(
            client.do_task("t1").await.unwrap(),
            TaskStatus::Failed(_)
        ));
    }

    #[tokio::test]
    async fn test_undecodable_success_body_is_an_error() {
        let (_server, client) = device(200, "{not json").await;
        let err = client.do_task("t1").await.unwrap_err();
        assert!(matches!(err, ProviderError::Serialization(_)), "{err:?}");
    }
}
