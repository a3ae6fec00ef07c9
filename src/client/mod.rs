// BIG-IP / BIG-IQ management API client
//
// Wraps `reqwest::Client` with base-URL handling, status checking and JSON
// decoding. Endpoint families (FAST, AS3, DO, LTM, files, vCMP, BIG-IQ
// licensing) are inherent methods
// defined in sibling files so this module stays about transport mechanics.

/// AS3 declarations and tasks.
pub mod as3;
/// Login and session handling.
pub mod auth;
/// BIG-IQ license pools.
pub mod bigiq;
/// FAST applications, tasks and template sets.
pub mod fast;
/// File uploads and iFiles.
pub mod files;
/// LTM pools.
pub mod ltm;
/// Declarative Onboarding.
pub mod onboarding;
/// TLS and timeout settings of the HTTP clients.
pub mod transport;
/// vCMP guests.
pub mod vcmp;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::ProviderError;
use auth::{Credentials, Session};
use transport::TransportConfig;

/// A raw device answer: HTTP status plus body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// Body text, possibly empty.
    pub body: String,
}

impl ApiResponse {
    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body. An empty body decodes as `null`.
    pub fn value(&self) -> Result<Value, ProviderError> {
        if self.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&self.body)?)
    }

    /// Decode the body into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ProviderError> {
        Ok(serde_json::from_str(&self.body)?)
    }

    /// Turn a non-success answer into an error.
    pub fn error_for_status(self) -> Result<Self, ProviderError> {
        match self.status {
            401 => Err(ProviderError::Authentication(format!(
                "device rejected the session (HTTP 401): {}",
                self.body.chars().take(256).collect::<String>()
            ))),
            _ if self.is_success() => Ok(self),
            status => Err(ProviderError::api(status, &self.body)),
        }
    }
}

/// HTTP client for one management endpoint (a BIG-IP or a BIG-IQ).
#[derive(Debug, Clone)]
pub struct BigIpClient {
    http: reqwest::Client,
    base_url: Url,
    session: Session,
}

impl BigIpClient {
    /// Log in to the device at `base_url` and return a ready client.
    pub async fn connect(
        base_url: Url,
        transport: &TransportConfig,
        credentials: &Credentials,
    ) -> Result<Self, ProviderError> {
        let http = transport.build_client()?;
        let session = Session::establish(&http, &base_url, credentials).await?;
        Ok(Self {
            http,
            base_url,
            session,
        })
    }

    /// Create a client around a pre-built `reqwest::Client` and session.
    pub fn with_client(http: reqwest::Client, base_url: Url, session: Session) -> Self {
        Self {
            http,
            base_url,
            session,
        }
    }

    /// The device base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Key identifying the device for locking.
    pub fn device_key(&self) -> String {
        self.base_url.as_str().trim_end_matches('/').to_string()
    }

    /// Build a full URL from an absolute API path (query allowed).
    pub(crate) fn url(&self, path: &str) -> Result<Url, ProviderError> {
        Ok(self.base_url.join(path)?)
    }

    /// Send a request and return the raw answer whatever its status.
    pub(crate) async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<ApiResponse, ProviderError> {
        let url = self.url(path)?;
        debug!("{} {}", method, url);

        let mut request = self.session.apply(self.http.request(method, url));
        if let Some(body) = body {
            request = request.json(body);
        }
        let resp = request.send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        debug!(status, bytes = body.len(), "response");
        Ok(ApiResponse { status, body })
    }

    /// POST one chunk of raw bytes (file transfer). `content_range` is the
    /// `start-end/total` byte range of the chunk.
    pub(crate) async fn send_chunk(
        &self,
        path: &str,
        chunk: Vec<u8>,
        content_range: &str,
    ) -> Result<ApiResponse, ProviderError> {
        let url = self.url(path)?;
        debug!(%url, content_range, "upload chunk");

        let resp = self
            .session
            .apply(self.http.post(url))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .header(reqwest::header::CONTENT_RANGE, content_range)
            .body(chunk)
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        ApiResponse { status, body }.error_for_status()
    }

    /// GET and require success.
    pub(crate) async fn get(&self, path: &str) -> Result<ApiResponse, ProviderError> {
        self.send(Method::GET, path, None).await?.error_for_status()
    }

    /// POST a JSON body and require success.
    pub(crate) async fn post(&self, path: &str, body: &Value) -> Result<ApiResponse, ProviderError> {
        self.send(Method::POST, path, Some(body))
            .await?
            .error_for_status()
    }

    /// PATCH a JSON body and require success.
    pub(crate) async fn patch(&self, path: &str, body: &Value) -> Result<ApiResponse, ProviderError> {
        self.send(Method::PATCH, path, Some(body))
            .await?
            .error_for_status()
    }

    /// DELETE and require success.
    pub(crate) async fn delete(&self, path: &str) -> Result<ApiResponse, ProviderError> {
        self.send(Method::DELETE, path, None)
            .await?
            .error_for_status()
    }
}

/// Read the task ID out of a submission answer: `message[0].id` (FAST) or a
/// top-level `id` (AS3, DO).
pub(crate) fn task_id_from(body: &Value) -> Option<String> {
    body.pointer("/message/0/id")
        .or_else(|| body.get("id"))
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}
