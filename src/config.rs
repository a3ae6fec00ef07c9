//! Provider configuration.
//!
//! Values come from three layers, later layers winning:
//!
//! 1. built-in defaults,
//! 2. environment variables (`BIGIP_*`, `TEEM_*`, `BIGIQ_*`),
//! 3. the provider block written by the user (null attributes ignored).

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Serialized},
    Figment,
};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use url::Url;

use crate::client::auth::Credentials;
use crate::client::transport::{TlsMode, TransportConfig};
use crate::error::ProviderError;
use crate::poller::PollConfig;
use crate::schema::{Attribute, Diagnostic, Schema};

/// Environment variables read without the `BIGIP_` prefix.
const UNPREFIXED_ENV: &[&str] = &[
    "TEEM_DISABLE",
    "TEEM_API_KEY",
    "BIGIQ_TOKEN_AUTH",
    "BIGIQ_LOGIN_REF",
];

/// Connection and behaviour settings for one provider instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Device management address, with or without scheme and port.
    #[serde(default, deserialize_with = "lenient_string")]
    pub address: Option<String>,

    /// Management user.
    #[serde(default, deserialize_with = "lenient_string")]
    pub username: Option<String>,

    /// Management password. Converted to a secret once a session is built.
    #[serde(default, deserialize_with = "lenient_string")]
    pub password: Option<String>,

    /// Management port, used when `address` carries none.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log in for an `X-F5-Auth-Token` instead of sending basic auth.
    #[serde(default = "default_true")]
    pub token_auth: bool,

    /// Login provider name (`tmos`, or a remote auth provider).
    #[serde(default = "default_login_ref")]
    pub login_ref: String,

    /// Accept any TLS certificate presented by the device.
    #[serde(default = "default_true")]
    pub validate_certs_disable: bool,

    /// PEM bundle trusted when certificate validation is on.
    #[serde(default)]
    pub trusted_cert_path: Option<PathBuf>,

    /// Per-request timeout, seconds.
    #[serde(default = "default_api_timeout")]
    pub api_timeout: u64,

    /// Upper bound for one asynchronous device task, seconds.
    #[serde(default = "default_task_timeout")]
    pub task_timeout: u64,

    /// Upper bound for waiting on the per-device lock, seconds.
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout: u64,

    /// First pause between task polls, seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,

    /// Longest pause between task polls, seconds.
    #[serde(default = "default_poll_max_interval")]
    pub poll_max_interval: u64,

    /// Telemetry opt-out.
    #[serde(default)]
    pub teem_disable: bool,

    /// Telemetry key.
    #[serde(default, deserialize_with = "lenient_string")]
    pub teem_api_key: Option<String>,

    /// Default for `bigiq_token_auth` on BIG-IQ resources.
    #[serde(default = "default_true")]
    pub bigiq_token_auth: bool,

    /// Default for `bigiq_login_ref` on BIG-IQ resources.
    #[serde(default = "default_bigiq_login_ref")]
    pub bigiq_login_ref: String,
}

fn default_port() -> u16 {
    443
}
fn default_true() -> bool {
    true
}
fn default_login_ref() -> String {
    "tmos".into()
}
fn default_bigiq_login_ref() -> String {
    "local".into()
}
fn default_api_timeout() -> u64 {
    60
}
fn default_task_timeout() -> u64 {
    1200
}
fn default_lock_timeout() -> u64 {
    600
}
fn default_poll_interval() -> u64 {
    1
}
fn default_poll_max_interval() -> u64 {
    10
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            address: None,
            username: None,
            password: None,
            port: default_port(),
            token_auth: true,
            login_ref: default_login_ref(),
            validate_certs_disable: true,
            trusted_cert_path: None,
            api_timeout: default_api_timeout(),
            task_timeout: default_task_timeout(),
            lock_timeout: default_lock_timeout(),
            poll_interval: default_poll_interval(),
            poll_max_interval: default_poll_max_interval(),
            teem_disable: false,
            teem_api_key: None,
            bigiq_token_auth: true,
            bigiq_login_ref: default_bigiq_login_ref(),
        }
    }
}

/// Environment variables may hold digits where a string is expected
/// (`BIGIP_PASSWORD=1234`); accept any scalar.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    })
}

impl ProviderConfig {
    /// The figment with every layer merged, for callers that need to add
    /// their own providers.
    pub fn figment(user: &Value) -> Figment {
        let env = Env::prefixed("BIGIP_").map(|key| {
            match key.as_str().to_ascii_lowercase().as_str() {
                "host" => "address".into(),
                "user" => "username".into(),
                "verify_cert_disable" => "validate_certs_disable".into(),
                "trusted_cert" => "trusted_cert_path".into(),
                other => other.to_string().into(),
            }
        });

        Figment::new()
            .merge(Serialized::defaults(ProviderConfig::default()))
            .merge(env)
            .merge(Env::raw().only(UNPREFIXED_ENV))
            .merge(Serialized::defaults(provider_block(user)))
    }

    /// Resolve the configuration from the environment and the user block.
    pub fn load(user: &Value) -> Result<Self, ProviderError> {
        Self::figment(user)
            .extract()
            .map_err(|e| ProviderError::Configuration(e.to_string()))
    }

    /// Check that a session can be built from this configuration.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let missing = |value: &Option<String>| value.as_deref().map_or(true, str::is_empty);

        if missing(&self.address) {
            diagnostics.push(
                Diagnostic::error("Missing device address")
                    .with_detail("Set `address` in the provider block or BIGIP_HOST")
                    .with_attribute("address"),
            );
        }
        if missing(&self.username) {
            diagnostics.push(
                Diagnostic::error("Missing username")
                    .with_detail("Set `username` in the provider block or BIGIP_USER")
                    .with_attribute("username"),
            );
        }
        if missing(&self.password) {
            diagnostics.push(
                Diagnostic::error("Missing password")
                    .with_detail("Set `password` in the provider block or BIGIP_PASSWORD")
                    .with_attribute("password"),
            );
        }
        if !self.validate_certs_disable && self.trusted_cert_path.is_none() {
            diagnostics.push(
                Diagnostic::warning("Certificate validation uses the system trust store")
                    .with_attribute("trusted_cert_path"),
            );
        }
        diagnostics
    }

    /// The device base URL (`https://host[:port]`).
    pub fn base_url(&self) -> Result<Url, ProviderError> {
        let address = self
            .address
            .as_deref()
            .filter(|a| !a.is_empty())
            .ok_or_else(|| ProviderError::Configuration("address is required".into()))?;
        device_url(address, self.port)
    }

    /// Credentials for the management API.
    pub fn credentials(&self) -> Result<Credentials, ProviderError> {
        let username = self
            .username
            .clone()
            .ok_or_else(|| ProviderError::Configuration("username is required".into()))?;
        let password = self
            .password
            .clone()
            .ok_or_else(|| ProviderError::Configuration("password is required".into()))?;
        Ok(Credentials::bigip(
            username,
            SecretString::from(password),
            self.token_auth,
            self.login_ref.clone(),
        ))
    }

    /// HTTP transport settings.
    pub fn transport(&self) -> TransportConfig {
        let tls = if self.validate_certs_disable {
            TlsMode::DangerAcceptInvalid
        } else if let Some(path) = &self.trusted_cert_path {
            TlsMode::CustomCa(path.clone())
        } else {
            TlsMode::System
        };
        TransportConfig {
            tls,
            timeout: Duration::from_secs(self.api_timeout),
        }
    }

    /// Task polling settings.
    pub fn poll(&self) -> PollConfig {
        PollConfig {
            initial_interval: Duration::from_secs(self.poll_interval.max(1)),
            max_interval: Duration::from_secs(self.poll_max_interval.max(self.poll_interval)),
            multiplier: 2,
            timeout: Duration::from_secs(self.task_timeout),
        }
    }

    /// How long a submission may wait for the device lock.
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout)
    }

    /// Schema of the provider block.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_attribute(
                "address",
                Attribute::optional_string().with_description("Device address (BIGIP_HOST)"),
            )
            .with_attribute(
                "username",
                Attribute::optional_string().with_description("Management user (BIGIP_USER)"),
            )
            .with_attribute(
                "password",
                Attribute::optional_string()
                    .sensitive()
                    .with_description("Management password (BIGIP_PASSWORD)"),
            )
            .with_attribute("port", Attribute::optional_int64())
            .with_attribute("token_auth", Attribute::optional_bool())
            .with_attribute("login_ref", Attribute::optional_string())
            .with_attribute("validate_certs_disable", Attribute::optional_bool())
            .with_attribute("trusted_cert_path", Attribute::optional_string())
            .with_attribute("api_timeout", Attribute::optional_int64())
            .with_attribute("task_timeout", Attribute::optional_int64())
            .with_attribute("lock_timeout", Attribute::optional_int64())
            .with_attribute("poll_interval", Attribute::optional_int64())
            .with_attribute("poll_max_interval", Attribute::optional_int64())
            .with_attribute("teem_disable", Attribute::optional_bool())
    }
}

/// Build `https://address[:port]`, keeping an explicit scheme or port.
pub fn device_url(address: &str, port: u16) -> Result<Url, ProviderError> {
    let raw = if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("https://{address}")
    };
    let mut url = Url::parse(&raw)?;
    if url.port().is_none() && port != 443 {
        url.set_port(Some(port))
            .map_err(|()| ProviderError::Configuration(format!("cannot set port on {raw}")))?;
    }
    Ok(url)
}

/// Top-level provider attributes the user actually set.
fn provider_block(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
        _ => Value::Object(serde_json::Map::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        Jail::expect_with(|_| {
            let config = ProviderConfig::load(&json!({})).unwrap();
            assert_eq!(config.port, 443);
            assert!(config.token_auth);
            assert_eq!(config.login_ref, "tmos");
            assert!(config.validate_certs_disable);
            assert_eq!(config.poll(), PollConfig::default());
            assert_eq!(config.lock_timeout(), Duration::from_secs(600));
            Ok(())
        });
    }

    #[test]
    fn test_environment_fills_unset_values() {
        Jail::expect_with(|jail| {
            jail.set_env("BIGIP_HOST", "10.1.1.4");
            jail.set_env("BIGIP_USER", "admin");
            jail.set_env("BIGIP_PASSWORD", "12345");
            jail.set_env("BIGIP_PORT", "8443");
            jail.set_env("BIGIP_TOKEN_AUTH", "false");
            jail.set_env("TEEM_DISABLE", "true");
            jail.set_env("BIGIQ_LOGIN_REF", "radius");

            let config = ProviderConfig::load(&json!({})).unwrap();
            assert_eq!(config.address.as_deref(), Some("10.1.1.4"));
            assert_eq!(config.username.as_deref(), Some("admin"));
            assert_eq!(config.password.as_deref(), Some("12345"));
            assert_eq!(config.port, 8443);
            assert!(!config.token_auth);
            assert!(config.teem_disable);
            assert_eq!(config.bigiq_login_ref, "radius");
            Ok(())
        });
    }

    #[test]
    fn test_provider_block_wins_over_environment() {
        Jail::expect_with(|jail| {
            jail.set_env("BIGIP_HOST", "10.1.1.4");
            jail.set_env("BIGIP_USER", "env-user");

            let config = ProviderConfig::load(&json!({
                "address": "192.0.2.10",
                "username": null,
                "password": "secret",
            }))
            .unwrap();
            assert_eq!(config.address.as_deref(), Some("192.0.2.10"));
            assert_eq!(config.username.as_deref(), Some("env-user"));
            assert!(config.diagnostics().is_empty());
            Ok(())
        });
    }

    #[test]
    fn test_environment_renamed_keys() {
        Jail::expect_with(|jail| {
            jail.set_env("BIGIP_VERIFY_CERT_DISABLE", "false");
            jail.set_env("BIGIP_TRUSTED_CERT", "/etc/ssl/bigip.pem");

            let config = ProviderConfig::load(&json!({})).unwrap();
            assert!(!config.validate_certs_disable);
            assert_eq!(
                config.trusted_cert_path,
                Some(PathBuf::from("/etc/ssl/bigip.pem"))
            );
            Ok(())
        });
    }

    #[test]
    fn test_missing_credentials_are_reported() {
        Jail::expect_with(|_| {
            let config = ProviderConfig::load(&json!({"address": "10.0.0.1"})).unwrap();
            let attrs: Vec<_> = config
                .diagnostics()
                .into_iter()
                .filter_map(|d| d.attribute)
                .collect();
            assert_eq!(attrs, vec!["username", "password"]);
            assert!(config.credentials().is_err());
            Ok(())
        });
    }

    #[test]
    fn test_device_url() {
        assert_eq!(
            device_url("10.0.0.1", 443).unwrap().as_str(),
            "https://10.0.0.1/"
        );
        assert_eq!(
            device_url("10.0.0.1", 8443).unwrap().as_str(),
            "https://10.0.0.1:8443/"
        );
        assert_eq!(
            device_url("https://bigip.example:9443", 8443)
                .unwrap()
                .as_str(),
            "https://bigip.example:9443/"
        );
        assert_eq!(
            device_url("http://127.0.0.1:3000", 443).unwrap().as_str(),
            "http://127.0.0.1:3000/"
        );
    }

    #[test]
    fn test_transport_tls_mode() {
        let mut config = ProviderConfig::default();
        assert!(matches!(config.transport().tls, TlsMode::DangerAcceptInvalid));

        config.validate_certs_disable = false;
        assert!(matches!(config.transport().tls, TlsMode::System));

        config.trusted_cert_path = Some(PathBuf::from("/etc/ssl/bigip.pem"));
        assert!(matches!(config.transport().tls, TlsMode::CustomCa(_)));
        assert_eq!(config.transport().timeout, Duration::from_secs(60));
    }
}
