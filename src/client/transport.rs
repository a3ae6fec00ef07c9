// Shared transport configuration for building reqwest::Client instances.
//
// BIG-IP and BIG-IQ sessions share TLS and timeout settings through this
// module; authentication is attached per request by the session.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ProviderError;

/// How the device's TLS certificate is checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsMode {
    /// Use the system certificate store.
    System,
    /// Trust the CA certificates in the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate (self-signed management interfaces).
    DangerAcceptInvalid,
}

/// Settings shared by every HTTP client the provider builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Certificate checking.
    pub tls: TlsMode,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::DangerAcceptInvalid,
            timeout: Duration::from_secs(60),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, ProviderError> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("bigip-provider/", env!("CARGO_PKG_VERSION")));

        match &self.tls {
            TlsMode::System => {}
            TlsMode::CustomCa(path) => {
                let pem = std::fs::read(path).map_err(|e| {
                    ProviderError::Configuration(format!(
                        "failed to read trusted certificate {}: {e}",
                        path.display()
                    ))
                })?;
                let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                    ProviderError::Configuration(format!("invalid trusted certificate: {e}"))
                })?;
                builder = builder.add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        Ok(builder.build()?)
    }
}
