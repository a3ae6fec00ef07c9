use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Context;
use crate::client::auth::Credentials;
use crate::client::BigIpClient;
use crate::config::device_url;
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};

/// BIG-IQ connection attributes shared by the resources that act through a
/// BIG-IQ.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct BigIqLogin {
    /// Management address.
    pub bigiq_address: String,
    /// Login user.
    pub bigiq_user: String,
    /// Login password.
    pub bigiq_password: String,
    /// Management port.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bigiq_port: Option<u16>,
    /// Token login override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bigiq_token_auth: Option<bool>,
    /// Login provider override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bigiq_login_ref: Option<String>,
}

impl BigIqLogin {
    /// Reject a state missing a connection attribute.
    pub fn check(&self) -> Result<(), ProviderError> {
        for (name, value) in [
            ("bigiq_address", &self.bigiq_address),
            ("bigiq_user", &self.bigiq_user),
            ("bigiq_password", &self.bigiq_password),
        ] {
            if value.is_empty() {
                return Err(ProviderError::Validation(format!("{name} is required")));
            }
        }
        Ok(())
    }

    /// Log in to the BIG-IQ.
    pub async fn connect(&self, ctx: &Context) -> Result<BigIpClient, ProviderError> {
        let config = ctx.config();
        let url = device_url(&self.bigiq_address, self.bigiq_port.unwrap_or(443))?;
        let credentials = Credentials::bigiq(
            self.bigiq_user.clone(),
            SecretString::from(self.bigiq_password.clone()),
            self.bigiq_token_auth.unwrap_or(config.bigiq_token_auth),
            self.bigiq_login_ref
                .as_deref()
                .unwrap_or(&config.bigiq_login_ref),
        );
        debug!(bigiq = %url, "connecting to BIG-IQ");
        BigIpClient::connect(url, &config.transport(), &credentials).await
    }

    /// Add the connection attributes to `schema`.
    pub fn with_attributes(schema: Schema) -> Schema {
        schema
            .with_attribute(
                "bigiq_address",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("BIG-IQ management address"),
            )
            .with_attribute("bigiq_user", Attribute::required_string())
            .with_attribute("bigiq_password", Attribute::required_string().sensitive())
            .with_attribute(
                "bigiq_port",
                Attribute::optional_int64().with_description("Defaults to 443"),
            )
            .with_attribute(
                "bigiq_token_auth",
                Attribute::optional_bool().with_description("Defaults to BIGIQ_TOKEN_AUTH"),
            )
            .with_attribute(
                "bigiq_login_ref",
                Attribute::optional_string().with_description("Defaults to BIGIQ_LOGIN_REF"),
            )
    }
}
