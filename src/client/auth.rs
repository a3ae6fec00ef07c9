// Management API authentication
//
// Token sessions log in once at `/mgmt/shared/authn/login` and send the
// returned token as `X-F5-Auth-Token`; otherwise every request carries
// HTTP basic credentials.

use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use crate::error::ProviderError;

/// Token login endpoint.
pub const LOGIN_PATH: &str = "/mgmt/shared/authn/login";
/// Header carrying the session token.
pub const TOKEN_HEADER: &str = "X-F5-Auth-Token";

/// Where the device should check the credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginTarget {
    /// BIG-IP login provider name (`loginProviderName`), e.g. `tmos`.
    Provider(String),
    /// BIG-IQ login reference (`loginReference.link`).
    Reference(String),
}

impl LoginTarget {
    /// Build a BIG-IQ reference from a provider name such as `local`, or
    /// keep a full link as given.
    pub fn bigiq(login_ref: &str) -> Self {
        if login_ref.starts_with("https://") {
            Self::Reference(login_ref.to_string())
        } else {
            Self::Reference(format!(
                "https://localhost/mgmt/cm/system/authn/providers/{login_ref}/login"
            ))
        }
    }
}

/// Credentials for one management endpoint.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Login user.
    pub username: String,
    /// Login password.
    pub password: SecretString,
    /// Log in for a token instead of sending basic auth.
    pub token_auth: bool,
    /// Who checks the credentials.
    pub login: LoginTarget,
}

impl Credentials {
    /// Credentials for a BIG-IP.
    pub fn bigip(
        username: String,
        password: SecretString,
        token_auth: bool,
        login_ref: String,
    ) -> Self {
        Self {
            username,
            password,
            token_auth,
            login: LoginTarget::Provider(login_ref),
        }
    }

    /// Credentials for a BIG-IQ.
    pub fn bigiq(username: String, password: SecretString, token_auth: bool, login_ref: &str) -> Self {
        Self {
            username,
            password,
            token_auth,
            login: LoginTarget::bigiq(login_ref),
        }
    }

    fn login_body(&self) -> Value {
        match &self.login {
            LoginTarget::Provider(name) => json!({
                "username": self.username,
                "password": self.password.expose_secret(),
                "loginProviderName": name,
            }),
            LoginTarget::Reference(link) => json!({
                "username": self.username,
                "password": self.password.expose_secret(),
                "loginReference": { "link": link },
            }),
        }
    }
}

/// How requests of an established session authenticate.
#[derive(Debug, Clone)]
pub enum Session {
    /// `X-F5-Auth-Token` from a login.
    Token(SecretString),
    /// HTTP basic credentials on every request.
    Basic {
        /// Login user.
        username: String,
        /// Login password.
        password: SecretString,
    },
}

impl Session {
    /// A token session (tests and pre-issued tokens).
    pub fn token(token: impl Into<String>) -> Self {
        Self::Token(SecretString::from(token.into()))
    }

    /// Log in if token auth is requested, otherwise fall back to basic auth.
    pub async fn establish(
        http: &reqwest::Client,
        base_url: &Url,
        credentials: &Credentials,
    ) -> Result<Self, ProviderError> {
        if !credentials.token_auth {
            return Ok(Self::Basic {
                username: credentials.username.clone(),
                password: credentials.password.clone(),
            });
        }

        let url = base_url.join(LOGIN_PATH)?;
        debug!("logging in at {}", url);

        let resp = http
            .post(url)
            .json(&credentials.login_body())
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(ProviderError::Authentication(format!(
                "login failed (HTTP {status}): {}",
                body.chars().take(256).collect::<String>()
            )));
        }

        let parsed: Value = serde_json::from_str(&body)?;
        let token = parsed
            .pointer("/token/token")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ProviderError::Authentication("login answer carried no token".into())
            })?;

        debug!("login successful");
        Ok(Self::token(token))
    }

    /// Attach this session's credentials to a request.
    pub(crate) fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Self::Token(token) => request.header(TOKEN_HEADER, token.expose_secret()),
            Self::Basic { username, password } => {
                request.basic_auth(username, Some(password.expose_secret()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bigip_login_body() {
        let creds = Credentials::bigip(
            "admin".into(),
            SecretString::from("pw".to_string()),
            true,
            "tmos".into(),
        );
        assert_eq!(
            creds.login_body(),
            json!({"username": "admin", "password": "pw", "loginProviderName": "tmos"})
        );
    }

    #[test]
    fn test_bigiq_login_body() {
        let creds = Credentials::bigiq(
            "admin".into(),
            SecretString::from("pw".to_string()),
            true,
            "local",
        );
        assert_eq!(
            creds.login_body()["loginReference"]["link"],
            "https://localhost/mgmt/cm/system/authn/providers/local/login"
        );

        let explicit = LoginTarget::bigiq("https://localhost/custom/login");
        assert_eq!(
            explicit,
            LoginTarget::Reference("https://localhost/custom/login".into())
        );
    }

    #[test]
    fn test_session_debug_hides_secrets() {
        let session = Session::token("super-secret-token");
        assert!(!format!("{session:?}").contains("super-secret-token"));
    }
}
