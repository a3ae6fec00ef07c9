//! FAST template parameters exactly as the FAST service reads and reports
//! them. Field names are part of the device API and must not change.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;

/// Parameters of the `bigip-fast-templates/{http,tcp,udp}` templates.
///
/// Each field is the template parameter of the same name.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FastAppParams {
    pub tenant_name: String,
    pub app_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtual_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtual_port: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_pool: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub make_pool: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_members: Option<Vec<FastPoolMember>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_balancing_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slow_ramp_time: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_snat: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snat_automap: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub make_snatpool: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snatpool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snat_addresses: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_monitor: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub make_monitor: Option<bool>,
    /// Existing monitor for the HTTP template.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitor_name_http: Option<String>,
    /// Existing monitor for the TCP and UDP templates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitor_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitor_interval: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitor_send_string: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitor_expected_response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitor_credentials: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitor_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitor_passphrase: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_tls_server: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub make_tls_server_profile: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_server_profile_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_cert_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_key_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_tls_client: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub make_tls_client_profile: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_client_profile_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_waf_policy: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub make_waf_policy: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asm_waf_policy: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_asm_logging: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_profile_names: Option<Vec<String>>,
}

/// One entry of `pool_members`.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FastPoolMember {
    pub server_addresses: Vec<String>,
    pub service_port: i64,
    pub connection_limit: i64,
    pub priority_group: i64,
    pub share_nodes: bool,
}

impl FastAppParams {
    /// Extract the parameter view from an application document returned by
    /// `GET /mgmt/shared/fast/applications/{tenant}/{app}`.
    pub fn from_application(document: &Value) -> Result<Self, ProviderError> {
        let view = document.pointer("/constants/fast/view").ok_or_else(|| {
            ProviderError::Internal("application document has no constants.fast.view".into())
        })?;
        Ok(serde_json::from_value(view.clone())?)
    }

    /// The template an application document was rendered from.
    pub fn template_of(document: &Value) -> Option<&str> {
        document
            .pointer("/constants/fast/template")
            .and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_wire_names() {
        let params = FastAppParams {
            tenant_name: "t1".into(),
            app_name: "a1".into(),
            virtual_address: Some("10.1.10.224".into()),
            virtual_port: Some(80),
            enable_pool: Some(true),
            make_pool: Some(true),
            pool_members: Some(vec![FastPoolMember {
                server_addresses: vec!["10.1.10.120".into()],
                service_port: 80,
                connection_limit: 0,
                priority_group: 1,
                share_nodes: true,
            }]),
            ..FastAppParams::default()
        };

        assert_eq!(
            serde_json::to_value(&params).unwrap(),
            json!({
                "tenant_name": "t1",
                "app_name": "a1",
                "virtual_address": "10.1.10.224",
                "virtual_port": 80,
                "enable_pool": true,
                "make_pool": true,
                "pool_members": [{
                    "serverAddresses": ["10.1.10.120"],
                    "servicePort": 80,
                    "connectionLimit": 0,
                    "priorityGroup": 1,
                    "shareNodes": true
                }]
            })
        );
    }

    #[test]
    fn test_from_application_tolerates_missing_fields() {
        let doc = json!({
            "class": "Application",
            "constants": {"fast": {
                "template": "bigip-fast-templates/tcp",
                "view": {
                    "tenant_name": "t1",
                    "app_name": "a1",
                    "pool_members": [{"serverAddresses": ["10.0.0.5"], "servicePort": 443}],
                    "unknown_template_param": "ignored"
                }
            }}
        });

        let params = FastAppParams::from_application(&doc).unwrap();
        assert_eq!(params.tenant_name, "t1");
        assert_eq!(params.virtual_address, None);
        let members = params.pool_members.unwrap();
        assert_eq!(members[0].priority_group, 0);
        assert!(!members[0].share_nodes);
        assert_eq!(
            FastAppParams::template_of(&doc),
            Some("bigip-fast-templates/tcp")
        );
    }

    #[test]
    fn test_from_application_without_view() {
        let err = FastAppParams::from_application(&json!({"class": "Application"})).unwrap_err();
        assert!(matches!(err, ProviderError::Internal(_)));
    }
}
