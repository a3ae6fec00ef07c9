//! Resource attributes of the typed FAST application resources.
//!
//! Nested blocks are lists (`virtual_server.0.ip`); unset attributes are
//! omitted so that a missing attribute and `null` mean the same thing.

use serde::{Deserialize, Serialize};

/// Attributes shared by the typed FAST application resources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FastAppState {
    /// `tenant/application` once created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// AS3 tenant.
    pub tenant: String,
    /// Application name.
    pub application: String,

    /// Listener, at most one block.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub virtual_server: Vec<VirtualServerBlock>,

    /// Explicit pool switch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_pool: Option<bool>,
    /// Use this pool instead of generating one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_pool: Option<String>,
    /// Members of a generated pool.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pool_members: Vec<PoolMemberBlock>,
    /// Load balancing method of a generated pool.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_balancing_mode: Option<String>,
    /// Seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slow_ramp_time: Option<i64>,

    /// Explicit SNAT switch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_snat: Option<bool>,
    /// Use this SNAT pool.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_snat_pool: Option<String>,
    /// Addresses of a generated SNAT pool.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub snat_pool_address: Vec<String>,

    /// Explicit monitor switch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_monitor: Option<bool>,
    /// Use this monitor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_monitor: Option<String>,
    /// Settings of a generated monitor.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub monitor: Vec<MonitorBlock>,

    /// Explicit client-side TLS switch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_tls_server: Option<bool>,
    /// Use this client-ssl profile.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_tls_server_profile: Option<String>,
    /// Certificate pair of a generated client-ssl profile.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tls_server_profile: Vec<TlsServerProfileBlock>,

    /// Explicit server-side TLS switch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_tls_client: Option<bool>,
    /// Use this server-ssl profile.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_tls_client_profile: Option<String>,

    /// WAF policy path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_waf_security_policy: Option<String>,
    /// Security log profile paths.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub security_log_profiles: Vec<String>,
}

/// `virtual_server` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualServerBlock {
    /// Virtual address.
    pub ip: String,
    /// Service port.
    pub port: i64,
}

/// `pool_members` block; unset attributes take the template defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolMemberBlock {
    /// Member addresses.
    pub addresses: Vec<String>,
    /// Defaults to 80.
    pub port: i64,
    /// 0 is unlimited.
    pub connection_limit: i64,
    /// Priority group.
    pub priority_group: i64,
    /// Defaults to true.
    pub share_nodes: bool,
}

impl Default for PoolMemberBlock {
    fn default() -> Self {
        Self {
            addresses: Vec::new(),
            port: 80,
            connection_limit: 0,
            priority_group: 0,
            share_nodes: true,
        }
    }
}

/// `monitor` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorBlock {
    /// Seconds, defaults to 30.
    pub interval: i64,
    /// HTTP request text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_string: Option<String>,
    /// Expected response text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    /// Send the credentials.
    pub monitor_auth: bool,
    /// Monitor user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Monitor passphrase.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Default for MonitorBlock {
    fn default() -> Self {
        Self {
            interval: 30,
            send_string: None,
            response: None,
            monitor_auth: false,
            username: None,
            password: None,
        }
    }
}

/// `tls_server_profile` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsServerProfileBlock {
    /// Certificate path.
    pub tls_cert_name: String,
    /// Key path.
    pub tls_key_name: String,
}
