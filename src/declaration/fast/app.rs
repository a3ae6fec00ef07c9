use serde_json::Value;
use tracing::warn;

use super::{
    FastAppParams, FastAppState, FastPoolMember, FastTemplate, MonitorBlock, PoolMemberBlock,
    TlsServerProfileBlock, VirtualServerBlock, MONITOR, POOL, SNAT, TLS_CLIENT, TLS_SERVER,
};
use crate::declaration::strip_nulls;
use crate::error::ProviderError;
use crate::validation::GroupChoice;

/// Address and port the application listens on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualServer {
    /// Virtual address.
    pub ip: String,
    /// Service port.
    pub port: i64,
}

/// One group of pool members sharing a port and settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolMember {
    /// Member addresses.
    pub addresses: Vec<String>,
    /// Member service port.
    pub port: i64,
    /// Concurrent connection cap; 0 is unlimited.
    pub connection_limit: i64,
    /// Priority group for priority activation.
    pub priority_group: i64,
    /// Reuse nodes that other partitions already define.
    pub share_nodes: bool,
}

/// Where the application's pool comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolSelection {
    /// No pool.
    Disabled,
    /// An existing pool, by path.
    Existing(String),
    /// A pool the template generates from these members.
    Members(Vec<PoolMember>),
}

/// Source address translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnatSelection {
    /// No translation.
    Disabled,
    /// Translate to self IPs.
    Automap,
    /// An existing SNAT pool, by path.
    Existing(String),
    /// A SNAT pool the template generates from these addresses.
    Addresses(Vec<String>),
}

/// Settings of a monitor generated by the template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorParams {
    /// Seconds between checks.
    pub interval: i64,
    /// Request sent by HTTP monitors.
    pub send_string: Option<String>,
    /// Expected response text.
    pub response: Option<String>,
    /// Send the credentials below.
    pub credentials: bool,
    /// Monitor user.
    pub username: Option<String>,
    /// Monitor passphrase.
    pub password: Option<String>,
}

/// Health monitoring for the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorSelection {
    /// No monitor.
    Disabled,
    /// An existing monitor, by path.
    Existing(String),
    /// A monitor the template generates.
    Generated(MonitorParams),
}

/// Certificate and key objects on the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsCertPair {
    /// Certificate path.
    pub cert: String,
    /// Key path.
    pub key: String,
}

/// Client-side TLS termination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsServerSelection {
    /// Plain traffic.
    Disabled,
    /// An existing client-ssl profile, by path.
    Existing(String),
    /// A profile the template generates from a certificate pair.
    Generated(TlsCertPair),
}

/// Server-side TLS towards the pool members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsClientSelection {
    /// Plain traffic.
    Disabled,
    /// An existing server-ssl profile, by path.
    Existing(String),
    /// A profile generated with the template's defaults.
    Generated,
}

/// A FAST application with every option group resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastApp {
    /// Template the application renders.
    pub template: FastTemplate,
    /// AS3 tenant (partition).
    pub tenant: String,
    /// Application name within the tenant.
    pub application: String,
    /// Listener.
    pub virtual_server: VirtualServer,
    /// Pool choice.
    pub pool: PoolSelection,
    /// Load balancing method of a generated pool.
    pub load_balancing_mode: Option<String>,
    /// Seconds a new member ramps up over.
    pub slow_ramp_time: Option<i64>,
    /// SNAT choice.
    pub snat: SnatSelection,
    /// Monitor choice.
    pub monitor: MonitorSelection,
    /// Client-side TLS choice.
    pub tls_server: TlsServerSelection,
    /// Server-side TLS choice.
    pub tls_client: TlsClientSelection,
    /// Existing WAF policy, by path.
    pub waf_policy: Option<String>,
    /// Security log profiles attached to the virtual server.
    pub security_log_profiles: Vec<String>,
}

impl FastApp {
    /// Build the typed application from resource attributes.
    ///
    /// Fails before any device call when an exclusive group is violated or
    /// the virtual server is missing.
    pub fn from_state(template: FastTemplate, config: &Value) -> Result<Self, ProviderError> {
        let config = strip_nulls(config);
        let state: FastAppState = serde_json::from_value(config.clone())?;

        let virtual_server = state
            .virtual_server
            .first()
            .map(|vs| VirtualServer {
                ip: vs.ip.clone(),
                port: vs.port,
            })
            .ok_or_else(|| ProviderError::Validation("virtual_server is required".into()))?;

        let pool = match POOL.resolve(&config)? {
            GroupChoice::Selected("existing_pool") => {
                PoolSelection::Existing(state.existing_pool.clone().unwrap_or_default())
            }
            GroupChoice::Selected(_) => {
                PoolSelection::Members(state.pool_members.iter().map(PoolMember::from).collect())
            }
            GroupChoice::Disabled | GroupChoice::Automatic => PoolSelection::Disabled,
        };

        let snat = match SNAT.resolve(&config)? {
            GroupChoice::Selected("existing_snat_pool") => {
                SnatSelection::Existing(state.existing_snat_pool.clone().unwrap_or_default())
            }
            GroupChoice::Selected(_) => SnatSelection::Addresses(state.snat_pool_address.clone()),
            GroupChoice::Automatic => SnatSelection::Automap,
            GroupChoice::Disabled => SnatSelection::Disabled,
        };

        let monitor = match MONITOR.resolve(&config)? {
            GroupChoice::Selected("existing_monitor") => {
                MonitorSelection::Existing(state.existing_monitor.clone().unwrap_or_default())
            }
            GroupChoice::Selected(_) => MonitorSelection::Generated(
                state
                    .monitor
                    .first()
                    .map(MonitorParams::from)
                    .unwrap_or_else(|| MonitorParams::from(&MonitorBlock::default())),
            ),
            GroupChoice::Disabled | GroupChoice::Automatic => MonitorSelection::Disabled,
        };

        let (tls_server, tls_client) = if template.supports_tls() {
            let server = match TLS_SERVER.resolve(&config)? {
                GroupChoice::Selected("existing_tls_server_profile") => TlsServerSelection::Existing(
                    state.existing_tls_server_profile.clone().unwrap_or_default(),
                ),
                GroupChoice::Selected(_) => {
                    let block = state.tls_server_profile.first().cloned().unwrap_or_default();
                    TlsServerSelection::Generated(TlsCertPair {
                        cert: block.tls_cert_name,
                        key: block.tls_key_name,
                    })
                }
                GroupChoice::Disabled | GroupChoice::Automatic => TlsServerSelection::Disabled,
            };
            let client = match TLS_CLIENT.resolve(&config)? {
                GroupChoice::Selected(_) => TlsClientSelection::Existing(
                    state.existing_tls_client_profile.clone().unwrap_or_default(),
                ),
                GroupChoice::Automatic => TlsClientSelection::Generated,
                GroupChoice::Disabled => TlsClientSelection::Disabled,
            };
            (server, client)
        } else {
            (TlsServerSelection::Disabled, TlsClientSelection::Disabled)
        };

        let (waf_policy, security_log_profiles) = if template.supports_security() {
            (
                state.existing_waf_security_policy.clone().filter(|p| !p.is_empty()),
                state.security_log_profiles.clone(),
            )
        } else {
            (None, Vec::new())
        };

        Ok(Self {
            template,
            tenant: state.tenant,
            application: state.application,
            virtual_server,
            pool,
            load_balancing_mode: state.load_balancing_mode,
            slow_ramp_time: state.slow_ramp_time,
            snat,
            monitor,
            tls_server,
            tls_client,
            waf_policy,
            security_log_profiles,
        })
    }

    /// Render the template parameters.
    pub fn to_params(&self) -> FastAppParams {
        let mut params = FastAppParams {
            tenant_name: self.tenant.clone(),
            app_name: self.application.clone(),
            virtual_address: Some(self.virtual_server.ip.clone()),
            virtual_port: Some(self.virtual_server.port),
            load_balancing_mode: self.load_balancing_mode.clone(),
            slow_ramp_time: self.slow_ramp_time,
            ..FastAppParams::default()
        };

        match &self.pool {
            PoolSelection::Disabled => params.enable_pool = Some(false),
            PoolSelection::Existing(name) => {
                params.enable_pool = Some(true);
                params.make_pool = Some(false);
                params.pool_name = Some(name.clone());
            }
            PoolSelection::Members(members) => {
                params.enable_pool = Some(true);
                params.make_pool = Some(true);
                params.pool_members = Some(members.iter().map(FastPoolMember::from).collect());
            }
        }

        match &self.snat {
            SnatSelection::Disabled => params.enable_snat = Some(false),
            SnatSelection::Automap => {
                params.enable_snat = Some(true);
                params.snat_automap = Some(true);
            }
            SnatSelection::Existing(name) => {
                params.enable_snat = Some(true);
                params.snat_automap = Some(false);
                params.make_snatpool = Some(false);
                params.snatpool_name = Some(name.clone());
            }
            SnatSelection::Addresses(addresses) => {
                params.enable_snat = Some(true);
                params.snat_automap = Some(false);
                params.make_snatpool = Some(true);
                params.snat_addresses = Some(addresses.clone());
            }
        }

        match &self.monitor {
            MonitorSelection::Disabled => params.enable_monitor = Some(false),
            MonitorSelection::Existing(name) => {
                params.enable_monitor = Some(true);
                params.make_monitor = Some(false);
                if self.template.uses_http_monitor() {
                    params.monitor_name_http = Some(name.clone());
                } else {
                    params.monitor_name = Some(name.clone());
                }
            }
            MonitorSelection::Generated(monitor) => {
                params.enable_monitor = Some(true);
                params.make_monitor = Some(true);
                params.monitor_interval = Some(monitor.interval);
                params.monitor_send_string = monitor.send_string.clone();
                params.monitor_expected_response = monitor.response.clone();
                params.monitor_credentials = Some(monitor.credentials);
                if monitor.credentials {
                    params.monitor_username = monitor.username.clone();
                    params.monitor_passphrase = monitor.password.clone();
                }
            }
        }

        // The HTTP template enables TLS by default, so plain HTTP must say no.
        if self.template.supports_security() {
            match &self.tls_server {
                TlsServerSelection::Disabled => params.enable_tls_server = Some(false),
                TlsServerSelection::Existing(name) => {
                    params.enable_tls_server = Some(true);
                    params.make_tls_server_profile = Some(false);
                    params.tls_server_profile_name = Some(name.clone());
                }
                TlsServerSelection::Generated(pair) => {
                    params.enable_tls_server = Some(true);
                    params.make_tls_server_profile = Some(true);
                    params.tls_cert_name = Some(pair.cert.clone());
                    params.tls_key_name = Some(pair.key.clone());
                }
            }
            match &self.tls_client {
                TlsClientSelection::Disabled => params.enable_tls_client = Some(false),
                TlsClientSelection::Existing(name) => {
                    params.enable_tls_client = Some(true);
                    params.make_tls_client_profile = Some(false);
                    params.tls_client_profile_name = Some(name.clone());
                }
                TlsClientSelection::Generated => {
                    params.enable_tls_client = Some(true);
                    params.make_tls_client_profile = Some(true);
                }
            }

            match &self.waf_policy {
                Some(policy) => {
                    params.enable_waf_policy = Some(true);
                    params.make_waf_policy = Some(false);
                    params.asm_waf_policy = Some(policy.clone());
                }
                None => params.enable_waf_policy = Some(false),
            }
            if self.security_log_profiles.is_empty() {
                params.enable_asm_logging = Some(false);
            } else {
                params.enable_asm_logging = Some(true);
                params.log_profile_names = Some(self.security_log_profiles.clone());
            }
        }

        params
    }

    /// Interpret parameters reported by the device.
    ///
    /// Absent parameters take the template defaults; inconsistent
    /// combinations are logged and read as disabled.
    pub fn from_params(template: FastTemplate, params: &FastAppParams) -> Self {
        let named = |name: &Option<String>| name.clone().filter(|n| !n.is_empty());

        let pool = if params.enable_pool == Some(false) {
            PoolSelection::Disabled
        } else if let Some(members) = params
            .pool_members
            .as_ref()
            .filter(|m| !m.is_empty() && params.make_pool != Some(false))
        {
            PoolSelection::Members(members.iter().map(PoolMember::from).collect())
        } else if let Some(name) = named(&params.pool_name) {
            PoolSelection::Existing(name)
        } else {
            if params.enable_pool == Some(true) {
                warn!(tenant = %params.tenant_name, app = %params.app_name, "pool enabled without members or pool name");
            }
            PoolSelection::Disabled
        };

        let snat = if params.enable_snat == Some(false) {
            SnatSelection::Disabled
        } else if params.snat_automap != Some(false) {
            SnatSelection::Automap
        } else if params.make_snatpool == Some(true) {
            SnatSelection::Addresses(params.snat_addresses.clone().unwrap_or_default())
        } else if let Some(name) = named(&params.snatpool_name) {
            SnatSelection::Existing(name)
        } else {
            warn!(tenant = %params.tenant_name, app = %params.app_name, "snat enabled without automap, addresses or pool");
            SnatSelection::Disabled
        };

        let monitor_name = if template.uses_http_monitor() {
            &params.monitor_name_http
        } else {
            &params.monitor_name
        };
        let monitor = if params.enable_monitor != Some(true) {
            MonitorSelection::Disabled
        } else if params.make_monitor == Some(false) {
            match named(monitor_name) {
                Some(name) => MonitorSelection::Existing(name),
                None => {
                    warn!(tenant = %params.tenant_name, app = %params.app_name, "monitor enabled without a monitor name");
                    MonitorSelection::Disabled
                }
            }
        } else {
            let credentials = params.monitor_credentials.unwrap_or(false);
            MonitorSelection::Generated(MonitorParams {
                interval: params.monitor_interval.unwrap_or(30),
                send_string: params.monitor_send_string.clone(),
                response: params.monitor_expected_response.clone(),
                credentials,
                username: params.monitor_username.clone().filter(|_| credentials),
                password: params.monitor_passphrase.clone().filter(|_| credentials),
            })
        };

        let tls_server = if !template.supports_tls() || params.enable_tls_server != Some(true) {
            TlsServerSelection::Disabled
        } else if params.make_tls_server_profile == Some(false) {
            named(&params.tls_server_profile_name)
                .map_or(TlsServerSelection::Disabled, TlsServerSelection::Existing)
        } else {
            TlsServerSelection::Generated(TlsCertPair {
                cert: params.tls_cert_name.clone().unwrap_or_default(),
                key: params.tls_key_name.clone().unwrap_or_default(),
            })
        };

        let tls_client = if !template.supports_tls() || params.enable_tls_client != Some(true) {
            TlsClientSelection::Disabled
        } else if params.make_tls_client_profile == Some(false) {
            named(&params.tls_client_profile_name)
                .map_or(TlsClientSelection::Disabled, TlsClientSelection::Existing)
        } else {
            TlsClientSelection::Generated
        };

        let security = template.supports_security();
        let waf_policy = if security
            && params.enable_waf_policy == Some(true)
            && params.make_waf_policy != Some(true)
        {
            named(&params.asm_waf_policy)
        } else {
            None
        };
        let security_log_profiles = if security && params.enable_asm_logging == Some(true) {
            params.log_profile_names.clone().unwrap_or_default()
        } else {
            Vec::new()
        };

        Self {
            template,
            tenant: params.tenant_name.clone(),
            application: params.app_name.clone(),
            virtual_server: VirtualServer {
                ip: params.virtual_address.clone().unwrap_or_default(),
                port: params.virtual_port.unwrap_or_default(),
            },
            pool,
            load_balancing_mode: params.load_balancing_mode.clone(),
            slow_ramp_time: params.slow_ramp_time,
            snat,
            monitor,
            tls_server,
            tls_client,
            waf_policy,
            security_log_profiles,
        }
    }

    /// Flatten into resource attributes.
    ///
    /// `enable_*` flags are reported only where the prior state carried
    /// them; a monitor password the device does not echo is kept from the
    /// prior state.
    pub fn to_state(&self, prior: Option<&FastAppState>) -> FastAppState {
        let flag = |set: Option<bool>, effective: bool| set.map(|_| effective);
        let prior_flag = |pick: fn(&FastAppState) -> Option<bool>| prior.and_then(pick);

        let mut state = FastAppState {
            id: Some(self.id()),
            tenant: self.tenant.clone(),
            application: self.application.clone(),
            virtual_server: vec![VirtualServerBlock {
                ip: self.virtual_server.ip.clone(),
                port: self.virtual_server.port,
            }],
            load_balancing_mode: self.load_balancing_mode.clone(),
            slow_ramp_time: self.slow_ramp_time,
            enable_pool: flag(
                prior_flag(|p| p.enable_pool),
                self.pool != PoolSelection::Disabled,
            ),
            enable_snat: flag(
                prior_flag(|p| p.enable_snat),
                self.snat != SnatSelection::Disabled,
            ),
            enable_monitor: flag(
                prior_flag(|p| p.enable_monitor),
                self.monitor != MonitorSelection::Disabled,
            ),
            ..FastAppState::default()
        };

        match &self.pool {
            PoolSelection::Disabled => {}
            PoolSelection::Existing(name) => state.existing_pool = Some(name.clone()),
            PoolSelection::Members(members) => {
                state.pool_members = members.iter().map(PoolMemberBlock::from).collect();
            }
        }

        match &self.snat {
            SnatSelection::Disabled | SnatSelection::Automap => {}
            SnatSelection::Existing(name) => state.existing_snat_pool = Some(name.clone()),
            SnatSelection::Addresses(addresses) => state.snat_pool_address = addresses.clone(),
        }

        match &self.monitor {
            MonitorSelection::Disabled => {}
            MonitorSelection::Existing(name) => state.existing_monitor = Some(name.clone()),
            MonitorSelection::Generated(monitor) => {
                let mut block = MonitorBlock::from(monitor);
                if block.password.is_none() {
                    block.password = prior
                        .and_then(|p| p.monitor.first())
                        .and_then(|m| m.password.clone())
                        .filter(|_| block.monitor_auth);
                }
                state.monitor = vec![block];
            }
        }

        if self.template.supports_tls() {
            state.enable_tls_server = flag(
                prior_flag(|p| p.enable_tls_server),
                self.tls_server != TlsServerSelection::Disabled,
            );
            match &self.tls_server {
                TlsServerSelection::Disabled => {}
                TlsServerSelection::Existing(name) => {
                    state.existing_tls_server_profile = Some(name.clone());
                }
                TlsServerSelection::Generated(pair) => {
                    state.tls_server_profile = vec![TlsServerProfileBlock {
                        tls_cert_name: pair.cert.clone(),
                        tls_key_name: pair.key.clone(),
                    }];
                }
            }

            // A generated client profile is only expressible through the flag.
            state.enable_tls_client = match &self.tls_client {
                TlsClientSelection::Generated => Some(true),
                other => flag(
                    prior_flag(|p| p.enable_tls_client),
                    *other != TlsClientSelection::Disabled,
                ),
            };
            if let TlsClientSelection::Existing(name) = &self.tls_client {
                state.existing_tls_client_profile = Some(name.clone());
            }
        }

        if self.template.supports_security() {
            state.existing_waf_security_policy = self.waf_policy.clone();
            state.security_log_profiles = self.security_log_profiles.clone();
        }

        state
    }

    /// Resource ID: `tenant/application`.
    pub fn id(&self) -> String {
        format!("{}/{}", self.tenant, self.application)
    }
}

impl From<&PoolMemberBlock> for PoolMember {
    fn from(block: &PoolMemberBlock) -> Self {
        Self {
            addresses: block.addresses.clone(),
            port: block.port,
            connection_limit: block.connection_limit,
            priority_group: block.priority_group,
            share_nodes: block.share_nodes,
        }
    }
}

impl From<&PoolMember> for PoolMemberBlock {
    fn from(member: &PoolMember) -> Self {
        Self {
            addresses: member.addresses.clone(),
            port: member.port,
            connection_limit: member.connection_limit,
            priority_group: member.priority_group,
            share_nodes: member.share_nodes,
        }
    }
}

impl From<&PoolMember> for FastPoolMember {
    fn from(member: &PoolMember) -> Self {
        Self {
            server_addresses: member.addresses.clone(),
            service_port: member.port,
            connection_limit: member.connection_limit,
            priority_group: member.priority_group,
            share_nodes: member.share_nodes,
        }
    }
}

impl From<&FastPoolMember> for PoolMember {
    fn from(member: &FastPoolMember) -> Self {
        Self {
            addresses: member.server_addresses.clone(),
            port: member.service_port,
            connection_limit: member.connection_limit,
            priority_group: member.priority_group,
            share_nodes: member.share_nodes,
        }
    }
}

impl From<&MonitorBlock> for MonitorParams {
    fn from(block: &MonitorBlock) -> Self {
        Self {
            interval: block.interval,
            send_string: block.send_string.clone(),
            response: block.response.clone(),
            credentials: block.monitor_auth,
            username: block.username.clone(),
            password: block.password.clone(),
        }
    }
}

impl From<&MonitorParams> for MonitorBlock {
    fn from(monitor: &MonitorParams) -> Self {
        Self {
            interval: monitor.interval,
            send_string: monitor.send_string.clone(),
            response: monitor.response.clone(),
            monitor_auth: monitor.credentials,
            username: monitor.username.clone(),
            password: monitor.password.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn round_trip(template: FastTemplate, config: &Value) -> FastAppState {
        let prior: FastAppState = serde_json::from_value(strip_nulls(config)).unwrap();
        let app = FastApp::from_state(template, config).unwrap();
        let wire = serde_json::to_value(app.to_params()).unwrap();
        let params: FastAppParams = serde_json::from_value(wire).unwrap();
        FastApp::from_params(template, &params).to_state(Some(&prior))
    }

    #[test]
    fn test_pool_members_round_trip() {
        let config = json!({
            "tenant": "fastTenant",
            "application": "fastApp",
            "virtual_server": [{"ip": "10.30.30.44", "port": 443}],
            "pool_members": [{
                "addresses": ["10.11.34.65", "56.43.23.76"],
                "port": 80,
                "priority_group": 1,
                "connection_limit": 4,
                "share_nodes": true
            }],
            "load_balancing_mode": "least-connections-member",
            "slow_ramp_time": 300,
        });

        let state = round_trip(FastTemplate::Http, &config);
        assert_eq!(state.existing_pool, None);
        assert_eq!(state.pool_members.len(), 1);
        assert_eq!(state.pool_members[0].addresses.len(), 2);
        assert_eq!(state.pool_members[0].connection_limit, 4);
        assert_eq!(state.load_balancing_mode.as_deref(), Some("least-connections-member"));
        assert_eq!(state.slow_ramp_time, Some(300));
        assert_eq!(state.id.as_deref(), Some("fastTenant/fastApp"));
        // Nothing selected for snat: automap, which has no attribute of its own.
        assert_eq!(state.existing_snat_pool, None);
        assert!(state.snat_pool_address.is_empty());
    }

    #[test]
    fn test_existing_selections_round_trip() {
        let config = json!({
            "tenant": "t1",
            "application": "a1",
            "virtual_server": [{"ip": "10.1.1.1", "port": 53}],
            "existing_pool": "/Common/dns_pool",
            "existing_snat_pool": "/Common/snat1",
            "existing_monitor": "/Common/udp",
        });

        let state = round_trip(FastTemplate::Udp, &config);
        assert_eq!(state.existing_pool.as_deref(), Some("/Common/dns_pool"));
        assert!(state.pool_members.is_empty());
        assert_eq!(state.existing_snat_pool.as_deref(), Some("/Common/snat1"));
        assert_eq!(state.existing_monitor.as_deref(), Some("/Common/udp"));
        assert!(state.monitor.is_empty());
    }

    #[test]
    fn test_https_round_trip() {
        let config = json!({
            "tenant": "t1",
            "application": "a1",
            "virtual_server": [{"ip": "10.1.1.1", "port": 443}],
            "tls_server_profile": [{"tls_cert_name": "/Common/default.crt", "tls_key_name": "/Common/default.key"}],
            "enable_tls_client": true,
            "snat_pool_address": ["10.2.2.2", "10.2.2.3"],
            "monitor": [{"interval": 10, "send_string": "GET /health", "response": "200 OK", "monitor_auth": true, "username": "monitor", "password": "secret"}],
            "existing_waf_security_policy": "/Common/waf",
            "security_log_profiles": ["/Common/Log all requests"],
        });

        let state = round_trip(FastTemplate::Https, &config);
        assert_eq!(state.tls_server_profile[0].tls_cert_name, "/Common/default.crt");
        assert_eq!(state.existing_tls_server_profile, None);
        assert_eq!(state.enable_tls_client, Some(true));
        assert_eq!(state.existing_tls_client_profile, None);
        assert_eq!(state.snat_pool_address, vec!["10.2.2.2", "10.2.2.3"]);
        assert_eq!(state.monitor[0].password.as_deref(), Some("secret"));
        assert_eq!(state.existing_waf_security_policy.as_deref(), Some("/Common/waf"));
        assert_eq!(state.security_log_profiles, vec!["/Common/Log all requests"]);
    }

    #[test]
    fn test_http_params_disable_tls() {
        let app = FastApp::from_state(
            FastTemplate::Http,
            &json!({"tenant": "t", "application": "a", "virtual_server": [{"ip": "10.0.0.1", "port": 80}]}),
        )
        .unwrap();
        let params = serde_json::to_value(app.to_params()).unwrap();
        assert_eq!(params["virtual_address"], "10.0.0.1");
        assert_eq!(params["virtual_port"], 80);
        assert_eq!(params["enable_pool"], false);
        assert_eq!(params["enable_snat"], true);
        assert_eq!(params["snat_automap"], true);
        assert_eq!(params["enable_monitor"], false);
        assert_eq!(params["enable_tls_server"], false);
        assert_eq!(params["enable_tls_client"], false);
        assert_eq!(params["enable_waf_policy"], false);
    }

    #[test]
    fn test_tcp_params_have_no_http_only_fields() {
        let app = FastApp::from_state(
            FastTemplate::Tcp,
            &json!({
                "tenant": "t", "application": "a",
                "virtual_server": [{"ip": "10.0.0.1", "port": 8080}],
                "existing_monitor": "/Common/tcp",
            }),
        )
        .unwrap();
        let params = serde_json::to_value(app.to_params()).unwrap();
        assert_eq!(params["monitor_name"], "/Common/tcp");
        assert!(params.get("monitor_name_http").is_none());
        assert!(params.get("enable_tls_server").is_none());
        assert!(params.get("enable_waf_policy").is_none());
    }

    #[test]
    fn test_flag_false_with_option_is_rejected() {
        let err = FastApp::from_state(
            FastTemplate::Http,
            &json!({
                "tenant": "t", "application": "a",
                "virtual_server": [{"ip": "10.0.0.1", "port": 80}],
                "enable_pool": false,
                "pool_members": [{"addresses": ["10.0.0.2"], "port": 80}],
            }),
        )
        .unwrap_err();
        assert_eq!(
            err.message(),
            "pool_members cannot be set when enable_pool is false"
        );
    }

    #[test]
    fn test_conflicting_options_are_rejected() {
        let err = FastApp::from_state(
            FastTemplate::Tcp,
            &json!({
                "tenant": "t", "application": "a",
                "virtual_server": [{"ip": "10.0.0.1", "port": 80}],
                "existing_snat_pool": "/Common/snat",
                "snat_pool_address": ["10.9.9.9"],
            }),
        )
        .unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
        assert!(err.message().contains("existing_snat_pool"));
        assert!(err.message().contains("snat_pool_address"));
    }

    #[test]
    fn test_https_requires_server_profile() {
        let err = FastApp::from_state(
            FastTemplate::Https,
            &json!({"tenant": "t", "application": "a", "virtual_server": [{"ip": "10.0.0.1", "port": 443}]}),
        )
        .unwrap_err();
        assert!(err.message().contains("tls server profile"));
    }

    #[test]
    fn test_missing_virtual_server() {
        let err = FastApp::from_state(
            FastTemplate::Udp,
            &json!({"tenant": "t", "application": "a", "virtual_server": null}),
        )
        .unwrap_err();
        assert_eq!(err.message(), "virtual_server is required");
    }

    #[test]
    fn test_flags_echo_only_when_set() {
        let prior = FastAppState {
            enable_pool: Some(true),
            ..FastAppState::default()
        };
        let params = FastAppParams {
            tenant_name: "t".into(),
            app_name: "a".into(),
            enable_pool: Some(true),
            make_pool: Some(false),
            pool_name: Some("/Common/p".into()),
            enable_monitor: Some(false),
            ..FastAppParams::default()
        };
        let state = FastApp::from_params(FastTemplate::Http, &params).to_state(Some(&prior));
        assert_eq!(state.enable_pool, Some(true));
        assert_eq!(state.enable_monitor, None);

        let imported = FastApp::from_params(FastTemplate::Http, &params).to_state(None);
        assert_eq!(imported.enable_pool, None);
        assert_eq!(imported.existing_pool.as_deref(), Some("/Common/p"));
    }
}
