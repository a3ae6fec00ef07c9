//! FAST application documents.
//!
//! Three shapes of the same application:
//!
//! - [`FastAppState`]: the flat resource attributes,
//! - [`FastApp`]: the typed model, one sum type per exclusive option group,
//! - [`FastAppParams`]: the template parameters FAST reads and reports.
//!
//! Building goes `FastAppState -> FastApp -> FastAppParams`, flattening goes
//! the other way.

mod app;
mod params;
mod state;

pub use app::{
    FastApp, MonitorParams, MonitorSelection, PoolMember, PoolSelection, SnatSelection,
    TlsCertPair, TlsClientSelection, TlsServerSelection, VirtualServer,
};
pub use params::{FastAppParams, FastPoolMember};
pub use state::{
    FastAppState, MonitorBlock, PoolMemberBlock, TlsServerProfileBlock, VirtualServerBlock,
};

use crate::validation::{ExclusiveGroup, WhenEmpty};

/// The typed application kinds and the template each renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FastTemplate {
    /// `bigip_fast_http_app`.
    Http,
    /// `bigip_fast_https_app`: HTTP with TLS profiles.
    Https,
    /// `bigip_fast_tcp_app`.
    Tcp,
    /// `bigip_fast_udp_app`.
    Udp,
}

impl FastTemplate {
    /// Template set path on the device.
    pub fn template_name(self) -> &'static str {
        match self {
            Self::Http | Self::Https => "bigip-fast-templates/http",
            Self::Tcp => "bigip-fast-templates/tcp",
            Self::Udp => "bigip-fast-templates/udp",
        }
    }

    /// Resource type name served for this template.
    pub fn resource_type(self) -> &'static str {
        match self {
            Self::Http => "bigip_fast_http_app",
            Self::Https => "bigip_fast_https_app",
            Self::Tcp => "bigip_fast_tcp_app",
            Self::Udp => "bigip_fast_udp_app",
        }
    }

    /// The HTTP template names its existing-monitor parameter differently.
    pub fn uses_http_monitor(self) -> bool {
        matches!(self, Self::Http | Self::Https)
    }

    /// Only the HTTPS application carries TLS profiles.
    pub fn supports_tls(self) -> bool {
        self == Self::Https
    }

    /// WAF policy and security logging exist on the HTTP template only.
    pub fn supports_security(self) -> bool {
        matches!(self, Self::Http | Self::Https)
    }

    /// Exclusive option groups checked for this template.
    pub fn groups(self) -> &'static [ExclusiveGroup] {
        if self.supports_tls() {
            TLS_APP_GROUPS
        } else {
            APP_GROUPS
        }
    }
}

/// Disabled, an existing pool, or generated members.
pub const POOL: ExclusiveGroup = ExclusiveGroup::new(
    "pool",
    Some("enable_pool"),
    &["existing_pool", "pool_members"],
    WhenEmpty::Disable,
);

/// Automap unless an existing pool or addresses are given.
pub const SNAT: ExclusiveGroup = ExclusiveGroup::new(
    "snat",
    Some("enable_snat"),
    &["existing_snat_pool", "snat_pool_address"],
    WhenEmpty::Automatic,
);

/// Disabled, an existing monitor, or a generated one.
pub const MONITOR: ExclusiveGroup = ExclusiveGroup::new(
    "monitor",
    Some("enable_monitor"),
    &["existing_monitor", "monitor"],
    WhenEmpty::Disable,
);

/// Client-side TLS must name a profile or a certificate pair when enabled.
pub const TLS_SERVER: ExclusiveGroup = ExclusiveGroup::new(
    "tls server profile",
    Some("enable_tls_server"),
    &["existing_tls_server_profile", "tls_server_profile"],
    WhenEmpty::Reject,
);

/// Server-side TLS follows `enable_tls_client` when no profile is named.
pub const TLS_CLIENT: ExclusiveGroup = ExclusiveGroup::new(
    "tls client profile",
    Some("enable_tls_client"),
    &["existing_tls_client_profile"],
    WhenEmpty::FollowFlag,
);

const APP_GROUPS: &[ExclusiveGroup] = &[POOL, SNAT, MONITOR];
const TLS_APP_GROUPS: &[ExclusiveGroup] = &[POOL, SNAT, MONITOR, TLS_SERVER, TLS_CLIENT];
