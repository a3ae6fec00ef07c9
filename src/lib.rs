//! BIG-IP Provider
//!
//! An infrastructure provider for F5 BIG-IP and BIG-IQ. It exposes the
//! declarative device services as resources: FAST applications, AS3
//! declarations (directly or through a BIG-IQ), Declarative Onboarding,
//! plain LTM pools, FAST template sets, iFiles, vCMP guests and BIG-IQ
//! license assignments.
//!
//! # Overview
//!
//! The crate provides:
//!
//! - **ProviderService trait**: the engine-facing protocol (schema, configure,
//!   plan, create, read, update, delete, import, data sources)
//! - **BigIpProvider**: the implementation dispatching to resource handlers
//! - **Declaration transcoding**: typed FAST application parameters and AS3 /
//!   DO document filtering
//! - **Task polling**: bounded, cancellable waits on asynchronous device tasks
//! - **Device locks**: one declarative submission per device at a time
//! - **Schema and validation**: attribute schemas, exclusive option groups,
//!   plan computation with JSON diff suppression
//! - **Logging**: integration with `tracing`
//!
//! # Quick Start
//!
//! ```ignore
//! use bigip_provider::{BigIpProvider, ProviderService};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     bigip_provider::init_logging();
//!
//!     let provider = BigIpProvider::new();
//!     provider
//!         .configure(json!({
//!             "address": "10.1.1.4",
//!             "username": "admin",
//!             "password": "secret",
//!         }))
//!         .await?;
//!
//!     let state = provider
//!         .create(
//!             "bigip_ltm_pool",
//!             json!({"name": "/Common/web", "monitors": ["/Common/http"]}),
//!         )
//!         .await?;
//!     println!("{state}");
//!     Ok(())
//! }
//! ```
//!
//! # Configuration
//!
//! Provider settings come from the provider block, falling back to the
//! `BIGIP_*` environment variables (`BIGIP_HOST`, `BIGIP_USER`,
//! `BIGIP_PASSWORD`, `BIGIP_PORT`, ...). See [`config::ProviderConfig`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod declaration;
pub mod diff;
pub mod error;
pub mod lock;
pub mod logging;
pub mod plan;
pub mod poller;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod service;
pub mod testing;
pub mod types;
pub mod validation;

// Re-export main types at crate root
pub use config::ProviderConfig;
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::BigIpProvider;
pub use schema::ProviderSchema;
pub use service::ProviderService;
pub use types::{AttributeChange, ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities};
pub use validation::{is_valid, validate, validate_result};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
