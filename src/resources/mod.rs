//! Resource and data source handlers.
//!
//! Each handler translates between resource state (a JSON object keyed by
//! attribute name) and device calls. Handlers never decide how errors are
//! reported; they return [`ProviderError`] and let the dispatcher turn it
//! into diagnostics.

mod as3;
mod bigiq;
mod bigiq_as3;
mod bigiq_license;
mod fast_app;
mod fast_application;
mod fast_template;
mod ifile;
mod ltm_pool;
mod onboarding;
mod vcmp_guest;

use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::client::BigIpClient;
use crate::config::ProviderConfig;
use crate::declaration::fast::FastTemplate;
use crate::error::ProviderError;
use crate::lock::LockRegistry;
use crate::poller::TaskPoller;
use crate::schema::{Diagnostic, Schema};

pub use as3::As3Resource;
pub use bigiq_as3::BigIqAs3Resource;
pub use bigiq_license::BigIqLicenseResource;
pub use fast_app::FastAppResource;
pub use fast_application::FastApplicationResource;
pub use fast_template::FastTemplateResource;
pub use ifile::SysIFileResource;
pub use ltm_pool::{LtmPoolDataSource, LtmPoolResource};
pub use onboarding::OnboardingResource;
pub use vcmp_guest::VcmpGuestResource;

/// What a configured provider hands to its handlers.
#[derive(Debug)]
pub struct Context {
    client: BigIpClient,
    config: ProviderConfig,
    locks: LockRegistry,
    cancel: CancellationToken,
}

impl Context {
    /// Context for one configured device.
    pub fn new(client: BigIpClient, config: ProviderConfig, cancel: CancellationToken) -> Self {
        let locks = LockRegistry::new(config.lock_timeout());
        Self {
            client,
            config,
            locks,
            cancel,
        }
    }

    /// Client for the configured BIG-IP.
    pub fn client(&self) -> &BigIpClient {
        &self.client
    }

    /// Resolved provider configuration.
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Task poller with the configured backoff and timeout.
    pub fn poller(&self) -> TaskPoller {
        TaskPoller::new(self.config.poll(), self.cancel.clone())
    }

    /// Task poller with a resource-specific overall timeout.
    pub fn poller_with_timeout(&self, timeout: Duration) -> TaskPoller {
        TaskPoller::new(self.config.poll().with_timeout(timeout), self.cancel.clone())
    }

    /// Run a declarative submission (and the poll that follows it) inside
    /// the device's critical section.
    pub async fn exclusive<T, F>(&self, device: &BigIpClient, work: F) -> Result<T, ProviderError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        let lock = self.locks.lock_for(&device.device_key()).await;
        lock.run(&self.cancel, work).await
    }
}

/// CRUD handler for one resource type.
#[async_trait::async_trait]
pub trait Resource: Send + Sync {
    /// Type name, e.g. `bigip_as3`.
    fn type_name(&self) -> &'static str;

    /// Attribute schema.
    fn schema(&self) -> Schema;

    /// Rules the schema cannot express (exclusive option groups).
    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let _ = config;
        Vec::new()
    }

    /// Create the remote object; returns the state read back after creation.
    async fn create(&self, ctx: &Context, planned: Value) -> Result<Value, ProviderError>;

    /// Current state, or `None` when the remote object is gone.
    async fn read(&self, ctx: &Context, current: Value) -> Result<Option<Value>, ProviderError>;

    /// Bring the remote object to `planned`; returns the state read back.
    async fn update(&self, ctx: &Context, prior: Value, planned: Value)
        -> Result<Value, ProviderError>;

    /// Remove the remote object. One that is already gone is not an error.
    async fn delete(&self, ctx: &Context, current: Value) -> Result<(), ProviderError>;

    /// Read an existing object by its ID.
    async fn import(&self, ctx: &Context, id: &str) -> Result<Value, ProviderError> {
        let _ = (ctx, id);
        Err(ProviderError::Unimplemented(format!(
            "import is not supported for {}",
            self.type_name()
        )))
    }
}

/// Read-only lookup.
#[async_trait::async_trait]
pub trait DataSource: Send + Sync {
    /// Type name, e.g. `bigip_ltm_pool`.
    fn type_name(&self) -> &'static str;

    /// Attribute schema.
    fn schema(&self) -> Schema;

    /// Look the object up from `config`.
    async fn read(&self, ctx: &Context, config: Value) -> Result<Value, ProviderError>;
}

/// Every resource type the provider serves.
pub fn resources() -> Vec<Box<dyn Resource>> {
    vec![
        Box::new(FastAppResource::new(FastTemplate::Http)),
        Box::new(FastAppResource::new(FastTemplate::Https)),
        Box::new(FastAppResource::new(FastTemplate::Tcp)),
        Box::new(FastAppResource::new(FastTemplate::Udp)),
        Box::new(FastApplicationResource),
        Box::new(FastTemplateResource),
        Box::new(As3Resource),
        Box::new(BigIqAs3Resource),
        Box::new(OnboardingResource),
        Box::new(LtmPoolResource),
        Box::new(SysIFileResource),
        Box::new(VcmpGuestResource),
        Box::new(BigIqLicenseResource),
    ]
}

/// Every data source type the provider serves.
pub fn data_sources() -> Vec<Box<dyn DataSource>> {
    vec![Box::new(LtmPoolDataSource)]
}

/// Map "the object is gone" errors to `None`.
pub(crate) fn absent_as_none<T>(
    result: Result<T, ProviderError>,
    what: &str,
) -> Result<Option<T>, ProviderError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.indicates_absence() => {
            info!(object = what, "remote object not found, clearing state");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Read after a create or update; the object must be there.
pub(crate) async fn read_back(
    resource: &(impl Resource + ?Sized),
    ctx: &Context,
    state: Value,
) -> Result<Value, ProviderError> {
    resource.read(ctx, state).await?.ok_or_else(|| {
        ProviderError::Internal(format!(
            "{} was not found right after it was written",
            resource.type_name()
        ))
    })
}

/// Split an import ID of the form `tenant/application`.
pub(crate) fn split_app_id(id: &str) -> Result<(String, String), ProviderError> {
    match id.split_once('/') {
        Some((tenant, app)) if !tenant.is_empty() && !app.is_empty() && !app.contains('/') => {
            Ok((tenant.to_string(), app.to_string()))
        }
        _ => Err(ProviderError::Validation(format!(
            "expected an ID of the form tenant/application, got {id:?}"
        ))),
    }
}
