//! The BIG-IP provider: dispatches engine calls to resource handlers.
//!
//! [`BigIpProvider`] owns the handler registry, the configured [`Context`]
//! (device client, settings, device locks) and the cancellation token that
//! [`ProviderService::stop`] fires.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::client::BigIpClient;
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::plan::plan_resource;
use crate::resources::{data_sources, resources, Context, DataSource, Resource};
use crate::schema::{Diagnostic, ProviderSchema};
use crate::service::ProviderService;
use crate::types::{ImportedResource, PlanResult};
use crate::validation::validate;

/// F5 BIG-IP / BIG-IQ provider.
pub struct BigIpProvider {
    resources: BTreeMap<&'static str, Box<dyn Resource>>,
    data_sources: BTreeMap<&'static str, Box<dyn DataSource>>,
    context: RwLock<Option<Arc<Context>>>,
    cancel: CancellationToken,
}

impl Default for BigIpProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BigIpProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BigIpProvider")
            .field("resources", &self.resources.keys().collect::<Vec<_>>())
            .field("data_sources", &self.data_sources.keys().collect::<Vec<_>>())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl BigIpProvider {
    /// An unconfigured provider serving every built-in resource type.
    pub fn new() -> Self {
        Self {
            resources: resources().into_iter().map(|r| (r.type_name(), r)).collect(),
            data_sources: data_sources()
                .into_iter()
                .map(|d| (d.type_name(), d))
                .collect(),
            context: RwLock::new(None),
            cancel: CancellationToken::new(),
        }
    }

    fn resource(&self, resource_type: &str) -> Result<&dyn Resource, ProviderError> {
        self.resources
            .get(resource_type)
            .map(|r| &**r)
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))
    }

    fn data_source(&self, data_source_type: &str) -> Result<&dyn DataSource, ProviderError> {
        self.data_sources
            .get(data_source_type)
            .map(|r| &**r)
            .ok_or_else(|| ProviderError::UnknownResource(data_source_type.to_string()))
    }

    async fn context(&self) -> Result<Arc<Context>, ProviderError> {
        self.context.read().await.clone().ok_or_else(|| {
            ProviderError::Configuration("provider has not been configured".into())
        })
    }

    fn log_failure<T>(
        operation: &str,
        type_name: &str,
        result: Result<T, ProviderError>,
    ) -> Result<T, ProviderError> {
        if let Err(e) = &result {
            if e.is_interrupted() {
                warn!(resource_type = type_name, error = %e, "{operation} interrupted");
            } else {
                error!(resource_type = type_name, error = %e, "{operation} failed");
            }
        }
        result
    }
}

#[async_trait::async_trait]
impl ProviderService for BigIpProvider {
    fn schema(&self) -> ProviderSchema {
        let schema = ProviderSchema::new().with_provider_config(ProviderConfig::schema());
        let schema = self
            .resources
            .iter()
            .fold(schema, |s, (name, r)| s.with_resource(*name, r.schema()));
        self.data_sources
            .iter()
            .fold(schema, |s, (name, d)| s.with_data_source(*name, d.schema()))
    }

    #[instrument(skip(self, config), name = "provider.validate_provider_config")]
    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let mut diagnostics = validate(&ProviderConfig::schema(), &config);
        match ProviderConfig::load(&config) {
            Ok(resolved) => diagnostics.extend(resolved.diagnostics()),
            Err(e) => diagnostics.push(e.to_diagnostic()),
        }
        Ok(diagnostics)
    }

    #[instrument(skip(self, config), name = "provider.configure")]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let config = ProviderConfig::load(&config)?;
        let diagnostics = config.diagnostics();
        if diagnostics.iter().any(Diagnostic::is_error) {
            warn!(
                diagnostics = diagnostics.len(),
                "provider configuration is incomplete"
            );
            return Ok(diagnostics);
        }

        let base_url = config.base_url()?;
        let client =
            BigIpClient::connect(base_url.clone(), &config.transport(), &config.credentials()?)
                .await
                .map_err(|e| {
                    error!(device = %base_url, error = %e, "login failed");
                    e
                })?;

        if !config.teem_disable {
            debug!("usage telemetry is enabled but this provider sends none");
        }

        let context = Context::new(client, config, self.cancel.child_token());
        *self.context.write().await = Some(Arc::new(context));
        info!(device = %base_url, "provider configured");
        Ok(diagnostics)
    }

    #[instrument(skip(self), name = "provider.stop")]
    async fn stop(&self) -> Result<(), ProviderError> {
        info!("stopping provider, cancelling in-flight device work");
        self.cancel.cancel();
        Ok(())
    }

    #[instrument(skip(self, config), name = "provider.validate_resource_config")]
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let mut diagnostics = validate(&resource.schema(), &config);
        diagnostics.extend(resource.validate(&config));
        if !diagnostics.is_empty() {
            debug!(resource_type, diagnostics = diagnostics.len(), "configuration has findings");
        }
        Ok(diagnostics)
    }

    #[instrument(skip(self, prior_state, proposed_state, _config), name = "provider.plan")]
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let resource = self.resource(resource_type)?;
        let result = plan_resource(&resource.schema(), prior_state.as_ref(), &proposed_state);
        debug!(
            resource_type,
            changes = result.changes.len(),
            requires_replace = result.requires_replace,
            "plan computed"
        );
        Ok(result)
    }

    #[instrument(skip(self, planned_state), name = "provider.create")]
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let ctx = self.context().await?;
        info!(resource_type, "create");
        let result = resource.create(&ctx, planned_state).await;
        Self::log_failure("create", resource_type, result)
    }

    #[instrument(skip(self, current_state), name = "provider.read")]
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let ctx = self.context().await?;
        let result = resource.read(&ctx, current_state).await;
        let state = Self::log_failure("read", resource_type, result)?;
        if state.is_none() {
            info!(resource_type, "resource no longer exists");
        }
        Ok(state.unwrap_or(Value::Null))
    }

    #[instrument(skip(self, prior_state, planned_state), name = "provider.update")]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let ctx = self.context().await?;
        info!(resource_type, "update");
        let result = resource.update(&ctx, prior_state, planned_state).await;
        Self::log_failure("update", resource_type, result)
    }

    #[instrument(skip(self, current_state), name = "provider.delete")]
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let resource = self.resource(resource_type)?;
        let ctx = self.context().await?;
        info!(resource_type, "delete");
        let result = resource.delete(&ctx, current_state).await;
        Self::log_failure("delete", resource_type, result)
    }

    #[instrument(skip(self), name = "provider.import_resource")]
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let ctx = self.context().await?;
        let result = resource.import(&ctx, id).await;
        let state = Self::log_failure("import", resource_type, result)?;
        Ok(vec![ImportedResource::new(resource_type, state)])
    }

    #[instrument(skip(self, config), name = "provider.validate_data_source_config")]
    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let data_source = self.data_source(data_source_type)?;
        Ok(validate(&data_source.schema(), &config))
    }

    #[instrument(skip(self, config), name = "provider.read_data_source")]
    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let data_source = self.data_source(data_source_type)?;
        let ctx = self.context().await?;
        let result = data_source.read(&ctx, config).await;
        Self::log_failure("data source read", data_source_type, result)
    }
}
