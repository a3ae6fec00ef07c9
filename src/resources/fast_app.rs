use serde_json::{json, Value};
use tracing::{info, warn};

use super::{absent_as_none, read_back, split_app_id, Context, Resource};
use crate::client::ltm::LOAD_BALANCING_MODES;
use crate::declaration::fast::{FastApp, FastAppParams, FastAppState, FastTemplate};
use crate::declaration::{required_attr, strip_nulls};
use crate::error::ProviderError;
use crate::schema::{Attribute, Block, Diagnostic, NestedBlock, Schema};
use crate::validation::validate_groups;

/// `bigip_fast_{http,https,tcp,udp}_app`: a FAST application described by
/// typed attributes.
#[derive(Debug, Clone, Copy)]
pub struct FastAppResource {
    template: FastTemplate,
}

impl FastAppResource {
    /// Handler for the resource type of `template`.
    pub fn new(template: FastTemplate) -> Self {
        Self { template }
    }

    fn to_state(&self, app: &FastApp, prior: &Value) -> Result<Value, ProviderError> {
        let prior: FastAppState = serde_json::from_value(strip_nulls(prior))?;
        Ok(serde_json::to_value(app.to_state(Some(&prior)))?)
    }

    async fn wait_fast_task(&self, ctx: &Context, task_id: &str) -> Result<(), ProviderError> {
        let client = ctx.client();
        ctx.poller()
            .wait(task_id, || client.fast_task(task_id))
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Resource for FastAppResource {
    fn type_name(&self) -> &'static str {
        self.template.resource_type()
    }

    fn schema(&self) -> Schema {
        let mut schema = Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "tenant",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("AS3 tenant the application is deployed to"),
            )
            .with_attribute(
                "application",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("Application name inside the tenant"),
            )
            .with_block(
                "virtual_server",
                NestedBlock::single(
                    Block::new()
                        .with_attribute("ip", Attribute::required_string())
                        .with_attribute("port", Attribute::required_int64()),
                )
                .with_min_items(1),
            )
            .with_attribute("enable_pool", Attribute::optional_bool())
            .with_attribute(
                "existing_pool",
                Attribute::optional_string().with_description("Pool already on the BIG-IP"),
            )
            .with_block(
                "pool_members",
                NestedBlock::list(
                    Block::new()
                        .with_attribute("addresses", Attribute::required_string_list())
                        .with_attribute("port", Attribute::optional_int64().with_default(json!(80)))
                        .with_attribute(
                            "connection_limit",
                            Attribute::optional_int64().with_default(json!(0)),
                        )
                        .with_attribute(
                            "priority_group",
                            Attribute::optional_int64().with_default(json!(0)),
                        )
                        .with_attribute(
                            "share_nodes",
                            Attribute::optional_bool().with_default(json!(true)),
                        ),
                ),
            )
            .with_attribute(
                "load_balancing_mode",
                Attribute::optional_string()
                    .with_allowed_values(LOAD_BALANCING_MODES.iter().copied()),
            )
            .with_attribute(
                "slow_ramp_time",
                Attribute::optional_int64().with_description("Seconds"),
            )
            .with_attribute("enable_snat", Attribute::optional_bool())
            .with_attribute("existing_snat_pool", Attribute::optional_string())
            .with_attribute("snat_pool_address", Attribute::optional_string_list())
            .with_attribute("enable_monitor", Attribute::optional_bool())
            .with_attribute("existing_monitor", Attribute::optional_string())
            .with_block(
                "monitor",
                NestedBlock::single(
                    Block::new()
                        .with_attribute(
                            "interval",
                            Attribute::optional_int64().with_default(json!(30)),
                        )
                        .with_attribute("send_string", Attribute::optional_string())
                        .with_attribute("response", Attribute::optional_string())
                        .with_attribute("monitor_auth", Attribute::optional_bool())
                        .with_attribute("username", Attribute::optional_string())
                        .with_attribute("password", Attribute::optional_string().sensitive()),
                ),
            );

        if self.template.supports_tls() {
            schema = schema
                .with_attribute("enable_tls_server", Attribute::optional_bool())
                .with_attribute("existing_tls_server_profile", Attribute::optional_string())
                .with_block(
                    "tls_server_profile",
                    NestedBlock::single(
                        Block::new()
                            .with_attribute("tls_cert_name", Attribute::required_string())
                            .with_attribute("tls_key_name", Attribute::required_string()),
                    ),
                )
                .with_attribute("enable_tls_client", Attribute::optional_bool())
                .with_attribute("existing_tls_client_profile", Attribute::optional_string());
        }

        if self.template.supports_security() {
            schema = schema
                .with_attribute("existing_waf_security_policy", Attribute::optional_string())
                .with_attribute("security_log_profiles", Attribute::optional_string_list());
        }

        schema
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        validate_groups(self.template.groups(), &strip_nulls(config))
    }

    async fn create(&self, ctx: &Context, planned: Value) -> Result<Value, ProviderError> {
        let app = FastApp::from_state(self.template, &planned)?;
        let params = serde_json::to_value(app.to_params())?;
        let client = ctx.client();

        info!(app = %app.id(), template = self.template.template_name(), "creating FAST application");
        ctx.exclusive(client, async {
            let task_id = client
                .fast_create(self.template.template_name(), &params)
                .await?;
            self.wait_fast_task(ctx, &task_id).await
        })
        .await?;

        let state = self.to_state(&app, &planned)?;
        read_back(self, ctx, state).await
    }

    async fn read(&self, ctx: &Context, current: Value) -> Result<Option<Value>, ProviderError> {
        let tenant = required_attr(&current, "tenant")?;
        let application = required_attr(&current, "application")?;
        let id = format!("{tenant}/{application}");

        let Some(document) =
            absent_as_none(ctx.client().fast_application(tenant, application).await, &id)?
        else {
            return Ok(None);
        };

        if let Some(template) = FastAppParams::template_of(&document) {
            if template != self.template.template_name() {
                warn!(app = %id, template, "application was rendered from another template");
            }
        }

        let params = FastAppParams::from_application(&document)?;
        let app = FastApp::from_params(self.template, &params);
        self.to_state(&app, &current).map(Some)
    }

    async fn update(
        &self,
        ctx: &Context,
        _prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let app = FastApp::from_state(self.template, &planned)?;
        let params = serde_json::to_value(app.to_params())?;
        let client = ctx.client();

        info!(app = %app.id(), "updating FAST application");
        ctx.exclusive(client, async {
            let task_id = client
                .fast_update(&app.tenant, &app.application, &params)
                .await?;
            self.wait_fast_task(ctx, &task_id).await
        })
        .await?;

        let state = self.to_state(&app, &planned)?;
        read_back(self, ctx, state).await
    }

    async fn delete(&self, ctx: &Context, current: Value) -> Result<(), ProviderError> {
        let tenant = required_attr(&current, "tenant")?;
        let application = required_attr(&current, "application")?;
        let client = ctx.client();

        let deleted = ctx
            .exclusive(client, async {
                let Some(task_id) = client.fast_delete(tenant, application).await? else {
                    return Ok(());
                };
                self.wait_fast_task(ctx, &task_id).await
            })
            .await;

        match absent_as_none(deleted, &format!("{tenant}/{application}"))? {
            Some(()) => info!(tenant, application, "FAST application deleted"),
            None => warn!(tenant, application, "FAST application was already gone"),
        }
        Ok(())
    }

    async fn import(&self, ctx: &Context, id: &str) -> Result<Value, ProviderError> {
        let (tenant, application) = split_app_id(id)?;
        self.read(ctx, json!({ "tenant": tenant, "application": application }))
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("FAST application {id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate;

    #[test]
    fn test_schema_per_template() {
        let https = FastAppResource::new(FastTemplate::Https).schema();
        assert!(https.attribute("existing_tls_server_profile").is_some());
        assert!(https.attribute("existing_waf_security_policy").is_some());

        let udp = FastAppResource::new(FastTemplate::Udp).schema();
        assert!(udp.attribute("existing_tls_server_profile").is_none());
        assert!(udp.attribute("security_log_profiles").is_none());
        assert!(udp.attribute("tenant").unwrap().force_new);
    }

    #[test]
    fn test_validate_reports_group_conflicts() {
        let resource = FastAppResource::new(FastTemplate::Tcp);
        let config = json!({
            "tenant": "t1",
            "application": "a1",
            "virtual_server": [{"ip": "10.1.1.1", "port": 8080}],
            "existing_pool": "/Common/p1",
            "pool_members": [{"addresses": ["10.1.1.2"], "port": 80}],
            "enable_monitor": false,
            "existing_monitor": "/Common/tcp",
        });
        let diagnostics = resource.validate(&config);
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("pool_members"));
        assert_eq!(diagnostics[1].attribute.as_deref(), Some("existing_monitor"));

        assert!(validate(&resource.schema(), &config).is_empty());
    }

    #[test]
    fn test_schema_rejects_unknown_lb_mode() {
        let schema = FastAppResource::new(FastTemplate::Http).schema();
        let diagnostics = validate(
            &schema,
            &json!({
                "tenant": "t1",
                "application": "a1",
                "virtual_server": [{"ip": "10.1.1.1", "port": 80}],
                "load_balancing_mode": "fastest",
            }),
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("load_balancing_mode"));
    }
}
