use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::{absent_as_none, read_back, Context, Resource};
use crate::client::BigIpClient;
use crate::declaration::as3::{
    applications_for_submission, reconcile_applications, reconcile_tenants, split_list,
    tenants_for_submission,
};
use crate::declaration::{parse_document, strip_nulls};
use crate::error::ProviderError;
use crate::schema::{Attribute, DiffSuppress, Schema};

/// `bigip_as3`: an AS3 declaration, managed per tenant or, when
/// `tenant_name` is set, per application inside one tenant.
#[derive(Debug, Clone, Copy, Default)]
pub struct As3Resource;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct As3State {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    as3_json: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tenant_filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tenant_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tenant_list: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    application_list: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    task_id: Option<String>,
    per_app_mode: bool,
}

impl As3State {
    fn from_value(value: &Value) -> Result<Self, ProviderError> {
        Ok(serde_json::from_value(strip_nulls(value))?)
    }

    fn per_app_tenant(&self) -> Option<&str> {
        self.tenant_name.as_deref().filter(|t| !t.is_empty())
    }

    fn managed_tenants(&self) -> Vec<String> {
        self.tenant_list.as_deref().map(split_list).unwrap_or_default()
    }

    fn managed_applications(&self) -> Vec<String> {
        self.application_list
            .as_deref()
            .map(split_list)
            .unwrap_or_default()
    }
}

/// What a submission will touch.
#[derive(Debug)]
enum Target {
    Tenants {
        tenants: Vec<String>,
        filtered: bool,
    },
    Applications {
        tenant: String,
        applications: Vec<String>,
    },
}

impl Target {
    fn resolve(state: &As3State, document: &Value) -> Result<Self, ProviderError> {
        if let Some(tenant) = state.per_app_tenant() {
            return Ok(Self::Applications {
                tenant: tenant.to_string(),
                applications: applications_for_submission(document)?,
            });
        }

        let declared = tenants_for_submission(document)?;
        match state.tenant_filter.as_deref().map(split_list) {
            Some(filter) if !filter.is_empty() => {
                if let Some(missing) = filter.iter().find(|t| !declared.contains(t)) {
                    return Err(ProviderError::Validation(format!(
                        "tenant_filter names {missing}, which as3_json does not declare"
                    )));
                }
                Ok(Self::Tenants {
                    tenants: filter,
                    filtered: true,
                })
            }
            _ => Ok(Self::Tenants {
                tenants: declared,
                filtered: false,
            }),
        }
    }

    fn record(&self, state: &mut As3State) {
        match self {
            Self::Tenants { tenants, .. } => {
                let list = tenants.join(",");
                state.id = Some(list.clone());
                state.tenant_list = Some(list);
                state.application_list = None;
                state.per_app_mode = false;
            }
            Self::Applications {
                tenant,
                applications,
            } => {
                state.id = Some(tenant.clone());
                state.tenant_list = Some(tenant.clone());
                state.application_list = Some(applications.join(","));
                state.per_app_mode = true;
            }
        }
    }
}

impl As3Resource {
    async fn wait(&self, ctx: &Context, task_id: &str) -> Result<(), ProviderError> {
        let client = ctx.client();
        ctx.poller()
            .wait(task_id, || client.as3_task(task_id))
            .await
            .map(drop)
    }

    async fn submit(
        &self,
        ctx: &Context,
        client: &BigIpClient,
        target: &Target,
        document: &Value,
    ) -> Result<String, ProviderError> {
        let task_id = match target {
            Target::Tenants {
                tenants,
                filtered: true,
            } => client.as3_post_tenants(&tenants.join(","), document).await?,
            Target::Tenants { .. } => client.as3_post(document).await?,
            Target::Applications { tenant, .. } => {
                client.as3_post_applications(tenant, document).await?
            }
        };
        debug!(task_id = %task_id, "AS3 declaration accepted");
        self.wait(ctx, &task_id).await?;
        Ok(task_id)
    }

    async fn remove_tenants(&self, ctx: &Context, tenants: &[String]) -> Result<(), ProviderError> {
        if tenants.is_empty() {
            return Ok(());
        }
        let list = tenants.join(",");
        info!(tenants = %list, "removing AS3 tenants");
        match ctx.client().as3_delete_tenants(&list).await? {
            Some(task_id) => self.wait(ctx, &task_id).await,
            None => Ok(()),
        }
    }

    async fn remove_applications(
        &self,
        ctx: &Context,
        tenant: &str,
        applications: &[String],
    ) -> Result<(), ProviderError> {
        for application in applications {
            info!(tenant, application = %application, "removing AS3 application");
            if let Some(task_id) = ctx
                .client()
                .as3_delete_application(tenant, application)
                .await?
            {
                self.wait(ctx, &task_id).await?;
            }
        }
        Ok(())
    }

    fn to_value(state: &As3State) -> Result<Value, ProviderError> {
        Ok(serde_json::to_value(state)?)
    }
}

#[async_trait::async_trait]
impl Resource for As3Resource {
    fn type_name(&self) -> &'static str {
        "bigip_as3"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "as3_json",
                Attribute::required_string()
                    .with_diff_suppress(DiffSuppress::Json)
                    .with_description("AS3 declaration as JSON"),
            )
            .with_attribute(
                "tenant_filter",
                Attribute::optional_string()
                    .with_description("Comma-separated tenants of as3_json to deploy and track"),
            )
            .with_attribute(
                "tenant_name",
                Attribute::optional_string()
                    .with_force_new()
                    .with_description("Deploy the applications of as3_json into this tenant"),
            )
            .with_attribute("tenant_list", Attribute::computed_string())
            .with_attribute("application_list", Attribute::computed_string())
            .with_attribute("task_id", Attribute::computed_string())
            .with_attribute("per_app_mode", Attribute::computed_bool())
    }

    async fn create(&self, ctx: &Context, planned: Value) -> Result<Value, ProviderError> {
        let mut state = As3State::from_value(&planned)?;
        let document = parse_document("as3_json", &state.as3_json)?;
        let target = Target::resolve(&state, &document)?;
        let client = ctx.client();

        let task_id = ctx
            .exclusive(client, self.submit(ctx, client, &target, &document))
            .await?;

        target.record(&mut state);
        state.task_id = Some(task_id);
        info!(id = ?state.id, per_app = state.per_app_mode, "AS3 declaration deployed");
        read_back(self, ctx, Self::to_value(&state)?).await
    }

    async fn read(&self, ctx: &Context, current: Value) -> Result<Option<Value>, ProviderError> {
        let mut state = As3State::from_value(&current)?;
        let user = if state.as3_json.trim().is_empty() {
            // Imported: keep the device's metadata members.
            json!({
                "class": "AS3",
                "action": "deploy",
                "persist": true,
                "declaration": {"class": "ADC", "schemaVersion": "", "updateMode": ""}
            })
        } else {
            parse_document("as3_json", &state.as3_json)?
        };

        let reconciled = if state.per_app_mode {
            let Some(tenant) = state.tenant_list.clone() else {
                return Err(ProviderError::Internal("per-application state without tenant".into()));
            };
            let Some(device) = absent_as_none(ctx.client().as3_get(&tenant).await, &tenant)? else {
                return Ok(None);
            };
            reconcile_applications(&user, &device, &tenant, &state.managed_applications())
        } else {
            let managed = state.managed_tenants();
            if managed.is_empty() {
                return Err(ProviderError::Internal("AS3 state tracks no tenant".into()));
            }
            let list = managed.join(",");
            let Some(device) = absent_as_none(ctx.client().as3_get(&list).await, &list)? else {
                return Ok(None);
            };
            reconcile_tenants(&user, &device, &managed)
        };

        match reconciled {
            Some(document) => {
                state.as3_json = serde_json::to_string(&document)?;
                Self::to_value(&state).map(Some)
            }
            None => {
                info!(id = ?state.id, "AS3 declaration no longer on the device");
                Ok(None)
            }
        }
    }

    async fn update(
        &self,
        ctx: &Context,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let prior = As3State::from_value(&prior)?;
        let mut state = As3State::from_value(&planned)?;
        let document = parse_document("as3_json", &state.as3_json)?;
        let target = Target::resolve(&state, &document)?;
        let client = ctx.client();

        let task_id = ctx
            .exclusive(client, async {
                let task_id = self.submit(ctx, client, &target, &document).await?;
                match &target {
                    Target::Tenants { tenants, .. } if !prior.per_app_mode => {
                        let removed: Vec<String> = prior
                            .managed_tenants()
                            .into_iter()
                            .filter(|t| !tenants.contains(t))
                            .collect();
                        self.remove_tenants(ctx, &removed).await?;
                    }
                    Target::Applications {
                        tenant,
                        applications,
                    } if prior.per_app_mode => {
                        let removed: Vec<String> = prior
                            .managed_applications()
                            .into_iter()
                            .filter(|a| !applications.contains(a))
                            .collect();
                        self.remove_applications(ctx, tenant, &removed).await?;
                    }
                    _ => warn!("AS3 management mode changed; previous objects left in place"),
                }
                Ok(task_id)
            })
            .await?;

        target.record(&mut state);
        state.task_id = Some(task_id);
        read_back(self, ctx, Self::to_value(&state)?).await
    }

    async fn delete(&self, ctx: &Context, current: Value) -> Result<(), ProviderError> {
        let state = As3State::from_value(&current)?;
        let client = ctx.client();

        let deleted = ctx
            .exclusive(client, async {
                if state.per_app_mode {
                    let tenant = state.tenant_list.clone().unwrap_or_default();
                    self.remove_applications(ctx, &tenant, &state.managed_applications())
                        .await
                } else {
                    self.remove_tenants(ctx, &state.managed_tenants()).await
                }
            })
            .await;

        if absent_as_none(deleted, "AS3 declaration")?.is_none() {
            warn!(id = ?state.id, "AS3 declaration was already gone");
        }
        Ok(())
    }

    async fn import(&self, ctx: &Context, id: &str) -> Result<Value, ProviderError> {
        let tenants = split_list(id);
        if tenants.is_empty() {
            return Err(ProviderError::Validation(
                "expected a comma-separated tenant list".into(),
            ));
        }
        let state = As3State {
            id: Some(tenants.join(",")),
            tenant_list: Some(tenants.join(",")),
            ..As3State::default()
        };
        self.read(ctx, Self::to_value(&state)?)
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("AS3 tenants {id}")))
    }
}
