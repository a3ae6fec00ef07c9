use serde_json::{json, Map, Value};
use tracing::{info, warn};

use super::{absent_as_none, read_back, split_app_id, Context, Resource};
use crate::declaration::fast::FastAppParams;
use crate::declaration::{parse_document, required_attr, string_attr};
use crate::error::ProviderError;
use crate::schema::{Attribute, DiffSuppress, Schema};

/// `bigip_fast_application`: any FAST template with raw JSON parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct FastApplicationResource;

/// Parameters document plus the tenant and application it names.
fn parameters(state: &Value) -> Result<(Value, String, String), ProviderError> {
    let params = parse_document("fast_json", required_attr(state, "fast_json")?)?;
    let names = |key: &str| {
        params
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ProviderError::Validation(format!("fast_json must set {key}")))
    };
    let tenant = names("tenant_name")?;
    let application = names("app_name")?;
    Ok((params, tenant, application))
}

/// The device's parameter view, cut down to the parameters the user wrote.
///
/// Templates report every parameter with its default; keeping only the
/// user's keys avoids a permanent diff. With no user document (import)
/// the whole view is kept.
fn user_view(view: &Map<String, Value>, user: Option<&Value>) -> Value {
    match user.and_then(Value::as_object) {
        Some(user) => Value::Object(
            user.keys()
                .filter_map(|key| view.get(key).map(|v| (key.clone(), v.clone())))
                .collect(),
        ),
        None => Value::Object(view.clone()),
    }
}

impl FastApplicationResource {
    async fn wait(&self, ctx: &Context, task_id: &str) -> Result<(), ProviderError> {
        let client = ctx.client();
        ctx.poller()
            .wait(task_id, || client.fast_task(task_id))
            .await
            .map(drop)
    }
}

#[async_trait::async_trait]
impl Resource for FastApplicationResource {
    fn type_name(&self) -> &'static str {
        "bigip_fast_application"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "template",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("Template set path, e.g. examples/simple_http"),
            )
            .with_attribute(
                "fast_json",
                Attribute::required_string()
                    .with_diff_suppress(DiffSuppress::Json)
                    .with_description("Template parameters as JSON"),
            )
            .with_attribute("tenant", Attribute::computed_string())
            .with_attribute("application", Attribute::computed_string())
    }

    async fn create(&self, ctx: &Context, planned: Value) -> Result<Value, ProviderError> {
        let template = required_attr(&planned, "template")?;
        let (params, tenant, application) = parameters(&planned)?;
        let client = ctx.client();

        info!(template, tenant = %tenant, application = %application, "creating FAST application");
        ctx.exclusive(client, async {
            let task_id = client.fast_create(template, &params).await?;
            self.wait(ctx, &task_id).await
        })
        .await?;

        let mut state = planned.clone();
        state["id"] = json!(format!("{tenant}/{application}"));
        state["tenant"] = json!(tenant);
        state["application"] = json!(application);
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

        let view = document
            .pointer("/constants/fast/view")
            .and_then(Value::as_object)
            .ok_or_else(|| {
                ProviderError::Internal(format!("application {id} has no parameter view"))
            })?;
        let user = string_attr(&current, "fast_json")
            .map(|raw| parse_document("fast_json", raw))
            .transpose()?;

        let mut state = current.clone();
        state["id"] = json!(id);
        state["fast_json"] = json!(serde_json::to_string(&user_view(view, user.as_ref()))?);
        match FastAppParams::template_of(&document) {
            Some(template) => state["template"] = json!(template),
            None => warn!(app = %id, "application document does not name its template"),
        }
        Ok(Some(state))
    }

    async fn update(
        &self,
        ctx: &Context,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let (params, tenant, application) = parameters(&planned)?;
        if string_attr(&prior, "tenant") != Some(tenant.as_str())
            || string_attr(&prior, "application") != Some(application.as_str())
        {
            return Err(ProviderError::Validation(
                "tenant_name and app_name cannot change; recreate the application".into(),
            ));
        }
        let client = ctx.client();

        info!(tenant = %tenant, application = %application, "updating FAST application");
        ctx.exclusive(client, async {
            let task_id = client.fast_update(&tenant, &application, &params).await?;
            self.wait(ctx, &task_id).await
        })
        .await?;

        let mut state = planned.clone();
        state["id"] = json!(format!("{tenant}/{application}"));
        state["tenant"] = json!(tenant);
        state["application"] = json!(application);
        read_back(self, ctx, state).await
    }

    async fn delete(&self, ctx: &Context, current: Value) -> Result<(), ProviderError> {
        let tenant = required_attr(&current, "tenant")?;
        let application = required_attr(&current, "application")?;
        let client = ctx.client();

        let deleted = ctx
            .exclusive(client, async {
                match client.fast_delete(tenant, application).await? {
                    Some(task_id) => self.wait(ctx, &task_id).await,
                    None => Ok(()),
                }
            })
            .await;
        if absent_as_none(deleted, &format!("{tenant}/{application}"))?.is_none() {
            warn!(tenant, application, "FAST application was already gone");
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
