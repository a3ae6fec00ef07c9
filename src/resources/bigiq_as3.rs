use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::bigiq::BigIqLogin;
use super::{absent_as_none, read_back, Context, Resource};
use crate::client::BigIpClient;
use crate::declaration::as3::{
    declaration_for_target, empty_tenants, reconcile_tenants, split_list, target_of, tenants,
    tenants_for_submission,
};
use crate::declaration::{parse_document, strip_nulls};
use crate::error::ProviderError;
use crate::schema::{Attribute, DiffSuppress, Schema};

/// `bigip_bigiq_as3`: an AS3 declaration deployed to a BIG-IP through a
/// BIG-IQ.
#[derive(Debug, Clone, Copy, Default)]
pub struct BigIqAs3Resource;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct BigIqState {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(flatten)]
    login: BigIqLogin,
    as3_json: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tenant_list: Option<String>,
}

impl BigIqState {
    fn from_value(value: &Value) -> Result<Self, ProviderError> {
        let state: Self = serde_json::from_value(strip_nulls(value))?;
        state.login.check()?;
        Ok(state)
    }

    fn managed_tenants(&self) -> Vec<String> {
        self.tenant_list.as_deref().map(split_list).unwrap_or_default()
    }
}

/// The declaration to submit, with tenants that were dropped since the
/// last apply added back empty so the BIG-IQ removes them.
fn with_removed_tenants(document: &Value, removed: &[String]) -> Value {
    if removed.is_empty() {
        return document.clone();
    }
    let mut document = document.clone();
    let adc = if document.get("declaration").is_some() {
        &mut document["declaration"]
    } else {
        &mut document
    };
    if let Some(map) = adc.as_object_mut() {
        for tenant in removed {
            map.insert(tenant.clone(), json!({ "class": "Tenant" }));
        }
    }
    document
}

impl BigIqAs3Resource {
    async fn submit(
        &self,
        ctx: &Context,
        bigiq: &BigIpClient,
        document: &Value,
    ) -> Result<String, ProviderError> {
        ctx.exclusive(bigiq, async {
            let task_id = bigiq.as3_post(document).await?;
            debug!(task_id = %task_id, "BIG-IQ accepted the declaration");
            ctx.poller()
                .wait(&task_id, || bigiq.as3_task(&task_id))
                .await?;
            Ok(task_id)
        })
        .await
    }

    fn prepare(state: &BigIqState) -> Result<(Value, Vec<String>), ProviderError> {
        let document = parse_document("as3_json", &state.as3_json)?;
        if target_of(&document).is_none() {
            return Err(ProviderError::Validation(
                "as3_json must name the BIG-IP in declaration.target".into(),
            ));
        }
        let tenants = tenants_for_submission(&document)?;
        Ok((document, tenants))
    }
}

#[async_trait::async_trait]
impl Resource for BigIqAs3Resource {
    fn type_name(&self) -> &'static str {
        "bigip_bigiq_as3"
    }

    fn schema(&self) -> Schema {
        BigIqLogin::with_attributes(Schema::v0())
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "as3_json",
                Attribute::required_string()
                    .with_diff_suppress(DiffSuppress::Json)
                    .with_description("AS3 declaration naming its target BIG-IP"),
            )
            .with_attribute("tenant_list", Attribute::computed_string())
    }

    async fn create(&self, ctx: &Context, planned: Value) -> Result<Value, ProviderError> {
        let mut state = BigIqState::from_value(&planned)?;
        let (document, tenants) = Self::prepare(&state)?;
        let bigiq = state.login.connect(ctx).await?;

        info!(tenants = %tenants.join(","), "deploying AS3 through BIG-IQ");
        self.submit(ctx, &bigiq, &document).await?;

        let list = tenants.join(",");
        state.id = Some(list.clone());
        state.tenant_list = Some(list);
        read_back(self, ctx, serde_json::to_value(&state)?).await
    }

    async fn read(&self, ctx: &Context, current: Value) -> Result<Option<Value>, ProviderError> {
        let mut state = BigIqState::from_value(&current)?;
        let user = parse_document("as3_json", &state.as3_json)?;
        let Some(target) = target_of(&user).map(str::to_string) else {
            return Err(ProviderError::Validation(
                "as3_json must name the BIG-IP in declaration.target".into(),
            ));
        };
        let managed = state.managed_tenants();

        let bigiq = state.login.connect(ctx).await?;
        let Some(listing) = absent_as_none(bigiq.as3_get_all().await, "BIG-IQ declarations")? else {
            return Ok(None);
        };
        let Some(deployed) = declaration_for_target(&listing, &target) else {
            info!(target = %target, "BIG-IQ has no declaration for the target");
            return Ok(None);
        };

        match reconcile_tenants(&user, deployed, &managed) {
            Some(document) => {
                state.as3_json = serde_json::to_string(&document)?;
                Ok(Some(serde_json::to_value(&state)?))
            }
            None => Ok(None),
        }
    }

    async fn update(
        &self,
        ctx: &Context,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let prior = BigIqState::from_value(&prior)?;
        let mut state = BigIqState::from_value(&planned)?;
        let (document, tenants) = Self::prepare(&state)?;

        let removed: Vec<String> = prior
            .managed_tenants()
            .into_iter()
            .filter(|t| !tenants.contains(t))
            .collect();
        if !removed.is_empty() {
            info!(tenants = %removed.join(","), "removing tenants through BIG-IQ");
        }

        let bigiq = state.login.connect(ctx).await?;
        self.submit(ctx, &bigiq, &with_removed_tenants(&document, &removed))
            .await?;

        let list = tenants.join(",");
        state.id = Some(list.clone());
        state.tenant_list = Some(list);
        read_back(self, ctx, serde_json::to_value(&state)?).await
    }

    async fn delete(&self, ctx: &Context, current: Value) -> Result<(), ProviderError> {
        let state = BigIqState::from_value(&current)?;
        let document = parse_document("as3_json", &state.as3_json)?;
        if tenants(&document).is_empty() {
            warn!("BIG-IQ declaration has no tenant, nothing to remove");
            return Ok(());
        }

        let bigiq = state.login.connect(ctx).await?;
        let deleted = self.submit(ctx, &bigiq, &empty_tenants(&document)).await;
        if absent_as_none(deleted, "BIG-IQ declaration")?.is_none() {
            warn!(id = ?state.id, "BIG-IQ declaration was already gone");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn planned(as3_json: &str) -> Value {
        json!({
            "bigiq_address": "10.0.0.5",
            "bigiq_user": "admin",
            "bigiq_password": "secret",
            "bigiq_port": null,
            "as3_json": as3_json,
        })
    }

    #[test]
    fn test_state_requires_connection_attributes() {
        let err = BigIqState::from_value(&json!({"bigiq_address": "10.0.0.5"})).unwrap_err();
        assert_eq!(err.message(), "bigiq_user is required");
        assert!(BigIqState::from_value(&planned("{}")).is_ok());
    }

    #[test]
    fn test_prepare_requires_target() {
        let state = BigIqState::from_value(&planned(
            r#"{"class":"AS3","declaration":{"class":"ADC","t1":{"class":"Tenant"}}}"#,
        ))
        .unwrap();
        assert!(BigIqAs3Resource::prepare(&state).is_err());

        let state = BigIqState::from_value(&planned(
            r#"{"class":"AS3","declaration":{"class":"ADC","target":{"address":"10.1.1.9"},"t1":{"class":"Tenant"}}}"#,
        ))
        .unwrap();
        let (_, tenants) = BigIqAs3Resource::prepare(&state).unwrap();
        assert_eq!(tenants, vec!["t1"]);
    }

    #[test]
    fn test_removed_tenants_are_emptied() {
        let document = json!({
            "class": "AS3",
            "declaration": {"class": "ADC", "t1": {"class": "Tenant", "app": {"class": "Application"}}}
        });
        let submitted = with_removed_tenants(&document, &["t2".to_string()]);
        assert_eq!(submitted["declaration"]["t2"], json!({"class": "Tenant"}));
        assert_eq!(submitted["declaration"]["t1"], document["declaration"]["t1"]);
        assert_eq!(with_removed_tenants(&document, &[]), document);
    }
}
