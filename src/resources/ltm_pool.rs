use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::{absent_as_none, read_back, Context, DataSource, Resource};
use crate::client::ltm::{split_full_path, LtmPool, LOAD_BALANCING_MODES};
use crate::declaration::{required_attr, strip_nulls};
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};

/// `bigip_ltm_pool`: a pool managed through iControl REST.
#[derive(Debug, Clone, Copy, Default)]
pub struct LtmPoolResource;

/// `bigip_ltm_pool` data source: look a pool up by full path.
#[derive(Debug, Clone, Copy, Default)]
pub struct LtmPoolDataSource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct PoolState {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    load_balancing_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    monitors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    slow_ramp_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    allow_snat: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    allow_nat: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reselect_tries: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    service_down_action: Option<String>,
}

fn yes_no(flag: Option<bool>) -> Option<String> {
    flag.map(|on| if on { "yes" } else { "no" }.to_string())
}

fn from_yes_no(value: Option<&str>) -> Option<bool> {
    match value? {
        "yes" | "enabled" | "true" => Some(true),
        "no" | "disabled" | "false" => Some(false),
        other => {
            warn!(value = other, "unexpected yes/no value");
            None
        }
    }
}

impl PoolState {
    fn from_value(value: &Value) -> Result<Self, ProviderError> {
        let state: Self = serde_json::from_value(strip_nulls(value))?;
        if !state.name.starts_with('/') {
            return Err(ProviderError::Validation(format!(
                "name must be a full path such as /Common/{}, got {:?}",
                state.name.trim_start_matches('/'),
                state.name
            )));
        }
        Ok(state)
    }

    fn to_pool(&self) -> LtmPool {
        let (partition, name) = split_full_path(&self.name);
        LtmPool {
            name,
            partition: Some(partition),
            full_path: None,
            description: self.description.clone(),
            load_balancing_mode: self.load_balancing_mode.clone(),
            monitor: self
                .monitors
                .as_ref()
                .filter(|m| !m.is_empty())
                .map(|m| m.join(" and ")),
            slow_ramp_time: self.slow_ramp_time,
            allow_snat: yes_no(self.allow_snat),
            allow_nat: yes_no(self.allow_nat),
            reselect_tries: self.reselect_tries,
            service_down_action: self.service_down_action.clone(),
        }
    }

    fn from_pool(full_path: &str, pool: &LtmPool) -> Self {
        let monitors = pool.monitor.as_deref().map(|rule| {
            rule.split(" and ")
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        });
        Self {
            id: Some(full_path.to_string()),
            name: full_path.to_string(),
            description: pool.description.clone(),
            load_balancing_mode: pool.load_balancing_mode.clone(),
            monitors,
            slow_ramp_time: pool.slow_ramp_time,
            allow_snat: from_yes_no(pool.allow_snat.as_deref()),
            allow_nat: from_yes_no(pool.allow_nat.as_deref()),
            reselect_tries: pool.reselect_tries,
            service_down_action: pool.service_down_action.clone(),
        }
    }
}

/// Attributes the device fills in when the user leaves them unset.
fn device_defaulted(attr_type: AttributeType) -> Attribute {
    Attribute::new(attr_type, AttributeFlags::optional_computed())
}

fn pool_schema() -> Schema {
    Schema::v0()
        .with_attribute("id", Attribute::computed_string())
        .with_attribute(
            "name",
            Attribute::required_string()
                .with_force_new()
                .with_description("Full path of the pool, e.g. /Common/web"),
        )
        .with_attribute("description", Attribute::optional_string())
        .with_attribute(
            "load_balancing_mode",
            device_defaulted(AttributeType::String)
                .with_allowed_values(LOAD_BALANCING_MODES.iter().copied()),
        )
        .with_attribute(
            "monitors",
            device_defaulted(AttributeType::list(AttributeType::String))
                .with_description("Monitors, all of which must pass"),
        )
        .with_attribute(
            "slow_ramp_time",
            device_defaulted(AttributeType::Int64).with_description("Seconds"),
        )
        .with_attribute("allow_snat", device_defaulted(AttributeType::Bool))
        .with_attribute("allow_nat", device_defaulted(AttributeType::Bool))
        .with_attribute("reselect_tries", device_defaulted(AttributeType::Int64))
        .with_attribute(
            "service_down_action",
            device_defaulted(AttributeType::String)
                .with_allowed_values(["none", "reset", "drop", "reselect"]),
        )
}

#[async_trait::async_trait]
impl Resource for LtmPoolResource {
    fn type_name(&self) -> &'static str {
        "bigip_ltm_pool"
    }

    fn schema(&self) -> Schema {
        pool_schema()
    }

    async fn create(&self, ctx: &Context, planned: Value) -> Result<Value, ProviderError> {
        let mut state = PoolState::from_value(&planned)?;
        info!(pool = %state.name, "creating pool");
        ctx.client().ltm_pool_create(&state.to_pool()).await?;

        state.id = Some(state.name.clone());
        read_back(self, ctx, serde_json::to_value(&state)?).await
    }

    async fn read(&self, ctx: &Context, current: Value) -> Result<Option<Value>, ProviderError> {
        let state = PoolState::from_value(&current)?;
        let Some(pool) = absent_as_none(ctx.client().ltm_pool(&state.name).await, &state.name)?
        else {
            return Ok(None);
        };
        Ok(Some(serde_json::to_value(PoolState::from_pool(
            &state.name,
            &pool,
        ))?))
    }

    async fn update(
        &self,
        ctx: &Context,
        _prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let state = PoolState::from_value(&planned)?;
        info!(pool = %state.name, "modifying pool");
        ctx.client()
            .ltm_pool_modify(&state.name, &state.to_pool())
            .await?;
        read_back(self, ctx, serde_json::to_value(&state)?).await
    }

    async fn delete(&self, ctx: &Context, current: Value) -> Result<(), ProviderError> {
        let state = PoolState::from_value(&current)?;
        if absent_as_none(ctx.client().ltm_pool_delete(&state.name).await, &state.name)?
            .is_none()
        {
            warn!(pool = %state.name, "pool was already gone");
        }
        Ok(())
    }

    async fn import(&self, ctx: &Context, id: &str) -> Result<Value, ProviderError> {
        let state = PoolState {
            name: id.to_string(),
            ..PoolState::default()
        };
        self.read(ctx, serde_json::to_value(&state)?)
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("pool {id}")))
    }
}

#[async_trait::async_trait]
impl DataSource for LtmPoolDataSource {
    fn type_name(&self) -> &'static str {
        "bigip_ltm_pool"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string())
            .with_attribute("description", Attribute::computed_string())
            .with_attribute("load_balancing_mode", Attribute::computed_string())
            .with_attribute(
                "monitors",
                Attribute::new(
                    AttributeType::list(AttributeType::String),
                    AttributeFlags::computed(),
                ),
            )
            .with_attribute(
                "slow_ramp_time",
                Attribute::new(AttributeType::Int64, AttributeFlags::computed()),
            )
            .with_attribute("allow_snat", Attribute::computed_bool())
            .with_attribute("allow_nat", Attribute::computed_bool())
            .with_attribute(
                "reselect_tries",
                Attribute::new(AttributeType::Int64, AttributeFlags::computed()),
            )
            .with_attribute("service_down_action", Attribute::computed_string())
    }

    async fn read(&self, ctx: &Context, config: Value) -> Result<Value, ProviderError> {
        let name = required_attr(&config, "name")?;
        let pool = ctx.client().ltm_pool(name).await.map_err(|e| {
            if e.indicates_absence() {
                ProviderError::NotFound(format!("pool {name}"))
            } else {
                e
            }
        })?;
        Ok(serde_json::to_value(PoolState::from_pool(name, &pool))?)
    }
}
