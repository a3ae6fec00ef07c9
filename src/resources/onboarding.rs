use std::time::Duration;

use serde_json::{json, Value};
use tracing::{info, warn};

use super::{absent_as_none, Context, Resource};
use crate::declaration::onboarding::{parse_declaration, reconcile};
use crate::declaration::{required_attr, string_attr};
use crate::error::ProviderError;
use crate::schema::{Attribute, Diagnostic, DiffSuppress, Schema};

const DEFAULT_TIMEOUT_MINUTES: u64 = 20;
/// One day.
const MAX_TIMEOUT_MINUTES: u64 = 24 * 60;

/// `bigip_do`: a Declarative Onboarding declaration. The resource ID is the
/// DO task that applied it.
#[derive(Debug, Clone, Copy, Default)]
pub struct OnboardingResource;

/// Poll bound for a state; out-of-range values fall back to the default or
/// the one-day ceiling.
fn timeout_of(state: &Value) -> Duration {
    let minutes = state
        .get("timeout")
        .and_then(Value::as_u64)
        .filter(|m| *m > 0)
        .unwrap_or(DEFAULT_TIMEOUT_MINUTES)
        .min(MAX_TIMEOUT_MINUTES);
    Duration::from_secs(minutes * 60)
}

impl OnboardingResource {
    /// Submit the declaration and wait for DO to apply it.
    async fn apply(&self, ctx: &Context, planned: Value) -> Result<Value, ProviderError> {
        let declaration = parse_declaration(required_attr(&planned, "do_json")?)?;
        let timeout = timeout_of(&planned);
        let client = ctx.client();

        let task_id = ctx
            .exclusive(client, async {
                let task_id = client.do_post(&declaration).await?;
                info!(task_id = %task_id, ?timeout, "DO declaration accepted");
                ctx.poller_with_timeout(timeout)
                    .wait(&task_id, || client.do_task(&task_id))
                    .await?;
                Ok(task_id)
            })
            .await?;

        let mut state = planned;
        state["id"] = json!(task_id);
        if state.get("timeout").map_or(true, Value::is_null) {
            state["timeout"] = json!(DEFAULT_TIMEOUT_MINUTES);
        }
        Ok(self.read(ctx, state.clone()).await?.unwrap_or(state))
    }
}

#[async_trait::async_trait]
impl Resource for OnboardingResource {
    fn type_name(&self) -> &'static str {
        "bigip_do"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "do_json",
                Attribute::required_string()
                    .with_diff_suppress(DiffSuppress::Json)
                    .with_description("Declarative Onboarding declaration as JSON"),
            )
            .with_attribute(
                "timeout",
                Attribute::optional_int64()
                    .with_default(json!(DEFAULT_TIMEOUT_MINUTES))
                    .with_description("Minutes to wait for the declaration to apply"),
            )
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        match config.get("timeout").and_then(Value::as_i64) {
            Some(minutes) if !(1..=MAX_TIMEOUT_MINUTES as i64).contains(&minutes) => {
                vec![Diagnostic::error("Invalid timeout")
                    .with_detail(format!(
                        "timeout must be between 1 and {MAX_TIMEOUT_MINUTES} minutes, got {minutes}"
                    ))
                    .with_attribute("timeout")]
            }
            _ => Vec::new(),
        }
    }

    async fn create(&self, ctx: &Context, planned: Value) -> Result<Value, ProviderError> {
        self.apply(ctx, planned).await
    }

    async fn read(&self, ctx: &Context, current: Value) -> Result<Option<Value>, ProviderError> {
        let task_id = required_attr(&current, "id")?;
        let Some(task) = absent_as_none(ctx.client().do_task_document(task_id).await, task_id)?
        else {
            return Ok(None);
        };

        let Some(raw) = string_attr(&current, "do_json") else {
            return Ok(Some(current));
        };
        let user = parse_declaration(raw)?;
        match reconcile(&user, &task) {
            Some(applied) => {
                let mut state = current.clone();
                state["do_json"] = json!(serde_json::to_string(&applied)?);
                Ok(Some(state))
            }
            None => Ok(Some(current)),
        }
    }

    async fn update(
        &self,
        ctx: &Context,
        _prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        self.apply(ctx, planned).await
    }

    async fn delete(&self, _ctx: &Context, current: Value) -> Result<(), ProviderError> {
        warn!(
            task_id = string_attr(&current, "id").unwrap_or_default(),
            "DO settings cannot be rolled back; removing the resource from state only"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_minutes() {
        assert_eq!(timeout_of(&json!({})), Duration::from_secs(1200));
        assert_eq!(timeout_of(&json!({"timeout": 5})), Duration::from_secs(300));
        assert_eq!(timeout_of(&json!({"timeout": 0})), Duration::from_secs(1200));
        assert_eq!(timeout_of(&json!({"timeout": -5})), Duration::from_secs(1200));
        assert_eq!(
            timeout_of(&json!({"timeout": i64::MAX})),
            Duration::from_secs(24 * 60 * 60)
        );
    }

    #[test]
    fn test_validate_timeout_range() {
        assert!(OnboardingResource.validate(&json!({"do_json": "{}", "timeout": 30})).is_empty());
        assert!(OnboardingResource.validate(&json!({"do_json": "{}", "timeout": null})).is_empty());

        for minutes in [0, -1, i64::MAX] {
            let diagnostics =
                OnboardingResource.validate(&json!({"do_json": "{}", "timeout": minutes}));
            assert_eq!(diagnostics.len(), 1, "timeout {minutes}");
            assert_eq!(diagnostics[0].attribute.as_deref(), Some("timeout"));
        }
    }

    #[test]
    fn test_schema() {
        let schema = OnboardingResource.schema();
        assert_eq!(
            schema.attribute("do_json").unwrap().diff_suppress,
            Some(DiffSuppress::Json)
        );
        assert_eq!(
            schema.attribute("timeout").unwrap().default,
            Some(json!(20))
        );
    }
}
