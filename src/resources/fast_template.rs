use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::{absent_as_none, read_back, Context, Resource};
use crate::declaration::strip_nulls;
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};

/// `bigip_fast_template`: a FAST template set uploaded from a local zip.
#[derive(Debug, Clone, Copy, Default)]
pub struct FastTemplateResource;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
struct TemplateSetState {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    source: String,
    md5_hash: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    templates: Vec<String>,
}

impl TemplateSetState {
    fn from_value(value: &Value) -> Result<Self, ProviderError> {
        let state: Self = serde_json::from_value(strip_nulls(value))?;
        if state.name.is_empty() || state.name.contains('/') {
            return Err(ProviderError::Validation(format!(
                "name must be a plain template set name, got {:?}",
                state.name
            )));
        }
        Ok(state)
    }
}

/// Template names listed by an installed template set.
fn template_names(document: &Value) -> Vec<String> {
    document
        .get("templates")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|t| t.get("name").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

impl FastTemplateResource {
    /// Upload `{name}.zip` and install it.
    async fn install(&self, ctx: &Context, state: &TemplateSetState) -> Result<(), ProviderError> {
        let content = tokio::fs::read(&state.source).await.map_err(|e| {
            ProviderError::Validation(format!("cannot read source {}: {e}", state.source))
        })?;
        let client = ctx.client();

        info!(template_set = %state.name, bytes = content.len(), "installing FAST template set");
        ctx.exclusive(client, async {
            client
                .upload_file(&format!("{}.zip", state.name), &content)
                .await?;
            client.fast_templateset_install(&state.name).await
        })
        .await
    }
}

#[async_trait::async_trait]
impl Resource for FastTemplateResource {
    fn type_name(&self) -> &'static str {
        "bigip_fast_template"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("Template set name; the zip is uploaded as <name>.zip"),
            )
            .with_attribute(
                "source",
                Attribute::required_string().with_description("Path of the template set zip"),
            )
            .with_attribute(
                "md5_hash",
                Attribute::required_string()
                    .with_description("Checksum of the zip; a new value re-uploads it"),
            )
            .with_attribute(
                "templates",
                Attribute::new(
                    AttributeType::list(AttributeType::String),
                    AttributeFlags::computed(),
                ),
            )
    }

    async fn create(&self, ctx: &Context, planned: Value) -> Result<Value, ProviderError> {
        let mut state = TemplateSetState::from_value(&planned)?;
        self.install(ctx, &state).await?;
        state.id = Some(state.name.clone());
        read_back(self, ctx, serde_json::to_value(&state)?).await
    }

    async fn read(&self, ctx: &Context, current: Value) -> Result<Option<Value>, ProviderError> {
        let mut state = TemplateSetState::from_value(&current)?;
        let Some(document) =
            absent_as_none(ctx.client().fast_templateset(&state.name).await, &state.name)?
        else {
            return Ok(None);
        };
        state.id = Some(state.name.clone());
        state.templates = template_names(&document);
        Ok(Some(serde_json::to_value(&state)?))
    }

    async fn update(
        &self,
        ctx: &Context,
        _prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let state = TemplateSetState::from_value(&planned)?;
        self.install(ctx, &state).await?;
        read_back(self, ctx, serde_json::to_value(&state)?).await
    }

    async fn delete(&self, ctx: &Context, current: Value) -> Result<(), ProviderError> {
        let state = TemplateSetState::from_value(&current)?;
        let client = ctx.client();
        let deleted = ctx
            .exclusive(client, client.fast_templateset_delete(&state.name))
            .await;
        if absent_as_none(deleted, &state.name)?.is_none() {
            warn!(template_set = %state.name, "template set was already gone");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_template_names() {
        let document = json!({
            "name": "myTemplates",
            "hash": "abc",
            "templates": [{"name": "myTemplates/http"}, {"name": "myTemplates/tcp"}]
        });
        assert_eq!(
            template_names(&document),
            vec!["myTemplates/http", "myTemplates/tcp"]
        );
        assert!(template_names(&json!({})).is_empty());
    }

    #[test]
    fn test_state_name_must_be_plain() {
        let state = json!({"name": "a/b", "source": "x.zip", "md5_hash": "1"});
        assert!(TemplateSetState::from_value(&state).is_err());
        let state = json!({"name": "myTemplates", "source": "x.zip", "md5_hash": "1", "id": null});
        assert!(TemplateSetState::from_value(&state).is_ok());
    }
}
