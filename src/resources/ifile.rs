use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{absent_as_none, read_back, Context, Resource};
use crate::client::files::SysIFile;
use crate::declaration::strip_nulls;
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};

/// `bigip_sys_ifile`: an iFile whose content lives in the configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct SysIFileResource;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
struct IFileState {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    partition: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sub_path: Option<String>,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    checksum: Option<String>,
}

impl IFileState {
    fn from_value(value: &Value) -> Result<Self, ProviderError> {
        let mut state: Self = serde_json::from_value(strip_nulls(value))?;
        if state.name.is_empty() || state.name.contains('/') {
            return Err(ProviderError::Validation(format!(
                "name must not contain a path, got {:?}",
                state.name
            )));
        }
        if state.partition.is_empty() {
            state.partition = "Common".to_string();
        }
        Ok(state)
    }

    /// `/partition[/sub_path]/name`.
    fn full_path(&self) -> String {
        match self.sub_path.as_deref().map(|s| s.trim_matches('/')) {
            Some(sub) if !sub.is_empty() => format!("/{}/{}/{}", self.partition, sub, self.name),
            _ => format!("/{}/{}", self.partition, self.name),
        }
    }

    /// Name the content is uploaded under; unique per full path.
    fn upload_name(&self) -> String {
        format!("ifile{}", self.full_path().replace('/', "_"))
    }
}

impl SysIFileResource {
    async fn upload(&self, ctx: &Context, state: &IFileState) -> Result<String, ProviderError> {
        let path = ctx
            .client()
            .upload_file(&state.upload_name(), state.content.as_bytes())
            .await?;
        Ok(format!("file:{path}"))
    }
}

#[async_trait::async_trait]
impl Resource for SysIFileResource {
    fn type_name(&self) -> &'static str {
        "bigip_sys_ifile"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string().with_force_new())
            .with_attribute(
                "partition",
                Attribute::optional_string()
                    .with_force_new()
                    .with_default(json!("Common")),
            )
            .with_attribute("sub_path", Attribute::optional_string().with_force_new())
            .with_attribute(
                "content",
                Attribute::required_string()
                    .sensitive()
                    .with_description("File content"),
            )
            .with_attribute(
                "checksum",
                Attribute::computed_string().with_description("Checksum the device reports"),
            )
    }

    async fn create(&self, ctx: &Context, planned: Value) -> Result<Value, ProviderError> {
        let mut state = IFileState::from_value(&planned)?;
        let full_path = state.full_path();
        info!(ifile = %full_path, "creating iFile");

        let source_path = self.upload(ctx, &state).await?;
        ctx.client()
            .sys_ifile_create(&SysIFile {
                name: state.name.clone(),
                partition: Some(state.partition.clone()),
                sub_path: state.sub_path.clone(),
                source_path: Some(source_path),
                ..SysIFile::default()
            })
            .await?;

        state.id = Some(full_path);
        read_back(self, ctx, serde_json::to_value(&state)?).await
    }

    async fn read(&self, ctx: &Context, current: Value) -> Result<Option<Value>, ProviderError> {
        let mut state = IFileState::from_value(&current)?;
        let full_path = state.full_path();
        let Some(ifile) = absent_as_none(ctx.client().sys_ifile(&full_path).await, &full_path)?
        else {
            return Ok(None);
        };
        state.id = Some(full_path);
        state.checksum = ifile.checksum;
        Ok(Some(serde_json::to_value(&state)?))
    }

    async fn update(
        &self,
        ctx: &Context,
        _prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let state = IFileState::from_value(&planned)?;
        let full_path = state.full_path();
        info!(ifile = %full_path, "replacing iFile content");

        let source_path = self.upload(ctx, &state).await?;
        ctx.client()
            .sys_ifile_replace(&full_path, &source_path)
            .await?;
        read_back(self, ctx, serde_json::to_value(&state)?).await
    }

    async fn delete(&self, ctx: &Context, current: Value) -> Result<(), ProviderError> {
        let state = IFileState::from_value(&current)?;
        let full_path = state.full_path();
        if absent_as_none(ctx.client().sys_ifile_delete(&full_path).await, &full_path)?.is_none() {
            warn!(ifile = %full_path, "iFile was already gone");
        }
        Ok(())
    }
}
