use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::bigiq::BigIqLogin;
use super::{read_back, Context, Resource};
use crate::client::bigiq::{LicenseAssignment, LicenseRequest, ASSIGNMENT_TYPES};
use crate::client::BigIpClient;
use crate::declaration::strip_nulls;
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Diagnostic, Schema};

/// `bigip_common_license_manage_bigiq`: license the configured BIG-IP from
/// a BIG-IQ license pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct BigIqLicenseResource;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct LicenseState {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(flatten)]
    login: BigIqLogin,
    license_poolname: String,
    assignment_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit_of_measure: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    skukeyword1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    skukeyword2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mac_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hypervisor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tenant: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_license_status: Option<String>,
}

impl LicenseState {
    fn from_value(value: &Value) -> Result<Self, ProviderError> {
        let state: Self = serde_json::from_value(strip_nulls(value))?;
        state.login.check()?;
        if state.license_poolname.is_empty() {
            return Err(ProviderError::Validation("license_poolname is required".into()));
        }
        if !ASSIGNMENT_TYPES.contains(&state.assignment_type.as_str()) {
            return Err(ProviderError::Validation(format!(
                "assignment_type must be one of {}, got {:?}",
                ASSIGNMENT_TYPES.join(", "),
                state.assignment_type
            )));
        }
        Ok(state)
    }

    fn unreachable(&self) -> bool {
        self.assignment_type == "UNREACHABLE"
    }

    /// The request BIG-IQ needs to assign (or revoke) a license for the
    /// device at `address:port`.
    fn request(&self, ctx: &Context, command: &str) -> Result<LicenseRequest, ProviderError> {
        let base = ctx.client().base_url();
        let address = base
            .host_str()
            .ok_or_else(|| ProviderError::Internal(format!("device URL {base} has no host")))?
            .to_string();

        let mut request = LicenseRequest {
            command: command.to_string(),
            license_pool_name: self.license_poolname.clone(),
            assignment_type: self.assignment_type.clone(),
            address,
            port: base.port_or_known_default(),
            ..LicenseRequest::default()
        };
        if self.unreachable() {
            request.mac_address = self.mac_address.clone();
            request.hypervisor = self.hypervisor.clone();
        } else {
            let config = ctx.config();
            request.user = config.username.clone();
            request.password = config.password.clone();
        }
        if command == "assign" {
            request.sku_keyword1 = self.skukeyword1.clone();
            request.sku_keyword2 = self.skukeyword2.clone();
            request.unit_of_measure = self.unit_of_measure.clone();
            request.tenant = self.tenant.clone();
        }
        Ok(request)
    }

    fn matches(&self, address: &str, assignment: &LicenseAssignment) -> bool {
        if assignment.device_address != address {
            return false;
        }
        match (self.mac_address.as_deref(), assignment.mac_address.as_deref()) {
            (Some(ours), Some(theirs)) => ours.eq_ignore_ascii_case(theirs),
            _ => true,
        }
    }
}

impl BigIqLicenseResource {
    async fn run(
        &self,
        ctx: &Context,
        bigiq: &BigIpClient,
        request: &LicenseRequest,
    ) -> Result<(), ProviderError> {
        ctx.exclusive(bigiq, async {
            let task_id = bigiq.license_request(request).await?;
            debug!(task_id = %task_id, command = %request.command, "BIG-IQ accepted the license task");
            ctx.poller()
                .wait(&task_id, || bigiq.license_task(&task_id))
                .await?;
            Ok(())
        })
        .await
    }
}

#[async_trait::async_trait]
impl Resource for BigIqLicenseResource {
    fn type_name(&self) -> &'static str {
        "bigip_common_license_manage_bigiq"
    }

    fn schema(&self) -> Schema {
        BigIqLogin::with_attributes(Schema::v0())
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "license_poolname",
                Attribute::required_string().with_force_new(),
            )
            .with_attribute(
                "assignment_type",
                Attribute::required_string()
                    .with_force_new()
                    .with_allowed_values(ASSIGNMENT_TYPES.iter().copied()),
            )
            .with_attribute(
                "unit_of_measure",
                Attribute::optional_string()
                    .with_force_new()
                    .with_description("Utility pools only, e.g. hourly"),
            )
            .with_attribute("skukeyword1", Attribute::optional_string().with_force_new())
            .with_attribute("skukeyword2", Attribute::optional_string().with_force_new())
            .with_attribute(
                "mac_address",
                Attribute::new(AttributeType::String, AttributeFlags::optional_computed())
                    .with_force_new()
                    .with_description("Required for UNREACHABLE devices"),
            )
            .with_attribute(
                "hypervisor",
                Attribute::optional_string()
                    .with_force_new()
                    .with_description("Required for UNREACHABLE devices"),
            )
            .with_attribute("tenant", Attribute::optional_string().with_force_new())
            .with_attribute("device_license_status", Attribute::computed_string())
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        if config.get("assignment_type").and_then(Value::as_str) != Some("UNREACHABLE") {
            return Vec::new();
        }
        ["mac_address", "hypervisor"]
            .into_iter()
            .filter(|name| config.get(*name).and_then(Value::as_str).is_none())
            .map(|name| {
                Diagnostic::error("Missing attribute for UNREACHABLE assignment")
                    .with_detail(format!("{name} is required when assignment_type is UNREACHABLE"))
                    .with_attribute(name)
            })
            .collect()
    }

    async fn create(&self, ctx: &Context, planned: Value) -> Result<Value, ProviderError> {
        let mut state = LicenseState::from_value(&planned)?;
        let request = state.request(ctx, "assign")?;
        let bigiq = state.login.connect(ctx).await?;

        info!(
            pool = %state.license_poolname,
            device = %request.address,
            assignment = %state.assignment_type,
            "assigning license"
        );
        self.run(ctx, &bigiq, &request).await?;

        state.id = Some(format!("{}:{}", state.license_poolname, request.address));
        read_back(self, ctx, serde_json::to_value(&state)?).await
    }

    async fn read(&self, ctx: &Context, current: Value) -> Result<Option<Value>, ProviderError> {
        let mut state = LicenseState::from_value(&current)?;
        let address = state.request(ctx, "assign")?.address;
        let bigiq = state.login.connect(ctx).await?;

        let assignments = bigiq.license_assignments().await?;
        let Some(assignment) = assignments.iter().find(|a| state.matches(&address, a)) else {
            info!(device = %address, "no license assignment found, clearing state");
            return Ok(None);
        };
        if state.mac_address.is_none() {
            state.mac_address = assignment.mac_address.clone();
        }
        state.device_license_status = assignment.status.clone();
        Ok(Some(serde_json::to_value(&state)?))
    }

    async fn update(
        &self,
        ctx: &Context,
        _prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        // Only the BIG-IQ login can change in place.
        let state = LicenseState::from_value(&planned)?;
        read_back(self, ctx, serde_json::to_value(&state)?).await
    }

    async fn delete(&self, ctx: &Context, current: Value) -> Result<(), ProviderError> {
        let state = LicenseState::from_value(&current)?;
        let request = state.request(ctx, "revoke")?;
        let bigiq = state.login.connect(ctx).await?;

        let assignments = bigiq.license_assignments().await?;
        if !assignments.iter().any(|a| state.matches(&request.address, a)) {
            warn!(device = %request.address, "license was already revoked");
            return Ok(());
        }
        info!(pool = %state.license_poolname, device = %request.address, "revoking license");
        self.run(ctx, &bigiq, &request).await
    }
}
