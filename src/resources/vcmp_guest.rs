use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{absent_as_none, read_back, Context, Resource};
use crate::client::vcmp::{VcmpGuest, GUEST_STATES};
use crate::declaration::strip_nulls;
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};

/// `bigip_vcmp_guest`: a guest on a vCMP host.
#[derive(Debug, Clone, Copy, Default)]
pub struct VcmpGuestResource;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
struct GuestState {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    initial_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    initial_hotfix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    vlans: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    management_network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    management_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    management_gw: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    min_number_of_slots: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    number_of_slots: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cores_per_slot: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    allowed_slots: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    virtual_disk: Option<String>,
    delete_virtual_disk: bool,
}

impl GuestState {
    fn from_value(value: &Value) -> Result<Self, ProviderError> {
        let state: Self = serde_json::from_value(strip_nulls(value))?;
        if state.name.is_empty() || state.name.contains('/') {
            return Err(ProviderError::Validation(format!(
                "name must be a plain guest name, got {:?}",
                state.name
            )));
        }
        Ok(state)
    }

    fn to_guest(&self) -> VcmpGuest {
        VcmpGuest {
            name: self.name.clone(),
            full_path: None,
            initial_image: self.initial_image.clone(),
            initial_hotfix: self.initial_hotfix.clone(),
            vlans: self.vlans.clone().unwrap_or_default(),
            management_network: self.management_network.clone(),
            management_ip: self.management_ip.clone(),
            management_gw: self.management_gw.clone(),
            virtual_disk: None,
            min_slots: self.min_number_of_slots,
            slots: self.number_of_slots,
            cores_per_slot: self.cores_per_slot,
            allowed_slots: self.allowed_slots.clone().unwrap_or_default(),
            state: self.state.clone(),
        }
    }

    /// Device view merged over the local-only settings of `self`.
    fn with_guest(&self, guest: VcmpGuest) -> Self {
        Self {
            id: Some(guest.name.clone()),
            name: guest.name,
            initial_image: guest.initial_image,
            initial_hotfix: guest.initial_hotfix,
            vlans: Some(guest.vlans),
            management_network: guest.management_network,
            management_ip: guest.management_ip,
            management_gw: guest.management_gw,
            min_number_of_slots: guest.min_slots,
            number_of_slots: guest.slots,
            cores_per_slot: guest.cores_per_slot,
            allowed_slots: Some(guest.allowed_slots),
            state: guest.state,
            virtual_disk: guest.virtual_disk,
            delete_virtual_disk: self.delete_virtual_disk,
        }
    }
}

fn device_defaulted(attr_type: AttributeType) -> Attribute {
    Attribute::new(attr_type, AttributeFlags::optional_computed())
}

#[async_trait::async_trait]
impl Resource for VcmpGuestResource {
    fn type_name(&self) -> &'static str {
        "bigip_vcmp_guest"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string().with_force_new())
            .with_attribute(
                "initial_image",
                device_defaulted(AttributeType::String)
                    .with_description("Software image the guest boots first"),
            )
            .with_attribute("initial_hotfix", device_defaulted(AttributeType::String))
            .with_attribute(
                "vlans",
                device_defaulted(AttributeType::list(AttributeType::String)),
            )
            .with_attribute(
                "management_network",
                device_defaulted(AttributeType::String)
                    .with_allowed_values(["bridged", "isolated", "host-only"]),
            )
            .with_attribute(
                "management_ip",
                device_defaulted(AttributeType::String).with_description("CIDR address"),
            )
            .with_attribute("management_gw", device_defaulted(AttributeType::String))
            .with_attribute("min_number_of_slots", device_defaulted(AttributeType::Int64))
            .with_attribute("number_of_slots", device_defaulted(AttributeType::Int64))
            .with_attribute("cores_per_slot", device_defaulted(AttributeType::Int64))
            .with_attribute(
                "allowed_slots",
                device_defaulted(AttributeType::list(AttributeType::Int64)),
            )
            .with_attribute(
                "state",
                Attribute::optional_string()
                    .with_default(json!("provisioned"))
                    .with_allowed_values(GUEST_STATES.iter().copied()),
            )
            .with_attribute("virtual_disk", Attribute::computed_string())
            .with_attribute(
                "delete_virtual_disk",
                Attribute::optional_bool()
                    .with_default(json!(false))
                    .with_description("Remove the guest's virtual disk on destroy"),
            )
    }

    async fn create(&self, ctx: &Context, planned: Value) -> Result<Value, ProviderError> {
        let mut state = GuestState::from_value(&planned)?;
        info!(guest = %state.name, "creating vCMP guest");
        ctx.client().vcmp_guest_create(&state.to_guest()).await?;

        state.id = Some(state.name.clone());
        read_back(self, ctx, serde_json::to_value(&state)?).await
    }

    async fn read(&self, ctx: &Context, current: Value) -> Result<Option<Value>, ProviderError> {
        let state = GuestState::from_value(&current)?;
        let Some(guest) = absent_as_none(ctx.client().vcmp_guest(&state.name).await, &state.name)?
        else {
            return Ok(None);
        };
        Ok(Some(serde_json::to_value(state.with_guest(guest))?))
    }

    async fn update(
        &self,
        ctx: &Context,
        _prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let state = GuestState::from_value(&planned)?;
        info!(guest = %state.name, "modifying vCMP guest");
        ctx.client().vcmp_guest_modify(&state.to_guest()).await?;
        read_back(self, ctx, serde_json::to_value(&state)?).await
    }

    async fn delete(&self, ctx: &Context, current: Value) -> Result<(), ProviderError> {
        let state = GuestState::from_value(&current)?;
        let client = ctx.client();

        let stopped = client.vcmp_guest_set_state(&state.name, "configured").await;
        if absent_as_none(stopped, &state.name)?.is_none() {
            warn!(guest = %state.name, "vCMP guest was already gone");
        } else {
            info!(guest = %state.name, "deleting vCMP guest");
            client.vcmp_guest_delete(&state.name).await?;
        }

        if !state.delete_virtual_disk {
            return Ok(());
        }
        let Some(disk) = state.virtual_disk.as_deref().filter(|d| !d.is_empty()) else {
            return Ok(());
        };
        info!(guest = %state.name, disk, "deleting virtual disk");
        let removed = ctx
            .poller()
            .wait(disk, || client.vcmp_virtual_disk_delete(disk))
            .await;
        absent_as_none(removed, disk)?;
        Ok(())
    }

    async fn import(&self, ctx: &Context, id: &str) -> Result<Value, ProviderError> {
        let state = GuestState {
            name: id.to_string(),
            ..GuestState::default()
        };
        self.read(ctx, serde_json::to_value(&state)?)
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("vCMP guest {id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_state_to_guest() {
        let state = GuestState::from_value(&json!({
            "name": "guest1",
            "initial_image": "BIGIP-15.1.0.4-0.0.6.iso",
            "number_of_slots": 2,
            "vlans": null,
            "delete_virtual_disk": true,
        }))
        .unwrap();
        let guest = state.to_guest();
        assert_eq!(guest.slots, Some(2));
        assert!(guest.vlans.is_empty());
        assert_eq!(guest.virtual_disk, None);
    }

    #[test]
    fn test_read_keeps_local_settings() {
        let state = GuestState::from_value(&json!({
            "name": "guest1",
            "delete_virtual_disk": true,
        }))
        .unwrap();
        let guest: VcmpGuest = serde_json::from_value(json!({
            "name": "guest1",
            "virtualDisk": "guest1.img",
            "state": "deployed",
            "slots": 1
        }))
        .unwrap();
        let read = state.with_guest(guest);
        assert!(read.delete_virtual_disk);
        assert_eq!(read.virtual_disk.as_deref(), Some("guest1.img"));
        assert_eq!(read.id.as_deref(), Some("guest1"));
        assert_eq!(read.vlans, Some(vec![]));
    }
}
