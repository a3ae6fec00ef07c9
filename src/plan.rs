//! Plan computation shared by every resource type.

use serde_json::{Map, Value};

use crate::diff::{json_equal, suppress_json_diff};
use crate::schema::{Attribute, DiffSuppress, Schema};
use crate::types::{AttributeChange, PlanResult};

/// Compare prior state with the proposed configuration.
///
/// Declared defaults are filled into the proposal first, so an attribute
/// the user leaves unset compares equal to the default stored in state.
///
/// - No prior state: every set attribute is added.
/// - `null` proposal: every prior attribute is removed.
/// - Otherwise attributes and blocks are compared one by one. Missing and
///   `null` compare equal, as do an empty block list and no list.
///   Computed attributes the proposal leaves unset keep their prior value,
///   and JSON attributes whose documents only differ in ways the
///   suppressor ignores keep the prior text.
///
/// A change to a force-new attribute or block sets `requires_replace`; the
/// computed-only attributes are then dropped from the planned state since
/// the replacement will compute them afresh.
pub fn plan_resource(schema: &Schema, prior: Option<&Value>, proposed: &Value) -> PlanResult {
    let prior = prior.filter(|p| !p.is_null());
    let mut proposed = proposed.clone();
    schema.block.apply_defaults(&mut proposed);
    let proposed = &proposed;

    let Some(prior) = prior else {
        let changes = set_members(proposed)
            .map(|(name, value)| AttributeChange::added(name.clone(), value.clone()))
            .collect();
        return PlanResult::with_changes(proposed.clone(), changes, false);
    };

    if proposed.is_null() {
        let changes = set_members(prior)
            .map(|(name, value)| AttributeChange::removed(name.clone(), value.clone()))
            .collect();
        return PlanResult::with_changes(Value::Null, changes, false);
    }

    let mut planned: Map<String, Value> = proposed.as_object().cloned().unwrap_or_default();
    let mut changes = Vec::new();
    let mut requires_replace = false;

    for (name, attr) in &schema.block.attributes {
        let before = present(prior.get(name));
        let after = present(planned.get(name));

        if after.is_none() && attr.flags.computed {
            if let Some(before) = before {
                planned.insert(name.clone(), before.clone());
            }
            continue;
        }

        match (before, after) {
            (None, None) => {}
            (Some(b), Some(a)) if json_equal(b, a) => {}
            (Some(b), Some(a)) if suppressed(attr, b, a) => {
                planned.insert(name.clone(), b.clone());
            }
            (before, after) => {
                changes.push(AttributeChange::new(name.clone(), before.cloned(), after.cloned()));
                requires_replace |= attr.force_new;
            }
        }
    }

    for (name, nested) in &schema.block.blocks {
        let before = present(prior.get(name)).filter(|v| !is_empty_list(v));
        let after = present(planned.get(name)).filter(|v| !is_empty_list(v));
        match (before, after) {
            (None, None) => {}
            (Some(b), Some(a)) if json_equal(b, a) => {}
            (before, after) => {
                changes.push(AttributeChange::new(name.clone(), before.cloned(), after.cloned()));
                requires_replace |= nested.force_new;
            }
        }
    }

    if changes.is_empty() {
        return PlanResult::no_change(Value::Object(planned));
    }

    if requires_replace {
        for (name, attr) in &schema.block.attributes {
            if attr.flags.is_computed_only() {
                planned.remove(name);
            }
        }
    }

    PlanResult::with_changes(Value::Object(planned), changes, requires_replace)
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

fn is_empty_list(value: &Value) -> bool {
    value.as_array().is_some_and(Vec::is_empty)
}

fn set_members(value: &Value) -> impl Iterator<Item = (&String, &Value)> {
    value
        .as_object()
        .into_iter()
        .flat_map(|map| map.iter())
        .filter(|(_, v)| !v.is_null())
}

fn suppressed(attr: &Attribute, before: &Value, after: &Value) -> bool {
    match (attr.diff_suppress, before.as_str(), after.as_str()) {
        (Some(DiffSuppress::Json), Some(old), Some(new)) => suppress_json_diff(old, new),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Block, NestedBlock};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("tenant", Attribute::required_string().with_force_new())
            .with_attribute("slow_ramp_time", Attribute::optional_int64())
            .with_attribute(
                "as3_json",
                Attribute::optional_string().with_diff_suppress(DiffSuppress::Json),
            )
            .with_block(
                "virtual_server",
                NestedBlock::single(
                    Block::new()
                        .with_attribute("ip", Attribute::required_string())
                        .with_attribute("port", Attribute::required_int64()),
                ),
            )
            .with_block(
                "pool_members",
                NestedBlock::list(Block::new().with_attribute("port", Attribute::optional_int64())),
            )
    }

    #[test]
    fn test_plan_create() {
        let plan = plan_resource(&schema(), None, &json!({"tenant": "t1", "slow_ramp_time": null}));
        assert_eq!(plan.changes, vec![AttributeChange::added("tenant", json!("t1"))]);
        assert!(!plan.requires_replace);
    }

    #[test]
    fn test_plan_delete() {
        let plan = plan_resource(&schema(), Some(&json!({"id": "t1/a1", "tenant": "t1"})), &Value::Null);
        assert_eq!(plan.planned_state, Value::Null);
        assert_eq!(plan.changes.len(), 2);
    }

    #[test]
    fn test_plan_keeps_computed_and_ignores_nulls() {
        let prior = json!({"id": "t1/a1", "tenant": "t1", "pool_members": []});
        let proposed = json!({"tenant": "t1", "slow_ramp_time": null, "id": null});
        let plan = plan_resource(&schema(), Some(&prior), &proposed);
        assert!(!plan.has_changes());
        assert_eq!(plan.planned_state["id"], "t1/a1");
    }

    #[test]
    fn test_plan_json_suppression_keeps_prior_text() {
        let prior = json!({"tenant": "t1", "as3_json": "{\"a\": 1, \"b\": [1, 2]}"});
        let proposed = json!({"tenant": "t1", "as3_json": "{\"b\":[1,2],\"a\":1}"});
        let plan = plan_resource(&schema(), Some(&prior), &proposed);
        assert!(!plan.has_changes());
        assert_eq!(plan.planned_state["as3_json"], prior["as3_json"]);

        let proposed = json!({"tenant": "t1", "as3_json": "{\"a\": 2}"});
        let plan = plan_resource(&schema(), Some(&prior), &proposed);
        assert_eq!(plan.changes.len(), 1);
        assert!(!plan.requires_replace);
    }

    #[test]
    fn test_plan_fills_defaults() {
        let schema = schema()
            .with_attribute("timeout", Attribute::optional_int64().with_default(json!(20)))
            .with_block(
                "members",
                NestedBlock::list(
                    Block::new()
                        .with_attribute("address", Attribute::required_string())
                        .with_attribute(
                            "share_nodes",
                            Attribute::optional_bool().with_default(json!(true)),
                        ),
                ),
            );

        let plan = plan_resource(&schema, None, &json!({"tenant": "t1", "timeout": null}));
        assert_eq!(plan.planned_state["timeout"], 20);

        let prior = json!({
            "tenant": "t1",
            "timeout": 20,
            "members": [{"address": "10.0.0.5", "share_nodes": true}],
        });
        let proposed = json!({
            "tenant": "t1",
            "timeout": null,
            "members": [{"address": "10.0.0.5"}],
        });
        let plan = plan_resource(&schema, Some(&prior), &proposed);
        assert!(!plan.has_changes(), "unexpected changes: {:?}", plan.changes);

        let plan = plan_resource(&schema, Some(&prior), &json!({"tenant": "t1", "timeout": 5}));
        assert_eq!(plan.changes.len(), 2);
    }

    #[test]
    fn test_plan_force_new_replaces() {
        let prior = json!({"id": "t1/a1", "tenant": "t1"});
        let proposed = json!({"tenant": "t2"});
        let plan = plan_resource(&schema(), Some(&prior), &proposed);
        assert!(plan.requires_replace);
        assert!(plan.planned_state.get("id").is_none());
    }

    #[test]
    fn test_plan_block_change() {
        let prior = json!({"tenant": "t1", "virtual_server": [{"ip": "10.0.0.1", "port": 80}]});
        let proposed = json!({"tenant": "t1", "virtual_server": [{"ip": "10.0.0.1", "port": 443}]});
        let plan = plan_resource(&schema(), Some(&prior), &proposed);
        assert_eq!(plan.changes.len(), 1);
        assert_eq!(plan.changes[0].path, "virtual_server");
        assert!(!plan.requires_replace);
    }
}
