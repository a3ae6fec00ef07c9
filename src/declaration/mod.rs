//! Declarative documents: FAST parameters, AS3 and DO declarations.
//!
//! Everything here is a pure transform; device calls live in
//! [`crate::client`] and the lifecycle in [`crate::resources`].

pub mod as3;
pub mod fast;
pub mod onboarding;

use serde_json::{Map, Value};

use crate::error::ProviderError;

/// Parse a JSON attribute holding a declaration.
///
/// `attribute` names the source in the error message.
pub fn parse_document(attribute: &str, raw: &str) -> Result<Value, ProviderError> {
    serde_json::from_str(raw)
        .map_err(|e| ProviderError::Validation(format!("{attribute} is not valid JSON: {e}")))
}

/// Remove `null` members from objects, recursively.
///
/// The host engine sends unset attributes as `null`; typed state structs
/// treat a missing member and `null` alike only once they are gone.
pub fn strip_nulls(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), strip_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(strip_nulls).collect()),
        other => other.clone(),
    }
}

/// Drop each of `keys` from `device` unless `user` has it too.
///
/// Devices inject bookkeeping members (`id`, `schemaVersion`, ...) into the
/// declarations they echo back.
pub fn retain_user_keys(device: &mut Map<String, Value>, user: &Value, keys: &[&str]) {
    for key in keys {
        if user.get(*key).is_none() {
            device.remove(*key);
        }
    }
}

/// Read a string attribute; empty strings count as unset.
pub fn string_attr<'a>(state: &'a Value, name: &str) -> Option<&'a str> {
    state.get(name).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Read a required string attribute.
pub fn required_attr<'a>(state: &'a Value, name: &str) -> Result<&'a str, ProviderError> {
    string_attr(state, name)
        .ok_or_else(|| ProviderError::Validation(format!("{name} is required")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_nulls_nested() {
        let value = json!({
            "tenant": "t1",
            "existing_pool": null,
            "monitor": [{"interval": 30, "password": null}],
        });
        assert_eq!(
            strip_nulls(&value),
            json!({"tenant": "t1", "monitor": [{"interval": 30}]})
        );
    }

    #[test]
    fn test_retain_user_keys() {
        let mut device = json!({"class": "ADC", "id": "x", "schemaVersion": "3.50.0", "t1": {}})
            .as_object()
            .cloned()
            .unwrap();
        retain_user_keys(
            &mut device,
            &json!({"class": "ADC", "schemaVersion": "3.0.0"}),
            &["id", "schemaVersion"],
        );
        assert!(device.contains_key("schemaVersion"));
        assert!(!device.contains_key("id"));
        assert!(device.contains_key("t1"));
    }

    #[test]
    fn test_parse_document_error_names_attribute() {
        let err = parse_document("as3_json", "{\"class\":").unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
        assert!(err.message().starts_with("as3_json is not valid JSON"));
    }

    #[test]
    fn test_string_attrs() {
        let state = json!({"tenant": "t1", "application": ""});
        assert_eq!(string_attr(&state, "tenant"), Some("t1"));
        assert_eq!(string_attr(&state, "application"), None);
        assert!(required_attr(&state, "application").is_err());
    }
}
