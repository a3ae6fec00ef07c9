//! AS3 declarations.
//!
//! A user document is either a full request (`{"class": "AS3", "declaration":
//! {...}}`) or a bare ADC declaration. Tenants are the ADC members of class
//! `Tenant`, applications the tenant members of class `Application`.
//!
//! On Read the device declaration replaces the user's tenants (or
//! applications, in per-application mode); members the device injects are
//! dropped unless the user wrote them.

use serde_json::{json, Map, Value};

use super::{parse_document, retain_user_keys};
use crate::error::ProviderError;

/// ADC members added by the device on GET.
pub const DEVICE_METADATA: &[&str] = &["id", "updateMode", "controls", "schemaVersion"];

/// The ADC declaration of a document.
pub fn adc_of(document: &Value) -> &Value {
    document.get("declaration").unwrap_or(document)
}

fn has_class(value: &Value, class: &str) -> bool {
    value.get("class").and_then(Value::as_str) == Some(class)
}

/// Tenant names declared in a document, in key order.
pub fn tenants(document: &Value) -> Vec<String> {
    members_of_class(adc_of(document), "Tenant")
}

/// Application names declared directly in `container` (a tenant body or a
/// per-application document).
pub fn applications(container: &Value) -> Vec<String> {
    members_of_class(container, "Application")
}

fn members_of_class(container: &Value, class: &str) -> Vec<String> {
    container
        .as_object()
        .map(|map| {
            map.iter()
                .filter(|(_, v)| has_class(v, class))
                .map(|(k, _)| k.clone())
                .collect()
        })
        .unwrap_or_default()
}

/// Split a comma-separated list, ignoring blanks.
pub fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Keep only the named applications of every tenant in an AS3 document.
///
/// Tenants left without applications are dropped, as are non-object ADC
/// members. Malformed JSON is an error, never a partial result.
///
/// ```
/// use bigip_provider::declaration::as3::filter_as3_json;
/// use serde_json::json;
///
/// let raw = r#"{"declaration":{"ansible":{"A1":{"class":"Application"},"A2":{"class":"Application"},"class":"Tenant"}}}"#;
/// let filtered = filter_as3_json(raw, &["A1"]).unwrap();
/// assert_eq!(filtered, json!({"ansible": {"A1": {"class": "Application"}}}));
/// ```
pub fn filter_as3_json<S: AsRef<str>>(
    as3_json: &str,
    applications: &[S],
) -> Result<Value, ProviderError> {
    let document = parse_document("as3_json", as3_json)?;
    Ok(filter_applications(&document, applications))
}

/// [`filter_as3_json`] on a parsed document.
pub fn filter_applications<S: AsRef<str>>(document: &Value, applications: &[S]) -> Value {
    let mut filtered = Map::new();
    let Some(adc) = adc_of(document).as_object() else {
        return Value::Object(filtered);
    };
    for (tenant, body) in adc {
        let Some(body) = body.as_object() else {
            continue;
        };
        let kept: Map<String, Value> = applications
            .iter()
            .filter_map(|app| {
                let app = app.as_ref();
                body.get(app).map(|v| (app.to_string(), v.clone()))
            })
            .collect();
        if !kept.is_empty() {
            filtered.insert(tenant.clone(), Value::Object(kept));
        }
    }
    Value::Object(filtered)
}

fn replace_adc(user: &Value, adc: Value) -> Value {
    match user {
        Value::Object(map) if map.contains_key("declaration") => {
            let mut map = map.clone();
            map.insert("declaration".to_string(), adc);
            Value::Object(map)
        }
        _ => adc,
    }
}

/// Rebuild the user's document from the device declaration of `managed`
/// tenants.
///
/// Returns `None` when the device reports none of them. Tenants the user
/// declared but does not manage here are kept as written.
pub fn reconcile_tenants(user: &Value, device: &Value, managed: &[String]) -> Option<Value> {
    let device_adc = adc_of(device).as_object()?;
    if !managed.iter().any(|t| device_adc.contains_key(t)) {
        return None;
    }
    let user_adc = adc_of(user);

    let mut adc: Map<String, Value> = device_adc
        .iter()
        .filter(|(name, body)| !has_class(body, "Tenant") || managed.contains(name))
        .map(|(name, body)| (name.clone(), body.clone()))
        .collect();
    retain_user_keys(&mut adc, user_adc, DEVICE_METADATA);

    if let Some(user_map) = user_adc.as_object() {
        for (name, body) in user_map {
            if has_class(body, "Tenant") && !managed.contains(name) {
                adc.insert(name.clone(), body.clone());
            }
        }
    }
    Some(replace_adc(user, Value::Object(adc)))
}

/// Rebuild a per-application document from the device declaration of its
/// tenant. Returns `None` when none of `managed` is left.
pub fn reconcile_applications(
    user: &Value,
    device: &Value,
    tenant: &str,
    managed: &[String],
) -> Option<Value> {
    let filtered = filter_applications(device, managed);
    let apps = filtered.get(tenant)?.as_object()?;

    let mut document = user.as_object().cloned().unwrap_or_default();
    for name in managed {
        match apps.get(name) {
            Some(body) => document.insert(name.clone(), body.clone()),
            None => document.remove(name),
        };
    }
    Some(Value::Object(document))
}

/// Validate a full-mode document and return its tenants.
pub fn tenants_for_submission(document: &Value) -> Result<Vec<String>, ProviderError> {
    let found = tenants(document);
    if found.is_empty() {
        return Err(ProviderError::Validation(
            "as3_json declares no tenant (no member of class Tenant)".into(),
        ));
    }
    Ok(found)
}

/// Validate a per-application document and return its applications.
pub fn applications_for_submission(document: &Value) -> Result<Vec<String>, ProviderError> {
    if !tenants(document).is_empty() {
        return Err(ProviderError::Validation(
            "as3_json must not declare tenants when tenant_name is set".into(),
        ));
    }
    let found = applications(document);
    if found.is_empty() {
        return Err(ProviderError::Validation(
            "as3_json declares no application (no member of class Application)".into(),
        ));
    }
    Ok(found)
}

/// The BIG-IP a BIG-IQ declaration is deployed to (`target.address`, or
/// `target.hostname`).
pub fn target_of(document: &Value) -> Option<&str> {
    let target = adc_of(document).get("target")?;
    target
        .get("address")
        .or_else(|| target.get("hostname"))
        .and_then(Value::as_str)
}

/// Pick the declaration deployed to `target` out of a BIG-IQ listing.
pub fn declaration_for_target<'a>(listing: &'a Value, target: &str) -> Option<&'a Value> {
    match listing {
        Value::Array(items) => items.iter().find(|d| target_of(d) == Some(target)),
        Value::Object(_) if target_of(listing) == Some(target) => Some(listing),
        _ => None,
    }
}

/// The same document with every tenant emptied. Submitting it removes the
/// tenants from the target.
pub fn empty_tenants(document: &Value) -> Value {
    let Some(adc) = adc_of(document).as_object() else {
        return document.clone();
    };
    let emptied: Map<String, Value> = adc
        .iter()
        .map(|(name, body)| {
            if has_class(body, "Tenant") {
                (name.clone(), json!({ "class": "Tenant" }))
            } else {
                (name.clone(), body.clone())
            }
        })
        .collect();
    replace_adc(document, Value::Object(emptied))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FIXTURE: &str = r#"{
        "class": "AS3",
        "action": "deploy",
        "declaration": {
            "class": "ADC",
            "schemaVersion": "3.0.0",
            "ansible": {
                "class": "Tenant",
                "A1": {"class": "Application", "service": {"class": "Service_HTTP", "virtualAddresses": ["10.0.1.10"]}},
                "A2": {"class": "Application", "service": {"class": "Service_HTTP", "virtualAddresses": ["10.0.1.11"]}}
            }
        }
    }"#;

    #[test]
    fn test_filter_keeps_named_applications() {
        let filtered = filter_as3_json(FIXTURE, &["A1"]).unwrap();
        assert_eq!(
            filtered,
            json!({"ansible": {"A1": {"class": "Application", "service": {"class": "Service_HTTP", "virtualAddresses": ["10.0.1.10"]}}}})
        );
    }

    #[test]
    fn test_filter_malformed_is_error() {
        let err = filter_as3_json(r#"{"action":"deploy","class":"AS3","declaration":"#, &["A1"])
            .unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
    }

    #[test]
    fn test_filter_empty_declaration() {
        assert_eq!(filter_as3_json("{}", &["A1", "A2"]).unwrap(), json!({}));
        assert_eq!(
            filter_as3_json(r#"{"declaration":{}}"#, &["A1"]).unwrap(),
            json!({})
        );
    }

    #[test]
    fn test_tenants_and_applications() {
        let doc: Value = serde_json::from_str(FIXTURE).unwrap();
        assert_eq!(tenants(&doc), vec!["ansible"]);
        assert_eq!(applications(&doc["declaration"]["ansible"]), vec!["A1", "A2"]);
        assert_eq!(split_list(" t1, ,t2 "), vec!["t1", "t2"]);
    }

    #[test]
    fn test_reconcile_tenants_drops_device_metadata() {
        let user: Value = serde_json::from_str(FIXTURE).unwrap();
        let device = json!({
            "class": "ADC",
            "schemaVersion": "3.50.0",
            "id": "autogen_1234",
            "updateMode": "selective",
            "controls": {"archiveTimestamp": "2024-01-01T00:00:00Z"},
            "ansible": {"class": "Tenant", "A1": {"class": "Application"}},
            "other": {"class": "Tenant"}
        });

        let state = reconcile_tenants(&user, &device, &["ansible".to_string()]).unwrap();
        assert_eq!(state["class"], "AS3");
        let adc = &state["declaration"];
        assert_eq!(adc["schemaVersion"], "3.50.0");
        assert!(adc.get("id").is_none());
        assert!(adc.get("updateMode").is_none());
        assert!(adc.get("controls").is_none());
        assert!(adc.get("other").is_none());
        assert_eq!(adc["ansible"], json!({"class": "Tenant", "A1": {"class": "Application"}}));
    }

    #[test]
    fn test_reconcile_tenants_gone() {
        let user: Value = serde_json::from_str(FIXTURE).unwrap();
        let device = json!({"class": "ADC", "schemaVersion": "3.50.0"});
        assert_eq!(reconcile_tenants(&user, &device, &["ansible".to_string()]), None);
    }

    #[test]
    fn test_reconcile_applications() {
        let user = json!({
            "schemaVersion": "3.50.0",
            "A1": {"class": "Application", "template": "generic"},
            "A3": {"class": "Application"}
        });
        let device = json!({
            "class": "ADC",
            "ansible": {"class": "Tenant", "A1": {"class": "Application", "template": "http"}, "A2": {"class": "Application"}}
        });
        let managed = vec!["A1".to_string(), "A3".to_string()];

        let state = reconcile_applications(&user, &device, "ansible", &managed).unwrap();
        assert_eq!(
            state,
            json!({"schemaVersion": "3.50.0", "A1": {"class": "Application", "template": "http"}})
        );
        assert_eq!(
            reconcile_applications(&user, &device, "missing", &managed),
            None
        );
    }

    #[test]
    fn test_submission_checks() {
        let doc: Value = serde_json::from_str(FIXTURE).unwrap();
        assert_eq!(tenants_for_submission(&doc).unwrap(), vec!["ansible"]);
        assert!(applications_for_submission(&doc).is_err());
        assert!(tenants_for_submission(&json!({"class": "ADC"})).is_err());

        let per_app = json!({"schemaVersion": "3.50.0", "app1": {"class": "Application"}});
        assert_eq!(applications_for_submission(&per_app).unwrap(), vec!["app1"]);
    }

    #[test]
    fn test_bigiq_target_helpers() {
        let doc = json!({
            "class": "AS3",
            "declaration": {
                "class": "ADC",
                "target": {"address": "10.1.1.9"},
                "t1": {"class": "Tenant", "app": {"class": "Application"}}
            }
        });
        assert_eq!(target_of(&doc), Some("10.1.1.9"));

        let listing = json!([
            {"class": "ADC", "target": {"address": "10.1.1.8"}},
            {"class": "ADC", "target": {"address": "10.1.1.9"}, "t1": {"class": "Tenant"}}
        ]);
        let found = declaration_for_target(&listing, "10.1.1.9").unwrap();
        assert!(found.get("t1").is_some());
        assert!(declaration_for_target(&listing, "10.9.9.9").is_none());

        let emptied = empty_tenants(&doc);
        assert_eq!(emptied["declaration"]["t1"], json!({"class": "Tenant"}));
        assert_eq!(emptied["declaration"]["target"]["address"], "10.1.1.9");
    }
}
