//! Declarative Onboarding declarations.

use serde_json::Value;

use super::{parse_document, retain_user_keys};
use crate::error::ProviderError;

/// Members DO adds to the declaration it reports back.
const DEVICE_METADATA: &[&str] = &["id", "schemaVersion", "async", "label"];

/// Parse `do_json` and check it is a DO request or a bare `Device`
/// declaration.
pub fn parse_declaration(raw: &str) -> Result<Value, ProviderError> {
    let document = parse_document("do_json", raw)?;
    match document.get("class").and_then(Value::as_str) {
        Some("DO") | Some("Device") => Ok(document),
        Some(other) => Err(ProviderError::Validation(format!(
            "do_json must be of class DO or Device, got {other}"
        ))),
        None => Err(ProviderError::Validation(
            "do_json has no class member".into(),
        )),
    }
}

/// Rebuild the user's declaration from a DO task document.
///
/// The task reports the declaration it applied under `declaration`; the
/// `Common` settings replace the user's and injected members the user did
/// not write are dropped. Returns `None` when the task carries no
/// declaration.
pub fn reconcile(user: &Value, task: &Value) -> Option<Value> {
    let applied = task.get("declaration")?.as_object()?;
    let mut applied = applied.clone();

    match user.get("declaration") {
        Some(user_device) => {
            retain_user_keys(&mut applied, user_device, DEVICE_METADATA);
            let mut document = user.clone();
            document["declaration"] = Value::Object(applied);
            Some(document)
        }
        None => {
            retain_user_keys(&mut applied, user, DEVICE_METADATA);
            Some(Value::Object(applied))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_parse_declaration() {
        assert!(parse_declaration(r#"{"class":"DO","declaration":{"class":"Device"}}"#).is_ok());
        assert!(parse_declaration(r#"{"class":"Device","schemaVersion":"1.0.0"}"#).is_ok());

        let err = parse_declaration(r#"{"class":"AS3"}"#).unwrap_err();
        assert_eq!(err.message(), "do_json must be of class DO or Device, got AS3");
        assert!(parse_declaration("{").is_err());
    }

    #[test]
    fn test_reconcile_wrapped() {
        let user = json!({
            "schemaVersion": "1.0.0",
            "class": "DO",
            "declaration": {
                "class": "Device",
                "schemaVersion": "1.0.0",
                "Common": {"class": "Tenant", "hostname": "bigip1.example.com"}
            }
        });
        let task = json!({
            "id": "5f7ad2a2",
            "result": {"class": "Result", "code": 200, "status": "OK"},
            "declaration": {
                "class": "Device",
                "schemaVersion": "1.0.0",
                "id": "5f7ad2a2",
                "Common": {"class": "Tenant", "hostname": "bigip2.example.com"}
            }
        });

        let state = reconcile(&user, &task).unwrap();
        assert_eq!(state["class"], "DO");
        assert_eq!(
            state["declaration"],
            json!({
                "class": "Device",
                "schemaVersion": "1.0.0",
                "Common": {"class": "Tenant", "hostname": "bigip2.example.com"}
            })
        );
    }

    #[test]
    fn test_reconcile_without_declaration() {
        let user = json!({"class": "Device"});
        assert_eq!(reconcile(&user, &json!({"id": "x", "result": {}})), None);

        let state = reconcile(&user, &json!({"declaration": {"class": "Device", "id": "x"}})).unwrap();
        assert_eq!(state, json!({"class": "Device"}));
    }
}
