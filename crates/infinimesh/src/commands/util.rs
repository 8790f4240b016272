//! Shared helpers for command handlers.

use std::collections::BTreeSet;
use std::path::Path;

use serde_json::{Map, Value};

use infinimesh_core::{Connection, DeviceId};

use crate::error::CliError;

/// Parse device arguments, dropping duplicates but keeping first-seen order.
pub fn parse_device_ids(raw: &[String]) -> Result<Vec<DeviceId>, CliError> {
    let mut seen = BTreeSet::new();
    let mut ids = Vec::with_capacity(raw.len());
    for arg in raw {
        let trimmed = arg.trim();
        if trimmed.is_empty() {
            return Err(CliError::Validation {
                field: "device".into(),
                reason: "device identifiers cannot be empty".into(),
            });
        }
        let id = DeviceId::new(trimmed);
        if seen.insert(id.clone()) {
            ids.push(id);
        }
    }
    Ok(ids)
}

/// Load a patch payload from the inline argument or `--from-file`.
///
/// The payload must be a JSON object; its keys are merged into the
/// target state document.
pub fn read_json_object(
    inline: Option<&str>,
    from_file: Option<&Path>,
) -> Result<Map<String, Value>, CliError> {
    let value: Value = match (inline, from_file) {
        (_, Some(path)) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        (Some(text), None) => serde_json::from_str(text)?,
        (None, None) => {
            return Err(CliError::Validation {
                field: "data".into(),
                reason: "provide a JSON object or --from-file".into(),
            });
        }
    };

    match value {
        Value::Object(map) => Ok(map),
        other => Err(CliError::Validation {
            field: "data".into(),
            reason: format!("expected a JSON object, got {}", json_kind(&other)),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Whether the connection record says the device is online.
pub fn is_connected(connection: &Connection) -> Option<bool> {
    connection.get("connected").and_then(Value::as_bool)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_devices_are_dropped_in_order() {
        let raw = vec!["b".to_string(), "a".into(), " b ".into()];
        let ids = parse_device_ids(&raw).unwrap();
        assert_eq!(ids, vec![DeviceId::new("b"), DeviceId::new("a")]);
    }

    #[test]
    fn blank_device_is_rejected() {
        let raw = vec!["a".to_string(), "  ".into()];
        assert!(matches!(
            parse_device_ids(&raw),
            Err(CliError::Validation { .. })
        ));
    }

    #[test]
    fn payload_must_be_an_object() {
        let map = read_json_object(Some(r#"{"led":"on"}"#), None).unwrap();
        assert_eq!(map.get("led"), Some(&Value::from("on")));

        let err = read_json_object(Some("[1,2]"), None).unwrap_err();
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn payload_can_come_from_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patch.json");
        std::fs::write(&path, r#"{"threshold": 4}"#).unwrap();

        let map = read_json_object(None, Some(&path)).unwrap();
        assert_eq!(map.get("threshold"), Some(&Value::from(4)));
    }

    #[test]
    fn connection_flag_is_optional() {
        let mut conn = Connection::new();
        assert_eq!(is_connected(&conn), None);
        conn.insert("connected".into(), Value::Bool(true));
        assert_eq!(is_connected(&conn), Some(true));
    }
}
