// ── Shadow entries and deltas ──
//
// A shadow has three independent fields. `reported` and `desired` merge
// key by key; `connection` is atomic and always replaced whole.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::DeviceId;

/// Connectivity record, opaque to the core.
pub type Connection = Map<String, Value>;

// ── StateDocument ───────────────────────────────────────────────────

/// One state document: `{ data, version, timestamp }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDocument {
    pub data: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl StateDocument {
    pub fn from_data(data: Map<String, Value>) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    /// Overlay `incoming` onto this document.
    ///
    /// Incoming keys win; keys absent from `incoming` survive. Version and
    /// timestamp follow the incoming document when it carries them.
    pub fn merge(&mut self, incoming: Self) {
        self.data.extend(incoming.data);
        if incoming.version.is_some() {
            self.version = incoming.version;
        }
        if incoming.timestamp.is_some() {
            self.timestamp = incoming.timestamp;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.version.is_none() && self.timestamp.is_none()
    }
}

// ── ShadowState ─────────────────────────────────────────────────────

/// Last known shadow of one device. Every field defaults to empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShadowState {
    pub reported: StateDocument,
    pub desired: StateDocument,
    pub connection: Connection,
}

impl ShadowState {
    /// Merge a delta's fields into this entry.
    pub fn apply(&mut self, delta: ShadowDelta) {
        if let Some(reported) = delta.reported {
            self.reported.merge(reported);
        }
        if let Some(desired) = delta.desired {
            self.desired.merge(desired);
        }
        if let Some(connection) = delta.connection {
            self.connection = connection;
        }
    }

    pub fn field(&self, field: StateField) -> &StateDocument {
        match field {
            StateField::Reported => &self.reported,
            StateField::Desired => &self.desired,
        }
    }
}

// ── ShadowDelta ─────────────────────────────────────────────────────

/// A partial update for one device, from a snapshot or the push channel.
///
/// Absent fields are left alone by the merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowDelta {
    pub device: DeviceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported: Option<StateDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired: Option<StateDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<Connection>,
}

impl ShadowDelta {
    pub fn new(device: impl Into<DeviceId>) -> Self {
        Self {
            device: device.into(),
            reported: None,
            desired: None,
            connection: None,
        }
    }

    pub fn with_reported(mut self, data: Map<String, Value>) -> Self {
        self.reported = Some(StateDocument::from_data(data));
        self
    }

    pub fn with_desired(mut self, data: Map<String, Value>) -> Self {
        self.desired = Some(StateDocument::from_data(data));
        self
    }

    pub fn with_connection(mut self, connection: Connection) -> Self {
        self.connection = Some(connection);
        self
    }

    /// True when the delta carries none of the three fields.
    pub fn is_empty(&self) -> bool {
        self.reported.is_none() && self.desired.is_none() && self.connection.is_none()
    }
}

// ── Mutation ────────────────────────────────────────────────────────

/// Which state document a patch targets.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StateField {
    Reported,
    Desired,
}

/// A single-device state patch: `{ device, <field>: { data } }`.
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowPatch {
    pub device: DeviceId,
    pub field: StateField,
    pub data: Map<String, Value>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(m) => m,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn merge_keeps_keys_missing_from_incoming() {
        let mut doc = StateDocument::from_data(map(json!({ "a": 1, "b": 2 })));
        doc.merge(StateDocument::from_data(map(json!({ "b": 3 }))));
        assert_eq!(Value::Object(doc.data), json!({ "a": 1, "b": 3 }));
    }

    #[test]
    fn merge_keeps_version_when_incoming_has_none() {
        let mut doc = StateDocument {
            version: Some(4),
            ..StateDocument::default()
        };
        doc.merge(StateDocument::from_data(map(json!({ "x": true }))));
        assert_eq!(doc.version, Some(4));

        doc.merge(StateDocument {
            version: Some(5),
            ..StateDocument::default()
        });
        assert_eq!(doc.version, Some(5));
        assert_eq!(doc.data["x"], json!(true));
    }

    #[test]
    fn connection_is_replaced_whole() {
        let mut state = ShadowState::default();
        state.apply(ShadowDelta::new("d").with_connection(map(json!({ "status": "online", "since": 1 }))));
        state.apply(
            ShadowDelta::new("d").with_connection(map(json!({ "status": "offline", "latency": 5 }))),
        );
        assert_eq!(
            Value::Object(state.connection),
            json!({ "status": "offline", "latency": 5 })
        );
    }

    #[test]
    fn absent_fields_are_untouched() {
        let mut state = ShadowState::default();
        state.apply(ShadowDelta::new("d").with_desired(map(json!({ "target": 20 }))));
        state.apply(ShadowDelta::new("d").with_reported(map(json!({ "temp": 19 }))));
        assert_eq!(state.desired.data["target"], json!(20));
        assert_eq!(state.reported.data["temp"], json!(19));
        assert!(state.connection.is_empty());
    }

    #[test]
    fn state_field_round_trips_through_strings() {
        assert_eq!("desired".parse::<StateField>().unwrap(), StateField::Desired);
        assert_eq!(StateField::Reported.to_string(), "reported");
    }
}
