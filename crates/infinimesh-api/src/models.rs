// Wire types for the device directory, token issuer, and shadow endpoints.
//
// These mirror the JSON the RPC gateway speaks (camelCase field names,
// protobuf enum names, 64-bit integers as strings). Domain types live in
// `infinimesh-core`; nothing here carries merge or lifecycle semantics.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── Access ──────────────────────────────────────────────────────────

/// Access level as encoded on the wire (`"NONE"` .. `"ROOT"`).
///
/// The gateway emits enum names, but older deployments send the numeric
/// value; both are accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Level {
    None,
    Read,
    Mgmt,
    Admin,
    Root,
}

impl Level {
    fn from_number(n: i64) -> Option<Self> {
        match n {
            0 => Some(Self::None),
            1 => Some(Self::Read),
            2 => Some(Self::Mgmt),
            3 => Some(Self::Admin),
            4 => Some(Self::Root),
            _ => None,
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "NONE" => Some(Self::None),
            "READ" => Some(Self::Read),
            "MGMT" => Some(Self::Mgmt),
            "ADMIN" => Some(Self::Admin),
            "ROOT" => Some(Self::Root),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for Level {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Name(String),
            Number(i64),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Name(name) => Self::from_name(&name)
                .ok_or_else(|| de::Error::custom(format!("unknown access level {name:?}"))),
            Repr::Number(n) => Self::from_number(n)
                .ok_or_else(|| de::Error::custom(format!("unknown access level {n}"))),
        }
    }
}

/// Access record attached to a directory entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Access {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<Level>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

// ── Devices ─────────────────────────────────────────────────────────

/// A device as listed by `DevicesService/List`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    pub uuid: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub basic_enabled: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub access: Option<Access>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DevicesResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub devices: Vec<DeviceRecord>,
    #[serde(default, deserialize_with = "opt_u64")]
    pub total: Option<u64>,
}

// ── Tokens ──────────────────────────────────────────────────────────

/// Body of `DevicesService/MakeDevicesToken`.
///
/// `post` asks for a token that may also mutate state (MGMT); without it
/// the token is observation-only (READ).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DevicesTokenRequest {
    pub devices: BTreeMap<String, Level>,
    pub post: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

// ── Shadows ─────────────────────────────────────────────────────────

/// One state document (`reported` or `desired`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Map<String, Value>,
    #[serde(
        default,
        deserialize_with = "opt_u64",
        skip_serializing_if = "Option::is_none"
    )]
    pub version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// A device shadow, full or partial.
///
/// The same shape is used for snapshot results, patch requests, and
/// stream deltas; absent fields mean "not part of this message".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Shadow {
    pub device: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported: Option<State>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired: Option<State>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<Map<String, Value>>,
}

/// Body of `ShadowService/Get`.
#[derive(Debug, Clone, Serialize)]
pub struct GetShadowsRequest {
    pub pool: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetShadowsResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub shadows: Vec<Shadow>,
}

/// One frame of the state stream: `{ "result": <Shadow> }`.
///
/// Keepalive and error frames arrive without `result`.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamEnvelope {
    #[serde(default)]
    pub result: Option<Shadow>,
}

// ── Serde helpers ───────────────────────────────────────────────────

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// 64-bit integers arrive as JSON strings from the gateway; accept both.
fn opt_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    struct Visitor;

    impl de::Visitor<'_> for Visitor {
        type Value = Option<u64>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an unsigned integer or a numeric string")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            u64::try_from(v).map(Some).map_err(E::custom)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            v.parse().map(Some).map_err(E::custom)
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }
    }

    deserializer.deserialize_any(Visitor)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn level_accepts_names_and_numbers() {
        let named: Level = serde_json::from_value(json!("MGMT")).unwrap();
        let numbered: Level = serde_json::from_value(json!(3)).unwrap();
        assert_eq!(named, Level::Mgmt);
        assert_eq!(numbered, Level::Admin);
        assert!(serde_json::from_value::<Level>(json!("OWNER")).is_err());
    }

    #[test]
    fn level_serializes_as_enum_name() {
        assert_eq!(serde_json::to_value(Level::Read).unwrap(), json!("READ"));
    }

    #[test]
    fn devices_response_with_string_total() {
        let resp: DevicesResponse = serde_json::from_value(json!({
            "devices": [{
                "uuid": "d-1",
                "title": "Thermostat",
                "enabled": true,
                "basicEnabled": false,
                "tags": null,
                "access": { "level": "ADMIN", "namespace": "home" }
            }],
            "total": "1"
        }))
        .unwrap();

        assert_eq!(resp.total, Some(1));
        let device = &resp.devices[0];
        assert!(device.tags.is_empty());
        assert_eq!(
            device.access.as_ref().and_then(|a| a.level),
            Some(Level::Admin)
        );
    }

    #[test]
    fn state_tolerates_null_data_and_string_version() {
        let state: State = serde_json::from_value(json!({
            "data": null,
            "version": "7",
            "timestamp": "2024-03-01T10:00:00Z"
        }))
        .unwrap();
        assert!(state.data.is_empty());
        assert_eq!(state.version, Some(7));
        assert!(state.timestamp.is_some());
    }

    #[test]
    fn patch_body_omits_absent_fields() {
        let mut data = Map::new();
        data.insert("x".into(), json!(1));
        let patch = Shadow {
            device: "d-1".into(),
            desired: Some(State {
                data,
                ..State::default()
            }),
            ..Shadow::default()
        };
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({ "device": "d-1", "desired": { "data": { "x": 1 } } })
        );
    }

    #[test]
    fn token_request_shape() {
        let mut devices = BTreeMap::new();
        devices.insert("a".to_string(), Level::Read);
        devices.insert("b".to_string(), Level::Read);
        let body = DevicesTokenRequest {
            devices,
            post: false,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({ "devices": { "a": "READ", "b": "READ" }, "post": false })
        );
    }
}
