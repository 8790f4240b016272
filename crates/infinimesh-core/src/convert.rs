// ── Wire-to-domain conversions ──
//
// Each `From` impl maps one `infinimesh_api::models` shape onto its
// domain counterpart (and back for outgoing requests).

use infinimesh_api::models::{DeviceRecord, Level, Shadow, State};

use crate::model::{AccessLevel, Device, DeviceId, ShadowDelta, ShadowPatch, StateDocument, StateField};

// ── Access levels ────────────────────────────────────────────────────

impl From<Level> for AccessLevel {
    fn from(level: Level) -> Self {
        match level {
            Level::None => Self::None,
            Level::Read => Self::Read,
            Level::Mgmt => Self::Mgmt,
            Level::Admin => Self::Admin,
            Level::Root => Self::Root,
        }
    }
}

impl From<AccessLevel> for Level {
    fn from(level: AccessLevel) -> Self {
        match level {
            AccessLevel::None => Self::None,
            AccessLevel::Read => Self::Read,
            AccessLevel::Mgmt => Self::Mgmt,
            AccessLevel::Admin => Self::Admin,
            AccessLevel::Root => Self::Root,
        }
    }
}

// ── Devices ──────────────────────────────────────────────────────────

impl From<DeviceRecord> for Device {
    fn from(record: DeviceRecord) -> Self {
        let access = record.access.unwrap_or_default();
        Self {
            id: DeviceId::from(record.uuid),
            title: record.title,
            enabled: record.enabled,
            basic_enabled: record.basic_enabled,
            tags: record.tags,
            access_level: access.level.map(AccessLevel::from),
            role: access.role,
            namespace: access.namespace,
        }
    }
}

// ── Shadows ──────────────────────────────────────────────────────────

impl From<State> for StateDocument {
    fn from(state: State) -> Self {
        Self {
            data: state.data,
            version: state.version,
            timestamp: state.timestamp,
        }
    }
}

impl From<Shadow> for ShadowDelta {
    fn from(shadow: Shadow) -> Self {
        Self {
            device: DeviceId::from(shadow.device),
            reported: shadow.reported.map(StateDocument::from),
            desired: shadow.desired.map(StateDocument::from),
            connection: shadow.connection,
        }
    }
}

impl From<&ShadowPatch> for Shadow {
    fn from(patch: &ShadowPatch) -> Self {
        let state = Some(State {
            data: patch.data.clone(),
            ..State::default()
        });
        let (reported, desired) = match patch.field {
            StateField::Reported => (state, None),
            StateField::Desired => (None, state),
        };
        Self {
            device: patch.device.to_string(),
            reported,
            desired,
            connection: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use infinimesh_api::models::Access;
    use serde_json::json;

    #[test]
    fn device_without_level_reads_as_read() {
        let device = Device::from(DeviceRecord {
            uuid: "d-1".into(),
            title: "Sensor".into(),
            enabled: true,
            basic_enabled: false,
            tags: vec![],
            access: Some(Access {
                level: None,
                role: Some("OWNER".into()),
                namespace: Some("lab".into()),
            }),
        });
        assert_eq!(device.access_level, None);
        assert_eq!(device.level(), AccessLevel::Read);
        assert_eq!(device.namespace.as_deref(), Some("lab"));
    }

    #[test]
    fn patch_targets_exactly_one_field() {
        let mut data = serde_json::Map::new();
        data.insert("x".into(), json!(1));
        let patch = ShadowPatch {
            device: DeviceId::from("d-1"),
            field: StateField::Reported,
            data,
        };
        let wire = Shadow::from(&patch);
        assert_eq!(wire.device, "d-1");
        assert!(wire.desired.is_none());
        assert_eq!(wire.reported.unwrap().data["x"], json!(1));
    }

    #[test]
    fn shadow_keeps_absent_fields_absent() {
        let delta = ShadowDelta::from(Shadow {
            device: "d-2".into(),
            connection: Some(serde_json::Map::new()),
            ..Shadow::default()
        });
        assert!(delta.reported.is_none());
        assert!(delta.desired.is_none());
        assert_eq!(delta.connection, Some(serde_json::Map::new()));
    }
}
