use serde::{Deserialize, Serialize};

use super::{AccessLevel, DeviceId};

/// A directory entry: one device and the caller's access to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub title: String,
    pub enabled: bool,
    pub basic_enabled: bool,
    pub tags: Vec<String>,
    /// Level from the access record; `None` when the record omits it.
    pub access_level: Option<AccessLevel>,
    pub role: Option<String>,
    pub namespace: Option<String>,
}

impl Device {
    /// Effective access level. A missing level counts as `READ`.
    pub fn level(&self) -> AccessLevel {
        self.access_level.unwrap_or(AccessLevel::Read)
    }
}
