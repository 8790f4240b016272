// ── Identity and privilege ──
//
// DeviceId keys every cache; AccessLevel orders what a credential may do.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ── DeviceId ────────────────────────────────────────────────────────

/// Opaque device identifier (the directory's `uuid`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_owned()))
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl AsRef<str> for DeviceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ── AccessLevel ─────────────────────────────────────────────────────

/// Capability on a device, totally ordered by privilege.
///
/// Observation needs `Read`; mutation needs `Mgmt` or higher.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum AccessLevel {
    None,
    Read,
    Mgmt,
    Admin,
    Root,
}

impl AccessLevel {
    /// Numeric rank used for display ordering (`NONE` = 0 .. `ROOT` = 4).
    pub fn rank(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Read => 1,
            Self::Mgmt => 2,
            Self::Admin => 3,
            Self::Root => 4,
        }
    }

    /// Whether this level is enough to change shadow state.
    pub fn can_mutate(self) -> bool {
        self >= Self::Mgmt
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn levels_are_totally_ordered() {
        let levels: Vec<AccessLevel> = AccessLevel::iter().collect();
        assert!(levels.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(levels.last().map(|l| l.rank()), Some(4));
    }

    #[test]
    fn level_parses_case_insensitively() {
        assert_eq!("mgmt".parse::<AccessLevel>().unwrap(), AccessLevel::Mgmt);
        assert_eq!(AccessLevel::Admin.to_string(), "ADMIN");
        assert!("owner".parse::<AccessLevel>().is_err());
    }

    #[test]
    fn only_mgmt_and_above_mutate() {
        assert!(!AccessLevel::Read.can_mutate());
        assert!(AccessLevel::Mgmt.can_mutate());
        assert!(AccessLevel::Root.can_mutate());
    }

    #[test]
    fn device_id_is_transparent_in_json() {
        let id = DeviceId::from("d-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"d-1\"");
        assert_eq!(id.to_string(), "d-1");
    }
}
