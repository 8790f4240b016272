// ── Token Scoper ──
//
// Mints a bearer credential scoped to one device set at one level. Every
// call is a fresh round-trip to the issuer; nothing is cached.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use secrecy::SecretString;
use tracing::debug;

use crate::backend::TokenIssuer;
use crate::error::CoreError;
use crate::model::{AccessLevel, DeviceId};

/// A credential together with the scope it was minted for.
///
/// Owned by the operation that requested it; drop it when that
/// operation is done.
#[derive(Clone)]
pub struct ScopedToken {
    devices: BTreeSet<DeviceId>,
    level: AccessLevel,
    secret: SecretString,
}

impl ScopedToken {
    pub fn new(devices: BTreeSet<DeviceId>, level: AccessLevel, secret: SecretString) -> Self {
        Self {
            devices,
            level,
            secret,
        }
    }

    pub fn devices(&self) -> &BTreeSet<DeviceId> {
        &self.devices
    }

    pub fn level(&self) -> AccessLevel {
        self.level
    }

    pub fn secret(&self) -> &SecretString {
        &self.secret
    }

    /// Whether this token may be used for `device` at `level`.
    pub fn covers(&self, device: &DeviceId, level: AccessLevel) -> bool {
        level <= self.level && self.devices.contains(device)
    }
}

impl fmt::Debug for ScopedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedToken")
            .field("devices", &self.devices)
            .field("level", &self.level)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Mints [`ScopedToken`]s through a [`TokenIssuer`].
pub struct TokenScoper<I> {
    issuer: Arc<I>,
}

impl<I> Clone for TokenScoper<I> {
    fn clone(&self) -> Self {
        Self {
            issuer: Arc::clone(&self.issuer),
        }
    }
}

impl<I: TokenIssuer> TokenScoper<I> {
    pub fn new(issuer: Arc<I>) -> Self {
        Self { issuer }
    }

    /// Mint a token for exactly `devices` at `level`.
    ///
    /// `devices` must be non-empty and `level` must be `READ` or `MGMT`.
    /// Issuer failures propagate unchanged; there is no retry here.
    pub async fn mint(
        &self,
        devices: &BTreeSet<DeviceId>,
        level: AccessLevel,
    ) -> Result<ScopedToken, CoreError> {
        if devices.is_empty() {
            return Err(CoreError::EmptyDeviceSet);
        }
        if !matches!(level, AccessLevel::Read | AccessLevel::Mgmt) {
            return Err(CoreError::UnsupportedScope { level });
        }

        let secret = self.issuer.issue(devices, level).await?;
        debug!(devices = devices.len(), %level, "minted scoped token");

        Ok(ScopedToken::new(devices.clone(), level, secret))
    }
}
