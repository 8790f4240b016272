// ── Shadow sync facade ──
//
// Entry point for consumers. Constructed once at startup and shared by
// reference; owns the shadow cache, the directory cache and the
// subscription controller, and routes every operation through the
// token scoper.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use infinimesh_api::{NodeClient, TlsMode, TransportConfig};

use crate::backend::Backend;
use crate::config::{SyncConfig, TlsVerification};
use crate::error::CoreError;
use crate::model::{AccessLevel, Device, DeviceId, ShadowPatch, ShadowState, StateField};
use crate::store::{DeviceDirectoryCache, ShadowCache};
use crate::subscription::{ChannelState, SubscriptionController};
use crate::token::{ScopedToken, TokenScoper};

/// Device shadow synchronization over one backend.
///
/// Cheaply cloneable; clones share all state.
pub struct ShadowSync<B> {
    backend: Arc<B>,
    scoper: TokenScoper<B>,
    cache: Arc<ShadowCache>,
    directory: Arc<DeviceDirectoryCache>,
    subscriptions: SubscriptionController<B>,
}

impl<B> Clone for ShadowSync<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            scoper: self.scoper.clone(),
            cache: Arc::clone(&self.cache),
            directory: Arc::clone(&self.directory),
            subscriptions: self.subscriptions.clone(),
        }
    }
}

impl ShadowSync<NodeClient> {
    /// Build a gateway-backed instance. Does not touch the network.
    pub fn connect(config: &SyncConfig) -> Result<Self, CoreError> {
        let client = NodeClient::new(
            config.url.clone(),
            &config.account_token,
            &build_transport(config),
        )?;
        Ok(Self::new(client))
    }
}

impl<B: Backend> ShadowSync<B> {
    pub fn new(backend: B) -> Self {
        Self::from_arc(Arc::new(backend))
    }

    pub fn from_arc(backend: Arc<B>) -> Self {
        let cache = Arc::new(ShadowCache::new());
        Self {
            scoper: TokenScoper::new(Arc::clone(&backend)),
            subscriptions: SubscriptionController::new(Arc::clone(&backend), Arc::clone(&cache)),
            directory: Arc::new(DeviceDirectoryCache::new()),
            backend,
            cache,
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn scoper(&self) -> &TokenScoper<B> {
        &self.scoper
    }

    pub fn cache(&self) -> &Arc<ShadowCache> {
        &self.cache
    }

    pub fn directory(&self) -> &Arc<DeviceDirectoryCache> {
        &self.directory
    }

    pub fn subscriptions(&self) -> &SubscriptionController<B> {
        &self.subscriptions
    }

    // ── Shadow state ─────────────────────────────────────────────────

    /// Fetch shadows for `devices` with `token` and merge them into the
    /// cache.
    ///
    /// The token must cover every requested device at `READ` or above.
    pub async fn snapshot(&self, devices: &[DeviceId], token: &ScopedToken) -> Result<(), CoreError> {
        if devices.is_empty() {
            return Ok(());
        }
        if let Some(device) = devices.iter().find(|d| !token.covers(d, AccessLevel::Read)) {
            return Err(CoreError::OutOfScope {
                device: device.clone(),
            });
        }

        let shadows = self.backend.fetch(token.secret(), devices).await?;
        let applied = self.cache.apply_snapshot(shadows);
        debug!(requested = devices.len(), applied, "snapshot merged");
        Ok(())
    }

    /// Snapshot `devices` with a freshly minted READ token.
    pub async fn refresh_state(&self, devices: &[DeviceId]) -> Result<(), CoreError> {
        if devices.is_empty() {
            return Ok(());
        }
        let pool: BTreeSet<DeviceId> = devices.iter().cloned().collect();
        let token = self.scoper.mint(&pool, AccessLevel::Read).await?;
        self.snapshot(devices, &token).await
    }

    /// Patch one device's `reported` or `desired` data, then re-fetch it.
    ///
    /// The cache only changes through the confirming snapshot. If the
    /// patch request fails the cache is left untouched.
    pub async fn patch(
        &self,
        device: &DeviceId,
        field: StateField,
        data: Map<String, Value>,
    ) -> Result<Arc<ShadowState>, CoreError> {
        let scope = BTreeSet::from([device.clone()]);
        let token = self.scoper.mint(&scope, AccessLevel::Mgmt).await?;

        let patch = ShadowPatch {
            device: device.clone(),
            field,
            data,
        };
        if let Err(e) = self.backend.patch(token.secret(), &patch).await {
            warn!(%device, %field, error = %e, "patch rejected");
            return Err(e);
        }
        info!(%device, %field, "patch accepted, confirming");

        self.snapshot(std::slice::from_ref(device), &token).await?;
        Ok(self.cache.lookup(device))
    }

    /// Current cached shadow; empty for unknown devices.
    pub fn lookup(&self, device: &DeviceId) -> Arc<ShadowState> {
        self.cache.lookup(device)
    }

    // ── Live subscription ────────────────────────────────────────────

    pub async fn subscribe(
        &self,
        devices: impl IntoIterator<Item = DeviceId> + Send,
    ) -> Result<(), CoreError> {
        self.subscriptions.subscribe(devices).await
    }

    pub async fn unsubscribe_all(&self) {
        self.subscriptions.unsubscribe_all().await;
    }

    pub fn is_live(&self, device: &DeviceId) -> bool {
        self.subscriptions.is_live(device)
    }

    pub fn channel_state(&self) -> ChannelState {
        self.subscriptions.state()
    }

    // ── Directory ────────────────────────────────────────────────────

    /// Reload the device directory.
    ///
    /// `replace` drops devices that are no longer listed; otherwise the
    /// listing is merged in. With `fetch_state` every listed device is
    /// snapshotted afterwards.
    pub async fn refresh_devices(
        &self,
        fetch_state: bool,
        replace: bool,
    ) -> Result<Vec<DeviceId>, CoreError> {
        let devices: Vec<Device> = self.backend.list().await?;
        let ids: Vec<DeviceId> = devices.iter().map(|d| d.id.clone()).collect();
        debug!(count = ids.len(), replace, "device directory loaded");

        if replace {
            self.directory.replace(devices);
        } else {
            self.directory.merge(devices);
        }

        if fetch_state {
            self.refresh_state(&ids).await?;
        }
        Ok(ids)
    }

    pub fn access_level(&self, device: &DeviceId) -> Option<AccessLevel> {
        self.directory.access_level(device)
    }

    pub fn check_access(&self, devices: &[DeviceId], required: AccessLevel) -> Result<(), CoreError> {
        self.directory.check_access(devices, required)
    }

    /// Directory entries in display order, live devices boosted.
    pub fn ranked(&self, namespace: Option<&str>) -> Vec<Arc<Device>> {
        self.directory
            .ranked(namespace, &self.subscriptions.live_set())
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

fn build_transport(config: &SyncConfig) -> TransportConfig {
    TransportConfig {
        tls: match &config.tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        },
        timeout: config.timeout,
    }
}
