// ── Shadow cache ──
//
// Device id -> last known shadow. Every write is a field-level merge done
// under the entry's shard lock, so a snapshot and a push delta racing on
// the same device cannot drop each other's keys.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{broadcast, watch};
use tracing::trace;

use crate::model::{DeviceId, ShadowDelta, ShadowState};
use crate::stream::ShadowStream;

const CHANGE_CHANNEL_CAPACITY: usize = 1024;

/// Point-in-time view of every cached shadow.
pub type ShadowMap = Arc<HashMap<DeviceId, Arc<ShadowState>>>;

/// Reactive, concurrent store of device shadows.
///
/// The only write path is [`apply_delta`](Self::apply_delta) (and
/// [`apply_snapshot`](Self::apply_snapshot), which is a batch of deltas).
pub struct ShadowCache {
    entries: DashMap<DeviceId, Arc<ShadowState>>,

    /// Full map, updated on every merge for subscribers.
    snapshot: watch::Sender<ShadowMap>,

    /// Version counter, bumped on every merge.
    version: watch::Sender<u64>,

    /// Id of every device touched by a merge, in merge order.
    changes: broadcast::Sender<DeviceId>,
}

impl ShadowCache {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(HashMap::new()));
        let (version, _) = watch::channel(0u64);
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);

        Self {
            entries: DashMap::new(),
            snapshot,
            version,
            changes,
        }
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Merge one delta into the device's entry, creating it if absent.
    ///
    /// `reported.data` and `desired.data` are overlaid key by key;
    /// `connection` is replaced whole. Returns the merged entry.
    pub fn apply_delta(&self, delta: ShadowDelta) -> Arc<ShadowState> {
        let device = delta.device.clone();

        let merged = {
            let mut entry = self.entries.entry(device.clone()).or_default();
            Arc::make_mut(entry.value_mut()).apply(delta);
            let merged = Arc::clone(entry.value());

            // Published while the shard lock is held so snapshot order
            // matches merge order for this device.
            let published = Arc::clone(&merged);
            let key = device.clone();
            self.snapshot.send_modify(move |snap| {
                Arc::make_mut(snap).insert(key, published);
            });
            merged
        };

        self.version.send_modify(|v| *v += 1);
        trace!(%device, "shadow merged");
        // No receivers is fine.
        let _ = self.changes.send(device);

        merged
    }

    /// Merge a batch of fetched shadows, in order.
    pub fn apply_snapshot(&self, deltas: impl IntoIterator<Item = ShadowDelta>) -> usize {
        let mut applied = 0;
        for delta in deltas {
            self.apply_delta(delta);
            applied += 1;
        }
        applied
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Current shadow of `device`. Unknown devices yield an empty entry.
    pub fn lookup(&self, device: &DeviceId) -> Arc<ShadowState> {
        self.entries
            .get(device)
            .map_or_else(|| Arc::new(ShadowState::default()), |r| Arc::clone(r.value()))
    }

    pub fn contains(&self, device: &DeviceId) -> bool {
        self.entries.contains_key(device)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of merges applied so far.
    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    /// Current full map (cheap `Arc` clone).
    pub fn snapshot(&self) -> ShadowMap {
        self.snapshot.borrow().clone()
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Reactive view over the whole cache.
    pub fn subscribe(&self) -> ShadowStream {
        ShadowStream::new(self.snapshot.subscribe())
    }

    /// Per-device change notifications, one per merge.
    pub fn changes(&self) -> broadcast::Receiver<DeviceId> {
        self.changes.subscribe()
    }
}

impl Default for ShadowCache {
    fn default() -> Self {
        Self::new()
    }
}
