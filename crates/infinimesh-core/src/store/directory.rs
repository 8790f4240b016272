// ── Device directory cache ──
//
// Devices known from the directory, keyed by id, with the caller's access
// level on each. Used to gate observation/mutation and to order listings.

use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

use crate::error::CoreError;
use crate::model::{AccessLevel, Device, DeviceId};

pub struct DeviceDirectoryCache {
    devices: DashMap<DeviceId, Arc<Device>>,
    snapshot: watch::Sender<Arc<Vec<Arc<Device>>>>,
}

impl DeviceDirectoryCache {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            devices: DashMap::new(),
            snapshot,
        }
    }

    /// Insert or update every device; entries not in `devices` are kept.
    pub fn merge(&self, devices: impl IntoIterator<Item = Device>) {
        for device in devices {
            self.devices.insert(device.id.clone(), Arc::new(device));
        }
        self.rebuild_snapshot();
    }

    /// Replace the whole directory with `devices`.
    ///
    /// New entries land before stale ones are removed, so a device present
    /// in both listings stays visible to concurrent readers throughout.
    pub fn replace(&self, devices: impl IntoIterator<Item = Device>) {
        let mut keep = BTreeSet::new();
        for device in devices {
            keep.insert(device.id.clone());
            self.devices.insert(device.id.clone(), Arc::new(device));
        }
        self.devices.retain(|id, _| keep.contains(id));
        self.rebuild_snapshot();
    }

    pub fn get(&self, id: &DeviceId) -> Option<Arc<Device>> {
        self.devices.get(id).map(|r| Arc::clone(r.value()))
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn ids(&self) -> Vec<DeviceId> {
        self.devices.iter().map(|r| r.key().clone()).collect()
    }

    pub fn snapshot(&self) -> Arc<Vec<Arc<Device>>> {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<Device>>>> {
        self.snapshot.subscribe()
    }

    // ── Access ───────────────────────────────────────────────────────

    /// The caller's level on `id`, or `None` for an unknown device.
    pub fn access_level(&self, id: &DeviceId) -> Option<AccessLevel> {
        self.devices.get(id).map(|d| d.level())
    }

    /// Fail on the first device (in `ids` order) whose level is below
    /// `required`. Unknown devices count as `NONE`.
    pub fn check_access<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a DeviceId>,
        required: AccessLevel,
    ) -> Result<(), CoreError> {
        for id in ids {
            let actual = self.access_level(id).unwrap_or(AccessLevel::None);
            if actual < required {
                return Err(CoreError::InsufficientAccess {
                    device: id.clone(),
                    required,
                    actual,
                });
            }
        }
        Ok(())
    }

    // ── Ordering ─────────────────────────────────────────────────────

    /// Devices ordered for display, optionally limited to one namespace.
    ///
    /// Score is `enabled + level + basic_enabled + live`, highest first;
    /// ties fall back to title, then id.
    pub fn ranked(&self, namespace: Option<&str>, live: &BTreeSet<DeviceId>) -> Vec<Arc<Device>> {
        let mut devices: Vec<Arc<Device>> = self
            .devices
            .iter()
            .filter(|r| namespace.is_none_or(|ns| r.value().namespace.as_deref() == Some(ns)))
            .map(|r| Arc::clone(r.value()))
            .collect();

        devices.sort_by_cached_key(|d| (Reverse(score(d, live)), d.title.clone(), d.id.clone()));
        devices
    }

    fn rebuild_snapshot(&self) {
        let mut values: Vec<Arc<Device>> = self.devices.iter().map(|r| Arc::clone(r.value())).collect();
        values.sort_by(|a, b| a.id.cmp(&b.id));
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }
}

impl Default for DeviceDirectoryCache {
    fn default() -> Self {
        Self::new()
    }
}

fn score(device: &Device, live: &BTreeSet<DeviceId>) -> u8 {
    u8::from(device.enabled)
        + device.level().rank()
        + u8::from(device.basic_enabled)
        + u8::from(live.contains(&device.id))
}
