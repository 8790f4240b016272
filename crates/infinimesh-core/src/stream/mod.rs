// ── Reactive shadow streams ──
//
// Subscription type for consuming cache changes from the ShadowCache.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::{DeviceId, ShadowState};
use crate::store::ShadowMap;

/// A subscription to the shadow cache.
///
/// Provides both point-in-time snapshot access and reactive change
/// notification via [`changed`](Self::changed) or by converting to a `Stream`.
pub struct ShadowStream {
    current: ShadowMap,
    receiver: watch::Receiver<ShadowMap>,
}

impl ShadowStream {
    pub(crate) fn new(receiver: watch::Receiver<ShadowMap>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// Get the snapshot captured at creation (or at the last `changed`).
    pub fn current(&self) -> &ShadowMap {
        &self.current
    }

    /// Get the latest snapshot (may have changed since creation).
    pub fn latest(&self) -> ShadowMap {
        self.receiver.borrow().clone()
    }

    /// One device from the current snapshot, empty if unknown.
    pub fn get(&self, device: &DeviceId) -> Arc<ShadowState> {
        self.current
            .get(device)
            .cloned()
            .unwrap_or_default()
    }

    /// Wait for the next change, returning the new snapshot.
    /// Returns `None` if the cache has been dropped.
    pub async fn changed(&mut self) -> Option<ShadowMap> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> ShadowWatchStream {
        ShadowWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
///
/// Yields the current map first, then a new one after every merge
/// (intermediate maps may be skipped when the consumer is slow).
pub struct ShadowWatchStream {
    inner: WatchStream<ShadowMap>,
}

impl Stream for ShadowWatchStream {
    type Item = ShadowMap;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
