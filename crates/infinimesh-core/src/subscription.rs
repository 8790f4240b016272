// ── Subscription controller ──
//
// Owns the single push channel. Subscribing unions the requested devices
// with the live set, mints a READ token for the union, replaces the old
// channel, and only then publishes the new live set. Any close or error
// on the channel tears the whole subscription down; reconnecting is the
// caller's decision.

use std::collections::BTreeSet;
use std::sync::{Arc, Weak};

use futures_util::StreamExt;
use infinimesh_api::models::StreamEnvelope;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::{PushConnector, PushStream, TokenIssuer};
use crate::error::CoreError;
use crate::model::{AccessLevel, DeviceId, ShadowDelta};
use crate::store::ShadowCache;
use crate::token::TokenScoper;

/// Set of device ids bound to the open channel.
pub type LiveSet = Arc<BTreeSet<DeviceId>>;

// ── ChannelState ─────────────────────────────────────────────────────

/// Push channel lifecycle. Errors drop straight to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ChannelState {
    Closed,
    Connecting,
    Open,
}

// ── InboundMessage ───────────────────────────────────────────────────

/// One push frame, classified at the channel boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// `{ "result": { "device": .., ... } }`
    Delta(ShadowDelta),
    /// Valid JSON without a `result`.
    Empty,
    /// Not a JSON envelope at all.
    Malformed(String),
}

impl InboundMessage {
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str::<StreamEnvelope>(text) {
            Ok(StreamEnvelope {
                result: Some(shadow),
            }) => Self::Delta(ShadowDelta::from(shadow)),
            Ok(StreamEnvelope { result: None }) => Self::Empty,
            Err(e) => Self::Malformed(e.to_string()),
        }
    }
}

// ── SubscriptionController ───────────────────────────────────────────

/// Lifecycle manager for the live push channel.
///
/// Cheaply cloneable; all clones share one channel and one live set.
pub struct SubscriptionController<B> {
    inner: Arc<Inner<B>>,
}

impl<B> Clone for SubscriptionController<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<B> {
    backend: Arc<B>,
    scoper: TokenScoper<B>,
    cache: Arc<ShadowCache>,
    state: watch::Sender<ChannelState>,
    live: watch::Sender<LiveSet>,
    /// Serializes subscribe/unsubscribe and channel teardown.
    slot: Mutex<ChannelSlot>,
}

#[derive(Default)]
struct ChannelSlot {
    /// Bumped whenever the channel is replaced or dropped, so a reader
    /// task that outlived its channel leaves the state alone.
    generation: u64,
    active: Option<ActiveChannel>,
}

struct ActiveChannel {
    generation: u64,
    cancel: CancellationToken,
    _task: JoinHandle<()>,
}

impl ChannelSlot {
    fn retire(&mut self) {
        self.generation += 1;
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
        }
    }
}

impl<B> Drop for Inner<B> {
    fn drop(&mut self) {
        self.slot.get_mut().retire();
    }
}

impl<B> SubscriptionController<B>
where
    B: TokenIssuer + PushConnector + 'static,
{
    pub fn new(backend: Arc<B>, cache: Arc<ShadowCache>) -> Self {
        let (state, _) = watch::channel(ChannelState::Closed);
        let (live, _) = watch::channel(Arc::new(BTreeSet::new()));

        Self {
            inner: Arc::new(Inner {
                scoper: TokenScoper::new(Arc::clone(&backend)),
                backend,
                cache,
                state,
                live,
                slot: Mutex::new(ChannelSlot::default()),
            }),
        }
    }

    // ── Observation ──────────────────────────────────────────────────

    pub fn state(&self) -> ChannelState {
        *self.inner.state.borrow()
    }

    pub fn live_set(&self) -> LiveSet {
        self.inner.live.borrow().clone()
    }

    pub fn is_live(&self, device: &DeviceId) -> bool {
        self.inner.live.borrow().contains(device)
    }

    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.inner.state.subscribe()
    }

    pub fn watch_live(&self) -> watch::Receiver<LiveSet> {
        self.inner.live.subscribe()
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Add `devices` to the live set and (re)open the channel for the union.
    ///
    /// If minting fails the current channel is left as it was. If the
    /// handshake fails the controller ends `Closed` with an empty live set.
    pub async fn subscribe(
        &self,
        devices: impl IntoIterator<Item = DeviceId> + Send,
    ) -> Result<(), CoreError> {
        let requested: Vec<DeviceId> = devices.into_iter().collect();
        let mut slot = self.inner.slot.lock().await;

        let pool: BTreeSet<DeviceId> = self
            .inner
            .live
            .borrow()
            .iter()
            .cloned()
            .chain(requested)
            .collect();

        let token = self.inner.scoper.mint(&pool, AccessLevel::Read).await?;

        slot.retire();
        let generation = slot.generation;
        self.inner.state.send_replace(ChannelState::Connecting);
        debug!(devices = pool.len(), generation, "opening push channel");

        let stream = match self.inner.backend.open(token.secret()).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "push channel handshake failed");
                self.inner.reset();
                return Err(e);
            }
        };

        let devices = pool.len();
        self.inner.live.send_replace(Arc::new(pool));
        self.inner.state.send_replace(ChannelState::Open);
        info!(devices, generation, "push channel open");

        let cancel = CancellationToken::new();
        let task = tokio::spawn(read_channel(
            Arc::downgrade(&self.inner),
            Arc::clone(&self.inner.cache),
            generation,
            cancel.clone(),
            stream,
        ));
        slot.active = Some(ActiveChannel {
            generation,
            cancel,
            _task: task,
        });

        Ok(())
    }

    /// Close the channel and empty the live set.
    pub async fn unsubscribe_all(&self) {
        let mut slot = self.inner.slot.lock().await;
        slot.retire();
        self.inner.reset();
        info!("push channel closed by caller");
    }
}

impl<B> Inner<B> {
    fn reset(&self) {
        self.live.send_replace(Arc::new(BTreeSet::new()));
        self.state.send_replace(ChannelState::Closed);
    }

    /// Called by a reader whose channel ended on its own.
    async fn channel_ended(&self, generation: u64) {
        let mut slot = self.slot.lock().await;
        let current = slot
            .active
            .as_ref()
            .is_some_and(|active| active.generation == generation);
        if !current {
            return;
        }
        slot.retire();
        self.reset();
    }
}

// ── Channel reader ───────────────────────────────────────────────────

/// Route frames into the cache, in arrival order, until the channel ends
/// or is cancelled.
async fn read_channel<B>(
    inner: Weak<Inner<B>>,
    cache: Arc<ShadowCache>,
    generation: u64,
    cancel: CancellationToken,
    mut stream: PushStream,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(generation, "push channel reader cancelled");
                return;
            }
            frame = stream.next() => match frame {
                Some(Ok(text)) => route(&cache, &text),
                Some(Err(e)) => {
                    warn!(error = %e, generation, "push channel error");
                    break;
                }
                None => {
                    info!(generation, "push channel closed");
                    break;
                }
            }
        }
    }

    if let Some(inner) = inner.upgrade() {
        inner.channel_ended(generation).await;
    }
}

fn route(cache: &ShadowCache, text: &str) {
    match InboundMessage::parse(text) {
        InboundMessage::Delta(delta) => {
            cache.apply_delta(delta);
        }
        InboundMessage::Empty => warn!("push message without result, dropped"),
        InboundMessage::Malformed(reason) => {
            warn!(%reason, "malformed push message, dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_classifies_frames() {
        let delta = InboundMessage::parse(
            r#"{"result":{"device":"d1","reported":{"data":{"t":1}},"connection":{"up":true}}}"#,
        );
        match delta {
            InboundMessage::Delta(d) => {
                assert_eq!(d.device, DeviceId::from("d1"));
                assert_eq!(d.reported.map(|r| r.data["t"].clone()), Some(json!(1)));
                assert!(d.desired.is_none());
                assert!(d.connection.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }

        assert_eq!(InboundMessage::parse(r#"{"error":"x"}"#), InboundMessage::Empty);
        assert!(matches!(
            InboundMessage::parse("not json"),
            InboundMessage::Malformed(_)
        ));
    }

    #[test]
    fn route_ignores_bad_frames() {
        let cache = ShadowCache::new();
        route(&cache, "{}");
        route(&cache, "garbage");
        route(&cache, r#"{"result":{"device":"d1","desired":{"data":{"x":2}}}}"#);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.lookup(&DeviceId::from("d1")).desired.data["x"], json!(2));
    }
}
