// infinimesh-core: Device shadow sync between infinimesh-api and consumers.

pub mod backend;
pub mod config;
pub mod convert;
pub mod error;
pub mod model;
pub mod store;
pub mod stream;
pub mod subscription;
pub mod sync;
pub mod token;

// ── Primary re-exports ──────────────────────────────────────────────
pub use backend::{Backend, DeviceDirectory, PushConnector, PushStream, ShadowService, TokenIssuer};
pub use config::{SyncConfig, TlsVerification};
pub use error::CoreError;
pub use store::{DeviceDirectoryCache, ShadowCache, ShadowMap};
pub use stream::ShadowStream;
pub use subscription::{ChannelState, InboundMessage, LiveSet, SubscriptionController};
pub use sync::ShadowSync;
pub use token::{ScopedToken, TokenScoper};

pub use model::{
    AccessLevel, Connection, Device, DeviceId, ShadowDelta, ShadowPatch, ShadowState,
    StateDocument, StateField,
};
