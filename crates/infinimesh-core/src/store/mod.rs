// ── Reactive data stores ──
//
// Concurrent storage with push-based change notification.

mod directory;
mod shadow_cache;

pub use directory::DeviceDirectoryCache;
pub use shadow_cache::{ShadowCache, ShadowMap};
