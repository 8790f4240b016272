// ── Domain model ──
//
// Canonical types the core operates on. Wire shapes live in
// `infinimesh_api::models` and are converted in `crate::convert`.

pub mod device;
pub mod device_id;
pub mod shadow;

pub use device::Device;
pub use device_id::{AccessLevel, DeviceId};
pub use shadow::{Connection, ShadowDelta, ShadowPatch, ShadowState, StateDocument, StateField};
