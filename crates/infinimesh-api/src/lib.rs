// infinimesh-api: Async Rust client for the infinimesh device and shadow APIs

pub mod client;
pub mod devices;
pub mod error;
pub mod models;
pub mod shadows;
pub mod transport;
pub mod websocket;

pub use client::NodeClient;
pub use error::Error;
pub use transport::{TlsMode, TransportConfig};
pub use websocket::{ReconnectConfig, StateStream, backoff_delay};
