// ── Core error types ──
//
// Errors surfaced by the sync core. Transport details are folded into
// domain variants by the `From<infinimesh_api::Error>` impl; server
// messages are carried through verbatim.

use thiserror::Error;

use crate::model::{AccessLevel, DeviceId};

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Push channel closed: {reason}")]
    ChannelClosed { reason: String },

    // ── Scope errors ─────────────────────────────────────────────────
    #[error("A scoped token needs at least one device")]
    EmptyDeviceSet,

    #[error("Tokens are only minted at READ or MGMT level, not {level}")]
    UnsupportedScope { level: AccessLevel },

    #[error("Token does not cover device {device}")]
    OutOfScope { device: DeviceId },

    #[error("Insufficient access to {device}: {required} required, have {actual}")]
    InsufficientAccess {
        device: DeviceId,
        required: AccessLevel,
        actual: AccessLevel,
    },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// Connect error code, e.g. `"not_found"`.
        code: Option<String>,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether a caller-side retry loop may try again.
    ///
    /// Authentication, permission and scope errors never resolve on their
    /// own and are not retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } | Self::Timeout { .. } | Self::ChannelClosed { .. } => {
                true
            }
            Self::Api { code, status, .. } => {
                code.as_deref() == Some("unavailable") || status.is_some_and(|s| s >= 500)
            }
            _ => false,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<infinimesh_api::Error> for CoreError {
    fn from(err: infinimesh_api::Error) -> Self {
        use infinimesh_api::Error as ApiError;

        match err {
            ApiError::Authentication { message } => CoreError::AuthenticationFailed { message },
            ApiError::PermissionDenied { message } => CoreError::PermissionDenied { message },
            ApiError::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        code: None,
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            ApiError::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            ApiError::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            ApiError::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            ApiError::Rpc {
                message,
                code,
                status,
            } => CoreError::Api {
                message,
                code,
                status: Some(status),
            },
            ApiError::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket connection failed: {reason}"),
            },
            ApiError::WebSocketClosed { code, reason } => CoreError::ChannelClosed {
                reason: format!("code {code}: {reason}"),
            },
            ApiError::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
