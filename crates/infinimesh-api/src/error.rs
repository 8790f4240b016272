use thiserror::Error;

/// Top-level error type for the `infinimesh-api` crate.
///
/// Covers every failure mode across the RPC endpoints and the state
/// stream: authentication, transport, RPC error envelopes, WebSocket,
/// and payload decoding. `infinimesh-core` maps these into domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Request rejected as unauthenticated (bad, expired or revoked token).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Token is valid but does not grant access to the requested resource.
    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── RPC ─────────────────────────────────────────────────────────
    /// Structured error envelope returned by an RPC endpoint.
    #[error("RPC error (HTTP {status}): {message}")]
    Rpc {
        message: String,
        code: Option<String>,
        status: u16,
    },

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket handshake or read failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed by the server with an explicit close frame.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error indicates the credential has expired
    /// or was revoked, and re-authentication might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        match self {
            Self::Authentication { .. } => true,
            Self::Rpc { code, .. } => code.as_deref() == Some("unauthenticated"),
            _ => false,
        }
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } | Self::WebSocketConnect(_) => true,
            Self::Rpc { code, .. } => code.as_deref() == Some("unavailable"),
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Rpc { status: 404, .. } => true,
            Self::Rpc { code, .. } => code.as_deref() == Some("not_found"),
            _ => false,
        }
    }

    /// Extract the RPC error code (e.g. `"permission_denied"`), if available.
    pub fn rpc_code(&self) -> Option<&str> {
        match self {
            Self::Rpc { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthenticated_rpc_counts_as_expired() {
        let err = Error::Rpc {
            message: "Session is expired, revoked or invalid".into(),
            code: Some("unauthenticated".into()),
            status: 401,
        };
        assert!(err.is_auth_expired());
        assert!(!err.is_transient());
    }

    #[test]
    fn not_found_by_code_or_status() {
        let by_code = Error::Rpc {
            message: "no such device".into(),
            code: Some("not_found".into()),
            status: 200,
        };
        let by_status = Error::Rpc {
            message: String::new(),
            code: None,
            status: 404,
        };
        assert!(by_code.is_not_found());
        assert!(by_status.is_not_found());
        assert_eq!(by_code.rpc_code(), Some("not_found"));
    }

    #[test]
    fn websocket_connect_is_transient() {
        assert!(Error::WebSocketConnect("refused".into()).is_transient());
        assert!(
            !Error::WebSocketClosed {
                code: 1000,
                reason: "bye".into()
            }
            .is_transient()
        );
    }
}
