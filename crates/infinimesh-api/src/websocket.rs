//! Device state push channel.
//!
//! Opens `ws(s)://{base}/devices/states/stream`, authenticating through the
//! sub-protocol list `["Bearer", <token>]`, and yields each text frame as a
//! raw string. Framing is all this module knows about: decoding, merging and
//! lifecycle bookkeeping belong to the subscription controller in
//! `infinimesh-core`.
//!
//! There is no automatic reconnect. A dropped channel ends the stream and
//! the caller decides whether to resubscribe, typically pacing attempts
//! with [`backoff_delay`].
//!
//! # Example
//!
//! ```rust,ignore
//! use futures_util::StreamExt;
//! use infinimesh_api::StateStream;
//!
//! let stream = StateStream::connect(&client.stream_url()?, &token).await?;
//! let mut frames = std::pin::pin!(stream.into_text_stream());
//! while let Some(frame) = frames.next().await {
//!     println!("{}", frame?);
//! }
//! ```

use std::time::Duration;

use futures_core::Stream;
use futures_util::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::Error;

/// Authentication scheme advertised as the first sub-protocol.
pub const AUTH_SUBPROTOCOL: &str = "Bearer";

/// Close code reported when the socket drops without a close handshake.
const ABNORMAL_CLOSURE: u16 = 1006;

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for resubscribe loops.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

impl ReconnectConfig {
    /// Whether `attempt` (zero-based) is past the retry limit.
    pub fn exhausted(&self, attempt: u32) -> bool {
        self.max_retries.is_some_and(|max| attempt >= max)
    }
}

// ── StateStream ──────────────────────────────────────────────────────

/// An open push channel.
pub struct StateStream {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl StateStream {
    /// Perform the WebSocket handshake.
    ///
    /// Resolves once the server has accepted the upgrade. A 401 or 403 on
    /// the upgrade surfaces as [`Error::Authentication`] or
    /// [`Error::PermissionDenied`]; everything else is
    /// [`Error::WebSocketConnect`].
    pub async fn connect(url: &Url, token: &SecretString) -> Result<Self, Error> {
        tracing::info!(url = %url, "opening state stream");

        let uri: tungstenite::http::Uri = url
            .as_str()
            .parse()
            .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;

        let request = ClientRequestBuilder::new(uri)
            .with_sub_protocol(AUTH_SUBPROTOCOL)
            .with_sub_protocol(token.expose_secret());

        let (inner, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(handshake_error)?;

        tracing::info!("state stream open");
        Ok(Self { inner })
    }

    /// Consume the channel as a stream of text frames.
    ///
    /// Ends after a close frame or when the socket drops without one. An
    /// abnormal close code or a read error is yielded once as
    /// [`Error::WebSocketClosed`] and then the stream ends.
    pub fn into_text_stream(self) -> impl Stream<Item = Result<String, Error>> + Send + 'static {
        let (_write, mut read) = self.inner.split();

        async_stream::stream! {
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(tungstenite::Message::Text(text)) => {
                        yield Ok(text.as_str().to_owned());
                    }
                    Ok(tungstenite::Message::Binary(bytes)) => {
                        match String::from_utf8(bytes.to_vec()) {
                            Ok(text) => yield Ok(text),
                            Err(_) => tracing::debug!(len = bytes.len(), "ignoring non-UTF-8 binary frame"),
                        }
                    }
                    Ok(tungstenite::Message::Close(frame)) => {
                        match frame {
                            Some(cf) if !matches!(cf.code, CloseCode::Normal | CloseCode::Away) => {
                                tracing::info!(code = %cf.code, reason = %cf.reason, "state stream closed abnormally");
                                yield Err(Error::WebSocketClosed {
                                    code: u16::from(cf.code),
                                    reason: cf.reason.as_str().to_owned(),
                                });
                            }
                            Some(cf) => {
                                tracing::info!(code = %cf.code, reason = %cf.reason, "state stream closed by server");
                            }
                            None => tracing::info!("state stream closed by server (no payload)"),
                        }
                        break;
                    }
                    Ok(_) => {
                        // Ping/Pong/raw frames; tungstenite answers pings itself.
                        tracing::trace!("state stream control frame");
                    }
                    Err(e) => {
                        yield Err(Error::WebSocketClosed {
                            code: ABNORMAL_CLOSURE,
                            reason: e.to_string(),
                        });
                        break;
                    }
                }
            }
            tracing::debug!("state stream ended");
        }
    }
}

/// Sort a failed handshake into auth rejections and transport failures.
fn handshake_error(err: tungstenite::Error) -> Error {
    let response = match err {
        tungstenite::Error::Http(response) => response,
        other => return Error::WebSocketConnect(other.to_string()),
    };

    let status = response.status();
    let message = response
        .body()
        .as_deref()
        .and_then(|body| std::str::from_utf8(body).ok())
        .map(str::trim)
        .filter(|body| !body.is_empty())
        .map_or_else(|| status.to_string(), str::to_owned);

    match status {
        StatusCode::UNAUTHORIZED => Error::Authentication { message },
        StatusCode::FORBIDDEN => Error::PermissionDenied { message },
        _ => Error::WebSocketConnect(format!("HTTP error: {status}")),
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) * (1 +- 0.25)`
///
/// The jitter is derived from the attempt number so repeated runs are
/// reproducible.
pub fn backoff_delay(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_upgrade_is_auth_error() {
        let response = tungstenite::http::Response::builder()
            .status(StatusCode::UNAUTHORIZED)
            .body(Some(b"token revoked".to_vec()))
            .unwrap();
        let err = handshake_error(tungstenite::Error::Http(response));
        assert!(matches!(&err, Error::Authentication { message } if message == "token revoked"));
        assert!(!err.is_transient());
    }

    #[test]
    fn forbidden_upgrade_is_permission_error() {
        let response = tungstenite::http::Response::builder()
            .status(StatusCode::FORBIDDEN)
            .body(None)
            .unwrap();
        let err = handshake_error(tungstenite::Error::Http(response));
        assert!(matches!(err, Error::PermissionDenied { .. }));
    }

    #[test]
    fn other_upgrade_failures_stay_transient() {
        let response = tungstenite::http::Response::builder()
            .status(StatusCode::BAD_GATEWAY)
            .body(None)
            .unwrap();
        assert!(handshake_error(tungstenite::Error::Http(response)).is_transient());
        assert!(handshake_error(tungstenite::Error::ConnectionClosed).is_transient());
    }

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert!(!config.exhausted(1_000));
    }

    #[test]
    fn retry_limit() {
        let config = ReconnectConfig {
            max_retries: Some(3),
            ..ReconnectConfig::default()
        };
        assert!(!config.exhausted(2));
        assert!(config.exhausted(3));
    }

    #[test]
    fn backoff_first_attempt_near_initial() {
        let delay = backoff_delay(0, &ReconnectConfig::default());
        // sin(0) == 0, so no jitter on the first attempt
        assert_eq!(delay, Duration::from_secs(1));
    }

    #[test]
    fn backoff_is_capped_with_jitter() {
        let config = ReconnectConfig::default();
        for attempt in 0..64 {
            let delay = backoff_delay(attempt, &config);
            assert!(delay <= Duration::from_secs_f64(30.0 * 1.25), "attempt {attempt}: {delay:?}");
        }
        let late = backoff_delay(20, &config).as_secs_f64();
        assert!((22.5..=37.5).contains(&late), "got {late}");
    }
}
