// RPC client for the infinimesh node gateway
//
// Every endpoint is a Connect-style unary call: `POST {base}/{service}/{method}`
// with a JSON body. Directory and token-issuer calls authenticate with the
// account token baked into the client's default headers; shadow calls
// override it per request with a device-scoped bearer token. Endpoint
// methods live in `devices.rs` and `shadows.rs`.

use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

const STREAM_PATH: &str = "devices/states/stream";
const BODY_PREVIEW_LEN: usize = 512;

/// Raw HTTP client for the device directory, token issuer and shadow
/// service.
///
/// Cheap to clone: `reqwest::Client` is reference-counted internally.
#[derive(Clone)]
pub struct NodeClient {
    http: reqwest::Client,
    base_url: Url,
}

impl NodeClient {
    /// Create a client that authenticates directory calls with `account_token`.
    pub fn new(
        base_url: Url,
        account_token: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        let mut value = HeaderValue::from_str(&format!(
            "Bearer {}",
            account_token.expose_secret()
        ))
        .map_err(|_| Error::Authentication {
            message: "account token contains characters not allowed in a header".into(),
        })?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);

        let http = transport.build_client_with_headers(headers)?;
        Ok(Self::with_client(http, base_url))
    }

    /// Wrap a pre-built `reqwest::Client`.
    ///
    /// The caller is responsible for any account `Authorization` header.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The gateway base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// URL of the push channel: the base URL with its scheme swapped to
    /// `ws`/`wss` and `/devices/states/stream` appended.
    pub fn stream_url(&self) -> Result<Url, Error> {
        let mut url = self.join(STREAM_PATH)?;
        let scheme = match url.scheme() {
            "https" => "wss",
            "http" => "ws",
            other => other,
        }
        .to_owned();
        url.set_scheme(&scheme).map_err(|()| {
            Error::WebSocketConnect(format!("cannot derive stream URL from scheme {scheme}"))
        })?;
        Ok(url)
    }

    // ── Request helpers ──────────────────────────────────────────────

    fn join(&self, path: &str) -> Result<Url, Error> {
        // Keep any path prefix on the base (`https://host/api` + `svc/m`).
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        Ok(base.join(path)?)
    }

    /// Send a unary RPC call and decode the response body.
    ///
    /// `bearer` replaces the account `Authorization` header for this call.
    pub(crate) async fn call<Req, Resp>(
        &self,
        procedure: &str,
        body: &Req,
        bearer: Option<&SecretString>,
    ) -> Result<Resp, Error>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = self.join(procedure)?;
        debug!(%url, scoped = bearer.is_some(), "POST");

        let mut request = self.http.post(url).json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token.expose_secret());
        }

        let resp = request.send().await.map_err(Error::Transport)?;
        parse_response(resp).await
    }
}

// ── Response handling ────────────────────────────────────────────────

/// Connect error body: `{ "code": "permission_denied", "message": "..." }`.
#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

async fn parse_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();
    let body = resp.text().await.map_err(Error::Transport)?;

    if !status.is_success() {
        return Err(status_error(status, &body));
    }

    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: preview(&body),
    })
}

fn status_error(status: StatusCode, body: &str) -> Error {
    let parsed: Option<RpcErrorBody> = serde_json::from_str(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|b| b.message.clone())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_owned()
        });

    match status {
        StatusCode::UNAUTHORIZED => Error::Authentication { message },
        StatusCode::FORBIDDEN => Error::PermissionDenied { message },
        _ => Error::Rpc {
            message,
            code: parsed.and_then(|b| b.code),
            status: status.as_u16(),
        },
    }
}

fn preview(body: &str) -> String {
    match body.char_indices().nth(BODY_PREVIEW_LEN) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_owned(),
    }
}
