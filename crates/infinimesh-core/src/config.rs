// ── Runtime connection configuration ──
//
// These types describe how to reach the infinimesh gateway. They carry
// the account credential and connection tuning, but never touch disk.
// The CLI builds a `SyncConfig` (usually via `infinimesh-config`) and
// hands it in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed development deployments).
    DangerAcceptInvalid,
}

/// Everything needed to talk to one gateway.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Gateway base URL (e.g. `https://api.infinimesh.cloud`).
    pub url: Url,
    /// Account token used for the directory and the token issuer.
    pub account_token: SecretString,
    pub tls: TlsVerification,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl SyncConfig {
    pub fn new(url: Url, account_token: SecretString) -> Self {
        Self {
            url,
            account_token,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
        }
    }
}
