//! CLI configuration: thin wrapper around `infinimesh_config`.
//!
//! Adds the resolution step that respects `GlobalOpts` flag overrides
//! (--endpoint, --token, --insecure, --timeout).

use std::time::Duration;

use secrecy::SecretString;

use infinimesh_core::{SyncConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use infinimesh_config::{
    Config, Defaults, Profile, config_path, load_config, load_config_or_default, parse_endpoint,
    save_config, store_token,
};

/// Everything a gateway-bound command needs from configuration.
#[derive(Debug)]
pub struct Resolved {
    pub profile: String,
    pub sync: SyncConfig,
    /// Default namespace filter for listings.
    pub namespace: Option<String>,
}

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    config.profile_name(global.profile.as_deref())
}

/// Build the runtime configuration from the config file, the active
/// profile, and CLI overrides.
pub fn resolve(global: &GlobalOpts) -> Result<Resolved, CliError> {
    let cfg = load_config()?;
    let profile_name = active_profile_name(global, &cfg);

    if let Some(profile) = cfg.profiles.get(&profile_name) {
        let sync = resolve_profile(profile, &profile_name, &cfg.defaults, global)?;
        return Ok(Resolved {
            profile: profile_name,
            sync,
            namespace: profile.namespace.clone(),
        });
    }

    // An explicitly requested profile must exist
    if global.profile.is_some() {
        return Err(CliError::ProfileNotFound {
            available: available_profiles(&cfg),
            name: profile_name,
        });
    }

    // No profile -- build from CLI flags / env vars alone
    let endpoint = global.endpoint.as_deref().ok_or_else(|| CliError::NoConfig {
        path: config_path().display().to_string(),
    })?;
    let url = parse_endpoint(endpoint)?;

    let account_token = global
        .token
        .clone()
        .map(SecretString::from)
        .ok_or_else(|| CliError::NoCredentials {
            profile: profile_name.clone(),
        })?;

    let tls = if global.insecure || cfg.defaults.insecure {
        TlsVerification::DangerAcceptInvalid
    } else {
        TlsVerification::SystemDefaults
    };

    Ok(Resolved {
        profile: profile_name,
        sync: SyncConfig {
            url,
            account_token,
            tls,
            timeout: Duration::from_secs(global.timeout.unwrap_or(cfg.defaults.timeout)),
        },
        namespace: None,
    })
}

/// Translate a `Profile` + global flags into a `SyncConfig`.
///
/// CLI flag overrides take priority over profile values.
pub fn resolve_profile(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
    global: &GlobalOpts,
) -> Result<SyncConfig, CliError> {
    // 1. Endpoint (flag > env > profile)
    let endpoint = global.endpoint.as_deref().unwrap_or(&profile.endpoint);
    let url = parse_endpoint(endpoint)?;

    // 2. Account token (flag > profile chain)
    let account_token = match global.token {
        Some(ref token) => SecretString::from(token.clone()),
        None => infinimesh_config::resolve_token(profile, profile_name)?,
    };

    // 3. TLS verification
    let tls = if global.insecure {
        TlsVerification::DangerAcceptInvalid
    } else {
        infinimesh_config::profile_tls(profile, defaults)
    };

    // 4. Timeout (flag > profile > defaults)
    let timeout = global
        .timeout
        .or(profile.timeout)
        .unwrap_or(defaults.timeout);

    Ok(SyncConfig {
        url,
        account_token,
        tls,
        timeout: Duration::from_secs(timeout),
    })
}

/// Comma-separated profile names for error help text.
pub fn available_profiles(cfg: &Config) -> String {
    if cfg.profiles.is_empty() {
        "(none)".into()
    } else {
        cfg.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}
