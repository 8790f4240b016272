//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and distinct exit codes.

use miette::Diagnostic;
use thiserror::Error;

use infinimesh_config::ConfigError;
use infinimesh_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const PERMISSION: i32 = 5;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to gateway at {url}")]
    #[diagnostic(
        code(infinimesh::connection_failed),
        help(
            "Check that the gateway is reachable and the endpoint is correct.\n\
             Self-signed deployments need --insecure (-k) or ca_cert in the profile."
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Live update channel closed: {reason}")]
    #[diagnostic(
        code(infinimesh::channel_closed),
        help("The gateway dropped the state stream. Retry, or raise --max-retries.")
    )]
    ChannelClosed { reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(infinimesh::auth_failed),
        help(
            "The account token was rejected or has expired.\n\
             Store a fresh one with: infinimesh config set-token"
        )
    )]
    AuthFailed { message: String },

    #[error("No account token configured for profile '{profile}'")]
    #[diagnostic(
        code(infinimesh::no_credentials),
        help(
            "Store one with: infinimesh config set-token\n\
             Or pass --token / set INFINIMESH_TOKEN."
        )
    )]
    NoCredentials { profile: String },

    // ── Authorization ────────────────────────────────────────────────
    #[error("Permission denied: {message}")]
    #[diagnostic(code(infinimesh::permission_denied))]
    PermissionDenied { message: String },

    #[error("{required} access to device {device} is required, you have {actual}")]
    #[diagnostic(
        code(infinimesh::insufficient_access),
        help("Run: infinimesh devices list to see your access level per device")
    )]
    InsufficientAccess {
        device: String,
        required: String,
        actual: String,
    },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(infinimesh::not_found),
        help("Run: infinimesh {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── API ──────────────────────────────────────────────────────────
    #[error("API error ({code}): {message}")]
    #[diagnostic(code(infinimesh::api_error))]
    ApiError { code: String, message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(infinimesh::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(infinimesh::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: infinimesh config set endpoint <URL> --profile {name}"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No gateway endpoint configured")]
    #[diagnostic(
        code(infinimesh::no_config),
        help(
            "Pass --endpoint, or set one with: infinimesh config set endpoint <URL>\n\
             Config file: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(infinimesh::config))]
    Config(ConfigError),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Request timed out")]
    #[diagnostic(
        code(infinimesh::timeout),
        help("Increase the timeout with --timeout or check gateway responsiveness.")
    )]
    Timeout,

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(infinimesh::json), help("The payload must be a JSON object."))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::ChannelClosed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::PermissionDenied { .. } | Self::InsufficientAccess { .. } => {
                exit_code::PERMISSION
            }
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout => exit_code::TIMEOUT,
            Self::Validation { .. }
            | Self::ProfileNotFound { .. }
            | Self::NoConfig { .. }
            | Self::Json(_) => exit_code::USAGE,
            Self::ApiError { code, .. } => match code.as_str() {
                "unauthenticated" => exit_code::AUTH,
                "permission_denied" => exit_code::PERMISSION,
                "not_found" => exit_code::NOT_FOUND,
                "unavailable" => exit_code::CONNECTION,
                "deadline_exceeded" => exit_code::TIMEOUT,
                _ => exit_code::GENERAL,
            },
            Self::Config(err) => match err {
                ConfigError::Validation { .. } => exit_code::USAGE,
                _ => exit_code::GENERAL,
            },
            Self::Io(_) => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed {
                url,
                source: reason.into(),
            },

            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },

            CoreError::PermissionDenied { message } => CliError::PermissionDenied { message },

            CoreError::Timeout { .. } => CliError::Timeout,

            CoreError::ChannelClosed { reason } => CliError::ChannelClosed { reason },

            CoreError::EmptyDeviceSet => CliError::Validation {
                field: "devices".into(),
                reason: "at least one device is required".into(),
            },

            CoreError::UnsupportedScope { level } => CliError::Validation {
                field: "scope".into(),
                reason: format!("tokens cannot be scoped to {level}"),
            },

            CoreError::OutOfScope { device } => CliError::PermissionDenied {
                message: format!("token does not cover device {device}"),
            },

            CoreError::InsufficientAccess {
                device,
                required,
                actual,
            } => CliError::InsufficientAccess {
                device: device.to_string(),
                required: required.to_string(),
                actual: actual.to_string(),
            },

            CoreError::DeviceNotFound { identifier } => CliError::NotFound {
                resource_type: "device".into(),
                identifier,
                list_command: "devices list".into(),
            },

            CoreError::Api {
                message,
                code,
                status,
            } => CliError::ApiError {
                code: code
                    .or_else(|| status.map(|s| format!("http_{s}")))
                    .unwrap_or_else(|| "unknown".into()),
                message,
            },

            CoreError::Config { message } => CliError::Validation {
                field: "configuration".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::ApiError {
                code: "internal".into(),
                message,
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(other),
        }
    }
}
