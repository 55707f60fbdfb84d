//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use deconz_config::ConfigError;
use deconz_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("No hub URL configured")]
    #[diagnostic(
        code(deconz::no_url),
        help(
            "Set `url` in {path}\n\
             or pass --url / set DECONZ_URL."
        )
    )]
    NoUrl { path: String },

    #[error("No API key configured")]
    #[diagnostic(
        code(deconz::no_credentials),
        help(
            "Set `api_key` (or `api_key_env`) in the config file,\n\
             or pass --api-key / set DECONZ_API_KEY.\n\
             Keys are issued by the hub after unlocking the gateway in Phoscon."
        )
    )]
    NoCredentials,

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(deconz::validation))]
    Validation { field: String, reason: String },

    #[error("Could not load configuration")]
    #[diagnostic(code(deconz::config))]
    Config(#[source] ConfigError),

    // ── Hub ──────────────────────────────────────────────────────────
    #[error("Could not reach the hub: {message}")]
    #[diagnostic(
        code(deconz::connection_failed),
        help("Check that the hub is running and that the URL is correct.")
    )]
    ConnectionFailed { message: String },

    #[error("The hub rejected the API key")]
    #[diagnostic(
        code(deconz::auth_failed),
        help("Generate a fresh key from the hub and update the configuration.")
    )]
    AuthFailed,

    #[error("Hub request timed out: {message}")]
    #[diagnostic(code(deconz::timeout))]
    Timeout { message: String },

    #[error("{message}")]
    #[diagnostic(code(deconz::not_found))]
    NotFound { message: String },

    #[error("{0}")]
    #[diagnostic(code(deconz::core))]
    Core(CoreError),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not encode output: {0}")]
    #[diagnostic(code(deconz::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoUrl { .. } | Self::Validation { .. } => exit_code::USAGE,
            Self::NoCredentials | Self::AuthFailed => exit_code::AUTH,
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            _ => exit_code::GENERAL,
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoUrl => CliError::NoUrl {
                path: deconz_config::config_path().display().to_string(),
            },
            ConfigError::NoCredentials => CliError::NoCredentials,
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(other),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Unauthorized { .. } => CliError::AuthFailed,

            CoreError::Transport { ref message, .. } if message.contains("timed out") => {
                CliError::Timeout {
                    message: message.clone(),
                }
            }

            CoreError::Discovery { ref message } if message.contains("timed out") => {
                CliError::Timeout {
                    message: message.clone(),
                }
            }

            CoreError::Transport { message, .. }
            | CoreError::Discovery { message }
            | CoreError::ConnectionLost { reason: message } => {
                CliError::ConnectionFailed { message }
            }

            CoreError::DeviceNotFound { .. } | CoreError::PropertyNotFound { .. } => {
                CliError::NotFound {
                    message: err.to_string(),
                }
            }

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            other => CliError::Core(other),
        }
    }
}
