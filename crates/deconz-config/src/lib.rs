//! Configuration for the deCONZ bridge.
//!
//! Serialized defaults, then a TOML file, then `DECONZ_`-prefixed
//! environment variables, merged with figment and translated into a
//! validated `deconz_core::AdapterConfig`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use deconz_core::{AdapterConfig, TemperatureUnit};

const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no hub URL configured")]
    NoUrl,

    #[error("no API key configured")]
    NoCredentials,

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config ─────────────────────────────────────────────────────

/// The bridge configuration file.
///
/// Durations are whole seconds, except `write_timeout_ms`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Hub base URL (e.g. "http://192.168.1.20:80").
    pub url: Option<String>,

    /// REST API key (plaintext; prefer `api_key_env`).
    pub api_key: Option<String>,

    /// Environment variable holding the API key.
    pub api_key_env: Option<String>,

    /// "celsius" or "fahrenheit".
    pub temperature_unit: String,

    pub log_level: String,

    /// REST request timeout.
    pub timeout: u64,

    pub write_timeout_ms: u64,

    /// How long removal and unload wait for device tasks.
    pub removal_grace: u64,

    pub pairing_timeout: u64,

    /// Open the push event stream.
    pub websocket: bool,

    pub poll_interval: u64,

    /// Poll period for temperature sensors.
    pub slow_poll_interval: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            api_key_env: None,
            temperature_unit: "celsius".into(),
            log_level: "info".into(),
            timeout: 10,
            write_timeout_ms: 5000,
            removal_grace: 3,
            pairing_timeout: 60,
            websocket: true,
            poll_interval: 2,
            slow_poll_interval: 300,
        }
    }
}

impl Config {
    /// The config with the API key masked, for display.
    pub fn redacted(&self) -> Self {
        Self {
            api_key: self.api_key.as_ref().map(|_| "********".into()),
            ..self.clone()
        }
    }

    /// Render as pretty TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// The configured log level, validated.
    pub fn log_level(&self) -> Result<&str, ConfigError> {
        let level = self.log_level.as_str();
        if LOG_LEVELS.contains(&level) {
            Ok(level)
        } else {
            Err(ConfigError::Validation {
                field: "log_level".into(),
                reason: format!("expected one of {}, got '{level}'", LOG_LEVELS.join(", ")),
            })
        }
    }

    /// Resolve the API key: `api_key_env` first, then the plaintext key.
    pub fn resolve_api_key(&self) -> Result<SecretString, ConfigError> {
        if let Some(ref env_name) = self.api_key_env {
            if let Ok(val) = std::env::var(env_name) {
                return Ok(SecretString::from(val));
            }
        }

        match self.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(SecretString::from(key.to_owned())),
            _ => Err(ConfigError::NoCredentials),
        }
    }

    /// Validate and translate into the engine's configuration.
    pub fn to_adapter_config(&self) -> Result<AdapterConfig, ConfigError> {
        let raw_url = self.url.as_deref().ok_or(ConfigError::NoUrl)?;
        let url: url::Url = raw_url.parse().map_err(|e| ConfigError::Validation {
            field: "url".into(),
            reason: format!("'{raw_url}': {e}"),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Validation {
                field: "url".into(),
                reason: format!("expected an http(s) URL, got '{raw_url}'"),
            });
        }

        let api_key = self.resolve_api_key()?;

        let temperature_unit: TemperatureUnit = self.temperature_unit.parse().map_err(|_| {
            ConfigError::Validation {
                field: "temperature_unit".into(),
                reason: format!(
                    "expected 'celsius' or 'fahrenheit', got '{}'",
                    self.temperature_unit
                ),
            }
        })?;

        self.log_level()?;

        let mut config = AdapterConfig::new(url, api_key);
        config.temperature_unit = temperature_unit;
        config.timeout = secs("timeout", self.timeout)?;
        config.write_timeout =
            positive("write_timeout_ms", Duration::from_millis(self.write_timeout_ms))?;
        config.removal_grace = Duration::from_secs(self.removal_grace);
        config.pairing_timeout = secs("pairing_timeout", self.pairing_timeout)?;
        config.websocket_enabled = self.websocket;
        config.poll_interval = secs("poll_interval", self.poll_interval)?;
        config.slow_poll_interval = secs("slow_poll_interval", self.slow_poll_interval)?;
        Ok(config)
    }
}

fn secs(field: &str, value: u64) -> Result<Duration, ConfigError> {
    positive(field, Duration::from_secs(value))
}

fn positive(field: &str, value: Duration) -> Result<Duration, ConfigError> {
    if value.is_zero() {
        Err(ConfigError::Validation {
            field: field.into(),
            reason: "must be greater than zero".into(),
        })
    } else {
        Ok(value)
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "deconz-bridge", "deconz-bridge").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("deconz-bridge");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load from `path` (or the default path) and the environment.
///
/// A missing file is not an error; defaults and environment still apply.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("DECONZ_"));

    Ok(figment.extract()?)
}
