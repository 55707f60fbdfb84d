// ── Runtime adapter configuration ──
//
// Describes how to reach the hub and how the engine paces itself.
// Built by the binary (via deconz-config) and handed in; core never
// reads config files.

use std::time::Duration;

use deconz_api::ReconnectConfig;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use url::Url;

/// Unit reported by temperature sensors.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    /// Unit string exposed in property metadata.
    pub fn property_unit(self) -> &'static str {
        match self {
            Self::Celsius => "degree celsius",
            Self::Fahrenheit => "degree fahrenheit",
        }
    }
}

/// Configuration for a single hub adapter.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Hub root URL (e.g. `http://192.168.1.20:80`).
    pub url: Url,
    /// REST API key issued by the hub.
    pub api_key: SecretString,
    pub temperature_unit: TemperatureUnit,
    /// REST request timeout.
    pub timeout: Duration,
    /// Upper bound on a host-initiated hub write.
    pub write_timeout: Duration,
    /// How long removal and unload wait for pollers to exit.
    pub removal_grace: Duration,
    /// Upper bound on a pairing pass.
    pub pairing_timeout: Duration,
    /// Open the WebSocket event stream after discovery.
    pub websocket_enabled: bool,
    pub reconnect: ReconnectConfig,
    /// Poll period for lights and fast-changing sensors.
    pub poll_interval: Duration,
    /// Poll period for slow-changing sensors (temperature).
    pub slow_poll_interval: Duration,
}

impl AdapterConfig {
    /// A config for `url` / `api_key` with every other field at its default.
    pub fn new(url: Url, api_key: SecretString) -> Self {
        Self {
            url,
            api_key,
            temperature_unit: TemperatureUnit::default(),
            timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(5),
            removal_grace: Duration::from_secs(3),
            pairing_timeout: Duration::from_secs(60),
            websocket_enabled: true,
            reconnect: ReconnectConfig::default(),
            poll_interval: Duration::from_secs(2),
            slow_poll_interval: Duration::from_secs(300),
        }
    }
}
