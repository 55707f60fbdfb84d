// Hub wire types
//
// Serde models for the deCONZ REST API: the gateway config, light and
// sensor descriptors, and the body of a state PUT. Descriptors keep every
// field the hub sends via `#[serde(flatten)]` so nothing is silently lost.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── ResourceClass ────────────────────────────────────────────────────

/// The two hub resource collections a device can live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceClass {
    Lights,
    Sensors,
}

impl ResourceClass {
    /// Path segment / event `r` value for this class.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lights => "lights",
            Self::Sensors => "sensors",
        }
    }
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not a known resource class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownResourceClass(pub String);

impl fmt::Display for UnknownResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown resource class '{}'", self.0)
    }
}

impl std::error::Error for UnknownResourceClass {}

impl FromStr for ResourceClass {
    type Err = UnknownResourceClass;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lights" => Ok(Self::Lights),
            "sensors" => Ok(Self::Sensors),
            other => Err(UnknownResourceClass(other.to_owned())),
        }
    }
}

// ── Gateway config ───────────────────────────────────────────────────

/// Subset of `GET /config` needed to reach the event stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    pub ipaddress: String,
    pub websocketport: u16,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub swversion: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HubConfig {
    /// `ws://{ipaddress}:{websocketport}`
    pub fn websocket_url(&self) -> Result<url::Url, url::ParseError> {
        url::Url::parse(&format!("ws://{}:{}", self.ipaddress, self.websocketport))
    }
}

// ── Resource descriptors ─────────────────────────────────────────────

/// A light or sensor as returned by `GET /lights[/{id}]` or `GET /sensors[/{id}]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Hardware id, e.g. `"00:21:2e:ff:ff:00:aa:bb-01-0402"`.
    #[serde(default)]
    pub uniqueid: String,

    /// Hub-reported type, e.g. `"Dimmable light"` or `"ZHAPresence"`.
    #[serde(rename = "type")]
    pub resource_type: String,

    #[serde(default)]
    pub manufacturername: String,

    #[serde(default)]
    pub modelid: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub state: Map<String, Value>,

    #[serde(default)]
    pub config: Map<String, Value>,

    #[serde(default)]
    pub ctmin: Option<u16>,

    #[serde(default)]
    pub ctmax: Option<u16>,

    #[serde(default)]
    pub etag: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResourceDescriptor {
    pub fn state_value(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    pub fn config_value(&self, key: &str) -> Option<&Value> {
        self.config.get(key)
    }
}

/// Hub-local id → descriptor, as returned by the list endpoints.
pub type ResourceMap = BTreeMap<String, ResourceDescriptor>;

// ── State updates ────────────────────────────────────────────────────

/// Keys the hub expects as JSON booleans.
const BOOLEAN_KEYS: &[&str] = &["on", "presence"];
/// Keys the hub expects as unquoted integers.
const INTEGER_KEYS: &[&str] = &["bri", "ct"];

/// Body of `PUT /lights/{id}/state`.
///
/// Values are normalized per key on insertion: `on`/`presence` become
/// booleans, `bri`/`ct` become integers, everything else is sent as a
/// string.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct StateUpdate(Map<String, Value>);

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: &Value) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: &Value) {
        let key = key.into();
        let encoded = encode_state_value(&key, value);
        self.0.insert(key, encoded);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn encode_state_value(key: &str, value: &Value) -> Value {
    if BOOLEAN_KEYS.contains(&key) {
        return Value::Bool(is_truthy(value));
    }

    if INTEGER_KEYS.contains(&key) {
        let integer = match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.round() as i64)),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        };
        if let Some(i) = integer {
            return Value::from(i);
        }
    }

    match value {
        Value::String(s) => Value::String(s.clone()),
        other => Value::String(other.to_string()),
    }
}

/// Coerce a hub value to a boolean.
///
/// `null`, `false`, `0`, empty strings/arrays/objects and the strings
/// `"false"`, `"off"`, `"0"` are falsy; everything else is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => {
            let s = s.trim();
            !(s.is_empty()
                || s.eq_ignore_ascii_case("false")
                || s.eq_ignore_ascii_case("off")
                || s == "0")
        }
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

// ── Hub responses ────────────────────────────────────────────────────

/// One entry of the `[{"success": ...}, {"error": ...}]` response array.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum HubResponseEntry {
    Success(Value),
    Error(HubErrorBody),
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct HubErrorBody {
    #[serde(rename = "type", default)]
    pub error_type: Option<u32>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub description: String,
}
