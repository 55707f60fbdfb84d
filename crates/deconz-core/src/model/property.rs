// ── Device properties ──
//
// A property caches the last raw hub value it saw and the normalized value
// derived from it. Change detection compares raw values, so the hub
// re-reporting the same state is never surfaced twice.

use deconz_api::ResourceDescriptor;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::converter::Converter;
use super::value::{PropertyValue, ValueType};
use crate::config::TemperatureUnit;
use crate::error::CoreError;

// ── Metadata ────────────────────────────────────────────────────────

/// Host-visible description of a property.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyMeta {
    #[serde(skip)]
    pub name: &'static str,
    pub label: &'static str,
    #[serde(rename = "@type")]
    pub schema_type: &'static str,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    pub read_only: bool,
}

/// Where in a descriptor (or event) a property's raw value lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    State(&'static str),
    Config(&'static str),
    /// `state.<key>`, falling back to `config.<key>`.
    StateOrConfig(&'static str),
    /// Not polled; changed only by events or writes.
    Events,
}

/// Descriptor/event section a raw value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    State,
    Config,
}

impl Source {
    /// Hub key this property reads and writes.
    pub fn key(self) -> Option<&'static str> {
        match self {
            Self::State(k) | Self::Config(k) | Self::StateOrConfig(k) => Some(k),
            Self::Events => None,
        }
    }

    /// Whether a value at `section.key` feeds this property.
    pub fn accepts(self, section: Section, key: &str) -> bool {
        match (self, section) {
            (Self::State(k), Section::State)
            | (Self::Config(k), Section::Config)
            | (Self::StateOrConfig(k), _) => k == key,
            _ => false,
        }
    }

    /// Look the raw value up in a full descriptor.
    pub fn read(self, desc: &ResourceDescriptor) -> Option<&Value> {
        match self {
            Self::State(k) => desc.state_value(k),
            Self::Config(k) => desc.config_value(k),
            Self::StateOrConfig(k) => desc.state_value(k).or_else(|| desc.config_value(k)),
            Self::Events => None,
        }
        .filter(|v| !v.is_null())
    }
}

// ── Property ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Property {
    meta: PropertyMeta,
    source: Source,
    converter: Converter,
    cached: Option<PropertyValue>,
    last_raw: Option<Value>,
    pending_confirmation: bool,
    /// Bumped by every write that goes to the hub.
    write_generation: u64,
}

/// Point-in-time view of a property for the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertySnapshot {
    #[serde(flatten)]
    pub meta: PropertyMeta,
    pub value: Option<PropertyValue>,
    pub pending_confirmation: bool,
}

impl Property {
    pub fn new(meta: PropertyMeta, source: Source, converter: Converter) -> Self {
        Self {
            meta,
            source,
            converter,
            cached: None,
            last_raw: None,
            pending_confirmation: false,
            write_generation: 0,
        }
    }

    pub fn name(&self) -> &'static str {
        self.meta.name
    }

    pub fn meta(&self) -> &PropertyMeta {
        &self.meta
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn value(&self) -> Option<PropertyValue> {
        self.cached
    }

    pub fn is_read_only(&self) -> bool {
        self.meta.read_only
    }

    pub fn is_pending_confirmation(&self) -> bool {
        self.pending_confirmation
    }

    /// Generation of the most recent write handed out by
    /// [`prepare_write`](Self::prepare_write).
    pub fn write_generation(&self) -> u64 {
        self.write_generation
    }

    /// Take an initial raw value without reporting a change.
    pub fn seed(&mut self, raw: &Value) {
        if let Some(value) = self.normalize(raw) {
            self.cached = Some(value);
            self.last_raw = Some(raw.clone());
        }
    }

    /// Apply a raw hub value. Returns the new normalized value when the raw
    /// value differs from the last one seen.
    pub fn update(&mut self, raw: &Value) -> Option<PropertyValue> {
        // the hub has spoken; any optimistic write is now settled
        self.pending_confirmation = false;

        if self.last_raw.as_ref() == Some(raw) {
            return None;
        }

        let Some(value) = self.normalize(raw) else {
            warn!(property = self.meta.name, %raw, "unconvertible hub value");
            return None;
        };

        debug!(
            property = self.meta.name,
            %raw,
            %value,
            "property changed"
        );
        self.last_raw = Some(raw.clone());
        self.cached = Some(value);
        Some(value)
    }

    /// Validate and apply a host write optimistically.
    ///
    /// Returns the raw value to send, or `None` when `value` (after clamping)
    /// already matches the cached value.
    pub fn prepare_write(
        &mut self,
        device: &str,
        value: PropertyValue,
    ) -> Result<Option<Value>, CoreError> {
        if self.meta.read_only {
            return Err(CoreError::ReadOnly {
                device: device.to_owned(),
                property: self.meta.name.to_owned(),
            });
        }

        let coerced = value
            .coerce(self.meta.value_type)
            .ok_or_else(|| CoreError::InvalidValue {
                property: self.meta.name.to_owned(),
                message: format!("expected {}, got {value}", self.meta.value_type),
            })?;
        let clamped = coerced.clamp(self.meta.minimum, self.meta.maximum);

        if self.cached == Some(clamped) {
            return Ok(None);
        }

        let raw = self.converter.to_device(clamped);
        self.cached = Some(clamped);
        self.last_raw = Some(raw.clone());
        self.write_generation = self.write_generation.wrapping_add(1);
        Ok(Some(raw))
    }

    /// Record that write `generation` did not reach the hub.
    ///
    /// Ignored when a later write has been prepared since; returns whether
    /// the flag was set.
    pub fn mark_write_failed(&mut self, generation: u64) -> bool {
        if generation != self.write_generation {
            return false;
        }
        self.pending_confirmation = true;
        true
    }

    pub fn snapshot(&self) -> PropertySnapshot {
        PropertySnapshot {
            meta: self.meta.clone(),
            value: self.cached,
            pending_confirmation: self.pending_confirmation,
        }
    }

    fn normalize(&self, raw: &Value) -> Option<PropertyValue> {
        self.converter
            .to_property(raw, self.meta.value_type)
            .map(|v| v.clamp(self.meta.minimum, self.meta.maximum))
    }
}

// ── Catalogue ───────────────────────────────────────────────────────

const BRIGHTNESS_FACTOR: f64 = 2.55;

const fn meta(
    name: &'static str,
    label: &'static str,
    schema_type: &'static str,
    value_type: ValueType,
    read_only: bool,
) -> PropertyMeta {
    PropertyMeta {
        name,
        label,
        schema_type,
        value_type,
        unit: None,
        minimum: None,
        maximum: None,
        read_only,
    }
}

pub fn reachable() -> Property {
    Property::new(
        meta("reachable", "Reachable", "BooleanProperty", ValueType::Boolean, true),
        Source::StateOrConfig("reachable"),
        Converter::Boolean,
    )
}

pub fn on_off() -> Property {
    Property::new(
        meta("on", "On/Off", "OnOffProperty", ValueType::Boolean, false),
        Source::State("on"),
        Converter::Boolean,
    )
}

pub fn brightness() -> Property {
    Property::new(
        PropertyMeta {
            unit: Some("percent"),
            minimum: Some(10.0),
            maximum: Some(100.0),
            ..meta("bri", "Brightness", "BrightnessProperty", ValueType::Integer, false)
        },
        Source::State("bri"),
        Converter::Scaled {
            factor: BRIGHTNESS_FACTOR,
        },
    )
}

pub fn color_temperature(ctmin: Option<u16>, ctmax: Option<u16>) -> Property {
    Property::new(
        PropertyMeta {
            unit: Some("mired"),
            minimum: ctmin.map(f64::from),
            maximum: ctmax.map(f64::from),
            ..meta(
                "ct",
                "Color Temperature",
                "ColorTemperatureProperty",
                ValueType::Integer,
                false,
            )
        },
        Source::State("ct"),
        Converter::Identity,
    )
}

pub fn power() -> Property {
    Property::new(
        PropertyMeta {
            unit: Some("watt"),
            ..meta("power", "Power", "InstantaneousPowerProperty", ValueType::Number, true)
        },
        Source::State("power"),
        Converter::Identity,
    )
}

pub fn motion() -> Property {
    Property::new(
        meta("motion", "Motion", "MotionProperty", ValueType::Boolean, true),
        Source::State("presence"),
        Converter::Boolean,
    )
}

pub fn dark() -> Property {
    Property::new(
        meta("dark", "Dark", "BooleanProperty", ValueType::Boolean, true),
        Source::State("dark"),
        Converter::Boolean,
    )
}

pub fn battery() -> Property {
    Property::new(
        PropertyMeta {
            unit: Some("percent"),
            minimum: Some(0.0),
            maximum: Some(100.0),
            ..meta("battery", "Battery", "LevelProperty", ValueType::Integer, true)
        },
        Source::Config("battery"),
        Converter::Identity,
    )
}

pub fn temperature(unit: TemperatureUnit) -> Property {
    Property::new(
        PropertyMeta {
            unit: Some(unit.property_unit()),
            ..meta(
                "temperature",
                "Temperature",
                "TemperatureProperty",
                ValueType::Number,
                true,
            )
        },
        Source::State("temperature"),
        Converter::Temperature { unit },
    )
}

pub fn level() -> Property {
    Property::new(
        PropertyMeta {
            unit: Some("percent"),
            minimum: Some(0.0),
            maximum: Some(100.0),
            ..meta("level", "Level", "BrightnessProperty", ValueType::Integer, true)
        },
        Source::Events,
        Converter::Identity,
    )
}
