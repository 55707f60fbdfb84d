// ── Value conversion between hub units and property units ──

use deconz_api::models::is_truthy;
use serde_json::Value;

use super::value::{PropertyValue, ValueType};
use crate::config::TemperatureUnit;

/// Absorbs float error in `raw / factor` so exact multiples floor correctly
/// (255 / 2.55 must be 100, not 99).
const SCALE_EPSILON: f64 = 1e-9;

/// Bidirectional mapping between a hub value and a normalized value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Converter {
    /// Value passes through, shaped by the property's value type.
    Identity,
    /// Any truthy/falsy raw value becomes a boolean.
    Boolean,
    /// `normalized = floor(raw / factor)`, `raw = round(normalized * factor)`.
    Scaled { factor: f64 },
    /// Hub reports centi-degrees Celsius.
    Temperature { unit: TemperatureUnit },
}

impl Converter {
    /// Hub value → normalized value. `None` when `raw` has no usable shape.
    #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
    pub fn to_property(&self, raw: &Value, ty: ValueType) -> Option<PropertyValue> {
        match self {
            Self::Identity => shape(raw, ty),
            Self::Boolean => Some(PropertyValue::Bool(is_truthy(raw))),
            Self::Scaled { factor } => {
                let v = number(raw)? / factor;
                let floored = (v + SCALE_EPSILON).floor();
                shape_number(floored, ty)
            }
            Self::Temperature { unit } => {
                let celsius = number(raw)? / 100.0;
                let v = match unit {
                    TemperatureUnit::Celsius => celsius,
                    TemperatureUnit::Fahrenheit => celsius * 9.0 / 5.0 + 32.0,
                };
                shape_number(v, ty)
            }
        }
    }

    /// Normalized value → hub value.
    #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
    pub fn to_device(&self, value: PropertyValue) -> Value {
        match (self, value) {
            (Self::Boolean, v) => Value::Bool(v.as_bool().unwrap_or_else(|| {
                v.as_f64().is_some_and(|n| n != 0.0)
            })),
            (Self::Scaled { factor }, v) => match v.as_f64() {
                Some(n) => Value::from((n * factor).round() as i64),
                None => Value::Null,
            },
            (Self::Temperature { unit }, v) => match v.as_f64() {
                Some(n) => {
                    let celsius = match unit {
                        TemperatureUnit::Celsius => n,
                        TemperatureUnit::Fahrenheit => (n - 32.0) * 5.0 / 9.0,
                    };
                    Value::from((celsius * 100.0).round() as i64)
                }
                None => Value::Null,
            },
            (Self::Identity, PropertyValue::Bool(b)) => Value::Bool(b),
            (Self::Identity, PropertyValue::Integer(i)) => Value::from(i),
            (Self::Identity, PropertyValue::Number(n)) => Value::from(n),
        }
    }
}

fn number(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

fn shape(raw: &Value, ty: ValueType) -> Option<PropertyValue> {
    match ty {
        ValueType::Boolean => Some(PropertyValue::Bool(is_truthy(raw))),
        ValueType::Integer | ValueType::Number => shape_number(number(raw)?, ty),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn shape_number(v: f64, ty: ValueType) -> Option<PropertyValue> {
    match ty {
        ValueType::Integer => Some(PropertyValue::Integer(v.round() as i64)),
        ValueType::Number => Some(PropertyValue::Number(v)),
        ValueType::Boolean => Some(PropertyValue::Bool(v != 0.0)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    const BRIGHTNESS: Converter = Converter::Scaled { factor: 2.55 };

    fn close(a: PropertyValue, b: f64) -> bool {
        (a.as_f64().unwrap() - b).abs() < 1e-9
    }

    #[test]
    fn brightness_scales_both_ways() {
        assert_eq!(
            BRIGHTNESS.to_property(&json!(255), ValueType::Integer),
            Some(PropertyValue::Integer(100))
        );
        assert_eq!(
            BRIGHTNESS.to_property(&json!(128), ValueType::Integer),
            Some(PropertyValue::Integer(50))
        );
        assert_eq!(BRIGHTNESS.to_device(PropertyValue::Integer(100)), json!(255));
        assert_eq!(BRIGHTNESS.to_device(PropertyValue::Integer(20)), json!(51));
    }

    #[test]
    fn brightness_round_trip_within_one_percent() {
        for p in 0..=100_i64 {
            let raw = BRIGHTNESS.to_device(PropertyValue::Integer(p));
            let back = BRIGHTNESS
                .to_property(&raw, ValueType::Integer)
                .and_then(|v| v.as_i64())
                .unwrap();
            assert!((back - p).abs() <= 1, "{p} -> {raw} -> {back}");
        }
    }

    #[test]
    fn temperature_in_both_units() {
        let c = Converter::Temperature {
            unit: TemperatureUnit::Celsius,
        };
        let f = Converter::Temperature {
            unit: TemperatureUnit::Fahrenheit,
        };
        assert!(close(c.to_property(&json!(1800), ValueType::Number).unwrap(), 18.0));
        assert!(close(f.to_property(&json!(1800), ValueType::Number).unwrap(), 64.4));
        assert_eq!(f.to_device(PropertyValue::Number(64.4)), json!(1800));
    }

    #[test]
    fn boolean_coerces_truthy_values() {
        let b = Converter::Boolean;
        assert_eq!(
            b.to_property(&json!(1), ValueType::Boolean),
            Some(PropertyValue::Bool(true))
        );
        assert_eq!(
            b.to_property(&json!("false"), ValueType::Boolean),
            Some(PropertyValue::Bool(false))
        );
        assert_eq!(b.to_device(PropertyValue::Bool(true)), json!(true));
    }

    #[test]
    fn identity_shapes_by_type() {
        let id = Converter::Identity;
        assert_eq!(
            id.to_property(&json!(91), ValueType::Integer),
            Some(PropertyValue::Integer(91))
        );
        assert_eq!(
            id.to_property(&json!(12.5), ValueType::Number),
            Some(PropertyValue::Number(12.5))
        );
        assert_eq!(id.to_property(&json!(null), ValueType::Integer), None);
        assert_eq!(id.to_device(PropertyValue::Integer(370)), json!(370));
    }
}
