// ── Host-facing property values ──

use std::fmt;

use serde::{Deserialize, Serialize};

/// Semantic type of a property, as advertised to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ValueType {
    Boolean,
    Integer,
    Number,
}

/// A normalized property value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Integer(i64),
    Number(f64),
}

impl PropertyValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Number(n) => Some(*n),
            Self::Bool(_) => None,
        }
    }

    /// Coerce a host-supplied value to `ty`.
    ///
    /// Numbers cross freely between integer and number (integers round);
    /// booleans never mix with numbers. Non-finite numbers are rejected.
    #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
    pub fn coerce(self, ty: ValueType) -> Option<Self> {
        match (ty, self) {
            (ValueType::Boolean, Self::Bool(b)) => Some(Self::Bool(b)),
            (ValueType::Integer, Self::Integer(i)) => Some(Self::Integer(i)),
            (ValueType::Integer, Self::Number(n)) if n.is_finite() => {
                Some(Self::Integer(n.round() as i64))
            }
            (ValueType::Number, Self::Number(n)) if n.is_finite() => Some(Self::Number(n)),
            (ValueType::Number, Self::Integer(_)) => self.as_f64().map(Self::Number),
            _ => None,
        }
    }

    /// Clamp numeric values into `[minimum, maximum]`.
    #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
    pub fn clamp(self, minimum: Option<f64>, maximum: Option<f64>) -> Self {
        match self {
            Self::Integer(mut i) => {
                if let Some(min) = minimum.map(|m| m.ceil() as i64) {
                    i = i.max(min);
                }
                if let Some(max) = maximum.map(|m| m.floor() as i64) {
                    i = i.min(max);
                }
                Self::Integer(i)
            }
            Self::Number(mut n) => {
                if let Some(min) = minimum {
                    n = n.max(min);
                }
                if let Some(max) = maximum {
                    n = n.min(max);
                }
                Self::Number(n)
            }
            Self::Bool(_) => self,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for PropertyValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerce_between_numeric_types() {
        assert_eq!(
            PropertyValue::Number(41.6).coerce(ValueType::Integer),
            Some(PropertyValue::Integer(42))
        );
        assert_eq!(
            PropertyValue::Integer(3).coerce(ValueType::Number),
            Some(PropertyValue::Number(3.0))
        );
        assert_eq!(PropertyValue::Bool(true).coerce(ValueType::Integer), None);
        assert_eq!(PropertyValue::Integer(1).coerce(ValueType::Boolean), None);
        assert_eq!(PropertyValue::Number(f64::NAN).coerce(ValueType::Number), None);
    }

    #[test]
    fn clamp_respects_bounds() {
        let min = Some(10.0);
        let max = Some(100.0);
        assert_eq!(
            PropertyValue::Integer(3).clamp(min, max),
            PropertyValue::Integer(10)
        );
        assert_eq!(
            PropertyValue::Integer(250).clamp(min, max),
            PropertyValue::Integer(100)
        );
        assert_eq!(
            PropertyValue::Integer(55).clamp(min, max),
            PropertyValue::Integer(55)
        );
        assert_eq!(
            PropertyValue::Number(-4.5).clamp(Some(0.0), None),
            PropertyValue::Number(0.0)
        );
        assert_eq!(
            PropertyValue::Bool(true).clamp(min, max),
            PropertyValue::Bool(true)
        );
    }

    #[test]
    fn untagged_serialization() {
        assert_eq!(serde_json::to_string(&PropertyValue::Bool(true)).unwrap_or_default(), "true");
        assert_eq!(serde_json::to_string(&PropertyValue::Integer(7)).unwrap_or_default(), "7");
        assert_eq!(serde_json::to_string(&PropertyValue::Number(18.5)).unwrap_or_default(), "18.5");
    }
}
