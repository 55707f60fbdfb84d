// ── Device identity ──
//
// A hub exposes one physical device as several resources (a presence
// sensor and a light-level sensor, say) whose hardware ids differ only in
// the endpoint/cluster suffix. `UniqueId` strips that suffix so all of
// them collapse onto one device.

use std::fmt;

use deconz_api::ResourceClass;
use serde::{Deserialize, Serialize};

/// Separators a full IEEE address carries (`aa:bb:cc:dd:ee:ff:00:11`).
const ADDRESS_SEPARATORS: usize = 7;
/// Length of a bare IEEE address.
const ADDRESS_LEN: usize = 23;

// ── UniqueId ────────────────────────────────────────────────────────

/// Stable device id derived from the hub's hardware id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UniqueId(String);

impl UniqueId {
    /// Canonicalize a hub `uniqueid`.
    ///
    /// An id with at least seven `:` separators and at least 24 characters
    /// is cut to its first 23 (the bare address); anything else is kept.
    pub fn from_hardware_id(raw: &str) -> Self {
        let separators = raw.matches(':').count();
        if separators >= ADDRESS_SEPARATORS && raw.len() > ADDRESS_LEN {
            if let Some(prefix) = raw.get(..ADDRESS_LEN) {
                return Self(prefix.to_owned());
            }
        }
        Self(raw.to_owned())
    }

    /// Fallback id for resources the hub reports without a `uniqueid`.
    pub fn synthetic(class: ResourceClass, hub_id: &str) -> Self {
        Self(format!("{class}-{hub_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UniqueId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ── ResourceKey ─────────────────────────────────────────────────────

/// `(resource class, hub-local id)`: how the hub addresses a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    pub class: ResourceClass,
    pub id: String,
}

impl ResourceKey {
    pub fn new(class: ResourceClass, id: impl Into<String>) -> Self {
        Self {
            class,
            id: id.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.class, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_hardware_id_is_truncated() {
        let id = UniqueId::from_hardware_id("00:11:22:33:44:55:66:AA-01");
        assert_eq!(id.as_str(), "00:11:22:33:44:55:66:AA");
    }

    #[test]
    fn sibling_endpoints_collapse() {
        let presence = UniqueId::from_hardware_id("00:17:88:01:02:03:04:05-02-0406");
        let light_level = UniqueId::from_hardware_id("00:17:88:01:02:03:04:05-02-0400");
        assert_eq!(presence, light_level);
    }

    #[test]
    fn short_or_partial_ids_pass_through() {
        assert_eq!(
            UniqueId::from_hardware_id("00:11:22:33:44:55-01").as_str(),
            "00:11:22:33:44:55-01"
        );
        // bare address: seven separators but only 23 characters
        assert_eq!(
            UniqueId::from_hardware_id("00:11:22:33:44:55:66:AA").as_str(),
            "00:11:22:33:44:55:66:AA"
        );
        assert_eq!(UniqueId::from_hardware_id("").as_str(), "");
    }

    #[test]
    fn resource_key_display() {
        let key = ResourceKey::new(ResourceClass::Sensors, "5");
        assert_eq!(key.to_string(), "sensors/5");
        assert_eq!(
            UniqueId::synthetic(ResourceClass::Lights, "3").as_str(),
            "lights-3"
        );
    }
}
