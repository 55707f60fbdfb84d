// ── Device kinds and their capabilities ──
//
// Closed set of supported device kinds. Everything a kind implies (tags,
// properties, poll pace) is looked up here rather than spread across types.

use deconz_api::{ResourceClass, ResourceDescriptor};
use indexmap::IndexMap;
use serde::Serialize;

use super::property::{self, Property};
use crate::config::AdapterConfig;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::IntoStaticStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DeviceKind {
    OnOffPlug,
    DimmableLight,
    ColorTemperatureLight,
    PresenceSensor,
    DimmerSwitch,
    TemperatureSensor,
}

/// Light types are matched exactly.
const LIGHT_TYPES: &[(&str, DeviceKind)] = &[
    ("On/Off plug-in unit", DeviceKind::OnOffPlug),
    ("Dimmable light", DeviceKind::DimmableLight),
    ("Color temperature light", DeviceKind::ColorTemperatureLight),
];

/// Sensor types are matched by prefix, first rule wins.
const SENSOR_PREFIXES: &[(&str, DeviceKind)] = &[
    ("ZHAPresence", DeviceKind::PresenceSensor),
    ("ZHASwitch", DeviceKind::DimmerSwitch),
    ("ZHATemperature", DeviceKind::TemperatureSensor),
];

impl DeviceKind {
    /// Map a hub resource type to a kind. `None` means unsupported.
    pub fn classify(class: ResourceClass, resource_type: &str) -> Option<Self> {
        match class {
            ResourceClass::Lights => LIGHT_TYPES
                .iter()
                .find(|(t, _)| *t == resource_type)
                .map(|(_, k)| *k),
            ResourceClass::Sensors => SENSOR_PREFIXES
                .iter()
                .find(|(p, _)| resource_type.starts_with(p))
                .map(|(_, k)| *k),
        }
    }

    pub fn resource_class(self) -> ResourceClass {
        match self {
            Self::OnOffPlug | Self::DimmableLight | Self::ColorTemperatureLight => {
                ResourceClass::Lights
            }
            Self::PresenceSensor | Self::DimmerSwitch | Self::TemperatureSensor => {
                ResourceClass::Sensors
            }
        }
    }

    /// Semantic `@type` tags advertised to the host.
    pub fn type_tags(self) -> &'static [&'static str] {
        match self {
            Self::OnOffPlug => &["OnOffSwitch", "SmartPlug"],
            Self::DimmableLight => &["Light", "OnOffSwitch"],
            Self::ColorTemperatureLight => &["Light", "ColorControl", "OnOffSwitch"],
            Self::PresenceSensor => &["MotionSensor"],
            Self::DimmerSwitch => &["MultiLevelSwitch"],
            Self::TemperatureSensor => &["TemperatureSensor"],
        }
    }

    /// Slow-changing kinds poll on the long interval.
    pub fn polls_slowly(self) -> bool {
        matches!(self, Self::TemperatureSensor)
    }

    /// Build the property set for this kind, in display order.
    pub(crate) fn properties(
        self,
        desc: &ResourceDescriptor,
        config: &AdapterConfig,
    ) -> IndexMap<&'static str, Property> {
        let mut props = vec![property::reachable()];

        match self {
            Self::OnOffPlug => {
                props.extend([property::on_off(), property::power()]);
            }
            Self::DimmableLight => {
                props.extend([property::on_off(), property::brightness()]);
            }
            Self::ColorTemperatureLight => {
                props.push(property::on_off());
                if desc.state.contains_key("bri") {
                    props.push(property::brightness());
                }
                if desc.state.contains_key("ct") {
                    props.push(property::color_temperature(desc.ctmin, desc.ctmax));
                }
            }
            Self::PresenceSensor => {
                props.extend([property::motion(), property::battery(), property::dark()]);
            }
            Self::DimmerSwitch => {
                props.extend([property::level(), property::battery()]);
            }
            Self::TemperatureSensor => {
                props.extend([
                    property::temperature(config.temperature_unit),
                    property::battery(),
                ]);
            }
        }

        props.into_iter().map(|p| (p.name(), p)).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use secrecy::SecretString;
    use serde_json::json;

    use super::*;

    fn config() -> AdapterConfig {
        AdapterConfig::new(
            "http://hub.local".parse().unwrap(),
            SecretString::from("KEY".to_owned()),
        )
    }

    #[test]
    fn lights_match_exactly() {
        assert_eq!(
            DeviceKind::classify(ResourceClass::Lights, "Dimmable light"),
            Some(DeviceKind::DimmableLight)
        );
        assert_eq!(
            DeviceKind::classify(ResourceClass::Lights, "Dimmable light 2"),
            None
        );
        assert_eq!(
            DeviceKind::classify(ResourceClass::Lights, "Extended color light"),
            None
        );
    }

    #[test]
    fn sensors_match_by_prefix() {
        assert_eq!(
            DeviceKind::classify(ResourceClass::Sensors, "ZHAPresence"),
            Some(DeviceKind::PresenceSensor)
        );
        assert_eq!(
            DeviceKind::classify(ResourceClass::Sensors, "ZHASwitch"),
            Some(DeviceKind::DimmerSwitch)
        );
        assert_eq!(
            DeviceKind::classify(ResourceClass::Sensors, "ZHATemperatureX"),
            Some(DeviceKind::TemperatureSensor)
        );
        assert_eq!(
            DeviceKind::classify(ResourceClass::Sensors, "ZHALightLevel"),
            None
        );
        // a light type string under sensors is not a light
        assert_eq!(
            DeviceKind::classify(ResourceClass::Sensors, "Dimmable light"),
            None
        );
    }

    #[test]
    fn color_light_properties_follow_descriptor() {
        let desc: ResourceDescriptor = serde_json::from_value(json!({
            "type": "Color temperature light",
            "ctmin": 153,
            "ctmax": 500,
            "state": { "on": true, "ct": 300, "reachable": true }
        }))
        .unwrap();

        let props = DeviceKind::ColorTemperatureLight.properties(&desc, &config());
        let names: Vec<_> = props.keys().copied().collect();
        assert_eq!(names, vec!["reachable", "on", "ct"]);
        assert_eq!(props["ct"].meta().minimum, Some(153.0));
        assert_eq!(props["ct"].meta().maximum, Some(500.0));
    }

    #[test]
    fn capability_table() {
        let desc = ResourceDescriptor::default();
        let names = |kind: DeviceKind| -> Vec<&'static str> {
            kind.properties(&desc, &config()).keys().copied().collect()
        };

        assert_eq!(names(DeviceKind::OnOffPlug), vec!["reachable", "on", "power"]);
        assert_eq!(
            names(DeviceKind::PresenceSensor),
            vec!["reachable", "motion", "battery", "dark"]
        );
        assert_eq!(names(DeviceKind::DimmerSwitch), vec!["reachable", "level", "battery"]);
        assert_eq!(
            names(DeviceKind::TemperatureSensor),
            vec!["reachable", "temperature", "battery"]
        );
        assert!(DeviceKind::TemperatureSensor.polls_slowly());
        assert_eq!(DeviceKind::OnOffPlug.type_tags(), &["OnOffSwitch", "SmartPlug"]);
        assert_eq!(DeviceKind::DimmerSwitch.to_string(), "dimmer-switch");
    }
}
