// ── Domain model ──
//
// Devices, their properties and the value conversions between hub units
// and host units.

mod converter;
mod device;
mod identity;
mod kind;
mod property;
mod value;

pub use converter::Converter;
pub use device::{Device, DeviceDescription};
pub use identity::{ResourceKey, UniqueId};
pub use kind::DeviceKind;
pub use property::{Property, PropertyMeta, PropertySnapshot, Section, Source};
pub use value::{PropertyValue, ValueType};
