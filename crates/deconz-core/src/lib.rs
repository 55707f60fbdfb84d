//! Device/property synchronization engine for deCONZ-compatible hubs.
//!
//! - **[`Adapter`]**: lifecycle facade. [`start()`](Adapter::start) runs a
//!   pairing pass, spawns one poller per device and opens the push channel
//!   in the background, retrying until it connects.
//!   Host requests (`set_property`, `perform_action`, `remove_device`,
//!   `unload`) go through it as well.
//!
//! - **Domain model** ([`model`]): [`Device`] aggregates typed
//!   [`Property`] values, each with a [`Converter`] between hub units and
//!   host units. [`DeviceKind`] is the closed set of supported devices.
//!
//! - **[`HostNotification`]**: everything reported back to the host, on one
//!   channel taken from [`Adapter::take_notifications`].

pub mod action;
pub mod adapter;
pub mod config;
mod discovery;
mod dispatcher;
pub mod error;
pub mod model;
pub mod notification;
mod poller;
mod registry;

// ── Primary re-exports ──────────────────────────────────────────────
pub use action::Action;
pub use adapter::Adapter;
pub use config::{AdapterConfig, TemperatureUnit};
pub use error::CoreError;
pub use notification::{HostNotification, Notifier};

pub use model::{
    Converter, Device, DeviceDescription, DeviceKind, Property, PropertyMeta, PropertySnapshot,
    PropertyValue, ResourceKey, UniqueId, ValueType,
};
