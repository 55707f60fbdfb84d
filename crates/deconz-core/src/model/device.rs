// ── Device aggregate ──
//
// A device owns its properties behind one async mutex. Poll results and push
// events take that lock for their whole duration, so per-device updates never
// interleave. Host writes hold it only while preparing the value; the hub
// round trip runs unlocked and a per-property write generation decides
// whether a failure still applies.

use std::time::Duration;

use deconz_api::models::is_truthy;
use deconz_api::{HubClient, HubEvent, ResourceDescriptor, StateUpdate};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::identity::{ResourceKey, UniqueId};
use super::kind::DeviceKind;
use super::property::{Property, PropertySnapshot, Section};
use super::value::PropertyValue;
use crate::config::AdapterConfig;
use crate::error::CoreError;
use crate::notification::Notifier;

/// Config keys an event may carry that map onto properties.
const CONFIG_EVENT_KEYS: &[&str] = &["battery", "reachable"];
/// State keys an event may carry that map onto properties.
const STATE_EVENT_KEYS: &[&str] = &[
    "bri",
    "ct",
    "dark",
    "on",
    "power",
    "presence",
    "reachable",
    "temperature",
];

const LEVEL_PROPERTY: &str = "level";
const LEVEL_STEP: i64 = 10;

// ── DeviceDescription ───────────────────────────────────────────────

/// Host-facing model of a device and its properties.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceDescription {
    pub id: UniqueId,
    pub title: String,
    #[serde(rename = "@type")]
    pub type_tags: Vec<&'static str>,
    pub kind: DeviceKind,
    pub description: String,
    pub resource: ResourceKey,
    pub reachable: Option<bool>,
    pub properties: IndexMap<&'static str, PropertySnapshot>,
}

// ── Device ──────────────────────────────────────────────────────────

pub struct Device {
    unique_id: UniqueId,
    resource: ResourceKey,
    kind: DeviceKind,
    title: String,
    description: String,
    poll_interval: Duration,
    state: Mutex<DeviceState>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

struct DeviceState {
    reachable: Option<bool>,
    /// Set once the first descriptor has been reconciled.
    reachability_checked: bool,
    last_etag: Option<String>,
    properties: IndexMap<&'static str, Property>,
}

impl Device {
    /// Build a device from its discovery descriptor.
    ///
    /// Property values are seeded from `desc` without notifications.
    pub(crate) fn build(
        unique_id: UniqueId,
        resource: ResourceKey,
        kind: DeviceKind,
        desc: &ResourceDescriptor,
        config: &AdapterConfig,
        cancel: CancellationToken,
    ) -> Self {
        let mut properties = kind.properties(desc, config);
        for prop in properties.values_mut() {
            if let Some(raw) = prop.source().read(desc) {
                prop.seed(raw);
            }
        }

        let poll_interval = if kind.polls_slowly() {
            config.slow_poll_interval
        } else {
            config.poll_interval
        };

        Self {
            unique_id,
            resource,
            kind,
            title: title_of(desc),
            description: format!("{} / {}", desc.manufacturername, desc.resource_type),
            poll_interval,
            state: Mutex::new(DeviceState {
                reachable: None,
                reachability_checked: false,
                last_etag: None,
                properties,
            }),
            cancel,
            task_handles: Mutex::new(Vec::new()),
        }
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn unique_id(&self) -> &UniqueId {
        &self.unique_id
    }

    pub fn resource(&self) -> &ResourceKey {
        &self.resource
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// `false` once the device has been removed or the adapter unloaded.
    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub async fn reachable(&self) -> Option<bool> {
        self.state.lock().await.reachable
    }

    pub async fn property_value(&self, name: &str) -> Option<PropertyValue> {
        self.state.lock().await.properties.get(name)?.value()
    }

    /// Whether `name` exists and accepts host writes.
    pub async fn is_writable(&self, name: &str) -> bool {
        self.state
            .lock()
            .await
            .properties
            .get(name)
            .is_some_and(|p| !p.is_read_only())
    }

    pub async fn snapshot(&self) -> DeviceDescription {
        let state = self.state.lock().await;
        DeviceDescription {
            id: self.unique_id.clone(),
            title: self.title.clone(),
            type_tags: self.kind.type_tags().to_vec(),
            kind: self.kind,
            description: self.description.clone(),
            resource: self.resource.clone(),
            reachable: state.reachable,
            properties: state
                .properties
                .iter()
                .map(|(name, p)| (*name, p.snapshot()))
                .collect(),
        }
    }

    // ── Poll path ───────────────────────────────────────────────────

    /// Reconcile with a freshly fetched descriptor.
    ///
    /// Reachability is read on the first call and afterwards only when the
    /// etag moved; every property is re-evaluated regardless.
    pub(crate) async fn apply_descriptor(&self, desc: &ResourceDescriptor, notifier: &Notifier) {
        let mut state = self.state.lock().await;

        if !state.reachability_checked || desc.etag != state.last_etag {
            debug!(device = %self.unique_id, etag = ?desc.etag, "etag changed");
            state.reachability_checked = true;
            state.last_etag.clone_from(&desc.etag);

            match desc
                .state_value("reachable")
                .or_else(|| desc.config_value("reachable"))
            {
                Some(raw) => state.set_reachable(&self.unique_id, is_truthy(raw), notifier),
                None => warn!(device = %self.unique_id, "descriptor carries no reachable flag"),
            }
        }

        for prop in state.properties.values_mut() {
            let Some(raw) = prop.source().read(desc) else {
                continue;
            };
            if let Some(value) = prop.update(raw) {
                notifier.property_changed(&self.unique_id, prop.name(), value);
            }
        }
    }

    /// The hub no longer knows this resource.
    pub(crate) async fn mark_unreachable(&self, notifier: &Notifier) {
        self.state
            .lock()
            .await
            .set_reachable(&self.unique_id, false, notifier);
    }

    // ── Push path ───────────────────────────────────────────────────

    /// Route a push event into the matching properties.
    ///
    /// Returns `false` when the event carried nothing this device tracks.
    pub(crate) async fn apply_event(&self, event: &HubEvent, notifier: &Notifier) -> bool {
        let mut state = self.state.lock().await;

        if self.kind == DeviceKind::DimmerSwitch {
            if let Some(code) = event
                .state
                .as_ref()
                .and_then(|s| s.get("buttonevent"))
                .and_then(Value::as_i64)
            {
                state.press_button(&self.unique_id, code, notifier);
                return true;
            }
        }

        let mut handled = false;
        if let Some(config) = &event.config {
            handled |= state.route_section(
                &self.unique_id,
                Section::Config,
                config,
                CONFIG_EVENT_KEYS,
                notifier,
            );
        }
        if let Some(values) = &event.state {
            handled |= state.route_section(
                &self.unique_id,
                Section::State,
                values,
                STATE_EVENT_KEYS,
                notifier,
            );
        }

        if !handled {
            info!(device = %self.unique_id, kind = ?event.kind, "unhandled event");
        }
        handled
    }

    // ── Write path ──────────────────────────────────────────────────

    /// Write a normalized value to the hub.
    ///
    /// The cached value is updated and a change is reported before the hub
    /// answers. A failed or timed-out write leaves the cache as is, flags the
    /// property as pending confirmation (unless a newer write superseded it)
    /// and returns [`CoreError::Communication`].
    pub(crate) async fn write_property(
        &self,
        name: &str,
        value: PropertyValue,
        client: &HubClient,
        write_timeout: Duration,
        notifier: &Notifier,
    ) -> Result<(), CoreError> {
        let device = self.unique_id.to_string();

        let (property, key, raw, new_value, generation) = {
            let mut state = self.state.lock().await;
            let prop = state
                .properties
                .get_mut(name)
                .ok_or_else(|| CoreError::PropertyNotFound {
                    device: device.clone(),
                    property: name.to_owned(),
                })?;

            let Some(key) = prop.source().key() else {
                return Err(CoreError::Unsupported {
                    operation: format!("writing {name}"),
                });
            };
            let Some(raw) = prop.prepare_write(&device, value)? else {
                debug!(device, property = name, %value, "value unchanged, write skipped");
                return Ok(());
            };
            let Some(new_value) = prop.value() else {
                return Err(CoreError::Internal(format!("{name} has no value after write")));
            };
            (prop.name(), key, raw, new_value, prop.write_generation())
        };

        notifier.property_changed(&self.unique_id, property, new_value);

        debug!(device, property, %raw, value = %new_value, "writing to hub");
        let update = StateUpdate::new().with(key, &raw);
        let err = match tokio::time::timeout(
            write_timeout,
            client.set_light_state(&self.resource.id, &update),
        )
        .await
        {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => CoreError::Communication {
                device: device.clone(),
                message: e.to_string(),
            },
            Err(_) => CoreError::Communication {
                device: device.clone(),
                message: format!("write timed out after {}ms", write_timeout.as_millis()),
            },
        };

        let mut state = self.state.lock().await;
        let flagged = state
            .properties
            .get_mut(property)
            .is_some_and(|prop| prop.mark_write_failed(generation));
        if flagged {
            warn!(device, property, error = %err, "hub write failed, keeping optimistic value");
        } else {
            debug!(device, property, error = %err, "hub write failed after a newer write");
        }
        Err(err)
    }

    // ── Task supervision ────────────────────────────────────────────

    pub(crate) async fn track_task(&self, handle: JoinHandle<()>) {
        let mut handles = self.task_handles.lock().await;
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    /// Clear the active flag and wait up to `grace` for tasks to exit.
    ///
    /// Returns `false` if some task was still running when `grace` expired.
    pub(crate) async fn shutdown(&self, grace: Duration) -> bool {
        self.cancel.cancel();

        let handles: Vec<_> = self.task_handles.lock().await.drain(..).collect();
        let join_all = async {
            for handle in handles {
                let _ = handle.await;
            }
        };

        if tokio::time::timeout(grace, join_all).await.is_ok() {
            true
        } else {
            warn!(device = %self.unique_id, ?grace, "device tasks did not stop in time");
            false
        }
    }
}

impl DeviceState {
    fn set_reachable(&mut self, device: &UniqueId, reachable: bool, notifier: &Notifier) {
        if self.reachable == Some(reachable) {
            return;
        }
        info!(device = %device, reachable, "reachability changed");
        self.reachable = Some(reachable);
        notifier.connectivity_changed(device, reachable);
    }

    fn route_section(
        &mut self,
        device: &UniqueId,
        section: Section,
        values: &Map<String, Value>,
        keys: &[&str],
        notifier: &Notifier,
    ) -> bool {
        let mut handled = false;
        for key in keys {
            let Some(raw) = values.get(*key) else {
                continue;
            };

            if *key == "reachable" {
                self.set_reachable(device, is_truthy(raw), notifier);
                handled = true;
            }

            let Some(prop) = self
                .properties
                .values_mut()
                .find(|p| p.source().accepts(section, key))
            else {
                continue;
            };
            if let Some(value) = prop.update(raw) {
                notifier.property_changed(device, prop.name(), value);
            }
            handled = true;
        }
        handled
    }

    fn press_button(&mut self, device: &UniqueId, code: i64, notifier: &Notifier) {
        let Some(level) = self.properties.get_mut(LEVEL_PROPERTY) else {
            return;
        };
        let current = level.value().and_then(|v| v.as_i64()).unwrap_or(0);

        let next = match code {
            1002 => 100,
            2002 => current + LEVEL_STEP,
            3002 => current - LEVEL_STEP,
            4002 => 0,
            other => {
                debug!(device = %device, code = other, "ignoring button event");
                return;
            }
        }
        .clamp(0, 100);

        if let Some(value) = level.update(&Value::from(next)) {
            notifier.property_changed(device, LEVEL_PROPERTY, value);
        }
    }
}

fn title_of(desc: &ResourceDescriptor) -> String {
    match desc.name.as_deref() {
        Some(name) if !name.is_empty() => name.to_owned(),
        _ => desc.manufacturername.clone(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use deconz_api::ResourceClass;
    use pretty_assertions::assert_eq;
    use secrecy::SecretString;
    use serde_json::json;
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::notification::HostNotification;

    fn config() -> AdapterConfig {
        AdapterConfig::new(
            "http://hub.local".parse().unwrap(),
            SecretString::from("KEY".to_owned()),
        )
    }

    fn descriptor(raw: serde_json::Value) -> ResourceDescriptor {
        serde_json::from_value(raw).unwrap()
    }

    fn device(kind: DeviceKind, id: &str, desc: &ResourceDescriptor) -> Device {
        Device::build(
            UniqueId::from_hardware_id(&desc.uniqueid),
            ResourceKey::new(kind.resource_class(), id),
            kind,
            desc,
            &config(),
            CancellationToken::new(),
        )
    }

    fn event(raw: serde_json::Value) -> HubEvent {
        serde_json::from_value(raw).unwrap()
    }

    fn drain(rx: &mut UnboundedReceiver<HostNotification>) -> Vec<HostNotification> {
        let mut out = Vec::new();
        while let Ok(n) = rx.try_recv() {
            out.push(n);
        }
        out
    }

    fn presence_descriptor() -> ResourceDescriptor {
        descriptor(json!({
            "uniqueid": "00:17:88:01:02:03:04:05-02-0406",
            "type": "ZHAPresence",
            "manufacturername": "Philips",
            "name": "",
            "etag": "e1",
            "state": { "presence": false, "reachable": true },
            "config": { "battery": 90, "reachable": true }
        }))
    }

    #[tokio::test]
    async fn seeding_is_silent_and_fills_metadata() {
        let desc = presence_descriptor();
        let dev = device(DeviceKind::PresenceSensor, "5", &desc);

        assert_eq!(dev.title(), "Philips");
        assert_eq!(dev.description(), "Philips / ZHAPresence");
        assert_eq!(dev.unique_id().as_str(), "00:17:88:01:02:03:04:05");
        assert_eq!(dev.property_value("motion").await, Some(PropertyValue::Bool(false)));
        assert_eq!(dev.property_value("battery").await, Some(PropertyValue::Integer(90)));
        assert_eq!(dev.property_value("dark").await, None);
        assert_eq!(dev.reachable().await, None);
    }

    #[tokio::test]
    async fn poll_reports_reachability_once_per_etag() {
        let (notifier, mut rx) = Notifier::channel();
        let desc = presence_descriptor();
        let dev = device(DeviceKind::PresenceSensor, "5", &desc);

        dev.apply_descriptor(&desc, &notifier).await;
        dev.apply_descriptor(&desc, &notifier).await;

        assert_eq!(
            drain(&mut rx),
            vec![HostNotification::ConnectivityChanged {
                device_id: dev.unique_id().clone(),
                connected: true,
            }]
        );

        let mut moved = desc.clone();
        moved.etag = Some("e2".into());
        moved.state.insert("presence".into(), json!(true));
        dev.apply_descriptor(&moved, &notifier).await;

        assert_eq!(
            drain(&mut rx),
            vec![HostNotification::PropertyChanged {
                device_id: dev.unique_id().clone(),
                property: "motion".into(),
                value: PropertyValue::Bool(true),
            }]
        );
    }

    #[tokio::test]
    async fn first_poll_reads_reachability_without_etag() {
        let (notifier, mut rx) = Notifier::channel();
        let desc = descriptor(json!({
            "uniqueid": "00:0b:57:ff:fe:12:34:56-01",
            "type": "On/Off plug-in unit",
            "manufacturername": "IKEA of Sweden",
            "name": "Kettle",
            "state": { "on": false, "reachable": false }
        }));
        let dev = device(DeviceKind::OnOffPlug, "1", &desc);

        dev.apply_descriptor(&desc, &notifier).await;
        dev.apply_descriptor(&desc, &notifier).await;

        assert_eq!(dev.reachable().await, Some(false));
        assert_eq!(
            drain(&mut rx),
            vec![HostNotification::ConnectivityChanged {
                device_id: dev.unique_id().clone(),
                connected: false,
            }]
        );
    }

    #[tokio::test]
    async fn event_routes_presence_and_config() {
        let (notifier, mut rx) = Notifier::channel();
        let dev = device(DeviceKind::PresenceSensor, "5", &presence_descriptor());

        let handled = dev
            .apply_event(
                &event(json!({
                    "t": "event", "e": "changed", "r": "sensors", "id": "5",
                    "state": { "presence": true, "dark": true, "lastupdated": "x" }
                })),
                &notifier,
            )
            .await;
        assert!(handled);

        let handled = dev
            .apply_event(
                &event(json!({
                    "t": "event", "e": "changed", "r": "sensors", "id": "5",
                    "config": { "battery": 60, "reachable": false, "duration": 60 }
                })),
                &notifier,
            )
            .await;
        assert!(handled);

        let id = dev.unique_id().clone();
        assert_eq!(
            drain(&mut rx),
            vec![
                HostNotification::PropertyChanged {
                    device_id: id.clone(),
                    property: "dark".into(),
                    value: PropertyValue::Bool(true),
                },
                HostNotification::PropertyChanged {
                    device_id: id.clone(),
                    property: "motion".into(),
                    value: PropertyValue::Bool(true),
                },
                HostNotification::PropertyChanged {
                    device_id: id.clone(),
                    property: "battery".into(),
                    value: PropertyValue::Integer(60),
                },
                HostNotification::ConnectivityChanged {
                    device_id: id.clone(),
                    connected: false,
                },
                HostNotification::PropertyChanged {
                    device_id: id,
                    property: "reachable".into(),
                    value: PropertyValue::Bool(false),
                },
            ]
        );
    }

    #[tokio::test]
    async fn event_without_known_keys_is_unhandled() {
        let (notifier, mut rx) = Notifier::channel();
        let dev = device(DeviceKind::PresenceSensor, "5", &presence_descriptor());

        let handled = dev
            .apply_event(
                &event(json!({
                    "t": "event", "e": "changed", "r": "sensors", "id": "5",
                    "state": { "lastupdated": "2026-01-01T00:00:00" }
                })),
                &notifier,
            )
            .await;

        assert!(!handled);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn dimmer_buttons_step_level() {
        let (notifier, mut rx) = Notifier::channel();
        let desc = descriptor(json!({
            "uniqueid": "00:0b:57:ff:fe:aa:bb:cc-01-1000",
            "type": "ZHASwitch",
            "manufacturername": "IKEA of Sweden",
            "name": "Dimmer",
            "state": { "buttonevent": 1002 },
            "config": { "battery": 40, "reachable": true }
        }));
        let dev = device(DeviceKind::DimmerSwitch, "8", &desc);
        assert_eq!(dev.property_value("level").await, None);

        let press = |code: i64| {
            event(json!({
                "t": "event", "e": "changed", "r": "sensors", "id": "8",
                "state": { "buttonevent": code }
            }))
        };

        for _ in 0..3 {
            assert!(dev.apply_event(&press(2002), &notifier).await);
        }
        assert_eq!(dev.property_value("level").await, Some(PropertyValue::Integer(30)));

        dev.apply_event(&press(1002), &notifier).await;
        assert_eq!(dev.property_value("level").await, Some(PropertyValue::Integer(100)));

        // already at the top
        dev.apply_event(&press(2002), &notifier).await;
        assert_eq!(dev.property_value("level").await, Some(PropertyValue::Integer(100)));

        dev.apply_event(&press(4002), &notifier).await;
        assert_eq!(dev.property_value("level").await, Some(PropertyValue::Integer(0)));

        dev.apply_event(&press(3002), &notifier).await;
        assert_eq!(dev.property_value("level").await, Some(PropertyValue::Integer(0)));

        // 10, 20, 30, 100, 0
        assert_eq!(drain(&mut rx).len(), 5);
    }

    #[tokio::test]
    async fn temperature_sensor_polls_slowly() {
        let desc = descriptor(json!({
            "uniqueid": "00:15:8d:00:02:aa:bb:cc-01-0402",
            "type": "ZHATemperature",
            "manufacturername": "LUMI",
            "state": { "temperature": 1800 },
            "config": { "battery": 91, "reachable": true }
        }));
        let dev = device(DeviceKind::TemperatureSensor, "6", &desc);

        assert_eq!(dev.poll_interval(), Duration::from_secs(300));
        assert_eq!(dev.property_value("temperature").await, Some(PropertyValue::Number(18.0)));
        assert_eq!(dev.resource().class, ResourceClass::Sensors);
    }

    #[tokio::test]
    async fn snapshot_lists_properties_in_order() {
        let dev = device(DeviceKind::PresenceSensor, "5", &presence_descriptor());
        let snap = dev.snapshot().await;

        assert_eq!(snap.type_tags, vec!["MotionSensor"]);
        assert_eq!(
            snap.properties.keys().copied().collect::<Vec<_>>(),
            vec!["reachable", "motion", "battery", "dark"]
        );
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["@type"], json!(["MotionSensor"]));
        assert_eq!(json["kind"], "presence-sensor");
        assert_eq!(json["properties"]["motion"]["readOnly"], true);
    }

    #[tokio::test]
    async fn shutdown_joins_tracked_tasks() {
        let dev = device(DeviceKind::PresenceSensor, "5", &presence_descriptor());
        let token = dev.cancel_token().clone();
        dev.track_task(tokio::spawn(async move { token.cancelled().await }))
            .await;

        assert!(dev.is_active());
        assert!(dev.shutdown(Duration::from_secs(1)).await);
        assert!(!dev.is_active());
    }
}
