// ── Push event dispatch ──
//
// Bridges the WebSocket broadcast stream to devices. Every event is looked up
// by `(r, id)` in the registry mapping; anything that does not resolve to a
// device is logged and dropped.

use std::sync::Arc;

use deconz_api::HubEvent;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::model::ResourceKey;
use crate::notification::Notifier;
use crate::registry::DeviceRegistry;

pub(crate) async fn dispatch_loop(
    registry: Arc<DeviceRegistry>,
    mut events: broadcast::Receiver<Arc<HubEvent>>,
    notifier: Notifier,
    cancel: CancellationToken,
) {
    info!("event dispatcher started");

    loop {
        let received = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            received = events.recv() => received,
        };

        match received {
            Ok(event) => {
                if let Err(e) = route_event(&registry, &event, &notifier).await {
                    debug!(error = %e, "event dropped");
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "event dispatcher lagged behind the stream");
            }
            Err(RecvError::Closed) => {
                if !cancel.is_cancelled() {
                    let err = CoreError::ConnectionLost {
                        reason: "event stream closed".into(),
                    };
                    warn!(error = %err, "event dispatcher stopping");
                    notifier.adapter_error(err.to_string());
                }
                break;
            }
        }
    }

    info!("event dispatcher stopped");
}

/// Deliver one event to its device.
///
/// Returns whether the device recognised any of the event's keys.
pub(crate) async fn route_event(
    registry: &DeviceRegistry,
    event: &HubEvent,
    notifier: &Notifier,
) -> Result<bool, CoreError> {
    let Some(class) = event.resource_class() else {
        return Err(CoreError::Protocol {
            message: format!("event for unsupported resource '{}'", event.resource),
        });
    };

    let key = ResourceKey::new(class, event.id.as_str());
    let Some(device) = registry.resolve(&key) else {
        return Err(CoreError::Protocol {
            message: format!("no device for {key}"),
        });
    };

    if !device.is_active() {
        debug!(device = %device.unique_id(), "event for inactive device ignored");
        return Ok(false);
    }

    Ok(device.apply_event(event, notifier).await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use deconz_api::{ResourceClass, ResourceDescriptor};
    use secrecy::SecretString;
    use serde_json::json;

    use super::*;
    use crate::config::AdapterConfig;
    use crate::model::{Device, DeviceKind, PropertyValue, UniqueId};
    use crate::notification::HostNotification;

    fn registry_with_presence() -> (DeviceRegistry, UniqueId) {
        let config = AdapterConfig::new(
            "http://hub.local".parse().unwrap(),
            SecretString::from("KEY".to_owned()),
        );
        let desc: ResourceDescriptor = serde_json::from_value(json!({
            "uniqueid": "00:17:88:01:02:03:04:05-02-0406",
            "type": "ZHAPresence",
            "state": { "presence": false }
        }))
        .unwrap();
        let uid = UniqueId::from_hardware_id(&desc.uniqueid);
        let key = ResourceKey::new(ResourceClass::Sensors, "5");

        let registry = DeviceRegistry::new();
        registry.insert(Arc::new(Device::build(
            uid.clone(),
            key.clone(),
            DeviceKind::PresenceSensor,
            &desc,
            &config,
            CancellationToken::new(),
        )));
        registry.map_resource(key, uid.clone());
        (registry, uid)
    }

    fn event(raw: serde_json::Value) -> HubEvent {
        serde_json::from_value(raw).unwrap()
    }

    #[tokio::test]
    async fn unmapped_and_foreign_events_are_protocol_errors() {
        let (registry, _) = registry_with_presence();
        let (notifier, mut rx) = Notifier::channel();

        let unmapped = event(json!({
            "t": "event", "e": "changed", "r": "sensors", "id": "99",
            "state": { "presence": true }
        }));
        let group = event(json!({
            "t": "event", "e": "changed", "r": "groups", "id": "5",
            "state": { "any_on": true }
        }));

        assert!(matches!(
            route_event(&registry, &unmapped, &notifier).await,
            Err(CoreError::Protocol { .. })
        ));
        assert!(matches!(
            route_event(&registry, &group, &notifier).await,
            Err(CoreError::Protocol { .. })
        ));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn loop_routes_events_until_cancelled() {
        let (registry, uid) = registry_with_presence();
        let (notifier, mut rx) = Notifier::channel();
        let (tx, events) = broadcast::channel(8);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(dispatch_loop(
            Arc::new(registry),
            events,
            notifier,
            cancel.clone(),
        ));

        tx.send(Arc::new(event(json!({
            "t": "event", "e": "changed", "r": "sensors", "id": 5,
            "state": { "presence": true }
        }))))
        .unwrap();

        let got = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            got,
            HostNotification::PropertyChanged {
                device_id: uid,
                property: "motion".into(),
                value: PropertyValue::Bool(true),
            }
        );

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn closed_stream_reports_adapter_error() {
        let (registry, _) = registry_with_presence();
        let (notifier, mut rx) = Notifier::channel();
        let (tx, events) = broadcast::channel::<Arc<HubEvent>>(8);
        drop(tx);

        dispatch_loop(Arc::new(registry), events, notifier, CancellationToken::new()).await;

        assert!(matches!(
            rx.try_recv().unwrap(),
            HostNotification::AdapterError { .. }
        ));
    }
}
