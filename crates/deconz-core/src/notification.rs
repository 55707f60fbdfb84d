// ── Host notifications ──
//
// Everything the engine reports to its host travels over one unbounded
// mpsc channel. The host takes the receiver once from the `Adapter`.

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::trace;

use crate::model::{DeviceDescription, PropertyValue, UniqueId};

/// A message from the adapter to its host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HostNotification {
    DeviceAdded {
        device: DeviceDescription,
    },
    DeviceRemoved {
        device_id: UniqueId,
    },
    PropertyChanged {
        device_id: UniqueId,
        property: String,
        value: PropertyValue,
    },
    ConnectivityChanged {
        device_id: UniqueId,
        connected: bool,
    },
    AdapterError {
        message: String,
    },
}

/// Sending half of the notification channel, cloned into every task.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<HostNotification>,
}

impl Notifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<HostNotification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, notification: HostNotification) {
        if self.tx.send(notification).is_err() {
            trace!("host receiver dropped, notification discarded");
        }
    }

    pub fn device_added(&self, device: DeviceDescription) {
        self.send(HostNotification::DeviceAdded { device });
    }

    pub fn device_removed(&self, device_id: &UniqueId) {
        self.send(HostNotification::DeviceRemoved {
            device_id: device_id.clone(),
        });
    }

    pub fn property_changed(&self, device_id: &UniqueId, property: &str, value: PropertyValue) {
        self.send(HostNotification::PropertyChanged {
            device_id: device_id.clone(),
            property: property.to_owned(),
            value,
        });
    }

    pub fn connectivity_changed(&self, device_id: &UniqueId, connected: bool) {
        self.send(HostNotification::ConnectivityChanged {
            device_id: device_id.clone(),
            connected,
        });
    }

    pub fn adapter_error(&self, message: impl Into<String>) {
        self.send(HostNotification::AdapterError {
            message: message.into(),
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn notifications_serialize_with_kind_tag() {
        let n = HostNotification::PropertyChanged {
            device_id: UniqueId::from("00:11:22:33:44:55:66:77"),
            property: "bri".into(),
            value: PropertyValue::Integer(40),
        };
        assert_eq!(
            serde_json::to_value(&n).unwrap(),
            json!({
                "kind": "property_changed",
                "device_id": "00:11:22:33:44:55:66:77",
                "property": "bri",
                "value": 40
            })
        );
    }

    #[test]
    fn send_after_receiver_dropped_is_silent() {
        let (notifier, rx) = Notifier::channel();
        drop(rx);
        notifier.adapter_error("hub unreachable");
    }

    #[tokio::test]
    async fn helpers_deliver_in_order() {
        let (notifier, mut rx) = Notifier::channel();
        let id = UniqueId::from("dev");
        notifier.connectivity_changed(&id, true);
        notifier.device_removed(&id);

        assert_eq!(
            rx.recv().await.unwrap(),
            HostNotification::ConnectivityChanged {
                device_id: id.clone(),
                connected: true
            }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            HostNotification::DeviceRemoved { device_id: id }
        );
    }
}
