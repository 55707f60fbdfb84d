// ── Per-device poll loop ──
//
// One task per device: sleep, fetch the descriptor, reconcile. Errors in an
// iteration are logged and the loop carries on until the device is
// cancelled.

use std::sync::Arc;

use deconz_api::HubClient;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::model::Device;
use crate::notification::Notifier;

pub(crate) fn spawn(device: Arc<Device>, client: HubClient, notifier: Notifier) -> JoinHandle<()> {
    tokio::spawn(poll_loop(device, client, notifier))
}

async fn poll_loop(device: Arc<Device>, client: HubClient, notifier: Notifier) {
    let cancel = device.cancel_token().clone();
    let resource = device.resource().clone();

    info!(device = %device.unique_id(), interval = ?device.poll_interval(), "poller started");

    let mut interval = tokio::time::interval(device.poll_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    let mut failing = false;
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = client.get_resource(resource.class, &resource.id) => result,
        };

        match result {
            Ok(desc) => {
                if failing {
                    info!(device = %device.unique_id(), resource = %resource, "poll recovered");
                    failing = false;
                }
                device.apply_descriptor(&desc, &notifier).await;
            }
            Err(e) if e.is_not_found() => {
                warn!(device = %device.unique_id(), resource = %resource, "resource gone from hub");
                device.mark_unreachable(&notifier).await;
            }
            // transient failures are reported once per streak
            Err(e) if failing && e.is_transient() => {
                debug!(
                    device = %device.unique_id(),
                    resource = %resource,
                    error = %e,
                    "poll still failing"
                );
            }
            Err(e) => {
                warn!(
                    device = %device.unique_id(),
                    resource = %resource,
                    error = %e,
                    "poll failed"
                );
                failing = true;
            }
        }
    }

    info!(device = %device.unique_id(), "poller stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use deconz_api::transport::TransportConfig;
    use deconz_api::{ResourceClass, ResourceDescriptor};
    use secrecy::SecretString;
    use serde_json::json;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio_util::sync::CancellationToken;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::AdapterConfig;
    use crate::model::{DeviceKind, PropertyValue, ResourceKey, UniqueId};
    use crate::notification::HostNotification;

    const LIGHT_PATH: &str = "/api/KEY/lights/1";

    fn plug(etag: &str, on: bool) -> serde_json::Value {
        json!({
            "uniqueid": "00:0b:57:ff:fe:12:34:56-01",
            "type": "On/Off plug-in unit",
            "manufacturername": "IKEA of Sweden",
            "name": "Kettle",
            "etag": etag,
            "state": { "on": on, "reachable": true }
        })
    }

    fn setup(server: &MockServer, interval: Duration) -> (Arc<Device>, HubClient) {
        let url = Url::parse(&server.uri()).unwrap();
        let mut config = AdapterConfig::new(url.clone(), SecretString::from("KEY".to_owned()));
        config.poll_interval = interval;

        let desc: ResourceDescriptor = serde_json::from_value(plug("e0", false)).unwrap();
        let device = Arc::new(Device::build(
            UniqueId::from_hardware_id(&desc.uniqueid),
            ResourceKey::new(ResourceClass::Lights, "1"),
            DeviceKind::OnOffPlug,
            &desc,
            &config,
            CancellationToken::new(),
        ));
        let client = HubClient::new(&url, "KEY", &TransportConfig::default()).unwrap();
        (device, client)
    }

    /// Wait for the first notification matching `pred`.
    async fn wait_for(
        rx: &mut UnboundedReceiver<HostNotification>,
        pred: impl Fn(&HostNotification) -> bool,
    ) -> HostNotification {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let n = rx.recv().await.unwrap();
                if pred(&n) {
                    return n;
                }
            }
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn keeps_polling_after_a_failed_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(LIGHT_PATH))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(LIGHT_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(plug("e1", true)))
            .mount(&server)
            .await;

        let (device, client) = setup(&server, Duration::from_millis(20));
        let (notifier, mut rx) = Notifier::channel();
        let handle = spawn(Arc::clone(&device), client, notifier);
        device.track_task(handle).await;

        let changed = wait_for(&mut rx, |n| {
            matches!(n, HostNotification::PropertyChanged { property, .. } if property == "on")
        })
        .await;

        assert!(matches!(
            changed,
            HostNotification::PropertyChanged {
                value: PropertyValue::Bool(true),
                ..
            }
        ));
        assert!(server.received_requests().await.unwrap().len() >= 2);

        assert!(device.shutdown(Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn missing_resource_marks_device_unreachable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(LIGHT_PATH))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!([
                { "error": {
                    "type": 3,
                    "address": "/lights/1",
                    "description": "resource, /lights/1, not available"
                } }
            ])))
            .mount(&server)
            .await;

        let (device, client) = setup(&server, Duration::from_millis(20));
        let (notifier, mut rx) = Notifier::channel();
        let handle = spawn(Arc::clone(&device), client, notifier);
        device.track_task(handle).await;

        let gone = wait_for(&mut rx, |n| {
            matches!(n, HostNotification::ConnectivityChanged { .. })
        })
        .await;

        assert_eq!(
            gone,
            HostNotification::ConnectivityChanged {
                device_id: device.unique_id().clone(),
                connected: false,
            }
        );
        assert_eq!(device.reachable().await, Some(false));
        assert!(device.shutdown(Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn cancel_during_sleep_stops_promptly() {
        let server = MockServer::start().await;

        let (device, client) = setup(&server, Duration::from_secs(3600));
        let (notifier, _rx) = Notifier::channel();
        let handle = spawn(Arc::clone(&device), client, notifier);
        device.track_task(handle).await;
        tokio::task::yield_now().await;

        assert!(device.shutdown(Duration::from_millis(500)).await);
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
