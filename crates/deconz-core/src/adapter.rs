// ── Adapter ──
//
// Lifecycle facade for one hub: pairing passes, per-device pollers, the
// push-event dispatcher and host requests. Cheaply cloneable.

use std::sync::Arc;

use deconz_api::transport::TransportConfig;
use deconz_api::{HubClient, HubEvent, WebSocketHandle};
use futures_util::future::join_all;
use secrecy::ExposeSecret;
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::action::{self, Action};
use crate::config::AdapterConfig;
use crate::discovery;
use crate::dispatcher;
use crate::error::CoreError;
use crate::model::{Device, DeviceDescription, PropertyValue, ResourceKey, UniqueId};
use crate::notification::{HostNotification, Notifier};
use crate::poller;
use crate::registry::DeviceRegistry;

// ── Adapter ──────────────────────────────────────────────────────────

/// The main entry point for hosts.
///
/// [`start()`](Self::start) runs the first pairing pass and opens the event
/// stream; after that every device polls on its own timer while pushed events
/// are routed to the owning device. Everything the adapter has to say travels
/// over the channel returned by [`take_notifications()`](Self::take_notifications).
#[derive(Clone)]
pub struct Adapter {
    inner: Arc<AdapterInner>,
}

struct AdapterInner {
    config: AdapterConfig,
    client: HubClient,
    registry: Arc<DeviceRegistry>,
    notifier: Notifier,
    notification_rx: Mutex<Option<mpsc::UnboundedReceiver<HostNotification>>>,
    cancel: CancellationToken,
    /// Token of the pairing pass in flight, if any.
    pairing: Mutex<Option<CancellationToken>>,
    ws_handle: Mutex<Option<WebSocketHandle>>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Adapter {
    /// Create an adapter. Does not touch the network; call
    /// [`start()`](Self::start) for that.
    pub fn new(config: AdapterConfig) -> Result<Self, CoreError> {
        let transport = TransportConfig::with_timeout(config.timeout);
        let client = HubClient::new(&config.url, config.api_key.expose_secret(), &transport)?;
        let (notifier, notification_rx) = Notifier::channel();

        Ok(Self {
            inner: Arc::new(AdapterInner {
                config,
                client,
                registry: Arc::new(DeviceRegistry::new()),
                notifier,
                notification_rx: Mutex::new(Some(notification_rx)),
                cancel: CancellationToken::new(),
                pairing: Mutex::new(None),
                ws_handle: Mutex::new(None),
                task_handles: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.inner.config
    }

    /// Take the host notification receiver. Returns `None` after the first call.
    pub async fn take_notifications(&self) -> Option<mpsc::UnboundedReceiver<HostNotification>> {
        self.inner.notification_rx.lock().await.take()
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Run the initial pairing pass and open the push channel if enabled.
    ///
    /// The push channel is opened in the background and retried with
    /// backoff until it connects, so only a pairing failure is returned.
    /// Failures are also reported to the host as `AdapterError`.
    pub async fn start(&self) -> Result<(), CoreError> {
        let paired = self.start_pairing().await;

        if self.inner.config.websocket_enabled {
            let task = tokio::spawn(event_stream_task(Arc::clone(&self.inner)));
            self.inner.task_handles.lock().await.push(task);
        } else {
            info!("event stream disabled, relying on polling");
        }

        paired.map(|_| ())
    }

    /// Run one pairing pass. New devices are announced and start polling.
    ///
    /// Returns the number of devices added. A cancelled pass adds nothing.
    pub async fn start_pairing(&self) -> Result<usize, CoreError> {
        let added = self.pair().await?;
        for device in &added {
            self.inner.notifier.device_added(device.snapshot().await);
            self.spawn_poller(device).await;
        }
        Ok(added.len())
    }

    /// Abort the pairing pass in flight, if any.
    pub async fn cancel_pairing(&self) {
        if let Some(token) = self.inner.pairing.lock().await.take() {
            info!("cancelling pairing");
            token.cancel();
        }
    }

    /// Stop everything: pairing, pollers, running actions and the push
    /// channel. Waits up to `removal_grace` per device.
    pub async fn unload(&self) {
        info!("unloading adapter");
        self.cancel_pairing().await;
        self.inner.cancel.cancel();

        let grace = self.inner.config.removal_grace;
        let devices = self.inner.registry.devices();
        let stopped = join_all(devices.iter().map(|d| d.shutdown(grace))).await;
        let stragglers = stopped.iter().filter(|ok| !**ok).count();
        if stragglers > 0 {
            warn!(stragglers, "some devices did not stop within the grace period");
        }

        if let Some(handle) = self.inner.ws_handle.lock().await.take() {
            handle.shutdown();
        }

        let handles: Vec<_> = self.inner.task_handles.lock().await.drain(..).collect();
        if tokio::time::timeout(grace, join_all(handles)).await.is_err() {
            warn!(?grace, "background tasks did not stop in time");
        }
        info!("adapter unloaded");
    }

    // ── Host requests ────────────────────────────────────────────────

    /// Remove a device: stop its tasks and forget it.
    ///
    /// The resource mapping is kept, so later events for it resolve to no
    /// device and are dropped. The next pairing pass brings it back.
    pub async fn remove_device(&self, id: &UniqueId) -> Result<(), CoreError> {
        let device = self
            .inner
            .registry
            .remove(id)
            .ok_or_else(|| CoreError::DeviceNotFound {
                identifier: id.to_string(),
            })?;

        if !device.shutdown(self.inner.config.removal_grace).await {
            warn!(device = %id, "device removed with tasks still running");
        }
        self.inner.notifier.device_removed(id);
        info!(device = %id, "device removed");
        Ok(())
    }

    /// Write a normalized value to a device property.
    pub async fn set_property(
        &self,
        id: &UniqueId,
        property: &str,
        value: PropertyValue,
    ) -> Result<(), CoreError> {
        let device = self.require_device(id)?;
        device
            .write_property(
                property,
                value,
                &self.inner.client,
                self.inner.config.write_timeout,
                &self.inner.notifier,
            )
            .await
    }

    /// Start a named action on a device. The action runs in the background.
    pub async fn perform_action(&self, id: &UniqueId, name: &str) -> Result<(), CoreError> {
        let device = self.require_device(id)?;
        let action: Action = name.parse().map_err(|_| CoreError::Unsupported {
            operation: format!("action '{name}'"),
        })?;

        if !device.is_writable(action.target_property()).await {
            return Err(CoreError::Unsupported {
                operation: format!("action '{action}' on {}", device.kind()),
            });
        }

        debug!(device = %id, %action, "starting action");
        let handle = match action {
            Action::Fade => tokio::spawn(action::fade(
                Arc::clone(&device),
                self.inner.client.clone(),
                self.inner.config.write_timeout,
                self.inner.notifier.clone(),
            )),
        };
        device.track_task(handle).await;
        Ok(())
    }

    /// Route one push event as if it came from the event stream.
    pub async fn dispatch_event(&self, event: &HubEvent) -> Result<bool, CoreError> {
        dispatcher::route_event(&self.inner.registry, event, &self.inner.notifier).await
    }

    // ── Accessors ────────────────────────────────────────────────────

    /// All devices, ordered by unique id.
    pub fn devices(&self) -> Vec<Arc<Device>> {
        self.inner.registry.devices()
    }

    pub fn device(&self, id: &UniqueId) -> Option<Arc<Device>> {
        self.inner.registry.get(id)
    }

    /// The device a hub resource belongs to.
    pub fn device_for(&self, key: &ResourceKey) -> Option<Arc<Device>> {
        self.inner.registry.resolve(key)
    }

    /// Host-facing snapshots of every device.
    pub async fn descriptions(&self) -> Vec<DeviceDescription> {
        let mut out = Vec::new();
        for device in self.devices() {
            out.push(device.snapshot().await);
        }
        out
    }

    /// Every resource seen so far and the unique id it maps to.
    pub fn resource_mapping(&self) -> Vec<(ResourceKey, UniqueId)> {
        self.inner.registry.mapping()
    }

    // ── One-shot mode ────────────────────────────────────────────────

    /// Run a single pairing pass and return the classified devices without
    /// starting pollers or the event stream.
    pub async fn discover_only(config: AdapterConfig) -> Result<Vec<DeviceDescription>, CoreError> {
        let adapter = Self::new(config)?;
        adapter.pair().await?;
        let devices = adapter.descriptions().await;
        adapter.inner.cancel.cancel();
        Ok(devices)
    }

    // ── Internals ────────────────────────────────────────────────────

    fn require_device(&self, id: &UniqueId) -> Result<Arc<Device>, CoreError> {
        self.inner
            .registry
            .get(id)
            .ok_or_else(|| CoreError::DeviceNotFound {
                identifier: id.to_string(),
            })
    }

    /// Fetch and register. Devices are built but not announced.
    async fn pair(&self) -> Result<Vec<Arc<Device>>, CoreError> {
        let token = self.inner.cancel.child_token();
        *self.inner.pairing.lock().await = Some(token.clone());
        info!("pairing started");

        let fetched = discovery::fetch_resources(
            &self.inner.client,
            &token,
            self.inner.config.pairing_timeout,
        )
        .await;

        self.inner.pairing.lock().await.take();

        let resources = match fetched {
            Ok(Some(resources)) => resources,
            Ok(None) => return Ok(Vec::new()),
            Err(e) => {
                warn!(error = %e, "pairing failed");
                self.inner.notifier.adapter_error(e.to_string());
                return Err(e);
            }
        };

        Ok(discovery::register_resources(
            &self.inner.registry,
            &self.inner.config,
            &self.inner.cancel,
            resources,
        ))
    }

    async fn spawn_poller(&self, device: &Arc<Device>) {
        let handle = poller::spawn(
            Arc::clone(device),
            self.inner.client.clone(),
            self.inner.notifier.clone(),
        );
        device.track_task(handle).await;
    }
}

// ── Event stream ─────────────────────────────────────────────────────

/// Open the push channel, retrying with backoff, then route its events
/// until the adapter is unloaded.
async fn event_stream_task(inner: Arc<AdapterInner>) {
    let cancel = inner.cancel.child_token();
    let reconnect = &inner.config.reconnect;
    let mut attempt: u32 = 0;

    let events = loop {
        let opened = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            opened = inner.open_event_stream(&cancel) => opened,
        };
        let e = match opened {
            Ok(events) => break events,
            Err(e) => e,
        };

        if attempt == 0 {
            inner.notifier.adapter_error(e.to_string());
        }
        if reconnect.max_retries.is_some_and(|max| attempt >= max) {
            error!(error = %e, attempt, "event stream unavailable, giving up");
            return;
        }

        let delay = reconnect.delay_for(attempt);
        warn!(error = %e, attempt, ?delay, "event stream unavailable, retrying");
        attempt = attempt.saturating_add(1);

        tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            () = tokio::time::sleep(delay) => {}
        }
    };

    if attempt > 0 {
        info!(attempt, "event stream opened after retrying");
    }
    dispatcher::dispatch_loop(
        Arc::clone(&inner.registry),
        events,
        inner.notifier.clone(),
        cancel,
    )
    .await;
}

impl AdapterInner {
    /// Read the hub's event port and connect. The returned receiver is
    /// subscribed before any event can be delivered.
    async fn open_event_stream(
        &self,
        cancel: &CancellationToken,
    ) -> Result<broadcast::Receiver<Arc<HubEvent>>, CoreError> {
        let hub = self
            .client
            .get_config()
            .await
            .map_err(|e| CoreError::Discovery {
                message: format!("reading hub config: {e}"),
            })?;
        let ws_url = hub.websocket_url().map_err(|e| CoreError::Discovery {
            message: format!("bad websocket address {}:{}: {e}", hub.ipaddress, hub.websocketport),
        })?;

        info!(url = %ws_url, "opening event stream");
        let handle =
            WebSocketHandle::connect(ws_url, self.config.reconnect.clone(), cancel.child_token())
                .await?;
        let events = handle.subscribe();

        *self.ws_handle.lock().await = Some(handle);
        Ok(events)
    }
}
