// ── Discovery / pairing ──
//
// A pairing pass lists every light and sensor, records where each resource
// belongs and builds devices for the supported ones it has not seen before.
// It never removes anything.

use std::sync::Arc;
use std::time::Duration;

use deconz_api::{HubClient, ResourceClass, ResourceDescriptor, ResourceMap};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::AdapterConfig;
use crate::error::CoreError;
use crate::model::{Device, DeviceKind, ResourceKey, UniqueId};
use crate::registry::DeviceRegistry;

/// Lights first, so plugs and lamps win a shared hardware id.
const CLASSES: [ResourceClass; 2] = [ResourceClass::Lights, ResourceClass::Sensors];

/// Fetch all lights and sensors.
///
/// Returns `Ok(None)` when `cancel` fires first.
pub(crate) async fn fetch_resources(
    client: &HubClient,
    cancel: &CancellationToken,
    timeout: Duration,
) -> Result<Option<Vec<(ResourceClass, ResourceMap)>>, CoreError> {
    let listing = async {
        let (lights, sensors) = tokio::join!(
            client.list_resources(ResourceClass::Lights),
            client.list_resources(ResourceClass::Sensors),
        );
        Ok::<_, CoreError>(vec![
            (ResourceClass::Lights, lights?),
            (ResourceClass::Sensors, sensors?),
        ])
    };

    tokio::select! {
        biased;
        () = cancel.cancelled() => {
            info!("pairing cancelled");
            Ok(None)
        }
        result = tokio::time::timeout(timeout, listing) => match result {
            Ok(resources) => resources.map(Some),
            Err(_) => Err(CoreError::Discovery {
                message: format!("listing resources timed out after {timeout:?}"),
            }),
        },
    }
}

/// Register every listed resource and build devices for new, supported ones.
///
/// New devices get a child of `parent` as their cancellation token.
pub(crate) fn register_resources(
    registry: &DeviceRegistry,
    config: &AdapterConfig,
    parent: &CancellationToken,
    mut resources: Vec<(ResourceClass, ResourceMap)>,
) -> Vec<Arc<Device>> {
    resources.sort_by_key(|(class, _)| CLASSES.iter().position(|c| c == class));

    let mut added = Vec::new();
    for (class, map) in &resources {
        for (id, desc) in map {
            if let Some(device) = register_one(registry, config, parent, *class, id, desc) {
                added.push(device);
            }
        }
    }

    info!(
        added = added.len(),
        devices = registry.len(),
        "pairing pass complete"
    );
    added
}

fn register_one(
    registry: &DeviceRegistry,
    config: &AdapterConfig,
    parent: &CancellationToken,
    class: ResourceClass,
    id: &str,
    desc: &ResourceDescriptor,
) -> Option<Arc<Device>> {
    let key = ResourceKey::new(class, id);
    let unique_id = if desc.uniqueid.is_empty() {
        UniqueId::synthetic(class, id)
    } else {
        UniqueId::from_hardware_id(&desc.uniqueid)
    };

    registry.map_resource(key.clone(), unique_id.clone());

    if registry.contains(&unique_id) {
        debug!(resource = %key, device = %unique_id, "already known");
        return None;
    }

    let Some(kind) = DeviceKind::classify(class, &desc.resource_type) else {
        info!(
            resource = %key,
            device = %unique_id,
            resource_type = desc.resource_type,
            "unsupported resource type"
        );
        return None;
    };

    let device = Arc::new(Device::build(
        unique_id,
        key,
        kind,
        desc,
        config,
        parent.child_token(),
    ));

    if registry.insert(Arc::clone(&device)) {
        info!(device = %device.unique_id(), %kind, title = device.title(), "device added");
        Some(device)
    } else {
        None
    }
}
