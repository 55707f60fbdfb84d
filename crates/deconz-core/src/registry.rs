// ── Device registry ──
//
// Concurrent device table plus the `(resource class, hub id) → unique id`
// mapping consulted on every push event. Unclassified resources are mapped
// too; they simply resolve to no device.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::model::{Device, ResourceKey, UniqueId};

#[derive(Default)]
pub(crate) struct DeviceRegistry {
    /// Primary storage: unique id → device.
    devices: DashMap<UniqueId, Arc<Device>>,

    /// Secondary index: hub resource → unique id.
    mapping: DashMap<ResourceKey, UniqueId>,
}

impl DeviceRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Insert a device. Returns `false` (and keeps the existing one) if the
    /// unique id is already registered.
    pub(crate) fn insert(&self, device: Arc<Device>) -> bool {
        match self.devices.entry(device.unique_id().clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(device);
                true
            }
        }
    }

    pub(crate) fn remove(&self, unique_id: &UniqueId) -> Option<Arc<Device>> {
        self.devices.remove(unique_id).map(|(_, d)| d)
    }

    pub(crate) fn get(&self, unique_id: &UniqueId) -> Option<Arc<Device>> {
        self.devices.get(unique_id).map(|r| Arc::clone(r.value()))
    }

    pub(crate) fn contains(&self, unique_id: &UniqueId) -> bool {
        self.devices.contains_key(unique_id)
    }

    /// Record which device a hub resource belongs to.
    pub(crate) fn map_resource(&self, key: ResourceKey, unique_id: UniqueId) {
        self.mapping.insert(key, unique_id);
    }

    pub(crate) fn unique_id_for(&self, key: &ResourceKey) -> Option<UniqueId> {
        self.mapping.get(key).map(|r| r.value().clone())
    }

    /// Resolve a hub resource to its device, if it has one.
    pub(crate) fn resolve(&self, key: &ResourceKey) -> Option<Arc<Device>> {
        let unique_id = self.unique_id_for(key)?;
        self.get(&unique_id)
    }

    /// All devices, ordered by unique id.
    pub(crate) fn devices(&self) -> Vec<Arc<Device>> {
        let mut all: Vec<_> = self.devices.iter().map(|r| Arc::clone(r.value())).collect();
        all.sort_by(|a, b| a.unique_id().cmp(b.unique_id()));
        all
    }

    /// The resource mapping, ordered by key.
    pub(crate) fn mapping(&self) -> Vec<(ResourceKey, UniqueId)> {
        let mut all: Vec<_> = self
            .mapping
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();
        all.sort();
        all
    }

    pub(crate) fn len(&self) -> usize {
        self.devices.len()
    }
}
