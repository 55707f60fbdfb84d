// Hub resource endpoints
//
// Gateway config, light/sensor listing, single-resource reads and light
// state writes.

use tracing::debug;

use crate::client::HubClient;
use crate::error::Error;
use crate::models::{HubConfig, ResourceClass, ResourceDescriptor, ResourceMap, StateUpdate};

impl HubClient {
    /// Gateway configuration (host address and WebSocket port).
    ///
    /// `GET /config`
    pub async fn get_config(&self) -> Result<HubConfig, Error> {
        let url = self.url("config")?;
        self.get(url).await
    }

    /// All resources of one class, keyed by hub-local id.
    ///
    /// `GET /lights` or `GET /sensors`
    pub async fn list_resources(&self, class: ResourceClass) -> Result<ResourceMap, Error> {
        let url = self.url(class.as_str())?;
        debug!(%class, "listing resources");
        self.get(url).await
    }

    /// A single resource descriptor.
    ///
    /// `GET /{class}/{id}`
    pub async fn get_resource(
        &self,
        class: ResourceClass,
        id: &str,
    ) -> Result<ResourceDescriptor, Error> {
        let url = self.url(&format!("{}/{id}", class.as_str()))?;
        self.get(url).await
    }

    /// Change one or more state attributes of a light.
    ///
    /// `PUT /lights/{id}/state`
    pub async fn set_light_state(&self, id: &str, update: &StateUpdate) -> Result<(), Error> {
        let url = self.url(&format!("lights/{id}/state"))?;
        debug!(id, ?update, "setting light state");
        let _ = self.put(url, update).await?;
        Ok(())
    }
}
