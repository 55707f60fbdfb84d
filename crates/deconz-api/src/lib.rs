// deconz-api: Async Rust client for deCONZ-compatible hubs (REST + WebSocket)

pub mod client;
pub mod error;
pub mod models;
pub mod resources;
pub mod transport;
pub mod websocket;

pub use client::HubClient;
pub use error::Error;
pub use models::{HubConfig, ResourceClass, ResourceDescriptor, ResourceMap, StateUpdate};
pub use websocket::{EventKind, HubEvent, ReconnectConfig, WebSocketHandle};
