pub mod actor;
pub mod handler;
pub mod presence;
pub mod protocol;
pub mod relay;

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Opaque per-attachment identifier issued when a socket connects.
/// Valid only while that attachment is open; never persisted.
pub type ConnectionId = Uuid;

/// Sender half of a WebSocket connection's outbound channel.
/// Other parts of the system clone this to push messages to that client.
pub type ConnectionSender = mpsc::UnboundedSender<axum::extract::ws::Message>;

/// Connection registry: every open WebSocket, keyed by connection identity.
pub type ConnectionRegistry = Arc<DashMap<ConnectionId, ConnectionSender>>;

/// Create a new empty connection registry.
pub fn new_connection_registry() -> ConnectionRegistry {
    Arc::new(DashMap::new())
}
