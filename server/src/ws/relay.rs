//! Fan-out of server events to connected sockets.
//!
//! Events are serialized once and cloned per connection. Delivery to a
//! closed channel is a no-op; the actor's cleanup removes dead entries.

use std::sync::Arc;

use crate::ws::presence::PresenceRegistry;
use crate::ws::protocol::ServerEvent;
use crate::ws::{ConnectionId, ConnectionRegistry};

/// Broadcast an event to every connected client, including the sender.
pub fn broadcast_to_all(registry: &ConnectionRegistry, event: &ServerEvent) {
    let Some(msg) = event.to_ws_message() else {
        return;
    };
    for entry in registry.iter() {
        let _ = entry.value().send(msg.clone());
    }
}

/// Deliver an event to a single connection. No-op if the connection is
/// no longer registered (e.g. it closed between lookup and delivery).
pub fn send_to_connection(
    registry: &ConnectionRegistry,
    connection_id: ConnectionId,
    event: &ServerEvent,
) {
    let Some(msg) = event.to_ws_message() else {
        return;
    };
    if let Some(sender) = registry.get(&connection_id) {
        let _ = sender.value().send(msg);
    }
}

/// Broadcast the full online roster to every client.
/// Called after every presence mutation — O(online users) per event.
pub fn broadcast_roster(registry: &ConnectionRegistry, presence: &Arc<PresenceRegistry>) {
    broadcast_to_all(registry, &ServerEvent::UpdateOnlineUsers(presence.roster()));
}
