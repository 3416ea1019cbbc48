//! Wire protocol for the realtime socket: tagged JSON events.
//!
//! Frames are text, shaped `{"event": <tag>, "data": <payload>}`. Each tag
//! has a fixed payload schema, validated at decode time. Malformed frames
//! are logged and ignored — the socket is a notification channel, not the
//! source of truth.

use serde::{Deserialize, Serialize};

use crate::state::AppState;
use crate::ws::{relay, ConnectionId, ConnectionSender};

/// Events a client may send.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Arbitrary chat payload, rebroadcast verbatim to every client.
    SendMessage(serde_json::Value),
    /// Announce this user as online (payload: user identity).
    UserOnline(String),
    /// Announce this user as offline while keeping the socket open.
    UserOffline(String),
    /// Mark a persisted message as seen and notify its sender.
    #[serde(rename_all = "camelCase")]
    MessageSeen {
        message_id: String,
        sender_id: String,
    },
}

/// Events the server emits.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Echo of a client's sendMessage payload, fanned out to all clients.
    ReceiveMessage(serde_json::Value),
    /// Full roster replace: sorted identities of every online user.
    UpdateOnlineUsers(Vec<String>),
    /// Targeted notification that a message was seen.
    #[serde(rename_all = "camelCase")]
    MessageSeenAck { message_id: String },
}

impl ServerEvent {
    /// Serialize into a text WebSocket frame.
    pub fn to_ws_message(&self) -> Option<axum::extract::ws::Message> {
        match serde_json::to_string(self) {
            Ok(json) => Some(axum::extract::ws::Message::Text(json.into())),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize server event");
                None
            }
        }
    }
}

/// Handle an incoming text frame: decode the tagged event and dispatch.
pub async fn handle_text_message(
    text: &str,
    connection_id: ConnectionId,
    _tx: &ConnectionSender,
    state: &AppState,
    user_id: &str,
) {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(
                user_id = %user_id,
                error = %e,
                "Ignoring malformed socket event"
            );
            return;
        }
    };

    match event {
        ClientEvent::SendMessage(payload) => {
            // The REST layer already persisted and validated the message;
            // this is live notification only. Senders de-duplicate locally.
            relay::broadcast_to_all(&state.connections, &ServerEvent::ReceiveMessage(payload));
        }
        ClientEvent::UserOnline(online_user_id) => {
            state.presence.set_online(&online_user_id, connection_id);
            tracing::info!(user_id = %online_user_id, connection_id = %connection_id, "User online");
            relay::broadcast_roster(&state.connections, &state.presence);
        }
        ClientEvent::UserOffline(offline_user_id) => {
            state.presence.set_offline(&offline_user_id);
            tracing::info!(user_id = %offline_user_id, "User offline");
            relay::broadcast_roster(&state.connections, &state.presence);
        }
        ClientEvent::MessageSeen {
            message_id,
            sender_id,
        } => {
            handle_message_seen(state, message_id, sender_id).await;
        }
    }
}

/// Persist seen=true, then deliver a targeted ack to the sender's
/// connection if one is registered *at completion time*. Persistence
/// failure drops the ack; the stored seen flag read back over REST is
/// authoritative either way.
async fn handle_message_seen(state: &AppState, message_id: String, sender_id: String) {
    let db = state.db.clone();
    let mid = message_id.clone();

    let updated = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE messages SET seen = 1 WHERE id = ?1 AND deleted = 0",
            rusqlite::params![mid],
        )
        .map_err(|e| e.to_string())
    })
    .await
    .unwrap_or_else(|e| Err(e.to_string()));

    let updated = match updated {
        Ok(count) => count,
        Err(e) => {
            tracing::error!(message_id = %message_id, error = %e, "Failed to mark message as seen");
            return;
        }
    };

    if updated == 0 {
        // Unknown or soft-deleted message id: silent no-op, no ack.
        tracing::debug!(message_id = %message_id, "messageSeen for unknown message");
        return;
    }

    // Registry state as of persistence completion, not dispatch time.
    match state.presence.lookup(&sender_id) {
        Some(sender_connection) => {
            relay::send_to_connection(
                &state.connections,
                sender_connection,
                &ServerEvent::MessageSeenAck { message_id },
            );
        }
        None => {
            // Sender offline: ack dropped, they learn on next history fetch.
            tracing::debug!(sender_id = %sender_id, "Seen ack dropped, sender offline");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_events_decode_from_tagged_json() {
        let online: ClientEvent =
            serde_json::from_str(r#"{"event":"userOnline","data":"u1"}"#).unwrap();
        assert!(matches!(online, ClientEvent::UserOnline(id) if id == "u1"));

        let seen: ClientEvent = serde_json::from_str(
            r#"{"event":"messageSeen","data":{"messageId":"m1","senderId":"u2"}}"#,
        )
        .unwrap();
        match seen {
            ClientEvent::MessageSeen {
                message_id,
                sender_id,
            } => {
                assert_eq!(message_id, "m1");
                assert_eq!(sender_id, "u2");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn unknown_tag_is_rejected() {
        assert!(serde_json::from_str::<ClientEvent>(r#"{"event":"selfDestruct","data":1}"#).is_err());
    }

    #[test]
    fn server_events_encode_with_camel_case_tags() {
        let roster = ServerEvent::UpdateOnlineUsers(vec!["u1".into(), "u2".into()]);
        let json = serde_json::to_value(&roster).unwrap();
        assert_eq!(json["event"], "updateOnlineUsers");
        assert_eq!(json["data"][1], "u2");

        let ack = ServerEvent::MessageSeenAck {
            message_id: "m1".into(),
        };
        let json = serde_json::to_value(&ack).unwrap();
        assert_eq!(json["event"], "messageSeenAck");
        assert_eq!(json["data"]["messageId"], "m1");
    }
}
