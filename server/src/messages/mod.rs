//! REST endpoints for direct messages.
//!
//! Body text is encrypted before INSERT and decrypted after SELECT; the
//! wire and every caller see plaintext only. Live delivery is the socket
//! relay's job — sending here persists without broadcasting.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::middleware::Claims;
use crate::crypto;
use crate::db::models::{MessageRow, UserRow};
use crate::error::ApiError;
use crate::state::AppState;
use crate::users::PublicUser;

/// Maximum message text length (chars), from the original schema.
const MAX_TEXT_LENGTH: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

/// Message as exposed over the API (plaintext boundary).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub text: Option<String>,
    pub image: Option<String>,
    pub message_type: String,
    pub seen: bool,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnseenCountResponse {
    pub count: i64,
}

/// Decrypt a stored row into its API shape.
fn decrypt_row(message_key: &[u8], row: MessageRow) -> Result<ChatMessage, ApiError> {
    let text = match row.text_enc {
        Some(ref enc) => Some(
            crypto::decrypt_text(message_key, enc)
                .map_err(|e| ApiError::internal("Message decryption failed", e))?,
        ),
        None => None,
    };
    Ok(ChatMessage {
        id: row.id,
        sender_id: row.sender_id,
        receiver_id: row.receiver_id,
        text,
        image: row.image_url,
        message_type: row.message_type,
        seen: row.seen,
        created_at: row.created_at,
    })
}

/// GET /api/messages/users — Everyone except the caller, for the chat
/// sidebar.
pub async fn list_chat_users(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<Vec<PublicUser>>, ApiError> {
    let db = state.db.clone();
    let me = claims.sub.clone();

    let users = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|e| ApiError::internal("DB lock poisoned", e))?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM users WHERE id != ?1 ORDER BY name",
            UserRow::SELECT_COLUMNS
        ))?;
        let users: Vec<UserRow> = stmt
            .query_map(rusqlite::params![me], UserRow::from_row)?
            .collect::<Result<_, _>>()?;
        Ok::<_, ApiError>(users.into_iter().map(PublicUser::from_row).collect())
    })
    .await??;

    Ok(Json(users))
}

/// GET /api/messages/unseen-count/{user_id} — Unseen, undeleted messages
/// from that user to the caller.
pub async fn unseen_count(
    State(state): State<AppState>,
    claims: Claims,
    Path(user_id): Path<String>,
) -> Result<Json<UnseenCountResponse>, ApiError> {
    let db = state.db.clone();
    let me = claims.sub.clone();

    let count = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|e| ApiError::internal("DB lock poisoned", e))?;
        conn.query_row(
            "SELECT COUNT(*) FROM messages
             WHERE sender_id = ?1 AND receiver_id = ?2 AND seen = 0 AND deleted = 0",
            rusqlite::params![user_id, me],
            |row| row.get::<_, i64>(0),
        )
        .map_err(ApiError::from)
    })
    .await??;

    Ok(Json(UnseenCountResponse { count }))
}

/// GET /api/messages/{user_id} — Both-direction conversation with that
/// user, chronological, soft-deleted rows excluded.
pub async fn get_conversation(
    State(state): State<AppState>,
    claims: Claims,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    let db = state.db.clone();
    let me = claims.sub.clone();
    let message_key = state.message_key.clone();

    let messages = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|e| ApiError::internal("DB lock poisoned", e))?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM messages
             WHERE deleted = 0
               AND ((sender_id = ?1 AND receiver_id = ?2)
                 OR (sender_id = ?2 AND receiver_id = ?1))
             ORDER BY created_at, id",
            MessageRow::SELECT_COLUMNS
        ))?;
        let rows: Vec<MessageRow> = stmt
            .query_map(rusqlite::params![me, user_id], MessageRow::from_row)?
            .collect::<Result<_, _>>()?;

        rows.into_iter()
            .map(|row| decrypt_row(&message_key, row))
            .collect::<Result<Vec<_>, _>>()
    })
    .await??;

    Ok(Json(messages))
}

/// POST /api/messages/send/{user_id} — Persist a message (encrypted at
/// rest) and return it as stored. Live fan-out happens separately over
/// the socket; this endpoint is the source of truth.
pub async fn send_message(
    State(state): State<AppState>,
    claims: Claims,
    Path(user_id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<ChatMessage>), ApiError> {
    let text = req.text.as_deref().map(str::trim).filter(|t| !t.is_empty());
    let image = req
        .image
        .as_deref()
        .map(str::trim)
        .filter(|i| !i.is_empty());

    if text.is_none() && image.is_none() {
        return Err(ApiError::BadRequest(
            "Message must contain text or an image".to_string(),
        ));
    }
    if let Some(t) = text {
        if t.chars().count() > MAX_TEXT_LENGTH {
            return Err(ApiError::PayloadTooLarge(format!(
                "Message text cannot exceed {} characters",
                MAX_TEXT_LENGTH
            )));
        }
    }

    let message_type = if image.is_some() && text.is_none() {
        "image"
    } else {
        "text"
    };

    let db = state.db.clone();
    let message_key = state.message_key.clone();
    let sender_id = claims.sub.clone();
    let text = text.map(str::to_string);
    let image = image.map(str::to_string);

    let message = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|e| ApiError::internal("DB lock poisoned", e))?;

        let receiver_exists: bool = conn
            .query_row(
                "SELECT COUNT(*) FROM users WHERE id = ?1",
                rusqlite::params![user_id],
                |row| row.get::<_, i64>(0).map(|c| c > 0),
            )
            .unwrap_or(false);
        if !receiver_exists {
            return Err(ApiError::NotFound("Recipient not found".to_string()));
        }

        let text_enc = text
            .as_deref()
            .map(|t| crypto::encrypt_text(&message_key, t));

        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO messages (id, sender_id, receiver_id, text_enc, image_url, message_type, seen, deleted, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 0, ?7)",
            rusqlite::params![id, sender_id, user_id, text_enc, image, message_type, now],
        )?;

        Ok::<_, ApiError>(ChatMessage {
            id,
            sender_id,
            receiver_id: user_id,
            text,
            image,
            message_type: message_type.to_string(),
            seen: false,
            created_at: now,
        })
    })
    .await??;

    Ok((StatusCode::CREATED, Json(message)))
}

/// DELETE /api/messages/{id} — Soft delete. Sender only; the row stays
/// for audit, hidden from history and counts.
pub async fn delete_message(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let db = state.db.clone();
    let me = claims.sub.clone();

    tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|e| ApiError::internal("DB lock poisoned", e))?;

        let sender: String = conn
            .query_row(
                "SELECT sender_id FROM messages WHERE id = ?1 AND deleted = 0",
                rusqlite::params![id],
                |row| row.get(0),
            )
            .map_err(|_| ApiError::NotFound("Message not found".to_string()))?;

        if sender != me {
            return Err(ApiError::Forbidden(
                "Only the sender can delete a message".to_string(),
            ));
        }

        conn.execute(
            "UPDATE messages SET deleted = 1, deleted_at = ?1 WHERE id = ?2",
            rusqlite::params![Utc::now().to_rfc3339(), id],
        )?;
        Ok::<_, ApiError>(())
    })
    .await??;

    Ok(Json(serde_json::json!({
        "message": "Message deleted successfully"
    })))
}
