use std::sync::Arc;

use crate::db::DbPool;
use crate::ws::presence::PresenceRegistry;
use crate::ws::ConnectionRegistry;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// JWT signing secret (256-bit random key)
    pub jwt_secret: Vec<u8>,
    /// Master key for at-rest message body encryption (256-bit random key)
    pub message_key: Vec<u8>,
    /// Active WebSocket connections by connection identity
    pub connections: ConnectionRegistry,
    /// Online-user registry: user identity -> connection identity
    pub presence: Arc<PresenceRegistry>,
    /// Registering with this token grants the admin role
    pub admin_invite_token: Option<String>,
    /// Data directory for uploads and key files
    pub data_dir: String,
}
