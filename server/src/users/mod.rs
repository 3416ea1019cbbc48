//! User management endpoints and the public profile shape shared with auth.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::middleware::Claims;
use crate::db::models::{Role, TaskStatus, UserRow};
use crate::error::ApiError;
use crate::state::AppState;

/// User profile as exposed over the API. Never carries the password hash.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub profile_image_url: Option<String>,
    pub is_active: bool,
    pub last_login: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl PublicUser {
    pub fn from_row(row: UserRow) -> Self {
        PublicUser {
            id: row.id,
            name: row.name,
            email: row.email,
            role: row.role,
            profile_image_url: row.profile_image_url,
            is_active: row.is_active,
            last_login: row.last_login,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Member listing entry with per-status task counts.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberWithCounts {
    #[serde(flatten)]
    pub user: PublicUser,
    pub pending_tasks: i64,
    pub in_progress_tasks: i64,
    pub completed_tasks: i64,
}

fn count_assigned_by_status(
    conn: &rusqlite::Connection,
    user_id: &str,
    status: TaskStatus,
) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM tasks t
         JOIN task_assignees a ON a.task_id = t.id
         WHERE a.user_id = ?1 AND t.status = ?2",
        rusqlite::params![user_id, status.as_str()],
        |row| row.get(0),
    )
}

/// GET /api/users — All members with their task workload. Admin only.
pub async fn list_members(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<Vec<MemberWithCounts>>, ApiError> {
    claims.require_admin()?;

    let db = state.db.clone();
    let members = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|e| ApiError::internal("DB lock poisoned", e))?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM users WHERE role = 'member' ORDER BY created_at",
            UserRow::SELECT_COLUMNS
        ))?;
        let users: Vec<UserRow> = stmt
            .query_map([], UserRow::from_row)?
            .collect::<Result<_, _>>()?;

        let mut out = Vec::with_capacity(users.len());
        for user in users {
            let pending = count_assigned_by_status(&conn, &user.id, TaskStatus::Pending)?;
            let in_progress = count_assigned_by_status(&conn, &user.id, TaskStatus::InProgress)?;
            let completed = count_assigned_by_status(&conn, &user.id, TaskStatus::Completed)?;
            out.push(MemberWithCounts {
                user: PublicUser::from_row(user),
                pending_tasks: pending,
                in_progress_tasks: in_progress,
                completed_tasks: completed,
            });
        }
        Ok::<_, ApiError>(out)
    })
    .await??;

    Ok(Json(members))
}

/// GET /api/users/{id}
pub async fn get_user(
    State(state): State<AppState>,
    _claims: Claims,
    Path(id): Path<String>,
) -> Result<Json<PublicUser>, ApiError> {
    let db = state.db.clone();
    let user = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|e| ApiError::internal("DB lock poisoned", e))?;
        conn.query_row(
            &format!(
                "SELECT {} FROM users WHERE id = ?1",
                UserRow::SELECT_COLUMNS
            ),
            rusqlite::params![id],
            UserRow::from_row,
        )
        .map_err(|_| ApiError::NotFound("User not found".to_string()))
    })
    .await??;

    Ok(Json(PublicUser::from_row(user)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: String,
}

/// PUT /api/users/{id}/role — Change a user's role. Admin only.
pub async fn update_role(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<String>,
    Json(body): Json<UpdateRoleRequest>,
) -> Result<Json<PublicUser>, ApiError> {
    claims.require_admin()?;

    let role = Role::from_str(&body.role)
        .ok_or_else(|| ApiError::BadRequest("Role must be 'admin' or 'member'".to_string()))?;

    let db = state.db.clone();
    let user = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|e| ApiError::internal("DB lock poisoned", e))?;

        let changed = conn.execute(
            "UPDATE users SET role = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![role.as_str(), chrono::Utc::now().to_rfc3339(), id],
        )?;
        if changed == 0 {
            return Err(ApiError::NotFound("User not found".to_string()));
        }

        conn.query_row(
            &format!(
                "SELECT {} FROM users WHERE id = ?1",
                UserRow::SELECT_COLUMNS
            ),
            rusqlite::params![id],
            UserRow::from_row,
        )
        .map_err(ApiError::from)
    })
    .await??;

    tracing::info!(user_id = %user.id, role = %user.role, "User role updated");

    Ok(Json(PublicUser::from_row(user)))
}

/// DELETE /api/users/{id} — Remove a user and their task assignments.
/// Admin only; admins cannot delete themselves.
pub async fn delete_user(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    claims.require_admin()?;

    if claims.sub == id {
        return Err(ApiError::BadRequest(
            "Cannot delete your own account".to_string(),
        ));
    }

    let db = state.db.clone();
    tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|e| ApiError::internal("DB lock poisoned", e))?;

        conn.execute(
            "DELETE FROM task_assignees WHERE user_id = ?1",
            rusqlite::params![id],
        )?;
        let deleted = conn.execute("DELETE FROM users WHERE id = ?1", rusqlite::params![id])?;
        if deleted == 0 {
            return Err(ApiError::NotFound("User not found".to_string()));
        }
        Ok::<_, ApiError>(())
    })
    .await??;

    Ok(Json(serde_json::json!({
        "message": "User deleted successfully"
    })))
}
