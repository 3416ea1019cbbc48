//! Status transitions and checklist updates with progress propagation.

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use crate::auth::middleware::Claims;
use crate::db::models::TaskStatus;
use crate::error::ApiError;
use crate::state::AppState;
use crate::tasks::{
    checklist_progress, fetch_task, is_assigned, load_task_response, replace_checklist,
    status_for_progress, TodoInput,
};

use super::crud::TaskMessageResponse;

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateChecklistRequest {
    pub todo_checklist: Vec<TodoInput>,
}

/// Assignee-or-admin guard shared by the two mutation endpoints.
fn authorize_task_member(
    conn: &rusqlite::Connection,
    task_id: &str,
    claims: &Claims,
) -> Result<(), ApiError> {
    if claims.is_admin() {
        return Ok(());
    }
    if is_assigned(conn, task_id, &claims.sub)? {
        return Ok(());
    }
    Err(ApiError::Forbidden(
        "Not authorized to update this task".to_string(),
    ))
}

/// PUT /api/tasks/{id}/status — Assignee or admin.
/// Moving to Completed checks every todo and forces progress to 100.
pub async fn update_status(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<TaskMessageResponse>, ApiError> {
    let status = TaskStatus::from_str(&req.status).ok_or_else(|| {
        ApiError::BadRequest(
            "Status must be Pending, In progress, Completed, or Cancelled".to_string(),
        )
    })?;

    let db = state.db.clone();
    let task = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|e| ApiError::internal("DB lock poisoned", e))?;

        fetch_task(&conn, &id)?;
        authorize_task_member(&conn, &id, &claims)?;

        let now = Utc::now().to_rfc3339();

        if status == TaskStatus::Completed {
            conn.execute(
                "UPDATE task_todos SET completed = 1, completed_at = COALESCE(completed_at, ?1)
                 WHERE task_id = ?2",
                rusqlite::params![now, id],
            )?;
            conn.execute(
                "UPDATE tasks SET status = ?1, progress = 100, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![status.as_str(), now, id],
            )?;
        } else {
            conn.execute(
                "UPDATE tasks SET status = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![status.as_str(), now, id],
            )?;
        }

        let row = fetch_task(&conn, &id)?;
        load_task_response(&conn, row).map_err(ApiError::from)
    })
    .await??;

    Ok(Json(TaskMessageResponse {
        message: "Task status updated".to_string(),
        task,
    }))
}

/// PUT /api/tasks/{id}/todo — Assignee or admin.
/// Replaces the checklist; progress is recomputed and the status follows:
/// 100 ⇒ Completed, >0 ⇒ In progress, 0 ⇒ Pending.
pub async fn update_checklist(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<String>,
    Json(req): Json<UpdateChecklistRequest>,
) -> Result<Json<TaskMessageResponse>, ApiError> {
    for todo in &req.todo_checklist {
        if todo.text.trim().is_empty() {
            return Err(ApiError::BadRequest(
                "Todo text cannot be empty".to_string(),
            ));
        }
    }

    let db = state.db.clone();
    let task = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|e| ApiError::internal("DB lock poisoned", e))?;

        fetch_task(&conn, &id)?;
        authorize_task_member(&conn, &id, &claims)?;

        replace_checklist(&conn, &id, &req.todo_checklist)?;

        let completed = req.todo_checklist.iter().filter(|t| t.completed).count();
        let progress = checklist_progress(completed, req.todo_checklist.len());
        let status = status_for_progress(progress);

        conn.execute(
            "UPDATE tasks SET progress = ?1, status = ?2, updated_at = ?3 WHERE id = ?4",
            rusqlite::params![progress, status.as_str(), Utc::now().to_rfc3339(), id],
        )?;

        let row = fetch_task(&conn, &id)?;
        load_task_response(&conn, row).map_err(ApiError::from)
    })
    .await??;

    Ok(Json(TaskMessageResponse {
        message: "Task checklist updated".to_string(),
        task,
    }))
}
