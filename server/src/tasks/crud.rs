//! Task CRUD endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::middleware::Claims;
use crate::db::models::{TaskRow, TaskStatus};
use crate::error::ApiError;
use crate::state::AppState;
use crate::tasks::{
    fetch_task, load_task_response, replace_checklist, validate_description, validate_priority,
    validate_title, TaskResponse, TodoInput,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: String,
    pub due_date: String,
    pub assigned_to: Vec<String>,
    #[serde(default)]
    pub todo_checklist: Vec<TodoInput>,
    #[serde(default)]
    pub attachments: Vec<String>,
}

fn default_priority() -> String {
    "Medium".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<Vec<String>>,
    #[serde(default)]
    pub todo_checklist: Option<Vec<TodoInput>>,
    #[serde(default)]
    pub attachments: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct ListTasksQuery {
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSummary {
    pub all: i64,
    pub pending_tasks: i64,
    pub in_progress_tasks: i64,
    pub completed_tasks: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTasksResponse {
    pub tasks: Vec<TaskResponse>,
    pub status_summary: StatusSummary,
}

#[derive(Debug, Serialize)]
pub struct TaskMessageResponse {
    pub message: String,
    pub task: TaskResponse,
}

fn parse_due_date(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ApiError::BadRequest("dueDate must be an RFC 3339 timestamp".to_string()))
}

/// Count tasks by status, scoped to an assignee for non-admin callers.
fn count_by_status(
    conn: &rusqlite::Connection,
    scope_user: Option<&str>,
    status: Option<TaskStatus>,
) -> rusqlite::Result<i64> {
    match (scope_user, status) {
        (Some(user), Some(status)) => conn.query_row(
            "SELECT COUNT(*) FROM tasks t JOIN task_assignees a ON a.task_id = t.id
             WHERE a.user_id = ?1 AND t.status = ?2",
            rusqlite::params![user, status.as_str()],
            |row| row.get(0),
        ),
        (Some(user), None) => conn.query_row(
            "SELECT COUNT(*) FROM tasks t JOIN task_assignees a ON a.task_id = t.id
             WHERE a.user_id = ?1",
            rusqlite::params![user],
            |row| row.get(0),
        ),
        (None, Some(status)) => conn.query_row(
            "SELECT COUNT(*) FROM tasks WHERE status = ?1",
            rusqlite::params![status.as_str()],
            |row| row.get(0),
        ),
        (None, None) => conn.query_row("SELECT COUNT(*) FROM tasks", [], |row| row.get(0)),
    }
}

/// POST /api/tasks — Create a task. Admin only.
pub async fn create_task(
    State(state): State<AppState>,
    claims: Claims,
    Json(req): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<TaskMessageResponse>), ApiError> {
    claims.require_admin()?;

    let title = req.title.trim().to_string();
    validate_title(&title)?;
    validate_description(&req.description)?;
    let priority = validate_priority(&req.priority)?;

    let due_date = parse_due_date(&req.due_date)?;
    if due_date <= Utc::now() {
        return Err(ApiError::BadRequest(
            "Due date must be in the future".to_string(),
        ));
    }

    if req.assigned_to.is_empty() {
        return Err(ApiError::BadRequest(
            "assignedTo must be a non-empty array of user IDs".to_string(),
        ));
    }

    let db = state.db.clone();
    let created_by = claims.sub.clone();

    let task = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|e| ApiError::internal("DB lock poisoned", e))?;

        // Every assignee must exist
        for user_id in &req.assigned_to {
            let exists: bool = conn
                .query_row(
                    "SELECT COUNT(*) FROM users WHERE id = ?1",
                    rusqlite::params![user_id],
                    |row| row.get::<_, i64>(0).map(|c| c > 0),
                )
                .unwrap_or(false);
            if !exists {
                return Err(ApiError::BadRequest(format!(
                    "Assigned user {} does not exist",
                    user_id
                )));
            }
        }

        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO tasks (id, title, description, priority, status, due_date, created_by, progress, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 'Pending', ?5, ?6, 0, ?7, ?7)",
            rusqlite::params![
                id,
                title,
                req.description,
                priority.as_str(),
                due_date.to_rfc3339(),
                created_by,
                now
            ],
        )?;

        for user_id in &req.assigned_to {
            conn.execute(
                "INSERT OR IGNORE INTO task_assignees (task_id, user_id) VALUES (?1, ?2)",
                rusqlite::params![id, user_id],
            )?;
        }

        replace_checklist(&conn, &id, &req.todo_checklist)?;

        for url in &req.attachments {
            conn.execute(
                "INSERT INTO task_attachments (task_id, url) VALUES (?1, ?2)",
                rusqlite::params![id, url],
            )?;
        }

        let row = fetch_task(&conn, &id)?;
        load_task_response(&conn, row).map_err(ApiError::from)
    })
    .await??;

    tracing::info!(task_id = %task.id, "Task created");

    Ok((
        StatusCode::CREATED,
        Json(TaskMessageResponse {
            message: "Task created successfully".to_string(),
            task,
        }),
    ))
}

/// GET /api/tasks?status= — Admins see all tasks, members see assigned.
/// Includes a status summary scoped the same way.
pub async fn list_tasks(
    State(state): State<AppState>,
    claims: Claims,
    Query(query): Query<ListTasksQuery>,
) -> Result<Json<ListTasksResponse>, ApiError> {
    let status_filter = match query.status.as_deref() {
        Some(s) => Some(
            TaskStatus::from_str(s)
                .ok_or_else(|| ApiError::BadRequest("Unknown status filter".to_string()))?,
        ),
        None => None,
    };

    let db = state.db.clone();
    let is_admin = claims.is_admin();
    let user_id = claims.sub.clone();

    let response = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|e| ApiError::internal("DB lock poisoned", e))?;

        let scope_user = (!is_admin).then_some(user_id.as_str());

        let rows: Vec<TaskRow> = match (scope_user, status_filter) {
            (Some(user), Some(status)) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM tasks t JOIN task_assignees a ON a.task_id = t.id
                     WHERE a.user_id = ?1 AND t.status = ?2 ORDER BY t.created_at DESC",
                    TaskRow::SELECT_COLUMNS_PREFIXED
                ))?;
                let rows = stmt
                    .query_map(rusqlite::params![user, status.as_str()], TaskRow::from_row)?
                    .collect::<Result<_, _>>()?;
                rows
            }
            (Some(user), None) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM tasks t JOIN task_assignees a ON a.task_id = t.id
                     WHERE a.user_id = ?1 ORDER BY t.created_at DESC",
                    TaskRow::SELECT_COLUMNS_PREFIXED
                ))?;
                let rows = stmt
                    .query_map(rusqlite::params![user], TaskRow::from_row)?
                    .collect::<Result<_, _>>()?;
                rows
            }
            (None, Some(status)) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM tasks WHERE status = ?1 ORDER BY created_at DESC",
                    TaskRow::SELECT_COLUMNS
                ))?;
                let rows = stmt
                    .query_map(rusqlite::params![status.as_str()], TaskRow::from_row)?
                    .collect::<Result<_, _>>()?;
                rows
            }
            (None, None) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM tasks ORDER BY created_at DESC",
                    TaskRow::SELECT_COLUMNS
                ))?;
                let rows = stmt
                    .query_map([], TaskRow::from_row)?
                    .collect::<Result<_, _>>()?;
                rows
            }
        };

        let mut tasks = Vec::with_capacity(rows.len());
        for row in rows {
            tasks.push(load_task_response(&conn, row)?);
        }

        let status_summary = StatusSummary {
            all: count_by_status(&conn, scope_user, None)?,
            pending_tasks: count_by_status(&conn, scope_user, Some(TaskStatus::Pending))?,
            in_progress_tasks: count_by_status(&conn, scope_user, Some(TaskStatus::InProgress))?,
            completed_tasks: count_by_status(&conn, scope_user, Some(TaskStatus::Completed))?,
        };

        Ok::<_, ApiError>(ListTasksResponse {
            tasks,
            status_summary,
        })
    })
    .await??;

    Ok(Json(response))
}

/// GET /api/tasks/{id}
pub async fn get_task(
    State(state): State<AppState>,
    _claims: Claims,
    Path(id): Path<String>,
) -> Result<Json<TaskResponse>, ApiError> {
    let db = state.db.clone();
    let task = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|e| ApiError::internal("DB lock poisoned", e))?;
        let row = fetch_task(&conn, &id)?;
        load_task_response(&conn, row).map_err(ApiError::from)
    })
    .await??;

    Ok(Json(task))
}

/// PUT /api/tasks/{id} — Update task details.
pub async fn update_task(
    State(state): State<AppState>,
    _claims: Claims,
    Path(id): Path<String>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<Json<TaskMessageResponse>, ApiError> {
    if let Some(ref title) = req.title {
        validate_title(title.trim())?;
    }
    validate_description(&req.description)?;
    if let Some(ref p) = req.priority {
        validate_priority(p)?;
    }
    let due_date = match req.due_date.as_deref() {
        Some(raw) => Some(parse_due_date(raw)?),
        None => None,
    };
    if let Some(ref assigned) = req.assigned_to {
        if assigned.is_empty() {
            return Err(ApiError::BadRequest(
                "assignedTo must be a non-empty array of user IDs".to_string(),
            ));
        }
    }

    let db = state.db.clone();
    let task = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|e| ApiError::internal("DB lock poisoned", e))?;

        let mut row = fetch_task(&conn, &id)?;

        if let Some(title) = req.title {
            row.title = title.trim().to_string();
        }
        if let Some(description) = req.description {
            row.description = Some(description);
        }
        if let Some(priority) = req.priority {
            row.priority = priority;
        }
        if let Some(due) = due_date {
            row.due_date = due.to_rfc3339();
        }

        let now = Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE tasks SET title = ?1, description = ?2, priority = ?3, due_date = ?4, updated_at = ?5
             WHERE id = ?6",
            rusqlite::params![row.title, row.description, row.priority, row.due_date, now, id],
        )?;

        if let Some(assigned) = req.assigned_to {
            conn.execute(
                "DELETE FROM task_assignees WHERE task_id = ?1",
                rusqlite::params![id],
            )?;
            for user_id in assigned {
                conn.execute(
                    "INSERT OR IGNORE INTO task_assignees (task_id, user_id) VALUES (?1, ?2)",
                    rusqlite::params![id, user_id],
                )?;
            }
        }

        if let Some(todos) = req.todo_checklist {
            replace_checklist(&conn, &id, &todos)?;
        }

        if let Some(attachments) = req.attachments {
            conn.execute(
                "DELETE FROM task_attachments WHERE task_id = ?1",
                rusqlite::params![id],
            )?;
            for url in attachments {
                conn.execute(
                    "INSERT INTO task_attachments (task_id, url) VALUES (?1, ?2)",
                    rusqlite::params![id, url],
                )?;
            }
        }

        let row = fetch_task(&conn, &id)?;
        load_task_response(&conn, row).map_err(ApiError::from)
    })
    .await??;

    Ok(Json(TaskMessageResponse {
        message: "Task updated successfully".to_string(),
        task,
    }))
}

/// DELETE /api/tasks/{id} — Admin only. Child rows cascade.
pub async fn delete_task(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    claims.require_admin()?;

    let db = state.db.clone();
    tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|e| ApiError::internal("DB lock poisoned", e))?;
        let deleted = conn.execute("DELETE FROM tasks WHERE id = ?1", rusqlite::params![id])?;
        if deleted == 0 {
            return Err(ApiError::NotFound("Task not found".to_string()));
        }
        Ok::<_, ApiError>(())
    })
    .await??;

    Ok(Json(serde_json::json!({
        "message": "Task deleted successfully"
    })))
}
