//! Admin spreadsheet exports.

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use rust_xlsxwriter::Workbook;

use crate::auth::middleware::Claims;
use crate::db::models::{TaskRow, TaskStatus};
use crate::error::ApiError;
use crate::state::AppState;

const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Wrap xlsx bytes in a download response.
fn xlsx_response(filename: &str, bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response()
}

/// GET /api/reports/export/tasks — All tasks with assignees. Admin only.
pub async fn export_tasks(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Response, ApiError> {
    claims.require_admin()?;

    let db = state.db.clone();
    let bytes = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|e| ApiError::internal("DB lock poisoned", e))?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM tasks ORDER BY created_at",
            TaskRow::SELECT_COLUMNS
        ))?;
        let tasks: Vec<TaskRow> = stmt
            .query_map([], TaskRow::from_row)?
            .collect::<Result<_, _>>()?;

        let mut assignee_stmt = conn.prepare(
            "SELECT u.name, u.email FROM users u
             JOIN task_assignees a ON a.user_id = u.id
             WHERE a.task_id = ?1 ORDER BY u.name",
        )?;

        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet
            .set_name("Task Report")
            .map_err(|e| ApiError::internal("Worksheet setup failed", e))?;

        let headers = [
            ("Task ID", 25.0),
            ("Title", 30.0),
            ("Description", 50.0),
            ("Priority", 15.0),
            ("Status", 20.0),
            ("Due Date", 20.0),
            ("Assigned To", 30.0),
        ];
        for (col, (title, width)) in headers.iter().enumerate() {
            let col = col as u16;
            worksheet
                .write_string(0, col, *title)
                .and_then(|ws| ws.set_column_width(col, *width))
                .map_err(|e| ApiError::internal("Report header write failed", e))?;
        }

        for (i, task) in tasks.iter().enumerate() {
            let row = (i + 1) as u32;
            let assignees: Vec<String> = assignee_stmt
                .query_map(rusqlite::params![task.id], |r| {
                    Ok(format!("{} ({})", r.get::<_, String>(0)?, r.get::<_, String>(1)?))
                })?
                .collect::<Result<_, _>>()?;
            let assigned_to = if assignees.is_empty() {
                "Unassigned".to_string()
            } else {
                assignees.join(", ")
            };
            // Date column shows the calendar day only
            let due_day = task.due_date.split('T').next().unwrap_or(&task.due_date);

            worksheet
                .write_string(row, 0, &task.id)
                .and_then(|ws| ws.write_string(row, 1, &task.title))
                .and_then(|ws| {
                    ws.write_string(row, 2, task.description.as_deref().unwrap_or(""))
                })
                .and_then(|ws| ws.write_string(row, 3, &task.priority))
                .and_then(|ws| ws.write_string(row, 4, &task.status))
                .and_then(|ws| ws.write_string(row, 5, due_day))
                .and_then(|ws| ws.write_string(row, 6, &assigned_to))
                .map_err(|e| ApiError::internal("Report row write failed", e))?;
        }

        workbook
            .save_to_buffer()
            .map_err(|e| ApiError::internal("Workbook serialization failed", e))
    })
    .await??;

    Ok(xlsx_response("task_report.xlsx", bytes))
}

/// GET /api/reports/export/users — Per-user task workload summary.
/// Admin only.
pub async fn export_users(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Response, ApiError> {
    claims.require_admin()?;

    let db = state.db.clone();
    let bytes = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|e| ApiError::internal("DB lock poisoned", e))?;

        let mut stmt =
            conn.prepare("SELECT id, name, email FROM users ORDER BY name")?;
        let users: Vec<(String, String, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<Result<_, _>>()?;

        let mut count_stmt = conn.prepare(
            "SELECT COUNT(*) FROM tasks t JOIN task_assignees a ON a.task_id = t.id
             WHERE a.user_id = ?1 AND t.status = ?2",
        )?;
        let mut total_stmt = conn.prepare(
            "SELECT COUNT(*) FROM task_assignees WHERE user_id = ?1",
        )?;

        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet
            .set_name("User Task Report")
            .map_err(|e| ApiError::internal("Worksheet setup failed", e))?;

        let headers = [
            ("User Name", 30.0),
            ("Email", 40.0),
            ("Total Assigned Tasks", 20.0),
            ("Pending Tasks", 20.0),
            ("In Progress Tasks", 20.0),
            ("Completed Tasks", 20.0),
        ];
        for (col, (title, width)) in headers.iter().enumerate() {
            let col = col as u16;
            worksheet
                .write_string(0, col, *title)
                .and_then(|ws| ws.set_column_width(col, *width))
                .map_err(|e| ApiError::internal("Report header write failed", e))?;
        }

        for (i, (user_id, name, email)) in users.iter().enumerate() {
            let row = (i + 1) as u32;
            let total: i64 =
                total_stmt.query_row(rusqlite::params![user_id], |r| r.get(0))?;
            let mut by_status = |status: TaskStatus| -> rusqlite::Result<i64> {
                count_stmt.query_row(rusqlite::params![user_id, status.as_str()], |r| r.get(0))
            };
            let pending = by_status(TaskStatus::Pending)?;
            let in_progress = by_status(TaskStatus::InProgress)?;
            let completed = by_status(TaskStatus::Completed)?;

            worksheet
                .write_string(row, 0, name)
                .and_then(|ws| ws.write_string(row, 1, email))
                .and_then(|ws| ws.write_number(row, 2, total as f64))
                .and_then(|ws| ws.write_number(row, 3, pending as f64))
                .and_then(|ws| ws.write_number(row, 4, in_progress as f64))
                .and_then(|ws| ws.write_number(row, 5, completed as f64))
                .map_err(|e| ApiError::internal("Report row write failed", e))?;
        }

        workbook
            .save_to_buffer()
            .map_err(|e| ApiError::internal("Workbook serialization failed", e))
    })
    .await??;

    Ok(xlsx_response("users_report.xlsx", bytes))
}
