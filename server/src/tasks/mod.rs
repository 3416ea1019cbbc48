//! Task management: CRUD, checklist/progress tracking, dashboards.

pub mod checklist;
pub mod crud;
pub mod dashboard;

use serde::{Deserialize, Serialize};

use crate::db::models::{Priority, TaskRow, TaskStatus};
use crate::error::ApiError;

/// Bounds from the original task schema.
pub const MIN_TITLE_LEN: usize = 3;
pub const MAX_TITLE_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 1000;

/// Assignee as embedded in task responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssigneeInfo {
    pub id: String,
    pub name: String,
    pub email: String,
    pub profile_image_url: Option<String>,
}

/// Checklist item in requests (id-less; the list is replaced wholesale).
#[derive(Debug, Clone, Deserialize)]
pub struct TodoInput {
    pub text: String,
    #[serde(default)]
    pub completed: bool,
}

/// Checklist item in responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoItem {
    pub id: i64,
    pub text: String,
    pub completed: bool,
    pub completed_at: Option<String>,
}

/// Full task as exposed over the API.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub priority: String,
    pub status: String,
    pub due_date: String,
    pub assigned_to: Vec<AssigneeInfo>,
    pub created_by: String,
    pub todo_checklist: Vec<TodoItem>,
    pub attachments: Vec<String>,
    pub progress: i64,
    pub completed_todo_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Load assignees, checklist, and attachments for a task row and assemble
/// the full response.
pub(crate) fn load_task_response(
    conn: &rusqlite::Connection,
    task: TaskRow,
) -> rusqlite::Result<TaskResponse> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.name, u.email, u.profile_image_url
         FROM users u JOIN task_assignees a ON a.user_id = u.id
         WHERE a.task_id = ?1 ORDER BY u.name",
    )?;
    let assigned_to: Vec<AssigneeInfo> = stmt
        .query_map(rusqlite::params![task.id], |row| {
            Ok(AssigneeInfo {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                profile_image_url: row.get(3)?,
            })
        })?
        .collect::<Result<_, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT id, text, completed, completed_at FROM task_todos
         WHERE task_id = ?1 ORDER BY position",
    )?;
    let todo_checklist: Vec<TodoItem> = stmt
        .query_map(rusqlite::params![task.id], |row| {
            Ok(TodoItem {
                id: row.get(0)?,
                text: row.get(1)?,
                completed: row.get(2)?,
                completed_at: row.get(3)?,
            })
        })?
        .collect::<Result<_, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT url FROM task_attachments WHERE task_id = ?1 ORDER BY id",
    )?;
    let attachments: Vec<String> = stmt
        .query_map(rusqlite::params![task.id], |row| row.get(0))?
        .collect::<Result<_, _>>()?;

    let completed_todo_count = todo_checklist.iter().filter(|t| t.completed).count() as i64;

    Ok(TaskResponse {
        id: task.id,
        title: task.title,
        description: task.description,
        priority: task.priority,
        status: task.status,
        due_date: task.due_date,
        assigned_to,
        created_by: task.created_by,
        todo_checklist,
        attachments,
        progress: task.progress,
        completed_todo_count,
        created_at: task.created_at,
        updated_at: task.updated_at,
    })
}

/// Fetch a task row by id, mapping a miss to 404.
pub(crate) fn fetch_task(
    conn: &rusqlite::Connection,
    task_id: &str,
) -> Result<TaskRow, ApiError> {
    conn.query_row(
        &format!("SELECT {} FROM tasks WHERE id = ?1", TaskRow::SELECT_COLUMNS),
        rusqlite::params![task_id],
        TaskRow::from_row,
    )
    .map_err(|_| ApiError::NotFound("Task not found".to_string()))
}

/// Whether the user is assigned to the task.
pub(crate) fn is_assigned(
    conn: &rusqlite::Connection,
    task_id: &str,
    user_id: &str,
) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) FROM task_assignees WHERE task_id = ?1 AND user_id = ?2",
        rusqlite::params![task_id, user_id],
        |row| row.get::<_, i64>(0).map(|c| c > 0),
    )
}

/// Replace the checklist wholesale, stamping completion times.
pub(crate) fn replace_checklist(
    conn: &rusqlite::Connection,
    task_id: &str,
    todos: &[TodoInput],
) -> rusqlite::Result<()> {
    conn.execute(
        "DELETE FROM task_todos WHERE task_id = ?1",
        rusqlite::params![task_id],
    )?;
    let now = chrono::Utc::now().to_rfc3339();
    for (position, todo) in todos.iter().enumerate() {
        let completed_at = todo.completed.then(|| now.clone());
        conn.execute(
            "INSERT INTO task_todos (task_id, text, completed, completed_at, position)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![task_id, todo.text, todo.completed, completed_at, position as i64],
        )?;
    }
    Ok(())
}

/// Progress percentage derived from checklist completion.
pub(crate) fn checklist_progress(completed: usize, total: usize) -> i64 {
    if total == 0 {
        return 0;
    }
    ((completed as f64 / total as f64) * 100.0).round() as i64
}

/// Status derived from progress after a checklist update.
pub(crate) fn status_for_progress(progress: i64) -> TaskStatus {
    match progress {
        100 => TaskStatus::Completed,
        p if p > 0 => TaskStatus::InProgress,
        _ => TaskStatus::Pending,
    }
}

pub(crate) fn validate_title(title: &str) -> Result<(), ApiError> {
    let len = title.chars().count();
    if !(MIN_TITLE_LEN..=MAX_TITLE_LEN).contains(&len) {
        return Err(ApiError::BadRequest(format!(
            "Task title must be between {} and {} characters",
            MIN_TITLE_LEN, MAX_TITLE_LEN
        )));
    }
    Ok(())
}

pub(crate) fn validate_description(description: &Option<String>) -> Result<(), ApiError> {
    if let Some(d) = description {
        if d.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(ApiError::BadRequest(format!(
                "Description cannot exceed {} characters",
                MAX_DESCRIPTION_LEN
            )));
        }
    }
    Ok(())
}

pub(crate) fn validate_priority(priority: &str) -> Result<Priority, ApiError> {
    Priority::from_str(priority)
        .ok_or_else(|| ApiError::BadRequest("Priority must be Low, Medium, or High".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_rounds_to_nearest_percent() {
        assert_eq!(checklist_progress(0, 0), 0);
        assert_eq!(checklist_progress(1, 3), 33);
        assert_eq!(checklist_progress(2, 3), 67);
        assert_eq!(checklist_progress(3, 3), 100);
    }

    #[test]
    fn status_follows_progress() {
        assert_eq!(status_for_progress(0), TaskStatus::Pending);
        assert_eq!(status_for_progress(50), TaskStatus::InProgress);
        assert_eq!(status_for_progress(100), TaskStatus::Completed);
    }
}
