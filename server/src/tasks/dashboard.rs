//! Dashboard statistics: counts, distributions, recent tasks.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::auth::middleware::Claims;
use crate::db::models::{Priority, TaskStatus};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total_tasks: i64,
    pub pending_tasks: i64,
    pub completed_tasks: i64,
    pub overdue_tasks: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Charts {
    /// Status display names without spaces, plus an "All" total.
    pub task_distribution: BTreeMap<String, i64>,
    pub task_priority_levels: BTreeMap<String, i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentTask {
    pub id: String,
    pub title: String,
    pub status: String,
    pub priority: String,
    pub due_date: String,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub statistics: Statistics,
    pub charts: Charts,
    pub recent_tasks: Vec<RecentTask>,
}

/// Distribution keys drop the space in "In progress" for chart-friendly keys.
fn distribution_key(status: TaskStatus) -> String {
    status.as_str().replace(' ', "")
}

/// Assemble dashboard data, optionally scoped to one assignee.
fn build_dashboard(
    conn: &rusqlite::Connection,
    scope_user: Option<&str>,
) -> rusqlite::Result<DashboardResponse> {
    let now = Utc::now().to_rfc3339();

    // Per-status counts via GROUP BY, zero-filled afterwards
    let mut status_counts: BTreeMap<String, i64> = BTreeMap::new();
    {
        let (sql, params): (&str, Vec<&dyn rusqlite::ToSql>) = match scope_user {
            Some(ref user) => (
                "SELECT t.status, COUNT(*) FROM tasks t
                 JOIN task_assignees a ON a.task_id = t.id
                 WHERE a.user_id = ?1 GROUP BY t.status",
                vec![user as &dyn rusqlite::ToSql],
            ),
            None => ("SELECT status, COUNT(*) FROM tasks GROUP BY status", vec![]),
        };
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params.as_slice(), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (status, count) = row?;
            status_counts.insert(status, count);
        }
    }

    let count_for = |status: TaskStatus| *status_counts.get(status.as_str()).unwrap_or(&0);
    let total_tasks: i64 = status_counts.values().sum();

    let overdue_tasks: i64 = match scope_user {
        Some(user) => conn.query_row(
            "SELECT COUNT(*) FROM tasks t JOIN task_assignees a ON a.task_id = t.id
             WHERE a.user_id = ?1 AND t.status != 'Completed' AND t.due_date < ?2",
            rusqlite::params![user, now],
            |row| row.get(0),
        )?,
        None => conn.query_row(
            "SELECT COUNT(*) FROM tasks WHERE status != 'Completed' AND due_date < ?1",
            rusqlite::params![now],
            |row| row.get(0),
        )?,
    };

    let mut task_distribution: BTreeMap<String, i64> = BTreeMap::new();
    for status in [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Completed,
    ] {
        task_distribution.insert(distribution_key(status), count_for(status));
    }
    task_distribution.insert("All".to_string(), total_tasks);

    let mut priority_counts: BTreeMap<String, i64> = BTreeMap::new();
    {
        let (sql, params): (&str, Vec<&dyn rusqlite::ToSql>) = match scope_user {
            Some(ref user) => (
                "SELECT t.priority, COUNT(*) FROM tasks t
                 JOIN task_assignees a ON a.task_id = t.id
                 WHERE a.user_id = ?1 GROUP BY t.priority",
                vec![user as &dyn rusqlite::ToSql],
            ),
            None => (
                "SELECT priority, COUNT(*) FROM tasks GROUP BY priority",
                vec![],
            ),
        };
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params.as_slice(), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (priority, count) = row?;
            priority_counts.insert(priority, count);
        }
    }

    let mut task_priority_levels: BTreeMap<String, i64> = BTreeMap::new();
    for priority in Priority::ALL {
        task_priority_levels.insert(
            priority.as_str().to_string(),
            *priority_counts.get(priority.as_str()).unwrap_or(&0),
        );
    }

    // Ten most recent tasks in scope
    let recent_tasks: Vec<RecentTask> = {
        let (sql, params): (String, Vec<&dyn rusqlite::ToSql>) = match scope_user {
            Some(ref user) => (
                "SELECT t.id, t.title, t.status, t.priority, t.due_date, t.created_at
                 FROM tasks t JOIN task_assignees a ON a.task_id = t.id
                 WHERE a.user_id = ?1 ORDER BY t.created_at DESC LIMIT 10"
                    .to_string(),
                vec![user as &dyn rusqlite::ToSql],
            ),
            None => (
                "SELECT id, title, status, priority, due_date, created_at
                 FROM tasks ORDER BY created_at DESC LIMIT 10"
                    .to_string(),
                vec![],
            ),
        };
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params.as_slice(), |row| {
            Ok(RecentTask {
                id: row.get(0)?,
                title: row.get(1)?,
                status: row.get(2)?,
                priority: row.get(3)?,
                due_date: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?;
        rows.collect::<Result<_, _>>()?
    };

    Ok(DashboardResponse {
        statistics: Statistics {
            total_tasks,
            pending_tasks: count_for(TaskStatus::Pending),
            completed_tasks: count_for(TaskStatus::Completed),
            overdue_tasks,
        },
        charts: Charts {
            task_distribution,
            task_priority_levels,
        },
        recent_tasks,
    })
}

/// GET /api/tasks/dashboard-data — Fleet-wide statistics. Admin only.
pub async fn admin_dashboard(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<DashboardResponse>, ApiError> {
    claims.require_admin()?;

    let db = state.db.clone();
    let response = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|e| ApiError::internal("DB lock poisoned", e))?;
        build_dashboard(&conn, None).map_err(ApiError::from)
    })
    .await??;

    Ok(Json(response))
}

/// GET /api/tasks/user-dashboard-data — Statistics for the caller's tasks.
pub async fn user_dashboard(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<DashboardResponse>, ApiError> {
    let db = state.db.clone();
    let user_id = claims.sub.clone();

    let response = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|e| ApiError::internal("DB lock poisoned", e))?;
        build_dashboard(&conn, Some(&user_id)).map_err(ApiError::from)
    })
    .await??;

    Ok(Json(response))
}
