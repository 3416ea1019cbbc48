//! Database row types and enums for all tables.
//! These correspond 1:1 to the SQLite schema defined in migrations.rs.

use serde::{Deserialize, Serialize};

/// User roles. Stored as lowercase strings in the users table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
}

impl Role {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Self::Admin),
            "member" => Some(Self::Member),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }
}

/// Task priority levels. Stored as display strings ("Low", "Medium", "High").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Low" => Some(Self::Low),
            "Medium" => Some(Self::Medium),
            "High" => Some(Self::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

/// Task lifecycle states. Stored as display strings, "In progress" included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    #[serde(rename = "In progress")]
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(Self::Pending),
            "In progress" => Some(Self::InProgress),
            "Completed" => Some(Self::Completed),
            "Cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::InProgress => "In progress",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
        }
    }
}

/// User record in the users table.
#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub profile_image_url: Option<String>,
    pub role: String,
    pub is_active: bool,
    pub last_login: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl UserRow {
    /// Read a full user row. Column order must match SELECT_COLUMNS.
    pub const SELECT_COLUMNS: &'static str =
        "id, name, email, password_hash, profile_image_url, role, is_active, last_login, created_at, updated_at";

    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(UserRow {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            profile_image_url: row.get(4)?,
            role: row.get(5)?,
            is_active: row.get(6)?,
            last_login: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}

/// Task record in the tasks table (child tables loaded separately).
#[derive(Debug, Clone)]
pub struct TaskRow {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub priority: String,
    pub status: String,
    pub due_date: String,
    pub created_by: String,
    pub progress: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl TaskRow {
    pub const SELECT_COLUMNS: &'static str =
        "id, title, description, priority, status, due_date, created_by, progress, created_at, updated_at";

    /// Same columns with a `t.` prefix for joined queries.
    pub const SELECT_COLUMNS_PREFIXED: &'static str =
        "t.id, t.title, t.description, t.priority, t.status, t.due_date, t.created_by, t.progress, t.created_at, t.updated_at";

    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(TaskRow {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            priority: row.get(3)?,
            status: row.get(4)?,
            due_date: row.get(5)?,
            created_by: row.get(6)?,
            progress: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}

/// Checklist item belonging to a task.
#[derive(Debug, Clone)]
pub struct TodoRow {
    pub id: i64,
    pub text: String,
    pub completed: bool,
    pub completed_at: Option<String>,
}

/// Message record in the messages table. text_enc is ciphertext;
/// decryption happens at the handler boundary.
#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub text_enc: Option<Vec<u8>>,
    pub image_url: Option<String>,
    pub message_type: String,
    pub seen: bool,
    pub created_at: String,
}

impl MessageRow {
    pub const SELECT_COLUMNS: &'static str =
        "id, sender_id, receiver_id, text_enc, image_url, message_type, seen, created_at";

    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(MessageRow {
            id: row.get(0)?,
            sender_id: row.get(1)?,
            receiver_id: row.get(2)?,
            text_enc: row.get(3)?,
            image_url: row.get(4)?,
            message_type: row.get(5)?,
            seen: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_display_strings() {
        for s in ["Pending", "In progress", "Completed", "Cancelled"] {
            assert_eq!(TaskStatus::from_str(s).unwrap().as_str(), s);
        }
        assert!(TaskStatus::from_str("in progress").is_none());
    }

    #[test]
    fn role_rejects_unknown() {
        assert!(Role::from_str("owner").is_none());
        assert_eq!(Role::from_str("admin"), Some(Role::Admin));
    }
}
