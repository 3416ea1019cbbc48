//! Registration, login, and profile handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::jwt;
use crate::auth::middleware::Claims;
use crate::auth::password;
use crate::db::models::{Role, UserRow};
use crate::error::ApiError;
use crate::state::AppState;
use crate::users::PublicUser;

/// Bounds from the original user schema.
const MIN_NAME_LEN: usize = 2;
const MAX_NAME_LEN: usize = 50;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub profile_image_url: Option<String>,
    /// Matching the configured invite token grants the admin role.
    #[serde(default)]
    pub admin_invite_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub message: String,
    pub data: AuthData,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthData {
    #[serde(flatten)]
    pub user: PublicUser,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub profile_image_url: Option<String>,
}

/// Minimal email shape check: non-empty local part, domain with a dot.
fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.contains(char::is_whitespace)
}

fn validate_name(name: &str) -> Result<(), ApiError> {
    let len = name.chars().count();
    if !(MIN_NAME_LEN..=MAX_NAME_LEN).contains(&len) {
        return Err(ApiError::BadRequest(format!(
            "Name must be between {} and {} characters",
            MIN_NAME_LEN, MAX_NAME_LEN
        )));
    }
    Ok(())
}

/// POST /api/auth/register
/// Create a new account. A valid admin invite token grants the admin role.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let name = req.name.trim().to_string();
    let email = req.email.trim().to_lowercase();

    validate_name(&name)?;
    if !is_valid_email(&email) {
        return Err(ApiError::BadRequest(
            "Please provide a valid email address".to_string(),
        ));
    }
    password::validate_password(&req.password)?;

    let role = match (&state.admin_invite_token, &req.admin_invite_token) {
        (Some(expected), Some(given)) if expected == given => Role::Admin,
        _ => Role::Member,
    };

    let db = state.db.clone();
    let password_plain = req.password.clone();
    let profile_image_url = req.profile_image_url.clone();

    let user = tokio::task::spawn_blocking(move || {
        // bcrypt is CPU-bound, keep it off the async threads too
        let password_hash = password::hash_password(&password_plain)?;

        let conn = db
            .lock()
            .map_err(|e| ApiError::internal("DB lock poisoned", e))?;

        let exists: bool = conn
            .query_row(
                "SELECT COUNT(*) FROM users WHERE email = ?1",
                rusqlite::params![email],
                |row| row.get::<_, i64>(0).map(|c| c > 0),
            )
            .unwrap_or(false);
        if exists {
            return Err(ApiError::Conflict(
                "User with this email already exists".to_string(),
            ));
        }

        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO users (id, name, email, password_hash, profile_image_url, role, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?7)",
            rusqlite::params![id, name, email, password_hash, profile_image_url, role.as_str(), now],
        )?;

        let user = conn.query_row(
            &format!(
                "SELECT {} FROM users WHERE id = ?1",
                UserRow::SELECT_COLUMNS
            ),
            rusqlite::params![id],
            UserRow::from_row,
        )?;
        Ok::<_, ApiError>(user)
    })
    .await??;

    let token = jwt::issue_access_token(&state.jwt_secret, &user.id, &user.role)
        .map_err(|e| ApiError::internal("Token issuance failed", e))?;

    tracing::info!(user_id = %user.id, role = %user.role, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "User registered successfully".to_string(),
            data: AuthData {
                user: PublicUser::from_row(user),
                token,
            },
        }),
    ))
}

/// POST /api/auth/login
/// Verify credentials, reject deactivated accounts, update last_login.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest(
            "Email and password are required".to_string(),
        ));
    }

    let db = state.db.clone();
    let password_plain = req.password.clone();

    let user = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|e| ApiError::internal("DB lock poisoned", e))?;

        let user = conn
            .query_row(
                &format!(
                    "SELECT {} FROM users WHERE email = ?1",
                    UserRow::SELECT_COLUMNS
                ),
                rusqlite::params![email],
                UserRow::from_row,
            )
            .map_err(|_| ApiError::Unauthorized("Invalid email or password".to_string()))?;

        if !user.is_active {
            return Err(ApiError::Unauthorized(
                "Account is deactivated. Please contact an administrator".to_string(),
            ));
        }

        if !password::verify_password(&password_plain, &user.password_hash) {
            return Err(ApiError::Unauthorized(
                "Invalid email or password".to_string(),
            ));
        }

        let now = Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE users SET last_login = ?1 WHERE id = ?2",
            rusqlite::params![now, user.id],
        )?;

        Ok::<_, ApiError>(UserRow {
            last_login: Some(now),
            ..user
        })
    })
    .await??;

    let token = jwt::issue_access_token(&state.jwt_secret, &user.id, &user.role)
        .map_err(|e| ApiError::internal("Token issuance failed", e))?;

    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(AuthResponse {
        message: "Login successful".to_string(),
        data: AuthData {
            user: PublicUser::from_row(user),
            token,
        },
    }))
}

/// GET /api/auth/profile
pub async fn get_profile(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<PublicUser>, ApiError> {
    let db = state.db.clone();
    let user_id = claims.sub.clone();

    let user = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|e| ApiError::internal("DB lock poisoned", e))?;
        conn.query_row(
            &format!(
                "SELECT {} FROM users WHERE id = ?1",
                UserRow::SELECT_COLUMNS
            ),
            rusqlite::params![user_id],
            UserRow::from_row,
        )
        .map_err(|_| ApiError::NotFound("User not found".to_string()))
    })
    .await??;

    Ok(Json(PublicUser::from_row(user)))
}

/// PUT /api/auth/profile
/// Update own name/email/password/image. Re-issues the token so clients
/// can swap it in one round trip.
pub async fn update_profile(
    State(state): State<AppState>,
    claims: Claims,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    if let Some(ref name) = req.name {
        validate_name(name.trim())?;
    }
    if let Some(ref email) = req.email {
        if !is_valid_email(&email.trim().to_lowercase()) {
            return Err(ApiError::BadRequest(
                "Please provide a valid email address".to_string(),
            ));
        }
    }
    if let Some(ref pw) = req.password {
        password::validate_password(pw)?;
    }

    let db = state.db.clone();
    let user_id = claims.sub.clone();

    let user = tokio::task::spawn_blocking(move || {
        let new_password_hash = match req.password {
            Some(ref pw) => Some(password::hash_password(pw)?),
            None => None,
        };

        let conn = db
            .lock()
            .map_err(|e| ApiError::internal("DB lock poisoned", e))?;

        let mut user = conn
            .query_row(
                &format!(
                    "SELECT {} FROM users WHERE id = ?1",
                    UserRow::SELECT_COLUMNS
                ),
                rusqlite::params![user_id],
                UserRow::from_row,
            )
            .map_err(|_| ApiError::NotFound("User not found".to_string()))?;

        if let Some(name) = req.name {
            user.name = name.trim().to_string();
        }
        if let Some(email) = req.email {
            let email = email.trim().to_lowercase();
            let taken: bool = conn
                .query_row(
                    "SELECT COUNT(*) FROM users WHERE email = ?1 AND id != ?2",
                    rusqlite::params![email, user.id],
                    |row| row.get::<_, i64>(0).map(|c| c > 0),
                )
                .unwrap_or(false);
            if taken {
                return Err(ApiError::Conflict(
                    "Email is already taken by another user".to_string(),
                ));
            }
            user.email = email;
        }
        if let Some(url) = req.profile_image_url {
            user.profile_image_url = Some(url);
        }
        if let Some(hash) = new_password_hash {
            user.password_hash = hash;
        }

        let now = Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE users SET name = ?1, email = ?2, password_hash = ?3, profile_image_url = ?4, updated_at = ?5
             WHERE id = ?6",
            rusqlite::params![
                user.name,
                user.email,
                user.password_hash,
                user.profile_image_url,
                now,
                user.id
            ],
        )?;
        user.updated_at = now;

        Ok::<_, ApiError>(user)
    })
    .await??;

    let token = jwt::issue_access_token(&state.jwt_secret, &user.id, &user.role)
        .map_err(|e| ApiError::internal("Token issuance failed", e))?;

    Ok(Json(AuthResponse {
        message: "Profile updated successfully".to_string(),
        data: AuthData {
            user: PublicUser::from_row(user),
            token,
        },
    }))
}

/// POST /api/auth/logout
/// Tokens are stateless; this is an acknowledgement for client symmetry.
pub async fn logout(_claims: Claims) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Logged out successfully" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("a.b@sub.example.co"));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@nodot"));
        assert!(!is_valid_email("user@.leading.dot"));
        assert!(!is_valid_email("user name@example.com"));
    }
}
