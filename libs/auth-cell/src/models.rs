use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::auth::Role;
use shared_models::error::AppError;

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const REFRESH_TOKEN_DAYS: i64 = 7;
pub const RESET_TOKEN_MINUTES: i64 = 10;

/// A staff account row. Secrets deserialize from storage but are never serialized back out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: Uuid,
    pub email: String,
    #[serde(default, skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub is_active: bool,
    pub password_changed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing)]
    pub password_reset_token: Option<String>,
    #[serde(default, skip_serializing)]
    pub password_reset_expires: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserAccount {
    /// True when the password changed after a token issued at `issued_at` (unix seconds).
    pub fn changed_password_after(&self, issued_at: i64) -> bool {
        self.password_changed_at
            .map(|changed| issued_at < changed.timestamp())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewUserAccount {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub is_active: bool,
}

// ==============================================================================
// REQUESTS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResetPasswordRequest {
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePasswordRequest {
    pub password_current: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub role: Option<Role>,
}

impl UserListQuery {
    pub fn pagination(&self) -> (u32, u32) {
        let page = self.page.filter(|p| *p > 0).unwrap_or(1);
        let limit = self.limit.filter(|l| *l > 0).unwrap_or(20).min(100);
        (page, limit)
    }
}

// ==============================================================================
// RESPONSES
// ==============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub refresh_token: String,
    pub user: UserAccount,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    #[error("Please provide email and password")]
    MissingCredentials,

    #[error("Incorrect email or password")]
    InvalidCredentials,

    #[error("Email address is already registered")]
    EmailTaken,

    #[error("There is no user with that email address.")]
    UnknownEmail,

    #[error("No user found with that ID")]
    UserNotFound,

    #[error("No refresh token provided")]
    MissingRefreshToken,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("User recently changed password! Please log in again.")]
    PasswordChanged,

    #[error("Token is invalid or has expired")]
    InvalidResetToken,

    #[error("Your current password is wrong.")]
    WrongCurrentPassword,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials | AuthError::InvalidResetToken => AppError::BadRequest(err.to_string()),
            AuthError::InvalidCredentials
            | AuthError::MissingRefreshToken
            | AuthError::InvalidRefreshToken
            | AuthError::PasswordChanged
            | AuthError::WrongCurrentPassword => AppError::Auth(err.to_string()),
            AuthError::EmailTaken => AppError::Conflict(err.to_string()),
            AuthError::UnknownEmail | AuthError::UserNotFound => AppError::NotFound(err.to_string()),
            AuthError::Validation(msg) => AppError::ValidationError(msg),
            AuthError::Database(msg) => AppError::Database(msg),
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}
