use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_utils::jwt::{decode_claims, issue_token};

use crate::models::{
    AuthError, AuthResponse, LoginRequest, NewUserAccount, SignupRequest, UserAccount,
    REFRESH_TOKEN_DAYS, RESET_TOKEN_MINUTES,
};
use crate::services::password::{
    digest_reset_token, generate_reset_token, hash_password, validate_password, verify_password,
};

pub struct AuthService {
    supabase: SupabaseClient,
    service_token: String,
    jwt_secret: String,
    jwt_refresh_secret: String,
    access_ttl: Duration,
}

impl AuthService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            // Unauthenticated flows (signup, login, reset) run with the anon key.
            service_token: config.supabase_anon_key.clone(),
            jwt_secret: config.jwt_secret.clone(),
            jwt_refresh_secret: config.jwt_refresh_secret.clone(),
            access_ttl: Duration::hours(config.jwt_expires_in_hours),
        }
    }

    // ==============================================================================
    // SESSION FLOWS
    // ==============================================================================

    pub async fn signup(&self, request: SignupRequest) -> Result<AuthResponse, AuthError> {
        let email = normalize_email(&request.email)?;
        let first_name = required("first_name", &request.first_name)?;
        let last_name = required("last_name", &request.last_name)?;
        validate_password(&request.password)?;

        if self.find_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let account = NewUserAccount {
            email,
            password_hash: hash_password(&request.password)?,
            first_name,
            last_name,
            role: request.role.unwrap_or_default(),
            is_active: true,
        };
        let body = serde_json::to_value(&account).map_err(|e| AuthError::Internal(e.to_string()))?;

        let user: UserAccount = self
            .supabase
            .insert("users", &self.service_token, body)
            .await
            .map_err(|e| AuthError::Database(e.to_string()))?;

        info!("Registered user {} with role {}", user.id, user.role);
        self.issue_session(user)
    }

    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, AuthError> {
        let (email, password) = match (request.email, request.password) {
            (Some(email), Some(password)) if !email.trim().is_empty() && !password.is_empty() => (email, password),
            _ => return Err(AuthError::MissingCredentials),
        };
        let email = normalize_email(&email).map_err(|_| AuthError::InvalidCredentials)?;

        let user = self
            .find_by_email(&email)
            .await?
            .filter(|user| user.is_active)
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(&password, &user.password_hash) {
            warn!("Failed login attempt for user {}", user.id);
            return Err(AuthError::InvalidCredentials);
        }

        debug!("User {} logged in", user.id);
        self.issue_session(user)
    }

    pub async fn refresh(&self, refresh_token: Option<&str>) -> Result<AuthResponse, AuthError> {
        let refresh_token = refresh_token
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingRefreshToken)?;

        let claims = decode_claims(refresh_token, &self.jwt_refresh_secret).map_err(|e| {
            debug!("Refresh token rejected: {}", e);
            AuthError::InvalidRefreshToken
        })?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidRefreshToken)?;

        let user = self
            .find_by_id(user_id)
            .await?
            .filter(|user| user.is_active)
            .ok_or(AuthError::InvalidRefreshToken)?;

        if user.changed_password_after(claims.iat) {
            return Err(AuthError::PasswordChanged);
        }

        self.issue_session(user)
    }

    // ==============================================================================
    // PASSWORD FLOWS
    // ==============================================================================

    /// Stores the digest of a fresh reset token and returns the raw token for delivery.
    pub async fn forgot_password(&self, email: &str) -> Result<String, AuthError> {
        let email = normalize_email(email).map_err(|_| AuthError::UnknownEmail)?;
        let user = self.find_by_email(&email).await?.ok_or(AuthError::UnknownEmail)?;

        let reset_token = generate_reset_token();
        let body = json!({
            "password_reset_token": digest_reset_token(&reset_token),
            "password_reset_expires": Utc::now() + Duration::minutes(RESET_TOKEN_MINUTES),
        });
        self.patch_user(user.id, &self.service_token, body).await?;

        info!("Password reset requested for user {}", user.id);
        Ok(reset_token)
    }

    pub async fn reset_password(&self, reset_token: &str, password: &str) -> Result<AuthResponse, AuthError> {
        validate_password(password)?;

        let filter = format!(
            "password_reset_token=eq.{}&password_reset_expires=gt.{}",
            digest_reset_token(reset_token),
            urlencoding::encode(&Utc::now().to_rfc3339())
        );
        let user: UserAccount = self
            .supabase
            .select_one("users", &filter, &self.service_token)
            .await
            .map_err(|e| AuthError::Database(e.to_string()))?
            .ok_or(AuthError::InvalidResetToken)?;

        let body = json!({
            "password_hash": hash_password(password)?,
            "password_reset_token": null,
            "password_reset_expires": null,
            "password_changed_at": password_changed_now(),
        });
        let user = self.patch_user(user.id, &self.service_token, body).await?;

        info!("Password reset completed for user {}", user.id);
        self.issue_session(user)
    }

    pub async fn update_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
        auth_token: &str,
    ) -> Result<(), AuthError> {
        let user = self.find_by_id(user_id).await?.ok_or(AuthError::UserNotFound)?;

        if !verify_password(current_password, &user.password_hash) {
            return Err(AuthError::WrongCurrentPassword);
        }
        validate_password(new_password)?;

        let body = json!({
            "password_hash": hash_password(new_password)?,
            "password_changed_at": password_changed_now(),
        });
        self.patch_user(user_id, auth_token, body).await?;

        info!("Password updated for user {}", user_id);
        Ok(())
    }

    pub async fn me(&self, user_id: Uuid, auth_token: &str) -> Result<UserAccount, AuthError> {
        self.supabase
            .select_one("users", &format!("id=eq.{}", user_id), auth_token)
            .await
            .map_err(|e| AuthError::Database(e.to_string()))?
            .ok_or(AuthError::UserNotFound)
    }

    // ==============================================================================
    // HELPERS
    // ==============================================================================

    fn issue_session(&self, user: UserAccount) -> Result<AuthResponse, AuthError> {
        let token = issue_token(user.id, Some(&user.email), user.role, &self.jwt_secret, self.access_ttl)
            .map_err(AuthError::Internal)?;
        let refresh_token = issue_token(
            user.id,
            Some(&user.email),
            user.role,
            &self.jwt_refresh_secret,
            Duration::days(REFRESH_TOKEN_DAYS),
        )
        .map_err(AuthError::Internal)?;

        Ok(AuthResponse {
            token,
            refresh_token,
            user,
        })
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, AuthError> {
        let filter = format!("email=eq.{}", urlencoding::encode(email));
        self.supabase
            .select_one("users", &filter, &self.service_token)
            .await
            .map_err(|e| AuthError::Database(e.to_string()))
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<UserAccount>, AuthError> {
        self.supabase
            .select_one("users", &format!("id=eq.{}", user_id), &self.service_token)
            .await
            .map_err(|e| AuthError::Database(e.to_string()))
    }

    async fn patch_user(&self, user_id: Uuid, auth_token: &str, mut body: Value) -> Result<UserAccount, AuthError> {
        if let Value::Object(map) = &mut body {
            map.insert("updated_at".to_string(), json!(Utc::now()));
        }

        self.supabase
            .update("users", &format!("id=eq.{}", user_id), auth_token, body)
            .await
            .map_err(|e| AuthError::Database(e.to_string()))?
            .ok_or(AuthError::UserNotFound)
    }
}

/// Backdated one second so a token issued in the same second stays valid.
fn password_changed_now() -> chrono::DateTime<Utc> {
    Utc::now() - Duration::seconds(1)
}

pub(crate) fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    let valid = email
        .split_once('@')
        .map(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.starts_with('.'))
        .unwrap_or(false);

    if !valid {
        return Err(AuthError::Validation("Please provide a valid email".to_string()));
    }
    Ok(email)
}

fn required(field: &str, value: &str) -> Result<String, AuthError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AuthError::Validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}
