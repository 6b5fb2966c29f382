use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{DatabaseError, SupabaseClient};

use crate::models::{AuthError, UpdateUserRequest, UserAccount, UserListQuery};
use crate::services::auth::normalize_email;

/// Administrative access to staff accounts.
pub struct UserService {
    supabase: SupabaseClient,
}

impl UserService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn list_users(
        &self,
        query: &UserListQuery,
        auth_token: &str,
    ) -> Result<(Vec<UserAccount>, u64), AuthError> {
        let (page, limit) = query.pagination();
        let mut path = "/rest/v1/users?is_active=eq.true".to_string();
        if let Some(role) = query.role {
            path.push_str(&format!("&role=eq.{}", role));
        }
        path.push_str(&format!(
            "&order=last_name.asc&limit={}&offset={}",
            limit,
            (page as u64 - 1) * limit as u64
        ));

        debug!("Listing users page {} (limit {})", page, limit);
        self.supabase
            .request_with_count(&path, Some(auth_token))
            .await
            .map_err(|e| AuthError::Database(e.to_string()))
    }

    pub async fn get_user(&self, user_id: Uuid, auth_token: &str) -> Result<UserAccount, AuthError> {
        self.supabase
            .select_one("users", &format!("id=eq.{}", user_id), auth_token)
            .await
            .map_err(|e| AuthError::Database(e.to_string()))?
            .ok_or(AuthError::UserNotFound)
    }

    pub async fn update_user(
        &self,
        user_id: Uuid,
        mut request: UpdateUserRequest,
        auth_token: &str,
    ) -> Result<UserAccount, AuthError> {
        if let Some(email) = &request.email {
            request.email = Some(normalize_email(email)?);
        }

        let mut body = serde_json::to_value(&request).map_err(|e| AuthError::Internal(e.to_string()))?;
        if let Value::Object(map) = &mut body {
            map.insert("updated_at".to_string(), json!(Utc::now()));
        }

        let updated = self
            .supabase
            .update("users", &format!("id=eq.{}", user_id), auth_token, body)
            .await
            .map_err(|e| {
                if DatabaseError::is_conflict(&e) {
                    AuthError::EmailTaken
                } else {
                    AuthError::Database(e.to_string())
                }
            })?
            .ok_or(AuthError::UserNotFound)?;

        info!("User {} updated", user_id);
        Ok(updated)
    }

    pub async fn deactivate_user(&self, user_id: Uuid, auth_token: &str) -> Result<(), AuthError> {
        let body = json!({ "is_active": false, "updated_at": Utc::now() });

        let updated: Option<UserAccount> = self
            .supabase
            .update("users", &format!("id=eq.{}", user_id), auth_token, body)
            .await
            .map_err(|e| AuthError::Database(e.to_string()))?;

        updated.ok_or(AuthError::UserNotFound)?;
        info!("User {} deactivated", user_id);
        Ok(())
    }
}
