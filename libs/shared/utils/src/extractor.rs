use std::sync::Arc;

use axum::{
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
    body::Body,
};
use tracing::warn;

use shared_models::auth::{AccountStatus, Permission, User};
use shared_models::error::AppError;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::jwt::validate_token;

pub fn bearer_token(value: Option<&str>) -> Result<&str, AppError> {
    let auth_value = value
        .ok_or_else(|| AppError::Auth("You are not logged in! Please log in to get access.".to_string()))?;

    auth_value
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))
}

// Validates the bearer token, re-checks the account and stores the caller in request extensions
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get("Authorization")
        .map(|value| value.to_str())
        .transpose()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    let token = bearer_token(header)?;

    let claimed = validate_token(token, &config.jwt_secret)
        .map_err(AppError::Auth)?;
    let user = current_user(&config, claimed).await?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Rebuilds the caller from the stored account, so deactivation, password
/// changes and role changes apply to tokens already issued.
async fn current_user(config: &AppConfig, claimed: User) -> Result<User, AppError> {
    let filter = format!("id=eq.{}&select={}", claimed.id, AccountStatus::COLUMNS);
    let account: Option<AccountStatus> = SupabaseClient::new(config)
        .select_one("users", &filter, &config.supabase_anon_key)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    let account = account
        .filter(|account| account.is_active)
        .ok_or_else(|| AppError::Auth("The user belonging to this token no longer exists.".to_string()))?;

    if let Some(issued_at) = claimed.issued_at {
        if account.changed_password_after(issued_at.timestamp()) {
            warn!("Rejected token for {} issued before a password change", account.id);
            return Err(AppError::Auth("User recently changed password! Please log in again.".to_string()));
        }
    }

    Ok(User {
        id: account.id,
        email: account.email,
        role: account.role,
        issued_at: claimed.issued_at,
    })
}

pub fn extract_user<B>(request: &Request<B>) -> Result<User, AppError> {
    request
        .extensions()
        .get::<User>()
        .cloned()
        .ok_or_else(|| AppError::Auth("User not found in request extensions".to_string()))
}

pub fn require_permission(user: &User, permission: Permission) -> Result<(), AppError> {
    if user.can(permission) {
        Ok(())
    } else {
        Err(AppError::Forbidden("You do not have permission to perform this action.".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::{middleware, routing::get, Extension, Router};
    use shared_models::auth::Role;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

    #[test]
    fn bearer_prefix_is_required() {
        assert_eq!(bearer_token(Some("Bearer abc")).unwrap(), "abc");
        assert_matches!(bearer_token(Some("Token abc")), Err(AppError::Auth(_)));
        assert_matches!(bearer_token(Some("Bearer ")), Err(AppError::Auth(_)));
        assert_matches!(bearer_token(None), Err(AppError::Auth(_)));
    }

    #[test]
    fn permission_guard_checks_role() {
        let nurse = TestUser::nurse("nurse@clinic.test").to_user();
        assert!(require_permission(&nurse, Permission::ManageAppointments).is_ok());
        assert_matches!(
            require_permission(&nurse, Permission::ManageUsers),
            Err(AppError::Forbidden(_))
        );
    }

    #[tokio::test]
    async fn middleware_injects_user() {
        let server = MockServer::start().await;
        let config = TestConfig::with_supabase_url(server.uri()).to_arc();
        let app = Router::new()
            .route("/whoami", get(|Extension(user): Extension<User>| async move { user.role.to_string() }))
            .layer(middleware::from_fn_with_state(config.clone(), auth_middleware));

        let user = TestUser::doctor("doc@clinic.test");
        let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(1));

        Mock::given(method("GET"))
            .and(path("/rest/v1/users"))
            .and(query_param("id", format!("eq.{}", user.id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                MockSupabaseResponses::user_response(user.id, &user.email, Role::Doctor)
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/whoami")
                    .header("Authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);

        let rejected = app
            .oneshot(Request::builder().uri("/whoami").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(rejected.status(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn middleware_rejects_bad_tokens() {
        let config = TestConfig::default().to_arc();
        let app = Router::new()
            .route("/whoami", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(config.clone(), auth_middleware));

        let user = TestUser::admin("admin@clinic.test");
        let tokens = [
            JwtTestUtils::create_expired_token(&user, &config.jwt_secret),
            JwtTestUtils::create_invalid_signature_token(&user),
            JwtTestUtils::create_malformed_token(),
        ];

        for token in tokens {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .uri("/whoami")
                        .header("Authorization", format!("Bearer {}", token))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), axum::http::StatusCode::UNAUTHORIZED);
        }
    }
}
