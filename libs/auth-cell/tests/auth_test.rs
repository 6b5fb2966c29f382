use std::sync::Arc;

use assert_matches::assert_matches;
use axum::{
    body::Body,
    extract::{Extension, Path, Query, State},
    http::{Request, StatusCode},
    Json,
};
use axum_extra::TypedHeader;
use chrono::{Duration, Utc};
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auth_cell::handlers::*;
use auth_cell::models::*;
use auth_cell::router::{auth_routes, user_routes};
use auth_cell::services::password::{digest_reset_token, hash_password};
use auth_cell::services::AuthService;
use shared_config::AppConfig;
use shared_models::auth::Role;
use shared_models::error::AppError;
use shared_utils::jwt::{issue_token, validate_token};
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

const PASSWORD: &str = "correct-horse-battery";

fn config_for(server: &MockServer) -> Arc<AppConfig> {
    TestConfig::with_supabase_url(server.uri()).to_arc()
}

fn create_auth_header(token: &str) -> TypedHeader<Authorization<Bearer>> {
    TypedHeader(Authorization::bearer(token).unwrap())
}

fn stored_user(id: Uuid, email: &str, role: Role) -> Value {
    let mut row = MockSupabaseResponses::user_response(id, email, role);
    row["password_hash"] = json!(hash_password(PASSWORD).unwrap());
    row
}

async fn mount_lookup(server: &MockServer, field: &str, value: String, rows: Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param(field, value))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .mount(server)
        .await;
}

// ==============================================================================
// SIGNUP / LOGIN
// ==============================================================================

#[tokio::test]
async fn signup_stores_hashed_password_and_issues_tokens() {
    let server = MockServer::start().await;
    let config = config_for(&server);
    let user_id = Uuid::new_v4();

    mount_lookup(&server, "email", "eq.grace@clinic.test".to_string(), json!([])).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/users"))
        .and(body_partial_json(json!({
            "email": "grace@clinic.test",
            "role": "doctor",
            "is_active": true
        })))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!([stored_user(user_id, "grace@clinic.test", Role::Doctor)])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let request = SignupRequest {
        first_name: "Grace".to_string(),
        last_name: "Hopper".to_string(),
        email: " Grace@Clinic.test".to_string(),
        password: PASSWORD.to_string(),
        role: Some(Role::Doctor),
    };
    let (status, Json(body)) = signup(State(config.clone()), Json(request)).await.unwrap();
    assert_eq!(status, StatusCode::CREATED);

    let token = body["token"].as_str().unwrap();
    let user = validate_token(token, &config.jwt_secret).unwrap();
    assert_eq!(user.id, user_id);
    assert_eq!(user.role, Role::Doctor);
    assert!(body["data"]["user"].get("password_hash").is_none());

    let refresh = body["refresh_token"].as_str().unwrap();
    assert!(validate_token(refresh, &config.jwt_secret).is_err());
    assert!(validate_token(refresh, &config.jwt_refresh_secret).is_ok());

    let posted = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.method.as_str() == "POST")
        .unwrap();
    let posted: Value = serde_json::from_slice(&posted.body).unwrap();
    assert!(posted["password_hash"].as_str().unwrap().starts_with("$argon2"));
}

#[tokio::test]
async fn signup_with_taken_email_conflicts() {
    let server = MockServer::start().await;
    mount_lookup(
        &server,
        "email",
        "eq.grace@clinic.test".to_string(),
        json!([stored_user(Uuid::new_v4(), "grace@clinic.test", Role::Nurse)]),
    )
    .await;

    let request = SignupRequest {
        first_name: "Grace".to_string(),
        last_name: "Hopper".to_string(),
        email: "grace@clinic.test".to_string(),
        password: PASSWORD.to_string(),
        role: None,
    };
    let result = signup(State(config_for(&server)), Json(request)).await;

    assert_matches!(result, Err(AppError::Conflict(_)));
}

#[tokio::test]
async fn signup_rejects_short_password_before_any_lookup() {
    let server = MockServer::start().await;

    let request = SignupRequest {
        first_name: "Grace".to_string(),
        last_name: "Hopper".to_string(),
        email: "grace@clinic.test".to_string(),
        password: "short".to_string(),
        role: None,
    };
    let result = signup(State(config_for(&server)), Json(request)).await;

    assert_matches!(result, Err(AppError::ValidationError(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn login_checks_the_stored_hash() {
    let server = MockServer::start().await;
    let config = config_for(&server);
    let user_id = Uuid::new_v4();
    mount_lookup(
        &server,
        "email",
        "eq.nurse@clinic.test".to_string(),
        json!([stored_user(user_id, "nurse@clinic.test", Role::Nurse)]),
    )
    .await;

    let Json(body) = login(
        State(config.clone()),
        Json(LoginRequest {
            email: Some("nurse@clinic.test".to_string()),
            password: Some(PASSWORD.to_string()),
        }),
    )
    .await
    .unwrap();
    let user = validate_token(body["token"].as_str().unwrap(), &config.jwt_secret).unwrap();
    assert_eq!(user.id, user_id);

    let wrong = login(
        State(config),
        Json(LoginRequest {
            email: Some("nurse@clinic.test".to_string()),
            password: Some("not-the-password".to_string()),
        }),
    )
    .await;
    assert_matches!(wrong, Err(AppError::Auth(_)));
}

#[tokio::test]
async fn login_without_password_is_a_bad_request() {
    let server = MockServer::start().await;

    let result = login(
        State(config_for(&server)),
        Json(LoginRequest {
            email: Some("nurse@clinic.test".to_string()),
            password: None,
        }),
    )
    .await;

    assert_matches!(result, Err(AppError::BadRequest(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn deactivated_account_cannot_log_in() {
    let server = MockServer::start().await;
    let mut row = stored_user(Uuid::new_v4(), "gone@clinic.test", Role::Doctor);
    row["is_active"] = json!(false);
    mount_lookup(&server, "email", "eq.gone@clinic.test".to_string(), json!([row])).await;

    let result = login(
        State(config_for(&server)),
        Json(LoginRequest {
            email: Some("gone@clinic.test".to_string()),
            password: Some(PASSWORD.to_string()),
        }),
    )
    .await;

    assert_matches!(result, Err(AppError::Auth(_)));
}

// ==============================================================================
// REFRESH
// ==============================================================================

#[tokio::test]
async fn refresh_token_issues_a_new_session() {
    let server = MockServer::start().await;
    let config = config_for(&server);
    let user_id = Uuid::new_v4();
    mount_lookup(
        &server,
        "id",
        format!("eq.{}", user_id),
        json!([stored_user(user_id, "doc@clinic.test", Role::Doctor)]),
    )
    .await;

    let refresh = issue_token(
        user_id,
        Some("doc@clinic.test"),
        Role::Doctor,
        &config.jwt_refresh_secret,
        Duration::days(7),
    )
    .unwrap();

    let Json(body) = refresh_token(
        State(config.clone()),
        Json(RefreshTokenRequest {
            refresh_token: Some(refresh),
        }),
    )
    .await
    .unwrap();

    let user = validate_token(body["token"].as_str().unwrap(), &config.jwt_secret).unwrap();
    assert_eq!(user.id, user_id);
}

#[tokio::test]
async fn access_token_is_not_a_refresh_token() {
    let server = MockServer::start().await;
    let config = config_for(&server);

    let access = issue_token(Uuid::new_v4(), None, Role::Nurse, &config.jwt_secret, Duration::hours(1)).unwrap();
    let result = refresh_token(
        State(config),
        Json(RefreshTokenRequest {
            refresh_token: Some(access),
        }),
    )
    .await;

    assert_matches!(result, Err(AppError::Auth(_)));
}

#[tokio::test]
async fn refresh_after_password_change_is_rejected() {
    let server = MockServer::start().await;
    let config = config_for(&server);
    let user_id = Uuid::new_v4();
    let mut row = stored_user(user_id, "doc@clinic.test", Role::Doctor);
    row["password_changed_at"] = json!(Utc::now() + Duration::minutes(5));
    mount_lookup(&server, "id", format!("eq.{}", user_id), json!([row])).await;

    let refresh = issue_token(user_id, None, Role::Doctor, &config.jwt_refresh_secret, Duration::days(7)).unwrap();
    let service = AuthService::new(&config);

    assert_matches!(service.refresh(Some(&refresh)).await, Err(AuthError::PasswordChanged));
    assert_matches!(service.refresh(None).await, Err(AuthError::MissingRefreshToken));
}

// ==============================================================================
// PASSWORD RESET
// ==============================================================================

#[tokio::test]
async fn forgot_password_for_unknown_email_is_not_found() {
    let server = MockServer::start().await;
    mount_lookup(&server, "email", "eq.ghost@clinic.test".to_string(), json!([])).await;

    let result = forgot_password(
        State(config_for(&server)),
        Json(ForgotPasswordRequest {
            email: "ghost@clinic.test".to_string(),
        }),
    )
    .await;

    assert_matches!(result, Err(AppError::NotFound(_)));
}

#[tokio::test]
async fn forgot_password_stores_only_the_digest() {
    let server = MockServer::start().await;
    let config = config_for(&server);
    let user_id = Uuid::new_v4();
    let row = stored_user(user_id, "doc@clinic.test", Role::Doctor);
    mount_lookup(&server, "email", "eq.doc@clinic.test".to_string(), json!([row.clone()])).await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/users"))
        .and(query_param("id", format!("eq.{}", user_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .expect(1)
        .mount(&server)
        .await;

    let raw = AuthService::new(&config).forgot_password("doc@clinic.test").await.unwrap();

    let patch = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.method.as_str() == "PATCH")
        .unwrap();
    let patch: Value = serde_json::from_slice(&patch.body).unwrap();
    assert_eq!(patch["password_reset_token"], json!(digest_reset_token(&raw)));
    assert_ne!(patch["password_reset_token"], json!(raw));
    assert!(patch["password_reset_expires"].is_string());
}

#[tokio::test]
async fn reset_password_with_unknown_token_fails() {
    let server = MockServer::start().await;
    mount_lookup(
        &server,
        "password_reset_token",
        format!("eq.{}", digest_reset_token("stale")),
        json!([]),
    )
    .await;

    let result = reset_password(
        State(config_for(&server)),
        Path("stale".to_string()),
        Json(ResetPasswordRequest {
            password: PASSWORD.to_string(),
        }),
    )
    .await;

    assert_matches!(result, Err(AppError::BadRequest(_)));
}

#[tokio::test]
async fn reset_password_clears_token_and_logs_in() {
    let server = MockServer::start().await;
    let config = config_for(&server);
    let user_id = Uuid::new_v4();
    let row = stored_user(user_id, "doc@clinic.test", Role::Doctor);
    mount_lookup(
        &server,
        "password_reset_token",
        format!("eq.{}", digest_reset_token("fresh")),
        json!([row.clone()]),
    )
    .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/users"))
        .and(body_partial_json(json!({ "password_reset_token": null, "password_reset_expires": null })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .expect(1)
        .mount(&server)
        .await;

    let Json(body) = reset_password(
        State(config.clone()),
        Path("fresh".to_string()),
        Json(ResetPasswordRequest {
            password: "a-brand-new-password".to_string(),
        }),
    )
    .await
    .unwrap();

    assert!(validate_token(body["token"].as_str().unwrap(), &config.jwt_secret).is_ok());
}

#[tokio::test]
async fn update_password_requires_the_current_one() {
    let server = MockServer::start().await;
    let caller = TestUser::doctor("doc@clinic.test");
    mount_lookup(
        &server,
        "id",
        format!("eq.{}", caller.id),
        json!([stored_user(caller.id, "doc@clinic.test", Role::Doctor)]),
    )
    .await;

    let result = update_password(
        State(config_for(&server)),
        create_auth_header("token"),
        Extension(caller.to_user()),
        Json(UpdatePasswordRequest {
            password_current: "guess".to_string(),
            password: "a-brand-new-password".to_string(),
        }),
    )
    .await;

    assert_matches!(result, Err(AppError::Auth(_)));
}

// ==============================================================================
// USERS
// ==============================================================================

#[tokio::test]
async fn only_admins_list_users() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("role", "eq.doctor"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Range", "0-0/1")
                .set_body_json(json!([MockSupabaseResponses::user_response(
                    Uuid::new_v4(),
                    "doc@clinic.test",
                    Role::Doctor
                )])),
        )
        .mount(&server)
        .await;

    let query = UserListQuery {
        role: Some(Role::Doctor),
        ..Default::default()
    };

    let denied = list_users(
        State(config_for(&server)),
        create_auth_header("token"),
        Extension(TestUser::doctor("doc@clinic.test").to_user()),
        Query(query.clone()),
    )
    .await;
    assert_matches!(denied, Err(AppError::Forbidden(_)));

    let Json(body) = list_users(
        State(config_for(&server)),
        create_auth_header("token"),
        Extension(TestUser::admin("admin@clinic.test").to_user()),
        Query(query),
    )
    .await
    .unwrap();
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"]["users"][0]["role"], "doctor");
}

#[tokio::test]
async fn deleting_missing_user_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let result = delete_user(
        State(config_for(&server)),
        create_auth_header("token"),
        Extension(TestUser::admin("admin@clinic.test").to_user()),
        Path(Uuid::new_v4()),
    )
    .await;

    assert_matches!(result, Err(AppError::NotFound(_)));
}

#[tokio::test]
async fn me_requires_a_token() {
    let app = auth_routes(TestConfig::default().to_arc());

    let response = app
        .oneshot(Request::builder().uri("/me").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

async fn get_with_token(app: axum::Router, uri: &str, token: &str) -> StatusCode {
    app.oneshot(
        Request::builder()
            .uri(uri)
            .header("Authorization", format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
    .status()
}

#[tokio::test]
async fn token_issued_before_password_change_is_rejected() {
    let server = MockServer::start().await;
    let config = config_for(&server);
    let user = TestUser::doctor("doc@clinic.test");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(1));

    let mut row = MockSupabaseResponses::user_response(user.id, &user.email, Role::Doctor);
    row["password_changed_at"] = json!(Utc::now() + Duration::minutes(5));
    mount_lookup(&server, "id", format!("eq.{}", user.id), json!([row])).await;

    let status = get_with_token(auth_routes(config), "/me", &token).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn token_issued_after_password_change_is_accepted() {
    let server = MockServer::start().await;
    let config = config_for(&server);
    let user = TestUser::doctor("doc@clinic.test");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(1));

    let mut row = MockSupabaseResponses::user_response(user.id, &user.email, Role::Doctor);
    row["password_changed_at"] = json!(Utc::now() - Duration::days(1));
    mount_lookup(&server, "id", format!("eq.{}", user.id), json!([row])).await;

    let status = get_with_token(auth_routes(config), "/me", &token).await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn deactivated_or_deleted_account_loses_access() {
    let server = MockServer::start().await;
    let config = config_for(&server);

    let inactive = TestUser::nurse("gone@clinic.test");
    let mut row = MockSupabaseResponses::user_response(inactive.id, &inactive.email, Role::Nurse);
    row["is_active"] = json!(false);
    mount_lookup(&server, "id", format!("eq.{}", inactive.id), json!([row])).await;

    let missing = TestUser::nurse("missing@clinic.test");
    mount_lookup(&server, "id", format!("eq.{}", missing.id), json!([])).await;

    for user in [inactive, missing] {
        let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(1));
        let status = get_with_token(auth_routes(config.clone()), "/me", &token).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn stored_role_overrides_the_token_claim() {
    let server = MockServer::start().await;
    let config = config_for(&server);
    let demoted = TestUser::admin("former-admin@clinic.test");
    let token = JwtTestUtils::create_test_token(&demoted, &config.jwt_secret, Some(1));

    mount_lookup(
        &server,
        "id",
        format!("eq.{}", demoted.id),
        json!([MockSupabaseResponses::user_response(demoted.id, &demoted.email, Role::Nurse)]),
    )
    .await;

    let status = get_with_token(user_routes(config), "/", &token).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}
