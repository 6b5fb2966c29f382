use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Permission, User};
use shared_models::error::AppError;
use shared_utils::extractor::require_permission;

use crate::models::{
    AuthResponse, ForgotPasswordRequest, LoginRequest, RefreshTokenRequest, ResetPasswordRequest,
    SignupRequest, UpdatePasswordRequest, UpdateUserRequest, UserListQuery,
};
use crate::services::{AuthService, UserService};

fn session_body(session: AuthResponse) -> Json<Value> {
    Json(json!({
        "status": "success",
        "token": session.token,
        "refresh_token": session.refresh_token,
        "data": { "user": session.user }
    }))
}

// ==============================================================================
// AUTH
// ==============================================================================

pub async fn signup(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<SignupRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = AuthService::new(&config);
    let session = service.signup(request).await?;
    Ok((StatusCode::CREATED, session_body(session)))
}

pub async fn login(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AuthService::new(&config);
    let session = service.login(request).await?;
    Ok(session_body(session))
}

pub async fn refresh_token(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<RefreshTokenRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AuthService::new(&config);
    let session = service.refresh(request.refresh_token.as_deref()).await?;
    Ok(session_body(session))
}

pub async fn forgot_password(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AuthService::new(&config);

    // Mail delivery is not wired up; the raw token is never echoed back.
    service.forgot_password(&request.email).await?;

    Ok(Json(json!({
        "status": "success",
        "message": "Token sent to email!"
    })))
}

pub async fn reset_password(
    State(config): State<Arc<AppConfig>>,
    Path(token): Path<String>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AuthService::new(&config);
    let session = service.reset_password(&token, &request.password).await?;
    Ok(session_body(session))
}

pub async fn update_password(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdatePasswordRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AuthService::new(&config);

    service
        .update_password(user.id, &request.password_current, &request.password, auth.token())
        .await?;

    Ok(Json(json!({
        "status": "success",
        "message": "Password updated. Please log in again."
    })))
}

pub async fn me(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = AuthService::new(&config);
    let account = service.me(user.id, auth.token()).await?;

    Ok(Json(json!({
        "status": "success",
        "data": { "user": account }
    })))
}

// ==============================================================================
// USER ADMINISTRATION
// ==============================================================================

pub async fn list_users(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Value>, AppError> {
    require_permission(&user, Permission::ManageUsers)?;
    let service = UserService::new(&config);
    let (page, limit) = query.pagination();

    let (users, total) = service.list_users(&query, auth.token()).await?;

    Ok(Json(json!({
        "status": "success",
        "results": users.len(),
        "total": total,
        "page": page,
        "pages": total.div_ceil(limit as u64),
        "data": { "users": users }
    })))
}

pub async fn get_user(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_permission(&user, Permission::ManageUsers)?;
    let service = UserService::new(&config);

    let account = service.get_user(user_id, auth.token()).await?;

    Ok(Json(json!({
        "status": "success",
        "data": { "user": account }
    })))
}

pub async fn update_user(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<Value>, AppError> {
    require_permission(&user, Permission::ManageUsers)?;
    let service = UserService::new(&config);

    let account = service.update_user(user_id, request, auth.token()).await?;

    Ok(Json(json!({
        "status": "success",
        "data": { "user": account }
    })))
}

pub async fn delete_user(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_permission(&user, Permission::ManageUsers)?;
    let service = UserService::new(&config);

    service.deactivate_user(user_id, auth.token()).await?;

    Ok(Json(json!({
        "status": "success",
        "data": null
    })))
}
