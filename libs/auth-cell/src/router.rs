use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn auth_routes(state: Arc<AppConfig>) -> Router {
    let public_routes = Router::new()
        .route("/signup", post(handlers::signup))
        .route("/login", post(handlers::login))
        .route("/refresh-token", post(handlers::refresh_token))
        .route("/forgot-password", post(handlers::forgot_password))
        .route("/reset-password/{token}", patch(handlers::reset_password));

    let protected_routes = Router::new()
        .route("/update-password", patch(handlers::update_password))
        .route("/me", get(handlers::me))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

pub fn user_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(handlers::list_users))
        .route(
            "/{id}",
            get(handlers::get_user)
                .patch(handlers::update_user)
                .delete(handlers::delete_user),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
