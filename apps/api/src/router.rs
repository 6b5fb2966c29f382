use std::sync::Arc;

use axum::{
    Json, Router,
    routing::get,
};
use serde_json::{json, Value};

use appointment_cell::appointment_routes;
use auth_cell::{auth_routes, user_routes};
use billing_cell::invoice_routes;
use clinical_cell::{diagnosis_routes, medication_routes, prescription_routes};
use patient_cell::patient_routes;
use shared_config::AppConfig;

async fn health(configured: bool) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "configured": configured,
    }))
}

pub fn create_router(state: Arc<AppConfig>) -> Router {
    let configured = state.is_configured();

    let api = Router::new()
        .nest("/auth", auth_routes(state.clone()))
        .nest("/users", user_routes(state.clone()))
        .nest("/patients", patient_routes(state.clone()))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/diagnoses", diagnosis_routes(state.clone()))
        .nest("/medications", medication_routes(state.clone()))
        .nest("/prescriptions", prescription_routes(state.clone()))
        .nest("/invoices", invoice_routes(state));

    Router::new()
        .route("/", get(|| async { "MediHeal API is running!" }))
        .route("/health", get(move || health(configured)))
        .nest("/api", api)
}
