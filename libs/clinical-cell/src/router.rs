use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;

pub fn diagnosis_routes(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(list_diagnoses).post(create_diagnosis))
        .route("/patient/{patient_id}", get(get_patient_diagnoses))
        .route("/appointment/{appointment_id}", get(get_appointment_diagnoses))
        .route("/{id}", get(get_diagnosis).patch(update_diagnosis).delete(delete_diagnosis))
        .route("/{id}/complete", patch(complete_diagnosis))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
        .with_state(config)
}

pub fn medication_routes(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(list_medications).post(create_medication))
        .route("/{id}", get(get_medication).patch(update_medication).delete(delete_medication))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
        .with_state(config)
}

pub fn prescription_routes(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(list_prescriptions).post(create_prescription))
        .route("/patient/{patient_id}", get(get_patient_prescriptions))
        .route(
            "/{id}",
            get(get_prescription)
                .put(update_prescription)
                .patch(update_prescription)
                .delete(delete_prescription),
        )
        .route("/{id}/fill", post(fill_prescription))
        .route("/{id}/refill", post(refill_prescription))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
        .with_state(config)
}
