use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;

pub fn invoice_routes(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(list_invoices).post(create_invoice))
        .route("/stats", get(get_invoice_stats))
        .route("/status/{status}", get(get_invoices_by_status))
        .route("/patient/{patient_id}", get(get_patient_invoices))
        .route("/{id}", get(get_invoice).patch(update_invoice).delete(delete_invoice))
        .route("/{id}/payment", patch(process_payment))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
        .with_state(config)
}
