use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
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

use crate::models::{CreateInvoiceRequest, Invoice, InvoiceStatus, PaymentRequest, UpdateInvoiceRequest};
use crate::services::InvoiceService;

fn invoice_list(invoices: Vec<Invoice>) -> Json<Value> {
    Json(json!({
        "status": "success",
        "results": invoices.len(),
        "data": { "invoices": invoices }
    }))
}

fn invoice_body(invoice: Invoice) -> Json<Value> {
    Json(json!({
        "status": "success",
        "data": { "invoice": invoice }
    }))
}

pub async fn list_invoices(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let invoices = InvoiceService::new(&config).list_invoices(auth.token()).await?;
    Ok(invoice_list(invoices))
}

pub async fn get_patient_invoices(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let invoices = InvoiceService::new(&config)
        .invoices_for_patient(patient_id, auth.token())
        .await?;
    Ok(invoice_list(invoices))
}

pub async fn get_invoices_by_status(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(status): Path<InvoiceStatus>,
) -> Result<Json<Value>, AppError> {
    let invoices = InvoiceService::new(&config)
        .invoices_by_status(status, auth.token())
        .await?;
    Ok(invoice_list(invoices))
}

pub async fn get_invoice(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let invoice = InvoiceService::new(&config)
        .get_invoice(invoice_id, auth.token())
        .await?;
    Ok(invoice_body(invoice))
}

pub async fn get_invoice_stats(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_permission(&user, Permission::ViewInvoiceStats)?;

    let stats = InvoiceService::new(&config).invoice_stats(auth.token()).await?;
    Ok(Json(json!({
        "status": "success",
        "data": stats
    })))
}

pub async fn create_invoice(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_permission(&user, Permission::ManageInvoices)?;

    let invoice = InvoiceService::new(&config)
        .create_invoice(request, user.id, auth.token())
        .await?;
    Ok((StatusCode::CREATED, invoice_body(invoice)))
}

pub async fn update_invoice(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(invoice_id): Path<Uuid>,
    Json(request): Json<UpdateInvoiceRequest>,
) -> Result<Json<Value>, AppError> {
    require_permission(&user, Permission::ManageInvoices)?;

    let invoice = InvoiceService::new(&config)
        .update_invoice(invoice_id, request, auth.token())
        .await?;
    Ok(invoice_body(invoice))
}

pub async fn process_payment(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(invoice_id): Path<Uuid>,
    Json(request): Json<PaymentRequest>,
) -> Result<Json<Value>, AppError> {
    require_permission(&user, Permission::ManageInvoices)?;

    let invoice = InvoiceService::new(&config)
        .record_payment(invoice_id, request, auth.token())
        .await?;
    Ok(invoice_body(invoice))
}

pub async fn delete_invoice(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(invoice_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_permission(&user, Permission::DeleteInvoices)?;

    InvoiceService::new(&config)
        .deactivate_invoice(invoice_id, auth.token())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
