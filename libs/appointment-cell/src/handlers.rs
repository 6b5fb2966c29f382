// libs/appointment-cell/src/handlers.rs
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
    AppointmentListQuery, AvailableSlotsQuery, ConflictCheckQuery, CreateAppointmentRequest,
    UpdateAppointmentRequest,
};
use crate::services::booking::AppointmentService;

fn service(state: &AppConfig) -> Result<AppointmentService, AppError> {
    AppointmentService::new(state).map_err(AppError::from)
}

// ==============================================================================
// READ HANDLERS
// ==============================================================================

pub async fn list_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<AppointmentListQuery>,
) -> Result<Json<Value>, AppError> {
    let page = service(&state)?
        .list_appointments(&query, auth.token())
        .await?;

    Ok(Json(json!({
        "status": "success",
        "results": page.results,
        "total": page.total,
        "page": page.page,
        "pages": page.pages,
        "data": { "appointments": page.appointments }
    })))
}

pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let appointment = service(&state)?
        .get_appointment(appointment_id, auth.token())
        .await?;

    Ok(Json(json!({
        "status": "success",
        "data": { "appointment": appointment }
    })))
}

pub async fn get_available_slots(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<AvailableSlotsQuery>,
) -> Result<Json<Value>, AppError> {
    let (provider_id, date, slots) = service(&state)?
        .available_slots(&query, auth.token())
        .await?;

    Ok(Json(json!({
        "status": "success",
        "data": {
            "provider": provider_id,
            "date": date,
            "all_slots": slots.all,
            "booked_slots": slots.booked,
            "available_slots": slots.available
        }
    })))
}

pub async fn check_conflicts(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<ConflictCheckQuery>,
) -> Result<Json<Value>, AppError> {
    let result = service(&state)?
        .check_conflicts(&query, auth.token())
        .await?;

    Ok(Json(json!({
        "status": "success",
        "data": result
    })))
}

// ==============================================================================
// WRITE HANDLERS
// ==============================================================================

pub async fn create_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_permission(&user, Permission::ManageAppointments)?;

    let appointment = service(&state)?
        .create_appointment(request, user.id, auth.token())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "data": { "appointment": appointment },
            "message": "Appointment booked successfully"
        })),
    ))
}

pub async fn update_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    require_permission(&user, Permission::ManageAppointments)?;

    let appointment = service(&state)?
        .update_appointment(appointment_id, request, user.id, auth.token())
        .await?;

    Ok(Json(json!({
        "status": "success",
        "data": { "appointment": appointment }
    })))
}

pub async fn delete_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_permission(&user, Permission::ManageAppointments)?;

    service(&state)?
        .delete_appointment(appointment_id, user.id, auth.token())
        .await?;

    Ok(Json(json!({
        "status": "success",
        "data": null,
        "message": "Appointment cancelled"
    })))
}
