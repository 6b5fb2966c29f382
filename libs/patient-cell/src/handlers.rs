use std::sync::Arc;
use axum::{
    extract::{Path, Query, State, Extension},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Permission, User};
use shared_models::error::AppError;
use shared_utils::extractor::require_permission;

use crate::models::{CreatePatientRequest, UpdatePatientRequest, PatientSearchQuery};
use crate::services::PatientService;

pub async fn search_patients(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<PatientSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let service = PatientService::new(&config);
    let (page, limit) = query.pagination();

    let (patients, total) = service.search_patients(&query, auth.token()).await?;

    Ok(Json(json!({
        "status": "success",
        "results": patients.len(),
        "total": total,
        "page": page,
        "pages": total.div_ceil(limit as u64),
        "data": { "patients": patients }
    })))
}

pub async fn get_patient(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = PatientService::new(&config);

    let patient = service.get_patient(patient_id, auth.token()).await?;

    Ok(Json(json!({
        "status": "success",
        "data": { "patient": patient }
    })))
}

pub async fn create_patient(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreatePatientRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_permission(&user, Permission::ManagePatients)?;
    let service = PatientService::new(&config);

    let patient = service.create_patient(request, auth.token()).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "data": { "patient": patient }
        })),
    ))
}

pub async fn update_patient(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
    Json(request): Json<UpdatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    require_permission(&user, Permission::ManagePatients)?;
    let service = PatientService::new(&config);

    let patient = service.update_patient(patient_id, request, auth.token()).await?;

    Ok(Json(json!({
        "status": "success",
        "data": { "patient": patient }
    })))
}

pub async fn delete_patient(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_permission(&user, Permission::DeletePatients)?;
    let service = PatientService::new(&config);

    service.deactivate_patient(patient_id, auth.token()).await?;

    Ok(Json(json!({
        "status": "success",
        "data": null
    })))
}
