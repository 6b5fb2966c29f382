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
    CreateDiagnosisRequest, CreateMedicationRequest, CreatePrescriptionRequest, FillPrescriptionRequest,
    MedicationQuery, MedicationView, UpdateDiagnosisRequest, UpdateMedicationRequest,
    UpdatePrescriptionRequest,
};
use crate::services::{DiagnosisService, MedicationService, PrescriptionService};

fn collection<T: serde::Serialize>(key: &str, items: Vec<T>) -> Json<Value> {
    Json(json!({
        "status": "success",
        "results": items.len(),
        "data": { key: items }
    }))
}

fn single<T: serde::Serialize>(key: &str, item: T) -> Json<Value> {
    Json(json!({
        "status": "success",
        "data": { key: item }
    }))
}

// ==============================================================================
// DIAGNOSES
// ==============================================================================

pub async fn list_diagnoses(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let diagnoses = DiagnosisService::new(&config).list_diagnoses(auth.token()).await?;
    Ok(collection("diagnoses", diagnoses))
}

pub async fn get_patient_diagnoses(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let diagnoses = DiagnosisService::new(&config)
        .diagnoses_for_patient(patient_id, auth.token())
        .await?;
    Ok(collection("diagnoses", diagnoses))
}

pub async fn get_appointment_diagnoses(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let diagnoses = DiagnosisService::new(&config)
        .diagnoses_for_appointment(appointment_id, auth.token())
        .await?;
    Ok(collection("diagnoses", diagnoses))
}

pub async fn get_diagnosis(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(diagnosis_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let diagnosis = DiagnosisService::new(&config)
        .get_diagnosis(diagnosis_id, auth.token())
        .await?;
    Ok(single("diagnosis", diagnosis))
}

pub async fn create_diagnosis(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateDiagnosisRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_permission(&user, Permission::ManageDiagnoses)?;

    let diagnosis = DiagnosisService::new(&config)
        .create_diagnosis(request, user.id, auth.token())
        .await?;
    Ok((StatusCode::CREATED, single("diagnosis", diagnosis)))
}

pub async fn update_diagnosis(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(diagnosis_id): Path<Uuid>,
    Json(request): Json<UpdateDiagnosisRequest>,
) -> Result<Json<Value>, AppError> {
    require_permission(&user, Permission::ManageDiagnoses)?;

    let diagnosis = DiagnosisService::new(&config)
        .update_diagnosis(diagnosis_id, request, auth.token())
        .await?;
    Ok(single("diagnosis", diagnosis))
}

pub async fn complete_diagnosis(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(diagnosis_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_permission(&user, Permission::ManageDiagnoses)?;

    let diagnosis = DiagnosisService::new(&config)
        .complete_diagnosis(diagnosis_id, auth.token())
        .await?;
    Ok(single("diagnosis", diagnosis))
}

pub async fn delete_diagnosis(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(diagnosis_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_permission(&user, Permission::ManageDiagnoses)?;

    DiagnosisService::new(&config)
        .deactivate_diagnosis(diagnosis_id, auth.token())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ==============================================================================
// MEDICATIONS
// ==============================================================================

pub async fn list_medications(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<MedicationQuery>,
) -> Result<Json<Value>, AppError> {
    let medications = MedicationService::new(&config)
        .list_medications(&query, auth.token())
        .await?;
    let views: Vec<MedicationView> = medications.into_iter().map(MedicationView::from).collect();
    Ok(collection("medications", views))
}

pub async fn get_medication(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(medication_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let medication = MedicationService::new(&config)
        .get_medication(medication_id, auth.token())
        .await?;
    Ok(single("medication", MedicationView::from(medication)))
}

pub async fn create_medication(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateMedicationRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_permission(&user, Permission::ManageMedications)?;

    let medication = MedicationService::new(&config)
        .create_medication(request, user.id, auth.token())
        .await?;
    Ok((StatusCode::CREATED, single("medication", MedicationView::from(medication))))
}

pub async fn update_medication(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(medication_id): Path<Uuid>,
    Json(request): Json<UpdateMedicationRequest>,
) -> Result<Json<Value>, AppError> {
    require_permission(&user, Permission::ManageMedications)?;

    let medication = MedicationService::new(&config)
        .update_medication(medication_id, request, auth.token())
        .await?;
    Ok(single("medication", MedicationView::from(medication)))
}

pub async fn delete_medication(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(medication_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_permission(&user, Permission::DeleteMedications)?;

    MedicationService::new(&config)
        .deactivate_medication(medication_id, auth.token())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ==============================================================================
// PRESCRIPTIONS
// ==============================================================================

pub async fn list_prescriptions(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let prescriptions = PrescriptionService::new(&config)
        .list_prescriptions(auth.token())
        .await?;
    Ok(collection("prescriptions", prescriptions))
}

pub async fn get_patient_prescriptions(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let prescriptions = PrescriptionService::new(&config)
        .prescriptions_for_patient(patient_id, auth.token())
        .await?;
    Ok(collection("prescriptions", prescriptions))
}

pub async fn get_prescription(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(prescription_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let prescription = PrescriptionService::new(&config)
        .get_prescription(prescription_id, auth.token())
        .await?;
    Ok(single("prescription", prescription))
}

pub async fn create_prescription(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreatePrescriptionRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_permission(&user, Permission::IssuePrescriptions)?;

    let prescription = PrescriptionService::new(&config)
        .create_prescription(request, user.id, auth.token())
        .await?;
    Ok((StatusCode::CREATED, single("prescription", prescription)))
}

pub async fn update_prescription(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(prescription_id): Path<Uuid>,
    Json(request): Json<UpdatePrescriptionRequest>,
) -> Result<Json<Value>, AppError> {
    require_permission(&user, Permission::UpdatePrescriptions)?;

    let prescription = PrescriptionService::new(&config)
        .update_prescription(prescription_id, request, auth.token())
        .await?;
    Ok(single("prescription", prescription))
}

pub async fn delete_prescription(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(prescription_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_permission(&user, Permission::DeletePrescriptions)?;

    PrescriptionService::new(&config)
        .delete_prescription(prescription_id, auth.token())
        .await?;
    Ok(Json(json!({ "status": "success", "data": null })))
}

pub async fn fill_prescription(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(prescription_id): Path<Uuid>,
    Json(request): Json<FillPrescriptionRequest>,
) -> Result<Json<Value>, AppError> {
    require_permission(&user, Permission::DispensePrescriptions)?;

    let prescription = PrescriptionService::new(&config)
        .fill_prescription(prescription_id, request.pharmacy_id.as_deref(), auth.token())
        .await?;
    Ok(single("prescription", prescription))
}

pub async fn refill_prescription(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(prescription_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_permission(&user, Permission::DispensePrescriptions)?;

    let prescription = PrescriptionService::new(&config)
        .refill_prescription(prescription_id, auth.token())
        .await?;
    Ok(single("prescription", prescription))
}
