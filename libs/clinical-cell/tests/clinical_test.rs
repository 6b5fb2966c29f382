use std::sync::Arc;

use assert_matches::assert_matches;
use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use chrono::Utc;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use clinical_cell::handlers::*;
use clinical_cell::models::*;
use shared_config::AppConfig;
use shared_models::error::AppError;
use shared_utils::test_utils::{TestConfig, TestUser};

fn config_for(server: &MockServer) -> Arc<AppConfig> {
    TestConfig::with_supabase_url(server.uri()).to_arc()
}

fn create_auth_header(token: &str) -> TypedHeader<Authorization<Bearer>> {
    TypedHeader(Authorization::bearer(token).unwrap())
}

fn diagnosis_row(id: Uuid, patient_id: Uuid, appointment_id: Uuid, status: &str) -> Value {
    json!({
        "id": id,
        "patient_id": patient_id,
        "diagnosed_by": Uuid::new_v4(),
        "appointment_id": appointment_id,
        "diagnosis_date": "2024-06-01T09:00:00Z",
        "primary_diagnosis": "Hypertension",
        "secondary_diagnoses": [],
        "icd10_codes": ["I10"],
        "symptoms": "Headache",
        "physical_exam": {},
        "vital_signs": { "blood_pressure": "150/95" },
        "severity": "moderate",
        "treatment_plan": { "medications": [], "procedures": [] },
        "follow_up_date": null,
        "status": status,
        "notes": null,
        "is_active": true,
        "created_at": "2024-06-01T09:00:00Z",
        "updated_at": "2024-06-01T09:00:00Z"
    })
}

fn medication_row(id: Uuid, stock_quantity: u32) -> Value {
    json!({
        "id": id,
        "name": "Amoxicillin",
        "description": "Antibiotic",
        "dosage": "500mg",
        "frequency": "3x daily",
        "route": "oral",
        "start_date": "2024-06-01",
        "end_date": null,
        "status": "active",
        "patient_id": Uuid::new_v4(),
        "prescribed_by": Uuid::new_v4(),
        "instructions": null,
        "unit_price": 4.5,
        "currency": "GBP",
        "pack_size": 21,
        "manufacturer": null,
        "batch_number": null,
        "expiry_date": null,
        "stock_quantity": stock_quantity,
        "reorder_level": 10,
        "is_active": true,
        "created_at": "2024-06-01T00:00:00Z",
        "updated_at": "2024-06-01T00:00:00Z"
    })
}

fn prescription_row(id: Uuid, status: &str, refills_remaining: u32, expiration_date: Option<&str>) -> Value {
    json!({
        "id": id,
        "patient_id": Uuid::new_v4(),
        "medication_id": Uuid::new_v4(),
        "prescribed_by": Uuid::new_v4(),
        "date_issued": "2024-06-01T09:00:00Z",
        "quantity": "30 tablets",
        "refills_allowed": 2,
        "refills_remaining": refills_remaining,
        "status": status,
        "instructions": "Once daily",
        "filled_by": null,
        "filled_date": null,
        "expiration_date": expiration_date,
        "created_at": "2024-06-01T09:00:00Z",
        "updated_at": "2024-06-01T09:00:00Z"
    })
}

async fn mount_row(server: &MockServer, table: &str, id: Uuid, row: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/rest/v1/{}", table)))
        .and(query_param("id", format!("eq.{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .mount(server)
        .await;
}

fn diagnosis_request(patient_id: Uuid, appointment_id: Uuid) -> CreateDiagnosisRequest {
    serde_json::from_value(json!({
        "patient_id": patient_id,
        "appointment_id": appointment_id,
        "primary_diagnosis": "Hypertension",
        "symptoms": "Headache",
        "icd10_codes": ["I10"]
    }))
    .unwrap()
}

// ==============================================================================
// DIAGNOSES
// ==============================================================================

#[tokio::test]
async fn diagnosis_is_recorded_by_the_caller() {
    let server = MockServer::start().await;
    let doctor = TestUser::doctor("doc@clinic.test");
    let (patient_id, appointment_id) = (Uuid::new_v4(), Uuid::new_v4());

    mount_row(
        &server,
        "appointments",
        appointment_id,
        json!({ "id": appointment_id, "patient_id": patient_id }),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/diagnoses"))
        .and(body_partial_json(json!({
            "diagnosed_by": doctor.id,
            "severity": "moderate",
            "status": "completed",
            "is_active": true
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([diagnosis_row(
            Uuid::new_v4(),
            patient_id,
            appointment_id,
            "completed"
        )])))
        .expect(1)
        .mount(&server)
        .await;

    let (status, Json(body)) = create_diagnosis(
        State(config_for(&server)),
        create_auth_header("token"),
        Extension(doctor.to_user()),
        Json(diagnosis_request(patient_id, appointment_id)),
    )
    .await
    .unwrap();

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["diagnosis"]["icd10_codes"][0], "I10");
}

#[tokio::test]
async fn diagnosis_for_another_patients_appointment_is_rejected() {
    let server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();
    mount_row(
        &server,
        "appointments",
        appointment_id,
        json!({ "id": appointment_id, "patient_id": Uuid::new_v4() }),
    )
    .await;

    let result = create_diagnosis(
        State(config_for(&server)),
        create_auth_header("token"),
        Extension(TestUser::doctor("doc@clinic.test").to_user()),
        Json(diagnosis_request(Uuid::new_v4(), appointment_id)),
    )
    .await;

    assert_matches!(result, Err(AppError::BadRequest(msg)) if msg.contains("does not belong"));
}

#[tokio::test]
async fn diagnosis_for_missing_appointment_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let result = create_diagnosis(
        State(config_for(&server)),
        create_auth_header("token"),
        Extension(TestUser::admin("admin@clinic.test").to_user()),
        Json(diagnosis_request(Uuid::new_v4(), Uuid::new_v4())),
    )
    .await;

    assert_matches!(result, Err(AppError::NotFound(_)));
}

#[tokio::test]
async fn nurses_cannot_diagnose() {
    let server = MockServer::start().await;

    let result = create_diagnosis(
        State(config_for(&server)),
        create_auth_header("token"),
        Extension(TestUser::nurse("nurse@clinic.test").to_user()),
        Json(diagnosis_request(Uuid::new_v4(), Uuid::new_v4())),
    )
    .await;

    assert_matches!(result, Err(AppError::Forbidden(_)));
}

#[tokio::test]
async fn completed_diagnosis_is_immutable() {
    let server = MockServer::start().await;
    let diagnosis_id = Uuid::new_v4();
    mount_row(
        &server,
        "diagnoses",
        diagnosis_id,
        diagnosis_row(diagnosis_id, Uuid::new_v4(), Uuid::new_v4(), "completed"),
    )
    .await;

    let result = update_diagnosis(
        State(config_for(&server)),
        create_auth_header("token"),
        Extension(TestUser::doctor("doc@clinic.test").to_user()),
        Path(diagnosis_id),
        Json(UpdateDiagnosisRequest {
            notes: Some("amended".to_string()),
            ..Default::default()
        }),
    )
    .await;

    assert_matches!(result, Err(AppError::BadRequest(msg)) if msg == "Cannot update completed diagnosis");
}

#[tokio::test]
async fn pending_diagnosis_can_be_completed() {
    let server = MockServer::start().await;
    let diagnosis_id = Uuid::new_v4();
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/diagnoses"))
        .and(body_partial_json(json!({ "status": "completed" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([diagnosis_row(
            diagnosis_id,
            Uuid::new_v4(),
            Uuid::new_v4(),
            "completed"
        )])))
        .expect(1)
        .mount(&server)
        .await;

    let Json(body) = complete_diagnosis(
        State(config_for(&server)),
        create_auth_header("token"),
        Extension(TestUser::doctor("doc@clinic.test").to_user()),
        Path(diagnosis_id),
    )
    .await
    .unwrap();

    assert_eq!(body["data"]["diagnosis"]["status"], "completed");
}

// ==============================================================================
// MEDICATIONS
// ==============================================================================

#[tokio::test]
async fn medication_list_flags_low_stock() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/medications"))
        .and(query_param("is_active", "eq.true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            medication_row(Uuid::new_v4(), 3),
            medication_row(Uuid::new_v4(), 50)
        ])))
        .mount(&server)
        .await;

    let query = MedicationQuery {
        needs_reorder: Some(true),
        ..Default::default()
    };
    let Json(body) = list_medications(State(config_for(&server)), create_auth_header("token"), Query(query))
        .await
        .unwrap();

    assert_eq!(body["results"], 1);
    assert_eq!(body["data"]["medications"][0]["stock_quantity"], 3);
    assert_eq!(body["data"]["medications"][0]["needs_reorder"], true);
}

#[tokio::test]
async fn pharmacist_may_delete_but_not_create_medication() {
    let server = MockServer::start().await;
    let medication_id = Uuid::new_v4();
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/medications"))
        .and(body_partial_json(json!({ "is_active": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([medication_row(medication_id, 0)])))
        .expect(1)
        .mount(&server)
        .await;

    let pharmacist = TestUser::pharmacist("rx@clinic.test").to_user();
    let request: CreateMedicationRequest = serde_json::from_value(json!({
        "name": "Amoxicillin",
        "description": "Antibiotic",
        "dosage": "500mg",
        "frequency": "3x daily",
        "route": "oral",
        "start_date": "2024-06-01",
        "patient_id": Uuid::new_v4(),
        "unit_price": 4.5
    }))
    .unwrap();

    let denied = create_medication(
        State(config_for(&server)),
        create_auth_header("token"),
        Extension(pharmacist.clone()),
        Json(request),
    )
    .await;
    assert_matches!(denied, Err(AppError::Forbidden(_)));

    let status = delete_medication(
        State(config_for(&server)),
        create_auth_header("token"),
        Extension(pharmacist),
        Path(medication_id),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);
}

// ==============================================================================
// PRESCRIPTIONS
// ==============================================================================

#[tokio::test]
async fn pharmacist_fills_pending_prescription() {
    let server = MockServer::start().await;
    let prescription_id = Uuid::new_v4();
    mount_row(&server, "prescriptions", prescription_id, prescription_row(prescription_id, "pending", 2, None)).await;

    let mut filled = prescription_row(prescription_id, "filled", 2, None);
    filled["filled_by"] = json!("pharmacy-7");
    filled["filled_date"] = json!(Utc::now());
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/prescriptions"))
        .and(body_partial_json(json!({ "status": "filled", "filled_by": "pharmacy-7" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([filled])))
        .expect(1)
        .mount(&server)
        .await;

    let Json(body) = fill_prescription(
        State(config_for(&server)),
        create_auth_header("token"),
        Extension(TestUser::pharmacist("rx@clinic.test").to_user()),
        Path(prescription_id),
        Json(FillPrescriptionRequest {
            pharmacy_id: Some("pharmacy-7".to_string()),
        }),
    )
    .await
    .unwrap();

    assert_eq!(body["data"]["prescription"]["status"], "filled");
}

#[tokio::test]
async fn fill_without_pharmacy_is_rejected() {
    let server = MockServer::start().await;
    let prescription_id = Uuid::new_v4();
    mount_row(&server, "prescriptions", prescription_id, prescription_row(prescription_id, "pending", 2, None)).await;

    let result = fill_prescription(
        State(config_for(&server)),
        create_auth_header("token"),
        Extension(TestUser::pharmacist("rx@clinic.test").to_user()),
        Path(prescription_id),
        Json(FillPrescriptionRequest::default()),
    )
    .await;

    assert_matches!(result, Err(AppError::BadRequest(msg)) if msg == "Please provide a pharmacy ID");
}

#[tokio::test]
async fn doctors_cannot_dispense() {
    let server = MockServer::start().await;

    let result = refill_prescription(
        State(config_for(&server)),
        create_auth_header("token"),
        Extension(TestUser::doctor("doc@clinic.test").to_user()),
        Path(Uuid::new_v4()),
    )
    .await;

    assert_matches!(result, Err(AppError::Forbidden(_)));
}

#[tokio::test]
async fn refill_decrements_the_remaining_count() {
    let server = MockServer::start().await;
    let prescription_id = Uuid::new_v4();
    mount_row(&server, "prescriptions", prescription_id, prescription_row(prescription_id, "filled", 2, None)).await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/prescriptions"))
        .and(query_param("refills_remaining", "eq.2"))
        .and(body_partial_json(json!({ "status": "refilled", "refills_remaining": 1 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([prescription_row(
            prescription_id,
            "refilled",
            1,
            None
        )])))
        .expect(1)
        .mount(&server)
        .await;

    let Json(body) = refill_prescription(
        State(config_for(&server)),
        create_auth_header("token"),
        Extension(TestUser::admin("admin@clinic.test").to_user()),
        Path(prescription_id),
    )
    .await
    .unwrap();

    assert_eq!(body["data"]["prescription"]["refills_remaining"], 1);
}

#[tokio::test]
async fn refill_that_loses_a_race_is_a_conflict() {
    let server = MockServer::start().await;
    let prescription_id = Uuid::new_v4();
    mount_row(&server, "prescriptions", prescription_id, prescription_row(prescription_id, "filled", 1, None)).await;
    // Another refill already consumed the last one, so the guarded update matches nothing
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/prescriptions"))
        .and(query_param("refills_remaining", "eq.1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let result = refill_prescription(
        State(config_for(&server)),
        create_auth_header("token"),
        Extension(TestUser::pharmacist("rx@clinic.test").to_user()),
        Path(prescription_id),
    )
    .await;

    assert_matches!(result, Err(AppError::Conflict(_)));
}

#[tokio::test]
async fn expired_prescription_cannot_be_refilled() {
    let server = MockServer::start().await;
    let prescription_id = Uuid::new_v4();
    mount_row(
        &server,
        "prescriptions",
        prescription_id,
        prescription_row(prescription_id, "filled", 2, Some("2020-01-01")),
    )
    .await;

    let result = refill_prescription(
        State(config_for(&server)),
        create_auth_header("token"),
        Extension(TestUser::pharmacist("rx@clinic.test").to_user()),
        Path(prescription_id),
    )
    .await;

    assert_matches!(result, Err(AppError::BadRequest(msg)) if msg == "This prescription has expired");
}

#[tokio::test]
async fn new_prescription_starts_pending_with_all_refills() {
    let server = MockServer::start().await;
    let medication_id = Uuid::new_v4();
    let prescription_id = Uuid::new_v4();
    mount_row(&server, "medications", medication_id, medication_row(medication_id, 40)).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/prescriptions"))
        .and(body_partial_json(json!({
            "status": "pending",
            "refills_allowed": 2,
            "refills_remaining": 2
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([prescription_row(
            prescription_id,
            "pending",
            2,
            None
        )])))
        .expect(1)
        .mount(&server)
        .await;

    let request: CreatePrescriptionRequest = serde_json::from_value(json!({
        "patient_id": Uuid::new_v4(),
        "medication_id": medication_id,
        "quantity": "30 tablets",
        "refills_allowed": 2,
        "instructions": "Once daily"
    }))
    .unwrap();

    let (status, _) = create_prescription(
        State(config_for(&server)),
        create_auth_header("token"),
        Extension(TestUser::doctor("doc@clinic.test").to_user()),
        Json(request),
    )
    .await
    .unwrap();

    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn deleting_missing_prescription_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/prescriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let result = delete_prescription(
        State(config_for(&server)),
        create_auth_header("token"),
        Extension(TestUser::admin("admin@clinic.test").to_user()),
        Path(Uuid::new_v4()),
    )
    .await;

    assert_matches!(result, Err(AppError::NotFound(_)));
}
