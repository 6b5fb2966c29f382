use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::error::required;
use crate::models::{
    AppointmentRef, ClinicalError, CreateDiagnosisRequest, Diagnosis, DiagnosisStatus, NewDiagnosis,
    UpdateDiagnosisRequest,
};

pub struct DiagnosisService {
    supabase: SupabaseClient,
}

impl DiagnosisService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    // ==============================================================================
    // QUERIES
    // ==============================================================================

    pub async fn list_diagnoses(&self, auth_token: &str) -> Result<Vec<Diagnosis>, ClinicalError> {
        self.select_many("is_active=eq.true&order=created_at.desc", auth_token).await
    }

    pub async fn diagnoses_for_patient(&self, patient_id: Uuid, auth_token: &str) -> Result<Vec<Diagnosis>, ClinicalError> {
        let filter = format!("patient_id=eq.{}&is_active=eq.true&order=diagnosis_date.desc", patient_id);
        self.select_many(&filter, auth_token).await
    }

    pub async fn diagnoses_for_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Diagnosis>, ClinicalError> {
        let filter = format!("appointment_id=eq.{}&is_active=eq.true", appointment_id);
        self.select_many(&filter, auth_token).await
    }

    pub async fn get_diagnosis(&self, diagnosis_id: Uuid, auth_token: &str) -> Result<Diagnosis, ClinicalError> {
        self.supabase
            .select_one("diagnoses", &format!("id=eq.{}", diagnosis_id), auth_token)
            .await
            .map_err(ClinicalError::database)?
            .ok_or(ClinicalError::DiagnosisNotFound)
    }

    // ==============================================================================
    // COMMANDS
    // ==============================================================================

    pub async fn create_diagnosis(
        &self,
        request: CreateDiagnosisRequest,
        diagnosed_by: Uuid,
        auth_token: &str,
    ) -> Result<Diagnosis, ClinicalError> {
        let primary_diagnosis = required("primary_diagnosis", &request.primary_diagnosis)?;
        let symptoms = required("symptoms", &request.symptoms)?;

        let appointment: AppointmentRef = self
            .supabase
            .select_one(
                "appointments",
                &format!("id=eq.{}&select=id,patient_id", request.appointment_id),
                auth_token,
            )
            .await
            .map_err(ClinicalError::database)?
            .ok_or(ClinicalError::AppointmentNotFound)?;

        if appointment.patient_id != request.patient_id {
            warn!(
                "Diagnosis rejected: appointment {} belongs to another patient",
                appointment.id
            );
            return Err(ClinicalError::AppointmentPatientMismatch);
        }

        let diagnosis = NewDiagnosis {
            patient_id: request.patient_id,
            diagnosed_by,
            appointment_id: appointment.id,
            diagnosis_date: request.diagnosis_date.unwrap_or_else(Utc::now),
            primary_diagnosis,
            secondary_diagnoses: request.secondary_diagnoses,
            icd10_codes: request.icd10_codes,
            symptoms,
            physical_exam: request.physical_exam,
            vital_signs: request.vital_signs,
            severity: request.severity,
            treatment_plan: request.treatment_plan,
            follow_up_date: request.follow_up_date,
            status: request.status.unwrap_or_default(),
            notes: request.notes,
            is_active: true,
        };
        let body = serde_json::to_value(&diagnosis).map_err(ClinicalError::database)?;

        let created: Diagnosis = self
            .supabase
            .insert("diagnoses", auth_token, body)
            .await
            .map_err(ClinicalError::database)?;

        info!("Diagnosis {} recorded for patient {}", created.id, created.patient_id);
        Ok(created)
    }

    pub async fn update_diagnosis(
        &self,
        diagnosis_id: Uuid,
        mut request: UpdateDiagnosisRequest,
        auth_token: &str,
    ) -> Result<Diagnosis, ClinicalError> {
        let current = self.get_diagnosis(diagnosis_id, auth_token).await?;
        if current.is_completed() {
            return Err(ClinicalError::DiagnosisCompleted);
        }

        if let Some(text) = &request.primary_diagnosis {
            request.primary_diagnosis = Some(required("primary_diagnosis", text)?);
        }
        if let Some(text) = &request.symptoms {
            request.symptoms = Some(required("symptoms", text)?);
        }

        let body = serde_json::to_value(&request).map_err(ClinicalError::database)?;
        self.patch(diagnosis_id, body, auth_token).await
    }

    pub async fn complete_diagnosis(&self, diagnosis_id: Uuid, auth_token: &str) -> Result<Diagnosis, ClinicalError> {
        let body = json!({ "status": DiagnosisStatus::Completed });
        let diagnosis = self.patch(diagnosis_id, body, auth_token).await?;

        info!("Diagnosis {} completed", diagnosis_id);
        Ok(diagnosis)
    }

    pub async fn deactivate_diagnosis(&self, diagnosis_id: Uuid, auth_token: &str) -> Result<(), ClinicalError> {
        self.patch(diagnosis_id, json!({ "is_active": false }), auth_token).await?;
        info!("Diagnosis {} deactivated", diagnosis_id);
        Ok(())
    }

    async fn patch(&self, diagnosis_id: Uuid, mut body: Value, auth_token: &str) -> Result<Diagnosis, ClinicalError> {
        if let Value::Object(map) = &mut body {
            map.insert("updated_at".to_string(), json!(Utc::now()));
        }

        self.supabase
            .update("diagnoses", &format!("id=eq.{}", diagnosis_id), auth_token, body)
            .await
            .map_err(ClinicalError::database)?
            .ok_or(ClinicalError::DiagnosisNotFound)
    }

    async fn select_many(&self, filter: &str, auth_token: &str) -> Result<Vec<Diagnosis>, ClinicalError> {
        let path = format!("/rest/v1/diagnoses?{}", filter);
        debug!("Fetching diagnoses: {}", path);

        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(ClinicalError::database)
    }
}
