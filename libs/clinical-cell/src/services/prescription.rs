use chrono::Utc;
use reqwest::Method;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::error::required;
use crate::models::{
    ClinicalError, CreatePrescriptionRequest, Medication, NewPrescription, Prescription,
    PrescriptionStatus, UpdatePrescriptionRequest,
};

pub struct PrescriptionService {
    supabase: SupabaseClient,
}

impl PrescriptionService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn list_prescriptions(&self, auth_token: &str) -> Result<Vec<Prescription>, ClinicalError> {
        self.select_many("order=date_issued.desc", auth_token).await
    }

    pub async fn prescriptions_for_patient(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Prescription>, ClinicalError> {
        let filter = format!("patient_id=eq.{}&order=date_issued.desc", patient_id);
        self.select_many(&filter, auth_token).await
    }

    pub async fn get_prescription(&self, prescription_id: Uuid, auth_token: &str) -> Result<Prescription, ClinicalError> {
        self.supabase
            .select_one("prescriptions", &format!("id=eq.{}", prescription_id), auth_token)
            .await
            .map_err(ClinicalError::database)?
            .ok_or(ClinicalError::PrescriptionNotFound)
    }

    pub async fn create_prescription(
        &self,
        request: CreatePrescriptionRequest,
        issued_by: Uuid,
        auth_token: &str,
    ) -> Result<Prescription, ClinicalError> {
        let quantity = required("quantity", &request.quantity)?;
        let instructions = required("instructions", &request.instructions)?;

        let medication: Option<Medication> = self
            .supabase
            .select_one(
                "medications",
                &format!("id=eq.{}&is_active=eq.true", request.medication_id),
                auth_token,
            )
            .await
            .map_err(ClinicalError::database)?;
        medication.ok_or(ClinicalError::MedicationNotFound)?;

        let prescription = NewPrescription {
            patient_id: request.patient_id,
            medication_id: request.medication_id,
            prescribed_by: request.prescribed_by.unwrap_or(issued_by),
            date_issued: request.date_issued.unwrap_or_else(Utc::now),
            quantity,
            refills_allowed: request.refills_allowed,
            refills_remaining: request.refills_allowed,
            status: PrescriptionStatus::Pending,
            instructions,
            expiration_date: request.expiration_date,
        };
        let body = serde_json::to_value(&prescription).map_err(ClinicalError::database)?;

        let created: Prescription = self
            .supabase
            .insert("prescriptions", auth_token, body)
            .await
            .map_err(ClinicalError::database)?;

        info!("Prescription {} issued for patient {}", created.id, created.patient_id);
        Ok(created)
    }

    pub async fn update_prescription(
        &self,
        prescription_id: Uuid,
        mut request: UpdatePrescriptionRequest,
        auth_token: &str,
    ) -> Result<Prescription, ClinicalError> {
        let current = self.get_prescription(prescription_id, auth_token).await?;
        request.reconcile_refills(&current)?;

        if let Some(text) = &request.quantity {
            request.quantity = Some(required("quantity", text)?);
        }
        if let Some(text) = &request.instructions {
            request.instructions = Some(required("instructions", text)?);
        }

        self.persist(prescription_id, &request, auth_token).await
    }

    pub async fn fill_prescription(
        &self,
        prescription_id: Uuid,
        pharmacy_id: Option<&str>,
        auth_token: &str,
    ) -> Result<Prescription, ClinicalError> {
        let current = self.get_prescription(prescription_id, auth_token).await?;

        let update = current.fill(pharmacy_id, Utc::now()).inspect_err(|e| {
            warn!("Fill of prescription {} rejected: {}", prescription_id, e);
        })?;
        let filled = self.persist(prescription_id, &update, auth_token).await?;

        info!("Prescription {} filled", prescription_id);
        Ok(filled)
    }

    pub async fn refill_prescription(&self, prescription_id: Uuid, auth_token: &str) -> Result<Prescription, ClinicalError> {
        let current = self.get_prescription(prescription_id, auth_token).await?;

        let update = current.refill(Utc::now().date_naive()).inspect_err(|e| {
            warn!("Refill of prescription {} rejected: {}", prescription_id, e);
        })?;
        // Only applies while the count is still the one the refill was computed from
        let filter = format!(
            "id=eq.{}&refills_remaining=eq.{}",
            prescription_id, current.refills_remaining
        );
        let refilled = self
            .persist_where(&filter, &update, auth_token)
            .await?
            .ok_or_else(|| {
                warn!("Refill of prescription {} lost a race with another refill", prescription_id);
                ClinicalError::RefillConflict
            })?;

        info!(
            "Prescription {} refilled, {} refills remaining",
            prescription_id, refilled.refills_remaining
        );
        Ok(refilled)
    }

    pub async fn delete_prescription(&self, prescription_id: Uuid, auth_token: &str) -> Result<(), ClinicalError> {
        let deleted: Option<Prescription> = self
            .supabase
            .delete("prescriptions", &format!("id=eq.{}", prescription_id), auth_token)
            .await
            .map_err(ClinicalError::database)?;

        deleted.ok_or(ClinicalError::PrescriptionNotFound)?;
        info!("Prescription {} deleted", prescription_id);
        Ok(())
    }

    async fn persist<T: Serialize>(
        &self,
        prescription_id: Uuid,
        changes: &T,
        auth_token: &str,
    ) -> Result<Prescription, ClinicalError> {
        self.persist_where(&format!("id=eq.{}", prescription_id), changes, auth_token)
            .await?
            .ok_or(ClinicalError::PrescriptionNotFound)
    }

    async fn persist_where<T: Serialize>(
        &self,
        filter: &str,
        changes: &T,
        auth_token: &str,
    ) -> Result<Option<Prescription>, ClinicalError> {
        let mut body = serde_json::to_value(changes).map_err(ClinicalError::database)?;
        if let Value::Object(map) = &mut body {
            map.insert("updated_at".to_string(), json!(Utc::now()));
        }

        self.supabase
            .update("prescriptions", filter, auth_token, body)
            .await
            .map_err(ClinicalError::database)
    }

    async fn select_many(&self, filter: &str, auth_token: &str) -> Result<Vec<Prescription>, ClinicalError> {
        let path = format!("/rest/v1/prescriptions?{}", filter);
        debug!("Fetching prescriptions: {}", path);

        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(ClinicalError::database)
    }
}
