use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::medication::validate_period;
use crate::models::{
    ClinicalError, CreateMedicationRequest, Medication, MedicationQuery, UpdateMedicationRequest,
};

pub struct MedicationService {
    supabase: SupabaseClient,
}

impl MedicationService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn list_medications(
        &self,
        query: &MedicationQuery,
        auth_token: &str,
    ) -> Result<Vec<Medication>, ClinicalError> {
        let mut path = "/rest/v1/medications?is_active=eq.true".to_string();
        if let Some(patient) = query.patient {
            path.push_str(&format!("&patient_id=eq.{}", patient));
        }
        if let Some(status) = query.status {
            path.push_str(&format!("&status=eq.{}", status.as_str()));
        }
        path.push_str("&order=name.asc");

        debug!("Fetching medications: {}", path);
        let medications: Vec<Medication> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(ClinicalError::database)?;

        // Stock comparison is column-to-column, so the reorder filter runs here.
        Ok(match query.needs_reorder {
            Some(wanted) => medications
                .into_iter()
                .filter(|m| m.needs_reorder() == wanted)
                .collect(),
            None => medications,
        })
    }

    pub async fn get_medication(&self, medication_id: Uuid, auth_token: &str) -> Result<Medication, ClinicalError> {
        self.supabase
            .select_one("medications", &format!("id=eq.{}", medication_id), auth_token)
            .await
            .map_err(ClinicalError::database)?
            .ok_or(ClinicalError::MedicationNotFound)
    }

    pub async fn create_medication(
        &self,
        mut request: CreateMedicationRequest,
        prescribed_by: Uuid,
        auth_token: &str,
    ) -> Result<Medication, ClinicalError> {
        request.validate()?;
        request.prescribed_by.get_or_insert(prescribed_by);

        let mut body = serde_json::to_value(&request).map_err(ClinicalError::database)?;
        if let Value::Object(map) = &mut body {
            map.insert("is_active".to_string(), json!(true));
        }

        let medication: Medication = self
            .supabase
            .insert("medications", auth_token, body)
            .await
            .map_err(ClinicalError::database)?;

        info!("Medication {} ({}) created", medication.id, medication.name);
        Ok(medication)
    }

    pub async fn update_medication(
        &self,
        medication_id: Uuid,
        mut request: UpdateMedicationRequest,
        auth_token: &str,
    ) -> Result<Medication, ClinicalError> {
        request.validate()?;

        if let Some(end_date) = request.end_date {
            let current = self.get_medication(medication_id, auth_token).await?;
            validate_period(current.start_date, Some(end_date))?;
        }

        let body = serde_json::to_value(&request).map_err(ClinicalError::database)?;
        self.patch(medication_id, body, auth_token).await
    }

    pub async fn deactivate_medication(&self, medication_id: Uuid, auth_token: &str) -> Result<(), ClinicalError> {
        self.patch(medication_id, json!({ "is_active": false }), auth_token).await?;
        info!("Medication {} deactivated", medication_id);
        Ok(())
    }

    async fn patch(&self, medication_id: Uuid, mut body: Value, auth_token: &str) -> Result<Medication, ClinicalError> {
        if let Value::Object(map) = &mut body {
            map.insert("updated_at".to_string(), json!(Utc::now()));
        }

        self.supabase
            .update("medications", &format!("id=eq.{}", medication_id), auth_token, body)
            .await
            .map_err(ClinicalError::database)?
            .ok_or(ClinicalError::MedicationNotFound)
    }
}
