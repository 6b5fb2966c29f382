use chrono::{NaiveDate, Utc};
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    Contact, CreatePatientRequest, Patient, PatientError, PatientSearchQuery, UpdatePatientRequest,
};

pub struct PatientService {
    supabase: SupabaseClient,
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn create_patient(
        &self,
        mut request: CreatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        request.first_name = required("first_name", &request.first_name)?;
        request.last_name = required("last_name", &request.last_name)?;
        required("contact.phone", &request.contact.phone)?;
        required("emergency_contact.name", &request.emergency_contact.name)?;
        validate_date_of_birth(request.date_of_birth)?;
        request.contact = normalize_contact(request.contact);

        debug!("Creating patient record for {} {}", request.first_name, request.last_name);

        let mut body = serde_json::to_value(&request)
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;
        if let Value::Object(map) = &mut body {
            map.insert("is_active".to_string(), json!(true));
        }

        let patient: Patient = self
            .supabase
            .insert("patients", auth_token, body)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        info!("Patient record created with ID: {}", patient.id);
        Ok(patient)
    }

    pub async fn get_patient(&self, patient_id: Uuid, auth_token: &str) -> Result<Patient, PatientError> {
        debug!("Fetching patient record: {}", patient_id);

        self.supabase
            .select_one("patients", &format!("id=eq.{}", patient_id), auth_token)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?
            .ok_or(PatientError::NotFound)
    }

    pub async fn update_patient(
        &self,
        patient_id: Uuid,
        mut request: UpdatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        debug!("Updating patient record: {}", patient_id);

        if let Some(date_of_birth) = request.date_of_birth {
            validate_date_of_birth(date_of_birth)?;
        }
        if let Some(first_name) = &request.first_name {
            request.first_name = Some(required("first_name", first_name)?);
        }
        if let Some(last_name) = &request.last_name {
            request.last_name = Some(required("last_name", last_name)?);
        }
        request.contact = request.contact.map(normalize_contact);

        let mut body = serde_json::to_value(&request)
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;
        if let Value::Object(map) = &mut body {
            map.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));
        }

        self.supabase
            .update("patients", &format!("id=eq.{}", patient_id), auth_token, body)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?
            .ok_or(PatientError::NotFound)
    }

    /// Soft delete: the record is hidden from listings but kept for history.
    pub async fn deactivate_patient(&self, patient_id: Uuid, auth_token: &str) -> Result<(), PatientError> {
        let body = json!({
            "is_active": false,
            "updated_at": Utc::now().to_rfc3339()
        });

        let updated: Option<Patient> = self
            .supabase
            .update("patients", &format!("id=eq.{}", patient_id), auth_token, body)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        updated.map(|_| ()).ok_or(PatientError::NotFound)
    }

    pub async fn search_patients(
        &self,
        query: &PatientSearchQuery,
        auth_token: &str,
    ) -> Result<(Vec<Patient>, u64), PatientError> {
        debug!("Searching patients with query: {:?}", query);

        let path = search_path(query);
        self.supabase
            .request_with_count(&path, Some(auth_token))
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))
    }
}

fn required(field: &str, value: &str) -> Result<String, PatientError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(PatientError::ValidationError(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

fn validate_date_of_birth(date_of_birth: NaiveDate) -> Result<(), PatientError> {
    if date_of_birth > Utc::now().date_naive() {
        return Err(PatientError::InvalidDateOfBirth);
    }
    Ok(())
}

fn normalize_contact(contact: Contact) -> Contact {
    Contact {
        phone: contact.phone.trim().to_string(),
        email: contact
            .email
            .map(|email| email.trim().to_lowercase())
            .filter(|email| !email.is_empty()),
    }
}

/// `*term*` as a double-quoted PostgREST value, so commas and parentheses in
/// the term stay inside the `or=(...)` operand.
fn quoted_pattern(term: &str) -> String {
    let escaped = term.replace('\\', "\\\\").replace('"', "\\\"");
    urlencoding::encode(&format!("\"*{}*\"", escaped)).into_owned()
}

fn search_path(query: &PatientSearchQuery) -> String {
    let mut query_parts = vec!["is_active=eq.true".to_string()];

    if let Some(name) = query.name.as_deref().filter(|n| !n.trim().is_empty()) {
        let pattern = quoted_pattern(name.trim());
        query_parts.push(format!("or=(first_name.ilike.{},last_name.ilike.{})", pattern, pattern));
    }
    if let Some(email) = query.email.as_deref().filter(|e| !e.trim().is_empty()) {
        query_parts.push(format!(
            "contact->>email=ilike.*{}*",
            urlencoding::encode(&email.trim().to_lowercase())
        ));
    }
    if let Some(phone) = query.phone.as_deref().filter(|p| !p.trim().is_empty()) {
        query_parts.push(format!("contact->>phone=ilike.*{}*", urlencoding::encode(phone.trim())));
    }

    let (page, limit) = query.pagination();
    let offset = (page as u64 - 1) * limit as u64;
    query_parts.push("order=last_name.asc,first_name.asc".to_string());
    query_parts.push(format!("limit={}&offset={}", limit, offset));

    format!("/rest/v1/patients?{}", query_parts.join("&"))
}
