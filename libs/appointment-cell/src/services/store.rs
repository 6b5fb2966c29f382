// libs/appointment-cell/src/services/store.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::{DatabaseError, SupabaseClient};

use crate::models::{Appointment, AppointmentError, AppointmentFilter, AppointmentPatch, NewAppointment};
use crate::services::conflict::BookedSlot;

/// Persistence seen by the appointment service. The scheduling functions never
/// call it; the service loads bookings and passes them in.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Active bookings for one provider on one date, ordered by start time.
    async fn find_active_bookings(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<BookedSlot>, AppointmentError>;

    async fn get(&self, appointment_id: Uuid, auth_token: &str) -> Result<Option<Appointment>, AppointmentError>;

    async fn list(
        &self,
        filter: &AppointmentFilter,
        page: u32,
        limit: u32,
        auth_token: &str,
    ) -> Result<(Vec<Appointment>, u64), AppointmentError>;

    async fn insert(&self, appointment: &NewAppointment, auth_token: &str) -> Result<Appointment, AppointmentError>;

    /// Only touches active rows; `None` when no active row has `appointment_id`.
    async fn update(
        &self,
        appointment_id: Uuid,
        patch: &AppointmentPatch,
        auth_token: &str,
    ) -> Result<Option<Appointment>, AppointmentError>;

    async fn patient_exists(&self, patient_id: Uuid, auth_token: &str) -> Result<bool, AppointmentError>;

    async fn provider_exists(&self, provider_id: Uuid, auth_token: &str) -> Result<bool, AppointmentError>;
}

pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAppointmentStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn row_exists(&self, table: &str, id: Uuid, auth_token: &str) -> Result<bool, AppointmentError> {
        let filter = format!("id=eq.{}&is_active=eq.true&select=id", id);
        let row: Option<Value> = self
            .supabase
            .select_one(table, &filter, auth_token)
            .await
            .map_err(map_database_error)?;
        Ok(row.is_some())
    }
}

/// A unique-index violation means another booking won the slot.
fn map_database_error(error: anyhow::Error) -> AppointmentError {
    if DatabaseError::is_conflict(&error) {
        warn!("Store rejected write with a conflict: {}", error);
        return AppointmentError::Conflict;
    }
    AppointmentError::DatabaseError(error.to_string())
}

fn to_value<T: serde::Serialize>(body: &T) -> Result<Value, AppointmentError> {
    serde_json::to_value(body).map_err(|e| AppointmentError::DatabaseError(format!("Failed to encode row: {}", e)))
}

fn list_path(filter: &AppointmentFilter, page: u32, limit: u32) -> String {
    let mut query_parts = vec!["is_active=eq.true".to_string()];

    if let Some(patient_id) = filter.patient_id {
        query_parts.push(format!("patient_id=eq.{}", patient_id));
    }
    if let Some(provider_id) = filter.provider_id {
        query_parts.push(format!("provider_id=eq.{}", provider_id));
    }
    if let Some(status) = filter.status {
        query_parts.push(format!("status=eq.{}", status));
    }
    if let Some(date) = filter.date {
        query_parts.push(format!("date=eq.{}", date));
    }

    let offset = (page.saturating_sub(1) as u64) * limit as u64;
    query_parts.push("order=date.asc,start_minutes.asc".to_string());
    query_parts.push(format!("limit={}", limit));
    query_parts.push(format!("offset={}", offset));

    format!("/rest/v1/appointments?{}", query_parts.join("&"))
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn find_active_bookings(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<BookedSlot>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?provider_id=eq.{}&date=eq.{}&is_active=eq.true&order=start_minutes.asc",
            provider_id, date
        );

        let rows: Vec<Appointment> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(map_database_error)?;

        debug!("Loaded {} active bookings for provider {} on {}", rows.len(), provider_id, date);

        rows.iter()
            .map(|row| {
                row.booked_slot().map_err(|e| {
                    AppointmentError::DatabaseError(format!("Stored appointment {} is invalid: {}", row.id, e))
                })
            })
            .collect()
    }

    async fn get(&self, appointment_id: Uuid, auth_token: &str) -> Result<Option<Appointment>, AppointmentError> {
        self.supabase
            .select_one("appointments", &format!("id=eq.{}", appointment_id), auth_token)
            .await
            .map_err(map_database_error)
    }

    async fn list(
        &self,
        filter: &AppointmentFilter,
        page: u32,
        limit: u32,
        auth_token: &str,
    ) -> Result<(Vec<Appointment>, u64), AppointmentError> {
        let path = list_path(filter, page, limit);
        self.supabase
            .request_with_count(&path, Some(auth_token))
            .await
            .map_err(map_database_error)
    }

    async fn insert(&self, appointment: &NewAppointment, auth_token: &str) -> Result<Appointment, AppointmentError> {
        self.supabase
            .insert("appointments", auth_token, to_value(appointment)?)
            .await
            .map_err(map_database_error)
    }

    async fn update(
        &self,
        appointment_id: Uuid,
        patch: &AppointmentPatch,
        auth_token: &str,
    ) -> Result<Option<Appointment>, AppointmentError> {
        self.supabase
            .update(
                "appointments",
                &format!("id=eq.{}&is_active=eq.true", appointment_id),
                auth_token,
                to_value(patch)?,
            )
            .await
            .map_err(map_database_error)
    }

    async fn patient_exists(&self, patient_id: Uuid, auth_token: &str) -> Result<bool, AppointmentError> {
        self.row_exists("patients", patient_id, auth_token).await
    }

    async fn provider_exists(&self, provider_id: Uuid, auth_token: &str) -> Result<bool, AppointmentError> {
        self.row_exists("users", provider_id, auth_token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_path_applies_filters_and_paging() {
        let provider = Uuid::nil();
        let filter = AppointmentFilter {
            provider_id: Some(provider),
            date: NaiveDate::from_ymd_opt(2030, 1, 2),
            ..Default::default()
        };

        let path = list_path(&filter, 3, 20);
        assert!(path.starts_with("/rest/v1/appointments?is_active=eq.true"));
        assert!(path.contains(&format!("provider_id=eq.{}", provider)));
        assert!(path.contains("date=eq.2030-01-02"));
        assert!(path.ends_with("limit=20&offset=40"));
        assert!(!path.contains("patient_id"));
    }

    #[test]
    fn conflict_status_becomes_conflict_error() {
        let error: anyhow::Error = DatabaseError::Conflict("duplicate key".to_string()).into();
        assert!(matches!(map_database_error(error), AppointmentError::Conflict));

        let error: anyhow::Error = DatabaseError::Api { status: 500, message: "boom".to_string() }.into();
        assert!(matches!(map_database_error(error), AppointmentError::DatabaseError(_)));
    }

    #[test]
    fn empty_patch_encodes_as_empty_object() {
        let body = to_value(&AppointmentPatch::default()).unwrap();
        assert_eq!(body, serde_json::json!({}));
    }
}
