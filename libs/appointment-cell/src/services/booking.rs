// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::config::SchedulingConfig;
use crate::error::SchedulingError;
use crate::models::{
    Appointment, AppointmentError, AppointmentFilter, AppointmentListQuery, AppointmentPage,
    AppointmentPatch, AvailableSlotsQuery, ConflictCheckQuery, ConflictCheckResponse,
    CreateAppointmentRequest, NewAppointment, UpdateAppointmentRequest, MAX_NOTES_LENGTH,
    MAX_REASON_LENGTH,
};
use crate::services::business_hours::assert_within_business_hours;
use crate::services::conflict::{find_conflicts, has_conflict};
use crate::services::slots::{available_slots, resolve_slot_query, AvailableSlots};
use crate::services::store::{AppointmentStore, SupabaseAppointmentStore};
use crate::services::time::{parse_date, parse_time, validate_duration, Interval};

pub struct AppointmentService {
    store: Arc<dyn AppointmentStore>,
    scheduling: SchedulingConfig,
}

impl AppointmentService {
    pub fn new(config: &AppConfig) -> Result<Self, AppointmentError> {
        let scheduling = SchedulingConfig::from_app_config(config)
            .map_err(|e| AppointmentError::Configuration(e.to_string()))?;
        let store = SupabaseAppointmentStore::new(Arc::new(SupabaseClient::new(config)));

        Ok(Self::with_store(Arc::new(store), scheduling))
    }

    pub fn with_store(store: Arc<dyn AppointmentStore>, scheduling: SchedulingConfig) -> Self {
        Self { store, scheduling }
    }

    pub fn scheduling(&self) -> &SchedulingConfig {
        &self.scheduling
    }

    // ==============================================================================
    // QUERIES
    // ==============================================================================

    pub async fn list_appointments(
        &self,
        query: &AppointmentListQuery,
        auth_token: &str,
    ) -> Result<AppointmentPage, AppointmentError> {
        let (page, limit) = query.pagination();
        let filter = AppointmentFilter {
            patient_id: query.patient,
            provider_id: query.provider,
            status: query.status,
            date: query.date.as_deref().map(parse_date).transpose()?,
        };

        let (appointments, total) = self.store.list(&filter, page, limit, auth_token).await?;
        let pages = total.div_ceil(limit as u64);

        debug!("Listed {} of {} appointments (page {}/{})", appointments.len(), total, page, pages);

        Ok(AppointmentPage {
            results: appointments.len(),
            total,
            page,
            pages,
            appointments,
        })
    }

    pub async fn get_appointment(&self, appointment_id: Uuid, auth_token: &str) -> Result<Appointment, AppointmentError> {
        self.store
            .get(appointment_id, auth_token)
            .await?
            .filter(|appointment| appointment.is_active)
            .ok_or(AppointmentError::NotFound)
    }

    pub async fn available_slots(
        &self,
        query: &AvailableSlotsQuery,
        auth_token: &str,
    ) -> Result<(Uuid, NaiveDate, AvailableSlots), AppointmentError> {
        let (provider_id, date) = resolve_slot_query(query.provider.as_deref(), query.date.as_deref())?;
        let bookings = self.store.find_active_bookings(provider_id, date, auth_token).await?;

        let slots = available_slots(provider_id, date, &self.scheduling.clinic_day, &bookings);
        debug!(
            "Provider {} on {}: {} of {} slots free",
            provider_id,
            date,
            slots.available.len(),
            slots.all.len()
        );

        Ok((provider_id, date, slots))
    }

    pub async fn check_conflicts(
        &self,
        query: &ConflictCheckQuery,
        auth_token: &str,
    ) -> Result<ConflictCheckResponse, AppointmentError> {
        let (provider_id, date) = resolve_slot_query(query.provider.as_deref(), query.date.as_deref())?;
        let time = query
            .time
            .as_deref()
            .ok_or(SchedulingError::MissingParameter("time"))?;
        let duration = query.duration.ok_or(SchedulingError::MissingParameter("duration"))?;
        let candidate = Interval::new(date, parse_time(time)?, duration)?;

        let bookings = self.store.find_active_bookings(provider_id, date, auth_token).await?;
        let conflicting_appointments: Vec<_> = find_conflicts(provider_id, &candidate, &bookings, query.exclude)
            .copied()
            .collect();

        Ok(ConflictCheckResponse {
            has_conflict: !conflicting_appointments.is_empty(),
            conflicting_appointments,
        })
    }

    // ==============================================================================
    // COMMANDS
    // ==============================================================================

    pub async fn create_appointment(
        &self,
        request: CreateAppointmentRequest,
        created_by: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Creating appointment for patient {} with provider {}", request.patient_id, request.provider_id);

        let date = parse_date(&request.date)?;
        let time = parse_time(&request.time)?;
        let candidate = Interval::new(date, time, request.duration_minutes)?;

        let location = required_text("location", &request.location)?;
        let reason = required_text("reason", &request.reason)?;
        validate_length("reason", &reason, MAX_REASON_LENGTH)?;
        let notes = optional_text(request.notes);
        if let Some(notes) = &notes {
            validate_length("notes", notes, MAX_NOTES_LENGTH)?;
        }
        reject_past_date(date)?;

        if !self.store.patient_exists(request.patient_id, auth_token).await? {
            return Err(AppointmentError::PatientNotFound);
        }
        if !self.store.provider_exists(request.provider_id, auth_token).await? {
            return Err(AppointmentError::ProviderNotFound);
        }

        assert_within_business_hours(time, &self.scheduling.business_hours)?;

        let bookings = self
            .store
            .find_active_bookings(request.provider_id, date, auth_token)
            .await?;
        if has_conflict(request.provider_id, &candidate, &bookings, None) {
            warn!("Provider {} already booked around {} on {}", request.provider_id, time, date);
            return Err(AppointmentError::Conflict);
        }

        let new_appointment = NewAppointment {
            patient_id: request.patient_id,
            provider_id: request.provider_id,
            date,
            time,
            start_minutes: time.minutes(),
            duration_minutes: candidate.duration_minutes(),
            appointment_type: request.appointment_type,
            status: request.status.unwrap_or_default(),
            location,
            reason,
            notes,
            is_active: true,
            created_by,
        };

        let appointment = self.store.insert(&new_appointment, auth_token).await?;
        info!("Appointment {} booked for {} at {}", appointment.id, appointment.date, appointment.time);
        Ok(appointment)
    }

    pub async fn update_appointment(
        &self,
        appointment_id: Uuid,
        request: UpdateAppointmentRequest,
        updated_by: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let date = request.date.as_deref().map(parse_date).transpose()?;
        let time = request.time.as_deref().map(parse_time).transpose()?;
        let duration = request.duration_minutes.map(validate_duration).transpose()?;

        let location = request
            .location
            .as_deref()
            .map(|value| required_text("location", value))
            .transpose()?;
        let reason = request
            .reason
            .as_deref()
            .map(|value| required_text("reason", value))
            .transpose()?;
        if let Some(reason) = &reason {
            validate_length("reason", reason, MAX_REASON_LENGTH)?;
        }
        if let Some(notes) = &request.notes {
            validate_length("notes", notes, MAX_NOTES_LENGTH)?;
        }
        if let Some(date) = date {
            reject_past_date(date)?;
        }

        let existing = self
            .store
            .get(appointment_id, auth_token)
            .await?
            .filter(|appointment| appointment.is_active)
            .ok_or(AppointmentError::NotFound)?;

        if let Some(next) = request.status {
            if !existing.status.can_transition_to(next) {
                return Err(AppointmentError::InvalidStatusTransition {
                    from: existing.status,
                    to: next,
                });
            }
        }

        if let Some(patient_id) = request.patient_id {
            if patient_id != existing.patient_id && !self.store.patient_exists(patient_id, auth_token).await? {
                return Err(AppointmentError::PatientNotFound);
            }
        }
        if let Some(provider_id) = request.provider_id {
            if provider_id != existing.provider_id && !self.store.provider_exists(provider_id, auth_token).await? {
                return Err(AppointmentError::ProviderNotFound);
            }
        }

        if let Some(time) = time {
            assert_within_business_hours(time, &self.scheduling.business_hours)?;
        }

        if request.touches_schedule() {
            let provider_id = request.provider_id.unwrap_or(existing.provider_id);
            let merged = Interval::new(
                date.unwrap_or(existing.date),
                time.unwrap_or(existing.time),
                duration.unwrap_or(existing.duration_minutes),
            )?;

            let bookings = self
                .store
                .find_active_bookings(provider_id, merged.date, auth_token)
                .await?;
            if has_conflict(provider_id, &merged, &bookings, Some(appointment_id)) {
                warn!("Rescheduling {} would overlap another booking of provider {}", appointment_id, provider_id);
                return Err(AppointmentError::Conflict);
            }
        }

        let patch = AppointmentPatch {
            patient_id: request.patient_id,
            provider_id: request.provider_id,
            date,
            time,
            start_minutes: time.map(|t| t.minutes()),
            duration_minutes: duration,
            appointment_type: request.appointment_type,
            status: request.status,
            location,
            reason,
            notes: request.notes,
            updated_by: Some(updated_by),
            updated_at: Some(Utc::now()),
            ..Default::default()
        };

        let updated = self
            .store
            .update(appointment_id, &patch, auth_token)
            .await?
            .ok_or(AppointmentError::NotFound)?;

        info!("Appointment {} updated by {}", appointment_id, updated_by);
        Ok(updated)
    }

    /// Soft-cancel: the row stays but no longer counts as a booking.
    pub async fn delete_appointment(
        &self,
        appointment_id: Uuid,
        updated_by: Uuid,
        auth_token: &str,
    ) -> Result<(), AppointmentError> {
        let patch = AppointmentPatch {
            is_active: Some(false),
            updated_by: Some(updated_by),
            updated_at: Some(Utc::now()),
            ..Default::default()
        };

        self.store
            .update(appointment_id, &patch, auth_token)
            .await?
            .ok_or(AppointmentError::NotFound)?;

        info!("Appointment {} cancelled by {}", appointment_id, updated_by);
        Ok(())
    }
}

fn required_text(field: &str, value: &str) -> Result<String, AppointmentError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppointmentError::ValidationError(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_length(field: &str, value: &str, max: usize) -> Result<(), AppointmentError> {
    if value.chars().count() > max {
        return Err(AppointmentError::ValidationError(format!(
            "{} cannot be more than {} characters",
            field, max
        )));
    }
    Ok(())
}

fn reject_past_date(date: NaiveDate) -> Result<(), AppointmentError> {
    if date < Utc::now().date_naive() {
        return Err(AppointmentError::ValidationError(
            "Appointment date cannot be in the past".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn text_helpers() {
        assert_eq!(required_text("location", "  Room 4 ").unwrap(), "Room 4");
        assert_matches!(required_text("location", "   "), Err(AppointmentError::ValidationError(_)));
        assert_eq!(optional_text(Some("  ".to_string())), None);
        assert!(validate_length("reason", &"x".repeat(500), MAX_REASON_LENGTH).is_ok());
        assert!(validate_length("reason", &"x".repeat(501), MAX_REASON_LENGTH).is_err());
    }

    #[test]
    fn past_dates_are_rejected() {
        let yesterday = Utc::now().date_naive().pred_opt().unwrap();
        assert_matches!(reject_past_date(yesterday), Err(AppointmentError::ValidationError(_)));
        assert!(reject_past_date(Utc::now().date_naive()).is_ok());
    }
}
