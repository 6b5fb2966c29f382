// libs/appointment-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::error::AppError;

use crate::error::SchedulingError;
use crate::services::conflict::BookedSlot;
use crate::services::time::{Interval, TimeOfDay};

pub const MAX_REASON_LENGTH: usize = 500;
pub const MAX_NOTES_LENGTH: usize = 1000;
pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 100;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub provider_id: Uuid,
    pub date: NaiveDate,
    pub time: TimeOfDay,
    pub duration_minutes: u32,
    pub appointment_type: AppointmentType,
    pub status: AppointmentStatus,
    pub location: String,
    pub reason: String,
    pub notes: Option<String>,
    pub is_active: bool,
    pub created_by: Uuid,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn interval(&self) -> Result<Interval, SchedulingError> {
        Interval::new(self.date, self.time, self.duration_minutes)
    }

    pub fn booked_slot(&self) -> Result<BookedSlot, SchedulingError> {
        Ok(BookedSlot::new(self.id, self.provider_id, self.interval()?, self.is_active))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentStatus {
    #[default]
    Scheduled,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, AppointmentStatus::Scheduled)
    }

    /// Scheduled appointments may close in any terminal state; terminal states are final.
    pub fn can_transition_to(self, next: AppointmentStatus) -> bool {
        self == next || self == AppointmentStatus::Scheduled
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::NoShow => write!(f, "no-show"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AppointmentType {
    #[serde(rename = "Annual Check-up")]
    AnnualCheckUp,
    #[serde(rename = "Follow-up")]
    FollowUp,
    Consultation,
    Emergency,
    Other,
}

impl fmt::Display for AppointmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentType::AnnualCheckUp => write!(f, "Annual Check-up"),
            AppointmentType::FollowUp => write!(f, "Follow-up"),
            AppointmentType::Consultation => write!(f, "Consultation"),
            AppointmentType::Emergency => write!(f, "Emergency"),
            AppointmentType::Other => write!(f, "Other"),
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

/// `date` and `time` stay raw so that parse failures surface as scheduling errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: Uuid,
    pub provider_id: Uuid,
    pub date: String,
    pub time: String,
    pub duration_minutes: u32,
    pub appointment_type: AppointmentType,
    pub status: Option<AppointmentStatus>,
    pub location: String,
    pub reason: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub patient_id: Option<Uuid>,
    pub provider_id: Option<Uuid>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub duration_minutes: Option<u32>,
    pub appointment_type: Option<AppointmentType>,
    pub status: Option<AppointmentStatus>,
    pub location: Option<String>,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

impl UpdateAppointmentRequest {
    pub fn touches_schedule(&self) -> bool {
        self.provider_id.is_some()
            || self.date.is_some()
            || self.time.is_some()
            || self.duration_minutes.is_some()
    }
}

/// Row written on create. `start_minutes` mirrors `time` for ordering and indexing.
#[derive(Debug, Clone, Serialize)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub provider_id: Uuid,
    pub date: NaiveDate,
    pub time: TimeOfDay,
    pub start_minutes: u16,
    pub duration_minutes: u32,
    pub appointment_type: AppointmentType,
    pub status: AppointmentStatus,
    pub location: String,
    pub reason: String,
    pub notes: Option<String>,
    pub is_active: bool,
    pub created_by: Uuid,
}

/// Partial row update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AppointmentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<TimeOfDay>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_minutes: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment_type: Option<AppointmentType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AppointmentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppointmentFilter {
    pub patient_id: Option<Uuid>,
    pub provider_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub patient: Option<Uuid>,
    pub provider: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub date: Option<String>,
}

impl AppointmentListQuery {
    /// 1-based page and a limit clamped to `1..=MAX_PAGE_LIMIT`.
    pub fn pagination(&self) -> (u32, u32) {
        let page = self.page.filter(|p| *p > 0).unwrap_or(1);
        let limit = self
            .limit
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .min(MAX_PAGE_LIMIT);
        (page, limit)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AppointmentPage {
    pub results: usize,
    pub total: u64,
    pub page: u32,
    pub pages: u64,
    pub appointments: Vec<Appointment>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AvailableSlotsQuery {
    pub provider: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConflictCheckQuery {
    pub provider: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub duration: Option<u32>,
    pub exclude: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConflictCheckResponse {
    pub has_conflict: bool,
    pub conflicting_appointments: Vec<BookedSlot>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error(transparent)]
    Scheduling(#[from] SchedulingError),

    #[error("Appointment not found")]
    NotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Provider not found")]
    ProviderNotFound,

    #[error("This time slot conflicts with an existing appointment")]
    Conflict,

    #[error("Appointment status cannot change from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Scheduling configuration error: {0}")]
    Configuration(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::Scheduling(inner) => AppError::BadRequest(inner.to_string()),
            AppointmentError::NotFound
            | AppointmentError::PatientNotFound
            | AppointmentError::ProviderNotFound => AppError::NotFound(err.to_string()),
            AppointmentError::Conflict => AppError::Conflict(err.to_string()),
            AppointmentError::InvalidStatusTransition { .. } | AppointmentError::ValidationError(_) => {
                AppError::ValidationError(err.to_string())
            }
            AppointmentError::Configuration(msg) => AppError::Internal(msg),
            AppointmentError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
