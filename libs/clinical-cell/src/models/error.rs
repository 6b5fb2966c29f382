use thiserror::Error;

use shared_models::error::AppError;

use super::PrescriptionStatus;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClinicalError {
    #[error("Diagnosis not found")]
    DiagnosisNotFound,

    #[error("No medication found with that ID")]
    MedicationNotFound,

    #[error("Prescription not found")]
    PrescriptionNotFound,

    #[error("Appointment not found")]
    AppointmentNotFound,

    #[error("Appointment does not belong to the specified patient")]
    AppointmentPatientMismatch,

    #[error("Cannot update completed diagnosis")]
    DiagnosisCompleted,

    #[error("Please provide a pharmacy ID")]
    MissingPharmacy,

    #[error("Prescription is already {0}")]
    NotPending(PrescriptionStatus),

    #[error("No refills remaining for this prescription")]
    NoRefillsRemaining,

    #[error("Cannot refill a prescription with status: {0}")]
    NotRefillable(PrescriptionStatus),

    #[error("This prescription has expired")]
    Expired,

    #[error("Prescription was refilled concurrently, please retry")]
    RefillConflict,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<ClinicalError> for AppError {
    fn from(err: ClinicalError) -> Self {
        match err {
            ClinicalError::DiagnosisNotFound
            | ClinicalError::MedicationNotFound
            | ClinicalError::PrescriptionNotFound
            | ClinicalError::AppointmentNotFound => AppError::NotFound(err.to_string()),
            ClinicalError::AppointmentPatientMismatch
            | ClinicalError::DiagnosisCompleted
            | ClinicalError::MissingPharmacy
            | ClinicalError::NotPending(_)
            | ClinicalError::NoRefillsRemaining
            | ClinicalError::NotRefillable(_)
            | ClinicalError::Expired => AppError::BadRequest(err.to_string()),
            ClinicalError::RefillConflict => AppError::Conflict(err.to_string()),
            ClinicalError::Validation(msg) => AppError::ValidationError(msg),
            ClinicalError::Database(msg) => AppError::Database(msg),
        }
    }
}

impl ClinicalError {
    pub(crate) fn database(err: impl std::fmt::Display) -> Self {
        ClinicalError::Database(err.to_string())
    }
}

/// Trimmed copy of a required text field.
pub(crate) fn required(field: &str, value: &str) -> Result<String, ClinicalError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ClinicalError::Validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}
