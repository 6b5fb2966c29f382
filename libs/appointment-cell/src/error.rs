use thiserror::Error;

/// Deterministic, non-retryable failures of the scheduling core.
/// All of them describe a bad request rather than a transient condition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulingError {
    #[error("Invalid time format '{0}'. Use HH:MM AM/PM format")]
    InvalidFormat(String),

    #[error("Invalid date format '{0}'")]
    InvalidDate(String),

    #[error("{0} is required")]
    MissingParameter(&'static str),

    #[error("Invalid {field} identifier '{value}'")]
    InvalidIdentifier { field: &'static str, value: String },

    #[error("Appointment time {time} must be within business hours ({start_hour}:00-{end_hour}:00)")]
    OutOfHours { time: String, start_hour: u16, end_hour: u16 },

    #[error("Duration must be between 15 and 180 minutes in 15-minute increments, got {0}")]
    InvalidDuration(u32),

    #[error("Slot interval must be a positive number of minutes")]
    InvalidInterval,
}
