use thiserror::Error;

/// Failures reported by the PostgREST backend.
///
/// Returned wrapped in `anyhow::Error`; callers that need to react to a
/// specific status (a unique-index violation, say) use `DatabaseError::from_anyhow`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DatabaseError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid header value: {0}")]
    InvalidHeader(String),
}

impl DatabaseError {
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 | 403 => DatabaseError::Auth(message),
            404 => DatabaseError::NotFound(message),
            409 => DatabaseError::Conflict(message),
            _ => DatabaseError::Api { status, message },
        }
    }

    pub fn from_anyhow(error: &anyhow::Error) -> Option<&DatabaseError> {
        error.downcast_ref::<DatabaseError>()
    }

    pub fn is_conflict(error: &anyhow::Error) -> bool {
        matches!(Self::from_anyhow(error), Some(DatabaseError::Conflict(_)))
    }
}
