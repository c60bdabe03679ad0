use crate::store::{RecordId, StoreError};
use crate::timestamp::Timestamp;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Failures of the record mutation service.
///
/// The messages are part of the API, clients match on them.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("{label} not found (id={id})")]
    NotFound { label: &'static str, id: RecordId },

    #[error("Start time must be before end time")]
    InvalidRange { start: Timestamp, end: Timestamp },

    #[error("{label} with {field} '{value}' already exists")]
    Conflict { label: &'static str, field: String, value: String },

    #[error("Scheduling conflict with session id={id} [{start}, {end})")]
    SchedulingConflict { id: RecordId, start: Timestamp, end: Timestamp },

    #[error("Store failure: {0}")]
    StoreFailure(String),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { label, id } => ServiceError::NotFound { label, id },
            StoreError::Duplicate { label, column, value } => ServiceError::Conflict { label, field: column, value },
            StoreError::UnknownColumn { .. } => ServiceError::Validation(err.to_string()),
            StoreError::Sql(_) | StoreError::Corrupted { .. } => ServiceError::StoreFailure(err.to_string()),
        }
    }
}
