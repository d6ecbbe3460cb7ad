use std::time::Duration;

use crate::error::ErrorCategory;

pub type FacilityResult<T> = Result<T, FacilityError>;

/// Failures reported by (or while reaching) a facility.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FacilityError {
    /// Network failure or server-side error; worth retrying later.
    #[error("Facility {facility} unavailable: {message}")]
    Unavailable { facility: String, message: String },

    /// The facility refused the request (bad parameters, no time, ...).
    #[error("Facility {facility} rejected request: {reason}")]
    Rejected { facility: String, reason: String },

    #[error("Facility {facility} timed out after {after:?} during {operation}")]
    Timeout {
        facility: String,
        operation: &'static str,
        after: Duration,
    },

    #[error("Facility {facility} has no observation {observation_id}")]
    UnknownObservation {
        facility: String,
        observation_id: String,
    },

    #[error("No facility registered as {name}")]
    UnknownFacility { name: String },
}

impl FacilityError {
    /// Transient failures that a later run may get past.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. })
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Unavailable { .. } | Self::Timeout { .. } => ErrorCategory::Transient,
            Self::Rejected { .. } => ErrorCategory::Rejection,
            Self::UnknownObservation { .. } => ErrorCategory::Integrity,
            Self::UnknownFacility { .. } => ErrorCategory::Configuration,
        }
    }
}
