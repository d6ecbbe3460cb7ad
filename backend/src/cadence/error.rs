use crate::db::repository::RepositoryError;
use crate::error::ErrorCategory;
use crate::facility::FacilityError;

pub type CadenceResult<T> = Result<T, CadenceError>;

#[derive(Debug, thiserror::Error)]
pub enum CadenceError {
    #[error("Unknown cadence strategy '{name}'")]
    UnknownStrategy { name: String },

    #[error("Cadence strategy name '{name}' is already registered")]
    DuplicateStrategy { name: String },

    #[error("Malformed cadence parameter '{key}': {message}")]
    MalformedParameters { key: String, message: String },

    #[error(transparent)]
    Facility(#[from] FacilityError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl CadenceError {
    pub fn malformed(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedParameters {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownStrategy { .. }
            | Self::DuplicateStrategy { .. }
            | Self::MalformedParameters { .. } => ErrorCategory::Configuration,
            Self::Facility(err) => err.category(),
            Self::Repository(err) => err.category(),
        }
    }
}
