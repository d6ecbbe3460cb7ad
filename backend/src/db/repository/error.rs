//! Error types for repository operations.
//!
//! This module provides error handling for all store operations with
//! structured context for debugging and monitoring.

use std::fmt;

use crate::error::ErrorCategory;
use crate::models::TargetId;

/// Result type for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Structured context for repository errors.
///
/// Provides additional information about where and why an error occurred.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The operation being performed (e.g., "create_target", "commit_cadence_run")
    pub operation: Option<String>,
    /// The entity type involved (e.g., "target", "dynamic_cadence")
    pub entity: Option<String>,
    /// The entity ID if applicable
    pub entity_id: Option<String>,
    /// Additional details about the error
    pub details: Option<String>,
    /// Whether this error is retryable
    pub retryable: bool,
}

impl ErrorContext {
    /// Create a new error context with an operation name.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: Some(operation.into()),
            ..Default::default()
        }
    }

    /// Set the entity type.
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    /// Set the entity ID.
    pub fn with_entity_id(mut self, id: impl ToString) -> Self {
        self.entity_id = Some(id.to_string());
        self
    }

    /// Set additional details.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Mark this error as retryable.
    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(ref op) = self.operation {
            parts.push(format!("operation={}", op));
        }
        if let Some(ref entity) = self.entity {
            parts.push(format!("entity={}", entity));
        }
        if let Some(ref id) = self.entity_id {
            parts.push(format!("id={}", id));
        }
        if let Some(ref details) = self.details {
            parts.push(format!("details={}", details));
        }
        if self.retryable {
            parts.push("retryable=true".to_string());
        }
        write!(f, "[{}]", parts.join(", "))
    }
}

/// Error type for repository operations
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Store unreachable. Typically transient.
    #[error("Connection error: {message} {context}")]
    ConnectionError {
        message: String,
        context: ErrorContext,
    },

    /// Requested entity was not found.
    #[error("Not found: {message} {context}")]
    NotFound {
        message: String,
        context: ErrorContext,
    },

    /// Data validation failed before or after a store operation.
    #[error("Data validation error: {message} {context}")]
    ValidationError {
        message: String,
        context: ErrorContext,
    },

    /// A target name or alias is already taken.
    ///
    /// This is the authoritative duplicate signal: it is raised inside the
    /// insert itself, not by a separate lookup.
    #[error("Unique constraint violated: name '{name}' already belongs to target {existing_target} {context}")]
    UniqueViolation {
        name: String,
        existing_target: TargetId,
        context: ErrorContext,
    },

    /// The row changed since it was loaded.
    #[error("Concurrent modification: {message} {context}")]
    ConcurrentModification {
        message: String,
        context: ErrorContext,
    },

    /// Configuration or initialization error.
    #[error("Configuration error: {message} {context}")]
    ConfigurationError {
        message: String,
        context: ErrorContext,
    },

    /// Internal/unexpected errors.
    #[error("Internal error: {message} {context}")]
    InternalError {
        message: String,
        context: ErrorContext,
    },
}

impl RepositoryError {
    /// Create a connection error with context.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::ConnectionError {
            message: message.into(),
            context: ErrorContext::default().retryable(),
        }
    }

    /// Create a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Create a not found error with context.
    pub fn not_found_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::NotFound {
            message: message.into(),
            context,
        }
    }

    /// Create a validation error with context.
    pub fn validation_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::ValidationError {
            message: message.into(),
            context,
        }
    }

    pub fn unique_violation(name: impl Into<String>, existing_target: TargetId) -> Self {
        Self::UniqueViolation {
            name: name.into(),
            existing_target,
            context: ErrorContext::default().with_entity("target_name"),
        }
    }

    pub fn concurrent_modification(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::ConcurrentModification {
            message: message.into(),
            context: context.retryable(),
        }
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Create an internal error with context.
    pub fn internal_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::InternalError {
            message: message.into(),
            context,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionError { context, .. } => context.retryable,
            Self::ConcurrentModification { context, .. } => context.retryable,
            _ => false,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConnectionError { .. } => ErrorCategory::Transient,
            Self::NotFound { .. } | Self::ValidationError { .. } => ErrorCategory::Integrity,
            Self::UniqueViolation { .. } | Self::ConcurrentModification { .. } => {
                ErrorCategory::Conflict
            }
            Self::ConfigurationError { .. } => ErrorCategory::Configuration,
            Self::InternalError { .. } => ErrorCategory::Internal,
        }
    }

    /// Get the error context.
    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::ConnectionError { context, .. }
            | Self::NotFound { context, .. }
            | Self::ValidationError { context, .. }
            | Self::UniqueViolation { context, .. }
            | Self::ConcurrentModification { context, .. }
            | Self::ConfigurationError { context, .. }
            | Self::InternalError { context, .. } => context,
        }
    }

    /// Add or update the operation in the error context.
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        match &mut self {
            Self::ConnectionError { context, .. }
            | Self::NotFound { context, .. }
            | Self::ValidationError { context, .. }
            | Self::UniqueViolation { context, .. }
            | Self::ConcurrentModification { context, .. }
            | Self::ConfigurationError { context, .. }
            | Self::InternalError { context, .. } => {
                context.operation = Some(operation.into());
            }
        }
        self
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::internal_with_context(
            err.to_string(),
            ErrorContext::new("snapshot").with_details("json"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_display() {
        let ctx = ErrorContext::new("commit_cadence_run")
            .with_entity("dynamic_cadence")
            .with_entity_id(7)
            .retryable();
        assert_eq!(
            ctx.to_string(),
            "[operation=commit_cadence_run, entity=dynamic_cadence, id=7, retryable=true]"
        );
    }

    #[test]
    fn test_retryable_classification() {
        assert!(RepositoryError::connection("down").is_retryable());
        assert!(
            RepositoryError::concurrent_modification("stale", ErrorContext::default())
                .is_retryable()
        );
        assert!(!RepositoryError::not_found("missing").is_retryable());
        assert!(!RepositoryError::unique_violation("SN 2024abc", TargetId(1)).is_retryable());
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            RepositoryError::unique_violation("SN 2024abc", TargetId(1)).category(),
            ErrorCategory::Conflict
        );
        assert_eq!(RepositoryError::connection("down").category(), ErrorCategory::Transient);
        assert_eq!(RepositoryError::not_found("x").category(), ErrorCategory::Integrity);
    }

    #[test]
    fn test_with_operation_overrides() {
        let err = RepositoryError::not_found("x").with_operation("get_target");
        assert_eq!(err.context().operation.as_deref(), Some("get_target"));
    }
}
