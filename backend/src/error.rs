//! Coarse error taxonomy shared by every layer.
//!
//! Each layer keeps its own `thiserror` enum; `category()` on those enums
//! maps them here so reports can be aggregated uniformly.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Unknown strategy, malformed cadence parameters, bad settings.
    Configuration,
    /// Timeouts and unavailable services; the next scheduled run retries.
    Transient,
    /// A facility explicitly refused a request.
    Rejection,
    /// Duplicate names or concurrent modification; needs a human or a rerun.
    Conflict,
    /// Dangling references and malformed stored data.
    Integrity,
    Internal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Transient => "transient",
            Self::Rejection => "rejection",
            Self::Conflict => "conflict",
            Self::Integrity => "integrity",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
