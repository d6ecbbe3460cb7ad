//! Observation campaign records: groups, submitted requests and cadences.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{DynamicCadenceId, ObservationGroupId, ObservationRecordId, TargetId};

/// Facility-specific request payload (form fields as submitted).
pub type Parameters = serde_json::Map<String, serde_json::Value>;

/// Strategy-specific state stored on a [`DynamicCadence`].
pub type CadenceParameters = serde_json::Map<String, serde_json::Value>;

/// Lifecycle state of a submitted observation as reported by its facility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObservationStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Canceled,
    WindowExpired,
}

impl ObservationStatus {
    /// The facility will not change this status any more.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::InProgress)
    }

    /// Terminal without producing data.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed | Self::Canceled | Self::WindowExpired)
    }

    pub fn is_pending(&self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Canceled => "CANCELED",
            Self::WindowExpired => "WINDOW_EXPIRED",
        }
    }
}

impl fmt::Display for ObservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObservationStatus {
    type Err = String;

    /// Parse a facility status string.
    ///
    /// Facilities disagree on spelling, so common synonyms are accepted
    /// (`CANCELLED`, `COMPLETE`, `SCHEDULED`, ...). Matching ignores case and
    /// treats spaces and dashes as underscores.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "PENDING" | "SCHEDULED" | "SUBMITTED" | "QUEUED" => Ok(Self::Pending),
            "IN_PROGRESS" | "ATTEMPTED" | "OBSERVING" => Ok(Self::InProgress),
            "COMPLETED" | "COMPLETE" | "DONE" => Ok(Self::Completed),
            "FAILED" | "FAILURE" | "NOT_ATTEMPTED" => Ok(Self::Failed),
            "CANCELED" | "CANCELLED" => Ok(Self::Canceled),
            "WINDOW_EXPIRED" | "EXPIRED" => Ok(Self::WindowExpired),
            _ => Err(format!("Unknown observation status: {}", s)),
        }
    }
}

/// A named campaign of related observation requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationGroup {
    pub id: ObservationGroupId,
    pub name: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

/// One request submitted to a facility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    pub id: ObservationRecordId,
    pub facility: String,
    /// Identifier assigned by the facility on submission.
    pub observation_id: String,
    pub target_id: TargetId,
    pub parameters: Parameters,
    pub status: ObservationStatus,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    #[serde(default)]
    pub scheduled_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scheduled_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub observation_group_id: Option<ObservationGroupId>,
}

impl ObservationRecord {
    /// Instant the observation is considered complete.
    ///
    /// Uses the facility's scheduled end when known, otherwise the time the
    /// completed status was recorded.
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.scheduled_end.unwrap_or(self.modified)
    }
}

/// Insert payload for an [`ObservationRecord`]; ids and timestamps are
/// assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewObservationRecord {
    pub facility: String,
    pub observation_id: String,
    pub target_id: TargetId,
    pub parameters: Parameters,
    pub status: ObservationStatus,
    pub scheduled_start: Option<DateTime<Utc>>,
    pub scheduled_end: Option<DateTime<Utc>>,
    pub observation_group_id: Option<ObservationGroupId>,
}

impl NewObservationRecord {
    /// A freshly submitted request, pending at the facility.
    pub fn submitted(
        request: &ParameterSet,
        observation_id: impl Into<String>,
        group: Option<ObservationGroupId>,
    ) -> Self {
        Self {
            facility: request.facility.clone(),
            observation_id: observation_id.into(),
            target_id: request.target_id,
            parameters: request.parameters.clone(),
            status: ObservationStatus::Pending,
            scheduled_start: None,
            scheduled_end: None,
            observation_group_id: group,
        }
    }
}

/// Binds an observation group to a cadence strategy and its state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicCadence {
    pub id: DynamicCadenceId,
    pub observation_group_id: ObservationGroupId,
    /// Registered name of the strategy driving this cadence.
    pub cadence_strategy: String,
    pub cadence_parameters: CadenceParameters,
    pub active: bool,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    /// Bumped by every committed run; the optimistic-concurrency token.
    #[serde(default)]
    pub version: u64,
}

/// A request the cadence engine wants submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    pub facility: String,
    pub target_id: TargetId,
    pub parameters: Parameters,
}

impl ParameterSet {
    /// An identical resubmission of an existing record.
    pub fn clone_of(record: &ObservationRecord) -> Self {
        Self {
            facility: record.facility.clone(),
            target_id: record.target_id,
            parameters: record.parameters.clone(),
        }
    }
}
