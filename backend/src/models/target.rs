//! Canonical astronomical objects with their aliases and metadata.

use chrono::{DateTime, Utc};
use qtty::Degrees;
use serde::{Deserialize, Serialize};

use super::{ReducedDatumId, TargetId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    #[default]
    Sidereal,
    NonSidereal,
}

/// A persisted target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub id: TargetId,
    /// Primary name; shares the alias namespace.
    pub name: String,
    #[serde(default)]
    pub target_type: TargetType,
    pub ra: Degrees,
    pub dec: Degrees,
    /// Coordinate epoch in Julian years.
    #[serde(default = "default_epoch")]
    pub epoch: f64,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

fn default_epoch() -> f64 {
    2000.0
}

/// A target proposed by a broker, not yet stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTarget {
    pub name: String,
    #[serde(default)]
    pub target_type: TargetType,
    pub ra: Degrees,
    pub dec: Degrees,
    #[serde(default = "default_epoch")]
    pub epoch: f64,
}

impl NewTarget {
    pub fn sidereal(name: impl Into<String>, ra: Degrees, dec: Degrees) -> Self {
        Self {
            name: name.into(),
            target_type: TargetType::Sidereal,
            ra,
            dec,
            epoch: default_epoch(),
        }
    }
}

/// Alternate catalog name of a target. Names are globally unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetName {
    pub target_id: TargetId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetExtra {
    pub target_id: TargetId,
    pub key: String,
    pub value: String,
}

/// Target with everything attached to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetDetails {
    pub target: Target,
    pub aliases: Vec<TargetName>,
    pub extras: Vec<TargetExtra>,
}

/// One point of processed time-series data (e.g. photometry).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReducedDatum {
    pub id: ReducedDatumId,
    pub target_id: TargetId,
    /// Origin of the point, usually the broker name.
    pub source_name: String,
    pub data_type: String,
    pub timestamp: DateTime<Utc>,
    pub value: serde_json::Value,
}

/// Insert payload for a [`ReducedDatum`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReducedDatum {
    pub target_id: TargetId,
    pub source_name: String,
    pub data_type: String,
    pub timestamp: DateTime<Utc>,
    pub value: serde_json::Value,
}

impl NewReducedDatum {
    /// Identity used to keep ingestion idempotent.
    pub fn dedup_key(&self) -> (DateTime<Utc>, &str, TargetId) {
        (self.timestamp, self.source_name.as_str(), self.target_id)
    }
}
