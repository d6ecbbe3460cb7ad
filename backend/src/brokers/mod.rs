//! Alert brokers and alert-to-target reconciliation.

pub mod reconciler;
pub mod static_broker;

pub use reconciler::{
    process_reduced_data, AlertReconciler, ReconcileConflict, ReconcileError, ReconcileReport,
    ReconcilerSettings,
};
pub use static_broker::StaticBroker;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::ErrorCategory;
use crate::models::{NewTarget, Target};

/// Free-form query understood by one broker.
pub type AlertQuery = serde_json::Map<String, serde_json::Value>;

pub type BrokerResult<T> = Result<T, BrokerError>;

/// An alert as received from a broker. The payload is broker specific.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub broker: String,
    pub alert_id: String,
    pub payload: serde_json::Value,
}

/// A target proposed for an alert, not yet persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetCandidate {
    pub target: NewTarget,
    #[serde(default)]
    pub extras: Vec<(String, String)>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// A time-series point returned by a broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReducedPoint {
    pub timestamp: DateTime<Utc>,
    #[serde(default = "default_data_type")]
    pub data_type: String,
    pub value: serde_json::Value,
}

fn default_data_type() -> String {
    "photometry".to_string()
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum BrokerError {
    #[error("Broker {broker} unavailable: {message}")]
    Unavailable { broker: String, message: String },

    #[error("Alert {alert_id} from {broker} is malformed: {message}")]
    MalformedAlert {
        broker: String,
        alert_id: String,
        message: String,
    },

    #[error("Broker {broker} does not support {operation}")]
    Unsupported {
        broker: String,
        operation: &'static str,
    },
}

impl BrokerError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Unavailable { .. } => ErrorCategory::Transient,
            Self::MalformedAlert { .. } => ErrorCategory::Integrity,
            Self::Unsupported { .. } => ErrorCategory::Configuration,
        }
    }
}

/// One alert source.
#[async_trait]
pub trait BrokerCapability: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_alerts(
        &self,
        query: &AlertQuery,
    ) -> BrokerResult<BoxStream<'static, BrokerResult<Alert>>>;

    /// Propose a target with its extras and aliases for `alert`.
    fn to_target(&self, alert: &Alert) -> BrokerResult<TargetCandidate>;

    /// Time-series data for `target`, optionally restricted to one alert.
    async fn fetch_reduced_data(
        &self,
        _target: &Target,
        _alert: Option<&Alert>,
    ) -> BrokerResult<Vec<ReducedPoint>> {
        Err(BrokerError::Unsupported {
            broker: self.name().to_string(),
            operation: "fetch_reduced_data",
        })
    }
}
