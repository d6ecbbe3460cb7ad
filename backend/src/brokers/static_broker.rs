//! Broker backed by a fixed list of alerts.
//!
//! Payload fields follow the generic broker layout: `name`, `ra`, `dec`
//! (degrees), optional `aliases` (array of strings) and `extras` (object).

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use qtty::Degrees;
use std::collections::HashMap;

use super::{
    Alert, AlertQuery, BrokerCapability, BrokerError, BrokerResult, ReducedPoint, TargetCandidate,
};
use crate::models::{NewTarget, Target};

pub struct StaticBroker {
    name: String,
    alerts: Vec<Alert>,
    /// Appended to every alert stream as `Unavailable` items.
    stream_errors: Vec<String>,
    /// Points keyed by target name.
    reduced_data: HashMap<String, Vec<ReducedPoint>>,
}

impl StaticBroker {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alerts: Vec::new(),
            stream_errors: Vec::new(),
            reduced_data: HashMap::new(),
        }
    }

    /// Add an alert built from `payload`.
    pub fn with_alert(mut self, alert_id: impl Into<String>, payload: serde_json::Value) -> Self {
        self.alerts.push(Alert {
            broker: self.name.clone(),
            alert_id: alert_id.into(),
            payload,
        });
        self
    }

    /// End every alert stream with an `Unavailable` error carrying `message`.
    pub fn with_stream_error(mut self, message: impl Into<String>) -> Self {
        self.stream_errors.push(message.into());
        self
    }

    pub fn with_reduced_data(mut self, target_name: impl Into<String>, points: Vec<ReducedPoint>) -> Self {
        self.reduced_data
            .entry(target_name.into())
            .or_default()
            .extend(points);
        self
    }

    fn malformed(&self, alert: &Alert, message: impl Into<String>) -> BrokerError {
        BrokerError::MalformedAlert {
            broker: self.name.clone(),
            alert_id: alert.alert_id.clone(),
            message: message.into(),
        }
    }

    fn degrees(&self, alert: &Alert, field: &str) -> BrokerResult<Degrees> {
        alert
            .payload
            .get(field)
            .and_then(serde_json::Value::as_f64)
            .map(Degrees::new)
            .ok_or_else(|| self.malformed(alert, format!("missing numeric '{}'", field)))
    }
}

/// Every query entry must equal the corresponding payload field.
fn matches_query(alert: &Alert, query: &AlertQuery) -> bool {
    query
        .iter()
        .all(|(key, expected)| alert.payload.get(key) == Some(expected))
}

fn extra_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl BrokerCapability for StaticBroker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_alerts(
        &self,
        query: &AlertQuery,
    ) -> BrokerResult<BoxStream<'static, BrokerResult<Alert>>> {
        let selected: Vec<BrokerResult<Alert>> = self
            .alerts
            .iter()
            .filter(|alert| matches_query(alert, query))
            .cloned()
            .map(Ok)
            .chain(self.stream_errors.iter().map(|message| {
                Err(BrokerError::Unavailable {
                    broker: self.name.clone(),
                    message: message.clone(),
                })
            }))
            .collect();
        Ok(stream::iter(selected).boxed())
    }

    fn to_target(&self, alert: &Alert) -> BrokerResult<TargetCandidate> {
        let name = alert
            .payload
            .get("name")
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| self.malformed(alert, "missing 'name'"))?;
        let ra = self.degrees(alert, "ra")?;
        let dec = self.degrees(alert, "dec")?;
        if !(-90.0..=90.0).contains(&dec.value()) {
            return Err(self.malformed(alert, format!("dec {} out of range", dec.value())));
        }

        let aliases = match alert.payload.get("aliases") {
            None => Vec::new(),
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .filter_map(serde_json::Value::as_str)
                .map(str::to_string)
                .collect(),
            Some(_) => return Err(self.malformed(alert, "'aliases' must be an array")),
        };
        let extras = alert
            .payload
            .get("extras")
            .and_then(serde_json::Value::as_object)
            .map(|obj| obj.iter().map(|(k, v)| (k.clone(), extra_value(v))).collect())
            .unwrap_or_default();

        Ok(TargetCandidate {
            target: NewTarget::sidereal(name, Degrees::new(ra.value().rem_euclid(360.0)), dec),
            extras,
            aliases,
        })
    }

    async fn fetch_reduced_data(
        &self,
        target: &Target,
        _alert: Option<&Alert>,
    ) -> BrokerResult<Vec<ReducedPoint>> {
        Ok(self.reduced_data.get(&target.name).cloned().unwrap_or_default())
    }
}
