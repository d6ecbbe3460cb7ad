//! Resolve broker alerts to canonical targets without creating duplicates.
//!
//! The name pre-check gives a friendly error early, but the store's unique
//! constraint on target names stays authoritative: a
//! [`RepositoryError::UniqueViolation`] raised by the insert is converted
//! into the same [`ReconcileError::DuplicateTarget`].

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{Alert, AlertQuery, BrokerCapability, BrokerError, TargetCandidate};
use crate::db::repository::{RepositoryError, TargetRepository};
use crate::error::ErrorCategory;
use crate::models::{NewReducedDatum, Target, TargetId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerSettings {
    /// Compare names ignoring case, whitespace, `-` and `_`.
    pub fuzzy_name_matching: bool,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            fuzzy_name_matching: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// A proposed name already belongs to another target. The alert is
    /// handed back untouched for manual resolution.
    #[error("Name '{name}' already belongs to target {existing_target_id}")]
    DuplicateTarget {
        name: String,
        existing_target_id: TargetId,
        alert: Box<Alert>,
    },

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl ReconcileError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::DuplicateTarget { .. } => ErrorCategory::Conflict,
            Self::Broker(err) => err.category(),
            Self::Repository(err) => err.category(),
        }
    }
}

/// A conflict left for a human to resolve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileConflict {
    pub name: String,
    pub existing_target_id: TargetId,
    pub alert: Alert,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub created: Vec<Target>,
    pub conflicts: Vec<ReconcileConflict>,
    /// `(alert_id, message)` for alerts that failed for any other reason.
    pub errors: Vec<(String, String)>,
    /// Stream items the broker failed to deliver, so no alert id is known.
    #[serde(default)]
    pub fetch_errors: Vec<String>,
}

/// Key used to compare names under fuzzy matching.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

pub struct AlertReconciler<R: TargetRepository + ?Sized> {
    repo: Arc<R>,
    settings: ReconcilerSettings,
}

impl<R: TargetRepository + ?Sized> AlertReconciler<R> {
    pub fn new(repo: Arc<R>, settings: ReconcilerSettings) -> Self {
        Self { repo, settings }
    }

    /// Map `alert` to a newly created target.
    ///
    /// # Returns
    /// * `Err(ReconcileError::DuplicateTarget)` - The primary name or an
    ///   alias is already taken; nothing was written
    pub async fn reconcile(
        &self,
        alert: &Alert,
        broker: &dyn BrokerCapability,
    ) -> Result<Target, ReconcileError> {
        let candidate = broker.to_target(alert)?;
        let TargetCandidate {
            target,
            extras,
            aliases,
        } = candidate;
        let aliases = self.dedup_aliases(&target.name, aliases);

        if let Some((name, existing)) = self.find_taken_name(&target.name, &aliases).await? {
            warn!(
                broker = broker.name(),
                alert_id = %alert.alert_id,
                name = %name,
                existing_target = %existing,
                "Alert matches an existing target"
            );
            return Err(duplicate(name, existing, alert));
        }

        match self.repo.create_target(target, extras, aliases).await {
            Ok(details) => {
                info!(
                    broker = broker.name(),
                    alert_id = %alert.alert_id,
                    target_id = %details.target.id,
                    name = %details.target.name,
                    aliases = details.aliases.len(),
                    "Created target from alert"
                );
                Ok(details.target)
            }
            Err(RepositoryError::UniqueViolation {
                name,
                existing_target,
                ..
            }) => {
                warn!(
                    alert_id = %alert.alert_id,
                    name = %name,
                    "Name was taken concurrently"
                );
                Err(duplicate(name, existing_target, alert))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Reconcile every alert; failures are collected, never fatal.
    pub async fn reconcile_all<'a, I>(
        &self,
        alerts: I,
        broker: &dyn BrokerCapability,
    ) -> ReconcileReport
    where
        I: IntoIterator<Item = &'a Alert>,
    {
        let mut report = ReconcileReport::default();
        for alert in alerts {
            match self.reconcile(alert, broker).await {
                Ok(target) => report.created.push(target),
                Err(ReconcileError::DuplicateTarget {
                    name,
                    existing_target_id,
                    alert,
                }) => report.conflicts.push(ReconcileConflict {
                    name,
                    existing_target_id,
                    alert: *alert,
                }),
                Err(err) => report.errors.push((alert.alert_id.clone(), err.to_string())),
            }
        }
        report
    }

    /// Fetch alerts matching `query` from `broker` and reconcile them.
    pub async fn reconcile_query(
        &self,
        broker: &dyn BrokerCapability,
        query: &AlertQuery,
    ) -> Result<ReconcileReport, ReconcileError> {
        let mut stream = broker.fetch_alerts(query).await?;
        let mut alerts = Vec::new();
        let mut fetch_errors = Vec::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(alert) => alerts.push(alert),
                Err(err) => {
                    warn!(broker = broker.name(), error = %err, "Alert fetch failed");
                    fetch_errors.push(err.to_string());
                }
            }
        }
        debug!(broker = broker.name(), alerts = alerts.len(), "Fetched alerts");

        let mut report = self.reconcile_all(&alerts, broker).await;
        report.fetch_errors = fetch_errors;
        Ok(report)
    }

    /// Drop aliases repeating the primary name or each other.
    fn dedup_aliases(&self, primary: &str, aliases: Vec<String>) -> Vec<String> {
        let mut seen = vec![self.key(primary)];
        let mut unique = Vec::with_capacity(aliases.len());
        for alias in aliases {
            let alias = alias.trim().to_string();
            if alias.is_empty() {
                continue;
            }
            let key = self.key(&alias);
            if !seen.contains(&key) {
                seen.push(key);
                unique.push(alias);
            }
        }
        unique
    }

    fn key(&self, name: &str) -> String {
        if self.settings.fuzzy_name_matching {
            normalize_name(name)
        } else {
            name.to_string()
        }
    }

    async fn find_taken_name(
        &self,
        primary: &str,
        aliases: &[String],
    ) -> Result<Option<(String, TargetId)>, RepositoryError> {
        let proposed = std::iter::once(primary).chain(aliases.iter().map(String::as_str));

        if !self.settings.fuzzy_name_matching {
            for name in proposed {
                if let Some(existing) = self.repo.find_target_by_name(name).await? {
                    return Ok(Some((name.to_string(), existing)));
                }
            }
            return Ok(None);
        }

        let known: HashMap<String, TargetId> = self
            .repo
            .list_target_names()
            .await?
            .into_iter()
            .map(|entry| (normalize_name(&entry.name), entry.target_id))
            .collect();
        Ok(proposed
            .into_iter()
            .find_map(|name| known.get(&normalize_name(name)).map(|id| (name.to_string(), *id))))
    }
}

fn duplicate(name: String, existing_target_id: TargetId, alert: &Alert) -> ReconcileError {
    ReconcileError::DuplicateTarget {
        name,
        existing_target_id,
        alert: Box::new(alert.clone()),
    }
}

/// Pull time-series data for `target` from `broker` and store new points.
///
/// Points are keyed by (timestamp, source, target), so repeated calls are
/// idempotent. Returns the number of points inserted.
pub async fn process_reduced_data<R>(
    repo: &R,
    broker: &dyn BrokerCapability,
    target: &Target,
    alert: Option<&Alert>,
) -> Result<usize, ReconcileError>
where
    R: TargetRepository + ?Sized,
{
    let points = broker.fetch_reduced_data(target, alert).await?;
    let total = points.len();
    let mut inserted = 0;
    for point in points {
        let datum = NewReducedDatum {
            target_id: target.id,
            source_name: broker.name().to_string(),
            data_type: point.data_type,
            timestamp: point.timestamp,
            value: point.value,
        };
        if repo.insert_reduced_datum(datum).await?.is_some() {
            inserted += 1;
        }
    }
    debug!(
        broker = broker.name(),
        target_id = %target.id,
        fetched = total,
        inserted,
        "Processed reduced data"
    );
    Ok(inserted)
}
