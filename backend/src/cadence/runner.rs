//! Batch orchestration of dynamic cadences.
//!
//! One cadence run is: resolve its strategy, refresh the statuses of the
//! group's unfinished records, ask the strategy for a decision, submit the
//! requested observations and commit everything in one store transaction.
//! A failure stays confined to its cadence and ends up in the [`RunReport`].

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::error::{CadenceError, CadenceResult};
use super::registry::StrategyRegistry;
use super::strategy::StrategyInput;
use crate::clock::Clock;
use crate::db::repository::{CadenceRunCommit, FullRepository, RepositoryError};
use crate::error::ErrorCategory;
use crate::facility::{with_timeout, FacilityError, FacilityRegistry};
use crate::models::{
    DynamicCadence, DynamicCadenceId, NewObservationRecord, ObservationGroupId, ObservationRecord,
    ObservationStatus, ParameterSet, TargetId,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    pub facility_timeout_secs: u64,
    /// Groups processed at once. Cadences of one group never overlap.
    pub max_concurrent_groups: usize,
    /// Cancel the group's unfinished observations when a chain terminates.
    pub cancel_pending_on_deactivate: bool,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            facility_timeout_secs: 30,
            max_concurrent_groups: 1,
            cancel_pending_on_deactivate: false,
        }
    }
}

impl RunnerSettings {
    pub fn facility_timeout(&self) -> Duration {
        Duration::from_secs(self.facility_timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CadenceFailure {
    pub category: ErrorCategory,
    pub message: String,
}

impl From<&CadenceError> for CadenceFailure {
    fn from(err: &CadenceError) -> Self {
        Self {
            category: err.category(),
            message: err.to_string(),
        }
    }
}

/// A parameter set the facility did not accept. No record was created for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionFailure {
    pub cadence_id: DynamicCadenceId,
    pub facility: String,
    pub target_id: TargetId,
    pub category: ErrorCategory,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub succeeded: usize,
    pub failed: BTreeMap<DynamicCadenceId, CadenceFailure>,
    pub submission_failures: Vec<SubmissionFailure>,
    pub observations_created: usize,
    pub deactivated: Vec<DynamicCadenceId>,
    /// Requested cadences that were already inactive.
    pub skipped: Vec<DynamicCadenceId>,
}

impl RunReport {
    fn absorb(&mut self, cadence_id: DynamicCadenceId, result: CadenceResult<CadenceOutcome>) {
        match result {
            Ok(outcome) => {
                self.succeeded += 1;
                self.observations_created += outcome.created.len();
                self.submission_failures.extend(outcome.submission_failures);
                if outcome.deactivated {
                    self.deactivated.push(cadence_id);
                }
            }
            Err(err) => {
                self.failed.insert(cadence_id, CadenceFailure::from(&err));
            }
        }
    }

    fn merge(&mut self, other: RunReport) {
        self.succeeded += other.succeeded;
        self.failed.extend(other.failed);
        self.submission_failures.extend(other.submission_failures);
        self.observations_created += other.observations_created;
        self.deactivated.extend(other.deactivated);
        self.skipped.extend(other.skipped);
    }

    fn sort(&mut self) {
        self.deactivated.sort();
        self.skipped.sort();
        self.submission_failures.sort_by_key(|f| f.cadence_id);
    }
}

/// Result of one successful cadence run.
#[derive(Debug, Clone, Default)]
pub struct CadenceOutcome {
    pub created: Vec<ObservationRecord>,
    pub submission_failures: Vec<SubmissionFailure>,
    pub deactivated: bool,
}

pub struct CadenceRunner {
    repo: Arc<dyn FullRepository>,
    facilities: FacilityRegistry,
    strategies: StrategyRegistry,
    clock: Arc<dyn Clock>,
    settings: RunnerSettings,
}

impl CadenceRunner {
    pub fn new(
        repo: Arc<dyn FullRepository>,
        facilities: FacilityRegistry,
        strategies: StrategyRegistry,
        clock: Arc<dyn Clock>,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            repo,
            facilities,
            strategies,
            clock,
            settings,
        }
    }

    /// Run every active cadence.
    pub async fn run_all(&self) -> CadenceResult<RunReport> {
        let cadences = self.repo.list_active_cadences().await?;
        info!(cadences = cadences.len(), "Starting cadence run");
        let report = self.run_grouped(cadences).await;
        info!(
            succeeded = report.succeeded,
            failed = report.failed.len(),
            created = report.observations_created,
            deactivated = report.deactivated.len(),
            "Cadence run finished"
        );
        Ok(report)
    }

    /// Run a single cadence. An inactive cadence is reported as skipped and
    /// an unknown id as failed.
    pub async fn run_cadence(&self, cadence_id: DynamicCadenceId) -> CadenceResult<RunReport> {
        let cadence = match self.repo.get_dynamic_cadence(cadence_id).await {
            Ok(cadence) => cadence,
            Err(err @ RepositoryError::NotFound { .. }) => {
                let err = CadenceError::from(err);
                warn!(cadence_id = %cadence_id, error = %err, "Cadence not found");
                let mut report = RunReport::default();
                report.failed.insert(cadence_id, CadenceFailure::from(&err));
                return Ok(report);
            }
            Err(err) => return Err(err.into()),
        };
        if !cadence.active {
            debug!(cadence_id = %cadence_id, "Cadence inactive, skipping");
            return Ok(RunReport {
                skipped: vec![cadence_id],
                ..RunReport::default()
            });
        }
        Ok(self.run_grouped(vec![cadence]).await)
    }

    /// Run the active cadences of every group holding a record for `target_id`.
    pub async fn run_for_target(&self, target_id: TargetId) -> CadenceResult<RunReport> {
        let groups: BTreeSet<ObservationGroupId> = self
            .repo
            .list_records_for_target(target_id)
            .await?
            .into_iter()
            .filter_map(|r| r.observation_group_id)
            .collect();

        let mut cadences = Vec::new();
        for group_id in groups {
            cadences.extend(
                self.repo
                    .list_cadences_for_group(group_id)
                    .await?
                    .into_iter()
                    .filter(|c| c.active),
            );
        }
        info!(target_id = %target_id, cadences = cadences.len(), "Running cadences for target");
        Ok(self.run_grouped(cadences).await)
    }

    async fn run_grouped(&self, cadences: Vec<DynamicCadence>) -> RunReport {
        let mut by_group: BTreeMap<ObservationGroupId, Vec<DynamicCadence>> = BTreeMap::new();
        for cadence in cadences {
            by_group
                .entry(cadence.observation_group_id)
                .or_default()
                .push(cadence);
        }

        let concurrency = self.settings.max_concurrent_groups.max(1);
        let reports: Vec<RunReport> = stream::iter(by_group.into_values())
            .map(|group_cadences| self.run_group(group_cadences))
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut report = RunReport::default();
        for partial in reports {
            report.merge(partial);
        }
        report.sort();
        report
    }

    async fn run_group(&self, mut cadences: Vec<DynamicCadence>) -> RunReport {
        cadences.sort_by_key(|c| c.id);
        if cadences.len() > 1 {
            warn!(
                group_id = %cadences[0].observation_group_id,
                cadences = cadences.len(),
                "Group has more than one active cadence"
            );
        }
        let mut report = RunReport::default();
        for cadence in cadences {
            let cadence_id = cadence.id;
            let result = self.run_one(cadence).await;
            if let Err(err) = &result {
                warn!(
                    cadence_id = %cadence_id,
                    category = %err.category(),
                    error = %err,
                    "Cadence run failed"
                );
            }
            report.absorb(cadence_id, result);
        }
        report
    }

    async fn run_one(&self, cadence: DynamicCadence) -> CadenceResult<CadenceOutcome> {
        let strategy = self.strategies.resolve(&cadence.cadence_strategy)?;
        let group = self
            .repo
            .get_observation_group(cadence.observation_group_id)
            .await?;
        let records = self.refresh_statuses(cadence.observation_group_id).await?;

        let now = self.clock.now();
        let input = StrategyInput {
            group: &group,
            records: &records,
            now,
        };
        let decision = strategy.run(&input, &cadence.cadence_parameters)?;
        debug!(
            cadence_id = %cadence.id,
            group_id = %group.id,
            strategy = strategy.name(),
            requests = decision.parameter_sets.len(),
            should_continue = decision.should_continue,
            "Strategy decided"
        );

        let mut submission_failures = Vec::new();
        let mut new_records = Vec::new();
        for request in &decision.parameter_sets {
            match self.submit(request).await {
                Ok(ids) => new_records.extend(
                    ids.into_iter()
                        .map(|id| NewObservationRecord::submitted(request, id, Some(group.id))),
                ),
                Err(err) => {
                    warn!(
                        cadence_id = %cadence.id,
                        facility = %request.facility,
                        error = %err,
                        "Submission failed"
                    );
                    submission_failures.push(SubmissionFailure {
                        cadence_id: cadence.id,
                        facility: request.facility.clone(),
                        target_id: request.target_id,
                        category: err.category(),
                        message: err.to_string(),
                    });
                }
            }
        }

        let submitted: Vec<(String, String)> = new_records
            .iter()
            .map(|r| (r.facility.clone(), r.observation_id.clone()))
            .collect();
        let commit = CadenceRunCommit {
            cadence_id: cadence.id,
            expected_version: cadence.version,
            cadence_parameters: decision.updated_parameters,
            active: decision.should_continue,
            modified: now,
            new_records,
        };
        let created = match self.repo.commit_cadence_run(commit).await {
            Ok(created) => created,
            Err(err) => {
                self.cancel_orphans(cadence.id, &submitted).await;
                return Err(err.into());
            }
        };

        for record in &created {
            info!(
                cadence_id = %cadence.id,
                group_id = %group.id,
                facility = %record.facility,
                observation_id = %record.observation_id,
                "Submitted observation"
            );
        }

        let deactivated = !decision.should_continue;
        if deactivated {
            info!(cadence_id = %cadence.id, strategy = strategy.name(), "Cadence deactivated");
            if self.settings.cancel_pending_on_deactivate {
                self.cancel_pending(&records, now).await;
            }
        }

        Ok(CadenceOutcome {
            created,
            submission_failures,
            deactivated,
        })
    }

    /// Fetch fresh statuses for the group's unfinished records and persist them.
    ///
    /// Any facility error aborts the cadence run before the strategy sees
    /// stale data.
    async fn refresh_statuses(
        &self,
        group_id: ObservationGroupId,
    ) -> CadenceResult<Vec<ObservationRecord>> {
        let mut records = self.repo.list_records_for_group(group_id).await?;
        let timeout = self.settings.facility_timeout();
        for record in records.iter_mut().filter(|r| r.status.is_pending()) {
            let facility = self.facilities.get(&record.facility)?;
            let status = with_timeout(
                facility.name(),
                "status",
                timeout,
                facility.status(&record.observation_id),
            )
            .await?;
            if status != record.status {
                debug!(
                    observation_id = %record.observation_id,
                    from = %record.status,
                    to = %status,
                    "Observation status changed"
                );
                *record = self
                    .repo
                    .update_observation_status(record.id, status, self.clock.now())
                    .await?;
            }
        }
        Ok(records)
    }

    async fn submit(&self, request: &ParameterSet) -> Result<Vec<String>, FacilityError> {
        let facility = self.facilities.get(&request.facility)?;
        with_timeout(
            facility.name(),
            "submit",
            self.settings.facility_timeout(),
            facility.submit(&request.parameters),
        )
        .await
    }

    /// Best-effort cancellation of observations submitted by a run whose
    /// commit failed.
    async fn cancel_orphans(&self, cadence_id: DynamicCadenceId, submitted: &[(String, String)]) {
        for (facility_name, observation_id) in submitted {
            let Ok(facility) = self.facilities.get(facility_name) else {
                continue;
            };
            let result = with_timeout(
                facility.name(),
                "cancel",
                self.settings.facility_timeout(),
                facility.cancel(observation_id),
            )
            .await;
            match result {
                Ok(cancelled) => warn!(
                    cadence_id = %cadence_id,
                    observation_id = %observation_id,
                    cancelled,
                    "Cancelled observation after failed commit"
                ),
                Err(err) => warn!(
                    cadence_id = %cadence_id,
                    observation_id = %observation_id,
                    error = %err,
                    "Could not cancel observation after failed commit"
                ),
            }
        }
    }

    async fn cancel_pending(&self, records: &[ObservationRecord], now: DateTime<Utc>) {
        for record in records.iter().filter(|r| r.status.is_pending()) {
            let Ok(facility) = self.facilities.get(&record.facility) else {
                continue;
            };
            let result = with_timeout(
                facility.name(),
                "cancel",
                self.settings.facility_timeout(),
                facility.cancel(&record.observation_id),
            )
            .await;
            match result {
                Ok(true) => {
                    if let Err(err) = self
                        .repo
                        .update_observation_status(record.id, ObservationStatus::Canceled, now)
                        .await
                    {
                        warn!(
                            observation_id = %record.observation_id,
                            error = %err,
                            "Could not record cancellation"
                        );
                    }
                }
                Ok(false) => {}
                Err(err) => warn!(
                    observation_id = %record.observation_id,
                    error = %err,
                    "Could not cancel pending observation"
                ),
            }
        }
    }
}
