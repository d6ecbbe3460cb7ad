//! In-memory local repository implementation.
//!
//! Stores all data in ordered maps behind a single lock, so every trait
//! method is one transaction. Suitable for unit tests, local development and
//! the CLI (which can load and write back a JSON snapshot).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::db::repository::*;
use crate::models::*;

/// In-memory local repository.
///
/// # Example
/// ```
/// use tom_cadence::db::repositories::LocalRepository;
/// use tom_cadence::db::repository::ObservationRepository;
///
/// let rt = tokio::runtime::Runtime::new().unwrap();
/// rt.block_on(async {
///     let repo = LocalRepository::new();
///     let group = repo.create_observation_group("nightly").await.unwrap();
///     assert_eq!(repo.list_observation_groups().await.unwrap(), vec![group]);
/// });
/// ```
#[derive(Clone)]
pub struct LocalRepository {
    data: Arc<RwLock<LocalData>>,
    clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NameEntry {
    target_id: TargetId,
    primary: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LocalData {
    groups: BTreeMap<ObservationGroupId, ObservationGroup>,
    records: BTreeMap<ObservationRecordId, ObservationRecord>,
    cadences: BTreeMap<DynamicCadenceId, DynamicCadence>,
    targets: BTreeMap<TargetId, Target>,
    /// Unique name index over primary names and aliases.
    names: BTreeMap<String, NameEntry>,
    extras: Vec<TargetExtra>,
    reduced_data: BTreeMap<ReducedDatumId, ReducedDatum>,

    // ID counters
    next_group_id: i64,
    next_record_id: i64,
    next_cadence_id: i64,
    next_target_id: i64,
    next_datum_id: i64,

    // Connection health
    #[serde(skip, default = "healthy")]
    is_healthy: bool,
}

fn healthy() -> bool {
    true
}

impl Default for LocalData {
    fn default() -> Self {
        Self {
            groups: BTreeMap::new(),
            records: BTreeMap::new(),
            cadences: BTreeMap::new(),
            targets: BTreeMap::new(),
            names: BTreeMap::new(),
            extras: Vec::new(),
            reduced_data: BTreeMap::new(),
            next_group_id: 1,
            next_record_id: 1,
            next_cadence_id: 1,
            next_target_id: 1,
            next_datum_id: 1,
            is_healthy: true,
        }
    }
}

impl LocalData {
    fn insert_record(
        &mut self,
        record: NewObservationRecord,
        now: DateTime<Utc>,
    ) -> RepositoryResult<ObservationRecord> {
        if !self.targets.contains_key(&record.target_id) {
            return Err(RepositoryError::not_found_with_context(
                format!("Target {} not found", record.target_id),
                ErrorContext::new("create_observation_record").with_entity("target"),
            ));
        }
        if let Some(group_id) = record.observation_group_id {
            if !self.groups.contains_key(&group_id) {
                return Err(RepositoryError::not_found_with_context(
                    format!("Observation group {} not found", group_id),
                    ErrorContext::new("create_observation_record").with_entity("observation_group"),
                ));
            }
        }

        let id = ObservationRecordId(self.next_record_id);
        self.next_record_id += 1;
        let stored = ObservationRecord {
            id,
            facility: record.facility,
            observation_id: record.observation_id,
            target_id: record.target_id,
            parameters: record.parameters,
            status: record.status,
            created: now,
            modified: now,
            scheduled_start: record.scheduled_start,
            scheduled_end: record.scheduled_end,
            observation_group_id: record.observation_group_id,
        };
        self.records.insert(id, stored.clone());
        if let Some(group_id) = stored.observation_group_id {
            if let Some(group) = self.groups.get_mut(&group_id) {
                group.modified = now;
            }
        }
        Ok(stored)
    }

    fn details(&self, target_id: TargetId) -> RepositoryResult<TargetDetails> {
        let target = self.targets.get(&target_id).cloned().ok_or_else(|| {
            RepositoryError::not_found(format!("Target {} not found", target_id))
        })?;
        let aliases = self
            .names
            .iter()
            .filter(|(_, entry)| entry.target_id == target_id && !entry.primary)
            .map(|(name, _)| TargetName {
                target_id,
                name: name.clone(),
            })
            .collect();
        let extras = self
            .extras
            .iter()
            .filter(|e| e.target_id == target_id)
            .cloned()
            .collect();
        Ok(TargetDetails {
            target,
            aliases,
            extras,
        })
    }
}

impl LocalRepository {
    /// Create a new empty local repository.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty repository stamping rows with `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            data: Arc::new(RwLock::new(LocalData::default())),
            clock,
        }
    }

    /// Load a repository from a JSON snapshot written by [`Self::save_snapshot`].
    pub fn load_snapshot<P: AsRef<Path>>(path: P, clock: Arc<dyn Clock>) -> RepositoryResult<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            RepositoryError::configuration(format!(
                "Failed to read snapshot {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let data: LocalData = serde_json::from_str(&content)?;
        Ok(Self {
            data: Arc::new(RwLock::new(data)),
            clock,
        })
    }

    /// Write the whole store as pretty JSON.
    pub fn save_snapshot<P: AsRef<Path>>(&self, path: P) -> RepositoryResult<()> {
        let json = serde_json::to_string_pretty(&*self.data.read())?;
        fs::write(path.as_ref(), json).map_err(|e| {
            RepositoryError::internal(format!(
                "Failed to write snapshot {}: {}",
                path.as_ref().display(),
                e
            ))
        })
    }

    /// Set the health status for testing connection failures.
    pub fn set_healthy(&self, healthy: bool) {
        self.data.write().is_healthy = healthy;
    }

    pub fn record_count(&self) -> usize {
        self.data.read().records.len()
    }

    /// Helper to check health and return error if unhealthy.
    fn check_health(&self) -> RepositoryResult<()> {
        if !self.data.read().is_healthy {
            return Err(RepositoryError::connection("Store is not healthy"));
        }
        Ok(())
    }
}

impl Default for LocalRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObservationRepository for LocalRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        Ok(self.data.read().is_healthy)
    }

    async fn create_observation_group(&self, name: &str) -> RepositoryResult<ObservationGroup> {
        self.check_health()?;
        let now = self.clock.now();
        let mut data = self.data.write();
        let id = ObservationGroupId(data.next_group_id);
        data.next_group_id += 1;
        let group = ObservationGroup {
            id,
            name: name.to_string(),
            created: now,
            modified: now,
        };
        data.groups.insert(id, group.clone());
        Ok(group)
    }

    async fn get_observation_group(
        &self,
        group_id: ObservationGroupId,
    ) -> RepositoryResult<ObservationGroup> {
        self.check_health()?;
        self.data.read().groups.get(&group_id).cloned().ok_or_else(|| {
            RepositoryError::not_found(format!("Observation group {} not found", group_id))
        })
    }

    async fn list_observation_groups(&self) -> RepositoryResult<Vec<ObservationGroup>> {
        self.check_health()?;
        Ok(self.data.read().groups.values().cloned().collect())
    }

    async fn delete_observation_group(
        &self,
        group_id: ObservationGroupId,
    ) -> RepositoryResult<usize> {
        self.check_health()?;
        let mut data = self.data.write();
        if !data.groups.contains_key(&group_id) {
            return Err(RepositoryError::not_found(format!(
                "Observation group {} not found",
                group_id
            )));
        }
        if data
            .cadences
            .values()
            .any(|c| c.observation_group_id == group_id && c.active)
        {
            return Err(RepositoryError::validation_with_context(
                format!("Observation group {} is driven by an active cadence", group_id),
                ErrorContext::new("delete_observation_group")
                    .with_entity("observation_group")
                    .with_entity_id(group_id),
            ));
        }

        data.cadences.retain(|_, c| c.observation_group_id != group_id);
        data.groups.remove(&group_id);
        let mut orphaned = 0;
        for record in data.records.values_mut() {
            if record.observation_group_id == Some(group_id) {
                record.observation_group_id = None;
                orphaned += 1;
            }
        }
        Ok(orphaned)
    }

    async fn create_observation_record(
        &self,
        record: NewObservationRecord,
    ) -> RepositoryResult<ObservationRecord> {
        self.check_health()?;
        let now = self.clock.now();
        self.data.write().insert_record(record, now)
    }

    async fn get_observation_record(
        &self,
        record_id: ObservationRecordId,
    ) -> RepositoryResult<ObservationRecord> {
        self.check_health()?;
        self.data.read().records.get(&record_id).cloned().ok_or_else(|| {
            RepositoryError::not_found(format!("Observation record {} not found", record_id))
        })
    }

    async fn list_records_for_group(
        &self,
        group_id: ObservationGroupId,
    ) -> RepositoryResult<Vec<ObservationRecord>> {
        self.check_health()?;
        let mut records: Vec<ObservationRecord> = self
            .data
            .read()
            .records
            .values()
            .filter(|r| r.observation_group_id == Some(group_id))
            .cloned()
            .collect();
        records.sort_by(|a, b| a.created.cmp(&b.created).then(a.id.cmp(&b.id)));
        Ok(records)
    }

    async fn list_records_for_target(
        &self,
        target_id: TargetId,
    ) -> RepositoryResult<Vec<ObservationRecord>> {
        self.check_health()?;
        Ok(self
            .data
            .read()
            .records
            .values()
            .filter(|r| r.target_id == target_id)
            .cloned()
            .collect())
    }

    async fn update_observation_status(
        &self,
        record_id: ObservationRecordId,
        status: ObservationStatus,
        modified: DateTime<Utc>,
    ) -> RepositoryResult<ObservationRecord> {
        self.check_health()?;
        let mut data = self.data.write();
        let record = data.records.get_mut(&record_id).ok_or_else(|| {
            RepositoryError::not_found(format!("Observation record {} not found", record_id))
        })?;
        if record.status != status {
            record.status = status;
            record.modified = modified;
        }
        Ok(record.clone())
    }
}

#[async_trait]
impl CadenceRepository for LocalRepository {
    async fn create_dynamic_cadence(
        &self,
        group_id: ObservationGroupId,
        cadence_strategy: &str,
        cadence_parameters: CadenceParameters,
        active: bool,
    ) -> RepositoryResult<DynamicCadence> {
        self.check_health()?;
        let now = self.clock.now();
        let mut data = self.data.write();
        if !data.groups.contains_key(&group_id) {
            return Err(RepositoryError::not_found(format!(
                "Observation group {} not found",
                group_id
            )));
        }
        let id = DynamicCadenceId(data.next_cadence_id);
        data.next_cadence_id += 1;
        let cadence = DynamicCadence {
            id,
            observation_group_id: group_id,
            cadence_strategy: cadence_strategy.to_string(),
            cadence_parameters,
            active,
            created: now,
            modified: now,
            version: 0,
        };
        data.cadences.insert(id, cadence.clone());
        Ok(cadence)
    }

    async fn get_dynamic_cadence(
        &self,
        cadence_id: DynamicCadenceId,
    ) -> RepositoryResult<DynamicCadence> {
        self.check_health()?;
        self.data.read().cadences.get(&cadence_id).cloned().ok_or_else(|| {
            RepositoryError::not_found(format!("Dynamic cadence {} not found", cadence_id))
        })
    }

    async fn list_active_cadences(&self) -> RepositoryResult<Vec<DynamicCadence>> {
        self.check_health()?;
        Ok(self
            .data
            .read()
            .cadences
            .values()
            .filter(|c| c.active)
            .cloned()
            .collect())
    }

    async fn list_cadences_for_group(
        &self,
        group_id: ObservationGroupId,
    ) -> RepositoryResult<Vec<DynamicCadence>> {
        self.check_health()?;
        Ok(self
            .data
            .read()
            .cadences
            .values()
            .filter(|c| c.observation_group_id == group_id)
            .cloned()
            .collect())
    }

    async fn commit_cadence_run(
        &self,
        commit: CadenceRunCommit,
    ) -> RepositoryResult<Vec<ObservationRecord>> {
        self.check_health()?;
        let now = self.clock.now();
        let mut data = self.data.write();
        let context = ErrorContext::new("commit_cadence_run")
            .with_entity("dynamic_cadence")
            .with_entity_id(commit.cadence_id);

        let stored_version = data
            .cadences
            .get(&commit.cadence_id)
            .map(|c| c.version)
            .ok_or_else(|| {
                RepositoryError::not_found_with_context(
                    format!("Dynamic cadence {} not found", commit.cadence_id),
                    context.clone(),
                )
            })?;
        if stored_version != commit.expected_version {
            return Err(RepositoryError::concurrent_modification(
                format!(
                    "cadence is at version {} but run started from version {}",
                    stored_version, commit.expected_version
                ),
                context,
            ));
        }

        // Validate everything before the first write so a failure leaves no trace.
        for record in &commit.new_records {
            if !data.targets.contains_key(&record.target_id) {
                return Err(RepositoryError::not_found_with_context(
                    format!("Target {} not found", record.target_id),
                    context.clone(),
                ));
            }
            if let Some(group_id) = record.observation_group_id {
                if !data.groups.contains_key(&group_id) {
                    return Err(RepositoryError::not_found_with_context(
                        format!("Observation group {} not found", group_id),
                        context.clone(),
                    ));
                }
            }
        }

        let mut created = Vec::with_capacity(commit.new_records.len());
        for record in commit.new_records {
            created.push(data.insert_record(record, now)?);
        }
        if let Some(cadence) = data.cadences.get_mut(&commit.cadence_id) {
            cadence.cadence_parameters = commit.cadence_parameters;
            cadence.active = commit.active;
            cadence.modified = commit.modified;
            cadence.version += 1;
        }
        Ok(created)
    }
}

#[async_trait]
impl TargetRepository for LocalRepository {
    async fn create_target(
        &self,
        target: NewTarget,
        extras: Vec<(String, String)>,
        aliases: Vec<String>,
    ) -> RepositoryResult<TargetDetails> {
        self.check_health()?;
        let now = self.clock.now();
        let mut data = self.data.write();

        for name in std::iter::once(&target.name).chain(aliases.iter()) {
            if let Some(entry) = data.names.get(name) {
                return Err(RepositoryError::unique_violation(name.clone(), entry.target_id)
                    .with_operation("create_target"));
            }
        }

        let id = TargetId(data.next_target_id);
        data.next_target_id += 1;
        data.names.insert(
            target.name.clone(),
            NameEntry {
                target_id: id,
                primary: true,
            },
        );
        for alias in aliases {
            // A repeated alias within one candidate collapses to one row.
            data.names.entry(alias).or_insert(NameEntry {
                target_id: id,
                primary: false,
            });
        }
        for (key, value) in extras {
            data.extras.push(TargetExtra {
                target_id: id,
                key,
                value,
            });
        }
        data.targets.insert(
            id,
            Target {
                id,
                name: target.name,
                target_type: target.target_type,
                ra: target.ra,
                dec: target.dec,
                epoch: target.epoch,
                created: now,
                modified: now,
            },
        );
        data.details(id)
    }

    async fn get_target(&self, target_id: TargetId) -> RepositoryResult<Target> {
        self.check_health()?;
        self.data.read().targets.get(&target_id).cloned().ok_or_else(|| {
            RepositoryError::not_found(format!("Target {} not found", target_id))
        })
    }

    async fn get_target_details(&self, target_id: TargetId) -> RepositoryResult<TargetDetails> {
        self.check_health()?;
        self.data.read().details(target_id)
    }

    async fn find_target_by_name(&self, name: &str) -> RepositoryResult<Option<TargetId>> {
        self.check_health()?;
        Ok(self.data.read().names.get(name).map(|e| e.target_id))
    }

    async fn list_target_names(&self) -> RepositoryResult<Vec<TargetName>> {
        self.check_health()?;
        Ok(self
            .data
            .read()
            .names
            .iter()
            .map(|(name, entry)| TargetName {
                target_id: entry.target_id,
                name: name.clone(),
            })
            .collect())
    }

    async fn list_targets(&self) -> RepositoryResult<Vec<Target>> {
        self.check_health()?;
        Ok(self.data.read().targets.values().cloned().collect())
    }

    async fn count_targets(&self) -> RepositoryResult<usize> {
        self.check_health()?;
        Ok(self.data.read().targets.len())
    }

    async fn add_target_extra(&self, extra: TargetExtra) -> RepositoryResult<()> {
        self.check_health()?;
        let mut data = self.data.write();
        if !data.targets.contains_key(&extra.target_id) {
            return Err(RepositoryError::not_found(format!(
                "Target {} not found",
                extra.target_id
            )));
        }
        data.extras
            .retain(|e| !(e.target_id == extra.target_id && e.key == extra.key));
        data.extras.push(extra);
        Ok(())
    }

    async fn delete_target(&self, target_id: TargetId) -> RepositoryResult<()> {
        self.check_health()?;
        let mut data = self.data.write();
        if data.targets.remove(&target_id).is_none() {
            return Err(RepositoryError::not_found(format!(
                "Target {} not found",
                target_id
            )));
        }
        data.names.retain(|_, entry| entry.target_id != target_id);
        data.extras.retain(|e| e.target_id != target_id);
        data.reduced_data.retain(|_, d| d.target_id != target_id);
        Ok(())
    }

    async fn insert_reduced_datum(
        &self,
        datum: NewReducedDatum,
    ) -> RepositoryResult<Option<ReducedDatum>> {
        self.check_health()?;
        let mut data = self.data.write();
        if !data.targets.contains_key(&datum.target_id) {
            return Err(RepositoryError::not_found(format!(
                "Target {} not found",
                datum.target_id
            )));
        }
        let key = datum.dedup_key();
        let exists = data.reduced_data.values().any(|d| {
            (d.timestamp, d.source_name.as_str(), d.target_id) == key
        });
        if exists {
            return Ok(None);
        }
        let id = ReducedDatumId(data.next_datum_id);
        data.next_datum_id += 1;
        let stored = ReducedDatum {
            id,
            target_id: datum.target_id,
            source_name: datum.source_name,
            data_type: datum.data_type,
            timestamp: datum.timestamp,
            value: datum.value,
        };
        data.reduced_data.insert(id, stored.clone());
        Ok(Some(stored))
    }

    async fn list_reduced_data(&self, target_id: TargetId) -> RepositoryResult<Vec<ReducedDatum>> {
        self.check_health()?;
        let mut points: Vec<ReducedDatum> = self
            .data
            .read()
            .reduced_data
            .values()
            .filter(|d| d.target_id == target_id)
            .cloned()
            .collect();
        points.sort_by_key(|d| d.timestamp);
        Ok(points)
    }
}
