//! Repository trait for dynamic cadences.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::RepositoryResult;
use crate::models::{
    CadenceParameters, DynamicCadence, DynamicCadenceId, NewObservationRecord,
    ObservationGroupId, ObservationRecord,
};

/// Everything one cadence run persists, applied as a single transaction.
#[derive(Debug, Clone)]
pub struct CadenceRunCommit {
    pub cadence_id: DynamicCadenceId,
    /// `version` of the cadence as loaded before the run. The commit fails
    /// with `ConcurrentModification` if the stored value differs.
    pub expected_version: u64,
    pub cadence_parameters: CadenceParameters,
    pub active: bool,
    pub modified: DateTime<Utc>,
    pub new_records: Vec<NewObservationRecord>,
}

#[async_trait]
pub trait CadenceRepository: Send + Sync {
    async fn create_dynamic_cadence(
        &self,
        group_id: ObservationGroupId,
        cadence_strategy: &str,
        cadence_parameters: CadenceParameters,
        active: bool,
    ) -> RepositoryResult<DynamicCadence>;

    async fn get_dynamic_cadence(&self, cadence_id: DynamicCadenceId)
        -> RepositoryResult<DynamicCadence>;

    /// Active cadences ordered by id.
    async fn list_active_cadences(&self) -> RepositoryResult<Vec<DynamicCadence>>;

    async fn list_cadences_for_group(
        &self,
        group_id: ObservationGroupId,
    ) -> RepositoryResult<Vec<DynamicCadence>>;

    /// Insert the run's new records and update the cadence atomically.
    ///
    /// # Returns
    /// * `Ok(Vec<ObservationRecord>)` - The records created by the commit
    /// * `Err(RepositoryError::ConcurrentModification)` - If the cadence was
    ///   committed since `expected_version`; nothing is written
    async fn commit_cadence_run(
        &self,
        commit: CadenceRunCommit,
    ) -> RepositoryResult<Vec<ObservationRecord>>;
}
