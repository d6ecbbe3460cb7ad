//! Repository trait for observation groups and records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::RepositoryResult;
use crate::models::{
    NewObservationRecord, ObservationGroup, ObservationGroupId, ObservationRecord,
    ObservationRecordId, ObservationStatus, TargetId,
};

/// Store operations for observation groups and the records they collect.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` to work with async Rust.
#[async_trait]
pub trait ObservationRepository: Send + Sync {
    /// Check if the store is reachable.
    async fn health_check(&self) -> RepositoryResult<bool>;

    async fn create_observation_group(&self, name: &str) -> RepositoryResult<ObservationGroup>;

    /// # Returns
    /// * `Err(RepositoryError::NotFound)` - If the group doesn't exist
    async fn get_observation_group(
        &self,
        group_id: ObservationGroupId,
    ) -> RepositoryResult<ObservationGroup>;

    async fn list_observation_groups(&self) -> RepositoryResult<Vec<ObservationGroup>>;

    /// Delete a group.
    ///
    /// Records of the group are kept and become ungrouped. Fails with a
    /// validation error while an active cadence still drives the group;
    /// inactive cadences of the group are removed.
    ///
    /// # Returns
    /// * `Ok(usize)` - Number of records orphaned
    async fn delete_observation_group(&self, group_id: ObservationGroupId)
        -> RepositoryResult<usize>;

    async fn create_observation_record(
        &self,
        record: NewObservationRecord,
    ) -> RepositoryResult<ObservationRecord>;

    async fn get_observation_record(
        &self,
        record_id: ObservationRecordId,
    ) -> RepositoryResult<ObservationRecord>;

    /// Records of a group, oldest first (by `created`, then id).
    async fn list_records_for_group(
        &self,
        group_id: ObservationGroupId,
    ) -> RepositoryResult<Vec<ObservationRecord>>;

    async fn list_records_for_target(
        &self,
        target_id: TargetId,
    ) -> RepositoryResult<Vec<ObservationRecord>>;

    /// Record a status fetched from the facility.
    async fn update_observation_status(
        &self,
        record_id: ObservationRecordId,
        status: ObservationStatus,
        modified: DateTime<Utc>,
    ) -> RepositoryResult<ObservationRecord>;
}
