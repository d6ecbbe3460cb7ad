//! Repository trait for targets and their attached data.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::models::{
    NewReducedDatum, NewTarget, ReducedDatum, Target, TargetDetails, TargetExtra, TargetId,
    TargetName,
};

#[async_trait]
pub trait TargetRepository: Send + Sync {
    /// Store a target with its extras and aliases in one transaction.
    ///
    /// The target's primary name and every alias share one namespace and
    /// must be unique across all targets.
    ///
    /// # Returns
    /// * `Err(RepositoryError::UniqueViolation)` - If any name is taken;
    ///   nothing is written
    async fn create_target(
        &self,
        target: NewTarget,
        extras: Vec<(String, String)>,
        aliases: Vec<String>,
    ) -> RepositoryResult<TargetDetails>;

    async fn get_target(&self, target_id: TargetId) -> RepositoryResult<Target>;

    async fn get_target_details(&self, target_id: TargetId) -> RepositoryResult<TargetDetails>;

    /// Exact lookup across primary names and aliases.
    async fn find_target_by_name(&self, name: &str) -> RepositoryResult<Option<TargetId>>;

    /// Every known name (primary names and aliases) with its owner.
    async fn list_target_names(&self) -> RepositoryResult<Vec<TargetName>>;

    async fn list_targets(&self) -> RepositoryResult<Vec<Target>>;

    async fn count_targets(&self) -> RepositoryResult<usize>;

    async fn add_target_extra(&self, extra: TargetExtra) -> RepositoryResult<()>;

    /// Delete a target together with its aliases, extras and reduced data.
    async fn delete_target(&self, target_id: TargetId) -> RepositoryResult<()>;

    /// Insert a data point unless one with the same (timestamp, source,
    /// target) exists.
    ///
    /// # Returns
    /// * `Ok(Some(datum))` - Newly inserted
    /// * `Ok(None)` - Already present
    async fn insert_reduced_datum(
        &self,
        datum: NewReducedDatum,
    ) -> RepositoryResult<Option<ReducedDatum>>;

    async fn list_reduced_data(&self, target_id: TargetId) -> RepositoryResult<Vec<ReducedDatum>>;
}
