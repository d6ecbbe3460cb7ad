//! Repository factory for dependency injection.
//!
//! Creates repository instances from runtime configuration.

use std::sync::Arc;

use tracing::info;

use super::repo_config::{RepositorySettings, RepositoryType};
use super::repositories::LocalRepository;
use super::repository::{FullRepository, RepositoryError, RepositoryResult};
use crate::clock::Clock;

/// Repository factory for creating repository instances.
pub struct RepositoryFactory;

impl RepositoryFactory {
    /// Create an in-memory local repository.
    pub fn create_local(clock: Arc<dyn Clock>) -> Arc<LocalRepository> {
        Arc::new(LocalRepository::with_clock(clock))
    }

    /// Create the repository described by `[repository]` settings.
    ///
    /// For the local type, an existing `snapshot_path` is loaded; a missing
    /// file starts an empty store.
    pub fn from_settings(
        settings: &RepositorySettings,
        clock: Arc<dyn Clock>,
    ) -> RepositoryResult<Arc<LocalRepository>> {
        let repo_type = settings
            .repository_type()
            .map_err(RepositoryError::configuration)?;

        match repo_type {
            RepositoryType::Local => match &settings.snapshot_path {
                Some(path) if path.exists() => {
                    info!(path = %path.display(), "Loading store snapshot");
                    Ok(Arc::new(LocalRepository::load_snapshot(path, clock)?))
                }
                _ => Ok(Self::create_local(clock)),
            },
        }
    }

    /// Same as [`Self::from_settings`], erased to the trait object.
    pub fn create(
        settings: &RepositorySettings,
        clock: Arc<dyn Clock>,
    ) -> RepositoryResult<Arc<dyn FullRepository>> {
        Ok(Self::from_settings(settings, clock)? as Arc<dyn FullRepository>)
    }
}
