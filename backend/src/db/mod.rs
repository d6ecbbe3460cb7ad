//! Persistent store for cadences, observations and targets.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Cadence runner / alert reconciler / CLI                │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Repository traits (repository/) - Abstract Interface   │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//!     ┌───────────────▼──────────────────────────────┐
//!     │             Local Repository                  │
//!     │     (in-memory, optional JSON snapshot)       │
//!     └──────────────────────────────────────────────┘
//! ```
//!
//! Uniqueness of target names and the optimistic check on cadence updates
//! are enforced inside the store, never by callers.

pub mod factory;
pub mod repo_config;
pub mod repositories;
pub mod repository;

pub use factory::RepositoryFactory;
pub use repo_config::{RepositorySettings, RepositoryType};
pub use repositories::LocalRepository;
pub use repository::{
    CadenceRepository, CadenceRunCommit, ErrorContext, FullRepository, ObservationRepository,
    RepositoryError, RepositoryResult, TargetRepository,
};
