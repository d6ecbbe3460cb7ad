//! Repository trait definitions for the persistent store.
//!
//! Responsibilities are split across focused traits:
//!
//! - [`error`]: Error types for repository operations
//! - [`observation`]: Observation groups and submitted records
//! - [`cadence`]: Dynamic cadences and the atomic per-run commit
//! - [`target`]: Targets, aliases, extras and reduced data
//!
//! For code that needs every capability, use the [`FullRepository`] bound.

pub mod cadence;
pub mod error;
pub mod observation;
pub mod target;

pub use error::{ErrorContext, RepositoryError, RepositoryResult};

pub use cadence::{CadenceRepository, CadenceRunCommit};
pub use observation::ObservationRepository;
pub use target::TargetRepository;

/// Composite trait bound for a complete repository implementation.
///
/// Automatically implemented for any type implementing all three
/// repository traits.
pub trait FullRepository: ObservationRepository + CadenceRepository + TargetRepository {}

impl<T> FullRepository for T where T: ObservationRepository + CadenceRepository + TargetRepository {}
