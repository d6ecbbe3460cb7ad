//! Dynamic cadence engine.
//!
//! A [`CadenceStrategy`] looks at an observation group's history and
//! decides which follow-up requests to submit. The [`CadenceRunner`] drives
//! all active cadences against the store and the facilities.
//!
//! ```text
//! CadenceRunner ──► StrategyRegistry ──► CadenceStrategy::run (pure)
//!      │                                        │
//!      ├──► FacilityGateway (status, submit)    ▼
//!      └──► FullRepository::commit_cadence_run ◄─ StrategyDecision
//! ```

pub mod error;
pub mod registry;
pub mod resume;
pub mod retry;
pub mod runner;
pub mod strategy;

pub use error::{CadenceError, CadenceResult};
pub use registry::StrategyRegistry;
pub use resume::ResumeCadenceAfterFailure;
pub use retry::RetryFailedObservations;
pub use runner::{
    CadenceFailure, CadenceOutcome, CadenceRunner, RunReport, RunnerSettings, SubmissionFailure,
};
pub use strategy::{CadenceStrategy, StrategyDecision, StrategyInput};
