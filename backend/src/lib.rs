//! # TOM Cadence Engine
//!
//! Decision logic of a Target and Observation Manager: automatic follow-up
//! observations driven by dynamic cadences, visibility windows and the
//! reconciliation of broker alerts into canonical targets.
//!
//! ## Architecture
//!
//! - [`models`]: Targets, observation groups and records, cadences, MJD time
//! - [`rise_set`]: Ordered index of rise/set intervals
//! - [`visibility`]: Sidereal time, altitude, airmass, Sun/Moon positions and
//!   rise/set interval search
//! - [`facility`]: The facility gateway seam and an in-memory facility
//! - [`brokers`]: Broker capability seam and the alert reconciler
//! - [`cadence`]: Cadence strategies, their registry and the batch runner
//! - [`db`]: Repository traits and the local in-memory store
//! - [`config`]: `tom-cadence.toml` loading
//!
//! The `tom-cadence` binary wires these together for scheduled runs.

// Allow large error types - RepositoryError contains rich context for debugging
#![allow(clippy::result_large_err)]

pub mod brokers;
pub mod cadence;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod facility;
pub mod models;
pub mod rise_set;
pub mod visibility;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::ErrorCategory;
