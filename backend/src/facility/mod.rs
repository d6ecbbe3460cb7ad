//! Remote observing facilities.
//!
//! The cadence engine talks to telescopes only through [`FacilityGateway`].
//! Concrete HTTP clients live outside this crate; [`SimulatedFacility`]
//! is the in-process implementation used by tests and the CLI.

pub mod error;
pub mod simulated;

pub use error::{FacilityError, FacilityResult};
pub use simulated::SimulatedFacility;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::models::{ObservationStatus, Parameters};

/// Capability exposed by an observatory scheduling system.
#[async_trait]
pub trait FacilityGateway: Send + Sync {
    /// Name records use to refer to this facility.
    fn name(&self) -> &str;

    /// Submit one request.
    ///
    /// A single request may expand into several facility observations, so
    /// every assigned id is returned.
    async fn submit(&self, parameters: &Parameters) -> FacilityResult<Vec<String>>;

    async fn status(&self, observation_id: &str) -> FacilityResult<ObservationStatus>;

    /// # Returns
    /// * `Ok(true)` - The observation was cancelled
    /// * `Ok(false)` - It could no longer be cancelled (already terminal)
    async fn cancel(&self, observation_id: &str) -> FacilityResult<bool>;
}

/// Facilities by name.
#[derive(Clone, Default)]
pub struct FacilityRegistry {
    facilities: BTreeMap<String, Arc<dyn FacilityGateway>>,
}

impl FacilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a facility under its own name, replacing any previous one.
    pub fn register(&mut self, facility: Arc<dyn FacilityGateway>) {
        self.facilities.insert(facility.name().to_string(), facility);
    }

    pub fn with(mut self, facility: Arc<dyn FacilityGateway>) -> Self {
        self.register(facility);
        self
    }

    pub fn get(&self, name: &str) -> FacilityResult<Arc<dyn FacilityGateway>> {
        self.facilities
            .get(name)
            .cloned()
            .ok_or_else(|| FacilityError::UnknownFacility {
                name: name.to_string(),
            })
    }

    pub fn names(&self) -> Vec<String> {
        self.facilities.keys().cloned().collect()
    }
}

/// Bound a facility call. Elapsed time becomes a retryable [`FacilityError::Timeout`].
pub async fn with_timeout<T, F>(
    facility: &str,
    operation: &'static str,
    timeout: Duration,
    call: F,
) -> FacilityResult<T>
where
    F: Future<Output = FacilityResult<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(FacilityError::Timeout {
            facility: facility.to_string(),
            operation,
            after: timeout,
        }),
    }
}
