//! In-memory facility.
//!
//! Assigns UUID observation ids, keeps every submission, and lets tests
//! drive status transitions and inject failures.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::{FacilityError, FacilityGateway, FacilityResult};
use crate::models::{ObservationStatus, Parameters};

#[derive(Debug, Clone)]
pub struct SimulatedObservation {
    pub observation_id: String,
    pub parameters: Parameters,
    pub status: ObservationStatus,
}

#[derive(Default)]
struct SimulatedState {
    observations: HashMap<String, SimulatedObservation>,
    submission_order: Vec<String>,
    cancelled: Vec<String>,
    unavailable: bool,
    reject_reason: Option<String>,
    /// Failures handed out by the next `submit` calls, front first.
    queued_submit_failures: Vec<FacilityError>,
}

#[derive(Clone)]
pub struct SimulatedFacility {
    name: String,
    required_fields: Vec<String>,
    state: Arc<RwLock<SimulatedState>>,
}

impl SimulatedFacility {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required_fields: Vec::new(),
            state: Arc::new(RwLock::new(SimulatedState::default())),
        }
    }

    /// Reject submissions missing any of `fields`.
    pub fn with_required_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Reject every submission with `reason` (`None` to accept again).
    pub fn set_reject_all(&self, reason: Option<&str>) {
        self.state.write().reject_reason = reason.map(str::to_string);
    }

    /// Simulate the facility being unreachable for every call.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.write().unavailable = unavailable;
    }

    /// Make the next `submit` fail with `error`.
    pub fn fail_next_submit(&self, error: FacilityError) {
        self.state.write().queued_submit_failures.push(error);
    }

    /// Register an observation that was submitted outside this process.
    pub fn seed(&self, observation_id: &str, parameters: Parameters, status: ObservationStatus) {
        let mut state = self.state.write();
        state.submission_order.push(observation_id.to_string());
        state.observations.insert(
            observation_id.to_string(),
            SimulatedObservation {
                observation_id: observation_id.to_string(),
                parameters,
                status,
            },
        );
    }

    pub fn set_status(&self, observation_id: &str, status: ObservationStatus) -> bool {
        match self.state.write().observations.get_mut(observation_id) {
            Some(obs) => {
                obs.status = status;
                true
            }
            None => false,
        }
    }

    /// Submissions in order.
    pub fn submitted(&self) -> Vec<SimulatedObservation> {
        let state = self.state.read();
        state
            .submission_order
            .iter()
            .filter_map(|id| state.observations.get(id).cloned())
            .collect()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.state.read().cancelled.clone()
    }

    fn check_available(&self, state: &SimulatedState) -> FacilityResult<()> {
        if state.unavailable {
            return Err(FacilityError::Unavailable {
                facility: self.name.clone(),
                message: "connection refused".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl FacilityGateway for SimulatedFacility {
    fn name(&self) -> &str {
        &self.name
    }

    async fn submit(&self, parameters: &Parameters) -> FacilityResult<Vec<String>> {
        let mut state = self.state.write();
        self.check_available(&state)?;
        if !state.queued_submit_failures.is_empty() {
            return Err(state.queued_submit_failures.remove(0));
        }
        if let Some(reason) = &state.reject_reason {
            return Err(FacilityError::Rejected {
                facility: self.name.clone(),
                reason: reason.clone(),
            });
        }
        if let Some(missing) = self
            .required_fields
            .iter()
            .find(|field| !parameters.contains_key(field.as_str()))
        {
            return Err(FacilityError::Rejected {
                facility: self.name.clone(),
                reason: format!("missing required field '{}'", missing),
            });
        }

        let observation_id = Uuid::new_v4().to_string();
        state.submission_order.push(observation_id.clone());
        state.observations.insert(
            observation_id.clone(),
            SimulatedObservation {
                observation_id: observation_id.clone(),
                parameters: parameters.clone(),
                status: ObservationStatus::Pending,
            },
        );
        Ok(vec![observation_id])
    }

    async fn status(&self, observation_id: &str) -> FacilityResult<ObservationStatus> {
        let state = self.state.read();
        self.check_available(&state)?;
        state
            .observations
            .get(observation_id)
            .map(|obs| obs.status)
            .ok_or_else(|| FacilityError::UnknownObservation {
                facility: self.name.clone(),
                observation_id: observation_id.to_string(),
            })
    }

    async fn cancel(&self, observation_id: &str) -> FacilityResult<bool> {
        let mut state = self.state.write();
        self.check_available(&state)?;
        let cancelled = match state.observations.get_mut(observation_id) {
            Some(obs) if obs.status.is_pending() => {
                obs.status = ObservationStatus::Canceled;
                true
            }
            Some(_) => false,
            None => {
                return Err(FacilityError::UnknownObservation {
                    facility: self.name.clone(),
                    observation_id: observation_id.to_string(),
                })
            }
        };
        if cancelled {
            state.cancelled.push(observation_id.to_string());
        }
        Ok(cancelled)
    }
}
