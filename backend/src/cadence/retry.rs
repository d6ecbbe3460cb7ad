//! Resubmit failed observations unchanged.
//!
//! Parameters: `retry_count` (default 0) and `max_retries` (absent means
//! unbounded). A failed record counts as outstanding until a later record
//! of the group carries the same facility, target and parameters.

use serde_json::Value;

use super::error::CadenceResult;
use super::strategy::{
    initial_parameter_set, optional_u32, CadenceStrategy, StrategyDecision, StrategyInput,
};
use crate::models::{CadenceParameters, ObservationRecord, ParameterSet};

pub const RETRY_COUNT_KEY: &str = "retry_count";
pub const MAX_RETRIES_KEY: &str = "max_retries";

#[derive(Debug, Clone, Copy, Default)]
pub struct RetryFailedObservations;

impl RetryFailedObservations {
    pub const NAME: &'static str = "RetryFailedObservationsStrategy";
}

fn same_request(a: &ObservationRecord, b: &ObservationRecord) -> bool {
    a.facility == b.facility && a.target_id == b.target_id && a.parameters == b.parameters
}

/// Failed records whose retry has not been submitted yet, oldest first.
fn outstanding_failures<'a>(records: &'a [ObservationRecord]) -> Vec<&'a ObservationRecord> {
    records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.status.is_failed())
        .filter(|(i, r)| !records[i + 1..].iter().any(|later| same_request(r, later)))
        .map(|(_, r)| r)
        .collect()
}

impl CadenceStrategy for RetryFailedObservations {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["Retry Failed Observations"]
    }

    fn description(&self) -> &'static str {
        "Resubmits every failed observation of the group with identical parameters"
    }

    fn run(
        &self,
        input: &StrategyInput<'_>,
        params: &CadenceParameters,
    ) -> CadenceResult<StrategyDecision> {
        let mut retry_count = optional_u32(params, RETRY_COUNT_KEY)?.unwrap_or(0);
        let max_retries = optional_u32(params, MAX_RETRIES_KEY)?;

        if input.records.is_empty() {
            let mut decision = StrategyDecision::wait(params);
            decision.parameter_sets.push(initial_parameter_set(params)?);
            return Ok(decision);
        }

        let budget_left = |count: u32| max_retries.map_or(true, |max| count < max);
        let mut parameter_sets = Vec::new();
        for record in outstanding_failures(input.records) {
            if !budget_left(retry_count) {
                break;
            }
            parameter_sets.push(ParameterSet::clone_of(record));
            retry_count += 1;
        }

        let mut updated_parameters = params.clone();
        if !parameter_sets.is_empty() {
            updated_parameters.insert(RETRY_COUNT_KEY.to_string(), Value::from(retry_count));
        }

        let should_continue =
            !parameter_sets.is_empty() || input.has_pending() || budget_left(retry_count);

        Ok(StrategyDecision {
            parameter_sets,
            updated_parameters,
            should_continue,
        })
    }
}
