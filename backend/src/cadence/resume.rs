//! Keep a regular cadence of windows, repeating a window that failed.
//!
//! Parameters: `cadence_frequency` (hours between the end of a completed
//! observation and the start of the next window), `window_retry_count`
//! (default 0), `max_window_retries` (default 3) and optionally
//! `window_length` (hours, used when the last request carries no window).

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use super::error::{CadenceError, CadenceResult};
use super::strategy::{
    hours, initial_parameter_set, optional_f64, optional_u32, parse_window, required_f64,
    window_keywords, with_window, CadenceStrategy, StrategyDecision, StrategyInput,
};
use crate::models::{CadenceParameters, ObservationRecord, ObservationStatus, ParameterSet};

pub const CADENCE_FREQUENCY_KEY: &str = "cadence_frequency";
pub const WINDOW_RETRY_COUNT_KEY: &str = "window_retry_count";
pub const MAX_WINDOW_RETRIES_KEY: &str = "max_window_retries";
pub const WINDOW_LENGTH_KEY: &str = "window_length";

const DEFAULT_MAX_WINDOW_RETRIES: u32 = 3;

#[derive(Debug, Clone, Copy, Default)]
pub struct ResumeCadenceAfterFailure;

impl ResumeCadenceAfterFailure {
    pub const NAME: &'static str = "ResumeCadenceAfterFailureStrategy";
}

fn positive_hours(key: &str, value: f64) -> CadenceResult<Duration> {
    if value <= 0.0 {
        return Err(CadenceError::malformed(key, format!("must be positive, got {}", value)));
    }
    hours(key, value)
}

fn cadence_frequency(params: &CadenceParameters) -> CadenceResult<Duration> {
    let value = required_f64(params, CADENCE_FREQUENCY_KEY)?;
    positive_hours(CADENCE_FREQUENCY_KEY, value)
}

/// Length of the latest request's window, falling back to `window_length`
/// and then to the cadence frequency.
fn window_length(
    params: &CadenceParameters,
    latest: &ObservationRecord,
    start_keyword: &str,
    end_keyword: &str,
) -> CadenceResult<Duration> {
    if let Some((start, end)) = parse_window(&latest.parameters, start_keyword, end_keyword) {
        if end > start {
            return Ok(end - start);
        }
    }
    match optional_f64(params, WINDOW_LENGTH_KEY)? {
        Some(value) => positive_hours(WINDOW_LENGTH_KEY, value),
        None => cadence_frequency(params),
    }
}

impl CadenceStrategy for ResumeCadenceAfterFailure {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["Resume Cadence After Failure"]
    }

    fn description(&self) -> &'static str {
        "Advances one window every cadence_frequency hours and repeats a failed window"
    }

    fn run(
        &self,
        input: &StrategyInput<'_>,
        params: &CadenceParameters,
    ) -> CadenceResult<StrategyDecision> {
        let Some(latest) = input.latest() else {
            let mut decision = StrategyDecision::wait(params);
            decision.parameter_sets.push(initial_parameter_set(params)?);
            return Ok(decision);
        };
        if latest.status.is_pending() {
            return Ok(StrategyDecision::wait(params));
        }

        let (start_keyword, end_keyword) = window_keywords(params)?;
        let length = window_length(params, latest, &start_keyword, &end_keyword)?;
        let next = |start: DateTime<Utc>| -> CadenceResult<ParameterSet> {
            Ok(ParameterSet {
                facility: latest.facility.clone(),
                target_id: latest.target_id,
                parameters: with_window(
                    &latest.parameters,
                    &start_keyword,
                    &end_keyword,
                    start,
                    length,
                )?,
            })
        };

        let mut updated_parameters = params.clone();
        if latest.status == ObservationStatus::Completed {
            let start = latest
                .completed_at()
                .checked_add_signed(cadence_frequency(params)?)
                .ok_or_else(|| {
                    CadenceError::malformed(CADENCE_FREQUENCY_KEY, "next window start is out of range")
                })?;
            if input.now < start {
                return Ok(StrategyDecision::wait(params));
            }
            updated_parameters.insert(WINDOW_RETRY_COUNT_KEY.to_string(), Value::from(0u32));
            return Ok(StrategyDecision {
                parameter_sets: vec![next(start)?],
                updated_parameters,
                should_continue: true,
            });
        }

        let retries = optional_u32(params, WINDOW_RETRY_COUNT_KEY)?.unwrap_or(0);
        let max_retries =
            optional_u32(params, MAX_WINDOW_RETRIES_KEY)?.unwrap_or(DEFAULT_MAX_WINDOW_RETRIES);
        if retries >= max_retries {
            return Ok(StrategyDecision {
                parameter_sets: Vec::new(),
                updated_parameters,
                should_continue: false,
            });
        }

        updated_parameters.insert(WINDOW_RETRY_COUNT_KEY.to_string(), Value::from(retries + 1));
        Ok(StrategyDecision {
            parameter_sets: vec![next(input.now)?],
            updated_parameters,
            should_continue: true,
        })
    }
}
