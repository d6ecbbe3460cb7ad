//! The strategy seam and helpers for reading cadence parameters.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{CadenceError, CadenceResult};
use crate::models::{
    CadenceParameters, ObservationGroup, ObservationRecord, ParameterSet, Parameters, TargetId,
};

pub const FACILITY_KEY: &str = "facility";
pub const TARGET_ID_KEY: &str = "target_id";
pub const INITIAL_PARAMETERS_KEY: &str = "initial_parameters";
pub const START_KEYWORD_KEY: &str = "start_keyword";
pub const END_KEYWORD_KEY: &str = "end_keyword";

/// Everything a strategy may look at. Record statuses are already fresh.
#[derive(Debug, Clone, Copy)]
pub struct StrategyInput<'a> {
    pub group: &'a ObservationGroup,
    /// Records of the group, oldest first.
    pub records: &'a [ObservationRecord],
    pub now: DateTime<Utc>,
}

impl<'a> StrategyInput<'a> {
    pub fn latest(&self) -> Option<&'a ObservationRecord> {
        self.records.last()
    }

    pub fn has_pending(&self) -> bool {
        self.records.iter().any(|r| r.status.is_pending())
    }
}

/// Outcome of one strategy invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyDecision {
    pub parameter_sets: Vec<ParameterSet>,
    pub updated_parameters: CadenceParameters,
    pub should_continue: bool,
}

impl StrategyDecision {
    /// Nothing to submit; parameters unchanged; cadence stays active.
    pub fn wait(params: &CadenceParameters) -> Self {
        Self {
            parameter_sets: Vec::new(),
            updated_parameters: params.clone(),
            should_continue: true,
        }
    }
}

/// A named cadence policy.
///
/// Implementations must be deterministic: identical input and parameters
/// produce identical decisions.
pub trait CadenceStrategy: Send + Sync {
    /// Name stored in `DynamicCadence::cadence_strategy`.
    fn name(&self) -> &'static str;

    /// Other names this strategy answers to.
    fn aliases(&self) -> &'static [&'static str] {
        &[]
    }

    fn description(&self) -> &'static str;

    fn run(
        &self,
        input: &StrategyInput<'_>,
        params: &CadenceParameters,
    ) -> CadenceResult<StrategyDecision>;
}

pub fn optional_u32(params: &CadenceParameters, key: &str) -> CadenceResult<Option<u32>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
            .map(Some)
            .ok_or_else(|| {
                CadenceError::malformed(key, format!("expected a non-negative integer, got {}", value))
            }),
    }
}

pub fn optional_f64(params: &CadenceParameters, key: &str) -> CadenceResult<Option<f64>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_f64()
            .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| CadenceError::malformed(key, format!("expected a number, got {}", value))),
    }
}

pub fn required_f64(params: &CadenceParameters, key: &str) -> CadenceResult<f64> {
    optional_f64(params, key)?.ok_or_else(|| CadenceError::malformed(key, "missing"))
}

fn optional_str<'p>(params: &'p CadenceParameters, key: &str) -> CadenceResult<Option<&'p str>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(CadenceError::malformed(key, format!("expected a string, got {}", other))),
    }
}

/// `(start, end)` keywords naming the window fields in request parameters.
pub fn window_keywords(params: &CadenceParameters) -> CadenceResult<(String, String)> {
    let start = optional_str(params, START_KEYWORD_KEY)?.unwrap_or("start");
    let end = optional_str(params, END_KEYWORD_KEY)?.unwrap_or("end");
    Ok((start.to_string(), end.to_string()))
}

/// One time bound from request parameters; `None` if absent or unparsable.
pub fn parse_time(parameters: &Parameters, keyword: &str) -> Option<DateTime<Utc>> {
    parameters
        .get(keyword)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

pub fn parse_window(
    parameters: &Parameters,
    start_keyword: &str,
    end_keyword: &str,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    Some((
        parse_time(parameters, start_keyword)?,
        parse_time(parameters, end_keyword)?,
    ))
}

pub fn format_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Copy of `parameters` with the window replaced.
///
/// Fails when the window end is not a representable time.
pub fn with_window(
    parameters: &Parameters,
    start_keyword: &str,
    end_keyword: &str,
    start: DateTime<Utc>,
    length: Duration,
) -> CadenceResult<Parameters> {
    let end = start
        .checked_add_signed(length)
        .ok_or_else(|| CadenceError::malformed(end_keyword, "window end is out of range"))?;
    let mut updated = parameters.clone();
    updated.insert(start_keyword.to_string(), Value::String(format_time(start)));
    updated.insert(end_keyword.to_string(), Value::String(format_time(end)));
    Ok(updated)
}

/// Duration from a possibly fractional number of hours read from `key`.
pub fn hours(key: &str, value: f64) -> CadenceResult<Duration> {
    let millis = (value * 3_600_000.0).round();
    if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
        return Err(CadenceError::malformed(key, format!("{} hours is out of range", value)));
    }
    Duration::try_milliseconds(millis as i64)
        .ok_or_else(|| CadenceError::malformed(key, format!("{} hours is out of range", value)))
}

/// The first request of an empty group, built from `facility`,
/// `target_id` and `initial_parameters`.
pub fn initial_parameter_set(params: &CadenceParameters) -> CadenceResult<ParameterSet> {
    let facility = optional_str(params, FACILITY_KEY)?
        .filter(|f| !f.trim().is_empty())
        .ok_or_else(|| CadenceError::malformed(FACILITY_KEY, "required for the first submission"))?;
    let target_id = params
        .get(TARGET_ID_KEY)
        .and_then(Value::as_i64)
        .ok_or_else(|| CadenceError::malformed(TARGET_ID_KEY, "required for the first submission"))?;
    let parameters = match params.get(INITIAL_PARAMETERS_KEY) {
        Some(Value::Object(obj)) => obj.clone(),
        Some(other) => {
            return Err(CadenceError::malformed(
                INITIAL_PARAMETERS_KEY,
                format!("expected an object, got {}", other),
            ))
        }
        None => {
            return Err(CadenceError::malformed(
                INITIAL_PARAMETERS_KEY,
                "required for the first submission",
            ))
        }
    };
    Ok(ParameterSet {
        facility: facility.to_string(),
        target_id: TargetId(target_id),
        parameters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn map(value: Value) -> CadenceParameters {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_integer_parameters_accept_strings() {
        let params = map(json!({"a": 3, "b": "4", "c": -1, "d": null}));
        assert_eq!(optional_u32(&params, "a").unwrap(), Some(3));
        assert_eq!(optional_u32(&params, "b").unwrap(), Some(4));
        assert!(optional_u32(&params, "c").is_err());
        assert_eq!(optional_u32(&params, "d").unwrap(), None);
        assert_eq!(optional_u32(&params, "missing").unwrap(), None);
    }

    #[test]
    fn test_window_roundtrip_through_parameters() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let params =
            with_window(&Parameters::new(), "start", "end", start, hours("length", 1.5).unwrap())
                .unwrap();
        assert_eq!(params["end"], json!("2024-03-01T13:30:00Z"));
        let (s, e) = parse_window(&params, "start", "end").unwrap();
        assert_eq!(s, start);
        assert_eq!(e - s, Duration::minutes(90));
    }

    #[test]
    fn test_out_of_range_hours_are_malformed() {
        assert!(matches!(
            hours("cadence_frequency", 1e16),
            Err(CadenceError::MalformedParameters { key, .. }) if key == "cadence_frequency"
        ));
        assert!(hours("cadence_frequency", f64::INFINITY).is_err());
        assert_eq!(hours("cadence_frequency", -2.0).unwrap(), Duration::hours(-2));
    }

    #[test]
    fn test_window_end_overflow_is_malformed() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let err = with_window(&Parameters::new(), "start", "end", start, Duration::MAX).unwrap_err();
        assert!(matches!(err, CadenceError::MalformedParameters { key, .. } if key == "end"));
    }

    #[test]
    fn test_custom_window_keywords() {
        let params = map(json!({"start_keyword": "window_start"}));
        assert_eq!(
            window_keywords(&params).unwrap(),
            ("window_start".to_string(), "end".to_string())
        );
        assert!(window_keywords(&map(json!({"end_keyword": 5}))).is_err());
    }

    #[test]
    fn test_initial_parameter_set_requires_fields() {
        let ok = map(json!({"facility": "LCO", "target_id": 7, "initial_parameters": {"filter": "r"}}));
        let set = initial_parameter_set(&ok).unwrap();
        assert_eq!(set.facility, "LCO");
        assert_eq!(set.target_id, TargetId(7));
        assert_eq!(set.parameters["filter"], json!("r"));

        let missing = map(json!({"facility": "LCO", "target_id": 7}));
        assert!(matches!(
            initial_parameter_set(&missing),
            Err(CadenceError::MalformedParameters { key, .. }) if key == INITIAL_PARAMETERS_KEY
        ));
    }
}
