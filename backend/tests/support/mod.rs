#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use tom_cadence::cadence::{CadenceRunner, RunnerSettings, StrategyRegistry};
use tom_cadence::db::repository::{CadenceRepository, ObservationRepository, TargetRepository};
use tom_cadence::db::LocalRepository;
use tom_cadence::facility::{FacilityRegistry, SimulatedFacility};
use tom_cadence::models::{
    CadenceParameters, DynamicCadence, NewObservationRecord, NewTarget, ObservationGroup,
    ObservationRecord, ObservationStatus, Parameters, TargetId,
};
use tom_cadence::ManualClock;

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Runs `f` with environment variables temporarily modified.
///
/// This is panic-safe (restores variables on unwind) and also serializes access to
/// process-global env vars to avoid flaky tests when Rust runs tests in parallel.
///
/// `changes` is a list of `(key, value)` pairs:
/// - `Some(v)` sets the variable to `v`
/// - `None` removes the variable
pub fn with_scoped_env<F, R>(changes: &[(&str, Option<&str>)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _lock = ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner());
    let _guard = ScopedEnv::new(changes);
    f()
}

struct ScopedEnv {
    snapshot: Vec<(String, Option<String>)>,
}

impl ScopedEnv {
    fn new(changes: &[(&str, Option<&str>)]) -> Self {
        let keys: HashSet<&str> = changes.iter().map(|(k, _)| *k).collect();
        let snapshot = keys
            .into_iter()
            .map(|k| (k.to_string(), std::env::var(k).ok()))
            .collect::<Vec<_>>();

        for (k, v) in changes {
            match v {
                Some(val) => std::env::set_var(k, val),
                None => std::env::remove_var(k),
            }
        }

        Self { snapshot }
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        for (k, v) in self.snapshot.drain(..) {
            match v {
                Some(val) => std::env::set_var(&k, val),
                None => std::env::remove_var(&k),
            }
        }
    }
}

pub const FACILITY: &str = "LCO";

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
}

pub fn object(value: Value) -> serde_json::Map<String, Value> {
    value.as_object().cloned().expect("fixture must be a JSON object")
}

pub fn request_params() -> Parameters {
    object(serde_json::json!({
        "filter": "r",
        "exposure_time": 60,
        "start": "2024-05-01T00:00:00Z",
        "end": "2024-05-01T06:00:00Z",
    }))
}

/// Store, facility and runner sharing one manual clock.
pub struct Harness {
    pub clock: ManualClock,
    pub repo: Arc<LocalRepository>,
    pub facility: Arc<SimulatedFacility>,
    pub runner: CadenceRunner,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(RunnerSettings::default())
    }

    pub fn with_settings(settings: RunnerSettings) -> Self {
        let clock = ManualClock::new(t0());
        let repo = Arc::new(LocalRepository::with_clock(Arc::new(clock.clone())));
        let facility = Arc::new(SimulatedFacility::new(FACILITY));
        let runner = CadenceRunner::new(
            repo.clone(),
            FacilityRegistry::new().with(facility.clone()),
            StrategyRegistry::with_builtin(),
            Arc::new(clock.clone()),
            settings,
        );
        Self {
            clock,
            repo,
            facility,
            runner,
        }
    }

    pub fn advance_hours(&self, hours: i64) {
        self.clock.advance(Duration::hours(hours));
    }

    pub async fn target(&self, name: &str) -> TargetId {
        self.repo
            .create_target(
                NewTarget::sidereal(name, qtty::Degrees::new(150.0), qtty::Degrees::new(2.0)),
                vec![],
                vec![],
            )
            .await
            .unwrap()
            .target
            .id
    }

    pub async fn group(&self, name: &str) -> ObservationGroup {
        self.repo.create_observation_group(name).await.unwrap()
    }

    /// A record known to the facility with `status`, stored as pending so
    /// the runner has to refresh it.
    pub async fn submitted_record(
        &self,
        group: &ObservationGroup,
        target_id: TargetId,
        observation_id: &str,
        parameters: Parameters,
        status: ObservationStatus,
    ) -> ObservationRecord {
        self.facility.seed(observation_id, parameters.clone(), status);
        self.repo
            .create_observation_record(NewObservationRecord {
                facility: FACILITY.to_string(),
                observation_id: observation_id.to_string(),
                target_id,
                parameters,
                status: ObservationStatus::Pending,
                scheduled_start: None,
                scheduled_end: None,
                observation_group_id: Some(group.id),
            })
            .await
            .unwrap()
    }

    pub async fn cadence(
        &self,
        group: &ObservationGroup,
        strategy: &str,
        params: CadenceParameters,
    ) -> DynamicCadence {
        self.repo
            .create_dynamic_cadence(group.id, strategy, params, true)
            .await
            .unwrap()
    }

    pub async fn reload(&self, cadence: &DynamicCadence) -> DynamicCadence {
        self.repo.get_dynamic_cadence(cadence.id).await.unwrap()
    }

    /// Mark the most recent facility submission as `status`.
    pub fn finish_latest_submission(&self, status: ObservationStatus) {
        let latest = self
            .facility
            .submitted()
            .pop()
            .expect("at least one submission");
        assert!(self.facility.set_status(&latest.observation_id, status));
    }
}
