//! Alert reconciliation against the local store.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::json;

use tom_cadence::brokers::{
    process_reduced_data, Alert, AlertQuery, AlertReconciler, BrokerCapability, ReconcileError,
    ReconcilerSettings, ReducedPoint, StaticBroker,
};
use tom_cadence::db::repository::{RepositoryResult, TargetRepository};
use tom_cadence::db::LocalRepository;
use tom_cadence::models::{
    NewReducedDatum, NewTarget, ReducedDatum, Target, TargetDetails, TargetExtra, TargetId,
    TargetName,
};
use tom_cadence::ErrorCategory;

fn broker() -> StaticBroker {
    StaticBroker::new("ALeRCE")
        .with_alert(
            "a1",
            json!({"name": "ZTF24aaaaaaa", "ra": 150.1, "dec": 2.2,
                   "aliases": ["SN 2024abc"], "extras": {"classification": "SN Ia"}}),
        )
        .with_alert(
            "a2",
            json!({"name": "ATLAS24xyz", "ra": 150.1, "dec": 2.2,
                   "aliases": ["SN 2024abc"]}),
        )
        .with_alert("a3", json!({"name": "ZTF24ccccccc", "ra": 20.0, "dec": -10.0}))
}

async fn alerts(broker: &StaticBroker) -> Vec<Alert> {
    use futures::StreamExt;
    broker
        .fetch_alerts(&AlertQuery::new())
        .await
        .unwrap()
        .map(|a| a.unwrap())
        .collect()
        .await
}

#[tokio::test]
async fn test_second_alert_with_same_alias_is_duplicate() {
    let repo = Arc::new(LocalRepository::new());
    let reconciler = AlertReconciler::new(repo.clone(), ReconcilerSettings::default());
    let broker = broker();
    let alerts = alerts(&broker).await;

    let first = reconciler.reconcile(&alerts[0], &broker).await.unwrap();
    assert_eq!(first.name, "ZTF24aaaaaaa");
    let details = repo.get_target_details(first.id).await.unwrap();
    assert_eq!(details.aliases.len(), 1);
    assert_eq!(details.extras[0].value, "SN Ia");

    let err = reconciler.reconcile(&alerts[1], &broker).await.unwrap_err();
    match &err {
        ReconcileError::DuplicateTarget {
            name,
            existing_target_id,
            alert,
        } => {
            assert_eq!(name, "SN 2024abc");
            assert_eq!(*existing_target_id, first.id);
            assert_eq!(alert.alert_id, "a2");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(err.category(), ErrorCategory::Conflict);
    assert_eq!(repo.count_targets().await.unwrap(), 1);
    assert_eq!(repo.find_target_by_name("ATLAS24xyz").await.unwrap(), None);
}

#[tokio::test]
async fn test_fuzzy_matching_catches_formatting_variants() {
    let variant = StaticBroker::new("Lasair").with_alert(
        "l1",
        json!({"name": "ZTF24ddddddd", "ra": 1.0, "dec": 1.0, "aliases": ["sn-2024ABC"]}),
    );
    let original = broker();
    let original_alerts = alerts(&original).await;
    let variant_alerts = alerts(&variant).await;

    let fuzzy_repo = Arc::new(LocalRepository::new());
    let fuzzy = AlertReconciler::new(fuzzy_repo.clone(), ReconcilerSettings::default());
    fuzzy.reconcile(&original_alerts[0], &original).await.unwrap();
    assert!(matches!(
        fuzzy.reconcile(&variant_alerts[0], &variant).await,
        Err(ReconcileError::DuplicateTarget { .. })
    ));

    let exact_repo = Arc::new(LocalRepository::new());
    let exact = AlertReconciler::new(
        exact_repo.clone(),
        ReconcilerSettings {
            fuzzy_name_matching: false,
        },
    );
    exact.reconcile(&original_alerts[0], &original).await.unwrap();
    exact.reconcile(&variant_alerts[0], &variant).await.unwrap();
    assert_eq!(exact_repo.count_targets().await.unwrap(), 2);
}

#[tokio::test]
async fn test_reconcile_all_collects_outcomes() {
    let repo = Arc::new(LocalRepository::new());
    let reconciler = AlertReconciler::new(repo.clone(), ReconcilerSettings::default());
    let broker = broker().with_alert("bad", json!({"name": "no coordinates"}));
    let alerts = alerts(&broker).await;

    let report = reconciler.reconcile_all(&alerts, &broker).await;
    assert_eq!(report.created.len(), 2);
    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(report.conflicts[0].alert.alert_id, "a2");
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].0, "bad");

    let again = reconciler
        .reconcile_query(&broker, &AlertQuery::new())
        .await
        .unwrap();
    assert!(again.created.is_empty());
    assert_eq!(again.conflicts.len(), 3);
    assert!(again.fetch_errors.is_empty());
}

#[tokio::test]
async fn test_fetch_errors_kept_apart_from_alert_errors() {
    let repo = Arc::new(LocalRepository::new());
    let reconciler = AlertReconciler::new(repo.clone(), ReconcilerSettings::default());
    let broker = broker()
        .with_alert("bad", json!({"name": "no coordinates"}))
        .with_stream_error("connection reset");

    let report = reconciler
        .reconcile_query(&broker, &AlertQuery::new())
        .await
        .unwrap();
    assert_eq!(report.created.len(), 2);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].0, "bad");
    assert_eq!(report.fetch_errors.len(), 1);
    assert!(report.fetch_errors[0].contains("connection reset"));
    assert!(report.errors.iter().all(|(alert_id, _)| !alert_id.is_empty()));
}

/// Repository whose name lookups run against a view taken before another
/// writer inserted the same alias.
struct StaleNameLookup {
    inner: LocalRepository,
}

#[async_trait]
impl TargetRepository for StaleNameLookup {
    async fn create_target(
        &self,
        target: NewTarget,
        extras: Vec<(String, String)>,
        aliases: Vec<String>,
    ) -> RepositoryResult<TargetDetails> {
        self.inner.create_target(target, extras, aliases).await
    }

    async fn get_target(&self, target_id: TargetId) -> RepositoryResult<Target> {
        self.inner.get_target(target_id).await
    }

    async fn get_target_details(&self, target_id: TargetId) -> RepositoryResult<TargetDetails> {
        self.inner.get_target_details(target_id).await
    }

    async fn find_target_by_name(&self, _name: &str) -> RepositoryResult<Option<TargetId>> {
        Ok(None)
    }

    async fn list_target_names(&self) -> RepositoryResult<Vec<TargetName>> {
        Ok(Vec::new())
    }

    async fn list_targets(&self) -> RepositoryResult<Vec<Target>> {
        self.inner.list_targets().await
    }

    async fn count_targets(&self) -> RepositoryResult<usize> {
        self.inner.count_targets().await
    }

    async fn add_target_extra(&self, extra: TargetExtra) -> RepositoryResult<()> {
        self.inner.add_target_extra(extra).await
    }

    async fn delete_target(&self, target_id: TargetId) -> RepositoryResult<()> {
        self.inner.delete_target(target_id).await
    }

    async fn insert_reduced_datum(
        &self,
        datum: NewReducedDatum,
    ) -> RepositoryResult<Option<ReducedDatum>> {
        self.inner.insert_reduced_datum(datum).await
    }

    async fn list_reduced_data(&self, target_id: TargetId) -> RepositoryResult<Vec<ReducedDatum>> {
        self.inner.list_reduced_data(target_id).await
    }
}

#[tokio::test]
async fn test_store_constraint_is_authoritative() {
    for fuzzy_name_matching in [true, false] {
        let repo = Arc::new(StaleNameLookup {
            inner: LocalRepository::new(),
        });
        let settings = ReconcilerSettings { fuzzy_name_matching };
        let reconciler = AlertReconciler::new(repo.clone(), settings);
        let broker = broker();
        let alerts = alerts(&broker).await;

        let first = reconciler.reconcile(&alerts[0], &broker).await.unwrap();
        let err = reconciler.reconcile(&alerts[1], &broker).await.unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::DuplicateTarget { existing_target_id, .. }
                if existing_target_id == first.id
        ));
        // No partial target was left behind.
        assert_eq!(repo.count_targets().await.unwrap(), 1);
    }
}

#[tokio::test]
async fn test_process_reduced_data_is_idempotent() {
    let repo = Arc::new(LocalRepository::new());
    let reconciler = AlertReconciler::new(repo.clone(), ReconcilerSettings::default());
    let point = |hour: u32, mag: f64| ReducedPoint {
        timestamp: Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap(),
        data_type: "photometry".to_string(),
        value: json!({"magnitude": mag, "filter": "r"}),
    };
    let broker = broker().with_reduced_data("ZTF24aaaaaaa", vec![point(1, 18.2), point(2, 18.4)]);
    let alerts = alerts(&broker).await;
    let target = reconciler.reconcile(&alerts[0], &broker).await.unwrap();

    let first = process_reduced_data(repo.as_ref(), &broker, &target, Some(&alerts[0]))
        .await
        .unwrap();
    assert_eq!(first, 2);
    let second = process_reduced_data(repo.as_ref(), &broker, &target, None)
        .await
        .unwrap();
    assert_eq!(second, 0);

    let stored = repo.list_reduced_data(target.id).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert!(stored.iter().all(|d| d.source_name == "ALeRCE"));
}
