//! End-to-end metric refresh against an in-memory catalog.

use std::collections::BTreeSet;

use tsmeta_catalog::Catalog;
use tsmeta_core::MetricsConfig;
use tsmeta_metrics::{MetricReconciler, ObservedMetric};

const GROUP: u64 = 42;
const TABLE: &str = "2_bkmonitor_time_series_42.__default__";

fn setup() -> (Catalog, MetricReconciler) {
    let catalog = Catalog::open_in_memory().unwrap();
    let reconciler = MetricReconciler::new(catalog.clone(), &MetricsConfig::default()).unwrap();
    (catalog, reconciler)
}

fn observation() -> Vec<ObservedMetric> {
    let mut disabled = ObservedMetric::new("disk_usage", &["mount"]);
    disabled.is_active = false;
    vec![
        ObservedMetric::new("cpu_usage", &["module", "location"]),
        ObservedMetric::new("mem_usage", &["module"]),
        ObservedMetric::new("bad.name", &["module"]),
        disabled,
    ]
}

fn active_names(catalog: &Catalog) -> BTreeSet<String> {
    catalog
        .list_ts_metrics(GROUP)
        .unwrap()
        .into_iter()
        .filter(|m| m.is_active)
        .map(|m| m.field_name)
        .collect()
}

#[test]
fn refresh_converges_and_reaches_fixed_point() {
    let (catalog, reconciler) = setup();

    let first = reconciler
        .bulk_refresh_ts_metrics("system", GROUP, TABLE, observation(), false)
        .unwrap();
    assert_eq!(first.created, 2);
    assert!(first.needs_push);
    assert_eq!(
        active_names(&catalog),
        BTreeSet::from(["cpu_usage".to_string(), "mem_usage".to_string()])
    );

    let second = reconciler
        .bulk_refresh_ts_metrics("system", GROUP, TABLE, observation(), false)
        .unwrap();
    assert_eq!(second.writes(), 0);
    assert!(!second.needs_push);
}

#[test]
fn auto_discovery_records_inactive_metrics() {
    let (catalog, reconciler) = setup();

    let report = reconciler
        .bulk_refresh_ts_metrics("system", GROUP, TABLE, observation(), true)
        .unwrap();
    assert_eq!(report.created, 3);
    assert_eq!(active_names(&catalog).len(), 3);

    // The disabled metric is recorded already expired.
    let disk = catalog.get_ts_metric(GROUP, "disk_usage").unwrap().unwrap();
    assert_eq!(disk.last_modify_time, 0);

    let report = reconciler
        .bulk_refresh_ts_metrics("system", GROUP, TABLE, observation(), true)
        .unwrap();
    assert_eq!(report.writes(), 0);
    assert!(!report.needs_push);
}

#[test]
fn new_inactive_metric_is_a_fixed_point_with_auto_discovery() {
    let (catalog, reconciler) = setup();
    let mut disabled = ObservedMetric::new("disk_usage", &["mount"]);
    disabled.is_active = false;

    let first = reconciler
        .bulk_refresh_ts_metrics("system", GROUP, TABLE, vec![disabled.clone()], true)
        .unwrap();
    assert_eq!(first.created, 1);

    let second = reconciler
        .bulk_refresh_ts_metrics("system", GROUP, TABLE, vec![disabled], true)
        .unwrap();
    assert_eq!(second.writes(), 0);
    assert_eq!(catalog.get_ts_metric(GROUP, "disk_usage").unwrap().unwrap().last_modify_time, 0);
}

#[test]
fn unobserved_metrics_are_deactivated_once() {
    let (catalog, reconciler) = setup();
    reconciler
        .bulk_refresh_ts_metrics("system", GROUP, TABLE, observation(), false)
        .unwrap();

    let only_cpu = vec![ObservedMetric::new("cpu_usage", &["module", "location"])];
    let report = reconciler
        .bulk_refresh_ts_metrics("system", GROUP, TABLE, only_cpu.clone(), false)
        .unwrap();
    assert_eq!(report.deactivated, 1);
    assert_eq!(active_names(&catalog), BTreeSet::from(["cpu_usage".to_string()]));

    let report = reconciler
        .bulk_refresh_ts_metrics("system", GROUP, TABLE, only_cpu, false)
        .unwrap();
    assert_eq!(report.writes(), 0);

    // Seeing the metric again reactivates it.
    let report = reconciler
        .bulk_refresh_ts_metrics("system", GROUP, TABLE, observation(), false)
        .unwrap();
    assert_eq!(report.updated, 1);
    assert!(catalog.get_ts_metric(GROUP, "mem_usage").unwrap().unwrap().is_active);
}

#[test]
fn empty_observation_changes_nothing() {
    let (catalog, reconciler) = setup();
    reconciler
        .bulk_refresh_ts_metrics("system", GROUP, TABLE, observation(), false)
        .unwrap();

    let invalid_only = vec![ObservedMetric::new("not-valid", &[])];
    let report = reconciler
        .bulk_refresh_ts_metrics("system", GROUP, TABLE, invalid_only, true)
        .unwrap();
    assert_eq!(report.writes(), 0);
    assert!(!report.needs_push);
    assert_eq!(active_names(&catalog).len(), 2);
}

#[test]
fn groups_are_isolated() {
    let (catalog, reconciler) = setup();
    reconciler
        .bulk_refresh_ts_metrics("system", GROUP, TABLE, observation(), false)
        .unwrap();
    reconciler
        .bulk_refresh_ts_metrics(
            "system",
            GROUP + 1,
            "2_bkmonitor_time_series_43.__default__",
            vec![ObservedMetric::new("net_bytes", &[])],
            false,
        )
        .unwrap();

    assert_eq!(active_names(&catalog).len(), 2);
    assert_eq!(catalog.list_ts_metrics(GROUP + 1).unwrap().len(), 1);
}
