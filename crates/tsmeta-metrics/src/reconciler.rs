//! Diff-and-upsert of observed metrics into the catalog.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{SystemTime, UNIX_EPOCH};

use regex::Regex;
use tracing::{debug, error, info, warn};
use tsmeta_catalog::{Catalog, TimeSeriesMetric};
use tsmeta_core::MetricsConfig;

use crate::error::MetricsResult;
use crate::observed::{EffectiveTime, ObservedMetric};

const METRIC_NAME_PATTERN: &str = r"^[a-zA-Z0-9_]+$";

/// What one refresh changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub created: u32,
    pub updated: u32,
    pub deleted: u32,
    pub deactivated: u32,
    /// Whether routing must be pushed to the query layer.
    pub needs_push: bool,
}

impl RefreshReport {
    /// Catalog rows touched.
    pub fn writes(&self) -> u32 {
        self.created + self.updated + self.deleted + self.deactivated
    }
}

/// Result of [`MetricReconciler::bulk_update_metrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub updated: u32,
    pub deleted: u32,
    /// At least one metric moved past the push threshold.
    pub needs_push: bool,
}

/// Reconciles the `TimeSeriesMetric` rows of report groups.
pub struct MetricReconciler {
    catalog: Catalog,
    /// Seconds between timestamp rewrites of an unchanged metric.
    update_throttle: u64,
    /// Seconds of staleness after which a refresh needs a routing push.
    push_threshold: u64,
    name_pattern: Regex,
}

impl MetricReconciler {
    pub fn new(catalog: Catalog, config: &MetricsConfig) -> MetricsResult<Self> {
        let (update_throttle, push_threshold) = config.thresholds()?;
        Ok(Self {
            catalog,
            update_throttle: update_throttle.as_secs(),
            push_threshold: push_threshold.as_secs(),
            name_pattern: Regex::new(METRIC_NAME_PATTERN)?,
        })
    }

    /// Drop observations whose field name is not a valid metric name.
    pub fn filter_valid(&self, observed: Vec<ObservedMetric>) -> Vec<ObservedMetric> {
        observed
            .into_iter()
            .filter(|m| {
                let valid = self.name_pattern.is_match(&m.field_name);
                if !valid {
                    warn!(field_name = %m.field_name, "invalid metric name, skipped");
                }
                valid
            })
            .collect()
    }

    /// Bring the metrics of `group_id` in line with `observed`.
    ///
    /// Returns `needs_push` when a metric was created, or when an
    /// auto-discovering group saw a metric move past the push threshold.
    /// An observation with no valid metric changes nothing.
    pub fn bulk_refresh_ts_metrics(
        &self,
        tenant_id: &str,
        group_id: u64,
        table_id: &str,
        observed: Vec<ObservedMetric>,
        auto_discovery: bool,
    ) -> MetricsResult<RefreshReport> {
        let observed = self.filter_valid(observed);
        if observed.is_empty() {
            info!(%tenant_id, group_id, %table_id, "empty metric observation, refresh skipped");
            return Ok(RefreshReport::default());
        }
        let metrics: BTreeMap<String, ObservedMetric> = observed
            .into_iter()
            .map(|m| (m.field_name.clone(), m))
            .collect();

        let existing = self.catalog.list_ts_metrics(group_id)?;
        let existing_names: BTreeSet<&str> =
            existing.iter().map(|m| m.field_name.as_str()).collect();
        let (to_update, to_create): (Vec<String>, Vec<String>) = metrics
            .keys()
            .cloned()
            .partition(|name| existing_names.contains(name.as_str()));

        let now = epoch_secs();
        let mut report = RefreshReport::default();
        if !to_create.is_empty() {
            report.created = self.bulk_create_metrics(
                tenant_id,
                group_id,
                table_id,
                &metrics,
                &to_create,
                auto_discovery,
                now,
            )?;
        }
        if !to_update.is_empty() {
            let outcome =
                self.bulk_update_metrics(group_id, &metrics, &to_update, auto_discovery, now)?;
            report.updated = outcome.updated;
            report.deleted = outcome.deleted;
            report.needs_push = outcome.needs_push;
        }

        for mut row in existing {
            if !row.is_active || metrics.contains_key(&row.field_name) {
                continue;
            }
            row.is_active = false;
            match self.catalog.update_ts_metric(&row) {
                Ok(()) => report.deactivated += 1,
                Err(e) => error!(
                    group_id,
                    field_name = %row.field_name,
                    error = %e,
                    "failed to deactivate unobserved metric"
                ),
            }
        }

        report.needs_push |= report.created > 0;
        info!(
            %tenant_id,
            group_id,
            %table_id,
            created = report.created,
            updated = report.updated,
            deleted = report.deleted,
            deactivated = report.deactivated,
            needs_push = report.needs_push,
            "metrics refreshed"
        );
        Ok(report)
    }

    /// Record the metrics in `names`, which the group does not have yet.
    ///
    /// Inactive metrics are only recorded for auto-discovering groups.
    /// Returns how many rows were written.
    #[allow(clippy::too_many_arguments)]
    pub fn bulk_create_metrics(
        &self,
        tenant_id: &str,
        group_id: u64,
        table_id: &str,
        metrics: &BTreeMap<String, ObservedMetric>,
        names: &[String],
        auto_discovery: bool,
        now: u64,
    ) -> MetricsResult<u32> {
        let database = table_id.split_once('.').map_or(table_id, |(db, _)| db);
        let mut rows = Vec::with_capacity(names.len());
        for name in names {
            let Some(metric) = metrics.get(name) else {
                continue;
            };
            if !metric.is_active && !auto_discovery {
                debug!(group_id, field_name = %name, "inactive metric not recorded");
                continue;
            }
            let Some(tags) = metric.tags() else {
                error!(group_id, field_name = %name, "metric has no tag_value_list, skipped");
                continue;
            };
            let mut row = TimeSeriesMetric {
                group_id,
                table_id: format!("{database}.{name}"),
                field_name: name.clone(),
                tag_list: String::new(),
                last_modify_time: metric.effective_time(now, auto_discovery).as_secs(),
                is_active: true,
                bk_tenant_id: tenant_id.to_string(),
            };
            if let Err(e) = row.set_tags(&tags) {
                error!(group_id, field_name = %name, error = %e, "failed to encode tag list");
                continue;
            }
            rows.push(row);
        }
        if rows.is_empty() {
            return Ok(0);
        }

        match self.catalog.insert_ts_metrics(&rows) {
            Ok(count) => {
                for row in &rows {
                    info!(
                        %tenant_id,
                        group_id,
                        table_id = %row.table_id,
                        field_name = %row.field_name,
                        tag_list = %row.tag_list,
                        "metric created"
                    );
                }
                Ok(count)
            }
            Err(e) if e.is_conflict() => {
                warn!(group_id, error = %e, "metrics created concurrently, inserting one by one");
                let mut count = 0;
                for row in &rows {
                    match self.catalog.insert_ts_metrics(std::slice::from_ref(row)) {
                        Ok(n) => count += n,
                        Err(e) => error!(
                            group_id,
                            field_name = %row.field_name,
                            error = %e,
                            "failed to create metric"
                        ),
                    }
                }
                Ok(count)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Refresh the stored time and tags of the recorded metrics in `names`.
    ///
    /// Inactive metrics of groups without auto-discovery are whitelist
    /// removals: they are deleted in one batch.
    pub fn bulk_update_metrics(
        &self,
        group_id: u64,
        metrics: &BTreeMap<String, ObservedMetric>,
        names: &[String],
        auto_discovery: bool,
        now: u64,
    ) -> MetricsResult<UpdateOutcome> {
        let mut outcome = UpdateOutcome::default();
        let mut whitelist_removed = Vec::new();

        for name in names {
            let Some(metric) = metrics.get(name) else {
                continue;
            };
            let Some(mut row) = self.catalog.get_ts_metric(group_id, name)? else {
                continue;
            };
            if !metric.is_active && !auto_discovery {
                whitelist_removed.push(name.clone());
                continue;
            }

            let mut changed = false;
            match metric.effective_time(now, auto_discovery) {
                EffectiveTime::ExpireNow => {
                    if row.last_modify_time != 0 {
                        row.last_modify_time = 0;
                        changed = true;
                    }
                }
                EffectiveTime::At(secs) => {
                    let gap = secs.saturating_sub(row.last_modify_time);
                    if secs > row.last_modify_time && gap >= self.update_throttle {
                        if auto_discovery && gap > self.push_threshold {
                            outcome.needs_push = true;
                        }
                        row.last_modify_time = secs;
                        changed = true;
                    }
                }
            }

            let Some(tags) = metric.tags() else {
                error!(group_id, field_name = %name, "metric has no tag_value_list, skipped");
                continue;
            };
            let stored: BTreeSet<String> = match row.tags() {
                Ok(stored) => stored.into_iter().collect(),
                Err(e) => {
                    error!(
                        group_id,
                        field_name = %name,
                        tag_list = %row.tag_list,
                        error = %e,
                        "stored tag list is malformed, skipped"
                    );
                    continue;
                }
            };
            if stored != tags.iter().cloned().collect::<BTreeSet<_>>() {
                if let Err(e) = row.set_tags(&tags) {
                    error!(group_id, field_name = %name, error = %e, "failed to encode tag list");
                    continue;
                }
                changed = true;
            }
            if !row.is_active {
                row.is_active = true;
                changed = true;
            }

            if !changed {
                continue;
            }
            match self.catalog.update_ts_metric(&row) {
                Ok(()) => {
                    outcome.updated += 1;
                    info!(
                        group_id,
                        field_name = %name,
                        tag_list = %row.tag_list,
                        last_modify_time = row.last_modify_time,
                        "metric updated"
                    );
                }
                Err(e) => error!(group_id, field_name = %name, error = %e, "failed to update metric"),
            }
        }

        if !whitelist_removed.is_empty() {
            match self.catalog.delete_ts_metrics(group_id, &whitelist_removed) {
                Ok(count) => {
                    outcome.deleted = count;
                    info!(group_id, fields = ?whitelist_removed, "disabled whitelist metrics deleted");
                }
                Err(e) => error!(
                    group_id,
                    fields = ?whitelist_removed,
                    error = %e,
                    "failed to delete disabled whitelist metrics"
                ),
            }
        }
        Ok(outcome)
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsmeta_catalog::DEFAULT_TENANT_ID;

    const DAY: u64 = 24 * 3600;
    const T0: u64 = 1_700_000_000;

    fn reconciler() -> MetricReconciler {
        let catalog = Catalog::open_in_memory().unwrap();
        MetricReconciler::new(catalog, &MetricsConfig::default()).unwrap()
    }

    fn stored(reconciler: &MetricReconciler, field: &str, tags: &[&str], at: u64) {
        let mut row = TimeSeriesMetric {
            group_id: 7,
            table_id: format!("2_bkmonitor_time_series_7.{field}"),
            field_name: field.to_string(),
            tag_list: String::new(),
            last_modify_time: at,
            is_active: true,
            bk_tenant_id: DEFAULT_TENANT_ID.to_string(),
        };
        let tags: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
        row.set_tags(&tags).unwrap();
        reconciler.catalog.insert_ts_metrics(&[row]).unwrap();
    }

    fn observed(field: &str, tags: &[&str], at: u64) -> ObservedMetric {
        ObservedMetric {
            last_modify_time: Some(at as f64),
            ..ObservedMetric::new(field, tags)
        }
    }

    fn by_name(metrics: Vec<ObservedMetric>) -> BTreeMap<String, ObservedMetric> {
        metrics.into_iter().map(|m| (m.field_name.clone(), m)).collect()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn identical_tag_set_is_not_rewritten() {
        let r = reconciler();
        stored(&r, "cpu", &["target", "module", "location"], T0);
        let metrics = by_name(vec![observed("cpu", &["location", "module"], T0 + 60)]);

        let outcome = r
            .bulk_update_metrics(7, &metrics, &names(&["cpu"]), true, T0 + 60)
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::default());
        let row = r.catalog.get_ts_metric(7, "cpu").unwrap().unwrap();
        assert_eq!(row.tag_list, r#"["target","module","location"]"#);
    }

    #[test]
    fn added_tag_forces_write_regardless_of_throttle() {
        let r = reconciler();
        stored(&r, "cpu", &["target", "module", "location"], T0);
        let metrics = by_name(vec![observed("cpu", &["location", "module", "pod"], T0 + 60)]);

        let outcome = r
            .bulk_update_metrics(7, &metrics, &names(&["cpu"]), true, T0 + 60)
            .unwrap();
        assert_eq!(outcome.updated, 1);
        assert!(!outcome.needs_push);
        let row = r.catalog.get_ts_metric(7, "cpu").unwrap().unwrap();
        assert_eq!(row.tags().unwrap(), vec!["location", "module", "pod", "target"]);
        assert_eq!(row.last_modify_time, T0);
    }

    #[test]
    fn time_is_throttled_and_push_needs_larger_gap() {
        let r = reconciler();
        stored(&r, "cpu", &["target"], T0);

        let within = by_name(vec![observed("cpu", &[], T0 + DAY - 1)]);
        let outcome = r.bulk_update_metrics(7, &within, &names(&["cpu"]), true, 0).unwrap();
        assert_eq!(outcome.updated, 0);

        let a_day = by_name(vec![observed("cpu", &[], T0 + DAY)]);
        let outcome = r.bulk_update_metrics(7, &a_day, &names(&["cpu"]), true, 0).unwrap();
        assert_eq!(outcome.updated, 1);
        assert!(!outcome.needs_push);
        assert_eq!(
            r.catalog.get_ts_metric(7, "cpu").unwrap().unwrap().last_modify_time,
            T0 + DAY
        );

        let stale = by_name(vec![observed("cpu", &[], T0 + 40 * DAY)]);
        let outcome = r.bulk_update_metrics(7, &stale, &names(&["cpu"]), false, 0).unwrap();
        assert_eq!(outcome.updated, 1);
        assert!(!outcome.needs_push, "push requires auto-discovery");

        let staler = by_name(vec![observed("cpu", &[], T0 + 80 * DAY)]);
        let outcome = r.bulk_update_metrics(7, &staler, &names(&["cpu"]), true, 0).unwrap();
        assert!(outcome.needs_push);
    }

    #[test]
    fn inactive_metric_expires_with_auto_discovery() {
        let r = reconciler();
        stored(&r, "cpu", &["target"], T0);
        let mut metric = observed("cpu", &[], T0 + 5);
        metric.is_active = false;
        let metrics = by_name(vec![metric]);

        let outcome = r.bulk_update_metrics(7, &metrics, &names(&["cpu"]), true, T0).unwrap();
        assert_eq!(outcome.updated, 1);
        assert_eq!(r.catalog.get_ts_metric(7, "cpu").unwrap().unwrap().last_modify_time, 0);

        let outcome = r.bulk_update_metrics(7, &metrics, &names(&["cpu"]), true, T0).unwrap();
        assert_eq!(outcome.updated, 0);
    }

    #[test]
    fn inactive_metric_is_deleted_without_auto_discovery() {
        let r = reconciler();
        stored(&r, "cpu", &["target"], T0);
        stored(&r, "mem", &["target"], T0);
        let mut cpu = observed("cpu", &[], T0);
        cpu.is_active = false;
        let metrics = by_name(vec![cpu, observed("mem", &[], T0)]);

        let outcome = r
            .bulk_update_metrics(7, &metrics, &names(&["cpu", "mem"]), false, T0)
            .unwrap();
        assert_eq!(outcome.deleted, 1);
        assert!(r.catalog.get_ts_metric(7, "cpu").unwrap().is_none());
        assert!(r.catalog.get_ts_metric(7, "mem").unwrap().is_some());
    }

    #[test]
    fn create_skips_inactive_unless_auto_discovery() {
        let r = reconciler();
        let mut disabled = observed("disk", &["mount"], T0);
        disabled.is_active = false;
        let metrics = by_name(vec![disabled, observed("cpu", &["module"], T0)]);

        let count = r
            .bulk_create_metrics("tenant-a", 7, "2_bkmonitor_time_series_7.__default__", &metrics, &names(&["cpu", "disk"]), false, T0)
            .unwrap();
        assert_eq!(count, 1);
        let cpu = r.catalog.get_ts_metric(7, "cpu").unwrap().unwrap();
        assert_eq!(cpu.table_id, "2_bkmonitor_time_series_7.cpu");
        assert_eq!(cpu.tag_list, r#"["module","target"]"#);
        assert_eq!(cpu.bk_tenant_id, "tenant-a");
        assert_eq!(cpu.last_modify_time, T0);
        assert!(r.catalog.get_ts_metric(7, "disk").unwrap().is_none());

        let count = r
            .bulk_create_metrics("tenant-a", 7, "2_bkmonitor_time_series_7", &metrics, &names(&["disk"]), true, T0)
            .unwrap();
        assert_eq!(count, 1);
        let disk = r.catalog.get_ts_metric(7, "disk").unwrap().unwrap();
        assert_eq!(disk.last_modify_time, 0);
    }

    #[test]
    fn create_falls_back_to_single_inserts_on_conflict() {
        let r = reconciler();
        stored(&r, "cpu", &["target"], T0);
        let metrics = by_name(vec![observed("cpu", &[], T0), observed("mem", &[], T0)]);

        let count = r
            .bulk_create_metrics("system", 7, "2_bkmonitor_time_series_7", &metrics, &names(&["cpu", "mem"]), true, T0)
            .unwrap();
        assert_eq!(count, 1);
        assert!(r.catalog.get_ts_metric(7, "mem").unwrap().is_some());
    }

    #[test]
    fn invalid_names_are_filtered() {
        let r = reconciler();
        let kept = r.filter_valid(vec![
            ObservedMetric::new("cpu_usage", &[]),
            ObservedMetric::new("cpu.usage", &[]),
            ObservedMetric::new("", &[]),
            ObservedMetric::new("Mem2", &[]),
        ]);
        let kept: Vec<&str> = kept.iter().map(|m| m.field_name.as_str()).collect();
        assert_eq!(kept, vec!["cpu_usage", "Mem2"]);
    }

    #[test]
    fn thresholds_must_be_ordered() {
        let catalog = Catalog::open_in_memory().unwrap();
        let config = MetricsConfig {
            update_throttle: "30d".to_string(),
            push_threshold: "24h".to_string(),
        };
        assert!(matches!(
            MetricReconciler::new(catalog, &config),
            Err(crate::MetricsError::Config(_))
        ));
    }
}
