use std::path::Path;

use anyhow::Context;
use tsmeta_metrics::MetricReconciler;
use tsmeta_metrics::observed::parse_observations;

pub fn run(
    config_path: &Path,
    tenant: &str,
    group_id: u64,
    table_id: &str,
    metrics_path: &Path,
    auto_discovery: bool,
) -> anyhow::Result<()> {
    let (config, catalog) = super::open(config_path)?;
    let observed = std::fs::read_to_string(metrics_path)
        .with_context(|| format!("reading {}", metrics_path.display()))?;
    let observed = parse_observations(&observed)?;

    let reconciler = MetricReconciler::new(catalog, &config.metrics)?;
    let report =
        reconciler.bulk_refresh_ts_metrics(tenant, group_id, table_id, observed, auto_discovery)?;
    println!("needs_push={}", report.needs_push);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsmeta_catalog::Catalog;

    #[test]
    fn refresh_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("data/catalog.redb");
        let config = dir.path().join("tsmeta.toml");
        std::fs::write(
            &config,
            format!(
                "[catalog]\npath = {:?}\n\n[bkdata]\nbase_url = \"http://bkdata.example.com/\"\n",
                db
            ),
        )
        .unwrap();
        let metrics = dir.path().join("metrics.json");
        std::fs::write(
            &metrics,
            r#"[{"field_name": "cpu_usage", "tag_value_list": {"module": {}}}]"#,
        )
        .unwrap();

        run(&config, "system", 7, "2_bkmonitor_time_series_7.__default__", &metrics, true).unwrap();

        let catalog = Catalog::open(&db).unwrap();
        let row = catalog.get_ts_metric(7, "cpu_usage").unwrap().unwrap();
        assert_eq!(row.table_id, "2_bkmonitor_time_series_7.cpu_usage");
    }
}
