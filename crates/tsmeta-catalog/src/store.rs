//! Catalog: redb-backed metadata persistence for tsmeta.
//!
//! Provides typed operations over spaces, clusters, storage bindings,
//! access records and time-series metrics. All values are JSON-serialized
//! into redb's `&[u8]` value columns. The catalog supports both on-disk
//! and in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableHandle};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use tsmeta_core::ClusterType;

use crate::error::{CatalogError, CatalogResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `CatalogError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| CatalogError::$variant(e.to_string())
    };
}

/// Thread-safe metadata catalog backed by redb.
#[derive(Clone)]
pub struct Catalog {
    db: Arc<Database>,
}

impl Catalog {
    /// Open (or create) a persistent catalog at the given path.
    pub fn open(path: &Path) -> CatalogResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let catalog = Self { db: Arc::new(db) };
        catalog.ensure_tables()?;
        debug!(?path, "catalog opened");
        Ok(catalog)
    }

    /// Create an ephemeral in-memory catalog (for testing).
    pub fn open_in_memory() -> CatalogResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let catalog = Self { db: Arc::new(db) };
        catalog.ensure_tables()?;
        debug!("in-memory catalog opened");
        Ok(catalog)
    }

    fn ensure_tables(&self) -> CatalogResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        for table in ALL_TABLES {
            txn.open_table(table).map_err(map_err!(Table))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Row helpers ────────────────────────────────────────────────

    fn put_row<T: Serialize>(&self, table: JsonTable, key: &str, row: &T) -> CatalogResult<()> {
        let value = serde_json::to_vec(row).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut t = txn.open_table(table).map_err(map_err!(Table))?;
            t.insert(key, value.as_slice()).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn get_row<T: DeserializeOwned>(&self, table: JsonTable, key: &str) -> CatalogResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let t = txn.open_table(table).map_err(map_err!(Table))?;
        match t.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                let row: T =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(row))
            }
            None => Ok(None),
        }
    }

    fn list_rows<T: DeserializeOwned>(
        &self,
        table: JsonTable,
        prefix: Option<&str>,
    ) -> CatalogResult<Vec<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let t = txn.open_table(table).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in t.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if prefix.is_some_and(|p| !key.value().starts_with(p)) {
                continue;
            }
            let row: T = serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(row);
        }
        Ok(results)
    }

    /// Insert `row` unless `key` is taken. Returns the stored row and
    /// whether this call wrote it.
    fn insert_row_if_absent<T>(&self, table: JsonTable, key: &str, row: &T) -> CatalogResult<(T, bool)>
    where
        T: Serialize + DeserializeOwned + Clone,
    {
        let value = serde_json::to_vec(row).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let outcome;
        {
            let mut t = txn.open_table(table).map_err(map_err!(Table))?;
            let existing: Option<T> = match t.get(key).map_err(map_err!(Read))? {
                Some(guard) => {
                    Some(serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?)
                }
                None => None,
            };
            outcome = match existing {
                Some(stored) => (stored, false),
                None => {
                    t.insert(key, value.as_slice()).map_err(map_err!(Write))?;
                    (row.clone(), true)
                }
            };
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(outcome)
    }

    /// Replace an existing row. Fails with `NotFound` if `key` is absent.
    fn update_row<T: Serialize>(&self, table: JsonTable, key: &str, row: &T) -> CatalogResult<()> {
        let value = serde_json::to_vec(row).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut t = txn.open_table(table).map_err(map_err!(Table))?;
            if t.get(key).map_err(map_err!(Read))?.is_none() {
                return Err(CatalogError::NotFound(format!("{}/{key}", table.name())));
            }
            t.insert(key, value.as_slice()).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Spaces ─────────────────────────────────────────────────────

    pub fn put_space(&self, space: &Space) -> CatalogResult<()> {
        let key = space.table_key();
        self.put_row(SPACES, &key, space)?;
        debug!(%key, "space stored");
        Ok(())
    }

    pub fn get_space(&self, space_type: &str, space_id: &str) -> CatalogResult<Option<Space>> {
        self.get_row(SPACES, &space_key(space_type, space_id))
    }

    /// Look a space up by its numeric primary key.
    pub fn get_space_by_pk(&self, id: u64) -> CatalogResult<Option<Space>> {
        let spaces: Vec<Space> = self.list_rows(SPACES, None)?;
        Ok(spaces.into_iter().find(|s| s.id == id))
    }

    pub fn get_space_vm_info(
        &self,
        space_type: &str,
        space_id: &str,
    ) -> CatalogResult<Option<SpaceVmInfo>> {
        self.get_row(SPACE_VM_INFO, &space_key(space_type, space_id))
    }

    /// Bind a space to a VM cluster unless a binding already exists.
    pub fn insert_space_vm_info_if_absent(
        &self,
        info: &SpaceVmInfo,
    ) -> CatalogResult<(SpaceVmInfo, bool)> {
        let key = info.table_key();
        let (stored, inserted) = self.insert_row_if_absent(SPACE_VM_INFO, &key, info)?;
        debug!(%key, inserted, vm_cluster_id = stored.vm_cluster_id, "space vm binding");
        Ok((stored, inserted))
    }

    // ── Clusters ───────────────────────────────────────────────────

    pub fn put_cluster(&self, cluster: &ClusterInfo) -> CatalogResult<()> {
        let key = cluster.table_key();
        self.put_row(CLUSTERS, &key, cluster)?;
        debug!(%key, cluster_type = %cluster.cluster_type, "cluster stored");
        Ok(())
    }

    pub fn get_cluster(&self, cluster_id: u64) -> CatalogResult<Option<ClusterInfo>> {
        self.get_row(CLUSTERS, &cluster_id.to_string())
    }

    pub fn list_clusters_by_type(&self, cluster_type: ClusterType) -> CatalogResult<Vec<ClusterInfo>> {
        let clusters: Vec<ClusterInfo> = self.list_rows(CLUSTERS, None)?;
        Ok(clusters
            .into_iter()
            .filter(|c| c.cluster_type == cluster_type)
            .collect())
    }

    // ── Kafka storages ─────────────────────────────────────────────

    pub fn get_kafka_storage(&self, table_id: &str) -> CatalogResult<Option<KafkaStorage>> {
        self.get_row(KAFKA_STORAGES, table_id)
    }

    /// Record a queue leg. Fails with `Conflict` if the table already has one.
    pub fn insert_kafka_storage(&self, storage: &KafkaStorage) -> CatalogResult<()> {
        let key = storage.table_key();
        let (_, inserted) = self.insert_row_if_absent(KAFKA_STORAGES, &key, storage)?;
        if !inserted {
            return Err(CatalogError::Conflict(format!("kafka storage {key}")));
        }
        debug!(%key, topic = %storage.topic, "kafka storage recorded");
        Ok(())
    }

    // ── BkData storages ────────────────────────────────────────────

    pub fn get_bkdata_storage(&self, table_id: &str) -> CatalogResult<Option<BkDataStorage>> {
        self.get_row(BKDATA_STORAGES, table_id)
    }

    /// Return the binding for `table_id`, creating a not-accessed one if absent.
    pub fn ensure_bkdata_storage(&self, table_id: &str) -> CatalogResult<(BkDataStorage, bool)> {
        let fresh = BkDataStorage::not_accessed(table_id);
        let (stored, inserted) = self.insert_row_if_absent(BKDATA_STORAGES, table_id, &fresh)?;
        if inserted {
            debug!(%table_id, "bkdata storage created");
        }
        Ok((stored, inserted))
    }

    pub fn update_bkdata_storage(&self, storage: &BkDataStorage) -> CatalogResult<()> {
        let key = storage.table_key();
        self.update_row(BKDATA_STORAGES, &key, storage)?;
        debug!(%key, raw_data_id = storage.raw_data_id, "bkdata storage updated");
        Ok(())
    }

    // ── Access records ─────────────────────────────────────────────

    pub fn get_access_vm_record(&self, result_table_id: &str) -> CatalogResult<Option<AccessVmRecord>> {
        self.get_row(ACCESS_VM_RECORDS, result_table_id)
    }

    /// Mark a result table as accessed. Fails with `Conflict` if it already is.
    pub fn insert_access_vm_record(&self, record: &AccessVmRecord) -> CatalogResult<()> {
        let key = record.table_key();
        let (_, inserted) = self.insert_row_if_absent(ACCESS_VM_RECORDS, &key, record)?;
        if !inserted {
            return Err(CatalogError::Conflict(format!("access vm record {key}")));
        }
        debug!(%key, vm_result_table_id = %record.vm_result_table_id, "access vm record stored");
        Ok(())
    }

    pub fn list_access_vm_records(&self) -> CatalogResult<Vec<AccessVmRecord>> {
        self.list_rows(ACCESS_VM_RECORDS, None)
    }

    // ── Data sources, result tables, container clusters ────────────

    pub fn put_data_source(&self, source: &DataSource) -> CatalogResult<()> {
        self.put_row(DATA_SOURCES, &source.table_key(), source)
    }

    pub fn get_data_source(&self, bk_data_id: u32) -> CatalogResult<Option<DataSource>> {
        self.get_row(DATA_SOURCES, &bk_data_id.to_string())
    }

    pub fn put_result_table(&self, table: &ResultTable) -> CatalogResult<()> {
        self.put_row(RESULT_TABLES, &table.table_key(), table)
    }

    pub fn get_result_table(&self, table_id: &str) -> CatalogResult<Option<ResultTable>> {
        self.get_row(RESULT_TABLES, table_id)
    }

    pub fn put_bcs_cluster(&self, cluster: &BcsClusterInfo) -> CatalogResult<()> {
        self.put_row(BCS_CLUSTERS, &cluster.table_key(), cluster)
    }

    /// Find the container cluster owning `bk_data_id` on either metric channel.
    pub fn find_bcs_cluster_by_data_id(&self, bk_data_id: u32) -> CatalogResult<Option<BcsClusterInfo>> {
        let clusters: Vec<BcsClusterInfo> = self.list_rows(BCS_CLUSTERS, None)?;
        Ok(clusters.into_iter().find(|c| {
            c.k8s_metric_data_id == bk_data_id || c.custom_metric_data_id == bk_data_id
        }))
    }

    // ── Time-series metrics ────────────────────────────────────────

    pub fn get_ts_metric(&self, group_id: u64, field_name: &str) -> CatalogResult<Option<TimeSeriesMetric>> {
        self.get_row(TS_METRICS, &ts_metric_key(group_id, field_name))
    }

    /// List all metrics of a group, ordered by field name.
    pub fn list_ts_metrics(&self, group_id: u64) -> CatalogResult<Vec<TimeSeriesMetric>> {
        self.list_rows(TS_METRICS, Some(&ts_metric_group_prefix(group_id)))
    }

    /// Insert new metrics in one transaction. Nothing is written if any
    /// of them already exists.
    pub fn insert_ts_metrics(&self, metrics: &[TimeSeriesMetric]) -> CatalogResult<u32> {
        let mut encoded = Vec::with_capacity(metrics.len());
        for metric in metrics {
            let value = serde_json::to_vec(metric).map_err(map_err!(Serialize))?;
            encoded.push((metric.table_key(), value));
        }
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(TS_METRICS).map_err(map_err!(Table))?;
            for (key, value) in &encoded {
                if table.get(key.as_str()).map_err(map_err!(Read))?.is_some() {
                    return Err(CatalogError::Conflict(format!("ts metric {key}")));
                }
                table
                    .insert(key.as_str(), value.as_slice())
                    .map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(count = encoded.len(), "ts metrics inserted");
        Ok(encoded.len() as u32)
    }

    pub fn update_ts_metric(&self, metric: &TimeSeriesMetric) -> CatalogResult<()> {
        self.update_row(TS_METRICS, &metric.table_key(), metric)
    }

    /// Delete the named metrics of a group. Returns how many existed.
    pub fn delete_ts_metrics(&self, group_id: u64, field_names: &[String]) -> CatalogResult<u32> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let mut count = 0u32;
        {
            let mut table = txn.open_table(TS_METRICS).map_err(map_err!(Table))?;
            for name in field_names {
                let key = ts_metric_key(group_id, name);
                if table.remove(key.as_str()).map_err(map_err!(Write))?.is_some() {
                    count += 1;
                }
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(group_id, count, "ts metrics deleted");
        Ok(count)
    }
}
