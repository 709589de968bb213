//! The VM access workflow.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::seq::SliceRandom;
use tracing::{error, info, warn};
use tsmeta_bkdata::{
    BkdataApi, Caller, DatabusCleanRequest, KafkaInfoQuery, StartDatabusCleanRequest,
};
use tsmeta_catalog::{
    AccessVmRecord, BkDataAccessState, Catalog, DEFAULT_TENANT_ID, KafkaStorage,
};
use tsmeta_core::{BkdataConfig, ClusterType, VmConfig};

use crate::clean::{self, DataHubSpec};
use crate::databus;
use crate::error::{AccessError, AccessResult};
use crate::naming::{clean_result_table_id, data_hub_name_and_topic};
use crate::resolver;
use crate::timestamp::{TimestampLen, TimestampPolicy};

const DATA_HUB_DESCRIPTION: &str = "vm access";

/// What [`VmAccessor::access_vm_by_kafka`] provisioned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KafkaAccessOutcome {
    /// Kafka cluster the table's data flows through.
    pub cluster_id: u64,
    /// Raw data id assigned by the platform.
    pub bk_data_id: u64,
    /// Result table id of the clean output.
    pub clean_rt_id: String,
    /// Whether the table already had a queue leg before this call.
    pub kafka_storage_exist: bool,
}

/// Result of [`VmAccessor::access_bkdata`].
#[derive(Debug, Clone, PartialEq)]
pub enum AccessStatus {
    /// A record already existed; nothing was called.
    AlreadyAccessed(AccessVmRecord),
    /// The table was provisioned by this call.
    Accessed(AccessVmRecord),
}

impl AccessStatus {
    pub fn record(&self) -> &AccessVmRecord {
        match self {
            AccessStatus::AlreadyAccessed(r) | AccessStatus::Accessed(r) => r,
        }
    }
}

/// How far a table has progressed through the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPhase {
    Unprovisioned,
    QueueRouted,
    CleanAccepted(u64),
    VmAccessed,
}

/// Drives result tables into VM storage through the remote platform.
pub struct VmAccessor {
    catalog: Catalog,
    api: Arc<dyn BkdataApi>,
    bkdata: BkdataConfig,
    vm: VmConfig,
    timestamps: TimestampPolicy,
}

impl VmAccessor {
    pub fn new(catalog: Catalog, api: Arc<dyn BkdataApi>, bkdata: BkdataConfig, vm: VmConfig) -> Self {
        let timestamps = TimestampPolicy::new(&vm);
        Self {
            catalog,
            api,
            bkdata,
            vm,
            timestamps,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn caller(&self) -> Caller {
        Caller {
            bk_app_code: self.bkdata.app_code.clone(),
            bk_username: self.bkdata.username.clone(),
        }
    }

    /// Where `table_id` stands, derived from the rows written so far.
    pub fn access_phase(&self, table_id: &str) -> AccessResult<AccessPhase> {
        if self.catalog.get_access_vm_record(table_id)?.is_some() {
            return Ok(AccessPhase::VmAccessed);
        }
        if let Some(storage) = self.catalog.get_bkdata_storage(table_id)? {
            if let BkDataAccessState::Accessed(id) = storage.access_state() {
                return Ok(AccessPhase::CleanAccepted(id));
            }
        }
        if self.catalog.get_kafka_storage(table_id)?.is_some() {
            return Ok(AccessPhase::QueueRouted);
        }
        Ok(AccessPhase::Unprovisioned)
    }

    /// Access `table_id` of business `bk_biz_id` into VM.
    ///
    /// Returns immediately, without remote calls, once the table has an
    /// access record.
    pub async fn access_bkdata(
        &self,
        bk_biz_id: i64,
        table_id: &str,
        bk_data_id: u32,
    ) -> AccessResult<AccessStatus> {
        let space = resolver::space_for_biz(&self.catalog, bk_biz_id)?;
        let binding = match &space {
            Some(space) => Some(resolver::ensure_space_vm_binding(
                &self.catalog,
                space,
                &self.vm.retention_time,
                now_secs(),
            )?),
            None => None,
        };

        if let Some(record) = self.catalog.get_access_vm_record(table_id)? {
            info!(%table_id, "table already accessed into vm");
            return Ok(AccessStatus::AlreadyAccessed(record));
        }

        let (data_type, bcs_cluster_id) = resolver::classify_data_source(&self.catalog, bk_data_id)?;
        let explicit_cluster_id = binding.as_ref().map_or(0, |b| b.vm_cluster_id);
        let vm_cluster =
            resolver::resolve_vm_cluster(&self.catalog, space.as_ref(), explicit_cluster_id)?;

        let (data_hub_name, topic) = data_hub_name_and_topic(table_id, self.bkdata.default_biz_id);
        let timestamp_len = self.timestamps.resolve(&self.catalog, bk_data_id, "")?;

        let outcome = self
            .access_vm_by_kafka(table_id, &data_hub_name, &vm_cluster.cluster_name, timestamp_len)
            .await?;

        if !outcome.kafka_storage_exist {
            let kafka = KafkaStorage {
                table_id: table_id.to_string(),
                topic,
                partition: 1,
                storage_cluster_id: outcome.cluster_id,
            };
            if let Err(e) = self.catalog.insert_kafka_storage(&kafka) {
                error!(%table_id, error = %e, "failed to record kafka storage for vm access");
            }
        }

        let record = AccessVmRecord {
            result_table_id: table_id.to_string(),
            data_type,
            bcs_cluster_id,
            storage_cluster_id: outcome.cluster_id,
            vm_cluster_id: vm_cluster.cluster_id,
            bk_base_data_id: outcome.bk_data_id,
            vm_result_table_id: outcome.clean_rt_id,
            bk_tenant_id: DEFAULT_TENANT_ID.to_string(),
            created_at: now_secs(),
        };
        match self.catalog.insert_access_vm_record(&record) {
            Ok(()) => info!(
                %table_id,
                data_type = record.data_type.as_str(),
                vm_cluster = %vm_cluster.cluster_name,
                bk_base_data_id = record.bk_base_data_id,
                vm_result_table_id = %record.vm_result_table_id,
                "table accessed into vm"
            ),
            Err(e) if e.is_conflict() => {
                warn!(%table_id, "access record written concurrently, keeping the existing one")
            }
            Err(source) => {
                let err = AccessError::CatalogWriteFailed {
                    entity: "access vm record",
                    key: table_id.to_string(),
                    source,
                };
                error!(error = %err, "vm access succeeded remotely but was not recorded");
            }
        }
        Ok(AccessStatus::Accessed(record))
    }

    /// Provision the clean and VM storage of `table_id`.
    ///
    /// Tables without a queue leg are provisioned with a single data hub
    /// call. Tables already routed through kafka get their topic
    /// registered as raw data first, then a clean and a VM storage on top.
    pub async fn access_vm_by_kafka(
        &self,
        table_id: &str,
        data_hub_name: &str,
        vm_cluster_name: &str,
        timestamp_len: TimestampLen,
    ) -> AccessResult<KafkaAccessOutcome> {
        let Some(kafka) = self.catalog.get_kafka_storage(table_id)? else {
            info!(%table_id, "no kafka storage, accessing through data hub");
            let cluster_id = self.refine_bkdata_kafka_info().await?;
            let (bk_data_id, clean_rt_id) = self
                .access_vm(data_hub_name, vm_cluster_name, timestamp_len)
                .await?;
            return Ok(KafkaAccessOutcome {
                cluster_id,
                bk_data_id,
                clean_rt_id,
                kafka_storage_exist: false,
            });
        };

        let (mut storage, inserted) = self.catalog.ensure_bkdata_storage(table_id)?;
        if inserted {
            info!(%table_id, "bkdata storage created");
        }
        if storage.access_state() == BkDataAccessState::NotAccessed {
            storage = databus::access_databus(&self.catalog, self.api.as_ref(), &self.bkdata, &storage)
                .await?;
        }
        let raw_data_id = match storage.access_state() {
            BkDataAccessState::Accessed(id) => id,
            BkDataAccessState::NotAccessed | BkDataAccessState::Invalid(_) => {
                return Err(AccessError::RemoteRejected {
                    operation: "access_deploy_plan",
                    message: format!("table {table_id} has raw_data_id {}", storage.raw_data_id),
                    params: String::new(),
                });
            }
        };

        let biz_id = self.bkdata.default_biz_id;
        let clean = clean::build_clean_config(data_hub_name, data_hub_name, biz_id, timestamp_len);
        let json_config = serde_json::to_string(&clean.json_config).map_err(|source| {
            AccessError::Encode {
                what: "clean json_config",
                source,
            }
        })?;
        let clean_req = DatabusCleanRequest {
            caller: self.caller(),
            bk_biz_id: biz_id,
            raw_data_id: storage.raw_data_id,
            clean_config_name: data_hub_name.to_string(),
            json_config: json_config.clone(),
            result_table_name: clean.result_table_name,
            result_table_name_alias: clean.result_table_name_alias,
            processing_id: clean.processing_id,
            description: clean.description,
            fields: clean.fields,
        };
        let created = self
            .api
            .create_databus_clean(&clean_req)
            .await
            .map_err(|e| AccessError::remote("create_databus_clean", e, &clean_req))?;
        if created.result_table_id.is_empty() {
            return Err(AccessError::RemoteRejected {
                operation: "create_databus_clean",
                message: "response has no result_table_id".to_string(),
                params: serde_json::to_string(&clean_req).unwrap_or_default(),
            });
        }

        let start_req = StartDatabusCleanRequest {
            caller: self.caller(),
            result_table_id: created.result_table_id.clone(),
            storages: vec!["kafka".to_string()],
        };
        self.api
            .start_databus_clean(&start_req)
            .await
            .map_err(|e| AccessError::remote("start_databus_clean", e, &start_req))?;

        let storage_req = clean::data_storage_request(
            self.caller(),
            storage.raw_data_id,
            data_hub_name,
            vm_cluster_name,
            &self.vm.retention_time,
        );
        self.api
            .create_data_storages(&storage_req)
            .await
            .map_err(|e| AccessError::remote("create_data_storages", e, &storage_req))?;

        storage.bk_data_result_table_id = created.result_table_id.clone();
        storage.etl_json_config = json_config;
        if let Err(e) = self.catalog.update_bkdata_storage(&storage) {
            error!(%table_id, error = %e, "failed to record clean result table");
        }

        info!(
            %table_id,
            raw_data_id,
            clean_result_table_id = %created.result_table_id,
            %vm_cluster_name,
            "clean and vm storage configured"
        );
        Ok(KafkaAccessOutcome {
            cluster_id: kafka.storage_cluster_id,
            bk_data_id: raw_data_id,
            clean_rt_id: clean_result_table_id(biz_id, data_hub_name),
            kafka_storage_exist: true,
        })
    }

    /// Pick a kafka cluster known both to the catalog and to the platform.
    pub async fn refine_bkdata_kafka_info(&self) -> AccessResult<u64> {
        let by_domain: BTreeMap<String, u64> = self
            .catalog
            .list_clusters_by_type(ClusterType::Kafka)?
            .into_iter()
            .map(|c| (c.domain_name, c.cluster_id))
            .collect();

        let query = KafkaInfoQuery {
            caller: self.caller(),
            tag: self.bkdata.kafka_tag.clone(),
        };
        let infos = self
            .api
            .get_kafka_info(&query)
            .await
            .map_err(|e| AccessError::remote("get_kafka_info", e, &query))?;
        let Some(info) = infos.first() else {
            return Err(AccessError::RemoteRejected {
                operation: "get_kafka_info",
                message: "platform returned no kafka".to_string(),
                params: serde_json::to_string(&query).unwrap_or_default(),
            });
        };

        let mut hosts = info.hosts();
        hosts.sort();
        hosts.dedup();
        let shared: Vec<(&String, u64)> = hosts
            .iter()
            .filter_map(|h| by_domain.get(h).map(|id| (h, *id)))
            .collect();
        let Some((host, cluster_id)) = shared.choose(&mut rand::thread_rng()) else {
            return Err(AccessError::ConfigurationInconsistent(format!(
                "platform kafka hosts [{}] not registered as kafka clusters",
                info.ip_list
            )));
        };
        info!(cluster_id, %host, "kafka cluster chosen for data hub access");
        Ok(*cluster_id)
    }

    async fn access_vm(
        &self,
        data_hub_name: &str,
        vm_cluster_name: &str,
        timestamp_len: TimestampLen,
    ) -> AccessResult<(u64, String)> {
        let spec = DataHubSpec {
            data_hub_name,
            bk_biz_id: self.bkdata.default_biz_id,
            vm_cluster: vm_cluster_name,
            expires: &self.vm.retention_time,
            description: DATA_HUB_DESCRIPTION,
            timestamp_len,
        };
        let req = clean::data_hub_request(self.caller(), &spec);
        let data = self
            .api
            .create_data_hub(&req)
            .await
            .map_err(|e| AccessError::remote("create_data_hub", e, &req))?;
        if data.raw_data_id == 0 {
            return Err(AccessError::RemoteRejected {
                operation: "create_data_hub",
                message: "data hub created without a raw data id".to_string(),
                params: serde_json::to_string(&req).unwrap_or_default(),
            });
        }
        let Some(clean_rt_id) = data.clean_rt_id.into_iter().next() else {
            return Err(AccessError::RemoteRejected {
                operation: "create_data_hub",
                message: format!("no clean result table for raw data {}", data.raw_data_id),
                params: serde_json::to_string(&req).unwrap_or_default(),
            });
        };
        Ok((data.raw_data_id, clean_rt_id))
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
