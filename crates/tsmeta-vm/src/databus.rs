//! Registering a table's kafka topic as raw data on the platform.

use tracing::{error, info};
use tsmeta_bkdata::{
    AccessConfInfo, AccessDeployPlanRequest, AccessRawData, AccessResource, BkdataApi, Caller,
    CollectionModel, KafkaScope,
};
use tsmeta_catalog::{BkDataStorage, Catalog, ClusterInfo, KafkaStorage, ResultTable};
use tsmeta_core::BkdataConfig;

use crate::error::{AccessError, AccessResult};
use crate::naming::{consumer_group_name, raw_data_name};

const REDACTED: &str = "******";

/// Deploy plan consuming `kafka` from `cluster`.
pub fn deploy_plan_request(
    config: &BkdataConfig,
    table: &ResultTable,
    kafka: &KafkaStorage,
    cluster: &ClusterInfo,
) -> AccessDeployPlanRequest {
    let broker = cluster
        .broker_address()
        .unwrap_or_else(|| config.kafka_broker_url.clone());

    AccessDeployPlanRequest {
        caller: Caller {
            bk_app_code: config.app_code.clone(),
            bk_username: config.username.clone(),
        },
        bk_biz_id: config.default_biz_id,
        data_scenario: "queue".to_string(),
        description: String::new(),
        access_raw_data: AccessRawData {
            raw_data_name: raw_data_name(&config.rt_id_prefix, &table.table_id),
            raw_data_alias: table.table_name_zh.clone(),
            maintainer: config.username.clone(),
            data_source: "kafka".to_string(),
            data_encoding: "UTF-8".to_string(),
            sensitivity: "private".to_string(),
            description: format!("kafka topic {} of {}", kafka.topic, table.table_id),
        },
        access_conf_info: AccessConfInfo {
            collection_model: CollectionModel {
                collection_type: "incr".to_string(),
                start_at: 1,
                period: "-1".to_string(),
            },
            resource: AccessResource {
                resource_type: "kafka".to_string(),
                scope: vec![KafkaScope {
                    master: broker,
                    group: consumer_group_name(&config.rt_id_prefix, &table.table_id),
                    topic: kafka.topic.clone(),
                    tasks: kafka.partition,
                    use_sasl: cluster.is_ssl_verify,
                    security_protocol: "SASL_PLAINTEXT".to_string(),
                    sasl_mechanism: "SCRAM-SHA-512".to_string(),
                    user: cluster.username.clone(),
                    password: cluster.password.clone(),
                    auto_offset_reset: "latest".to_string(),
                }],
            },
        },
    }
}

fn redacted(req: &AccessDeployPlanRequest) -> AccessDeployPlanRequest {
    let mut copy = req.clone();
    for scope in &mut copy.access_conf_info.resource.scope {
        if !scope.password.is_empty() {
            scope.password = REDACTED.to_string();
        }
    }
    copy
}

/// Register `storage.table_id`'s topic as raw data and persist the id
/// the platform assigns.
pub async fn access_databus(
    catalog: &Catalog,
    api: &dyn BkdataApi,
    config: &BkdataConfig,
    storage: &BkDataStorage,
) -> AccessResult<BkDataStorage> {
    let table_id = storage.table_id.as_str();
    let table = catalog
        .get_result_table(table_id)?
        .ok_or_else(|| AccessError::not_found("result table", table_id))?;
    let kafka = catalog.get_kafka_storage(table_id)?.ok_or_else(|| {
        error!(%table_id, "result table data not written into kafka");
        AccessError::not_found("kafka storage", table_id)
    })?;
    let cluster = catalog
        .get_cluster(kafka.storage_cluster_id)?
        .ok_or_else(|| AccessError::not_found("kafka cluster", kafka.storage_cluster_id.to_string()))?;

    let req = deploy_plan_request(config, &table, &kafka, &cluster);
    let data = api
        .access_deploy_plan(&req)
        .await
        .map_err(|e| AccessError::remote("access_deploy_plan", e, &redacted(&req)))?;
    if data.raw_data_id <= 0 {
        return Err(AccessError::RemoteRejected {
            operation: "access_deploy_plan",
            message: format!("platform returned raw_data_id {}", data.raw_data_id),
            params: serde_json::to_string(&redacted(&req)).unwrap_or_default(),
        });
    }

    let mut updated = storage.clone();
    updated.raw_data_id = data.raw_data_id;
    catalog.update_bkdata_storage(&updated)?;
    info!(
        %table_id,
        raw_data_id = data.raw_data_id,
        raw_data_name = %req.access_raw_data.raw_data_name,
        "table registered on platform"
    );
    Ok(updated)
}
