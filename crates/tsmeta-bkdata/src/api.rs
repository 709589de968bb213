//! The remote platform operations used by the provisioning workflow.

use async_trait::async_trait;

use crate::error::ApiResult;
use crate::types::*;

/// Remote data-processing platform.
///
/// Implementations must fail with [`crate::ApiError::Rejected`] when the
/// response envelope reports `result = false`.
#[async_trait]
pub trait BkdataApi: Send + Sync {
    /// Create raw data, clean and storage in a single call.
    async fn create_data_hub(&self, req: &CreateDataHubRequest) -> ApiResult<CreateDataHubData>;

    /// Register a kafka topic as raw data.
    async fn access_deploy_plan(
        &self,
        req: &AccessDeployPlanRequest,
    ) -> ApiResult<AccessDeployPlanData>;

    async fn create_databus_clean(&self, req: &DatabusCleanRequest) -> ApiResult<DatabusCleanData>;

    async fn start_databus_clean(&self, req: &StartDatabusCleanRequest) -> ApiResult<()>;

    async fn create_data_storages(&self, req: &DataStorageRequest) -> ApiResult<()>;

    /// Kafka clusters the platform consumes from, filtered by tag.
    async fn get_kafka_info(&self, query: &KafkaInfoQuery) -> ApiResult<Vec<KafkaInfo>>;
}
