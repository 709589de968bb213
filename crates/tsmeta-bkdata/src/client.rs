//! HTTP implementation of [`BkdataApi`] over hyper.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, Request, Uri, header};
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use tsmeta_core::{BkdataConfig, ConfigError};
use url::Url;

use crate::api::BkdataApi;
use crate::error::{ApiError, ApiResult};
use crate::types::*;

const USER_AGENT: &str = concat!("tsmeta/", env!("CARGO_PKG_VERSION"));

pub(crate) const CREATE_DATA_HUB: &str = "v3/databus/data_hub/";
pub(crate) const ACCESS_DEPLOY_PLAN: &str = "v3/access/deploy_plan/";
pub(crate) const DATABUS_CLEANS: &str = "v3/databus/cleans/";
pub(crate) const START_DATABUS_CLEANS: &str = "v3/databus/tasks/";
pub(crate) const DATA_STORAGES: &str = "v3/databus/data_storages/";
pub(crate) const KAFKA_INFO: &str = "v3/databus/channels/kafka_info/";

/// Platform client sending JSON over HTTP/1.1.
#[derive(Clone)]
pub struct HttpBkdataClient {
    client: Client<HttpConnector, Full<Bytes>>,
    base_url: String,
    timeout: Duration,
}

impl HttpBkdataClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let mut base_url = base_url.trim().to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        let client = Client::builder(TokioExecutor::new()).build_http();
        Self {
            client,
            base_url,
            timeout,
        }
    }

    pub fn from_config(config: &BkdataConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(&config.base_url, config.timeout()?))
    }

    fn uri(&self, path: &str, query: &[(&str, &str)]) -> ApiResult<Uri> {
        let mut url = Url::parse(&self.base_url)
            .and_then(|base| base.join(path))
            .map_err(|e| ApiError::InvalidUrl(format!("{}{path}: {e}", self.base_url)))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        url.as_str()
            .parse::<Uri>()
            .map_err(|e| ApiError::InvalidUrl(format!("{url}: {e}")))
    }

    async fn post<B, T>(&self, operation: &'static str, path: &str, body: &B) -> ApiResult<ApiResponse<T>>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let payload = serde_json::to_vec(body).map_err(|e| ApiError::Encode {
            operation,
            message: e.to_string(),
        })?;
        let req = Request::builder()
            .method(Method::POST)
            .uri(self.uri(path, &[])?)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::USER_AGENT, USER_AGENT)
            .body(Full::new(Bytes::from(payload)))
            .map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
        self.send(operation, req).await
    }

    async fn get<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        query: &[(&str, &str)],
    ) -> ApiResult<ApiResponse<T>> {
        let req = Request::builder()
            .method(Method::GET)
            .uri(self.uri(path, query)?)
            .header(header::USER_AGENT, USER_AGENT)
            .body(Full::new(Bytes::new()))
            .map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
        self.send(operation, req).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        req: Request<Full<Bytes>>,
    ) -> ApiResult<ApiResponse<T>> {
        let uri = req.uri().clone();
        debug!(operation, %uri, "bkdata request");

        let exchange = async {
            let resp = self
                .client
                .request(req)
                .await
                .map_err(|e| ApiError::Transport {
                    operation,
                    message: e.to_string(),
                })?;
            let status = resp.status();
            let body = resp
                .into_body()
                .collect()
                .await
                .map_err(|e| ApiError::Transport {
                    operation,
                    message: e.to_string(),
                })?
                .to_bytes();
            Ok::<_, ApiError>((status, body))
        };

        let (status, body) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| ApiError::Timeout {
                operation,
                after: self.timeout,
            })??;

        if !status.is_success() {
            warn!(operation, %uri, status = status.as_u16(), "bkdata returned non-2xx");
            return Err(ApiError::Status {
                operation,
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        serde_json::from_slice(&body).map_err(|e| ApiError::Decode {
            operation,
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl BkdataApi for HttpBkdataClient {
    async fn create_data_hub(&self, req: &CreateDataHubRequest) -> ApiResult<CreateDataHubData> {
        self.post::<_, CreateDataHubData>("create_data_hub", CREATE_DATA_HUB, req)
            .await?
            .into_data("create_data_hub")
    }

    async fn access_deploy_plan(
        &self,
        req: &AccessDeployPlanRequest,
    ) -> ApiResult<AccessDeployPlanData> {
        self.post::<_, AccessDeployPlanData>("access_deploy_plan", ACCESS_DEPLOY_PLAN, req)
            .await?
            .into_data("access_deploy_plan")
    }

    async fn create_databus_clean(&self, req: &DatabusCleanRequest) -> ApiResult<DatabusCleanData> {
        self.post::<_, DatabusCleanData>("create_databus_clean", DATABUS_CLEANS, req)
            .await?
            .into_data("create_databus_clean")
    }

    async fn start_databus_clean(&self, req: &StartDatabusCleanRequest) -> ApiResult<()> {
        self.post::<_, serde_json::Value>("start_databus_clean", START_DATABUS_CLEANS, req)
            .await?
            .check("start_databus_clean")
    }

    async fn create_data_storages(&self, req: &DataStorageRequest) -> ApiResult<()> {
        self.post::<_, serde_json::Value>("create_data_storages", DATA_STORAGES, req)
            .await?
            .check("create_data_storages")
    }

    async fn get_kafka_info(&self, query: &KafkaInfoQuery) -> ApiResult<Vec<KafkaInfo>> {
        let params = [
            ("bk_app_code", query.caller.bk_app_code.as_str()),
            ("bk_username", query.caller.bk_username.as_str()),
            ("tag", query.tag.as_str()),
        ];
        self.get::<Vec<KafkaInfo>>("get_kafka_info", KAFKA_INFO, &params)
            .await?
            .into_data("get_kafka_info")
    }
}
