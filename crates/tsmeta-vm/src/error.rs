//! Errors of the VM access workflow.

use thiserror::Error;
use tsmeta_bkdata::ApiError;
use tsmeta_catalog::CatalogError;

#[derive(Debug, Error)]
pub enum AccessError {
    /// A row the workflow depends on is missing.
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// The platform refused a call or omitted a required field.
    #[error("{operation} rejected: {message} (params: {params})")]
    RemoteRejected {
        operation: &'static str,
        message: String,
        params: String,
    },

    #[error("catalog write failed for {entity} {key}: {source}")]
    CatalogWriteFailed {
        entity: &'static str,
        key: String,
        #[source]
        source: CatalogError,
    },

    /// The catalog contradicts itself (duplicate defaults, drift from the platform).
    #[error("configuration inconsistent: {0}")]
    ConfigurationInconsistent(String),

    #[error("failed to encode {what}: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("platform error: {0}")]
    Api(#[from] ApiError),
}

impl AccessError {
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        AccessError::NotFound {
            entity,
            key: key.into(),
        }
    }

    /// Wrap a platform error with the request that caused it.
    pub fn remote<P: serde::Serialize>(operation: &'static str, err: ApiError, params: &P) -> Self {
        AccessError::RemoteRejected {
            operation,
            message: err.to_string(),
            params: serde_json::to_string(params).unwrap_or_default(),
        }
    }
}

pub type AccessResult<T> = Result<T, AccessError>;
