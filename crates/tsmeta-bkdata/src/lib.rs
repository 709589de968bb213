//! tsmeta-bkdata: client for the remote data-processing platform.
//!
//! Every remote operation is a JSON request answered with a
//! `{result, data, message, code}` envelope. Request and response bodies
//! are explicit serde records; [`BkdataApi`] is the seam the provisioning
//! workflow talks through, and [`HttpBkdataClient`] is its hyper-backed
//! implementation.

pub mod api;
pub mod clean;
pub mod client;
pub mod error;
pub mod types;

pub use api::BkdataApi;
pub use client::HttpBkdataClient;
pub use error::{ApiError, ApiResult};
pub use types::*;
