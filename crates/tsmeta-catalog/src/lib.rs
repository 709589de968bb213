//! tsmeta-catalog: the metadata catalog shared by the tsmeta workflows.
//!
//! Backed by [redb](https://docs.rs/redb), it stores spaces, storage
//! clusters, queue and platform storage bindings, VM access records and
//! time-series metrics discovered for custom report groups.
//!
//! # Architecture
//!
//! All rows are JSON-serialized into redb's `&[u8]` value columns.
//! Composite keys (`{space_type}/{space_id}`, `{group_id}:{field_name}`)
//! enable prefix scans for related records.
//!
//! Insert-if-absent operations run the existence check and the insert in
//! one write transaction. redb serializes write transactions, so two
//! callers racing on the same key observe exactly one winner.
//!
//! The `Catalog` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{CatalogError, CatalogResult};
pub use store::Catalog;
pub use types::*;
