//! tsmeta-vm: onboarding result tables into VM long-term storage.
//!
//! [`VmAccessor::access_bkdata`] drives a table from unprovisioned to
//! VM-accessed. Progress is recorded in the catalog at every step so a
//! retry resumes where the last attempt stopped:
//!
//! 1. the space is bound to a VM cluster (`SpaceVmInfo`),
//! 2. the table's queue leg exists (`KafkaStorage`),
//! 3. the platform knows the raw data (`BkDataStorage.raw_data_id`),
//! 4. clean and storage are configured and the `AccessVmRecord` is written.
//!
//! The `AccessVmRecord` check happens before any remote call.

pub mod accessor;
pub mod clean;
pub mod databus;
pub mod error;
pub mod naming;
pub mod resolver;
pub mod timestamp;

pub use accessor::{AccessPhase, AccessStatus, KafkaAccessOutcome, VmAccessor};
pub use error::{AccessError, AccessResult};
pub use timestamp::{TimestampLen, TimestampPolicy};
