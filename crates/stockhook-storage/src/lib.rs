//! Stockhook Storage Library
//!
//! Durable, atomic persistence of webhook deliveries on a local filesystem, plus the
//! retention policy that bounds how many of them are kept.
//!
//! # On-disk layout
//!
//! The data directory holds one pair of files per delivery:
//!
//! - `{id}.body`: the raw body blob, exactly as received
//! - `{id}.json`: the [`DeliveryRecord`](stockhook_core::DeliveryRecord) metadata
//!
//! Identifiers start with a UTC timestamp, so sorting record filenames sorts
//! deliveries by arrival. The directory listing is the only index. Files still being
//! written carry a `.tmp` suffix and become visible through an atomic rename.
//!
//! All path construction and identifier validation lives in the `keys` module.

pub mod keys;
pub mod local;
pub mod retention;
pub mod traits;

// Re-export commonly used types
pub use local::LocalRecordStore;
pub use retention::{EvictionOutcome, RetentionPolicy, RetentionReport};
pub use traits::{
    BlobPrefix, BlobReceipt, BlobStream, DeleteReport, FileRemoval, RecordStore, StorageError,
    StorageResult,
};
