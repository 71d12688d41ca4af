//! Record store abstraction
//!
//! This module defines the [`RecordStore`] trait the ingestion pipeline, the retention
//! policy and the browsing handlers are written against.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use stockhook_core::DeliveryRecord;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    #[error("Body ended after {received} of {expected} bytes")]
    ShortRead { expected: u64, received: u64 },

    #[error("Corrupt record {id}: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A blob that has been durably renamed into place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobReceipt {
    pub id: String,
    pub size: u64,
    /// Lowercase hex SHA-256 of exactly the bytes written.
    pub sha256: String,
}

/// Leading bytes of a blob.
#[derive(Debug, Clone)]
pub struct BlobPrefix {
    pub bytes: Vec<u8>,
    /// `true` when `bytes` is the whole blob.
    pub complete: bool,
}

/// A blob opened for streaming to a client.
pub struct BlobStream {
    pub len: u64,
    pub stream: Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>,
}

/// Outcome of removing one file during a delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileRemoval {
    Removed,
    Missing,
    Failed(String),
}

/// Per-file outcome of [`RecordStore::delete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteReport {
    pub record: FileRemoval,
    pub blob: FileRemoval,
}

/// Durable store for delivery records and their body blobs.
///
/// A blob is committed with [`put`](RecordStore::put) before its record is committed
/// with [`commit_record`](RecordStore::commit_record), so every visible record points
/// at a complete blob.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Stream exactly `expected_len` bytes from `reader` into a new blob.
    ///
    /// The identifier is generated by the store. On any failure the partial temp file
    /// is removed and nothing becomes visible; a reader that ends early yields
    /// [`StorageError::ShortRead`].
    async fn put(
        &self,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        expected_len: u64,
    ) -> StorageResult<BlobReceipt>;

    /// Atomically write the metadata record for an already-committed blob.
    async fn commit_record(&self, record: &DeliveryRecord) -> StorageResult<()>;

    /// Load a record by identifier.
    async fn get(&self, id: &str) -> StorageResult<DeliveryRecord>;

    /// Identifiers of committed records, newest first, at most `limit` of them.
    async fn list(&self, limit: Option<usize>) -> StorageResult<Vec<String>>;

    /// Read at most `max_bytes` from the start of a blob.
    async fn read_blob(&self, blob_ref: &str, max_bytes: u64) -> StorageResult<BlobPrefix>;

    /// Open a blob for streaming.
    async fn open_blob(&self, blob_ref: &str) -> StorageResult<BlobStream>;

    /// Remove a record and its blob. Missing files are not errors.
    async fn delete(&self, id: &str) -> StorageResult<DeleteReport>;

    /// Remove a blob whose record was never committed.
    async fn discard_blob(&self, blob_ref: &str) -> StorageResult<FileRemoval>;
}
