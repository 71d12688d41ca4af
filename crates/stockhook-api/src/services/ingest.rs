//! Webhook ingestion
//!
//! One call to [`IngestionService::ingest`] takes a delivery from its declared length
//! to a committed record: blob first, preview, record, then retention. Success is only
//! reported once both files are durably in place.

use std::sync::Arc;
use std::time::Instant;

use chrono::{SubsecRound, Utc};
use stockhook_core::{AppError, Config, DeliveryRecord, Preview};
use stockhook_storage::{RecordStore, RetentionPolicy};
use tokio::io::AsyncRead;

use crate::error::storage_error;

/// Request metadata recorded alongside the body.
#[derive(Debug, Clone, Default)]
pub struct DeliveryMeta {
    pub remote_addr: String,
    pub path: String,
    /// Normalised media type.
    pub content_type: String,
    pub user_agent: String,
}

#[derive(Clone)]
pub struct IngestionService {
    store: Arc<dyn RecordStore>,
    retention: RetentionPolicy,
    max_body_bytes: u64,
    preview_bytes: u64,
}

impl IngestionService {
    pub fn new(config: &Config, store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            retention: RetentionPolicy::new(config.max_records),
            max_body_bytes: config.max_body_bytes,
            preview_bytes: config.preview_bytes,
        }
    }

    /// Validate the declared body length before anything is read.
    pub fn accept_length(&self, declared: Option<u64>) -> Result<u64, AppError> {
        match declared {
            None => Err(AppError::BadRequest("invalid content-length".to_string())),
            Some(0) => Err(AppError::BadRequest("empty body".to_string())),
            Some(len) if len > self.max_body_bytes => {
                Err(AppError::PayloadTooLarge("payload too large".to_string()))
            }
            Some(len) => Ok(len),
        }
    }

    /// Store one delivery and return its committed record.
    pub async fn ingest(
        &self,
        meta: DeliveryMeta,
        declared_len: Option<u64>,
        body: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<DeliveryRecord, AppError> {
        let start = Instant::now();
        let len = self.accept_length(declared_len)?;

        let receipt = self.store.put(body, len).await.map_err(storage_error)?;
        let received_at = Utc::now().trunc_subsecs(0);

        let preview = match self.store.read_blob(&receipt.id, self.preview_bytes).await {
            Ok(prefix) => Preview::decode(&meta.content_type, &prefix.bytes),
            Err(e) => {
                tracing::warn!(id = %receipt.id, error = %e, "Preview unavailable");
                Preview::None
            }
        };

        let record = DeliveryRecord::new(
            receipt.id.clone(),
            received_at,
            meta.remote_addr,
            meta.path,
            meta.content_type,
            meta.user_agent,
            receipt.size,
            receipt.sha256,
        )
        .with_preview(preview, self.preview_bytes);

        if let Err(e) = self.store.commit_record(&record).await {
            // The blob would otherwise stay behind with nothing referencing it.
            if let Err(discard) = self.store.discard_blob(&receipt.id).await {
                tracing::warn!(id = %receipt.id, error = %discard, "Failed to discard orphan blob");
            }
            return Err(storage_error(e));
        }

        let report = self.retention.enforce(self.store.as_ref()).await;

        tracing::info!(
            id = %record.id,
            size_bytes = record.body_size,
            content_type = %record.content_type,
            sha256 = %record.body_hash.get(..12).unwrap_or_default(),
            evicted = report.evicted(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Delivery stored"
        );

        Ok(record)
    }
}
