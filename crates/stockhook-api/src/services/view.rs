//! Page models for the browsing endpoints
//!
//! These are the serializable contexts handed to the page templates. Building them
//! never fails because of payload content: unreadable blobs fall back to the stored
//! preview, and payloads without a recognisable body fall back to raw JSON.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use stockhook_core::constants::UNTITLED;
use stockhook_core::{AppError, DeliveryRecord, Preview};
use stockhook_render::inspect::{extract_body, extract_title, Body, RAW_FIELD};
use stockhook_render::{inspect, render, Document};
use stockhook_storage::RecordStore;

use crate::error::storage_error;

const HASH_PREFIX_LEN: usize = 12;

#[derive(Debug, Serialize)]
pub struct IndexPage {
    pub rows: Vec<IndexRow>,
}

#[derive(Debug, Serialize)]
pub struct IndexRow {
    pub id: String,
    pub title: String,
    pub received_at: String,
    pub size: String,
}

#[derive(Debug, Serialize)]
pub struct ViewPage {
    pub id: String,
    pub title: String,
    pub chips: Vec<Chip>,
    pub notes: Vec<String>,
    pub content: ViewContent,
}

#[derive(Debug, Serialize)]
pub struct Chip {
    pub label: &'static str,
    pub value: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViewContent {
    Document { document: Document },
    RawJson { json: String },
    Empty,
}

pub fn format_bytes(num: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let n = num as f64;
    if n < KB {
        format!("{} B", num)
    } else if n < MB {
        format!("{:.1} KB", n / KB)
    } else if n < GB {
        format!("{:.1} MB", n / MB)
    } else {
        format!("{:.1} GB", n / GB)
    }
}

pub fn format_time(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Copy of `value` with object keys in lexicographic order at every level.
fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, Value> =
                map.iter().map(|(k, v)| (k, sort_keys(v))).collect();
            Value::Object(sorted.into_iter().map(|(k, v)| (k.clone(), v)).collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// Title shown in the listing, taken from the embedded preview only.
fn preview_title(record: &DeliveryRecord) -> String {
    match record.preview() {
        Preview::Json(value) => inspect(&value).title.text,
        Preview::Text(text) => inspect(&Value::String(text)).title.text,
        Preview::Base64(_) | Preview::None => UNTITLED.to_string(),
    }
}

/// Listing of the newest records. Unreadable records still get a row.
pub async fn index_page(store: &dyn RecordStore, limit: usize) -> Result<IndexPage, AppError> {
    let ids = store.list(Some(limit)).await.map_err(storage_error)?;

    let mut rows = Vec::with_capacity(ids.len());
    for id in ids {
        let row = match store.get(&id).await {
            Ok(record) => IndexRow {
                title: preview_title(&record),
                received_at: format_time(&record.received_at),
                size: format_bytes(record.body_size),
                id,
            },
            Err(e) => {
                tracing::debug!(id = %id, error = %e, "Listing unreadable record");
                IndexRow {
                    id,
                    title: UNTITLED.to_string(),
                    received_at: String::new(),
                    size: String::new(),
                }
            }
        };
        rows.push(row);
    }

    Ok(IndexPage { rows })
}

/// Assemble the page for one record.
///
/// The full blob is rendered when it fits `render_max_bytes`; otherwise, or when it
/// cannot be read, the preview embedded in the record is used instead and a note
/// says so.
pub async fn view_page(
    store: &dyn RecordStore,
    record: &DeliveryRecord,
    render_max_bytes: u64,
) -> ViewPage {
    let mut notes = Vec::new();
    let mut payload: Option<Value> = None;
    let mut fallback_text: Option<String> = None;
    let mut rendered_full = false;

    if record.body_size <= render_max_bytes {
        match store.read_blob(&record.body_ref, render_max_bytes.saturating_add(1)).await {
            Ok(blob) if blob.bytes.len() as u64 > render_max_bytes => {
                notes.push("Body is too large to render; showing the preview.".to_string());
            }
            Ok(blob) => {
                rendered_full = true;
                if record.is_json() {
                    match serde_json::from_slice::<Value>(&blob.bytes) {
                        Ok(value) => payload = Some(value),
                        Err(_) => {
                            fallback_text = Some(String::from_utf8_lossy(&blob.bytes).into_owned())
                        }
                    }
                } else {
                    fallback_text = Some(String::from_utf8_lossy(&blob.bytes).into_owned());
                }
            }
            Err(e) => {
                tracing::warn!(id = %record.id, error = %e, "Failed to read body for view");
                notes.push("Failed to read the raw body; showing the preview.".to_string());
            }
        }
    } else {
        notes.push("Body is too large to render; showing the preview.".to_string());
    }

    if !rendered_full {
        match record.preview() {
            Preview::Json(value) => payload = Some(value),
            Preview::Text(text) => fallback_text = Some(text),
            Preview::Base64(encoded) => fallback_text = Some(format!("[binary base64]\n{}", encoded)),
            Preview::None => {}
        }
        if record.preview_truncated {
            notes.push("Preview is truncated; only the first bytes are shown.".to_string());
        }
    }

    let body = payload.as_ref().and_then(extract_body).or_else(|| {
        fallback_text
            .filter(|text| !text.is_empty())
            .map(|text| Body {
                text,
                field: RAW_FIELD,
            })
    });
    let title = extract_title(
        payload.as_ref().unwrap_or(&Value::Null),
        body.as_ref().map(|b| b.text.as_str()),
    );

    let content = match (&body, &payload) {
        (Some(body), _) => ViewContent::Document {
            document: render(&body.text),
        },
        (None, Some(value)) => {
            notes.push("No displayable body field found; showing the raw JSON.".to_string());
            ViewContent::RawJson {
                json: serde_json::to_string_pretty(&sort_keys(value))
                    .unwrap_or_else(|_| value.to_string()),
            }
        }
        (None, None) => ViewContent::Empty,
    };

    let mut chips = vec![Chip {
        label: "Received",
        value: format_time(&record.received_at),
    }];
    if record.body_size > 0 {
        chips.push(Chip {
            label: "Size",
            value: format_bytes(record.body_size),
        });
    }
    if let Some(body) = &body {
        chips.push(Chip {
            label: "Field",
            value: body.field.to_string(),
        });
    }
    if let Some(hash) = record.body_hash.get(..HASH_PREFIX_LEN) {
        chips.push(Chip {
            label: "SHA-256",
            value: hash.to_string(),
        });
    }

    ViewPage {
        id: record.id.clone(),
        title: title.text,
        chips,
        notes,
        content,
    }
}
