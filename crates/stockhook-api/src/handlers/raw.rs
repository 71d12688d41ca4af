//! Raw body download

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use stockhook_core::constants::DEFAULT_CONTENT_TYPE;
use stockhook_storage::keys;

use super::browse::IdQuery;
use super::requested_id;
use crate::error::HttpAppError;
use crate::state::AppState;

/// Header value for a recorded content type. Text gets an explicit charset; anything
/// that is not a valid header value is served as opaque bytes.
fn content_type_header(content_type: &str) -> HeaderValue {
    let value = if content_type.starts_with("text/") {
        format!("{}; charset=utf-8", content_type)
    } else {
        content_type.to_string()
    };
    HeaderValue::from_str(&value).unwrap_or(HeaderValue::from_static(DEFAULT_CONTENT_TYPE))
}

/// Stream the stored body exactly as it was received.
#[tracing::instrument(skip(state))]
pub async fn download_raw(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
) -> Result<Response, HttpAppError> {
    let id = requested_id(query.id.as_deref())?;
    let record = state.store.get(&id).await?;
    let blob = state.store.open_blob(&record.body_ref).await?;

    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        keys::blob_file_name(&record.body_ref)
    ))
    .map_err(|e| anyhow::anyhow!("invalid content-disposition: {}", e))?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type_header(&record.content_type)),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CONTENT_LENGTH, HeaderValue::from(blob.len)),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-store")),
        ],
        Body::from_stream(blob.stream),
    )
        .into_response())
}
