//! Webhook ingestion handler

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::HttpBody,
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap},
};
use futures::TryStreamExt;
use stockhook_core::models::normalize_content_type;
use tokio_util::io::StreamReader;

use crate::error::HttpAppError;
use crate::services::DeliveryMeta;
use crate::state::AppState;

/// Declared body length. An unparseable header counts as absent; without a header
/// the body's own exact size is used when it has one.
fn declared_length(headers: &HeaderMap, exact_hint: Option<u64>) -> Option<u64> {
    match headers.get(header::CONTENT_LENGTH) {
        Some(value) => value.to_str().ok()?.trim().parse().ok(),
        None => exact_hint,
    }
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Accept one delivery on `/webhook` or `/hook`. Authentication has already
/// happened in the token middleware.
#[tracing::instrument(skip(state, request), fields(path = %request.uri().path()))]
pub async fn receive_webhook(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<String, HttpAppError> {
    let (parts, body) = request.into_parts();

    let remote_addr = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let meta = DeliveryMeta {
        remote_addr,
        path: parts.uri.path().to_string(),
        content_type: normalize_content_type(header_str(&parts.headers, header::CONTENT_TYPE)),
        user_agent: header_str(&parts.headers, header::USER_AGENT)
            .unwrap_or_default()
            .to_string(),
    };
    let declared = declared_length(&parts.headers, body.size_hint().exact());

    // A dropped connection surfaces as an early end of the body.
    let stream = body
        .into_data_stream()
        .map_err(|e| io::Error::new(io::ErrorKind::UnexpectedEof, e));
    let mut reader = StreamReader::new(stream);

    let record = state.ingestion.ingest(meta, declared, &mut reader).await?;

    Ok(format!("ok {}\n", record.id))
}
