//! HTML pages for browsing stored deliveries

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::Html,
};
use serde::Deserialize;

use super::requested_id;
use crate::error::HttpAppError;
use crate::services::view;
use crate::state::AppState;
use crate::templates;

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: Option<String>,
}

/// Listing of the most recent deliveries, newest first.
pub async fn index(State(state): State<Arc<AppState>>) -> Result<Html<String>, HttpAppError> {
    let page = view::index_page(state.store.as_ref(), state.config.list_limit).await?;
    Ok(Html(state.pages.render(templates::INDEX, page)?))
}

/// One delivery rendered as a document.
#[tracing::instrument(skip(state))]
pub async fn view_record(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
) -> Result<Html<String>, HttpAppError> {
    let id = requested_id(query.id.as_deref())?;
    let record = state.store.get(&id).await?;

    let page = view::view_page(state.store.as_ref(), &record, state.config.render_max_bytes).await;
    Ok(Html(state.pages.render(templates::VIEW, page)?))
}
