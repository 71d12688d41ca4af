//! Route configuration and setup

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::auth::{require_token, AuthState};
use crate::handlers;
use crate::middleware::security_headers_middleware;
use crate::state::AppState;

/// Setup all application routes
pub fn setup_routes(state: Arc<AppState>) -> Router<()> {
    let auth_state = Arc::new(AuthState::new(state.config.auth_token.clone()));

    // Protected routes (require the ingestion token). The layer sits on the POST
    // handler only, so other methods get 405 without a credential check.
    let receive = post(handlers::ingest::receive_webhook)
        .route_layer(axum::middleware::from_fn_with_state(auth_state, require_token));
    let ingest_routes = Router::new()
        .route("/webhook", receive.clone())
        .route("/hook", receive);

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/", get(handlers::browse::index))
        .route("/index.html", get(handlers::browse::index))
        .route("/view", get(handlers::browse::view_record))
        .route("/raw", get(handlers::raw::download_raw));

    public_routes
        .merge(ingest_routes)
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(security_headers_middleware))
}
