//! Stockhook HTTP service
//!
//! Receives webhook deliveries, keeps the newest of them on disk and serves a small
//! HTML browser over what was received.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod setup;
pub mod state;
pub mod telemetry;
pub mod templates;

pub use error::HttpAppError;
pub use setup::initialize_app;
pub use state::AppState;
