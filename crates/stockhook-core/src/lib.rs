//! Stockhook Core Library
//!
//! This crate provides the domain model, error types and configuration shared by
//! the storage, rendering and API crates.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{Config, LogFormat};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{DeliveryRecord, Preview};
