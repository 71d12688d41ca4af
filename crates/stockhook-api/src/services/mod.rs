pub mod ingest;
pub mod view;

pub use ingest::{DeliveryMeta, IngestionService};
