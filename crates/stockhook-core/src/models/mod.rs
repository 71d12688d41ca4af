pub mod delivery;

pub use delivery::{is_json_content_type, normalize_content_type, DeliveryRecord, Preview};
