//! Delivery record model
//!
//! One [`DeliveryRecord`] describes one stored webhook delivery. The raw body lives
//! in a separate blob referenced by `body_ref`; the record only embeds a bounded,
//! decoded preview of it.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::DEFAULT_CONTENT_TYPE;

/// Metadata record persisted next to each body blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub id: String,
    pub received_at: DateTime<Utc>,
    #[serde(default)]
    pub remote_addr: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub user_agent: String,
    /// Identifier of the body blob. Always re-validated before it touches a path.
    pub body_ref: String,
    pub body_size: u64,
    /// Lowercase hex SHA-256 of the full blob.
    pub body_hash: String,
    #[serde(default)]
    pub preview_truncated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    decoded_json: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    decoded_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    decoded_base64: Option<String>,
}

/// Decoded prefix of a blob. At most one representation is ever stored.
#[derive(Debug, Clone, PartialEq)]
pub enum Preview {
    Json(Value),
    Text(String),
    Base64(String),
    None,
}

impl DeliveryRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        received_at: DateTime<Utc>,
        remote_addr: String,
        path: String,
        content_type: String,
        user_agent: String,
        body_size: u64,
        body_hash: String,
    ) -> Self {
        Self {
            body_ref: id.clone(),
            id,
            received_at,
            remote_addr,
            path,
            content_type,
            user_agent,
            body_size,
            body_hash,
            preview_truncated: false,
            decoded_json: None,
            decoded_text: None,
            decoded_base64: None,
        }
    }

    /// Attach a preview decoded from the first `preview_len` bytes of the blob.
    pub fn with_preview(mut self, preview: Preview, preview_len: u64) -> Self {
        self.preview_truncated = self.body_size > preview_len;
        self.decoded_json = None;
        self.decoded_text = None;
        self.decoded_base64 = None;
        match preview {
            Preview::Json(value) => self.decoded_json = Some(value),
            Preview::Text(text) => self.decoded_text = Some(text),
            Preview::Base64(encoded) => self.decoded_base64 = Some(encoded),
            Preview::None => {}
        }
        self
    }

    /// The embedded preview. A hand-edited record carrying several representations
    /// resolves in JSON, text, base64 order.
    pub fn preview(&self) -> Preview {
        if let Some(value) = &self.decoded_json {
            Preview::Json(value.clone())
        } else if let Some(text) = &self.decoded_text {
            Preview::Text(text.clone())
        } else if let Some(encoded) = &self.decoded_base64 {
            Preview::Base64(encoded.clone())
        } else {
            Preview::None
        }
    }

    pub fn is_json(&self) -> bool {
        is_json_content_type(&self.content_type)
    }
}

impl Preview {
    /// Decode a blob prefix according to its declared content type.
    ///
    /// JSON content types are parsed as JSON and degrade to lossy text. Everything else
    /// is strict UTF-8 text and degrades to base64.
    pub fn decode(content_type: &str, bytes: &[u8]) -> Preview {
        if bytes.is_empty() {
            return Preview::None;
        }

        if is_json_content_type(content_type) {
            return match serde_json::from_slice::<Value>(bytes) {
                Ok(value) => Preview::Json(value),
                Err(_) => Preview::Text(String::from_utf8_lossy(bytes).into_owned()),
            };
        }

        match std::str::from_utf8(bytes) {
            Ok(text) => Preview::Text(text.to_string()),
            // The cap may cut a multi-byte character in half; keep the valid prefix.
            Err(e) if e.error_len().is_none() && e.valid_up_to() > 0 => {
                Preview::Text(String::from_utf8_lossy(&bytes[..e.valid_up_to()]).into_owned())
            }
            Err(_) => Preview::Base64(STANDARD.encode(bytes)),
        }
    }
}

/// Strip parameters from a declared content type (`text/plain; charset=utf-8` ->
/// `text/plain`), substituting the octet-stream default when nothing is left.
pub fn normalize_content_type(raw: Option<&str>) -> String {
    let media_type = raw
        .and_then(|value| value.split(';').next())
        .map(str::trim)
        .unwrap_or("");
    if media_type.is_empty() {
        DEFAULT_CONTENT_TYPE.to_string()
    } else {
        media_type.to_string()
    }
}

pub fn is_json_content_type(content_type: &str) -> bool {
    let lowered = content_type.trim().to_ascii_lowercase();
    lowered == "application/json" || lowered == "text/json" || lowered.ends_with("+json")
}
