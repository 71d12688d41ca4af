//! Payload inspection
//!
//! Webhook senders disagree on where the interesting text lives. Body and title are
//! found by evaluating ordered lists of key-path probes against the decoded payload;
//! the first probe that yields a non-blank string wins. Adding a new sender shape
//! means adding a row to [`BODY_PROBES`] or [`TITLE_PROBES`].

use serde_json::Value;
use stockhook_core::constants::UNTITLED;

use crate::markup::heading;

/// Maximum number of characters of a title derived from the first body line.
pub const DERIVED_TITLE_MAX_CHARS: usize = 120;

/// Label reported when a plain string payload is used as the body.
pub const RAW_FIELD: &str = "raw";

/// A path of object keys from the payload root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPath {
    pub label: &'static str,
    pub keys: &'static [&'static str],
}

impl KeyPath {
    const fn new(label: &'static str, keys: &'static [&'static str]) -> Self {
        Self { label, keys }
    }

    /// The value at this path, if every step is an object containing the key.
    pub fn resolve<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        self.keys
            .iter()
            .try_fold(value, |current, key| current.as_object()?.get(*key))
    }

    fn non_blank_str<'a>(&self, value: &'a Value) -> Option<&'a str> {
        self.resolve(value)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }
}

pub const BODY_PROBES: &[KeyPath] = &[
    KeyPath::new("content", &["content"]),
    KeyPath::new("message", &["message"]),
    KeyPath::new("body", &["body"]),
    KeyPath::new("text", &["text"]),
    KeyPath::new("markdown.text", &["markdown", "text"]),
    KeyPath::new("markdown.content", &["markdown", "content"]),
    KeyPath::new("markdown", &["markdown"]),
    KeyPath::new("data.text", &["data", "text"]),
    KeyPath::new("data.content", &["data", "content"]),
];

pub const TITLE_PROBES: &[KeyPath] = &[
    KeyPath::new("title", &["title"]),
    KeyPath::new("subject", &["subject"]),
    KeyPath::new("markdown.title", &["markdown", "title"]),
    KeyPath::new("data.title", &["data", "title"]),
];

/// Body text located in a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Body {
    pub text: String,
    /// Probe label that matched, or [`RAW_FIELD`].
    pub field: &'static str,
}

/// Where a title came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleSource {
    Field(&'static str),
    Derived,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Title {
    pub text: String,
    pub source: TitleSource,
}

/// Result of inspecting one payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inspection {
    pub title: Title,
    pub body: Option<Body>,
}

/// Find the body text of a payload.
///
/// Objects are probed with [`BODY_PROBES`]; a non-blank string payload is its own
/// body. Anything else has no body.
pub fn extract_body(payload: &Value) -> Option<Body> {
    match payload {
        Value::Object(_) => BODY_PROBES.iter().find_map(|probe| {
            probe.non_blank_str(payload).map(|text| Body {
                text: text.to_string(),
                field: probe.label,
            })
        }),
        Value::String(text) if !text.trim().is_empty() => Some(Body {
            text: text.clone(),
            field: RAW_FIELD,
        }),
        _ => None,
    }
}

/// Find a title: an explicit field first, then one derived from `body`.
pub fn extract_title(payload: &Value, body: Option<&str>) -> Title {
    if payload.is_object() {
        for probe in TITLE_PROBES {
            if let Some(text) = probe.non_blank_str(payload) {
                return Title {
                    text: text.trim().to_string(),
                    source: TitleSource::Field(probe.label),
                };
            }
        }
    }

    let text = body
        .and_then(derive_title)
        .unwrap_or_else(|| UNTITLED.to_string());
    Title {
        text,
        source: TitleSource::Derived,
    }
}

/// Title from body text: the first heading line, else the first non-blank line cut
/// to [`DERIVED_TITLE_MAX_CHARS`] characters.
pub fn derive_title(body: &str) -> Option<String> {
    if body.trim().is_empty() {
        return None;
    }
    if let Some((_, text)) = body.lines().find_map(heading) {
        return Some(text.trim().to_string());
    }
    body.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.chars().take(DERIVED_TITLE_MAX_CHARS).collect())
}

pub fn inspect(payload: &Value) -> Inspection {
    let body = extract_body(payload);
    let title = extract_title(payload, body.as_ref().map(|b| b.text.as_str()));
    Inspection { title, body }
}
