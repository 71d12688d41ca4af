//! Names and defaults shared across crates.

/// Dedicated credential header, checked before `Authorization`.
pub const TOKEN_HEADER: &str = "x-stockhook-token";

/// Query parameter carrying the credential, checked last.
pub const TOKEN_QUERY_PARAM: &str = "token";

/// Content type recorded when the sender declares none.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Title used when neither the payload nor its body yields one.
pub const UNTITLED: &str = "Untitled";

pub const DEFAULT_MAX_BODY_BYTES: u64 = 256 * 1024;
pub const DEFAULT_PREVIEW_BYTES: u64 = 256 * 1024;
pub const DEFAULT_RENDER_MAX_BYTES: u64 = 2 * 1024 * 1024;
pub const DEFAULT_MAX_RECORDS: i64 = 15;
pub const DEFAULT_LIST_LIMIT: usize = 50;
pub const DEFAULT_PORT: u16 = 49554;
