//! Identifier generation and path construction.
//!
//! Every filesystem path the store touches is built here, and every builder validates
//! the identifier first. Identifiers are restricted to `[A-Za-z0-9_-]`, which rules
//! out separators, parent-directory segments and hidden-file names in one check.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::traits::{StorageError, StorageResult};

pub const RECORD_EXTENSION: &str = "json";
pub const BLOB_EXTENSION: &str = "body";
pub const TEMP_SUFFIX: &str = ".tmp";

const MAX_ID_LEN: usize = 64;
const SUFFIX_BYTES: usize = 6;

/// Generate a new identifier: `YYYYMMDDTHHMMSSZ-` followed by 12 random hex chars.
///
/// The timestamp prefix makes plain string order chronological; the random suffix
/// separates deliveries received within the same second.
pub fn generate_id(now: DateTime<Utc>) -> String {
    let mut rng = rand::rng();
    let suffix: [u8; SUFFIX_BYTES] = rng.random();
    format!("{}-{}", now.format("%Y%m%dT%H%M%SZ"), hex::encode(suffix))
}

/// Reject anything that is not a plain identifier.
pub fn validate_id(id: &str) -> StorageResult<()> {
    if id.is_empty() || id.len() > MAX_ID_LEN {
        return Err(StorageError::InvalidId(
            "identifier has an invalid length".to_string(),
        ));
    }
    if !id
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    {
        return Err(StorageError::InvalidId(
            "identifier contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

pub fn is_valid_id(id: &str) -> bool {
    validate_id(id).is_ok()
}

pub fn record_path(base: &Path, id: &str) -> StorageResult<PathBuf> {
    validate_id(id)?;
    Ok(base.join(format!("{}.{}", id, RECORD_EXTENSION)))
}

pub fn blob_path(base: &Path, blob_ref: &str) -> StorageResult<PathBuf> {
    validate_id(blob_ref)?;
    Ok(base.join(blob_file_name(blob_ref)))
}

/// Sibling path used while a file is being written.
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut name = final_path.as_os_str().to_owned();
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

/// Identifier of a committed record file, or `None` for any other directory entry.
pub fn id_from_record_file_name(file_name: &str) -> Option<&str> {
    let id = file_name.strip_suffix(RECORD_EXTENSION)?.strip_suffix('.')?;
    is_valid_id(id).then_some(id)
}

/// File name of a blob, on disk and in downloads.
pub fn blob_file_name(blob_ref: &str) -> String {
    format!("{}.{}", blob_ref, BLOB_EXTENSION)
}
