pub mod browse;
pub mod health;
pub mod ingest;
pub mod raw;

use stockhook_core::AppError;
use stockhook_storage::keys;

use crate::error::HttpAppError;

/// Normalise an `id` query parameter. Listing links from older deployments carried
/// the record file name, so a trailing `.json` is accepted.
pub(crate) fn requested_id(raw: Option<&str>) -> Result<String, HttpAppError> {
    let id = raw.map(str::trim).unwrap_or_default();
    let id = id.strip_suffix(".json").unwrap_or(id);
    if !keys::is_valid_id(id) {
        return Err(AppError::BadRequest("invalid id".to_string()).into());
    }
    Ok(id.to_string())
}

/// Fallback for unknown paths.
pub async fn not_found() -> HttpAppError {
    HttpAppError(AppError::NotFound("not found".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requested_id() {
        assert_eq!(
            requested_id(Some(" 20260101T000000Z-0a1b2c3d4e5f.json ")).unwrap(),
            "20260101T000000Z-0a1b2c3d4e5f"
        );
        assert!(requested_id(None).is_err());
        assert!(requested_id(Some("")).is_err());
        assert!(requested_id(Some(".json")).is_err());
        assert!(requested_id(Some("../../etc/passwd")).is_err());
        assert!(requested_id(Some("a/b")).is_err());
    }
}
