//! Lightweight input validation helpers. Keep logic minimal and deterministic.

use crate::CoreError;

/// Largest document id the store accepts, in bytes.
pub const MAX_DOCUMENT_ID_BYTES: usize = 1500;

/// Check that `s` is a legal document id in the hosted store's key space.
///
/// Ids are opaque, so only the store's structural rules are enforced: non-empty,
/// at most 1500 bytes, no path separator, not `.`/`..`, and not a reserved
/// `__name__` style id.
pub fn validate_document_id(s: &str) -> Result<(), CoreError> {
    if s.is_empty() {
        return Err(CoreError::InvalidId("empty".into()));
    }
    if s.len() > MAX_DOCUMENT_ID_BYTES {
        return Err(CoreError::InvalidId("too long".into()));
    }
    if s.contains('/') {
        return Err(CoreError::InvalidId("contains '/'".into()));
    }
    if s == "." || s == ".." {
        return Err(CoreError::InvalidId("reserved path segment".into()));
    }
    if s.len() >= 4 && s.starts_with("__") && s.ends_with("__") {
        return Err(CoreError::InvalidId("reserved id".into()));
    }
    Ok(())
}
