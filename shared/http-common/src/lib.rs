//! Shared HTTP utilities for the Users API workspace.
//!
//! Provides the JSON error envelope and query-string helpers used by HTTP
//! front-ends over the domain crate.

// ============================================================================
// JSON Response Helpers (framework-agnostic)
// ============================================================================

/// Create a structured error JSON with a custom message.
///
/// Returns: `{"error": {"code": "<code>", "message": "<message>"}}`
pub fn json_error_with_message(code: &str, message: &str) -> serde_json::Value {
    serde_json::json!({"error": {"code": code, "message": message}})
}

// ============================================================================
// Query Parsing
// ============================================================================

/// Parse a named query parameter from a query string.
///
/// Returns the first value for `name`, form-decoded (`+` is a space, `%XX`
/// escapes are expanded, invalid UTF-8 is replaced with U+FFFD). A key without
/// `=` yields an empty value. Pairs with a bad `%` escape or a `;` are skipped
/// as if absent. Returns `None` if no usable pair carries the name.
pub fn parse_query_param(query: Option<&str>, name: &str) -> Option<String> {
    let q = query?;
    for pair in q.split('&') {
        if pair.is_empty() || pair.contains(';') {
            continue;
        }
        let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
        let (Some(key), Some(value)) = (form_decode(raw_key), form_decode(raw_value)) else {
            continue;
        };
        if key == name {
            return Some(value);
        }
    }
    None
}

fn form_decode(raw: &str) -> Option<String> {
    if !has_valid_escapes(raw) {
        return None;
    }
    let spaced = raw.replace('+', " ");
    let bytes = urlencoding::decode_binary(spaced.as_bytes());
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

// Every '%' must introduce two hex digits.
fn has_valid_escapes(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes.get(i + 1..i + 3);
            if !matches!(hex, Some(h) if h.iter().all(u8::is_ascii_hexdigit)) {
                return false;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    true
}
