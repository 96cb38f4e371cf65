//! Launch-location query parameter lookup.
//!
//! The hosting page or launcher may carry the endpoint in its own URL:
//!
//! ```text
//! https://game.example/index.html?WebSocketURL=ws://localhost:8000&lang=en
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::borrow::Cow;

// ============================================================================
// Functions
// ============================================================================

/// Returns the decoded value of `key` in the query string of `location`.
///
/// Splits on `?` then `&`; a missing query, a missing `=` or a fragment
/// are all tolerated. Empty values count as absent.
#[must_use]
pub fn query_param(location: &str, key: &str) -> Option<String> {
    let without_fragment = location.split('#').next().unwrap_or_default();
    let (_, query) = without_fragment.split_once('?')?;

    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .find_map(|pair| {
            let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
            if decode(raw_key) != key {
                return None;
            }
            Some(decode(raw_value).into_owned())
        })
        .filter(|value| !value.trim().is_empty())
}

/// Percent-decodes a query component, keeping the raw text if invalid.
fn decode(raw: &str) -> Cow<'_, str> {
    urlencoding::decode(raw).unwrap_or(Cow::Borrowed(raw))
}

// ============================================================================
// Tests
// ============================================================================
