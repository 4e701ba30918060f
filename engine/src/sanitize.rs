//! Normalization of type names, subscriber names and ids.
//!
//! Every boundary that accepts one of these strings runs it through the same
//! rule, so the master (registering and marking) and the subscribers (syncing)
//! always resolve a logical name to the same ledger key.

use crate::error::{Error, Result};

/// Strip everything outside the allow-list and trim the result.
///
/// Allowed: ASCII alphanumerics, `-`, `_`, `:` and whitespace. Whitespace at
/// either end is trimmed, internal whitespace is kept.
pub fn sanitize(input: &str) -> String {
    let kept: String = input.chars().filter(|c| is_allowed(*c)).collect();
    kept.trim().to_string()
}

/// Sanitize and reject empty results with `InvalidArgument`.
///
/// `kind` names the argument in the error message ("type", "id", "name").
pub fn require(kind: &str, input: &str) -> Result<String> {
    let clean = sanitize(input);
    if clean.is_empty() {
        return Err(Error::required(kind));
    }
    Ok(clean)
}

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':') || c.is_whitespace()
}
