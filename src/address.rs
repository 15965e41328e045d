//! Syntactic account address validation.

use once_cell::sync::Lazy;
use regex::Regex;

static ADDRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new("^0x[0-9a-fA-F]{40}$").expect("address pattern compiles"));

/// Returns true iff `s` is `0x` followed by exactly 40 hex characters.
///
/// Case-insensitive on the hex digits; no checksum validation. Pure and
/// total - safe to call on any input without I/O.
pub fn is_valid_address(s: &str) -> bool {
    ADDRESS_RE.is_match(s)
}
