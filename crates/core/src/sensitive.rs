//! Masking of secrets in diagnostic output.

use std::borrow::Cow;

/// Token printed instead of a sensitive value
pub const MASK: &str = "xxxxxx";

const SENSITIVE_TERMS: &[&str] = &[
    "password",
    "passphrase",
    "passwd",
    "secret",
    "token",
    "credential",
    "key",
];

/// Keys whose last segment mentions a secret-like term are sensitive
pub fn is_sensitive(key: &str) -> bool {
    let last = key.rsplit('.').next().unwrap_or(key);
    let last = crate::keys::normalize(last);
    SENSITIVE_TERMS.iter().any(|term| last.contains(term))
}

/// The value to show for `key` in diagnostics
pub fn masked<'a>(key: &str, value: &'a str) -> Cow<'a, str> {
    if is_sensitive(key) {
        Cow::Borrowed(MASK)
    } else {
        Cow::Borrowed(value)
    }
}
