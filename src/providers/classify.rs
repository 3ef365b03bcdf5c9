//! Default rate-limit classification.
//!
//! Providers phrase quota rejections inconsistently, so the shared
//! heuristic checks the structured HTTP status first and falls back to the
//! phrases seen across the fleet. Descriptors with unusual phrasing
//! override [`crate::providers::Invoke::classify`] instead of widening
//! this list.

use crate::error::{ErrorClass, InvokeError};

/// Phrases that signal quota/throughput rejection, lowercase.
const RATE_LIMIT_PHRASES: &[&str] = &[
    "rate limit",
    "rate_limit",
    "quota",
    "too many requests",
];

/// Classify one attempt failure for the rotation executor.
///
/// HTTP 429 is always a rate limit. Other failures are rate limits only
/// when the provider's text matches a known phrase; everything else —
/// including plain timeouts — is treated as permanent for this request.
pub fn default_error_class(err: &InvokeError) -> ErrorClass {
    if let InvokeError::Http { status: 429, .. } = err {
        return ErrorClass::RateLimit;
    }
    if message_signals_rate_limit(&err.to_string()) {
        return ErrorClass::RateLimit;
    }
    ErrorClass::Permanent
}

/// True when provider text matches a rate-limit phrase (case-insensitive).
pub fn message_signals_rate_limit(message: &str) -> bool {
    let lower = message.to_lowercase();
    RATE_LIMIT_PHRASES.iter().any(|p| lower.contains(p))
}
