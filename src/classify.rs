//! Classification of raw backend failures.
//!
//! The backend is an opaque dependency, so failures are categorized by
//! case-insensitive substring matching against the error's message chain.

/// Category of a backend failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Usage allotment exhausted. Terminal, trips the circuit breaker.
    Quota,
    /// Transient throttling. Retryable with backoff.
    RateLimit,
    /// Anything else. Terminal, does not advance the breaker.
    Other,
}

/// Tokens indicating quota exhaustion. Checked before the rate-limit
/// tokens: a message containing both kinds of wording is a quota failure,
/// the more severe, non-retryable condition.
const QUOTA_TOKENS: &[&str] = &[
    "insufficient_quota",
    "quota exceeded",
    "exceeded your current quota",
    "billing",
];

/// Tokens indicating transient throttling.
const RATE_LIMIT_TOKENS: &[&str] = &[
    "rate limit",
    "rate_limit",
    "too many requests",
    "throttled",
    "429",
];

/// Classify a backend failure by its message text.
pub fn classify(error: &anyhow::Error) -> ErrorKind {
    // {:#} renders the whole context chain, not just the outermost message.
    let text = format!("{error:#}").to_lowercase();

    if QUOTA_TOKENS.iter().any(|token| contains_token(&text, token)) {
        ErrorKind::Quota
    } else if RATE_LIMIT_TOKENS.iter().any(|token| contains_token(&text, token)) {
        ErrorKind::RateLimit
    } else {
        ErrorKind::Other
    }
}

/// True when `token` occurs in `text` with no alphanumeric character on
/// either side, so "429" does not match inside an ID like "4290" and "hi"
/// does not match inside "this". Tokens may span several words.
pub(crate) fn contains_token(text: &str, token: &str) -> bool {
    if token.is_empty() {
        return false;
    }
    let mut from = 0;
    while let Some(pos) = text[from..].find(token) {
        let at = from + pos;
        let end = at + token.len();
        let bounded_left = !text[..at].ends_with(|c: char| c.is_alphanumeric());
        let bounded_right = !text[end..].starts_with(|c: char| c.is_alphanumeric());
        if bounded_left && bounded_right {
            return true;
        }
        from = end;
    }
    false
}
