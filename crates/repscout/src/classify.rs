//! Block classification.
//!
//! Decides whether a fetched page is real content or the lookup service's
//! anti-automation response. Rules are evaluated in a fixed order and the
//! first match wins, so a 429 with a captcha page is reported as a rate
//! limit, never as a captcha.

use crate::error::FetchError;
use crate::fetch::FetchResult;
use serde::Serialize;

/// Bodies shorter than this are treated as interstitials.
pub const MIN_USABLE_BODY_BYTES: usize = 500;

/// Why a response was judged to be a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    RateLimit,
    Forbidden,
    ServerError,
    Captcha,
    RateLimitInContent,
    AccessDenied,
    HumanVerification,
    SuspiciousShortResponse,
}

impl BlockReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RateLimit => "rate limit",
            Self::Forbidden => "forbidden",
            Self::ServerError => "server error",
            Self::Captcha => "captcha",
            Self::RateLimitInContent => "rate limit in content",
            Self::AccessDenied => "access denied",
            Self::HumanVerification => "human verification",
            Self::SuspiciousShortResponse => "suspicious short response",
        }
    }
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying one fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Usable,
    Blocked(BlockReason),
    /// The fetch never produced a response. Not evidence of detection.
    TransportError(String),
}

impl Verdict {
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Usable)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Usable => f.write_str("usable"),
            Self::Blocked(reason) => write!(f, "blocked: {reason}"),
            Self::TransportError(cause) => write!(f, "transport error: {cause}"),
        }
    }
}

/// Classify a response by status first, then by body content.
pub fn classify(result: &FetchResult) -> Verdict {
    match result.status {
        429 => return Verdict::Blocked(BlockReason::RateLimit),
        403 => return Verdict::Blocked(BlockReason::Forbidden),
        s if s >= 500 => return Verdict::Blocked(BlockReason::ServerError),
        _ => {}
    }

    let body = result.body.to_lowercase();

    // "recaptcha" contains "captcha"
    if body.contains("captcha") {
        return Verdict::Blocked(BlockReason::Captcha);
    }
    if body.contains("rate limit") || body.contains("too many requests") {
        return Verdict::Blocked(BlockReason::RateLimitInContent);
    }
    if body.contains("access denied") {
        return Verdict::Blocked(BlockReason::AccessDenied);
    }
    if body.contains("please verify") && body.contains("human") {
        return Verdict::Blocked(BlockReason::HumanVerification);
    }
    if result.body.len() < MIN_USABLE_BODY_BYTES {
        return Verdict::Blocked(BlockReason::SuspiciousShortResponse);
    }

    Verdict::Usable
}

/// Fold a fetch outcome into a verdict; transport failures skip the rules.
pub fn classify_outcome(outcome: &Result<FetchResult, FetchError>) -> Verdict {
    match outcome {
        Ok(result) => classify(result),
        Err(e) => Verdict::TransportError(e.to_string()),
    }
}
