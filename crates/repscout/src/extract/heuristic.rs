//! Loose pattern and keyword strategy for pages without the usual anchors.
//!
//! Everything runs on the lower-cased body. Each field has an ordered list
//! of patterns and the first usable capture wins. Reputation falls back to
//! sentiment keyword groups, which also assign a midpoint spam score.

use super::{first_match, first_parsed, non_empty, parse_count, PatternStrategy, Rule};
use crate::types::{PartialRecord, ReputationStatus, RobokillerStatus};
use regex::Regex;
use std::sync::LazyLock;

const POSITIVE_KEYWORDS: &[&str] = &[
    "safe",
    "legitimate",
    "verified",
    "trusted",
    "clean",
    "good reputation",
];
const NEGATIVE_KEYWORDS: &[&str] = &[
    "spam",
    "scam",
    "fraud",
    "robocall",
    "telemarketer",
    "unwanted",
];
const NEUTRAL_MARKER: &str = r#"og:description" content="neutral""#;

const POSITIVE_SPAM_SCORE: u8 = 25;
const NEUTRAL_SPAM_SCORE: u8 = 50;
const NEGATIVE_SPAM_SCORE: u8 = 75;

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("valid regex"))
        .collect()
}

static REPUTATION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"user\s+reputation[^>]*>\s*([^<]+)",
        r"reputation[^>]*>\s*(positive|negative|neutral|unknown)",
        r"<[^>]*>\s*(positive|negative|neutral)\s*<",
        r"(positive|negative|neutral|unknown)\s*user\s*reputation",
    ])
});
static ROBOKILLER_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"robokiller\s+status[^>]*>\s*([^<]+)",
        r"status[^>]*>\s*(allowed|blocked)",
        r"(allowed|blocked)\s*robokiller\s*status",
    ])
});
static REPORT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"user\s+reports[^>]*>\s*(\d+)",
        r"(\d+)\s*user\s*reports?",
        r#"reports?['"]?\s*[:\-]\s*['"]?(\d+)"#,
    ])
});
static CALL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"total\s+calls[^>]*>\s*(\d+)",
        r"(\d+)\s*total\s*calls?",
        r#"calls?['"]?\s*[:\-]\s*['"]?(\d+)"#,
    ])
});
static DATE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"last\s+call[^>]*>\s*([^<]+)",
        r"((?:january|february|march|april|may|june|july|august|september|october|november|december)\s+\d+,?\s+\d{4})",
        r"(\d{1,2}/\d{1,2}/\d{2,4})",
        r"(\d{4}-\d{2}-\d{2})",
    ])
});
static COMMENT_PATTERNS: LazyLock<Vec<Regex>> =
    LazyLock::new(|| compile(&[r"comments?\s+(\d+)", r"(\d+)\s*comments?"]));

// ── Field rules ─────────────────────────────────────────────────────────────

fn explicit_reputation(body: &str) -> Option<ReputationStatus> {
    first_parsed(&REPUTATION_PATTERNS, body, |raw| {
        ReputationStatus::parse_loose(raw).filter(|s| s.is_known())
    })
}

fn explicit_robokiller(body: &str) -> Option<RobokillerStatus> {
    first_parsed(&ROBOKILLER_PATTERNS, body, |raw| {
        RobokillerStatus::parse_loose(raw).filter(|s| s.is_known())
    })
}

fn report_count(body: &str) -> Option<u32> {
    first_parsed(&REPORT_PATTERNS, body, parse_count)
}

fn call_count(body: &str) -> Option<u32> {
    first_parsed(&CALL_PATTERNS, body, parse_count)
}

fn last_call_date(body: &str) -> Option<String> {
    first_parsed(&DATE_PATTERNS, body, non_empty)
}

fn comment_count(body: &str) -> Option<u32> {
    first_parsed(&COMMENT_PATTERNS, body, parse_count)
}

fn neutral_marker(body: &str) -> Option<(ReputationStatus, u8)> {
    body.contains(NEUTRAL_MARKER)
        .then_some((ReputationStatus::Neutral, NEUTRAL_SPAM_SCORE))
}

fn positive_keywords(body: &str) -> Option<(ReputationStatus, u8)> {
    POSITIVE_KEYWORDS
        .iter()
        .any(|k| body.contains(*k))
        .then_some((ReputationStatus::Positive, POSITIVE_SPAM_SCORE))
}

fn negative_keywords(body: &str) -> Option<(ReputationStatus, u8)> {
    NEGATIVE_KEYWORDS
        .iter()
        .any(|k| body.contains(*k))
        .then_some((ReputationStatus::Negative, NEGATIVE_SPAM_SCORE))
}

const ROBOKILLER: &[Rule<RobokillerStatus>] = &[explicit_robokiller];
const USER_REPORTS: &[Rule<u32>] = &[report_count];
const TOTAL_CALLS: &[Rule<u32>] = &[call_count];
const LAST_CALL_DATE: &[Rule<String>] = &[last_call_date];
const COMMENTS_COUNT: &[Rule<u32>] = &[comment_count];
/// Sentiment groups, in priority order.
const SENTIMENT: &[Rule<(ReputationStatus, u8)>] =
    &[neutral_marker, positive_keywords, negative_keywords];

/// Secondary strategy for pages the structural anchors miss.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicStrategy;

impl PatternStrategy for HeuristicStrategy {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn extract(&self, body: &str) -> PartialRecord {
        let body = body.to_lowercase();

        let (reputation_status, spam_score) = match explicit_reputation(&body) {
            Some(status) => (Some(status), None),
            None => match first_match(SENTIMENT, &body) {
                Some((status, score)) => (Some(status), Some(score)),
                None => (None, None),
            },
        };

        PartialRecord {
            reputation_status,
            spam_score,
            robokiller_status: first_match(ROBOKILLER, &body),
            user_reports: first_match(USER_REPORTS, &body),
            total_calls: first_match(TOTAL_CALLS, &body),
            last_call_date: first_match(LAST_CALL_DATE, &body),
            comments_count: first_match(COMMENTS_COUNT, &body),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_keyword() {
        let r = HeuristicStrategy.extract("<p>This number is a known SCAM.</p>");
        assert_eq!(r.reputation_status, Some(ReputationStatus::Negative));
        assert_eq!(r.spam_score, Some(75));
    }

    #[test]
    fn test_positive_group_checked_first() {
        let r = HeuristicStrategy.extract("<p>spam reports: none. verified business</p>");
        assert_eq!(r.reputation_status, Some(ReputationStatus::Positive));
        assert_eq!(r.spam_score, Some(25));
    }

    #[test]
    fn test_neutral_marker() {
        let body = r#"<meta property="og:description" content="Neutral"> spam"#;
        let r = HeuristicStrategy.extract(body);
        assert_eq!(r.reputation_status, Some(ReputationStatus::Neutral));
        assert_eq!(r.spam_score, Some(50));
    }

    #[test]
    fn test_explicit_pattern_beats_keywords() {
        let body = "<span>User Reputation</span><b>Negative</b> trusted";
        let r = HeuristicStrategy.extract(body);
        assert_eq!(r.reputation_status, Some(ReputationStatus::Negative));
        assert_eq!(r.spam_score, None);
    }

    #[test]
    fn test_counters_and_dates() {
        let body = "<li>12 user reports</li><li>Total Calls: 30</li>\
                    <li>Seen on August 26, 2025</li><li>3 comments</li>\
                    <div>Robokiller status</div>Allowed";
        let r = HeuristicStrategy.extract(body);
        assert_eq!(r.user_reports, Some(12));
        assert_eq!(r.total_calls, Some(30));
        assert_eq!(r.last_call_date.as_deref(), Some("august 26, 2025"));
        assert_eq!(r.comments_count, Some(3));
        assert_eq!(r.robokiller_status, Some(RobokillerStatus::Allowed));
    }

    #[test]
    fn test_iso_date() {
        let r = HeuristicStrategy.extract("checked 2025-01-31");
        assert_eq!(r.last_call_date.as_deref(), Some("2025-01-31"));
    }
}
