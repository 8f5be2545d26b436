//! Structural anchors on the lookup page.
//!
//! The lookup page renders each attribute in a box with a stable element id
//! (`userReputation`, `roboStatus`, `lastCall`, `totalCall`, `userReports`)
//! whose value is the box's own `<h3>`. Boxes are read with CSS selectors so
//! a value can never come from a neighbouring box. When the reputation box
//! is missing, the `og:description` meta tag carries
//! `"<status>; <caller label>"`.

use super::{first_match, non_empty, parse_count, PatternStrategy, Rule};
use crate::types::{PartialRecord, ReputationStatus, RobokillerStatus};
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;

static USER_REPUTATION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#userReputation h3").expect("valid selector"));
static ROBO_STATUS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#roboStatus h3").expect("valid selector"));
static LAST_CALL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#lastCall h3").expect("valid selector"));
static TOTAL_CALL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#totalCall h3").expect("valid selector"));
static USER_REPORTS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#userReports h3").expect("valid selector"));

static COMMENTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<h4>Comments\s*<span>\s*(\d+)\s*</span>").expect("valid regex")
});
static TYPE_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<p class="type">([^<]+)</p>"#).expect("valid regex"));
static OG_DESCRIPTION: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(r#"(?i)<meta[^>]*property="og:description"[^>]*content="([^"]+)""#)
            .expect("valid regex"),
        Regex::new(r#"(?i)<meta[^>]*content="([^"]+)"[^>]*property="og:description""#)
            .expect("valid regex"),
    ]
});

fn capture<'a>(re: &Regex, body: &'a str) -> Option<&'a str> {
    re.captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}

// ── Anchor boxes ────────────────────────────────────────────────────────────

/// Trimmed text of the first element `selector` matches.
fn box_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .next()
        .and_then(|el| non_empty(&el.text().collect::<String>()))
}

/// Values read from the anchor boxes of one parsed page.
#[derive(Debug, Default)]
struct AnchorBoxes {
    reputation: Option<ReputationStatus>,
    robokiller: Option<RobokillerStatus>,
    last_call: Option<String>,
    total_calls: Option<u32>,
    user_reports: Option<u32>,
}

impl AnchorBoxes {
    fn read(body: &str) -> Self {
        let document = Html::parse_document(body);
        Self {
            reputation: box_text(&document, &USER_REPUTATION)
                .and_then(|t| ReputationStatus::parse_loose(&t))
                .filter(|s| s.is_known()),
            robokiller: box_text(&document, &ROBO_STATUS)
                .and_then(|t| RobokillerStatus::parse_loose(&t))
                .filter(|s| s.is_known()),
            last_call: box_text(&document, &LAST_CALL),
            total_calls: box_text(&document, &TOTAL_CALL).and_then(|t| parse_count(&t)),
            user_reports: box_text(&document, &USER_REPORTS).and_then(|t| parse_count(&t)),
        }
    }
}

// ── Field rules ─────────────────────────────────────────────────────────────

fn comments_header(body: &str) -> Option<u32> {
    capture(&COMMENTS, body).and_then(parse_count)
}

fn type_label(body: &str) -> Option<String> {
    capture(&TYPE_LABEL, body).and_then(non_empty)
}

const COMMENTS_COUNT: &[Rule<u32>] = &[comments_header];
const CALLER_NAME: &[Rule<String>] = &[type_label];

/// `(status, caller label)` from the `og:description` meta tag.
fn og_description(body: &str) -> Option<(Option<ReputationStatus>, Option<String>)> {
    let content = OG_DESCRIPTION.iter().find_map(|re| capture(re, body))?;
    let mut parts = content.split(';');
    let status = parts
        .next()
        .and_then(ReputationStatus::parse_loose)
        .filter(|s| s.is_known());
    let caller = parts.next().and_then(non_empty);
    Some((status, caller))
}

/// Element-id anchors, the primary deterministic strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralStrategy;

impl PatternStrategy for StructuralStrategy {
    fn name(&self) -> &'static str {
        "structural"
    }

    fn extract(&self, body: &str) -> PartialRecord {
        let boxes = AnchorBoxes::read(body);
        let mut record = PartialRecord {
            reputation_status: boxes.reputation,
            robokiller_status: boxes.robokiller,
            user_reports: boxes.user_reports,
            total_calls: boxes.total_calls,
            last_call_date: boxes.last_call,
            comments_count: first_match(COMMENTS_COUNT, body),
            caller_name: first_match(CALLER_NAME, body),
            ..Default::default()
        };

        if record.reputation_status.is_none() {
            if let Some((status, caller)) = og_description(body) {
                record.reputation_status = status;
                if record.caller_name.is_none() {
                    record.caller_name = caller;
                }
            }
        }

        record
    }
}
