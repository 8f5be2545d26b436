//! Extraction chain: raw page body to [`AttributeRecord`].
//!
//! Strategies run in a fixed order. Each one returns a [`PartialRecord`] and
//! the chain fills every still-unset field from it, so counts can come from
//! one strategy and statuses from another. The chain stops after the first
//! strategy that yields a known reputation or robokiller status.
//!
//! Order:
//!
//! 1. the generative model, when one is configured,
//! 2. [`StructuralStrategy`] (element-id anchors on the lookup page),
//! 3. [`HeuristicStrategy`] (looser patterns and sentiment keywords).
//!
//! Extraction never fails. A body nothing understands yields the all-default
//! record.

pub mod heuristic;
pub mod model;
pub mod structural;
pub mod text;

pub use heuristic::HeuristicStrategy;
pub use model::ModelClient;
pub use structural::StructuralStrategy;

use crate::types::{AttributeRecord, PartialRecord};
use regex::Regex;

/// A pure `body -> value` extraction rule for one field.
pub(crate) type Rule<T> = fn(&str) -> Option<T>;

/// Try `rules` in order; the first one that yields a value wins.
pub(crate) fn first_match<T>(rules: &[Rule<T>], body: &str) -> Option<T> {
    rules.iter().find_map(|rule| rule(body))
}

/// Try each pattern's first match in order and return the first capture
/// group 1 that `parse` accepts.
pub(crate) fn first_parsed<T>(
    patterns: &[Regex],
    body: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    patterns.iter().find_map(|re| {
        re.captures(body)
            .and_then(|caps| caps.get(1))
            .and_then(|m| parse(m.as_str().trim()))
    })
}

/// Non-negative count, allowing `,` thousands separators.
pub(crate) fn parse_count(raw: &str) -> Option<u32> {
    raw.trim().replace(',', "").parse().ok()
}

pub(crate) fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// A deterministic, synchronous extraction strategy.
pub trait PatternStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn extract(&self, body: &str) -> PartialRecord;
}

/// Ordered extraction strategies with field-level fallback.
pub struct ExtractionChain {
    model: Option<ModelClient>,
    strategies: Vec<Box<dyn PatternStrategy>>,
}

impl ExtractionChain {
    /// Structural then heuristic, no model.
    pub fn new() -> Self {
        Self {
            model: None,
            strategies: vec![Box::new(StructuralStrategy), Box::new(HeuristicStrategy)],
        }
    }

    /// Consult `model` ahead of the pattern strategies.
    pub fn with_model(mut self, model: ModelClient) -> Self {
        self.model = Some(model);
        self
    }

    /// Append a strategy after the existing ones.
    pub fn push_strategy(&mut self, strategy: Box<dyn PatternStrategy>) {
        self.strategies.push(strategy);
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    pub async fn extract(&self, body: &str) -> AttributeRecord {
        self.extract_for(None, body).await
    }

    /// Like [`extract`](Self::extract), naming the identifier to the model.
    pub async fn extract_for(&self, identifier: Option<&str>, body: &str) -> AttributeRecord {
        let mut acc = PartialRecord::default();

        if let Some(model) = &self.model {
            match model.extract(identifier, body).await {
                Ok(partial) => {
                    acc.fill_from(partial);
                    if acc.has_status() {
                        tracing::debug!("model strategy resolved status");
                        return acc.into_record();
                    }
                }
                Err(e) => tracing::warn!("model strategy unavailable, falling back: {e}"),
            }
        }

        self.run_patterns(acc, body)
    }

    fn run_patterns(&self, mut acc: PartialRecord, body: &str) -> AttributeRecord {
        for strategy in &self.strategies {
            acc.fill_from(strategy.extract(body));
            if acc.has_status() {
                tracing::debug!("{} strategy resolved status", strategy.name());
                break;
            }
        }
        acc.into_record()
    }
}

impl Default for ExtractionChain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ReputationStatus, RobokillerStatus};

    const STRUCTURED: &str = r#"
        <div class="status" id="userReputation"><h3 class="green"> Positive </h3></div>
        <div class="status" id="roboStatus"><h3 class="green"> Allowed </h3></div>
        <div class="analytics-box" id="totalCall"><p>Total calls</p><h3>11</h3></div>
        <div class="analytics-box" id="userReports"><p>User reports</p><h3>0</h3></div>
        <p>Reported as scam by nobody</p>
    "#;

    #[tokio::test]
    async fn test_structural_wins_over_heuristic() {
        let record = ExtractionChain::new().extract(STRUCTURED).await;
        assert_eq!(record.reputation_status, ReputationStatus::Positive);
        assert_eq!(record.robokiller_status, RobokillerStatus::Allowed);
        assert_eq!(record.total_calls, 11);
        assert_eq!(record.user_reports, 0);
        // heuristic never ran, so no keyword spam score
        assert_eq!(record.spam_score, None);
    }

    #[tokio::test]
    async fn test_counts_survive_status_fallback() {
        let body = r#"<div id="totalCall"><h3>7</h3></div> known robocall number"#;
        let record = ExtractionChain::new().extract(body).await;
        assert_eq!(record.total_calls, 7);
        assert_eq!(record.reputation_status, ReputationStatus::Negative);
        assert_eq!(record.spam_score, Some(75));
    }

    #[tokio::test]
    async fn test_nothing_found_yields_defaults() {
        let record = ExtractionChain::new().extract("<html><body></body></html>").await;
        assert_eq!(record, AttributeRecord::default());
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let chain = ExtractionChain::new();
        let a = tokio_test::block_on(chain.extract(STRUCTURED));
        let b = tokio_test::block_on(chain.extract(STRUCTURED));
        assert_eq!(a, b);
    }

    struct Fixed;

    impl PatternStrategy for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }
        fn extract(&self, _body: &str) -> PartialRecord {
            PartialRecord {
                carrier: Some("Acme Telecom".into()),
                ..Default::default()
            }
        }
    }

    #[tokio::test]
    async fn test_pushed_strategy_runs_last() {
        let mut chain = ExtractionChain::new();
        chain.push_strategy(Box::new(Fixed));
        let record = chain.extract("<html></html>").await;
        assert_eq!(record.carrier.as_deref(), Some("Acme Telecom"));
        assert!(!chain.has_model());
    }

    #[test]
    fn test_first_parsed_skips_unparsable_capture() {
        let patterns = [
            Regex::new(r"a=(\w+)").unwrap(),
            Regex::new(r"b=(\d+)").unwrap(),
        ];
        assert_eq!(first_parsed(&patterns, "a=x b=4", parse_count), Some(4));
        assert_eq!(first_parsed(&patterns, "nothing", parse_count), None);
    }

    #[test]
    fn test_parse_count_accepts_separators() {
        assert_eq!(parse_count(" 1,234 "), Some(1234));
        assert_eq!(parse_count("12"), Some(12));
        assert_eq!(parse_count("-3"), None);
        assert_eq!(parse_count(""), None);
    }
}
