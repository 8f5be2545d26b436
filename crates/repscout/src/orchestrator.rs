// Copyright 2026 Repscout Contributors
// SPDX-License-Identifier: MIT

//! Batch orchestration.
//!
//! A run walks the worklist in windows of `2 × concurrency` items. Every
//! lookup in a window is spawned at once behind a semaphore of
//! `concurrency` permits, and the whole window is awaited before the next
//! one starts. Windows are folded into [`RunStatistics`] in worklist order,
//! so the final counts do not depend on completion order inside a window.
//!
//! Per item: select egress, draw a fingerprint, fetch, classify, and on a
//! usable page extract and score. A blocked verdict counts against the
//! egress point; a transport failure does not. Nothing is retried within a
//! run. Every item ends in an [`ItemOutcome`]; a panic inside one lookup is
//! caught at the task boundary and reported as that item's failure.

use crate::classify::{classify_outcome, BlockReason, Verdict};
use crate::config::ScoutConfig;
use crate::egress::EgressPool;
use crate::error::{ScoutError, ScoutResult};
use crate::extract::ExtractionChain;
use crate::fetch::Transport;
use crate::fingerprint::FingerprintGenerator;
use crate::progress::{self, ProgressEventKind, ProgressSender};
use crate::score::score;
use crate::store::{ReputationUpdate, ResultSink, WorkItem, WorkSelector, WorklistSource};
use crate::types::{AttributeRecord, ReputationStatus, Score};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// Strip every non-digit; fewer than `min_digits` digits is invalid input.
pub fn normalize_identifier(raw: &str, min_digits: usize) -> ScoutResult<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < min_digits {
        return Err(ScoutError::InvalidInput(format!(
            "{raw:?} has {} digit(s), need at least {min_digits}",
            digits.len()
        )));
    }
    Ok(digits)
}

/// Why an item failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    InvalidInput(String),
    Blocked(BlockReason),
    Transport(String),
    /// The lookup task panicked.
    Panicked(String),
}

impl FailureReason {
    /// Stable label used as the histogram key.
    pub fn label(&self) -> String {
        match self {
            Self::InvalidInput(_) => "invalid input".to_string(),
            Self::Blocked(reason) => reason.to_string(),
            Self::Transport(_) => "transport error".to_string(),
            Self::Panicked(_) => "internal error".to_string(),
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::Blocked(reason) => write!(f, "{reason}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Panicked(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

/// Terminal outcome of one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Succeeded {
        record: AttributeRecord,
        score: Score,
    },
    Failed {
        reason: FailureReason,
    },
}

impl ItemOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// One item's result as reported back to the run.
#[derive(Debug, Clone)]
pub struct ItemResult {
    pub item: WorkItem,
    pub outcome: ItemOutcome,
    /// `host:port` of the egress point used, if any.
    pub egress: Option<String>,
    pub elapsed: Duration,
    /// Set when the store rejected the write for a successful item.
    pub write_error: Option<String>,
}

/// Aggregate counters for a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStatistics {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub windows: usize,
    pub blocked: usize,
    pub transport_errors: usize,
    pub invalid_input: usize,
    pub write_failures: usize,
    pub elapsed_ms: u64,
    /// Reputation status of every successful item.
    pub status_histogram: BTreeMap<ReputationStatus, usize>,
    pub failure_reasons: BTreeMap<String, usize>,
}

impl RunStatistics {
    fn record(&mut self, result: &ItemResult) {
        self.attempted += 1;
        match &result.outcome {
            ItemOutcome::Succeeded { record, .. } => {
                self.succeeded += 1;
                *self
                    .status_histogram
                    .entry(record.reputation_status)
                    .or_insert(0) += 1;
            }
            ItemOutcome::Failed { reason } => {
                self.failed += 1;
                match reason {
                    FailureReason::InvalidInput(_) => self.invalid_input += 1,
                    FailureReason::Blocked(_) => self.blocked += 1,
                    FailureReason::Transport(_) => self.transport_errors += 1,
                    FailureReason::Panicked(_) => {}
                }
                *self.failure_reasons.entry(reason.label()).or_insert(0) += 1;
            }
        }
        if result.write_error.is_some() {
            self.write_failures += 1;
        }
    }

    /// Successful share of attempted items, in percent.
    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            return 0.0;
        }
        self.succeeded as f64 * 100.0 / self.attempted as f64
    }
}

/// Shared per-run state handed to every lookup task.
#[derive(Clone)]
struct Pipeline {
    config: ScoutConfig,
    pool: Arc<EgressPool>,
    transport: Arc<dyn Transport>,
    chain: Arc<ExtractionChain>,
    fingerprints: FingerprintGenerator,
    sink: Option<Arc<dyn ResultSink>>,
}

impl Pipeline {
    async fn lookup(&self, item: &WorkItem) -> ItemResult {
        let start = Instant::now();
        let (outcome, egress) = self.lookup_inner(item).await;
        ItemResult {
            item: item.clone(),
            outcome,
            egress,
            elapsed: start.elapsed(),
            write_error: None,
        }
    }

    async fn lookup_inner(&self, item: &WorkItem) -> (ItemOutcome, Option<String>) {
        let digits = match normalize_identifier(&item.identifier, self.config.min_identifier_digits)
        {
            Ok(d) => d,
            Err(e) => {
                tracing::debug!("skipping {}: {e}", item.id);
                let reason = FailureReason::InvalidInput(match e {
                    ScoutError::InvalidInput(msg) => msg,
                    other => other.to_string(),
                });
                return (ItemOutcome::Failed { reason }, None);
            }
        };

        let url = format!("{}?q={digits}", self.config.lookup_base_url);
        let egress = self.pool.select();
        let fingerprint = self.fingerprints.generate();
        let server = egress.as_ref().map(|p| p.server());

        let fetched = self
            .transport
            .fetch(
                &url,
                egress.as_deref(),
                &fingerprint,
                self.config.fetch_timeout,
            )
            .await;

        let outcome = match (classify_outcome(&fetched), fetched) {
            (Verdict::Blocked(reason), _) => {
                if let Some(point) = &egress {
                    self.pool.record_blocked(point);
                }
                tracing::debug!("{digits} blocked via {server:?}: {reason}");
                ItemOutcome::Failed {
                    reason: FailureReason::Blocked(reason),
                }
            }
            (Verdict::TransportError(cause), _) => {
                tracing::debug!("{digits} transport error via {server:?}: {cause}");
                ItemOutcome::Failed {
                    reason: FailureReason::Transport(cause),
                }
            }
            (Verdict::Usable, Ok(result)) => {
                let record = self.chain.extract_for(Some(&digits), &result.body).await;
                let score = score(&record);
                if let Some(point) = &egress {
                    self.pool.record_success(point);
                }
                tracing::debug!(
                    "{digits}: {} / {} score {score}",
                    record.reputation_status,
                    record.robokiller_status
                );
                ItemOutcome::Succeeded { record, score }
            }
            // classify_outcome only reports Usable for a response
            (Verdict::Usable, Err(e)) => ItemOutcome::Failed {
                reason: FailureReason::Transport(e.to_string()),
            },
        };

        (outcome, server)
    }

    /// Lookup plus the store write for successful items.
    async fn process(&self, item: WorkItem) -> ItemResult {
        let mut result = self.lookup(&item).await;
        if let (Some(sink), ItemOutcome::Succeeded { record, score }) =
            (&self.sink, &result.outcome)
        {
            let update = ReputationUpdate {
                record: record.clone(),
                score: *score,
                checked_at: Utc::now(),
            };
            if let Err(e) = sink.write_result(&item, &update).await {
                tracing::warn!("store write failed for {}: {e}", item.id);
                result.write_error = Some(e.to_string());
            }
        }
        result
    }
}

/// Drives lookups for a worklist.
pub struct Orchestrator {
    pipeline: Pipeline,
    progress: Option<ProgressSender>,
    run_id: String,
}

impl Orchestrator {
    pub fn new(config: ScoutConfig, transport: Arc<dyn Transport>) -> Self {
        let pool = Arc::new(EgressPool::new(config.block_threshold));
        Self {
            pipeline: Pipeline {
                config,
                pool,
                transport,
                chain: Arc::new(ExtractionChain::new()),
                fingerprints: FingerprintGenerator::new(),
                sink: None,
            },
            progress: None,
            run_id: format!("run-{}", Utc::now().format("%Y%m%dT%H%M%S")),
        }
    }

    pub fn with_pool(mut self, pool: Arc<EgressPool>) -> Self {
        self.pipeline.pool = pool;
        self
    }

    pub fn with_chain(mut self, chain: ExtractionChain) -> Self {
        self.pipeline.chain = Arc::new(chain);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.pipeline.sink = Some(sink);
        self
    }

    pub fn with_progress(mut self, tx: ProgressSender) -> Self {
        self.progress = Some(tx);
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn pool(&self) -> &Arc<EgressPool> {
        &self.pipeline.pool
    }

    pub fn config(&self) -> &ScoutConfig {
        &self.pipeline.config
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Run one item through the pipeline without writing to the store.
    pub async fn lookup(&self, item: &WorkItem) -> ItemResult {
        self.pipeline.lookup(item).await
    }

    /// Load the worklist from `source` and run it at the configured
    /// concurrency. Fails only if the worklist cannot be loaded.
    pub async fn run_from(
        &self,
        source: &dyn WorklistSource,
        selector: &WorkSelector,
    ) -> ScoutResult<RunStatistics> {
        let worklist = source.fetch_worklist(selector).await?;
        Ok(self.run(worklist, self.pipeline.config.concurrency).await)
    }

    /// Process `worklist` in windows of `2 × concurrency`.
    pub async fn run(&self, worklist: Vec<WorkItem>, concurrency: usize) -> RunStatistics {
        let concurrency = concurrency.max(1);
        let window_size = concurrency * 2;
        let total = worklist.len();
        let pool = &self.pipeline.pool;
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let shared = Arc::new(self.pipeline.clone());
        let start = Instant::now();
        let mut stats = RunStatistics::default();
        let mut seq = 0u64;

        if pool.is_empty() {
            tracing::warn!("egress pool is empty, fetching directly");
        }
        tracing::info!(
            "starting run {}: {total} item(s), concurrency {concurrency}, window {window_size}",
            self.run_id
        );
        progress::emit(
            &self.progress,
            &self.run_id,
            &mut seq,
            ProgressEventKind::RunStarted {
                items: total,
                concurrency,
                egress_points: pool.len(),
            },
        );

        for window in worklist.chunks(window_size) {
            let handles: Vec<_> = window
                .iter()
                .cloned()
                .map(|item| {
                    let pipeline = Arc::clone(&shared);
                    let semaphore = Arc::clone(&semaphore);
                    tokio::spawn(async move {
                        let _permit = semaphore.acquire_owned().await;
                        pipeline.process(item).await
                    })
                })
                .collect();

            let joined = futures::future::join_all(handles).await;
            stats.windows += 1;

            for (item, joined) in window.iter().zip(joined) {
                let result = joined.unwrap_or_else(|e| {
                    tracing::warn!("lookup task for {} failed: {e}", item.id);
                    ItemResult {
                        item: item.clone(),
                        outcome: ItemOutcome::Failed {
                            reason: FailureReason::Panicked(e.to_string()),
                        },
                        egress: None,
                        elapsed: Duration::ZERO,
                        write_error: None,
                    }
                });
                stats.record(&result);
                self.emit_item(&mut seq, &result);
            }

            self.report_window(&mut seq, &stats, total, start.elapsed());
        }

        stats.elapsed_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            "run {} complete: {}/{} succeeded ({:.1}%), {} blocked, {} transport errors, {} invalid in {:.1}s",
            self.run_id,
            stats.succeeded,
            stats.attempted,
            stats.success_rate(),
            stats.blocked,
            stats.transport_errors,
            stats.invalid_input,
            stats.elapsed_ms as f64 / 1000.0
        );
        progress::emit(
            &self.progress,
            &self.run_id,
            &mut seq,
            ProgressEventKind::RunCompleted {
                attempted: stats.attempted,
                succeeded: stats.succeeded,
                failed: stats.failed,
                elapsed_ms: stats.elapsed_ms,
            },
        );
        stats
    }

    fn emit_item(&self, seq: &mut u64, result: &ItemResult) {
        let (succeeded, detail, score) = match &result.outcome {
            ItemOutcome::Succeeded { record, score } => {
                (true, record.reputation_status.to_string(), Some(score.value()))
            }
            ItemOutcome::Failed { reason } => (false, reason.to_string(), None),
        };
        progress::emit(
            &self.progress,
            &self.run_id,
            seq,
            ProgressEventKind::ItemCompleted {
                id: result.item.id.clone(),
                identifier: result.item.identifier.clone(),
                succeeded,
                detail,
                score,
                egress: result.egress.clone(),
                elapsed_ms: result.elapsed.as_millis() as u64,
            },
        );
    }

    fn report_window(&self, seq: &mut u64, stats: &RunStatistics, total: usize, elapsed: Duration) {
        let pool = &self.pipeline.pool;
        let secs = elapsed.as_secs_f64();
        let rate = if secs > 0.0 {
            stats.attempted as f64 / secs
        } else {
            0.0
        };
        let healthy = pool.healthy_count();

        tracing::info!(
            "[{:5}/{total}] ok {} failed {} | {:.1}/s | egress {healthy}/{} healthy",
            stats.attempted,
            stats.succeeded,
            stats.failed,
            rate,
            pool.len()
        );
        progress::emit(
            &self.progress,
            &self.run_id,
            seq,
            ProgressEventKind::WindowCompleted {
                window: stats.windows,
                done: stats.attempted,
                total,
                succeeded: stats.succeeded,
                failed: stats.failed,
                rate_per_sec: rate,
                healthy_egress: healthy,
                egress_points: pool.len(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::egress::{EgressPoint, EgressPool};
    use crate::error::FetchError;
    use crate::extract::PatternStrategy;
    use crate::fetch::FetchResult;
    use crate::fingerprint::FingerprintProfile;
    use crate::types::PartialRecord;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves the same page for every request and counts calls.
    struct StaticPage {
        status: u16,
        body: String,
        calls: AtomicUsize,
    }

    impl StaticPage {
        fn new(status: u16, body: impl Into<String>) -> Arc<Self> {
            Arc::new(Self {
                status,
                body: body.into(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Transport for StaticPage {
        fn name(&self) -> &str {
            "static"
        }

        async fn fetch(
            &self,
            _url: &str,
            _egress: Option<&EgressPoint>,
            _fingerprint: &FingerprintProfile,
            _timeout: Duration,
        ) -> Result<FetchResult, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(FetchResult {
                status: self.status,
                body: self.body.clone(),
                elapsed: Duration::from_millis(1),
                final_url: None,
            })
        }
    }

    fn usable_page() -> String {
        format!(
            r#"<div id="userReputation"><h3>Neutral</h3></div>{}"#,
            " ".repeat(600)
        )
    }

    fn items(n: usize) -> Vec<WorkItem> {
        (0..n)
            .map(|i| WorkItem::new(format!("id-{i}"), format!("555000{i:04}")))
            .collect()
    }

    #[test]
    fn test_normalize_identifier() {
        assert_eq!(
            normalize_identifier("+1 (555) 123-4567", 10).unwrap(),
            "15551234567"
        );
        assert!(matches!(
            normalize_identifier("555-1234", 10),
            Err(ScoutError::InvalidInput(_))
        ));
        assert!(normalize_identifier("", 10).is_err());
    }

    #[test]
    fn test_failure_reason_labels() {
        let blocked = FailureReason::Blocked(BlockReason::RateLimit);
        assert_eq!(blocked.label(), "rate limit");
        assert_eq!(blocked.to_string(), "rate limit");
        assert_eq!(
            FailureReason::Transport("reset".into()).label(),
            "transport error"
        );
    }

    #[tokio::test]
    async fn test_invalid_input_skips_network() {
        let transport = StaticPage::new(200, usable_page());
        let orch = Orchestrator::new(ScoutConfig::default(), transport.clone());
        let stats = orch.run(vec![WorkItem::new("x", "12345")], 4).await;
        assert_eq!(stats.attempted, 1);
        assert_eq!(stats.invalid_input, 1);
        assert_eq!(stats.failure_reasons.get("invalid input"), Some(&1));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_window_count_and_attempted() {
        for (n, c, windows) in [(0, 3, 0), (1, 3, 1), (6, 3, 1), (7, 3, 2), (25, 2, 7)] {
            let transport = StaticPage::new(200, usable_page());
            let orch = Orchestrator::new(ScoutConfig::default(), transport.clone());
            let stats = orch.run(items(n), c).await;
            assert_eq!(stats.attempted, n);
            assert_eq!(stats.succeeded, n);
            assert_eq!(stats.windows, windows, "n={n} c={c}");
            assert_eq!(transport.calls.load(Ordering::SeqCst), n);
        }
    }

    #[tokio::test]
    async fn test_blocked_penalises_egress() {
        let transport = StaticPage::new(429, usable_page());
        let pool = Arc::new(EgressPool::with_points(
            vec![EgressPoint::new("10.0.0.1", 8080)],
            3,
        ));
        let orch = Orchestrator::new(ScoutConfig::default(), transport).with_pool(pool.clone());
        let stats = orch.run(items(2), 1).await;
        assert_eq!(stats.blocked, 2);
        assert_eq!(stats.failure_reasons.get("rate limit"), Some(&2));
        assert_eq!(pool.snapshot()[0].blocked_count, 2);
    }

    /// Never answers in time.
    struct Stalled;

    #[async_trait]
    impl Transport for Stalled {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn fetch(
            &self,
            _url: &str,
            _egress: Option<&EgressPoint>,
            _fingerprint: &FingerprintProfile,
            timeout: Duration,
        ) -> Result<FetchResult, FetchError> {
            Err(FetchError::Timeout(timeout))
        }
    }

    fn single_point_pool() -> Arc<EgressPool> {
        Arc::new(EgressPool::with_points(
            vec![EgressPoint::new("10.0.0.1", 8080)],
            3,
        ))
    }

    #[tokio::test]
    async fn test_transport_error_does_not_penalise_egress() {
        let pool = single_point_pool();
        let orch =
            Orchestrator::new(ScoutConfig::default(), Arc::new(Stalled)).with_pool(pool.clone());
        let stats = orch.run(items(1), 1).await;
        assert_eq!(stats.transport_errors, 1);
        assert_eq!(stats.blocked, 0);
        assert_eq!(stats.failure_reasons.get("transport error"), Some(&1));

        let health = &pool.snapshot()[0];
        assert_eq!(health.blocked_count, 0);
        assert_eq!(health.success_count, 0);
    }

    #[tokio::test]
    async fn test_usable_page_records_egress_success() {
        let pool = single_point_pool();
        let transport = StaticPage::new(200, usable_page());
        let orch = Orchestrator::new(ScoutConfig::default(), transport).with_pool(pool.clone());
        let result = orch.lookup(&WorkItem::new("a", "5551234567")).await;
        assert!(result.outcome.is_success());
        assert_eq!(result.egress.as_deref(), Some("10.0.0.1:8080"));

        let health = &pool.snapshot()[0];
        assert_eq!(health.success_count, 1);
        assert_eq!(health.blocked_count, 0);
    }

    struct Exploding;

    impl PatternStrategy for Exploding {
        fn name(&self) -> &'static str {
            "exploding"
        }
        fn extract(&self, body: &str) -> PartialRecord {
            if body.contains("boom") {
                panic!("strategy failure");
            }
            PartialRecord::default()
        }
    }

    #[tokio::test]
    async fn test_panic_is_isolated_to_item() {
        let transport = StaticPage::new(200, format!("boom {}", " ".repeat(600)));
        let mut chain = ExtractionChain::new();
        chain.push_strategy(Box::new(Exploding));
        let orch = Orchestrator::new(ScoutConfig::default(), transport).with_chain(chain);

        let stats = orch.run(items(3), 2).await;
        assert_eq!(stats.attempted, 3);
        assert_eq!(stats.failed, 3);
        assert_eq!(stats.failure_reasons.get("internal error"), Some(&3));
    }

    #[tokio::test]
    async fn test_progress_events_in_order() {
        let transport = StaticPage::new(200, usable_page());
        let (tx, mut rx) = progress::channel();
        let orch = Orchestrator::new(ScoutConfig::default(), transport)
            .with_progress(tx)
            .with_run_id("test-run");
        orch.run(items(3), 1).await;

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            assert_eq!(event.run_id, "test-run");
            kinds.push(match event.event {
                ProgressEventKind::RunStarted { .. } => "start",
                ProgressEventKind::ItemCompleted { .. } => "item",
                ProgressEventKind::WindowCompleted { .. } => "window",
                ProgressEventKind::RunCompleted { .. } => "done",
            });
        }
        assert_eq!(
            kinds,
            ["start", "item", "item", "window", "item", "window", "done"]
        );
    }
}
