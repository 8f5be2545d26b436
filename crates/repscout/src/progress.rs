// Copyright 2026 Repscout Contributors
// SPDX-License-Identifier: MIT

//! Progress event types and broadcast channel for batch runs.
//!
//! The orchestrator emits `ProgressEvent`s while a run is in flight, which
//! flow through a `tokio::sync::broadcast` channel to all subscribers (the
//! CLI's run ledger, tests). When no subscriber exists, events are silently
//! dropped.

use serde::{Deserialize, Serialize};

/// A progress event emitted during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// The run this event belongs to.
    pub run_id: String,
    /// Monotonically increasing sequence number.
    pub seq: u64,
    /// The kind of progress event.
    pub event: ProgressEventKind,
}

/// The specific kind of progress event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProgressEventKind {
    /// The worklist was loaded and lookups are about to start.
    RunStarted {
        items: usize,
        concurrency: usize,
        egress_points: usize,
    },
    /// One item reached a terminal outcome.
    ItemCompleted {
        id: String,
        identifier: String,
        succeeded: bool,
        /// Reputation status on success, failure reason otherwise.
        detail: String,
        score: Option<u8>,
        egress: Option<String>,
        elapsed_ms: u64,
    },
    /// A window of lookups finished; counters are cumulative.
    WindowCompleted {
        window: usize,
        done: usize,
        total: usize,
        succeeded: usize,
        failed: usize,
        rate_per_sec: f64,
        healthy_egress: usize,
        egress_points: usize,
    },
    /// Every window finished.
    RunCompleted {
        attempted: usize,
        succeeded: usize,
        failed: usize,
        elapsed_ms: u64,
    },
}

/// Sender handle for emitting progress events.
pub type ProgressSender = tokio::sync::broadcast::Sender<ProgressEvent>;

/// Receiver handle for consuming progress events.
pub type ProgressReceiver = tokio::sync::broadcast::Receiver<ProgressEvent>;

/// Smallest buffer any progress channel gets.
pub const MIN_CAPACITY: usize = 1024;

/// Windows of item events a subscriber may fall behind by before it lags.
const BUFFERED_WINDOWS: usize = 4;

/// Create a new progress broadcast channel with a bounded buffer.
///
/// A slow subscriber sees `Lagged` rather than blocking the run.
pub fn channel() -> (ProgressSender, ProgressReceiver) {
    tokio::sync::broadcast::channel(MIN_CAPACITY)
}

/// Channel sized for a run at `concurrency`: several windows of
/// `2 × concurrency` item events plus their window markers.
pub fn channel_for(concurrency: usize) -> (ProgressSender, ProgressReceiver) {
    tokio::sync::broadcast::channel(capacity_for(concurrency))
}

pub fn capacity_for(concurrency: usize) -> usize {
    let window = 2 * concurrency.max(1) + 1;
    (BUFFERED_WINDOWS * window + 2).max(MIN_CAPACITY)
}

/// Emit a progress event, silently ignoring send errors
/// (which occur when no receivers are listening).
pub fn emit(tx: &Option<ProgressSender>, run_id: &str, seq: &mut u64, event: ProgressEventKind) {
    if let Some(ref sender) = tx {
        *seq += 1;
        let _ = sender.send(ProgressEvent {
            run_id: run_id.to_string(),
            seq: *seq,
            event,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_scales_with_concurrency() {
        assert_eq!(capacity_for(0), MIN_CAPACITY);
        assert_eq!(capacity_for(50), MIN_CAPACITY);
        assert_eq!(capacity_for(1000), 4 * 2001 + 2);
        assert!(capacity_for(5000) > 2 * 5000);
    }

    #[tokio::test]
    async fn test_large_window_does_not_lag() {
        let concurrency = 800;
        let (tx, mut rx) = channel_for(concurrency);
        let tx = Some(tx);
        let mut seq = 0;
        for i in 0..2 * concurrency {
            emit(
                &tx,
                "run-1",
                &mut seq,
                ProgressEventKind::RunStarted {
                    items: i,
                    concurrency,
                    egress_points: 0,
                },
            );
        }
        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 2 * concurrency);
    }

    #[test]
    fn test_progress_event_serialization() {
        let event = ProgressEvent {
            run_id: "run-1".to_string(),
            seq: 1,
            event: ProgressEventKind::ItemCompleted {
                id: "a".to_string(),
                identifier: "5551234567".to_string(),
                succeeded: false,
                detail: "rate limit".to_string(),
                score: None,
                egress: Some("10.0.0.1:8080".to_string()),
                elapsed_ms: 120,
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("ItemCompleted"));
        assert!(json.contains("rate limit"));

        let parsed: ProgressEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.run_id, "run-1");
        assert_eq!(parsed.seq, 1);
    }

    #[test]
    fn test_channel_no_receivers() {
        let (tx, rx) = channel();
        drop(rx);
        let mut seq = 0;
        emit(
            &Some(tx),
            "run",
            &mut seq,
            ProgressEventKind::RunCompleted {
                attempted: 0,
                succeeded: 0,
                failed: 0,
                elapsed_ms: 0,
            },
        );
        assert_eq!(seq, 1);
    }

    #[test]
    fn test_emit_none_sender() {
        let mut seq = 0;
        emit(
            &None,
            "run",
            &mut seq,
            ProgressEventKind::RunStarted {
                items: 1,
                concurrency: 1,
                egress_points: 0,
            },
        );
        assert_eq!(seq, 0);
    }
}
