// Copyright 2026 Repscout Contributors
// SPDX-License-Identifier: MIT

//! Repscout: resilient phone-number reputation lookups.
//!
//! Requests leave through a rotating pool of egress points, each with a fresh
//! browser fingerprint. Responses are classified as usable or blocked,
//! attributes are pulled out by a chain of extraction strategies, and a 0-100
//! score is derived. The orchestrator runs all of it over a worklist in
//! bounded windows.

pub mod classify;
pub mod config;
pub mod egress;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod fingerprint;
pub mod orchestrator;
pub mod progress;
pub mod score;
pub mod store;
pub mod types;

pub use classify::{classify, classify_outcome, BlockReason, Verdict};
pub use config::{EgressListConfig, ModelConfig, ScoutConfig};
pub use egress::{EgressPoint, EgressPool, EgressSource, ProxyListSource, StaticEgressSource};
pub use error::{FetchError, ModelError, ScoutError, ScoutResult};
pub use extract::{ExtractionChain, ModelClient, PatternStrategy};
pub use fetch::{FetchResult, HttpTransport, Transport};
pub use fingerprint::{FingerprintGenerator, FingerprintProfile};
pub use orchestrator::{
    normalize_identifier, FailureReason, ItemOutcome, ItemResult, Orchestrator, RunStatistics,
};
pub use score::score;
pub use store::{JsonFileStore, ReputationUpdate, ResultSink, WorkItem, WorkSelector, WorklistSource};
pub use types::*;
