//! The external record store: where the worklist comes from and where
//! results go.

pub mod json_file;

pub use json_file::JsonFileStore;

use crate::error::ScoutResult;
use crate::types::{AttributeRecord, Score};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One identifier to look up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkItem {
    /// Store key the result is written back under.
    pub id: String,
    /// Raw identifier as stored; normalised before fetching.
    pub identifier: String,
    pub last_checked: Option<DateTime<Utc>>,
}

impl WorkItem {
    pub fn new(id: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            identifier: identifier.into(),
            last_checked: None,
        }
    }
}

/// Which items a run should pick up.
#[derive(Debug, Clone)]
pub struct WorkSelector {
    /// Take every active item regardless of when it was last checked.
    pub force: bool,
    pub limit: Option<usize>,
    pub stale_after: chrono::Duration,
}

impl WorkSelector {
    pub fn new(stale_after: chrono::Duration) -> Self {
        Self {
            force: false,
            limit: None,
            stale_after,
        }
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Active and either forced, never checked, or checked before the cutoff.
    pub fn matches(
        &self,
        active: bool,
        last_checked: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> bool {
        if !active {
            return false;
        }
        if self.force {
            return true;
        }
        match last_checked {
            None => true,
            Some(checked) => checked < now - self.stale_after,
        }
    }
}

/// Partial update written for a successful lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReputationUpdate {
    pub record: AttributeRecord,
    pub score: Score,
    pub checked_at: DateTime<Utc>,
}

/// Supplies the worklist at the start of a run.
#[async_trait]
pub trait WorklistSource: Send + Sync {
    async fn fetch_worklist(&self, selector: &WorkSelector) -> ScoutResult<Vec<WorkItem>>;
}

/// Receives one write per successful item. Writes are never retried.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn write_result(&self, item: &WorkItem, update: &ReputationUpdate) -> ScoutResult<()>;
}
