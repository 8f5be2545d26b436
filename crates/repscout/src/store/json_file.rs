//! A JSON document store on the local filesystem.
//!
//! The file is a JSON array of items:
//!
//! ```json
//! [{"id": "a1", "phoneNumber": "+1 (555) 123-4567", "isActive": true,
//!   "reputation": {"score": 70, "status": "Positive",
//!                  "lastChecked": "2026-01-01T00:00:00Z", "robokillerData": {...}}}]
//! ```
//!
//! Fields this store does not know about are kept as-is. Every write rewrites
//! the whole document through a temp file and a rename.

use super::{ReputationUpdate, ResultSink, WorkItem, WorkSelector, WorklistSource};
use crate::error::{ScoutError, ScoutResult};
use crate::types::{AttributeRecord, ReputationStatus, Score};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Distribution key for active items that were never checked.
pub const UNCHECKED: &str = "Unchecked";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredItem {
    id: String,
    phone_number: String,
    #[serde(default = "default_active")]
    is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reputation: Option<StoredReputation>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredReputation {
    score: Score,
    status: ReputationStatus,
    last_checked: DateTime<Utc>,
    robokiller_data: AttributeRecord,
}

/// File-backed worklist source and result sink.
pub struct JsonFileStore {
    path: PathBuf,
    items: Mutex<Vec<StoredItem>>,
}

impl JsonFileStore {
    /// Load the document at `path`. A missing file is an error; an empty one
    /// is an empty store.
    pub async fn open(path: impl AsRef<Path>) -> ScoutResult<Self> {
        let path = path.as_ref().to_path_buf();
        let raw = tokio::fs::read_to_string(&path).await.map_err(|e| {
            ScoutError::WorklistUnavailable(format!("{}: {e}", path.display()))
        })?;
        let items: Vec<StoredItem> = if raw.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&raw).map_err(|e| {
                ScoutError::WorklistUnavailable(format!("{}: {e}", path.display()))
            })?
        };
        tracing::debug!("loaded {} item(s) from {}", items.len(), path.display());
        Ok(Self {
            path,
            items: Mutex::new(items),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Reputation status counts over active items.
    pub async fn distribution(&self) -> BTreeMap<String, usize> {
        let items = self.items.lock().await;
        let mut counts = BTreeMap::new();
        for item in items.iter().filter(|i| i.is_active) {
            let key = item
                .reputation
                .as_ref()
                .map(|r| r.status.as_str())
                .unwrap_or(UNCHECKED);
            *counts.entry(key.to_string()).or_insert(0) += 1;
        }
        counts
    }

    /// Stored reputation JSON for `id`, if any.
    pub async fn reputation_of(&self, id: &str) -> Option<serde_json::Value> {
        let items = self.items.lock().await;
        items
            .iter()
            .find(|i| i.id == id)
            .and_then(|i| i.reputation.as_ref())
            .and_then(|r| serde_json::to_value(r).ok())
    }

    async fn persist(&self, items: &[StoredItem]) -> ScoutResult<()> {
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(items)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl WorklistSource for JsonFileStore {
    async fn fetch_worklist(&self, selector: &WorkSelector) -> ScoutResult<Vec<WorkItem>> {
        let now = Utc::now();
        let items = self.items.lock().await;
        let selected = items
            .iter()
            .filter(|i| {
                selector.matches(
                    i.is_active,
                    i.reputation.as_ref().map(|r| r.last_checked),
                    now,
                )
            })
            .take(selector.limit.unwrap_or(usize::MAX))
            .map(|i| WorkItem {
                id: i.id.clone(),
                identifier: i.phone_number.clone(),
                last_checked: i.reputation.as_ref().map(|r| r.last_checked),
            })
            .collect();
        Ok(selected)
    }
}

#[async_trait]
impl ResultSink for JsonFileStore {
    async fn write_result(&self, item: &WorkItem, update: &ReputationUpdate) -> ScoutResult<()> {
        let mut items = self.items.lock().await;
        let idx = items
            .iter()
            .position(|i| i.id == item.id)
            .ok_or_else(|| ScoutError::Store(format!("no item with id {}", item.id)))?;
        let previous = items[idx].reputation.replace(StoredReputation {
            score: update.score,
            status: update.record.reputation_status,
            last_checked: update.checked_at,
            robokiller_data: update.record.clone(),
        });

        // Roll back when the document did not reach disk.
        if let Err(e) = self.persist(&items).await {
            items[idx].reputation = previous;
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"[
        {"id": "a", "phoneNumber": "+1 (555) 000-0001", "isActive": true, "tenant": "t1"},
        {"id": "b", "phoneNumber": "5550000002", "isActive": false},
        {"id": "c", "phoneNumber": "5550000003", "isActive": true,
         "reputation": {"score": 80, "status": "Positive",
                        "lastChecked": "2099-01-01T00:00:00Z",
                        "robokillerData": {"reputationStatus": "Positive",
                            "robokillerStatus": "Allowed", "userReports": 0,
                            "totalCalls": 3, "lastCallDate": null, "spamScore": null,
                            "callerName": null, "location": null, "carrier": null,
                            "commentsCount": 0}}}
    ]"#;

    async fn store() -> (tempfile::TempDir, JsonFileStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("numbers.json");
        std::fs::write(&path, DOC).unwrap();
        let store = JsonFileStore::open(&path).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_worklist_selection() {
        let (_dir, store) = store().await;
        let sel = WorkSelector::new(chrono::Duration::hours(48));
        let items = store.fetch_worklist(&sel).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "a");

        let forced = store
            .fetch_worklist(&sel.clone().force(true))
            .await
            .unwrap();
        assert_eq!(forced.len(), 2);

        let limited = store
            .fetch_worklist(&sel.force(true).limit(Some(1)))
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_write_persists_and_keeps_unknown_fields() {
        let (_dir, store) = store().await;
        let item = WorkItem::new("a", "5550000001");
        let update = ReputationUpdate {
            record: AttributeRecord {
                reputation_status: ReputationStatus::Negative,
                ..Default::default()
            },
            score: Score::clamped(20),
            checked_at: Utc::now(),
        };
        store.write_result(&item, &update).await.unwrap();

        let reopened = JsonFileStore::open(store.path()).await.unwrap();
        let rep = reopened.reputation_of("a").await.unwrap();
        assert_eq!(rep["score"], 20);
        assert_eq!(rep["status"], "Negative");
        assert_eq!(rep["robokillerData"]["reputationStatus"], "Negative");

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw[0]["tenant"], "t1");
    }

    #[tokio::test]
    async fn test_failed_persist_leaves_memory_unchanged() {
        let (_dir, store) = store().await;
        std::fs::create_dir(store.path().with_extension("json.tmp")).unwrap();
        let update = ReputationUpdate {
            record: AttributeRecord {
                reputation_status: ReputationStatus::Negative,
                ..Default::default()
            },
            score: Score::clamped(10),
            checked_at: Utc::now(),
        };

        let err = store
            .write_result(&WorkItem::new("a", "5550000001"), &update)
            .await
            .unwrap_err();
        assert!(matches!(err, ScoutError::Io(_)));
        assert!(store.reputation_of("a").await.is_none());
        assert_eq!(store.distribution().await.get(UNCHECKED), Some(&1));
        assert!(store.distribution().await.get("Negative").is_none());
    }

    #[tokio::test]
    async fn test_write_unknown_id_fails() {
        let (_dir, store) = store().await;
        let update = ReputationUpdate {
            record: AttributeRecord::default(),
            score: Score::clamped(50),
            checked_at: Utc::now(),
        };
        let err = store
            .write_result(&WorkItem::new("zzz", "1"), &update)
            .await
            .unwrap_err();
        assert!(matches!(err, ScoutError::Store(_)));
    }

    #[tokio::test]
    async fn test_distribution_counts_active_only() {
        let (_dir, store) = store().await;
        let dist = store.distribution().await;
        assert_eq!(dist.get("Positive"), Some(&1));
        assert_eq!(dist.get(UNCHECKED), Some(&1));
        assert_eq!(dist.values().sum::<usize>(), 2);
    }

    #[tokio::test]
    async fn test_missing_file_is_worklist_unavailable() {
        let err = JsonFileStore::open("/nonexistent/numbers.json")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ScoutError::WorklistUnavailable(_)));
    }
}
