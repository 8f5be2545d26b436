//! JSONL run ledger: one line per completed item.
//!
//! - Append-only JSONL, one object per line
//! - Rotates when the file exceeds `MAX_LOG_SIZE` (100MB)
//! - Rotated files are named `.1`, `.2`, etc. (max 5 rotations)

use anyhow::{Context, Result};
use chrono::Utc;
use repscout::progress::{ProgressEventKind, ProgressReceiver};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast::error::RecvError;

/// Maximum ledger size before rotation (100 MB).
const MAX_LOG_SIZE: u64 = 100 * 1024 * 1024;

/// Maximum number of rotated ledger files to keep.
const MAX_ROTATIONS: u32 = 5;

/// One completed item.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerEntry {
    pub timestamp: String,
    pub run_id: String,
    pub id: String,
    pub identifier: String,
    /// `succeeded` or `failed`.
    pub outcome: &'static str,
    /// Reputation status on success, failure reason otherwise.
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub egress: Option<String>,
    pub elapsed_ms: u64,
}

/// Append-only JSONL ledger with automatic rotation.
pub struct RunLedger {
    file: File,
    path: PathBuf,
    current_size: u64,
    max_size: u64,
}

impl RunLedger {
    /// Open or create the ledger file.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open ledger: {}", path.display()))?;

        let current_size = file.metadata().map(|m| m.len()).unwrap_or(0);

        Ok(Self {
            file,
            path: path.to_path_buf(),
            current_size,
            max_size: MAX_LOG_SIZE,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, entry: &LedgerEntry) -> Result<()> {
        if self.current_size >= self.max_size {
            self.rotate()?;
        }

        let json = serde_json::to_string(entry)?;
        writeln!(self.file, "{json}")
            .with_context(|| format!("failed to write ledger: {}", self.path.display()))?;
        self.current_size += json.len() as u64 + 1;
        Ok(())
    }

    /// Rotate: ledger.jsonl → ledger.jsonl.1, .1 → .2, etc.
    fn rotate(&mut self) -> Result<()> {
        self.file.flush()?;

        let oldest = rotation_path(&self.path, MAX_ROTATIONS);
        if oldest.exists() {
            if let Err(e) = std::fs::remove_file(&oldest) {
                tracing::warn!("could not remove {}: {e}", oldest.display());
            }
        }
        for i in (1..MAX_ROTATIONS).rev() {
            let from = rotation_path(&self.path, i);
            if from.exists() {
                shift(&from, &rotation_path(&self.path, i + 1));
            }
        }
        shift(&self.path, &rotation_path(&self.path, 1));

        self.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| "failed to reopen ledger after rotation")?;
        self.current_size = 0;

        Ok(())
    }
}

fn shift(from: &Path, to: &Path) {
    if let Err(e) = std::fs::rename(from, to) {
        tracing::warn!(
            "ledger rotation: could not move {} to {}: {e}",
            from.display(),
            to.display()
        );
    }
}

/// `~/.repscout/ledger.jsonl`.
pub fn default_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".repscout")
        .join("ledger.jsonl")
}

/// Build path for a rotated file: `ledger.jsonl.1`, `ledger.jsonl.2`, etc.
fn rotation_path(base: &Path, index: u32) -> PathBuf {
    let name = format!(
        "{}.{index}",
        base.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("ledger.jsonl")
    );
    base.with_file_name(name)
}

/// Write every `ItemCompleted` event to `ledger` until the run completes or
/// the sender goes away. Returns the number of lines written.
pub fn spawn(
    mut ledger: RunLedger,
    mut rx: ProgressReceiver,
) -> tokio::task::JoinHandle<Result<usize>> {
    tokio::task::spawn_blocking(move || {
        let mut written = 0;
        loop {
            let event = match rx.blocking_recv() {
                Ok(event) => event,
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!("ledger fell behind; {n} event(s) not recorded");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            match event.event {
                ProgressEventKind::ItemCompleted {
                    id,
                    identifier,
                    succeeded,
                    detail,
                    score,
                    egress,
                    elapsed_ms,
                } => {
                    ledger.append(&LedgerEntry {
                        timestamp: Utc::now().to_rfc3339(),
                        run_id: event.run_id,
                        id,
                        identifier,
                        outcome: if succeeded { "succeeded" } else { "failed" },
                        detail,
                        score,
                        egress,
                        elapsed_ms,
                    })?;
                    written += 1;
                }
                ProgressEventKind::RunCompleted { .. } => break,
                _ => {}
            }
        }
        ledger.file.flush()?;
        Ok(written)
    })
}
