//! Denial ledger
//!
//! A durable set of URLs that robots.txt rules have disallowed, persisted as a
//! JSON array. Every new denial rewrites the whole file through a temporary file
//! and a rename, so a crash can lose at most the latest entry.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Default)]
struct LedgerState {
    /// Insertion order, as written to disk
    order: Vec<String>,
    seen: HashSet<String>,
}

#[derive(Debug)]
pub struct DenialLedger {
    path: PathBuf,
    state: Mutex<LedgerState>,
}

impl DenialLedger {
    /// Loads the ledger at `path`
    ///
    /// A missing, empty or malformed file yields an empty ledger with a warning;
    /// loading never fails.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = read_entries(&path).await;

        let mut state = LedgerState::default();
        for url in entries {
            if state.seen.insert(url.clone()) {
                state.order.push(url);
            }
        }

        tracing::debug!(
            "Loaded {} denied URLs from {}",
            state.order.len(),
            path.display()
        );

        Self {
            path,
            state: Mutex::new(state),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Adds a URL and persists the ledger
    ///
    /// Returns `Ok(false)` without touching the file if the URL is already
    /// recorded. On a write error the entry stays in memory and is included in
    /// the next successful write.
    pub async fn record(&self, url: &str) -> Result<bool, LedgerError> {
        let mut state = self.state.lock().await;
        if !state.seen.insert(url.to_string()) {
            return Ok(false);
        }
        state.order.push(url.to_string());

        // The lock is held across the write so rewrites never interleave
        self.persist(&state.order).await?;
        Ok(true)
    }

    pub async fn contains(&self, url: &str) -> bool {
        self.state.lock().await.seen.contains(url)
    }

    pub async fn entries(&self) -> Vec<String> {
        self.state.lock().await.order.clone()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn persist(&self, entries: &[String]) -> Result<(), LedgerError> {
        let json = serde_json::to_vec_pretty(entries)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

async fn read_entries(path: &Path) -> Vec<String> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(
                "{} does not exist, starting with an empty denial ledger",
                path.display()
            );
            return Vec::new();
        }
        Err(e) => {
            tracing::warn!(
                "Failed to read {}: {}, starting with an empty denial ledger",
                path.display(),
                e
            );
            return Vec::new();
        }
    };

    if content.trim().is_empty() {
        tracing::warn!(
            "{} is empty, starting with an empty denial ledger",
            path.display()
        );
        return Vec::new();
    }

    match serde_json::from_str::<Vec<String>>(&content) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(
                "Malformed denial ledger {}: {}, starting with an empty denial ledger",
                path.display(),
                e
            );
            Vec::new()
        }
    }
}
