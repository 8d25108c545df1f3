//! Storage traits and error types
//!
//! This module defines the trait interface for link graph backends and
//! associated error types.

use crate::storage::{CrawlInfo, GraphStatistics, LinkNode, LinkUpdate};
use crate::UrlError;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Parent not found: {0}")]
    NotFound(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] UrlError),

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("Invalid timestamp in database: {0}")]
    Timestamp(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for link graph backends
///
/// Implementations must be safe to share between concurrently running crawl loops.
/// Every mutating call is atomic: readers never observe a half-applied upsert or a
/// partially rewired removal.
pub trait LinkGraph: Send + Sync {
    // ===== Node Management =====

    /// Creates or updates the node for `update.url`
    ///
    /// Always refreshes `last_checked` (it never moves backwards). Content fields
    /// missing from the update keep their stored values. When a parent is given the
    /// discovery edge `parent -> url` is ensured; an absent parent is inserted as a
    /// stub unless the update requires it to exist, in which case
    /// `StorageError::NotFound` is returned and nothing is written.
    fn upsert(&self, update: LinkUpdate) -> StorageResult<LinkNode>;

    /// Removes a node, wiring each of its parents to each of its children
    ///
    /// Returns `false` if the URL was not in the graph.
    fn remove(&self, url: &str) -> StorageResult<bool>;

    /// Removes every node of a domain through the single-node removal path
    ///
    /// # Returns
    ///
    /// The number of nodes removed
    fn purge_domain(&self, domain: &str) -> StorageResult<usize>;

    // ===== Graph Queries =====

    /// URLs discovered on `url`
    fn children(&self, url: &str) -> StorageResult<Vec<String>>;

    /// URLs on which `url` was discovered
    fn parents(&self, url: &str) -> StorageResult<Vec<String>>;

    /// All URLs whose domain equals `domain`
    fn by_domain(&self, domain: &str) -> StorageResult<Vec<String>>;

    /// Fetches a full node
    fn get(&self, url: &str) -> StorageResult<Option<LinkNode>>;

    /// Up to `n` URLs in insertion order
    fn sample(&self, n: usize) -> StorageResult<Vec<String>>;

    // ===== Freshness and Dedup =====

    fn last_crawl_info(&self, url: &str) -> StorageResult<Option<CrawlInfo>>;

    /// True if any node currently holds this content hash
    fn content_exists(&self, hash: &str) -> StorageResult<bool>;

    /// URLs checked before `threshold`, or never checked
    fn stale_before(&self, threshold: DateTime<Utc>) -> StorageResult<Vec<String>>;

    // ===== Statistics =====

    fn statistics(&self) -> StorageResult<GraphStatistics>;
}
