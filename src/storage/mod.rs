//! Storage module for the link graph
//!
//! This module persists every discovered URL as a node and every "found while
//! crawling" relationship as a directed discovery edge:
//! - SQLite database initialization and schema management
//! - Node upserts with monotonic `last_checked` timestamps
//! - Removal with reparenting (every former parent is wired to every former child)
//! - Domain, staleness and content-hash queries

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteLinkGraph;
pub use traits::{LinkGraph, StorageError, StorageResult};

use chrono::{DateTime, Utc};

/// A URL node in the link graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkNode {
    pub url: String,
    pub domain: String,
    pub content_hash: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    /// `None` only for parent stubs that have never been upserted themselves
    pub last_checked: Option<DateTime<Utc>>,
}

/// Timestamps the change detector needs for a single URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlInfo {
    pub last_checked: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Aggregate counts over the whole graph
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphStatistics {
    pub nodes: u64,
    pub edges: u64,
    pub domains: u64,
    pub hashed_nodes: u64,
}

/// How `upsert` treats a parent URL that is not yet in the graph
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParentMode {
    /// Insert the parent as a url-only stub
    #[default]
    Stub,
    /// Fail with `StorageError::NotFound`
    Required,
}

/// A create-or-update request for one node
///
/// ```
/// use linkloom::storage::LinkUpdate;
///
/// let update = LinkUpdate::new("https://a.com/x").with_parent("https://a.com/");
/// assert_eq!(update.parent.as_deref(), Some("https://a.com/"));
/// ```
#[derive(Debug, Clone)]
pub struct LinkUpdate {
    pub url: String,
    pub parent: Option<String>,
    pub parent_mode: ParentMode,
    pub content_hash: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub checked_at: Option<DateTime<Utc>>,
}

impl LinkUpdate {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            parent: None,
            parent_mode: ParentMode::Stub,
            content_hash: None,
            last_modified: None,
            checked_at: None,
        }
    }

    /// Records a discovery edge `parent -> url`
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Fails the upsert instead of creating a stub when the parent is absent
    pub fn require_parent(mut self) -> Self {
        self.parent_mode = ParentMode::Required;
        self
    }

    pub fn with_content(mut self, hash: impl Into<String>, last_modified: DateTime<Utc>) -> Self {
        self.content_hash = Some(hash.into());
        self.last_modified = Some(last_modified);
        self
    }

    /// Overrides the check timestamp (defaults to now)
    pub fn checked_at(mut self, at: DateTime<Utc>) -> Self {
        self.checked_at = Some(at);
        self
    }
}
