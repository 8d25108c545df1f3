//! Change detection
//!
//! Decides whether a URL needs fetching again and whether fetched content has
//! already been seen under another URL.

use crate::storage::{LinkGraph, StorageResult};
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Hex-encoded SHA-256 of a rendered document
///
/// Identical digests are treated as identical content.
///
/// ```
/// use linkloom::change::content_hash;
///
/// assert_eq!(content_hash("abc"), content_hash("abc"));
/// assert_eq!(content_hash("abc").len(), 64);
/// ```
pub fn content_hash(document: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Clone)]
pub struct ChangeDetector {
    store: Arc<dyn LinkGraph>,
    staleness_window: Duration,
}

impl ChangeDetector {
    pub fn new(store: Arc<dyn LinkGraph>, staleness_window: Duration) -> Self {
        Self {
            store,
            staleness_window,
        }
    }

    /// Whether `url` should be fetched now
    pub fn should_crawl(&self, url: &str) -> StorageResult<bool> {
        self.should_crawl_at(url, Utc::now())
    }

    /// Crawl if the URL is unknown, has never had content recorded, or was last
    /// checked more than the staleness window before `now`
    pub fn should_crawl_at(&self, url: &str, now: DateTime<Utc>) -> StorageResult<bool> {
        let Some(info) = self.store.last_crawl_info(url)? else {
            return Ok(true);
        };

        if info.last_modified.is_none() {
            return Ok(true);
        }

        Ok(match info.last_checked {
            Some(last_checked) => now - last_checked > self.staleness_window,
            None => true,
        })
    }

    /// True if no node holds this content hash yet
    pub fn is_novel_content(&self, hash: &str) -> StorageResult<bool> {
        Ok(!self.store.content_exists(hash)?)
    }
}
