//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the LinkGraph trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{LinkGraph, StorageError, StorageResult};
use crate::storage::{CrawlInfo, GraphStatistics, LinkNode, LinkUpdate, ParentMode};
use crate::url::{parse_link_url, parse_with_domain};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Params, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const NODE_COLUMNS: &str = "url, domain, content_hash, last_modified, last_checked";

type RawNode = (String, String, Option<String>, Option<String>, Option<String>);

/// SQLite link graph backend
///
/// A single connection guarded by a mutex; every mutating operation runs in its
/// own transaction so concurrent crawl loops never see a partial rewire.
pub struct SqliteLinkGraph {
    conn: Mutex<Connection>,
}

impl SqliteLinkGraph {
    /// Opens (or creates) the link graph database at `path`
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory graph (for tests and dry runs)
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }
}

impl LinkGraph for SqliteLinkGraph {
    // ===== Node Management =====

    fn upsert(&self, update: LinkUpdate) -> StorageResult<LinkNode> {
        let (url, domain) = parse_with_domain(&update.url)?;
        let url = url.to_string();
        let parent = update
            .parent
            .as_deref()
            .map(parse_with_domain)
            .transpose()?;

        let checked_at = format_timestamp(&update.checked_at.unwrap_or_else(Utc::now));
        let last_modified = update.last_modified.as_ref().map(format_timestamp);

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        if let Some((parent_url, _)) = &parent {
            if update.parent_mode == ParentMode::Required
                && node_id(&tx, parent_url.as_str())?.is_none()
            {
                return Err(StorageError::NotFound(parent_url.to_string()));
            }
        }

        tx.execute(
            "INSERT INTO links (url, domain, content_hash, last_modified, last_checked)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(url) DO UPDATE SET
                 domain = excluded.domain,
                 content_hash = COALESCE(excluded.content_hash, links.content_hash),
                 last_modified = COALESCE(excluded.last_modified, links.last_modified),
                 last_checked = CASE
                     WHEN links.last_checked IS NULL OR links.last_checked < excluded.last_checked
                     THEN excluded.last_checked
                     ELSE links.last_checked
                 END",
            params![url, domain, update.content_hash, last_modified, checked_at],
        )?;

        if let Some((parent_url, parent_domain)) = parent {
            if parent_url.as_str() != url {
                tx.execute(
                    "INSERT OR IGNORE INTO links (url, domain) VALUES (?1, ?2)",
                    params![parent_url.as_str(), parent_domain],
                )?;
                tx.execute(
                    "INSERT OR IGNORE INTO discovery_edges (parent_id, child_id)
                     SELECT p.id, c.id FROM links p, links c
                     WHERE p.url = ?1 AND c.url = ?2",
                    params![parent_url.as_str(), url],
                )?;
            }
        }

        let node = fetch_node(&tx, &url)?
            .ok_or_else(|| StorageError::Database(format!("node {} missing after upsert", url)))?;
        tx.commit()?;

        Ok(node)
    }

    fn remove(&self, url: &str) -> StorageResult<bool> {
        let key = canonical_key(url)?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let Some(id) = node_id(&tx, &key)? else {
            return Ok(false);
        };

        remove_node(&tx, id)?;
        tx.commit()?;

        Ok(true)
    }

    fn purge_domain(&self, domain: &str) -> StorageResult<usize> {
        let domain = domain.trim().to_lowercase();

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let ids = {
            let mut stmt = tx.prepare("SELECT id FROM links WHERE domain = ?1 ORDER BY id")?;
            let ids = stmt
                .query_map(params![domain], |row| row.get::<_, i64>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            ids
        };

        for id in &ids {
            remove_node(&tx, *id)?;
        }
        tx.commit()?;

        Ok(ids.len())
    }

    // ===== Graph Queries =====

    fn children(&self, url: &str) -> StorageResult<Vec<String>> {
        let key = canonical_key(url)?;
        let conn = self.lock()?;
        query_urls(
            &conn,
            "SELECT c.url FROM discovery_edges e
             JOIN links p ON p.id = e.parent_id
             JOIN links c ON c.id = e.child_id
             WHERE p.url = ?1
             ORDER BY c.url",
            params![key],
        )
    }

    fn parents(&self, url: &str) -> StorageResult<Vec<String>> {
        let key = canonical_key(url)?;
        let conn = self.lock()?;
        query_urls(
            &conn,
            "SELECT p.url FROM discovery_edges e
             JOIN links p ON p.id = e.parent_id
             JOIN links c ON c.id = e.child_id
             WHERE c.url = ?1
             ORDER BY p.url",
            params![key],
        )
    }

    fn by_domain(&self, domain: &str) -> StorageResult<Vec<String>> {
        let domain = domain.trim().to_lowercase();
        let conn = self.lock()?;
        query_urls(
            &conn,
            "SELECT url FROM links WHERE domain = ?1 ORDER BY id",
            params![domain],
        )
    }

    fn get(&self, url: &str) -> StorageResult<Option<LinkNode>> {
        let key = canonical_key(url)?;
        let conn = self.lock()?;
        fetch_node(&conn, &key)
    }

    fn sample(&self, n: usize) -> StorageResult<Vec<String>> {
        let limit = i64::try_from(n).unwrap_or(i64::MAX);
        let conn = self.lock()?;
        query_urls(
            &conn,
            "SELECT url FROM links ORDER BY id LIMIT ?1",
            params![limit],
        )
    }

    // ===== Freshness and Dedup =====

    fn last_crawl_info(&self, url: &str) -> StorageResult<Option<CrawlInfo>> {
        let key = canonical_key(url)?;
        let conn = self.lock()?;

        let raw = conn
            .query_row(
                "SELECT last_checked, last_modified FROM links WHERE url = ?1",
                params![key],
                |row| Ok((row.get::<_, Option<String>>(0)?, row.get::<_, Option<String>>(1)?)),
            )
            .optional()?;

        match raw {
            Some((last_checked, last_modified)) => Ok(Some(CrawlInfo {
                last_checked: parse_timestamp(last_checked)?,
                last_modified: parse_timestamp(last_modified)?,
            })),
            None => Ok(None),
        }
    }

    fn content_exists(&self, hash: &str) -> StorageResult<bool> {
        let conn = self.lock()?;
        let exists = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM links WHERE content_hash = ?1)",
            params![hash],
            |row| row.get::<_, bool>(0),
        )?;
        Ok(exists)
    }

    fn stale_before(&self, threshold: DateTime<Utc>) -> StorageResult<Vec<String>> {
        let threshold = format_timestamp(&threshold);
        let conn = self.lock()?;
        query_urls(
            &conn,
            "SELECT url FROM links
             WHERE last_checked IS NULL OR last_checked < ?1
             ORDER BY id",
            params![threshold],
        )
    }

    // ===== Statistics =====

    fn statistics(&self) -> StorageResult<GraphStatistics> {
        let conn = self.lock()?;
        let stats = conn.query_row(
            "SELECT
                (SELECT COUNT(*) FROM links),
                (SELECT COUNT(*) FROM discovery_edges),
                (SELECT COUNT(DISTINCT domain) FROM links),
                (SELECT COUNT(*) FROM links WHERE content_hash IS NOT NULL)",
            [],
            |row| {
                Ok(GraphStatistics {
                    nodes: row.get::<_, i64>(0)? as u64,
                    edges: row.get::<_, i64>(1)? as u64,
                    domains: row.get::<_, i64>(2)? as u64,
                    hashed_nodes: row.get::<_, i64>(3)? as u64,
                })
            },
        )?;
        Ok(stats)
    }
}

/// Wires every parent of `id` to every child of `id`, then deletes the node
fn remove_node(conn: &Connection, id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO discovery_edges (parent_id, child_id)
         SELECT p.parent_id, c.child_id
         FROM discovery_edges p
         JOIN discovery_edges c ON c.parent_id = ?1
         WHERE p.child_id = ?1 AND p.parent_id != c.child_id",
        params![id],
    )?;
    conn.execute(
        "DELETE FROM discovery_edges WHERE parent_id = ?1 OR child_id = ?1",
        params![id],
    )?;
    conn.execute("DELETE FROM links WHERE id = ?1", params![id])?;
    Ok(())
}

fn node_id(conn: &Connection, url: &str) -> rusqlite::Result<Option<i64>> {
    conn.query_row("SELECT id FROM links WHERE url = ?1", params![url], |row| {
        row.get(0)
    })
    .optional()
}

fn fetch_node(conn: &Connection, url: &str) -> StorageResult<Option<LinkNode>> {
    let raw = conn
        .query_row(
            &format!("SELECT {} FROM links WHERE url = ?1", NODE_COLUMNS),
            params![url],
            raw_node,
        )
        .optional()?;
    raw.map(into_node).transpose()
}

fn query_urls<P: Params>(conn: &Connection, sql: &str, params: P) -> StorageResult<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let urls = stmt
        .query_map(params, |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(urls)
}

fn raw_node(row: &Row<'_>) -> rusqlite::Result<RawNode> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn into_node(raw: RawNode) -> StorageResult<LinkNode> {
    let (url, domain, content_hash, last_modified, last_checked) = raw;
    Ok(LinkNode {
        url,
        domain,
        content_hash,
        last_modified: parse_timestamp(last_modified)?,
        last_checked: parse_timestamp(last_checked)?,
    })
}

/// Graph keys are the serialized form of the parsed URL
fn canonical_key(url: &str) -> StorageResult<String> {
    Ok(parse_link_url(url)?.to_string())
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: Option<String>) -> StorageResult<Option<DateTime<Utc>>> {
    value
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|ts| ts.with_timezone(&Utc))
                .map_err(|e| StorageError::Timestamp(format!("{}: {}", s, e)))
        })
        .transpose()
}
