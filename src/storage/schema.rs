//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the LinkLoom link graph.

/// SQL schema for the database
///
/// Timestamps are fixed-width RFC 3339 UTC strings, so comparing them as text
/// compares them as instants.
pub const SCHEMA_SQL: &str = r#"
-- One node per distinct URL
CREATE TABLE IF NOT EXISTS links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    domain TEXT NOT NULL,
    content_hash TEXT,
    last_modified TEXT,
    last_checked TEXT
);

CREATE INDEX IF NOT EXISTS idx_links_domain ON links(domain);
CREATE INDEX IF NOT EXISTS idx_links_content_hash ON links(content_hash);
CREATE INDEX IF NOT EXISTS idx_links_last_checked ON links(last_checked);

-- Directed "child was discovered while crawling parent" edges
CREATE TABLE IF NOT EXISTS discovery_edges (
    parent_id INTEGER NOT NULL REFERENCES links(id) ON DELETE CASCADE,
    child_id INTEGER NOT NULL REFERENCES links(id) ON DELETE CASCADE,
    PRIMARY KEY (parent_id, child_id),
    CHECK (parent_id != child_id)
);

CREATE INDEX IF NOT EXISTS idx_discovery_edges_child ON discovery_edges(child_id);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
