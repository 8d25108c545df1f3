//! LinkLoom: a polite, resumable link-graph crawler
//!
//! This crate crawls websites breadth-first while respecting robots.txt, records every
//! discovered URL and discovery edge in a persistent link graph, and skips pages whose
//! content has not changed or has already been seen under another URL.

pub mod change;
pub mod config;
pub mod crawler;
pub mod robots;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for LinkLoom operations
#[derive(Debug, Error)]
pub enum LoomError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Denial ledger error: {0}")]
    Ledger(#[from] robots::LedgerError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UrlError {
    #[error("Failed to parse URL '{url}': {reason}")]
    Parse { url: String, reason: String },

    #[error("Invalid URL scheme '{scheme}' in {url}")]
    InvalidScheme { url: String, scheme: String },

    #[error("Missing domain in URL {0}")]
    MissingDomain(String),
}

/// Result type alias for LinkLoom operations
pub type Result<T> = std::result::Result<T, LoomError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use change::{content_hash, ChangeDetector};
pub use config::Config;
pub use crawler::{Coordinator, CrawlContext};
pub use robots::PolitenessGate;
pub use storage::{LinkGraph, LinkNode, LinkUpdate, SqliteLinkGraph};
pub use url::{extract_domain, parse_link_url};
