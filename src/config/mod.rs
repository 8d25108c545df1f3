//! Configuration module for LinkLoom
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every section except `[user-agent]` is optional and falls back to defaults.
//!
//! # Example
//!
//! ```no_run
//! use linkloom::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Crawler will visit at most {} pages", config.crawler.max_pages);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CrawlerConfig, OutputConfig, PolitenessConfig, UserAgentConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
