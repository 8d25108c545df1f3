//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - The fetch capability and its HTTP implementation
//! - Retry with exponential backoff and the crawl-wide fetch throttle
//! - Link discovery and content parsers
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
mod links;
mod parser;
mod retry;
mod throttle;

pub use coordinator::{Coordinator, CrawlContext, CrawlSettings};
pub use fetcher::{
    build_http_client, FetchError, FetchRequest, FetchedDocument, Fetcher, HeaderSet, HttpFetcher,
};
pub use links::{discover_links, DiscoveredLinks};
pub use parser::{CleanTextParser, ContentParser, DefaultParser, ParserRegistry, StructuredContent};
pub use retry::{fetch_with_retry, RetryPolicy};
pub use throttle::FetchThrottle;
