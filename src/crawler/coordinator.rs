//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that drives one breadth-first crawl:
//! - Managing the FIFO frontier and the visited set
//! - Consulting the politeness gate and the change detector
//! - Fetching through the shared throttle with retry
//! - Recording discovered links in the link graph

use crate::change::{content_hash, ChangeDetector};
use crate::config::Config;
use crate::crawler::fetcher::{FetchRequest, Fetcher, HeaderSet, HttpFetcher};
use crate::crawler::links::discover_links;
use crate::crawler::parser::ParserRegistry;
use crate::crawler::retry::{fetch_with_retry, RetryPolicy};
use crate::crawler::throttle::FetchThrottle;
use crate::robots::{GateSettings, PolitenessGate};
use crate::storage::{LinkGraph, LinkUpdate, SqliteLinkGraph};
use crate::url::parse_link_url;
use chrono::Utc;
use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Per-crawl knobs taken from the configuration
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub headers: HeaderSet,
    pub fetch_timeout: Duration,
    pub retry: RetryPolicy,
    pub staleness_window: chrono::Duration,
    /// Name of the content parser run on novel pages
    pub parser: String,
}

impl CrawlSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            headers: config.headers.clone(),
            fetch_timeout: config.crawler.fetch_timeout(),
            retry: RetryPolicy::from_config(&config.crawler),
            staleness_window: config.crawler.staleness_window(),
            parser: config.crawler.parser.clone(),
        }
    }
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            headers: HeaderSet::new(),
            fetch_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            staleness_window: chrono::Duration::days(7),
            parser: "default".to_string(),
        }
    }
}

/// Collaborators shared by every crawl loop in the process
///
/// Cloning is cheap; clones share the same store, gate, fetcher and throttle.
#[derive(Clone)]
pub struct CrawlContext {
    pub store: Arc<dyn LinkGraph>,
    pub gate: Arc<PolitenessGate>,
    pub fetcher: Arc<dyn Fetcher>,
    pub throttle: Arc<FetchThrottle>,
    pub parsers: Arc<ParserRegistry>,
    pub settings: CrawlSettings,
}

impl CrawlContext {
    /// Wires the HTTP fetcher, the SQLite graph and the politeness gate from a config
    pub async fn from_config(config: &Config) -> crate::Result<Self> {
        let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(&config.user_agent)?);
        let store: Arc<dyn LinkGraph> = Arc::new(SqliteLinkGraph::new(Path::new(
            &config.output.database_path,
        ))?);
        let gate = Arc::new(
            PolitenessGate::new(Arc::clone(&fetcher), GateSettings::from_config(config)).await,
        );

        Ok(Self {
            store,
            gate,
            fetcher,
            throttle: Arc::new(FetchThrottle::new(config.crawler.fetch_interval())),
            parsers: Arc::new(ParserRegistry::new()),
            settings: CrawlSettings::from_config(config),
        })
    }
}

/// What happened to one dequeued URL
#[derive(Debug)]
enum PageOutcome {
    /// Novel content; carries the internal links to enqueue
    Crawled(Vec<String>),
    /// Content already held by another node
    Duplicate,
    /// Denied by robots.txt or still fresh
    Skipped,
    /// Fetch failed after retries
    Failed,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    context: CrawlContext,
    detector: ChangeDetector,
    /// Registered name of the content parser, resolved once
    parser: &'static str,
    cancel: CancellationToken,
}

impl Coordinator {
    pub fn new(context: CrawlContext) -> Self {
        let detector = ChangeDetector::new(
            Arc::clone(&context.store),
            context.settings.staleness_window,
        );

        let parser = context.parsers.resolve(&context.settings.parser).name();

        Self {
            context,
            detector,
            parser,
            cancel: CancellationToken::new(),
        }
    }

    /// Stops the crawl at the next iteration boundary once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Crawls breadth-first from `start_url` until the frontier is empty or
    /// `max_pages` URLs have been visited
    ///
    /// # Returns
    ///
    /// * `Ok(visited)` - URLs that were fetched or whose content was found to be a duplicate
    /// * `Err(LoomError)` - The start URL is invalid or the link graph failed
    pub async fn crawl(
        &self,
        start_url: &str,
        max_pages: usize,
    ) -> crate::Result<HashSet<String>> {
        let start = parse_link_url(start_url)?.to_string();
        tracing::info!("Starting crawl at {} (max {} pages)", start, max_pages);

        let started = Instant::now();
        let mut frontier = VecDeque::from([start.clone()]);
        let mut in_frontier = HashSet::from([start]);
        let mut visited = HashSet::new();

        while visited.len() < max_pages {
            if self.cancel.is_cancelled() {
                tracing::info!("Crawl cancelled with {} URLs in frontier", frontier.len());
                break;
            }

            let Some(url) = frontier.pop_front() else {
                break;
            };
            in_frontier.remove(&url);

            if visited.contains(&url) {
                continue;
            }

            match self.process_url(&url).await? {
                PageOutcome::Crawled(links) => {
                    visited.insert(url);
                    for link in links {
                        if !visited.contains(&link) && in_frontier.insert(link.clone()) {
                            frontier.push_back(link);
                        }
                    }

                    if visited.len() % 10 == 0 {
                        tracing::info!(
                            "Progress: {} pages visited, {} in frontier, {:.1}s elapsed",
                            visited.len(),
                            frontier.len(),
                            started.elapsed().as_secs_f64()
                        );
                    }
                }
                PageOutcome::Duplicate => {
                    visited.insert(url);
                }
                PageOutcome::Skipped | PageOutcome::Failed => {}
            }
        }

        tracing::info!(
            "Crawl completed: {} pages visited in {:?}",
            visited.len(),
            started.elapsed()
        );

        Ok(visited)
    }

    /// Runs one URL through gate, freshness check, fetch, dedup and link recording
    async fn process_url(&self, url: &str) -> crate::Result<PageOutcome> {
        let context = &self.context;

        if !context.gate.is_allowed(url).await? {
            tracing::debug!("Skipping {}: disallowed by robots.txt", url);
            return Ok(PageOutcome::Skipped);
        }

        if !self.detector.should_crawl(url)? {
            tracing::debug!("Skipping {}: checked within the staleness window", url);
            return Ok(PageOutcome::Skipped);
        }

        tracing::info!("Crawling: {}", url);

        let request = FetchRequest::new(
            url,
            context.settings.headers.clone(),
            context.settings.fetch_timeout,
        );
        let document = match fetch_with_retry(
            context.fetcher.as_ref(),
            &context.throttle,
            &request,
            &context.settings.retry,
        )
        .await
        {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!("Abandoning {}: {}", url, e);
                return Ok(PageOutcome::Failed);
            }
        };

        let hash = content_hash(&document.body);
        if !self.detector.is_novel_content(&hash)? {
            tracing::info!("Content of {} already seen under another URL", url);
            context.store.upsert(LinkUpdate::new(url))?;
            return Ok(PageOutcome::Duplicate);
        }

        context
            .store
            .upsert(LinkUpdate::new(url).with_content(hash, Utc::now()))?;

        // Links resolve against the requested URL, not `document.final_url`,
        // so discovery edges always hang off the node that was dequeued.
        let page_url = parse_link_url(url)?;
        let links = discover_links(&document.body, &page_url);

        let content = context.parsers.resolve(self.parser).parse(&document.body);
        tracing::debug!("Parsed {} ({}): {} links", url, content.title, links.len());

        let mut to_enqueue = Vec::with_capacity(links.internal.len());
        for link in links.internal {
            if context.gate.is_allowed(&link).await? {
                context
                    .store
                    .upsert(LinkUpdate::new(link.as_str()).with_parent(url))?;
                to_enqueue.push(link);
            }
        }

        for link in links.external.iter().chain(links.resources.iter()) {
            context
                .store
                .upsert(LinkUpdate::new(link.as_str()).with_parent(url))?;
        }

        Ok(PageOutcome::Crawled(to_enqueue))
    }
}
