use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Main configuration structure for LinkLoom
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    /// Extra request headers sent with every page and robots.txt fetch
    #[serde(default = "default_headers")]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub politeness: PolitenessConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Default page budget for a crawl invocation
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: usize,

    /// Minimum time between the start of any two fetches (milliseconds)
    #[serde(rename = "fetch-interval-ms", default = "default_fetch_interval_ms")]
    pub fetch_interval_ms: u64,

    /// Per-fetch timeout (seconds)
    #[serde(rename = "fetch-timeout-secs", default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Total attempts per fetch cycle, including the first one
    #[serde(rename = "retry-attempts", default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Delay before the second attempt (milliseconds)
    #[serde(rename = "backoff-initial-ms", default = "default_backoff_initial_ms")]
    pub backoff_initial_ms: u64,

    /// Upper bound on any single backoff delay (milliseconds)
    #[serde(rename = "backoff-max-ms", default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Minimum age before a crawled page is eligible for re-crawl (days)
    #[serde(rename = "staleness-days", default = "default_staleness_days")]
    pub staleness_days: u32,

    /// Name of the content parser to run on novel pages
    #[serde(default = "default_parser")]
    pub parser: String,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// robots.txt caching and denial ledger locations
#[derive(Debug, Clone, Deserialize)]
pub struct PolitenessConfig {
    #[serde(rename = "robots-cache-dir", default = "default_robots_cache_dir")]
    pub robots_cache_dir: String,

    #[serde(rename = "robots-ttl-days", default = "default_robots_ttl_days")]
    pub robots_ttl_days: u32,

    #[serde(rename = "denial-ledger-path", default = "default_denial_ledger_path")]
    pub denial_ledger_path: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite link graph database
    #[serde(rename = "database-path", default = "default_database_path")]
    pub database_path: String,
}

impl UserAgentConfig {
    /// Formats the identifying agent string sent as `User-Agent`
    pub fn agent_string(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

impl CrawlerConfig {
    pub fn fetch_interval(&self) -> Duration {
        Duration::from_millis(self.fetch_interval_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn staleness_window(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.staleness_days))
    }
}

impl PolitenessConfig {
    pub fn robots_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.robots_ttl_days))
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            fetch_interval_ms: default_fetch_interval_ms(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            retry_attempts: default_retry_attempts(),
            backoff_initial_ms: default_backoff_initial_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            staleness_days: default_staleness_days(),
            parser: default_parser(),
        }
    }
}

impl Default for PolitenessConfig {
    fn default() -> Self {
        Self {
            robots_cache_dir: default_robots_cache_dir(),
            robots_ttl_days: default_robots_ttl_days(),
            denial_ledger_path: default_denial_ledger_path(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_max_pages() -> usize {
    100
}

fn default_fetch_interval_ms() -> u64 {
    5000
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_backoff_initial_ms() -> u64 {
    4000
}

fn default_backoff_max_ms() -> u64 {
    10_000
}

fn default_staleness_days() -> u32 {
    7
}

fn default_parser() -> String {
    "default".to_string()
}

fn default_robots_cache_dir() -> String {
    "robot_cache".to_string()
}

fn default_robots_ttl_days() -> u32 {
    7
}

fn default_denial_ledger_path() -> String {
    "unallowed_links.json".to_string()
}

fn default_database_path() -> String {
    "linkloom.db".to_string()
}

fn default_headers() -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    headers.insert(
        "Accept".to_string(),
        "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
    );
    headers.insert("Accept-Language".to_string(), "en-US,en;q=0.5".to_string());
    headers
}
