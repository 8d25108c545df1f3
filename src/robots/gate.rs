//! Politeness gate
//!
//! Decides whether a URL may be crawled. Owns the per-domain robots.txt cache
//! (memory and disk) and the denial ledger. Policies are refreshed lazily at the
//! moment of use; there is no background refresh.

use crate::crawler::{FetchRequest, Fetcher, HeaderSet};
use crate::robots::{CachedRobots, DenialLedger, ParsedRobots, RobotsDiskCache};
use crate::url::parse_with_domain;
use crate::LoomError;
use chrono::Duration;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Everything the gate needs besides the fetch capability
#[derive(Debug, Clone)]
pub struct GateSettings {
    /// Product token matched against `User-agent` groups (e.g. `LinkLoom`)
    pub robots_agent: String,
    /// Headers sent with robots.txt requests
    pub headers: HeaderSet,
    pub fetch_timeout: std::time::Duration,
    pub robots_ttl: Duration,
    pub cache_dir: PathBuf,
    pub ledger_path: PathBuf,
}

impl GateSettings {
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            robots_agent: config.user_agent.crawler_name.clone(),
            headers: config.headers.clone(),
            fetch_timeout: config.crawler.fetch_timeout(),
            robots_ttl: config.politeness.robots_ttl(),
            cache_dir: PathBuf::from(&config.politeness.robots_cache_dir),
            ledger_path: PathBuf::from(&config.politeness.denial_ledger_path),
        }
    }
}

pub struct PolitenessGate {
    fetcher: Arc<dyn Fetcher>,
    settings: GateSettings,
    disk: RobotsDiskCache,
    policies: RwLock<HashMap<String, CachedRobots>>,
    /// One lock per domain so concurrent crawl loops refresh a policy once
    refresh_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    ledger: DenialLedger,
}

impl PolitenessGate {
    /// Creates a gate, loading the denial ledger from disk (or starting empty)
    pub async fn new(fetcher: Arc<dyn Fetcher>, settings: GateSettings) -> Self {
        let ledger = DenialLedger::load(settings.ledger_path.clone()).await;
        let disk = RobotsDiskCache::new(settings.cache_dir.clone());

        Self {
            fetcher,
            settings,
            disk,
            policies: RwLock::new(HashMap::new()),
            refresh_locks: Mutex::new(HashMap::new()),
            ledger,
        }
    }

    pub fn ledger(&self) -> &DenialLedger {
        &self.ledger
    }

    pub fn disk_cache(&self) -> &RobotsDiskCache {
        &self.disk
    }

    /// Checks `url` against its domain's robots.txt
    ///
    /// A denied URL is added to the denial ledger (once). Fails only if `url` is
    /// not a valid http(s) URL.
    pub async fn is_allowed(&self, url: &str) -> Result<bool, LoomError> {
        let (url, domain) = parse_with_domain(url)?;
        let policy = self.policy_for(&domain).await;

        let allowed = policy.is_allowed(url.as_str(), &self.settings.robots_agent);
        if !allowed {
            match self.ledger.record(url.as_str()).await {
                Ok(true) => tracing::info!("robots.txt disallows {}", url),
                Ok(false) => tracing::debug!("{} already in denial ledger", url),
                Err(e) => tracing::warn!(
                    "Failed to persist denial of {} to {}: {}",
                    url,
                    self.ledger.path().display(),
                    e
                ),
            }
        }

        Ok(allowed)
    }

    /// Returns a fresh policy for `domain`, loading it if absent or stale
    async fn policy_for(&self, domain: &str) -> CachedRobots {
        if let Some(policy) = self.fresh_policy(domain).await {
            return policy;
        }

        let lock = {
            let mut locks = self.refresh_locks.lock().await;
            Arc::clone(locks.entry(domain.to_string()).or_default())
        };
        let _guard = lock.lock().await;

        // Another loop may have refreshed it while we waited
        if let Some(policy) = self.fresh_policy(domain).await {
            return policy;
        }

        self.load_policy(domain).await
    }

    async fn fresh_policy(&self, domain: &str) -> Option<CachedRobots> {
        let policies = self.policies.read().await;
        policies
            .get(domain)
            .filter(|policy| !policy.is_stale(self.settings.robots_ttl))
            .cloned()
    }

    /// Loads a domain's policy and replaces the cached one
    ///
    /// A fresh disk cache file is used as is. Otherwise `https://{domain}/robots.txt`
    /// is fetched once; any failure caches (and writes) an empty, allow-all policy.
    pub async fn load_policy(&self, domain: &str) -> CachedRobots {
        let policy = match self.disk.load(domain).await {
            Some((body, fetched_at)) => {
                let cached = CachedRobots::with_fetch_time(ParsedRobots::from_content(&body), fetched_at);
                if cached.is_stale(self.settings.robots_ttl) {
                    self.fetch_policy(domain).await
                } else {
                    tracing::debug!("Using cached robots.txt for {}", domain);
                    cached
                }
            }
            None => self.fetch_policy(domain).await,
        };

        self.policies
            .write()
            .await
            .insert(domain.to_string(), policy.clone());
        policy
    }

    async fn fetch_policy(&self, domain: &str) -> CachedRobots {
        let robots_url = format!("https://{}/robots.txt", domain);
        let request = FetchRequest::new(
            robots_url.as_str(),
            self.settings.headers.clone(),
            self.settings.fetch_timeout,
        );

        let body = match self.fetcher.fetch(&request).await {
            Ok(document) => {
                tracing::debug!("Fetched {}", robots_url);
                document.body
            }
            Err(e) => {
                tracing::error!("Error fetching robots.txt for {}: {}", domain, e);
                String::new()
            }
        };

        if let Err(e) = self.disk.store(domain, &body).await {
            tracing::warn!("Failed to write robots cache for {}: {}", domain, e);
        }

        CachedRobots::new(ParsedRobots::from_content(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::{FetchError, FetchedDocument};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Serves robots.txt bodies per domain; unknown domains fail with a network error
    struct RobotsFetcher {
        bodies: HashMap<String, String>,
        calls: AtomicUsize,
    }

    impl RobotsFetcher {
        fn new(bodies: &[(&str, &str)]) -> Self {
            Self {
                bodies: bodies
                    .iter()
                    .map(|(domain, body)| (domain.to_string(), body.to_string()))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for RobotsFetcher {
        async fn fetch(&self, request: &FetchRequest) -> Result<FetchedDocument, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;

            let domain = request
                .url
                .trim_start_matches("https://")
                .trim_end_matches("/robots.txt");
            match self.bodies.get(domain) {
                Some(body) => Ok(FetchedDocument {
                    final_url: request.url.clone(),
                    status: 200,
                    body: body.clone(),
                }),
                None => Err(FetchError::Network {
                    url: request.url.clone(),
                    reason: "connection refused".into(),
                }),
            }
        }
    }

    fn settings(dir: &TempDir) -> GateSettings {
        GateSettings {
            robots_agent: "TestBot".to_string(),
            headers: HeaderSet::new(),
            fetch_timeout: std::time::Duration::from_secs(10),
            robots_ttl: Duration::days(7),
            cache_dir: dir.path().join("robot_cache"),
            ledger_path: dir.path().join("unallowed_links.json"),
        }
    }

    async fn gate(dir: &TempDir, fetcher: Arc<RobotsFetcher>) -> PolitenessGate {
        PolitenessGate::new(fetcher, settings(dir)).await
    }

    #[tokio::test]
    async fn test_allowed_and_denied() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(RobotsFetcher::new(&[(
            "a.com",
            "User-agent: *\nDisallow: /private",
        )]));
        let gate = gate(&dir, fetcher).await;

        assert!(gate.is_allowed("https://a.com/public").await.unwrap());
        assert!(!gate.is_allowed("https://a.com/private/x").await.unwrap());
        assert_eq!(gate.ledger().entries().await, vec!["https://a.com/private/x"]);
    }

    #[tokio::test]
    async fn test_robots_failure_fails_open_and_caches_empty_file() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(RobotsFetcher::new(&[]));
        let gate = gate(&dir, Arc::clone(&fetcher)).await;

        assert!(gate.is_allowed("http://badhost.test/page").await.unwrap());

        let cache_file = dir.path().join("robot_cache").join("badhost.test_robots.txt");
        assert!(cache_file.exists());
        assert_eq!(std::fs::read_to_string(cache_file).unwrap(), "");

        // The empty policy is reused within the TTL
        assert!(gate.is_allowed("http://badhost.test/other").await.unwrap());
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_denial_recorded_once() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(RobotsFetcher::new(&[("a.com", "User-agent: *\nDisallow: /")]));
        let gate = gate(&dir, fetcher).await;

        assert!(!gate.is_allowed("https://a.com/x").await.unwrap());
        assert!(!gate.is_allowed("https://a.com/x").await.unwrap());

        assert_eq!(gate.ledger().len().await, 1);
        let on_disk: Vec<String> = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("unallowed_links.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(on_disk, vec!["https://a.com/x"]);
    }

    #[tokio::test]
    async fn test_policy_matches_agent_token() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(RobotsFetcher::new(&[(
            "a.com",
            "User-agent: TestBot\nDisallow: /\n\nUser-agent: *\nAllow: /",
        )]));
        let gate = gate(&dir, fetcher).await;

        assert!(!gate.is_allowed("https://a.com/anything").await.unwrap());
    }

    #[tokio::test]
    async fn test_fresh_disk_cache_skips_network() {
        let dir = TempDir::new().unwrap();
        let cache = RobotsDiskCache::new(dir.path().join("robot_cache"));
        cache.store("a.com", "User-agent: *\nDisallow: /").await.unwrap();

        let fetcher = Arc::new(RobotsFetcher::new(&[]));
        let gate = gate(&dir, Arc::clone(&fetcher)).await;

        assert!(!gate.is_allowed("https://a.com/x").await.unwrap());
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_stale_disk_cache_is_refetched() {
        let dir = TempDir::new().unwrap();
        let cache = RobotsDiskCache::new(dir.path().join("robot_cache"));
        cache.store("a.com", "User-agent: *\nDisallow: /").await.unwrap();
        let eight_days_ago =
            std::time::SystemTime::now() - std::time::Duration::from_secs(8 * 24 * 3600);
        std::fs::File::options()
            .write(true)
            .open(cache.path_for("a.com"))
            .unwrap()
            .set_modified(eight_days_ago)
            .unwrap();

        let fetcher = Arc::new(RobotsFetcher::new(&[("a.com", "User-agent: *\nAllow: /")]));
        let gate = gate(&dir, Arc::clone(&fetcher)).await;

        assert!(gate.is_allowed("https://a.com/x").await.unwrap());
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(
            std::fs::read_to_string(cache.path_for("a.com")).unwrap(),
            "User-agent: *\nAllow: /"
        );
    }

    #[tokio::test]
    async fn test_stale_memory_policy_is_replaced() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(RobotsFetcher::new(&[("a.com", "User-agent: *\nAllow: /")]));
        let gate = gate(&dir, Arc::clone(&fetcher)).await;

        gate.policies.write().await.insert(
            "a.com".to_string(),
            CachedRobots::with_fetch_time(
                ParsedRobots::from_content("User-agent: *\nDisallow: /"),
                chrono::Utc::now() - Duration::days(30),
            ),
        );
        // Expire the disk copy as well so the network is consulted
        std::fs::remove_dir_all(dir.path().join("robot_cache")).ok();

        assert!(gate.is_allowed("https://a.com/x").await.unwrap());
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_checks_fetch_robots_once() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(RobotsFetcher::new(&[("a.com", "User-agent: *\nAllow: /")]));
        let gate = Arc::new(gate(&dir, Arc::clone(&fetcher)).await);

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let gate = Arc::clone(&gate);
                tokio::spawn(async move {
                    gate.is_allowed(&format!("https://a.com/{}", i)).await.unwrap()
                })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap());
        }

        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_domains_are_independent() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(RobotsFetcher::new(&[
            ("a.com", "User-agent: *\nDisallow: /"),
            ("b.com", ""),
        ]));
        let gate = gate(&dir, fetcher).await;

        assert!(!gate.is_allowed("https://a.com/x").await.unwrap());
        assert!(gate.is_allowed("https://b.com/x").await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_url_is_an_error() {
        let dir = TempDir::new().unwrap();
        let gate = gate(&dir, Arc::new(RobotsFetcher::new(&[]))).await;

        assert!(matches!(
            gate.is_allowed("not a url").await,
            Err(LoomError::Url(_))
        ));
    }
}
