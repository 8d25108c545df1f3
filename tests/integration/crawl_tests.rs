//! Integration tests for the crawler
//!
//! Most tests drive the full crawl cycle through an in-process scripted site so
//! that robots.txt, failures and request order are deterministic. One test runs
//! the real HTTP fetcher against a wiremock server.

use async_trait::async_trait;
use linkloom::config::parse_config;
use linkloom::crawler::{
    Coordinator, CrawlContext, CrawlSettings, FetchError, FetchRequest, FetchThrottle,
    FetchedDocument, Fetcher, HeaderSet, ParserRegistry, RetryPolicy,
};
use linkloom::robots::{GateSettings, PolitenessGate};
use linkloom::storage::{LinkGraph, LinkUpdate, SqliteLinkGraph};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SITE: &str = "https://site.test";

/// An in-memory website; URLs without a page fail with a network error
struct ScriptedSite {
    pages: HashMap<String, String>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedSite {
    fn new(pages: Vec<(String, String)>) -> Self {
        Self {
            pages: pages.into_iter().collect(),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn page_requests(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter(|url| !url.ends_with("/robots.txt"))
            .collect()
    }

    fn robots_requests(&self) -> usize {
        self.requests()
            .iter()
            .filter(|url| url.ends_with("/robots.txt"))
            .count()
    }
}

#[async_trait]
impl Fetcher for ScriptedSite {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedDocument, FetchError> {
        self.requests.lock().unwrap().push(request.url.clone());

        match self.pages.get(&request.url) {
            Some(body) => Ok(FetchedDocument {
                final_url: request.url.clone(),
                status: 200,
                body: body.clone(),
            }),
            None => Err(FetchError::Network {
                url: request.url.clone(),
                reason: "connection refused".to_string(),
            }),
        }
    }
}

fn url(path: &str) -> String {
    format!("{}{}", SITE, path)
}

fn page(path: &str, body: &str) -> (String, String) {
    (url(path), body.to_string())
}

fn anchors(paths: &[&str]) -> String {
    let links: String = paths
        .iter()
        .map(|p| format!(r#"<a href="{}">{}</a>"#, p, p))
        .collect();
    format!("<html><head><title>T</title></head><body>{}</body></html>", links)
}

async fn build_context(dir: &TempDir, site: Arc<ScriptedSite>) -> CrawlContext {
    let fetcher: Arc<dyn Fetcher> = site;
    let gate = PolitenessGate::new(
        Arc::clone(&fetcher),
        GateSettings {
            robots_agent: "TestBot".to_string(),
            headers: HeaderSet::new(),
            fetch_timeout: Duration::from_secs(1),
            robots_ttl: chrono::Duration::days(7),
            cache_dir: dir.path().join("robot_cache"),
            ledger_path: dir.path().join("unallowed_links.json"),
        },
    )
    .await;

    CrawlContext {
        store: Arc::new(SqliteLinkGraph::new(&dir.path().join("graph.db")).unwrap()),
        gate: Arc::new(gate),
        fetcher,
        throttle: Arc::new(FetchThrottle::new(Duration::ZERO)),
        parsers: Arc::new(ParserRegistry::new()),
        settings: CrawlSettings {
            retry: RetryPolicy {
                attempts: 2,
                initial_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(2),
            },
            ..CrawlSettings::default()
        },
    }
}

#[tokio::test]
async fn test_max_pages_bounds_visited_set_in_fifo_order() {
    let dir = TempDir::new().unwrap();
    let start = anchors(&["/p1", "/p2", "/p3", "/p4", "/p5"]);
    let site = Arc::new(ScriptedSite::new(vec![
        page("/", &start),
        page("/p1", "<html>p1</html>"),
        page("/p2", "<html>p2</html>"),
        page("/p3", "<html>p3</html>"),
        page("/p4", "<html>p4</html>"),
        page("/p5", "<html>p5</html>"),
    ]));
    let context = build_context(&dir, site.clone()).await;
    let store = context.store.clone();

    let visited = Coordinator::new(context).crawl(&url("/"), 2).await.unwrap();

    assert_eq!(visited, HashSet::from([url("/"), url("/p1")]));
    assert_eq!(site.page_requests(), vec![url("/"), url("/p1")]);

    // Every discovered link is in the graph even though only p1 was fetched
    assert_eq!(
        store.children(&url("/")).unwrap(),
        vec![url("/p1"), url("/p2"), url("/p3"), url("/p4"), url("/p5")]
    );
}

#[tokio::test]
async fn test_full_crawl_follows_internal_links_breadth_first() {
    let dir = TempDir::new().unwrap();
    let start = anchors(&["/a", "/b"]);
    let a = anchors(&["/a/deep", "/"]);
    let site = Arc::new(ScriptedSite::new(vec![
        page("/", &start),
        page("/a", &a),
        page("/b", "<html>b</html>"),
        page("/a/deep", "<html>deep</html>"),
    ]));
    let context = build_context(&dir, site.clone()).await;
    let store = context.store.clone();

    let visited = Coordinator::new(context).crawl(&url("/"), 100).await.unwrap();

    assert_eq!(visited.len(), 4);
    assert_eq!(
        site.page_requests(),
        vec![url("/"), url("/a"), url("/b"), url("/a/deep")]
    );

    // The back link from /a to / is recorded as a second edge, not a second visit
    assert_eq!(store.parents(&url("/")).unwrap(), vec![url("/a")]);
    assert_eq!(store.parents(&url("/a/deep")).unwrap(), vec![url("/a")]);
    assert_eq!(site.robots_requests(), 1);
}

#[tokio::test]
async fn test_duplicate_content_is_visited_but_not_expanded() {
    let dir = TempDir::new().unwrap();
    let start = anchors(&["/mirror", "/unique"]);
    let site = Arc::new(ScriptedSite::new(vec![
        page("/", &start),
        // Same bytes as the start page, so its links must not be followed again
        page("/mirror", &start),
        page("/unique", "<html>unique</html>"),
    ]));
    let context = build_context(&dir, site.clone()).await;
    let store = context.store.clone();

    let visited = Coordinator::new(context).crawl(&url("/"), 100).await.unwrap();

    assert!(visited.contains(&url("/mirror")));
    assert_eq!(visited.len(), 3);

    let mirror = store.get(&url("/mirror")).unwrap().unwrap();
    assert!(mirror.content_hash.is_none());
    assert!(mirror.last_checked.is_some());
    assert!(store.children(&url("/mirror")).unwrap().is_empty());
}

#[tokio::test]
async fn test_robots_denial_skips_link_and_records_ledger() {
    let dir = TempDir::new().unwrap();
    let start = anchors(&["/private/secret", "/public"]);
    let site = Arc::new(ScriptedSite::new(vec![
        page("/robots.txt", "User-agent: *\nDisallow: /private\n"),
        page("/", &start),
        page("/public", "<html>public</html>"),
    ]));
    let context = build_context(&dir, site.clone()).await;
    let store = context.store.clone();
    let gate = context.gate.clone();

    let visited = Coordinator::new(context).crawl(&url("/"), 100).await.unwrap();

    assert_eq!(visited, HashSet::from([url("/"), url("/public")]));
    assert!(!site.page_requests().contains(&url("/private/secret")));
    assert!(store.get(&url("/private/secret")).unwrap().is_none());

    assert!(gate.ledger().contains(&url("/private/secret")).await);
    let saved = std::fs::read_to_string(dir.path().join("unallowed_links.json")).unwrap();
    let saved: Vec<String> = serde_json::from_str(&saved).unwrap();
    assert_eq!(saved, vec![url("/private/secret")]);
}

#[tokio::test]
async fn test_disallowed_start_url_visits_nothing() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(ScriptedSite::new(vec![
        page("/robots.txt", "User-agent: TestBot\nDisallow: /\n"),
        page("/", "<html>home</html>"),
    ]));
    let context = build_context(&dir, site.clone()).await;

    let visited = Coordinator::new(context).crawl(&url("/"), 100).await.unwrap();

    assert!(visited.is_empty());
    assert!(site.page_requests().is_empty());
}

#[tokio::test]
async fn test_failed_fetch_is_retried_then_left_unvisited() {
    let dir = TempDir::new().unwrap();
    let start = anchors(&["/broken"]);
    let site = Arc::new(ScriptedSite::new(vec![page("/", &start)]));
    let context = build_context(&dir, site.clone()).await;
    let store = context.store.clone();

    let visited = Coordinator::new(context).crawl(&url("/"), 100).await.unwrap();

    assert_eq!(visited, HashSet::from([url("/")]));
    assert_eq!(
        site.page_requests(),
        vec![url("/"), url("/broken"), url("/broken")]
    );

    // Still in the graph as a discovered link, with no content
    let broken = store.get(&url("/broken")).unwrap().unwrap();
    assert!(broken.content_hash.is_none());
}

#[tokio::test]
async fn test_external_links_and_resources_recorded_not_fetched() {
    let dir = TempDir::new().unwrap();
    let start = r#"<html><head><link rel="stylesheet" href="/style.css"></head>
        <body><a href="https://other.test/page">Other</a>
        <img src="https://cdn.test/logo.png"></body></html>"#;
    let site = Arc::new(ScriptedSite::new(vec![page("/", start)]));
    let context = build_context(&dir, site.clone()).await;
    let store = context.store.clone();

    let visited = Coordinator::new(context).crawl(&url("/"), 100).await.unwrap();

    assert_eq!(visited.len(), 1);
    assert_eq!(site.page_requests(), vec![url("/")]);
    assert_eq!(
        store.children(&url("/")).unwrap(),
        vec![
            "https://cdn.test/logo.png".to_string(),
            "https://other.test/page".to_string(),
            url("/style.css"),
        ]
    );
    assert_eq!(
        store.by_domain("other.test").unwrap(),
        vec!["https://other.test/page"]
    );
}

#[tokio::test]
async fn test_second_crawl_within_window_fetches_nothing() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(ScriptedSite::new(vec![page("/", "<html>only</html>")]));
    let context = build_context(&dir, site.clone()).await;

    let coordinator = Coordinator::new(context);
    assert_eq!(coordinator.crawl(&url("/"), 10).await.unwrap().len(), 1);
    assert!(coordinator.crawl(&url("/"), 10).await.unwrap().is_empty());
    assert_eq!(site.page_requests(), vec![url("/")]);
}

#[tokio::test]
async fn test_graph_survives_restart() {
    let dir = TempDir::new().unwrap();
    let start = anchors(&["/next"]);
    let site = Arc::new(ScriptedSite::new(vec![
        page("/", &start),
        page("/next", "<html>next</html>"),
    ]));

    {
        let context = build_context(&dir, site.clone()).await;
        Coordinator::new(context).crawl(&url("/"), 100).await.unwrap();
    }

    // A new process sees the same graph and the cached robots.txt
    let context = build_context(&dir, site.clone()).await;
    let store = context.store.clone();
    assert_eq!(store.children(&url("/")).unwrap(), vec![url("/next")]);

    let visited = Coordinator::new(context).crawl(&url("/"), 100).await.unwrap();
    assert!(visited.is_empty());
    assert_eq!(site.robots_requests(), 1);
}

#[tokio::test]
async fn test_concurrent_crawls_share_store_and_gate() {
    let dir = TempDir::new().unwrap();
    let left = anchors(&["/shared"]);
    let right = anchors(&["/shared"]);
    let site = Arc::new(ScriptedSite::new(vec![
        page("/left", &left),
        page("/right", &right.replace("<title>T", "<title>R")),
        page("/shared", "<html>shared</html>"),
    ]));
    let context = build_context(&dir, site.clone()).await;
    let store = context.store.clone();

    let first = Coordinator::new(context.clone());
    let second = Coordinator::new(context);
    let left_url = url("/left");
    let right_url = url("/right");
    let (a, b) = tokio::join!(
        first.crawl(&left_url, 100),
        second.crawl(&right_url, 100)
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(site.robots_requests(), 1);
    assert_eq!(
        store.parents(&url("/shared")).unwrap(),
        vec![url("/left"), url("/right")]
    );
}

#[test]
fn test_graph_maintenance_through_public_api() {
    let store = SqliteLinkGraph::new_in_memory().unwrap();

    store.upsert(LinkUpdate::new("http://a.com/")).unwrap();
    store
        .upsert(LinkUpdate::new("http://a.com/x").with_parent("http://a.com/"))
        .unwrap();
    store
        .upsert(LinkUpdate::new("http://a.com/y").with_parent("http://a.com/x"))
        .unwrap();
    assert_eq!(store.children("http://a.com/").unwrap(), vec!["http://a.com/x"]);

    assert!(store.remove("http://a.com/x").unwrap());
    assert_eq!(store.children("http://a.com/").unwrap(), vec!["http://a.com/y"]);
    assert!(store.get("http://a.com/x").unwrap().is_none());

    assert_eq!(store.purge_domain("a.com").unwrap(), 2);
    assert_eq!(store.statistics().unwrap().nodes, 0);
}

#[tokio::test]
async fn test_http_crawl_against_mock_server() {
    let dir = TempDir::new().unwrap();
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!(
                    r#"<html><head><title>Home</title></head><body>
                    <a href="{}/page1">Page 1</a>
                    <a href="/page2">Page 2</a>
                    </body></html>"#,
                    base_url
                ))
                .insert_header("content-type", "text/html"),
        )
        .mount(&mock_server)
        .await;

    for page in ["/page1", "/page2"] {
        Mock::given(method("GET"))
            .and(path(page))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(format!("<html><body>{}</body></html>", page))
                    .insert_header("content-type", "text/html"),
            )
            .mount(&mock_server)
            .await;
    }

    let mut config = parse_config(
        r#"
        [crawler]
        fetch-interval-ms = 0
        fetch-timeout-secs = 2
        retry-attempts = 1

        [user-agent]
        crawler-name = "TestBot"
        crawler-version = "1.0.0"
        contact-url = "https://example.com/contact"
        contact-email = "test@example.com"
        "#,
    )
    .unwrap();
    config.output.database_path = dir.path().join("graph.db").display().to_string();
    config.politeness.robots_cache_dir = dir.path().join("robots").display().to_string();
    config.politeness.denial_ledger_path = dir.path().join("ledger.json").display().to_string();

    let context = CrawlContext::from_config(&config).await.unwrap();
    let store = context.store.clone();
    let gate = context.gate.clone();

    let start = format!("{}/", base_url);
    let visited = Coordinator::new(context).crawl(&start, 10).await.unwrap();

    assert_eq!(visited.len(), 3);
    assert_eq!(store.children(&start).unwrap().len(), 2);

    // robots.txt is requested over https, which the plain-http mock cannot serve,
    // so the gate failed open and cached an empty policy
    let domain = url::Url::parse(&base_url)
        .map(|u| format!("{}:{}", u.host_str().unwrap(), u.port().unwrap()))
        .unwrap();
    let cached = gate.disk_cache().path_for(&domain);
    assert_eq!(std::fs::read_to_string(cached).unwrap(), "");
}
