//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and run the full
//! crawl loop end-to-end against a temporary data directory.

use snapcrawl::config::{parse_config, Config};
use snapcrawl::crawler::{CrawlOptions, Coordinator, ShutdownSignal, StopReason};
use snapcrawl::output::{load_statistics, CrawlStatistics};
use snapcrawl::snapshot::SnapshotStore;
use snapcrawl::state::{CrawlState, StateStore, UrlOutcome};
use snapcrawl::storage::DataLayout;
use std::path::Path;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Creates a test configuration for the mock server's origin
///
/// `crawler` and `output` are extra lines for those tables.
fn create_test_config(server: &MockServer, data_dir: &Path, crawler: &str, output: &str) -> Config {
    let content = format!(
        r#"
[site]
domain = "127.0.0.1:{port}"
start-url = "{uri}/"

[crawler]
request-sleep-secs = 0
request-timeout-secs = 5
{crawler}

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0"

[output]
data-dir = '{data_dir}'
{output}
"#,
        port = server.address().port(),
        uri = server.uri(),
        crawler = crawler,
        data_dir = data_dir.display(),
        output = output,
    );
    parse_config(&content).expect("test config should be valid")
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        format!("<html><head><title>Test</title></head><body>{}</body></html>", body),
        "text/html; charset=utf-8",
    )
}

async fn mount_page(server: &MockServer, page: &str, body: &str, expected: u64) {
    Mock::given(method("GET"))
        .and(path(page))
        .respond_with(html(body))
        .expect(expected)
        .mount(server)
        .await;
}

/// Serves a page and requests shutdown while doing so, like a Ctrl-C that
/// arrives during the fetch
struct ShutdownDuringFetch {
    shutdown: ShutdownSignal,
    body: String,
}

impl Respond for ShutdownDuringFetch {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.shutdown.trigger();
        html(&self.body)
    }
}

async fn run_crawl(config: Config) -> snapcrawl::output::RunSummary {
    let mut coordinator = Coordinator::new(config, CrawlOptions::default(), ShutdownSignal::new())
        .await
        .expect("coordinator should start");
    coordinator.run().await.expect("crawl should succeed")
}

fn saved_state(data_dir: &Path) -> CrawlState {
    StateStore::open(&DataLayout::new(data_dir).state_dir)
        .unwrap()
        .load()
        .unwrap()
        .expect("state file should exist")
        .0
}

fn snapshot_exists(data_dir: &Path, url: &str) -> bool {
    SnapshotStore::open(DataLayout::new(data_dir).snapshots_dir)
        .unwrap()
        .exists(&Url::parse(url).unwrap())
}

fn statistics(config: &Config) -> CrawlStatistics {
    load_statistics(config).expect("statistics should load")
}

#[tokio::test]
async fn test_full_crawl_single_site() {
    let server = MockServer::start().await;
    let base = server.uri();
    let tmp = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nAllow: /"))
        .mount(&server)
        .await;

    mount_page(
        &server,
        "/",
        r#"<nav><a href="/page1">Menu</a></nav>
           <article>
             <p>Write to <a href="mailto:admin@example.org">admin@example.org</a></p>
             <a href="/page1">Page 1</a>
             <a href="/page2">Page 2</a>
             <a href="/files/report.pdf">Annual report</a>
             <a href="https://elsewhere.example.com/">Elsewhere</a>
           </article>"#,
        1,
    )
    .await;
    mount_page(
        &server,
        "/page1",
        r#"<a href="/page2">Page 2</a><a href="/page1?offset=20">Next</a>"#,
        1,
    )
    .await;
    mount_page(&server, "/page2", r#"<a href="/">Home</a>"#, 1).await;

    Mock::given(method("GET"))
        .and(path("/files/report.pdf"))
        .and(header("referer", format!("{}/", base).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"%PDF-1.4".to_vec(), "application/pdf"))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server, tmp.path(), "", "");
    let summary = run_crawl(config.clone()).await;

    assert_eq!(summary.stop_reason, StopReason::QueueExhausted);
    assert_eq!(summary.pages_fetched, 3);
    assert_eq!(summary.outcomes.get(UrlOutcome::Fetched), 3);
    // Three pages and one attachment; robots.txt is not counted
    assert_eq!(summary.requests_this_run, 4);
    assert_eq!(summary.attachments_detected, 1);
    assert_eq!(summary.attachments_downloaded, 1);

    let stats = statistics(&config);
    assert_eq!(stats.pages_logged, 3);
    assert_eq!(stats.snapshots, 3);
    assert_eq!(stats.attachments_logged, 1);
    assert_eq!(stats.attachments_downloaded, 1);

    let state = saved_state(tmp.path());
    assert!(state.queue.is_empty());
    assert_eq!(state.inflight, None);
    assert_eq!(state.requests_used, 4);
    assert!(state.keys_cover_frontier());

    let home = std::fs::read_to_string(
        SnapshotStore::open(DataLayout::new(tmp.path()).snapshots_dir)
            .unwrap()
            .path_for(&Url::parse(&format!("{}/", base)).unwrap()),
    )
    .unwrap();
    assert!(home.contains("Fetched at:"));
    assert!(home.contains("Annual report"));
    assert!(!home.contains("admin@example.org"));
    assert!(!home.contains("<nav>"));

    let layout = DataLayout::new(tmp.path());
    assert!(layout.run_meta.is_file());
    assert!(layout.report.is_file());
    assert_eq!(std::fs::read_dir(&layout.files_dir).unwrap().count(), 1);
}

#[tokio::test]
async fn test_robots_disallowed_path_is_never_fetched() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private\n"),
        )
        .mount(&server)
        .await;

    mount_page(
        &server,
        "/",
        r#"<a href="/private/secret">Secret</a><a href="/public">Public</a>"#,
        1,
    )
    .await;
    mount_page(&server, "/public", "Public page", 1).await;
    mount_page(&server, "/private/secret", "Secret page", 0).await;

    let config = create_test_config(&server, tmp.path(), "", "");
    let summary = run_crawl(config.clone()).await;

    assert_eq!(summary.pages_fetched, 2);
    assert_eq!(statistics(&config).pages_logged, 2);
    let state = saved_state(tmp.path());
    assert!(!state.queue.iter().any(|u| u.contains("/private")));
}

#[tokio::test]
async fn test_login_pages_are_never_snapshotted() {
    let server = MockServer::start().await;
    let base = server.uri();
    let tmp = TempDir::new().unwrap();

    mount_page(
        &server,
        "/",
        r#"<a href="/members">Members</a><a href="/login?next=/">Sign in</a>"#,
        1,
    )
    .await;
    mount_page(
        &server,
        "/members",
        r#"<div class="login-wrapper"><form><input name="id"/></form></div>"#,
        1,
    )
    .await;
    mount_page(&server, "/login", "Login form", 0).await;

    let config = create_test_config(&server, tmp.path(), "", "");
    let summary = run_crawl(config.clone()).await;

    assert_eq!(summary.pages_fetched, 1);
    assert_eq!(summary.outcomes.get(UrlOutcome::SkippedLogin), 2);
    assert!(snapshot_exists(tmp.path(), &format!("{}/", base)));
    assert!(!snapshot_exists(tmp.path(), &format!("{}/members", base)));
    assert_eq!(statistics(&config).snapshots, 1);
}

#[tokio::test]
async fn test_page_budget_leaves_queue_persisted() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();

    mount_page(
        &server,
        "/",
        r#"<a href="/page1">1</a><a href="/page2">2</a>"#,
        1,
    )
    .await;
    mount_page(&server, "/page1", "One", 0).await;
    mount_page(&server, "/page2", "Two", 0).await;

    let config = create_test_config(&server, tmp.path(), "max-pages = 1", "");
    let summary = run_crawl(config).await;

    assert_eq!(summary.stop_reason, StopReason::PageBudget);
    assert_eq!(summary.pages_fetched, 1);
    assert_eq!(summary.queue_remaining, 2);

    let state = saved_state(tmp.path());
    assert_eq!(state.queue.len(), 2);
    assert_eq!(state.inflight, None);
    assert!(state.keys_cover_frontier());
}

#[tokio::test]
async fn test_request_budget_stops_before_next_url() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();

    mount_page(&server, "/", r#"<a href="/page1">1</a>"#, 1).await;
    mount_page(&server, "/page1", "One", 0).await;

    let config = create_test_config(&server, tmp.path(), "max-requests-per-run = 1", "");
    let summary = run_crawl(config).await;

    assert_eq!(summary.stop_reason, StopReason::RequestBudget);
    assert_eq!(summary.requests_this_run, 1);
    assert_eq!(saved_state(tmp.path()).queue.len(), 1);
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();

    mount_page(&server, "/", r#"<a href="/page1">1</a>"#, 1).await;
    mount_page(&server, "/page1", r#"<a href="/">Home</a>"#, 1).await;

    let config = create_test_config(&server, tmp.path(), "", "");
    let first = run_crawl(config.clone()).await;
    assert_eq!(first.pages_fetched, 2);

    let second = run_crawl(config.clone()).await;
    assert_eq!(second.pages_fetched, 0);
    assert_eq!(second.requests_this_run, 0);
    assert_eq!(second.outcomes.get(UrlOutcome::SkippedDuplicate), 1);

    let stats = statistics(&config);
    assert_eq!(stats.pages_logged, 2);
    assert_eq!(stats.snapshots, 2);
    // Lifetime counter survives the finished state
    assert_eq!(saved_state(tmp.path()).requests_used, 2);
}

#[tokio::test]
async fn test_inflight_url_is_retried_first_after_crash() {
    let server = MockServer::start().await;
    let base = server.uri();
    let tmp = TempDir::new().unwrap();

    let page1 = Url::parse(&format!("{}/page1", base)).unwrap();
    let page2 = Url::parse(&format!("{}/page2", base)).unwrap();

    // A previous run was killed while page2 was inflight
    let mut state = CrawlState::new();
    state.try_enqueue(&page2);
    state.try_enqueue(&page1);
    let inflight = state.pop_next().unwrap();
    state.set_inflight(&inflight);
    StateStore::open(&DataLayout::new(tmp.path()).state_dir)
        .unwrap()
        .save(&state, &[])
        .unwrap();

    mount_page(&server, "/", "Home", 0).await;
    mount_page(&server, "/page2", "Two", 1).await;
    mount_page(&server, "/page1", "One", 0).await;

    let config = create_test_config(&server, tmp.path(), "max-pages = 1", "");
    let summary = run_crawl(config).await;

    assert!(summary.resumed);
    assert_eq!(summary.recovered_inflight.as_deref(), Some(page2.as_str()));
    assert_eq!(summary.pages_fetched, 1);
    assert!(snapshot_exists(tmp.path(), page2.as_str()));
    assert!(!snapshot_exists(tmp.path(), page1.as_str()));

    let state = saved_state(tmp.path());
    assert_eq!(state.queue.iter().collect::<Vec<_>>(), [page1.as_str()]);
    assert_eq!(state.inflight, None);
}

#[tokio::test]
async fn test_volatile_parameters_enqueue_once() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();

    // Mounted first so it wins over the plain /a mock
    Mock::given(method("GET"))
        .and(path("/a"))
        .and(query_param("foo", "1"))
        .respond_with(html("Filtered"))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(
        &server,
        "/a",
        r#"<a href="/a?foo=1&amp;offset=20">Page 2</a>
           <a href="/a?offset=40&amp;foo=1">Page 3</a>"#,
        1,
    )
    .await;

    let mut config = create_test_config(&server, tmp.path(), r#"volatile-params = ["offset"]"#, "");
    config.site.start_url = Some(format!("{}/a", server.uri()));
    let summary = run_crawl(config).await;

    assert_eq!(summary.pages_fetched, 2);
    let state = saved_state(tmp.path());
    assert_eq!(state.enqueued_keys.len(), 2);
}

#[tokio::test]
async fn test_shutdown_before_run_persists_seeds() {
    let server = MockServer::start().await;
    let base = server.uri();
    let tmp = TempDir::new().unwrap();

    mount_page(&server, "/", "Home", 0).await;

    let config = create_test_config(&server, tmp.path(), "", "");
    let shutdown = ShutdownSignal::new();
    let mut coordinator = Coordinator::new(config, CrawlOptions::default(), shutdown.clone())
        .await
        .unwrap();
    shutdown.trigger();
    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.stop_reason, StopReason::Shutdown);
    assert_eq!(summary.pages_fetched, 0);

    let home = format!("{}/", base);
    let state = saved_state(tmp.path());
    assert_eq!(state.queue.iter().collect::<Vec<_>>(), [home.as_str()]);
}

#[tokio::test]
async fn test_failed_urls_are_deferred_to_next_run() {
    let server = MockServer::start().await;
    let base = server.uri();
    let tmp = TempDir::new().unwrap();

    mount_page(
        &server,
        "/",
        r#"<a href="/flaky">Flaky</a><a href="/gone">Gone</a>"#,
        1,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server, tmp.path(), "retry-failed = true", "");
    let summary = run_crawl(config).await;

    assert_eq!(summary.outcomes.get(UrlOutcome::Failed), 2);
    assert_eq!(summary.deferred, 1);

    let flaky = format!("{}/flaky", base);
    let state = saved_state(tmp.path());
    assert_eq!(state.queue.iter().collect::<Vec<_>>(), [flaky.as_str()]);
}

#[tokio::test]
async fn test_sitemap_seeds_newest_first() {
    let server = MockServer::start().await;
    let base = server.uri();
    let tmp = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?>
<sitemapindex><sitemap><loc>{}/sitemap-news.xml</loc></sitemap></sitemapindex>"#,
                base
            ),
            "application/xml",
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sitemap-news.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset>
  <url><loc>{base}/news/1</loc><lastmod>2024-01-01</lastmod></url>
  <url><loc>{base}/news/2</loc><lastmod>2024-03-01</lastmod></url>
</urlset>"#,
                base = base
            ),
            "application/xml",
        ))
        .mount(&server)
        .await;
    mount_page(&server, "/news/2", "Newest", 1).await;
    mount_page(&server, "/news/1", "Older", 0).await;

    let content = format!(
        r#"
[site]
domain = "127.0.0.1:{port}"
sitemap-index = "{base}/sitemap.xml"

[crawler]
request-sleep-secs = 0
max-pages = 1

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0"

[output]
data-dir = '{data_dir}'
storage = "sqlite"
"#,
        port = server.address().port(),
        base = base,
        data_dir = tmp.path().display(),
    );
    let config = parse_config(&content).unwrap();
    let summary = run_crawl(config.clone()).await;

    assert_eq!(summary.seeded, 2);
    assert_eq!(summary.pages_fetched, 1);
    assert!(snapshot_exists(tmp.path(), &format!("{}/news/2", base)));

    let stats = statistics(&config);
    assert_eq!(stats.pages_logged, 1);
    assert_eq!(stats.pages_by_section, vec![("news/2".to_string(), 1)]);
    assert!(DataLayout::new(tmp.path()).database.is_file());
}

#[tokio::test]
async fn test_shutdown_mid_page_keeps_url_inflight() {
    let server = MockServer::start().await;
    let base = server.uri();
    let tmp = TempDir::new().unwrap();

    let home = Url::parse(&format!("{}/", base)).unwrap();
    let other = Url::parse(&format!("{}/other", base)).unwrap();

    let mut state = CrawlState::new();
    state.try_enqueue(&home);
    state.try_enqueue(&other);
    StateStore::open(&DataLayout::new(tmp.path()).state_dir)
        .unwrap()
        .save(&state, &[])
        .unwrap();

    let shutdown = ShutdownSignal::new();
    // The second run reads the page from the raw-HTML cache
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ShutdownDuringFetch {
            shutdown: shutdown.clone(),
            body: r#"<a href="/files/plan.pdf">Plan</a>"#.to_string(),
        })
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/plan.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"%PDF-1.4".to_vec(), "application/pdf"))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "/other", "Other", 0).await;

    let config = create_test_config(&server, tmp.path(), "max-pages = 1", "");
    let mut coordinator = Coordinator::new(config.clone(), CrawlOptions::default(), shutdown)
        .await
        .unwrap();
    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.stop_reason, StopReason::Shutdown);
    assert_eq!(summary.outcomes.get(UrlOutcome::Interrupted), 1);
    assert_eq!(summary.pages_fetched, 0);

    let state = saved_state(tmp.path());
    assert_eq!(state.inflight.as_deref(), Some(home.as_str()));
    assert_eq!(state.queue.iter().collect::<Vec<_>>(), [other.as_str()]);

    let stats = statistics(&config);
    assert_eq!(stats.pages_logged, 0);
    assert_eq!(stats.attachments_logged, 0);
    assert!(!snapshot_exists(tmp.path(), home.as_str()));

    let summary = run_crawl(config.clone()).await;
    assert_eq!(summary.recovered_inflight.as_deref(), Some(home.as_str()));
    assert_eq!(summary.pages_fetched, 1);
    assert_eq!(summary.attachments_downloaded, 1);
    assert!(snapshot_exists(tmp.path(), home.as_str()));
    assert!(!snapshot_exists(tmp.path(), other.as_str()));

    let stats = statistics(&config);
    assert_eq!(stats.pages_logged, 1);
    assert_eq!(stats.attachments_logged, 1);
}

#[tokio::test]
async fn test_overlong_attachment_name_is_shortened() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();

    mount_page(&server, "/", r#"<a href="/files/report.pdf">Report</a>"#, 1).await;
    let disposition = format!(
        "attachment; filename*=UTF-8''{}.pdf",
        urlencoding::encode(&"가".repeat(100))
    );
    Mock::given(method("GET"))
        .and(path("/files/report.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-disposition", disposition.as_str())
                .set_body_raw(b"%PDF-1.4".to_vec(), "application/pdf"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server, tmp.path(), "", "");
    let summary = run_crawl(config).await;

    assert_eq!(summary.pages_fetched, 1);
    assert_eq!(summary.attachments_downloaded, 1);

    let saved: Vec<String> = std::fs::read_dir(DataLayout::new(tmp.path()).files_dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(saved.len(), 1);
    assert!(saved[0].len() < 255);
    assert!(saved[0].ends_with(".pdf"));
    assert!(saved[0].contains("가가가"));
}

#[tokio::test]
async fn test_refresh_refetches_snapshotted_page() {
    let server = MockServer::start().await;
    let base = server.uri();
    let tmp = TempDir::new().unwrap();
    let home = format!("{}/", base);

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("Old menu"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("New menu"))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server, tmp.path(), "", "");
    let first = run_crawl(config.clone()).await;
    assert_eq!(first.pages_fetched, 1);

    // Without a refresh the snapshot short-circuits the page
    let second = run_crawl(config.clone()).await;
    assert_eq!(second.pages_fetched, 0);

    let options = CrawlOptions {
        refresh: vec![home.clone()],
        ..CrawlOptions::default()
    };
    let mut coordinator = Coordinator::new(config.clone(), options, ShutdownSignal::new())
        .await
        .unwrap();
    let third = coordinator.run().await.unwrap();
    assert_eq!(third.pages_fetched, 1);
    assert_eq!(third.requests_this_run, 1);

    let snapshot = std::fs::read_to_string(
        SnapshotStore::open(DataLayout::new(tmp.path()).snapshots_dir)
            .unwrap()
            .path_for(&Url::parse(&home).unwrap()),
    )
    .unwrap();
    assert!(snapshot.contains("New menu"));
    assert!(!snapshot.contains("Old menu"));
}
