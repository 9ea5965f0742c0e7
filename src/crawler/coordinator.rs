//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that ties every component together:
//! - Opening the data directory, the state file and the log storage
//! - Fetching robots.txt and the sitemap once at startup
//! - Resuming a saved frontier or seeding a new one
//! - Running each URL through the gate, the login detector, the fetcher, the
//!   snapshot builder and the link classifier
//! - Writing the run summary when the loop stops

use crate::config::Config;
use crate::crawler::attachments::{AttachmentRules, FileStore};
use crate::crawler::fetcher::{build_http_client, FetchResult, Fetcher};
use crate::crawler::parser::{AttachmentCandidate, ClassifiedLinks, LinkClassifier};
use crate::crawler::scheduler::{Scheduler, StopReason};
use crate::crawler::shutdown::ShutdownSignal;
use crate::crawler::sitemap::collect_sitemap_entries;
use crate::output::{collect_statistics, write_report, write_run_meta, RunSummary};
use crate::policy::{LoginDetector, PolitenessGate};
use crate::robots::{fetch_robots, robots_url};
use crate::snapshot::{
    build_minimal_snapshot_html, ContentExtractor, EmailRedactor, Extracted, SnapshotStore,
};
use crate::state::{CrawlState, OutcomeTally, StateStore, UrlOutcome};
use crate::storage::{open_storage, AttachmentRecord, DataLayout, DownloadInfo, PageRecord, Storage};
use crate::url::{path_section, UrlNormalizer};
use crate::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use scraper::Html;
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};
use url::Url;

/// URLs processed between two progress lines
const PROGRESS_EVERY: u64 = 10;

/// Options that change how a run starts
#[derive(Debug, Clone, Default)]
pub struct CrawlOptions {
    /// Discard the saved frontier and seed again
    pub fresh: bool,

    /// SHA-256 of the configuration file, recorded in the run metadata
    pub config_hash: Option<String>,

    /// URLs whose snapshot and cached body are dropped so they are fetched
    /// again, first
    pub refresh: Vec<String>,
}

/// What a parsed page turned out to be
///
/// `Html` is not `Send`, so everything needed later is taken out of the
/// document before the next await point.
enum PageAnalysis {
    Login { marker: String },
    Page { extracted: Extracted, links: ClassifiedLinks },
}

/// Main crawler coordinator structure
pub struct Coordinator {
    options: CrawlOptions,
    retry_failed: bool,
    layout: DataLayout,
    shutdown: ShutdownSignal,
    scheduler: Scheduler,
    fetcher: Fetcher,
    gate: PolitenessGate,
    normalizer: UrlNormalizer,
    login: LoginDetector,
    extractor: ContentExtractor,
    redactor: Option<EmailRedactor>,
    classifier: LinkClassifier,
    rules: AttachmentRules,
    snapshots: SnapshotStore,
    files: FileStore,
    storage: Box<dyn Storage>,

    /// Sitemap `lastmod` per normalized URL
    lastmods: HashMap<String, String>,

    resumed: bool,
    recovered_inflight: Option<String>,
    seeded: usize,
    tally: OutcomeTally,
    attachments_detected: u64,
    attachments_downloaded: u64,
}

impl Coordinator {
    /// Creates a coordinator ready to run
    ///
    /// This issues the startup requests (robots.txt and the sitemap) but
    /// fetches no page.
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `options` - Fresh start and run metadata
    /// * `shutdown` - Signal checked cooperatively during the run
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(SnapError)` - The data directory, state file or storage could
    ///   not be opened, or a component could not be built
    pub async fn new(config: Config, options: CrawlOptions, shutdown: ShutdownSignal) -> Result<Self> {
        let layout = DataLayout::new(&config.output.data_dir);
        layout.create_dirs()?;

        let store = StateStore::open(&layout.state_dir)?;
        if options.fresh {
            store.clear()?;
            tracing::info!("Discarded saved crawl state");
        }

        let reference = reference_url(&config)?;
        let client = build_http_client(&config)?;

        let robots_location = robots_url(&reference, &config.site.domain)?;
        let robots = fetch_robots(&client, &robots_location, config.site.robots_fail_open).await;
        let gate = PolitenessGate::new(&config, robots)?;

        let sleep = config.crawler.request_sleep();
        let delay = sleep.max(gate.crawl_delay());
        tracing::info!(delay_ms = delay.as_millis() as u64, "Politeness delay");
        let fetcher = Fetcher::new(client, &layout.cache_dir, delay);

        let normalizer = UrlNormalizer::new(config.crawler.volatile_params.iter().cloned());
        let login = LoginDetector::from_config(&config.login)?;
        let extractor = ContentExtractor::from_config(&config.snapshot)?;
        let redactor = EmailRedactor::from_config(&config.pii);
        let classifier = LinkClassifier::new(normalizer.clone(), &config.attachments)?;
        let rules = AttachmentRules::from_config(&config.attachments);
        let snapshots = SnapshotStore::open(&layout.snapshots_dir)?;
        let files = FileStore::open(&layout.files_dir)?;
        let storage = open_storage(config.output.storage, &layout)?;
        tracing::info!(backend = storage.name(), "Opened log storage");

        // Sitemap hints are needed for `lastmod` even when resuming
        let mut lastmods = HashMap::new();
        let mut sitemap_urls = Vec::new();
        if let Some(raw) = &config.site.sitemap_index {
            let index = Url::parse(raw)?;
            let entries =
                collect_sitemap_entries(&fetcher, &index, config.site.allow_sections.as_deref())
                    .await;
            tracing::info!(entries = entries.len(), "Collected sitemap entries");

            for entry in entries {
                match normalizer.normalize_absolute(&entry.url) {
                    Ok(url) => {
                        if let Some(lastmod) = entry.lastmod {
                            lastmods.entry(url.to_string()).or_insert(lastmod);
                        }
                        sitemap_urls.push(url);
                    }
                    Err(e) => {
                        tracing::debug!(url = %entry.url, error = %e, "Skipping sitemap entry");
                    }
                }
            }
        }

        let mut resumed = false;
        let mut recovered_inflight = None;
        let mut seeded = 0;

        let mut state = match store.load()? {
            Some((mut state, last_saved_at)) if !state.is_finished() => {
                recovered_inflight = state.recover_inflight();
                resumed = true;
                tracing::info!(
                    queue = state.queue.len(),
                    recovered = ?recovered_inflight,
                    requests_used = state.requests_used,
                    last_saved_at = ?last_saved_at,
                    "Resuming saved crawl"
                );
                state
            }
            loaded => {
                let mut state = CrawlState::new();
                if let Some((previous, _)) = loaded {
                    tracing::info!("Saved crawl is finished, seeding a new pass");
                    state.requests_used = previous.requests_used;
                }

                let start_url = match &config.site.start_url {
                    Some(raw) => Some(normalizer.normalize_absolute(raw)?),
                    None => None,
                };
                for url in sitemap_urls.iter().chain(start_url.iter()) {
                    if !gate.is_allowed(url) {
                        tracing::debug!(url = %url, "Seed rejected by politeness gate");
                        continue;
                    }
                    if state.try_enqueue(url) {
                        seeded += 1;
                    }
                }
                tracing::info!(seeded, "Seeded frontier");
                state
            }
        };

        if !options.refresh.is_empty() {
            let refreshed = refresh_targets(
                &options.refresh,
                &normalizer,
                &gate,
                &snapshots,
                &fetcher,
                &mut state,
            )?;
            tracing::info!(refreshed, "Queued refresh targets");
        }

        let mut scheduler = Scheduler::new(&config.crawler, state, store);
        scheduler.checkpoint()?;

        Ok(Self {
            options,
            retry_failed: config.crawler.retry_failed,
            layout,
            shutdown,
            scheduler,
            fetcher,
            gate,
            normalizer,
            login,
            extractor,
            redactor,
            classifier,
            rules,
            snapshots,
            files,
            storage,
            lastmods,
            resumed,
            recovered_inflight,
            seeded,
            tally: OutcomeTally::default(),
            attachments_detected: 0,
            attachments_downloaded: 0,
        })
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Runs the crawl loop until a stop condition
    ///
    /// Stops on an empty frontier, an exhausted page or request budget, or
    /// shutdown. Every path saves the state, then writes `run_meta.json` and
    /// `report.md`.
    pub async fn run(&mut self) -> Result<RunSummary> {
        let started_at = Utc::now();
        let clock = Instant::now();
        tracing::info!(
            queue = self.scheduler.frontier_size(),
            resumed = self.resumed,
            "Starting crawl"
        );

        let stop_reason = loop {
            if self.shutdown.is_triggered() {
                break StopReason::Shutdown;
            }
            if let Some(reason) = self.scheduler.budget_exhausted() {
                break reason;
            }
            let Some(raw) = self.scheduler.next_url() else {
                break StopReason::QueueExhausted;
            };

            let outcome = self.process_url(&raw).await?;
            self.tally.record(outcome);
            tracing::debug!(url = %raw, outcome = %outcome, "Processed URL");

            let processed = self.tally.total();
            if processed % PROGRESS_EVERY == 0 {
                let rate = processed as f64 / clock.elapsed().as_secs_f64().max(0.001);
                tracing::info!(
                    "Progress: {} URLs processed, {} pages fetched, {} in frontier, {:.2} URLs/sec",
                    processed,
                    self.scheduler.pages_fetched(),
                    self.scheduler.frontier_size(),
                    rate
                );
            }
        };

        self.scheduler.checkpoint()?;
        let summary = self.summarize(stop_reason, started_at, Utc::now(), clock.elapsed());

        write_run_meta(&summary, &self.layout.run_meta)?;
        let stats = collect_statistics(self.storage.as_ref(), &self.layout)?;
        write_report(&summary, &stats, &self.layout.report)?;

        tracing::info!(
            stop_reason = %stop_reason,
            pages = summary.pages_fetched,
            requests = summary.requests_this_run,
            queue_remaining = summary.queue_remaining,
            "Crawl stopped after {:.1}s",
            summary.elapsed_seconds
        );
        Ok(summary)
    }

    fn summarize(
        &self,
        stop_reason: StopReason,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        elapsed: Duration,
    ) -> RunSummary {
        let state = self.scheduler.state();
        RunSummary {
            started_at,
            ended_at,
            elapsed_seconds: elapsed.as_secs_f64(),
            stop_reason,
            config_hash: self.options.config_hash.clone(),
            resumed: self.resumed,
            recovered_inflight: self.recovered_inflight.clone(),
            seeded: self.seeded,
            pages_fetched: self.scheduler.pages_fetched(),
            requests_this_run: state.requests_used_this_run,
            requests_total: state.requests_used,
            queue_remaining: self.scheduler.frontier_size() + self.scheduler.deferred().len(),
            deferred: self.scheduler.deferred().len(),
            attachments_detected: self.attachments_detected,
            attachments_downloaded: self.attachments_downloaded,
            outcomes: self.tally,
        }
    }

    /// Processes one URL taken from the frontier
    ///
    /// The URL is checkpointed as inflight before any work and cleared only
    /// when it reaches a terminal outcome; an interrupted URL stays inflight.
    async fn process_url(&mut self, raw: &str) -> Result<UrlOutcome> {
        let url = match self.normalizer.normalize_absolute(raw) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(url = %raw, stage = "normalize", error = %e, "Dropping queued URL");
                return Ok(UrlOutcome::SkippedFiltered);
            }
        };

        if !self.scheduler.first_visit(&url) {
            return Ok(UrlOutcome::SkippedDuplicate);
        }

        self.scheduler.begin(&url)?;
        let outcome = self.handle_url(&url).await?;
        if outcome.is_terminal() {
            self.scheduler.finish()?;
        }
        Ok(outcome)
    }

    async fn handle_url(&mut self, url: &Url) -> Result<UrlOutcome> {
        if self.snapshots.exists(url) {
            tracing::debug!(url = %url, "Snapshot exists, skipping");
            return Ok(UrlOutcome::SkippedDuplicate);
        }

        if self.login.is_login_url(url) {
            tracing::info!(url = %url, "Login URL, skipping");
            return Ok(UrlOutcome::SkippedLogin);
        }

        if let Err(rejection) = self.gate.check(url) {
            tracing::debug!(url = %url, reason = rejection.as_str(), "Rejected by politeness gate");
            return Ok(UrlOutcome::SkippedFiltered);
        }

        if self.shutdown.is_triggered() {
            return Ok(UrlOutcome::Interrupted);
        }

        let result = self.fetcher.fetch_page(url).await;
        if result.issued_request() {
            self.scheduler.record_request();
        }

        let (body, from_cache) = match result {
            FetchResult::Success {
                body, from_cache, ..
            } => (body, from_cache),
            FetchResult::ContentMismatch { content_type } => {
                tracing::warn!(url = %url, stage = "fetch", content_type = %content_type, "Not an HTML page");
                return Ok(UrlOutcome::Failed);
            }
            FetchResult::HttpError { status_code } => {
                tracing::warn!(url = %url, stage = "fetch", status = status_code, "HTTP error");
                if is_retryable_status(status_code) {
                    self.defer_failed(url);
                }
                return Ok(UrlOutcome::Failed);
            }
            FetchResult::NetworkError { error } => {
                tracing::warn!(url = %url, stage = "fetch", error = %error, "Network error");
                self.defer_failed(url);
                return Ok(UrlOutcome::Failed);
            }
        };

        let fetched_at = Utc::now();
        let (extracted, links) = match self.analyze(&body, url) {
            PageAnalysis::Login { marker } => {
                tracing::info!(url = %url, marker = %marker, "Login page detected, not snapshotting");
                return Ok(UrlOutcome::SkippedLogin);
            }
            PageAnalysis::Page { extracted, links } => (extracted, links),
        };

        let snapshot_path = self.layout.relative(&self.snapshots.path_for(url));

        let mut attachments = Vec::with_capacity(links.attachments.len());
        for candidate in &links.attachments {
            let download = if self.may_download(&candidate.url) {
                if self.shutdown.is_triggered() {
                    return Ok(UrlOutcome::Interrupted);
                }
                self.download_attachment(candidate, url).await
            } else {
                None
            };
            attachments.push(AttachmentRecord {
                page_url: url.to_string(),
                page_snapshot: snapshot_path.clone(),
                link_text: candidate.text.clone(),
                url: candidate.url.to_string(),
                detected_at: timestamp(&Utc::now()),
                policy: self.rules.policy().as_str().to_string(),
                ext: candidate.ext.clone(),
                download,
            });
        }

        // Rows first, snapshot last: the snapshot marks the page as done
        if !attachments.is_empty() {
            self.storage.save_attachments(&attachments)?;
            self.attachments_detected += attachments.len() as u64;
            self.attachments_downloaded +=
                attachments.iter().filter(|a| a.is_downloaded()).count() as u64;
        }

        let mut extra = BTreeMap::new();
        if let Some(title_area) = &extracted.title_area {
            extra.insert("title_area".to_string(), title_area.clone());
        }
        if let Some(selector) = &extracted.matched_selector {
            extra.insert("content_selector".to_string(), selector.clone());
        }

        self.storage.save_page(&PageRecord {
            url: url.to_string(),
            snapshot_path,
            title: extracted.title.clone(),
            lastmod: self.lastmods.get(url.as_str()).cloned(),
            fetched_at: timestamp(&fetched_at),
            section: path_section(url),
            out_links: links.followable.len() as u64,
            text_length: extracted.text_length as u64,
            extra,
        })?;

        let document = build_minimal_snapshot_html(
            url.as_str(),
            &extracted.title,
            &extracted.content_html,
            &fetched_at,
        );
        self.snapshots.write(url, &document)?;
        self.scheduler.record_page();

        let enqueued = self.enqueue_links(&links.followable);
        tracing::info!(
            url = %url,
            title = %extracted.title,
            links = links.followable.len(),
            enqueued,
            attachments = attachments.len(),
            from_cache,
            "Fetched page"
        );

        Ok(UrlOutcome::Fetched)
    }

    /// Parses a page and takes out everything the pipeline needs
    fn analyze(&self, body: &str, url: &Url) -> PageAnalysis {
        let document = Html::parse_document(body);

        if let Some(marker) = self.login.login_marker(&document) {
            return PageAnalysis::Login {
                marker: marker.to_string(),
            };
        }

        let extracted = self
            .extractor
            .extract(&document, url.as_str(), self.redactor.as_ref());
        let links = self.classifier.classify(&document, url);
        PageAnalysis::Page { extracted, links }
    }

    fn enqueue_links(&mut self, links: &[Url]) -> usize {
        let mut enqueued = 0;
        for link in links {
            if self.gate.check(link).is_err() || self.snapshots.exists(link) {
                continue;
            }
            if self.scheduler.enqueue(link) {
                enqueued += 1;
            }
        }
        enqueued
    }

    fn may_download(&self, url: &Url) -> bool {
        if !self.rules.should_download(url) {
            return false;
        }
        if self.gate.is_on_site(url) && !self.gate.robots_permits(url) {
            tracing::debug!(url = %url, "Attachment disallowed by robots.txt");
            return false;
        }
        if !self.scheduler.has_request_budget() {
            tracing::debug!(url = %url, "Request budget exhausted, recording attachment metadata only");
            return false;
        }
        true
    }

    /// Downloads one attachment; a failed download or write leaves metadata only
    async fn download_attachment(
        &mut self,
        candidate: &AttachmentCandidate,
        page_url: &Url,
    ) -> Option<DownloadInfo> {
        let result = self.fetcher.fetch_binary(&candidate.url, page_url).await;
        self.scheduler.record_request();

        let file = match result {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!(url = %candidate.url, stage = "download", error = %e, "Attachment download failed");
                return None;
            }
        };

        let saved = match self.files.save(&candidate.url, &file) {
            Ok(saved) => saved,
            Err(e) => {
                tracing::warn!(
                    url = %candidate.url,
                    stage = "save",
                    file_name = %file.file_name,
                    error = %e,
                    "Attachment could not be written"
                );
                return None;
            }
        };
        tracing::debug!(
            url = %candidate.url,
            path = %saved.path.display(),
            bytes = saved.size_bytes,
            "Saved attachment"
        );

        Some(DownloadInfo {
            saved_path: self.layout.relative(&saved.path),
            size_bytes: saved.size_bytes,
            sha256: saved.sha256,
            content_type: file.content_type,
        })
    }

    fn defer_failed(&mut self, url: &Url) {
        if self.retry_failed {
            tracing::debug!(url = %url, "Deferring failed URL to the next run");
            self.scheduler.defer(url);
        }
    }
}

/// Forgets the snapshot and cached body of each target and queues it first
///
/// Targets keep their command-line order at the front of the queue. A target
/// the politeness gate rejects is skipped.
fn refresh_targets(
    targets: &[String],
    normalizer: &UrlNormalizer,
    gate: &PolitenessGate,
    snapshots: &SnapshotStore,
    fetcher: &Fetcher,
    state: &mut CrawlState,
) -> Result<usize> {
    let mut refreshed = 0;
    for raw in targets.iter().rev() {
        let url = normalizer.normalize_absolute(raw)?;
        if let Err(rejection) = gate.check(&url) {
            tracing::warn!(url = %url, reason = rejection.as_str(), "Refresh target rejected");
            continue;
        }

        let removed_snapshot = snapshots.remove(&url)?;
        let removed_cache = fetcher.evict(&url)?;
        state.requeue_front(&url);
        tracing::info!(url = %url, removed_snapshot, removed_cache, "Refreshing URL");
        refreshed += 1;
    }
    Ok(refreshed)
}

/// URL used for the robots.txt scheme: the start URL, else the sitemap
fn reference_url(config: &Config) -> Result<Url> {
    let raw = config
        .site
        .start_url
        .as_deref()
        .or(config.site.sitemap_index.as_deref())
        .ok_or_else(|| {
            crate::ConfigError::Validation("start-url or sitemap-index is required".to_string())
        })?;
    Ok(Url::parse(raw)?)
}

/// Statuses worth another attempt on a later run
fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    #[test]
    fn test_is_retryable_status() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(500));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(404));
        assert!(!is_retryable_status(403));
    }

    #[test]
    fn test_reference_url_prefers_start_url() {
        let config = parse_config(
            r#"
[site]
domain = "example.org"
start-url = "http://example.org/start"
sitemap-index = "https://example.org/sitemap.xml"

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0"
"#,
        )
        .unwrap();
        assert_eq!(reference_url(&config).unwrap().as_str(), "http://example.org/start");
    }

    #[test]
    fn test_reference_url_falls_back_to_sitemap() {
        let config = parse_config(
            r#"
[site]
domain = "example.org"
sitemap-index = "https://example.org/sitemap.xml"

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0"
"#,
        )
        .unwrap();
        assert_eq!(
            reference_url(&config).unwrap().as_str(),
            "https://example.org/sitemap.xml"
        );
    }
}
