use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use scrape_cache::{keys, CacheClient};
use scrape_db::job_repository::JobSummary;
use scrape_db::media_repository::NewMedia;
use scrape_db::{JobRepository, MediaFilter, MediaRepository, Page, Pagination};
use scrape_extract::MediaCandidate;
use scrape_headless::{BrowserWorker, RenderOptions};
use scrape_queue::{Queue, QueueEvent, QueueItem};
use scrape_types::{JobStatus, Media, QueueItemPayload, ScrapeError};
use sysinfo::System;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::router;
use crate::tracker::JobProgressTracker;

/// Per-item heap thresholds, sampled unconditionally around every queue
/// item, independent of the renderer's own thresholds in `scrape-headless`
/// (which only fire when the router actually falls back to the headless
/// path).
const PRE_ROUTE_MEMORY_THRESHOLD_MB: u64 = 350;
const POST_SUCCESS_MEMORY_THRESHOLD_MB: u64 = 400;

fn sample_used_memory_mb() -> u64 {
    let mut system = System::new();
    system.refresh_memory();
    system.used_memory() / 1024 / 1024
}

/// Outcome of `enqueue_job`, mirroring the `POST /api/scrape` response
/// body.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EnqueueOutcome {
    pub job_id: i64,
    pub status: JobStatus,
    pub total_urls: i64,
    pub duplicates_removed: i64,
}

#[derive(Clone)]
pub struct ControllerConfig {
    pub scraper_timeout: Duration,
    pub render_options: RenderOptions,
}

/// Glues the queue, repositories, cache, and router together into the
/// worker-handler closures `scrape-queue::Queue::process` drives.
pub struct Controller {
    queue: Arc<Queue>,
    jobs: JobRepository,
    media: MediaRepository,
    cache: CacheClient,
    client: Client,
    config: ControllerConfig,
    tracker: Arc<JobProgressTracker>,
}

impl Controller {
    pub fn new(
        queue: Arc<Queue>,
        jobs: JobRepository,
        media: MediaRepository,
        cache: CacheClient,
        client: Client,
        config: ControllerConfig,
    ) -> Self {
        let tracker = Arc::new(JobProgressTracker::new(jobs.clone()));
        Self {
            queue,
            jobs,
            media,
            cache,
            client,
            config,
            tracker,
        }
    }

    pub fn tracker(&self) -> Arc<JobProgressTracker> {
        self.tracker.clone()
    }

    pub fn queue(&self) -> Arc<Queue> {
        self.queue.clone()
    }

    /// De-duplicates `urls` in submission order, inserts the job, and
    /// fans out one queue item per unique URL with `priority=now()` and
    /// `lifo=true`.
    pub async fn enqueue_job(
        &self,
        user_id: Option<i64>,
        urls: Vec<String>,
    ) -> Result<EnqueueOutcome, ScrapeError> {
        let original_count = urls.len() as i64;
        let mut seen = std::collections::HashSet::new();
        let deduped: Vec<String> = urls.into_iter().filter(|u| seen.insert(u.clone())).collect();
        let duplicates_removed = original_count - deduped.len() as i64;

        let job = self.jobs.insert(user_id, &deduped).await?;

        for url in &deduped {
            let payload = QueueItemPayload {
                job_id: job.id,
                url: url.clone(),
                priority: Utc::now().timestamp_nanos_opt().unwrap_or_else(|| Utc::now().timestamp()),
            };
            self.queue.enqueue(payload, true).await.map_err(|e| {
                ScrapeError::Internal(format!("failed to enqueue queue item: {e}"))
            })?;
        }

        info!(job_id = job.id, total_urls = deduped.len(), "job enqueued");

        Ok(EnqueueOutcome {
            job_id: job.id,
            status: job.status,
            total_urls: deduped.len() as i64,
            duplicates_removed,
        })
    }

    /// The worker handler passed to `Queue::process`. Runs one queue item
    /// to completion: cache lookup, extraction routing, persistence, and
    /// cache invalidation.
    ///
    /// Does not touch `tracker` directly — `Queue::process` only learns
    /// whether *this attempt* succeeded, not whether the item has
    /// exhausted its retries, so this can't tell a transient failure from
    /// a terminal one. `drive_tracker_events` consumes the queue's own
    /// terminal `Completed`/`Failed` events instead.
    pub async fn handle_item(
        &self,
        item: QueueItem,
        browser: &mut BrowserWorker,
    ) -> Result<(), String> {
        let job_id = item.payload.job_id;
        let url = item.payload.url.clone();

        self.transition_to_processing(job_id).await.map_err(|e| e.to_string())?;

        self.maybe_gc_hint_before_route(browser).await;

        let cache_key = keys::url_key(&url);
        if let Some(cached) = self.cache.get::<Vec<MediaCandidate>>(&cache_key).await {
            debug!(job_id, url, "cache hit, skipping network fetch");
            self.persist_and_finish(job_id, &url, cached).await.map_err(|e| e.to_string())?;
            self.maybe_gc_hint_after_success(browser).await;
            return Ok(());
        }

        let result = router::route(
            &self.client,
            browser,
            &url,
            self.config.scraper_timeout,
            self.config.render_options,
        )
        .await;

        if !result.success {
            return Err(result.error.unwrap_or_else(|| "extraction failed".to_string()));
        }

        if !result.media.is_empty() {
            self.cache
                .set(&cache_key, &result.media, Duration::from_secs(3600))
                .await;
        }

        self.persist_and_finish(job_id, &url, result.media)
            .await
            .map_err(|e| e.to_string())?;
        self.maybe_gc_hint_after_success(browser).await;
        Ok(())
    }

    /// Per-item pre-fetch heap sample. Runs unconditionally — before the
    /// cache check as well as before a fresh extraction — since a cache
    /// hit still does a relational insert downstream, and this check is
    /// meant to run once per item regardless of which path it takes.
    async fn maybe_gc_hint_before_route(&self, browser: &BrowserWorker) {
        let used_mb = sample_used_memory_mb();
        if used_mb > PRE_ROUTE_MEMORY_THRESHOLD_MB {
            warn!(used_mb, threshold_mb = PRE_ROUTE_MEMORY_THRESHOLD_MB, "low memory before scrape");
            browser.issue_gc_hint().await;
        }
    }

    /// Per-item post-success heap sample, run after every `persist_and_finish`
    /// call regardless of which path (cache hit or fresh extraction) reached it.
    async fn maybe_gc_hint_after_success(&self, browser: &BrowserWorker) {
        let used_mb = sample_used_memory_mb();
        if used_mb > POST_SUCCESS_MEMORY_THRESHOLD_MB {
            warn!(used_mb, threshold_mb = POST_SUCCESS_MEMORY_THRESHOLD_MB, "high memory after successful scrape");
            browser.issue_gc_hint().await;
        }
    }

    /// Drives `tracker` off the queue's own event stream rather than the
    /// per-attempt result of `handle_item`. `QueueEvent::Active` fires once
    /// per lease (including retries) so registration stays idempotent;
    /// `Completed`/`Failed` are only ever emitted by `scrape-queue` on a
    /// job's terminal outcome for that item (retries are retried silently,
    /// never surfaced as `Failed`), so this never risks closing a job out
    /// on a failure that a later retry could still overturn.
    pub async fn drive_tracker_events(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut events = self.queue.subscribe();
        loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        Ok(event) => self.apply_tracker_event(event).await,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "tracker event consumer lagged, some job outcomes may be delayed");
                        }
                        Err(RecvError::Closed) => return,
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() { return; }
                }
            }
        }
    }

    async fn apply_tracker_event(&self, event: QueueEvent) {
        match tracker_action_for(&event) {
            TrackerAction::Register { job_id } => {
                let total = self.total_urls_for(job_id).await;
                self.tracker.ensure_registered(job_id, total).await;
            }
            TrackerAction::Completed { job_id } => {
                if let Err(err) = self.tracker.record_completed(job_id).await {
                    warn!(job_id, error = %err, "failed to record job completion");
                }
            }
            TrackerAction::Failed { job_id } => {
                if let Err(err) = self.tracker.record_failed(job_id).await {
                    warn!(job_id, error = %err, "failed to record job failure");
                }
            }
            TrackerAction::None => {}
        }
    }

    async fn total_urls_for(&self, job_id: i64) -> i64 {
        match self.jobs.find_by_id(job_id).await {
            Ok(Some(job)) => job.urls.len() as i64,
            _ => 0,
        }
    }

    async fn transition_to_processing(&self, job_id: i64) -> Result<(), ScrapeError> {
        // Idempotent: the repository's guard clause only moves rows out
        // of a non-terminal state, so re-entering `processing` is a no-op.
        self.jobs.update_status(job_id, JobStatus::Processing).await
    }

    async fn persist_and_finish(
        &self,
        job_id: i64,
        source_url: &str,
        candidates: Vec<MediaCandidate>,
    ) -> Result<Vec<Media>, ScrapeError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let items: Vec<NewMedia> = candidates
            .into_iter()
            .map(|c| NewMedia {
                source_url: source_url.to_string(),
                media_url: c.media_url,
                media_type: c.media_type,
                title: c.title,
            })
            .collect();

        let inserted = self.media.insert_many(job_id, &items).await?;
        if !inserted.is_empty() {
            self.cache.clear_pattern(keys::MEDIA_CACHE_WILDCARD).await;
            self.cache.delete(keys::MEDIA_STATS_KEY).await;
        }
        Ok(inserted)
    }

    pub async fn job_summary(&self, job_id: i64) -> Result<Option<JobSummary>, ScrapeError> {
        self.jobs.summary_by_id(job_id).await
    }

    pub async fn list_jobs(
        &self,
        user_id: Option<i64>,
        pagination: Pagination,
    ) -> Result<Page<JobSummary>, ScrapeError> {
        self.jobs.list(user_id, pagination).await
    }

    pub async fn media_filter(
        &self,
        filter: MediaFilter,
        pagination: Pagination,
    ) -> Result<Page<Media>, ScrapeError> {
        self.media.list(&filter, pagination).await
    }

    /// Blocks until the queue's in-flight leases drain or `deadline`
    /// elapses, whichever comes first.
    pub async fn drain(&self, deadline: Duration) {
        let start = tokio::time::Instant::now();
        loop {
            match self.queue.stats().await {
                Ok(stats) if stats.active == 0 => return,
                Ok(_) => {}
                Err(err) => {
                    warn!(error = %err, "failed to read queue stats during drain");
                    return;
                }
            }
            if start.elapsed() >= deadline {
                warn!("drain deadline exceeded, proceeding with shutdown");
                return;
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    }
}

/// What `drive_tracker_events` should do for one queue event, pulled out
/// as a pure function so the dispatch is testable without a live queue or
/// database. `Failed`/`Completed` are the only variants `scrape-queue`
/// ever emits as terminal for an item; a retry never reaches here at all.
#[derive(Debug, PartialEq, Eq)]
enum TrackerAction {
    None,
    Register { job_id: i64 },
    Completed { job_id: i64 },
    Failed { job_id: i64 },
}

fn tracker_action_for(event: &QueueEvent) -> TrackerAction {
    match event {
        QueueEvent::Active(item) => TrackerAction::Register { job_id: item.payload.job_id },
        QueueEvent::Completed(item) => TrackerAction::Completed { job_id: item.payload.job_id },
        QueueEvent::Failed(item, _) => TrackerAction::Failed { job_id: item.payload.job_id },
        QueueEvent::Stalled(_) | QueueEvent::Error(_) => TrackerAction::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(job_id: i64) -> QueueItem {
        QueueItem {
            id: "item-1".to_string(),
            payload: QueueItemPayload {
                job_id,
                url: "https://example.com".to_string(),
                priority: 0,
            },
            attempts: 1,
            stalled_count: 0,
            enqueued_at: Utc::now(),
        }
    }

    #[test]
    fn active_event_registers_the_job() {
        assert_eq!(
            tracker_action_for(&QueueEvent::Active(item(7))),
            TrackerAction::Register { job_id: 7 }
        );
    }

    #[test]
    fn completed_event_records_a_success() {
        assert_eq!(
            tracker_action_for(&QueueEvent::Completed(item(7))),
            TrackerAction::Completed { job_id: 7 }
        );
    }

    /// `QueueEvent::Failed` is only constructed by `scrape-queue` once
    /// `attempts >= attempts_max` (or the stall-republish cap is hit) — it
    /// carries no per-attempt variant, so there is no event this dispatch
    /// could receive that represents a still-retryable failure. This is
    /// the regression test for a job permanently failing on a transient
    /// error that a later retry then silently overturned.
    #[test]
    fn failed_event_is_always_terminal() {
        assert_eq!(
            tracker_action_for(&QueueEvent::Failed(item(7), "boom".to_string())),
            TrackerAction::Failed { job_id: 7 }
        );
    }

    #[test]
    fn stalled_and_error_events_do_not_touch_the_tracker() {
        assert_eq!(tracker_action_for(&QueueEvent::Stalled(item(7))), TrackerAction::None);
        assert_eq!(
            tracker_action_for(&QueueEvent::Error("redis down".to_string())),
            TrackerAction::None
        );
    }
}
