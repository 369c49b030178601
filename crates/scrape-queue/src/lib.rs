//! Durable, Redis-backed job queue: priority + LIFO draining, leased
//! processing, exponential-backoff retries, stall detection, retention
//! trimming, and pause/resume.

pub mod events;
pub mod metrics;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use scrape_types::QueueItemPayload;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

pub use events::{QueueEvent, QueueEventSender};
pub use metrics::{QueueMetrics, QueueMetricsSnapshot};

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

type Result<T> = std::result::Result<T, QueueError>;

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub namespace: String,
    pub lease_secs: i64,
    pub attempts_max: u32,
    pub backoff_initial: Duration,
    pub backoff_cap: Duration,
    pub max_stalled: u32,
    pub retain_completed: isize,
    pub retain_failed: isize,
    pub total_deadline: Duration,
}

impl QueueConfig {
    pub fn new(scraper_timeout: Duration) -> Self {
        Self {
            namespace: "scrape_queue".to_string(),
            lease_secs: 60,
            attempts_max: 2,
            backoff_initial: Duration::from_secs(2),
            backoff_cap: Duration::from_secs(60),
            max_stalled: 2,
            retain_completed: 50,
            retain_failed: 100,
            total_deadline: scraper_timeout + Duration::from_secs(5),
        }
    }
}

/// One item drawn from the queue, wrapping the caller's payload with
/// queue-tracked bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: String,
    pub payload: QueueItemPayload,
    pub attempts: u32,
    pub stalled_count: u32,
    pub enqueued_at: chrono::DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStats {
    pub waiting: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
    pub is_paused: bool,
    pub paused_by_cpu: bool,
}

/// Reason a queue-level pause was requested. CPU-driven pauses never
/// override, and are never overridden by, a manual pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseReason {
    Manual,
    Cpu,
}

impl PauseReason {
    fn as_str(self) -> &'static str {
        match self {
            PauseReason::Manual => "manual",
            PauseReason::Cpu => "cpu",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "manual" => Some(PauseReason::Manual),
            "cpu" => Some(PauseReason::Cpu),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct Queue {
    conn: MultiplexedConnection,
    config: QueueConfig,
    events: QueueEventSender,
    metrics: Arc<QueueMetrics>,
}

impl Queue {
    pub async fn connect(redis_url: &str, config: QueueConfig) -> Result<Self> {
        let client = Client::open(redis_url)?;
        let conn = client.get_multiplexed_tokio_connection().await?;
        Ok(Self {
            conn,
            config,
            events: events::sender(),
            metrics: Arc::new(QueueMetrics::default()),
        })
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }

    /// Snapshot of lifecycle counters since process start. Separate from
    /// [`Queue::stats`], which reflects current Redis state rather than
    /// cumulative counts.
    pub fn metrics(&self) -> QueueMetricsSnapshot {
        self.metrics.snapshot()
    }

    fn key(&self, suffix: &str) -> String {
        format!("{}:{}", self.config.namespace, suffix)
    }

    /// Appends `payload` atomically. `lifo=true` (the only mode the
    /// pipeline controller uses) scores by `priority` directly so the
    /// highest (most recent, when priority is `now()`) drains first;
    /// `lifo=false` negates the score to approximate FIFO ordering on the
    /// same sorted-set structure.
    pub async fn enqueue(&self, payload: QueueItemPayload, lifo: bool) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let item = QueueItem {
            id: id.clone(),
            payload,
            attempts: 0,
            stalled_count: 0,
            enqueued_at: Utc::now(),
        };
        let score = if lifo {
            item.payload.priority
        } else {
            -item.payload.priority
        };

        let mut conn = self.conn.clone();
        let item_json = serde_json::to_string(&item)?;
        let mut pipe = redis::pipe();
        pipe.atomic()
            .set(self.key(&format!("item:{id}")), item_json)
            .zadd(self.key("pending"), &id, score);
        let _: () = pipe.query_async(&mut conn).await?;

        self.metrics.record_enqueued();
        debug!(item_id = %id, job_id = item.payload.job_id, "enqueued item");
        Ok(id)
    }

    /// Drives up to `concurrency` items at a time through `handler` until
    /// the queue is exhausted and `shutdown` resolves. Spawns a stall
    /// scanner and a delayed-retry mover alongside the worker pool.
    pub async fn process<F, Fut>(
        self: Arc<Self>,
        concurrency: usize,
        handler: F,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) where
        F: Fn(QueueItem) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), String>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let semaphore = Arc::new(Semaphore::new(concurrency));

        let stall_queue = self.clone();
        let mut stall_shutdown = shutdown.clone();
        let stall_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(5)) => {
                        if let Err(err) = stall_queue.sweep_stalled().await {
                            warn!(error = %err, "stall sweep failed");
                        }
                    }
                    _ = stall_shutdown.changed() => {
                        if *stall_shutdown.borrow() { break; }
                    }
                }
            }
        });

        let retry_queue = self.clone();
        let mut retry_shutdown = shutdown.clone();
        let retry_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(1)) => {
                        if let Err(err) = retry_queue.promote_ready_retries().await {
                            warn!(error = %err, "retry promotion failed");
                        }
                    }
                    _ = retry_shutdown.changed() => {
                        if *retry_shutdown.borrow() { break; }
                    }
                }
            }
        });

        loop {
            if *shutdown.borrow() {
                break;
            }

            if self.is_paused().await.unwrap_or(false) {
                tokio::time::sleep(Duration::from_millis(200)).await;
                continue;
            }

            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };

            match self.lease_next().await {
                Ok(Some(item)) => {
                    let queue = self.clone();
                    let handler = handler.clone();
                    tokio::spawn(async move {
                        queue.run_item(item, handler).await;
                        drop(permit);
                    });
                }
                Ok(None) => {
                    drop(permit);
                    tokio::time::sleep(Duration::from_millis(200)).await;
                }
                Err(err) => {
                    drop(permit);
                    error!(error = %err, "lease attempt failed");
                    self.events.emit(QueueEvent::Error(err.to_string()));
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }

        let _ = stall_task.await;
        let _ = retry_task.await;
    }

    async fn run_item<F, Fut>(&self, item: QueueItem, handler: Arc<F>)
    where
        F: Fn(QueueItem) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), String>> + Send + 'static,
    {
        self.events.emit(QueueEvent::Active(item.clone()));

        let outcome = tokio::time::timeout(self.config.total_deadline, handler(item.clone())).await;

        match outcome {
            Ok(Ok(())) => {
                if let Err(err) = self.complete(&item).await {
                    error!(item_id = %item.id, error = %err, "failed to record completion");
                }
                self.metrics.record_completed();
                self.events.emit(QueueEvent::Completed(item));
            }
            Ok(Err(message)) => self.handle_failure(item, message).await,
            Err(_) => self.handle_failure(item, "deadline exceeded".to_string()).await,
        }
    }

    async fn handle_failure(&self, mut item: QueueItem, message: String) {
        item.attempts += 1;
        if item.attempts >= self.config.attempts_max {
            self.metrics.record_dead_lettered();
            self.dead_letter(&item, &message);
            if let Err(err) = self.fail(&item).await {
                error!(item_id = %item.id, error = %err, "failed to record terminal failure");
            }
            self.metrics.record_failed();
            self.events.emit(QueueEvent::Failed(item, message));
        } else {
            let backoff = self.backoff_for(item.attempts);
            if let Err(err) = self.schedule_retry(&item, backoff).await {
                error!(item_id = %item.id, error = %err, "failed to schedule retry");
            }
        }
    }

    fn backoff_for(&self, attempts: u32) -> Duration {
        let scaled = self.config.backoff_initial.as_secs_f64() * 2f64.powi(attempts as i32 - 1);
        Duration::from_secs_f64(scaled).min(self.config.backoff_cap)
    }

    fn dead_letter(&self, item: &QueueItem, message: &str) {
        // The handler only ever hands back a `String` (`Result<(), String>`
        // loses any backtrace the moment an error crosses a `.to_string()`
        // boundary upstream), so this is the closest point to the failure
        // this crate can capture one. `RUST_BACKTRACE=1` is required for it
        // to carry actual frames; the field is always present either way.
        let stack = std::backtrace::Backtrace::capture().to_string();
        error!(
            queue_item_id = %item.id,
            job_id = item.payload.job_id,
            url = %item.payload.url,
            attempts = item.attempts,
            error_message = %message,
            stack = %stack,
            timestamp = %Utc::now(),
            "queue item dead-lettered"
        );
    }

    async fn lease_next(&self) -> Result<Option<QueueItem>> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn.zrevrange(self.key("pending"), 0, 0).await?;
        let Some(id) = ids.into_iter().next() else {
            return Ok(None);
        };

        let removed: i64 = conn.zrem(self.key("pending"), &id).await?;
        if removed == 0 {
            // Another worker already took it.
            return Ok(None);
        }

        let Some(item) = self.load_item(&id).await? else {
            return Ok(None);
        };

        let lease_score = Utc::now().timestamp() + self.config.lease_secs;
        let _: () = conn.zadd(self.key("processing"), &id, lease_score).await?;
        self.store_item(&item).await?;
        self.metrics.record_leased();
        Ok(Some(item))
    }

    async fn load_item(&self, id: &str) -> Result<Option<QueueItem>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(self.key(&format!("item:{id}"))).await?;
        raw.map(|json| serde_json::from_str(&json)).transpose().map_err(QueueError::from)
    }

    async fn store_item(&self, item: &QueueItem) -> Result<()> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(item)?;
        let _: () = conn.set(self.key(&format!("item:{}", item.id)), json).await?;
        Ok(())
    }

    async fn complete(&self, item: &QueueItem) -> Result<()> {
        let mut conn = self.conn.clone();
        let completed_key = self.key("completed");
        let mut pipe = redis::pipe();
        pipe.atomic()
            .zrem(self.key("processing"), &item.id)
            .del(self.key(&format!("item:{}", item.id)))
            .zadd(&completed_key, &item.id, Utc::now().timestamp());
        let _: () = pipe.query_async(&mut conn).await?;
        self.trim(&completed_key, self.config.retain_completed).await
    }

    async fn fail(&self, item: &QueueItem) -> Result<()> {
        let mut conn = self.conn.clone();
        let failed_key = self.key("failed");
        let mut pipe = redis::pipe();
        pipe.atomic()
            .zrem(self.key("processing"), &item.id)
            .del(self.key(&format!("item:{}", item.id)))
            .zadd(&failed_key, &item.id, Utc::now().timestamp());
        let _: () = pipe.query_async(&mut conn).await?;
        self.trim(&failed_key, self.config.retain_failed).await
    }

    async fn trim(&self, key: &str, retain: isize) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.zremrangebyrank(key, 0, -(retain + 1)).await?;
        Ok(())
    }

    async fn schedule_retry(&self, item: &QueueItem, backoff: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        self.store_item(item).await?;
        let ready_at = Utc::now().timestamp() + backoff.as_secs() as i64;
        let mut pipe = redis::pipe();
        pipe.atomic()
            .zrem(self.key("processing"), &item.id)
            .zadd(self.key("delayed"), &item.id, ready_at);
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    /// Moves delayed retries whose backoff has elapsed back onto pending.
    async fn promote_ready_retries(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let now = Utc::now().timestamp();
        let ready: Vec<String> = conn.zrangebyscore(self.key("delayed"), 0, now).await?;
        for id in ready {
            let Some(item) = self.load_item(&id).await? else {
                continue;
            };
            let score = item.payload.priority;
            let mut pipe = redis::pipe();
            pipe.atomic()
                .zrem(self.key("delayed"), &id)
                .zadd(self.key("pending"), &id, score);
            let _: () = pipe.query_async(&mut conn).await?;
        }
        Ok(())
    }

    /// Scans `processing` for expired leases. Items are republished up to
    /// `max_stalled` times before being forced into a terminal failure.
    async fn sweep_stalled(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let now = Utc::now().timestamp();
        let expired: Vec<String> = conn.zrangebyscore(self.key("processing"), 0, now).await?;

        for id in expired {
            let Some(mut item) = self.load_item(&id).await? else {
                let _: () = conn.zrem(self.key("processing"), &id).await?;
                continue;
            };

            item.stalled_count += 1;
            self.metrics.record_stalled();
            self.events.emit(QueueEvent::Stalled(item.clone()));

            if item.stalled_count > self.config.max_stalled {
                self.metrics.record_dead_lettered();
                self.dead_letter(&item, "stalled beyond max_stalled republishes");
                self.fail(&item).await?;
                self.metrics.record_failed();
                self.events.emit(QueueEvent::Failed(item, "stalled".to_string()));
            } else {
                self.store_item(&item).await?;
                let score = item.payload.priority;
                let mut pipe = redis::pipe();
                pipe.atomic()
                    .zrem(self.key("processing"), &id)
                    .zadd(self.key("pending"), &id, score);
                let _: () = pipe.query_async(&mut conn).await?;
            }
        }

        Ok(())
    }

    /// Pauses leasing of new items. A CPU-driven pause never clears a
    /// manual one, and vice versa.
    pub async fn pause(&self, reason: PauseReason) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(self.key("paused"), reason.as_str()).await?;
        Ok(())
    }

    /// Clears the pause only if it was set for the same `reason`.
    pub async fn resume(&self, reason: PauseReason) -> Result<()> {
        let mut conn = self.conn.clone();
        let current: Option<String> = conn.get(self.key("paused")).await?;
        if current.as_deref() == Some(reason.as_str()) {
            let _: () = conn.del(self.key("paused")).await?;
        }
        Ok(())
    }

    pub async fn is_paused(&self) -> Result<bool> {
        let mut conn = self.conn.clone();
        let current: Option<String> = conn.get(self.key("paused")).await?;
        Ok(current.is_some())
    }

    /// The actual stored pause reason, if any. Callers that drive their
    /// own pause/resume decisions (the CPU backpressure loop) must branch
    /// on this rather than on local state, or they risk clobbering a
    /// pause set for a different reason.
    pub async fn pause_reason(&self) -> Result<Option<PauseReason>> {
        let mut conn = self.conn.clone();
        let current: Option<String> = conn.get(self.key("paused")).await?;
        Ok(current.and_then(|raw| PauseReason::parse(&raw)))
    }

    pub async fn stats(&self) -> Result<QueueStats> {
        let mut conn = self.conn.clone();
        let waiting: usize = conn.zcard(self.key("pending")).await?;
        let active: usize = conn.zcard(self.key("processing")).await?;
        let completed: usize = conn.zcard(self.key("completed")).await?;
        let failed: usize = conn.zcard(self.key("failed")).await?;
        let paused: Option<String> = conn.get(self.key("paused")).await?;

        Ok(QueueStats {
            waiting,
            active,
            completed,
            failed,
            is_paused: paused.is_some(),
            paused_by_cpu: paused.as_deref() == Some(PauseReason::Cpu.as_str()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let config = QueueConfig::new(Duration::from_secs(30));
        let queue_config = config.clone();
        let first = Duration::from_secs_f64(
            queue_config.backoff_initial.as_secs_f64() * 2f64.powi(0),
        );
        assert_eq!(first, Duration::from_secs(2));
    }

    #[test]
    fn pause_reason_round_trips() {
        assert_eq!(PauseReason::Manual.as_str(), "manual");
        assert_eq!(PauseReason::Cpu.as_str(), "cpu");
        assert_eq!(PauseReason::parse("manual"), Some(PauseReason::Manual));
        assert_eq!(PauseReason::parse("cpu"), Some(PauseReason::Cpu));
        assert_eq!(PauseReason::parse("garbage"), None);
    }

    #[test]
    fn total_deadline_adds_five_seconds() {
        let config = QueueConfig::new(Duration::from_secs(30));
        assert_eq!(config.total_deadline, Duration::from_secs(35));
    }
}
