use dashmap::DashMap;
use scrape_db::JobRepository;
use scrape_types::{JobStatus, ScrapeError};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
struct Progress {
    total: i64,
    completed: i64,
    failed: i64,
}

/// The write side of the tracker's terminal transition, pulled out as a
/// trait so the counting logic can be driven by a fake in tests instead of
/// a live `JobRepository`/Postgres connection.
pub trait JobStatusWriter: Send + Sync {
    async fn update_status(&self, job_id: i64, status: JobStatus) -> Result<(), ScrapeError>;
}

impl JobStatusWriter for JobRepository {
    async fn update_status(&self, job_id: i64, status: JobStatus) -> Result<(), ScrapeError> {
        JobRepository::update_status(self, job_id, status).await
    }
}

/// Per-job outcome counters, keyed by `job_id`. Every mutation goes
/// through `DashMap`'s entry API so concurrent workers racing on the same
/// job never lose an update (I5).
///
/// Counters only move on the queue's terminal, per-job signals (a URL's
/// retries are exhausted, or it succeeded) — never on an individual
/// retryable attempt. See `Controller::drive_tracker_events`.
pub struct JobProgressTracker<R: JobStatusWriter = JobRepository> {
    jobs: DashMap<i64, Progress>,
    repo: R,
}

impl<R: JobStatusWriter> JobProgressTracker<R> {
    pub fn new(repo: R) -> Self {
        Self {
            jobs: DashMap::new(),
            repo,
        }
    }

    /// Registers a job the first time any of its items goes active.
    pub async fn ensure_registered(&self, job_id: i64, total_urls: i64) {
        self.jobs.entry(job_id).or_insert(Progress {
            total: total_urls,
            completed: 0,
            failed: 0,
        });
    }

    /// Records a successful outcome, closing the job out when every URL
    /// has reported in.
    pub async fn record_completed(&self, job_id: i64) -> Result<(), ScrapeError> {
        let finished = {
            let mut entry = self.jobs.entry(job_id).or_default();
            entry.completed += 1;
            entry.completed + entry.failed >= entry.total && entry.total > 0
        };

        if finished {
            self.finish(job_id, JobStatus::Completed).await?;
        }
        Ok(())
    }

    /// Records a terminal failure for one URL. The job itself only turns
    /// `failed` if every URL failed; otherwise it's `completed` once all
    /// outcomes are in.
    pub async fn record_failed(&self, job_id: i64) -> Result<(), ScrapeError> {
        let outcome = {
            let mut entry = self.jobs.entry(job_id).or_default();
            entry.failed += 1;
            let done = entry.completed + entry.failed >= entry.total && entry.total > 0;
            done.then(|| {
                if entry.failed == entry.total {
                    JobStatus::Failed
                } else {
                    JobStatus::Completed
                }
            })
        };

        if let Some(status) = outcome {
            self.finish(job_id, status).await?;
        }
        Ok(())
    }

    async fn finish(&self, job_id: i64, status: JobStatus) -> Result<(), ScrapeError> {
        self.repo.update_status(job_id, status).await?;
        self.jobs.remove(&job_id);
        debug!(job_id, ?status, "job reached terminal state, tracker cleared");
        Ok(())
    }

    pub fn is_tracking(&self, job_id: i64) -> bool {
        self.jobs.contains_key(&job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn progress_defaults_to_zero() {
        let p = Progress::default();
        assert_eq!(p.total, 0);
        assert_eq!(p.completed, 0);
        assert_eq!(p.failed, 0);
    }

    #[derive(Default)]
    struct RecordingWriter {
        writes: Mutex<Vec<(i64, JobStatus)>>,
    }

    impl JobStatusWriter for RecordingWriter {
        async fn update_status(&self, job_id: i64, status: JobStatus) -> Result<(), ScrapeError> {
            self.writes.lock().unwrap().push((job_id, status));
            Ok(())
        }
    }

    impl RecordingWriter {
        fn writes(&self) -> Vec<(i64, JobStatus)> {
            self.writes.lock().unwrap().clone()
        }
    }

    /// Every URL in the job permanently fails: the job's terminal status
    /// must be `Failed`, written exactly once.
    #[tokio::test]
    async fn all_urls_failed_marks_job_failed() {
        let tracker = JobProgressTracker::new(RecordingWriter::default());
        tracker.ensure_registered(1, 2).await;

        tracker.record_failed(1).await.unwrap();
        assert!(tracker.is_tracking(1), "job still has one outcome pending");
        tracker.record_failed(1).await.unwrap();

        assert!(!tracker.is_tracking(1));
        assert_eq!(tracker.repo.writes(), vec![(1, JobStatus::Failed)]);
    }

    /// One URL succeeds, one permanently fails: the job is `Completed`,
    /// not `Failed` — a single failure never drags down the whole job.
    #[tokio::test]
    async fn partial_failure_still_completes_the_job() {
        let tracker = JobProgressTracker::new(RecordingWriter::default());
        tracker.ensure_registered(2, 2).await;

        tracker.record_completed(2).await.unwrap();
        tracker.record_failed(2).await.unwrap();

        assert!(!tracker.is_tracking(2));
        assert_eq!(tracker.repo.writes(), vec![(2, JobStatus::Completed)]);
    }

    /// `record_failed`/`record_completed` are only ever reached through a
    /// queue-emitted terminal event; a retryable attempt never calls
    /// either, so the job can't get wedged at a status a later retry then
    /// contradicts.
    #[tokio::test]
    async fn retry_then_success_completes_without_an_intervening_failed_write() {
        let tracker = JobProgressTracker::new(RecordingWriter::default());
        tracker.ensure_registered(3, 1).await;

        // The retryable attempt that preceded this never touched the
        // tracker at all — only the eventual terminal outcome does.
        tracker.record_completed(3).await.unwrap();

        assert_eq!(tracker.repo.writes(), vec![(3, JobStatus::Completed)]);
    }
}
