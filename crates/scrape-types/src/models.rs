use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a [`Job`]. Transitions are monotonic:
/// `Pending -> Processing -> {Completed | Failed}`; re-entry into
/// `Processing` from a terminal state is forbidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for JobStatus {
    type Err = crate::error::ScrapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(crate::error::ScrapeError::Internal(format!(
                "invalid job status in storage: {other}"
            ))),
        }
    }
}

/// One user submission: an ordered, de-duplicated set of URLs to scrape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub user_id: Option<i64>,
    pub urls: Vec<String>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// `completed_at` is set iff `status` is terminal.
    pub fn invariant_holds(&self) -> bool {
        self.completed_at.is_some() == self.status.is_terminal()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for MediaType {
    type Err = crate::error::ScrapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(MediaType::Image),
            "video" => Ok(MediaType::Video),
            other => Err(crate::error::ScrapeError::Validation(format!(
                "invalid media type: {other}"
            ))),
        }
    }
}

/// One extracted asset, scoped to the job and source page it came from.
/// `(job_id, media_url)` is unique; duplicate inserts are silently skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Media {
    pub id: i64,
    pub job_id: i64,
    pub source_url: String,
    pub media_url: String,
    pub media_type: MediaType,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Authentication principal. No lifecycle beyond seed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Payload carried by a queue item: one URL belonging to one job.
/// Priority is `now()`-based so that, combined with LIFO delivery within a
/// priority class, the most recently submitted job's URLs drain first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItemPayload {
    pub job_id: i64,
    pub url: String,
    pub priority: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_at_invariant() {
        let base = Job {
            id: 1,
            user_id: None,
            urls: vec!["https://example.com".into()],
            status: JobStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
        };
        assert!(base.invariant_holds());

        let mut processing = base.clone();
        processing.status = JobStatus::Processing;
        assert!(processing.invariant_holds());

        let mut bad = base.clone();
        bad.status = JobStatus::Completed;
        assert!(!bad.invariant_holds());

        let mut good = base;
        good.status = JobStatus::Completed;
        good.completed_at = Some(Utc::now());
        assert!(good.invariant_holds());
    }

    #[test]
    fn media_type_parses() {
        assert_eq!("image".parse::<MediaType>().unwrap(), MediaType::Image);
        assert_eq!("video".parse::<MediaType>().unwrap(), MediaType::Video);
        assert!("audio".parse::<MediaType>().is_err());
    }
}
