use chrono::{DateTime, Utc};
use scrape_types::{Job, JobStatus, ScrapeError};
use sqlx::PgPool;
use std::str::FromStr;

use crate::pagination::{Page, Pagination};

/// CRUD access to `scrape_jobs`: insert, status transitions, and the
/// paginated/summary reads the HTTP surface and controller need.
#[derive(Clone)]
pub struct JobRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct JobRow {
    id: i64,
    user_id: Option<i64>,
    urls: serde_json::Value,
    status: String,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl JobRow {
    fn into_job(self) -> Result<Job, ScrapeError> {
        let urls: Vec<String> = serde_json::from_value(self.urls)
            .map_err(|e| ScrapeError::Internal(format!("corrupt job.urls column: {e}")))?;
        Ok(Job {
            id: self.id,
            user_id: self.user_id,
            urls,
            status: JobStatus::from_str(&self.status)?,
            created_at: self.created_at,
            completed_at: self.completed_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct JobSummaryRow {
    id: i64,
    status: String,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    total_urls: i64,
    media_found: i64,
}

impl JobSummaryRow {
    fn into_summary(self) -> Result<JobSummary, ScrapeError> {
        Ok(JobSummary {
            job_id: self.id,
            status: JobStatus::from_str(&self.status)?,
            total_urls: self.total_urls,
            media_found: self.media_found,
            created_at: self.created_at,
            completed_at: self.completed_at,
        })
    }
}

/// Summary row for job listing (no urls payload).
#[derive(Debug, Clone, serde::Serialize)]
pub struct JobSummary {
    pub job_id: i64,
    pub status: JobStatus,
    pub total_urls: i64,
    pub media_found: i64,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

const SUMMARY_QUERY: &str = r#"
    SELECT j.id as id, j.status as status, j.created_at as created_at,
           j.completed_at as completed_at,
           jsonb_array_length(j.urls) as total_urls,
           COALESCE((SELECT COUNT(*) FROM media m WHERE m.job_id = j.id), 0) as media_found
    FROM scrape_jobs j
"#;

impl JobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// `insert Job(...) returning id`
    pub async fn insert(&self, user_id: Option<i64>, urls: &[String]) -> Result<Job, ScrapeError> {
        let urls_json = serde_json::to_value(urls)
            .map_err(|e| ScrapeError::Internal(format!("failed to serialize urls: {e}")))?;

        let row: JobRow = sqlx::query_as(
            r#"
            INSERT INTO scrape_jobs (user_id, urls, status)
            VALUES ($1, $2, 'pending')
            RETURNING id, user_id, urls, status, created_at, completed_at
            "#,
        )
        .bind(user_id)
        .bind(urls_json)
        .fetch_one(&self.pool)
        .await?;

        row.into_job()
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Job>, ScrapeError> {
        let row: Option<JobRow> = sqlx::query_as(
            r#"SELECT id, user_id, urls, status, created_at, completed_at
               FROM scrape_jobs WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(JobRow::into_job).transpose()
    }

    /// `update Job set status=?, completed_at=? where id=?`
    ///
    /// Transitions are monotonic: a job already in a terminal state is
    /// never moved back to `processing`, and `completed_at` is set iff the
    /// new status is terminal (I1).
    pub async fn update_status(&self, id: i64, status: JobStatus) -> Result<(), ScrapeError> {
        let completed_at = status.is_terminal().then(Utc::now);
        sqlx::query(
            r#"
            UPDATE scrape_jobs
            SET status = $2, completed_at = $3
            WHERE id = $1 AND status NOT IN ('completed', 'failed')
            "#,
        )
        .bind(id)
        .bind(status.to_string())
        .bind(completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// `select Job by id with media[] and _count.media`
    pub async fn summary_by_id(&self, id: i64) -> Result<Option<JobSummary>, ScrapeError> {
        let query = format!("{SUMMARY_QUERY} WHERE j.id = $1");
        let row: Option<JobSummaryRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(JobSummaryRow::into_summary).transpose()
    }

    /// `select Job list paginated, ordered by created_at desc`
    pub async fn list(
        &self,
        user_id: Option<i64>,
        pagination: Pagination,
    ) -> Result<Page<JobSummary>, ScrapeError> {
        let total: (i64,) = sqlx::query_as(
            r#"SELECT COUNT(*) FROM scrape_jobs WHERE $1::BIGINT IS NULL OR user_id = $1"#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        let query = format!(
            "{SUMMARY_QUERY} WHERE $1::BIGINT IS NULL OR j.user_id = $1 \
             ORDER BY j.created_at DESC LIMIT $2 OFFSET $3"
        );
        let rows: Vec<JobSummaryRow> = sqlx::query_as(&query)
            .bind(user_id)
            .bind(pagination.limit)
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await?;

        let items = rows
            .into_iter()
            .map(JobSummaryRow::into_summary)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(items, total.0, pagination))
    }
}
