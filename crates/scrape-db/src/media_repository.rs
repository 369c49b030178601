use chrono::{DateTime, Utc};
use scrape_types::{Media, MediaType, ScrapeError};
use sqlx::PgPool;
use std::str::FromStr;

use crate::pagination::{Page, Pagination};

/// CRUD access to `media`. Inserts are `ON CONFLICT (job_id, media_url) DO
/// NOTHING` so at-least-once delivery from the queue never duplicates a row
/// (I4); retries of an already-processed `(job_id, url)` are a no-op.
#[derive(Clone)]
pub struct MediaRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct MediaRow {
    id: i64,
    job_id: i64,
    source_url: String,
    media_url: String,
    r#type: String,
    title: Option<String>,
    created_at: DateTime<Utc>,
}

impl MediaRow {
    fn into_media(self) -> Result<Media, ScrapeError> {
        Ok(Media {
            id: self.id,
            job_id: self.job_id,
            source_url: self.source_url,
            media_url: self.media_url,
            media_type: MediaType::from_str(&self.r#type)?,
            title: self.title,
            created_at: self.created_at,
        })
    }
}

/// One candidate asset awaiting insertion.
#[derive(Debug, Clone)]
pub struct NewMedia {
    pub source_url: String,
    pub media_url: String,
    pub media_type: MediaType,
    pub title: Option<String>,
}

/// Filters accepted by `GET /api/media`.
#[derive(Debug, Clone, Default)]
pub struct MediaFilter {
    pub media_type: Option<MediaType>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct MediaStats {
    pub total: i64,
    pub images: i64,
    pub videos: i64,
    pub last24h: i64,
}

impl MediaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// `insert Media(...) on conflict (job_id, media_url) do nothing`.
    /// Returns the rows that were actually inserted (duplicates collapse
    /// silently under the `(job_id, media_url)` unique constraint).
    pub async fn insert_many(
        &self,
        job_id: i64,
        items: &[NewMedia],
    ) -> Result<Vec<Media>, ScrapeError> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let mut inserted = Vec::with_capacity(items.len());
        let mut tx = self.pool.begin().await?;

        for item in items {
            let row: Option<MediaRow> = sqlx::query_as(
                r#"
                INSERT INTO media (job_id, source_url, media_url, type, title)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (job_id, media_url) DO NOTHING
                RETURNING id, job_id, source_url, media_url, type, title, created_at
                "#,
            )
            .bind(job_id)
            .bind(&item.source_url)
            .bind(&item.media_url)
            .bind(item.media_type.to_string())
            .bind(&item.title)
            .fetch_optional(&mut *tx)
            .await?;

            if let Some(row) = row {
                inserted.push(row.into_media()?);
            }
        }

        tx.commit().await?;
        Ok(inserted)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Media>, ScrapeError> {
        let row: Option<MediaRow> = sqlx::query_as(
            r#"SELECT id, job_id, source_url, media_url, type, title, created_at
               FROM media WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(MediaRow::into_media).transpose()
    }

    /// `select Media with filters, paginated, ordered by created_at desc`
    pub async fn list(
        &self,
        filter: &MediaFilter,
        pagination: Pagination,
    ) -> Result<Page<Media>, ScrapeError> {
        let type_filter = filter.media_type.map(|t| t.to_string());
        let search_filter = filter.search.as_ref().map(|s| format!("%{}%", s.to_lowercase()));

        let total: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM media
            WHERE ($1::TEXT IS NULL OR type = $1)
              AND ($2::TEXT IS NULL OR LOWER(title) LIKE $2 OR LOWER(source_url) LIKE $2)
            "#,
        )
        .bind(&type_filter)
        .bind(&search_filter)
        .fetch_one(&self.pool)
        .await?;

        let rows: Vec<MediaRow> = sqlx::query_as(
            r#"
            SELECT id, job_id, source_url, media_url, type, title, created_at
            FROM media
            WHERE ($1::TEXT IS NULL OR type = $1)
              AND ($2::TEXT IS NULL OR LOWER(title) LIKE $2 OR LOWER(source_url) LIKE $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(&type_filter)
        .bind(&search_filter)
        .bind(pagination.limit)
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(MediaRow::into_media)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(items, total.0, pagination))
    }

    /// Aggregate counts for `GET /api/media/stats`.
    pub async fn stats(&self) -> Result<MediaStats, ScrapeError> {
        let row: (i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) as total,
                COUNT(*) FILTER (WHERE type = 'image') as images,
                COUNT(*) FILTER (WHERE type = 'video') as videos,
                COUNT(*) FILTER (WHERE created_at >= now() - INTERVAL '24 hours') as last24h
            FROM media
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(MediaStats {
            total: row.0,
            images: row.1,
            videos: row.2,
            last24h: row.3,
        })
    }
}
