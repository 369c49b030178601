use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};

use crate::dto::{ok, ok_page};
use crate::errors::{ApiError, ApiResult};
use crate::state::AppState;
use crate::validation::{parse_media_type, parse_pagination, PageQuery};
use scrape_cache::keys;
use scrape_db::MediaFilter;

#[derive(Debug, Serialize)]
pub struct MediaView {
    pub id: i64,
    pub media_url: String,
    #[serde(rename = "type")]
    pub media_type: scrape_types::MediaType,
    pub title: Option<String>,
    pub source_url: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub job_id: i64,
}

impl From<scrape_types::Media> for MediaView {
    fn from(m: scrape_types::Media) -> Self {
        Self {
            id: m.id,
            media_url: m.media_url,
            media_type: m.media_type,
            title: m.title,
            source_url: m.source_url,
            created_at: m.created_at,
            job_id: m.job_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MediaListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    #[serde(rename = "type")]
    pub media_type: Option<String>,
    pub search: Option<String>,
}

/// `GET /api/media?page&limit&type&search`
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<MediaListQuery>,
) -> ApiResult<impl IntoResponse> {
    let pagination = parse_pagination(&PageQuery {
        page: query.page,
        limit: query.limit,
    })?;
    let media_type = parse_media_type(query.media_type.as_deref())?;

    let cache_key = keys::media_list_key(
        pagination.page,
        pagination.limit,
        media_type.map(|t| t.to_string()).as_deref(),
        query.search.as_deref(),
    );

    if let Some(cached) = state.cache.get::<serde_json::Value>(&cache_key).await {
        return Ok(axum::Json(cached));
    }

    let filter = MediaFilter {
        media_type,
        search: query.search.clone(),
    };
    let page = state.controller.media_filter(filter, pagination).await?;
    let page = page.map_items(MediaView::from);

    let body = serde_json::json!({
        "success": true,
        "data": page.items,
        "pagination": {
            "total": page.total,
            "page": page.page,
            "limit": page.limit,
            "totalPages": page.total_pages,
        }
    });
    state
        .cache
        .set(&cache_key, &body, std::time::Duration::from_secs(60))
        .await;

    Ok(axum::Json(body))
}

/// `GET /api/media/stats`
pub async fn stats(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let stats = state
        .cache
        .get_or_set(keys::MEDIA_STATS_KEY, std::time::Duration::from_secs(30), || async {
            state.media.stats().await.unwrap_or_default()
        })
        .await;

    Ok(ok(stats))
}

#[derive(Debug, Serialize)]
pub struct MediaDetail {
    #[serde(flatten)]
    pub media: MediaView,
    pub job: MediaJobSummary,
}

#[derive(Debug, Serialize)]
pub struct MediaJobSummary {
    pub job_id: i64,
    pub status: scrape_types::JobStatus,
    pub total_urls: i64,
}

/// `GET /api/media/:id`
pub async fn get(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<impl IntoResponse> {
    let media = state
        .media
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("media".to_string()))?;

    let job = state
        .jobs
        .find_by_id(media.job_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("job".to_string()))?;

    Ok(ok(MediaDetail {
        job: MediaJobSummary {
            job_id: job.id,
            status: job.status,
            total_urls: job.urls.len() as i64,
        },
        media: MediaView::from(media),
    }))
}
