use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};

use crate::dto::{ok, ok_page};
use crate::errors::{ApiError, ApiResult};
use crate::state::AppState;
use crate::validation::{parse_pagination, PageQuery};

#[derive(Debug, Serialize)]
pub struct JobListItem {
    pub job_id: i64,
    pub status: scrape_types::JobStatus,
    pub total_urls: i64,
    pub media_found: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Serialize)]
pub struct JobDetail {
    #[serde(flatten)]
    pub summary: JobListItem,
    pub urls: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct JobListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// `GET /api/jobs?page&limit`
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<JobListQuery>,
) -> ApiResult<impl IntoResponse> {
    let pagination = parse_pagination(&PageQuery {
        page: query.page,
        limit: query.limit,
    })?;

    let page = state.controller.list_jobs(None, pagination).await?;
    let page = page.map_items(|s| JobListItem {
        job_id: s.job_id,
        status: s.status,
        total_urls: s.total_urls,
        media_found: s.media_found,
        created_at: s.created_at,
        completed_at: s.completed_at,
    });

    Ok(ok_page(page))
}

/// `GET /api/jobs/:id`
pub async fn get(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<impl IntoResponse> {
    let summary = state
        .controller
        .job_summary(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("job".to_string()))?;

    let job = state
        .jobs
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("job".to_string()))?;

    Ok(ok(JobDetail {
        summary: JobListItem {
            job_id: summary.job_id,
            status: summary.status,
            total_urls: summary.total_urls,
            media_found: summary.media_found,
            created_at: summary.created_at,
            completed_at: summary.completed_at,
        },
        urls: job.urls,
    }))
}
