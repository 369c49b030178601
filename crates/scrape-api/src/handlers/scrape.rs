use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::dto::{created, ok};
use crate::errors::ApiResult;
use crate::state::AppState;
use crate::validation::validate_scrape_request;

#[derive(Debug, Deserialize)]
pub struct ScrapeRequest {
    pub urls: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ScrapeResponse {
    pub job_id: i64,
    pub status: scrape_types::JobStatus,
    pub total_urls: i64,
    pub duplicates_removed: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// `POST /api/scrape`. De-duplicates and enqueues a batch of URLs, then
/// returns the newly created job summary. No user association yet — the
/// narrow HTTP surface in scope here doesn't carry a session, so
/// submissions are anonymous (`user_id = None`).
pub async fn submit(
    State(state): State<AppState>,
    Json(body): Json<ScrapeRequest>,
) -> ApiResult<impl IntoResponse> {
    validate_scrape_request(&body.urls, state.config.max_urls_per_request)?;

    let outcome = state.controller.enqueue_job(None, body.urls).await?;

    Ok(created(ScrapeResponse {
        job_id: outcome.job_id,
        status: outcome.status,
        total_urls: outcome.total_urls,
        duplicates_removed: outcome.duplicates_removed,
        created_at: chrono::Utc::now(),
    }))
}

/// `GET /api/scrape/queue/stats`.
pub async fn queue_stats(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let cached = state
        .cache
        .get::<scrape_queue::QueueStats>(scrape_cache::keys::QUEUE_STATS_KEY)
        .await;

    let stats = match cached {
        Some(stats) => stats,
        None => {
            let stats = state
                .controller
                .queue()
                .stats()
                .await
                .map_err(|e| scrape_types::ScrapeError::dependency("queue", e.to_string()))?;
            state
                .cache
                .set(
                    scrape_cache::keys::QUEUE_STATS_KEY,
                    &stats,
                    std::time::Duration::from_secs(5),
                )
                .await;
            stats
        }
    };

    Ok(ok(serde_json::json!({
        "waiting": stats.waiting,
        "active": stats.active,
        "completed": stats.completed,
        "failed": stats.failed,
        "isPaused": stats.is_paused,
        "pausedByCpu": stats.paused_by_cpu,
    })))
}
