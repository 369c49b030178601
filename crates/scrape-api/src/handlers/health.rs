use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use sysinfo::System;

use crate::state::AppState;

/// `GET /health`. `200` if the relational store answers, `503` otherwise.
/// Reachable without Basic-Auth.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = state.db_healthy().await;
    let status = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if db_ok { "ok" } else { "degraded" },
            "db": db_ok,
        })),
    )
}

/// `GET /health/detailed`. Same status-code contract as `/health`, with
/// cache reachability and process memory/uptime folded in for operators.
pub async fn health_detailed(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = state.db_healthy().await;
    let cache_ok = ping_cache(&state).await;

    let mut system = System::new();
    system.refresh_memory();
    let used_mb = system.used_memory() / 1024 / 1024;

    let status = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if db_ok { "ok" } else { "degraded" },
            "db": db_ok,
            "cache": cache_ok,
            "memory": { "usedMb": used_mb },
            "uptimeSeconds": state.uptime().as_secs(),
        })),
    )
}

/// A miss on the probe key is not itself proof the cache is unreachable
/// (it simply may not have been set before); attempt a cheap write to
/// tell "reachable but empty" apart from "disconnected".
async fn ping_cache(state: &AppState) -> bool {
    state
        .cache
        .set("health:probe", &true, std::time::Duration::from_secs(5))
        .await;
    state.cache.get::<bool>("health:probe").await.unwrap_or(false)
}
