use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::auth::{basic_auth_middleware, www_authenticate_layer};
use crate::handlers;
use crate::state::AppState;

/// Assembles the full HTTP surface from §6: auth, scrape submission,
/// queue stats, job/media lookup, and health. `/health*` sits outside the
/// Basic-Auth gate; everything else is wrapped by it.
pub fn build(state: AppState) -> Router {
    let guarded = Router::new()
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/me", get(handlers::auth::me))
        .route("/api/scrape", post(handlers::scrape::submit))
        .route("/api/scrape/queue/stats", get(handlers::scrape::queue_stats))
        .route("/api/jobs", get(handlers::jobs::list))
        .route("/api/jobs/:id", get(handlers::jobs::get))
        .route("/api/media", get(handlers::media::list))
        .route("/api/media/stats", get(handlers::media::stats))
        .route("/api/media/:id", get(handlers::media::get))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            basic_auth_middleware,
        ));

    let public = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/health/detailed", get(handlers::health::health_detailed));

    Router::new()
        .merge(guarded)
        .merge(public)
        .layer(middleware::from_fn(www_authenticate_layer))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
