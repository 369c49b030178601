//! Exercises `www_authenticate_layer` through an actual tower `Service`
//! call rather than invoking the function directly, so the test covers
//! the same request/response plumbing axum uses in production.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware, routing::get,
    Router,
};
use scrape_api::auth::www_authenticate_layer;
use tower::ServiceExt;

fn unauthorized_router() -> Router {
    Router::new()
        .route("/guarded", get(|| async { StatusCode::UNAUTHORIZED }))
        .route("/ok", get(|| async { StatusCode::OK }))
        .layer(middleware::from_fn(www_authenticate_layer))
}

#[tokio::test]
async fn adds_www_authenticate_header_on_401() {
    let app = unauthorized_router();
    let response = app
        .oneshot(Request::builder().uri("/guarded").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let header = response
        .headers()
        .get(axum::http::header::WWW_AUTHENTICATE)
        .expect("WWW-Authenticate header must be present on 401");
    assert_eq!(header.to_str().unwrap(), r#"Basic realm="scrape-api""#);
}

#[tokio::test]
async fn leaves_other_statuses_untouched() {
    let app = unauthorized_router();
    let response = app
        .oneshot(Request::builder().uri("/ok").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get(axum::http::header::WWW_AUTHENTICATE)
        .is_none());
}
