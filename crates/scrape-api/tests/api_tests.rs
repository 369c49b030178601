use axum::response::IntoResponse;
use scrape_api::errors::ApiError;
use scrape_types::ScrapeError;

#[test]
fn scrape_error_maps_onto_taxonomy_status_codes() {
    let cases: Vec<(ScrapeError, axum::http::StatusCode)> = vec![
        (
            ScrapeError::validation("bad input"),
            axum::http::StatusCode::BAD_REQUEST,
        ),
        (ScrapeError::Unauthorized, axum::http::StatusCode::UNAUTHORIZED),
        (
            ScrapeError::not_found("job"),
            axum::http::StatusCode::NOT_FOUND,
        ),
        (
            ScrapeError::Conflict("dup".into()),
            axum::http::StatusCode::CONFLICT,
        ),
        (
            ScrapeError::dependency("redis", "down"),
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
        ),
        (
            ScrapeError::Internal("boom".into()),
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        ),
    ];

    for (err, expected_status) in cases {
        let api_err: ApiError = err.into();
        let response = api_err.into_response();
        assert_eq!(response.status(), expected_status);
    }
}

#[tokio::test]
async fn internal_error_message_is_masked() {
    let err: ApiError = ScrapeError::Internal("leaked connection string detail".into()).into();
    let response = err.into_response();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(!text.contains("leaked connection string detail"));
    assert!(text.contains("internal error occurred"));
}
