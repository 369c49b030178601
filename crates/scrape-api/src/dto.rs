use axum::{response::IntoResponse, Json};
use serde::Serialize;
use serde_json::json;

use scrape_db::Page;

/// `{success: true, data, pagination?}` — the envelope every successful
/// response is wrapped in, per the external interfaces section.
pub fn ok<T: Serialize>(data: T) -> impl IntoResponse {
    Json(json!({ "success": true, "data": data }))
}

pub fn created<T: Serialize>(data: T) -> impl IntoResponse {
    (axum::http::StatusCode::CREATED, Json(json!({ "success": true, "data": data })))
}

/// `{success: true, data, pagination: {total, page, limit, totalPages}}`
pub fn ok_page<T: Serialize>(page: Page<T>) -> impl IntoResponse {
    Json(json!({
        "success": true,
        "data": page.items,
        "pagination": {
            "total": page.total,
            "page": page.page,
            "limit": page.limit,
            "totalPages": page.total_pages,
        }
    }))
}
