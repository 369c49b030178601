use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::verify_password;
use crate::dto::ok;
use crate::errors::{ApiError, ApiResult};
use crate::state::AppState;
use base64::{engine::general_purpose::STANDARD, Engine as _};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: i64,
    pub username: String,
    #[serde(rename = "createdAt")]
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// `POST /api/auth/login`. Verifies the submitted credentials against the
/// `users` table (a separate check from the Basic-Auth gate every route
/// already sits behind) and echoes the user's public fields on success.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = state
        .users
        .find_by_username(&body.username)
        .await?
        .filter(|u| verify_password(&body.password, &u.password_hash))
        .ok_or(ApiError::Unauthorized)?;

    Ok(ok(UserView {
        id: user.id,
        username: user.username,
        created_at: user.created_at,
    }))
}

/// `GET /api/auth/me`. The Basic-Auth middleware already authenticated
/// the caller against the operator credential; this resolves that
/// username to a `users` row so the response shape matches `login`'s. If
/// no row exists for the shared operator credential, a synthetic
/// principal (`id = 0`) is returned rather than 404ing an authenticated
/// request.
pub async fn me(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<impl IntoResponse> {
    let username = basic_auth_username(&headers).ok_or(ApiError::Unauthorized)?;

    let view = match state.users.find_by_username(&username).await? {
        Some(user) => UserView {
            id: user.id,
            username: user.username,
            created_at: user.created_at,
        },
        None => UserView {
            id: 0,
            username,
            created_at: chrono::Utc::now(),
        },
    };

    Ok(ok(view))
}

fn basic_auth_username(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = raw.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    text.split_once(':').map(|(user, _)| user.to_string())
}
