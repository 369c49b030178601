use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::errors::ApiError;
use crate::state::AppState;

/// Paths reachable without Basic-Auth. Every other route is guarded.
const PUBLIC_PATHS: &[&str] = &["/health", "/health/detailed"];

/// Checks the `Authorization: Basic ...` header against the single
/// operator credential configured via `BASIC_AUTH_USERNAME` /
/// `BASIC_AUTH_PASSWORD`. No session state, no per-user tokens, just a
/// shared secret gating the whole API surface.
pub async fn basic_auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if PUBLIC_PATHS.contains(&request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let Some(header_value) = request.headers().get(header::AUTHORIZATION) else {
        return Err(unauthorized());
    };

    let Ok(credentials) = decode_basic(header_value.to_str().unwrap_or_default()) else {
        return Err(unauthorized());
    };

    if credentials.0 != state.config.basic_auth_username
        || credentials.1 != state.config.basic_auth_password
    {
        return Err(unauthorized());
    }

    Ok(next.run(request).await)
}

fn decode_basic(header: &str) -> Result<(String, String), ()> {
    let encoded = header.strip_prefix("Basic ").ok_or(())?;
    let decoded = STANDARD.decode(encoded).map_err(|_| ())?;
    let text = String::from_utf8(decoded).map_err(|_| ())?;
    let (user, pass) = text.split_once(':').ok_or(())?;
    Ok((user.to_string(), pass.to_string()))
}

fn unauthorized() -> ApiError {
    ApiError::Unauthorized
}

/// Wraps `401` responses with a `WWW-Authenticate` challenge header, as a
/// real Basic-Auth gate should. Applied as the outermost layer so it also
/// covers failures raised downstream of the middleware (e.g. login
/// rejecting bad body credentials).
pub async fn www_authenticate_layer(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    if response.status() == StatusCode::UNAUTHORIZED {
        response.headers_mut().insert(
            header::WWW_AUTHENTICATE,
            header::HeaderValue::from_static(r#"Basic realm="scrape-api""#),
        );
    }
    response
}

/// Verifies a login attempt's plaintext password against the stored
/// bcrypt hash. Never panics on a malformed hash — treats it as a
/// mismatch, matching the "authentication failed" taxonomy rather than
/// surfacing a 500 for corrupt seed data.
pub fn verify_password(plaintext: &str, hash: &str) -> bool {
    bcrypt::verify(plaintext, hash).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_valid_basic_header() {
        let encoded = STANDARD.encode("admin:admin123");
        let header = format!("Basic {encoded}");
        let (user, pass) = decode_basic(&header).unwrap();
        assert_eq!(user, "admin");
        assert_eq!(pass, "admin123");
    }

    #[test]
    fn rejects_malformed_header() {
        assert!(decode_basic("Bearer abc").is_err());
        assert!(decode_basic("Basic not-base64!!").is_err());
    }

    #[test]
    fn bad_hash_is_a_mismatch_not_a_panic() {
        assert!(!verify_password("whatever", "not-a-bcrypt-hash"));
    }
}
