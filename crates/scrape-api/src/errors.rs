use axum::{http::StatusCode, response::IntoResponse, Json};
use scrape_types::ScrapeError;
use serde_json::json;

/// Every error the API surfaces, mapped onto the taxonomy in the error
/// handling design: validation/auth/not-found/conflict/resource/internal.
/// Domain errors from the lower crates convert in via `From<ScrapeError>`;
/// handlers construct the HTTP-only variants directly.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("authentication failed")]
    Unauthorized,
    #[error("{0} not found")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("dependency unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("internal error")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message shown to the client. Internal errors are masked;
    /// their detail goes to the trace instead.
    fn public_message(&self) -> String {
        match self {
            ApiError::Internal(_) => "an internal error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<ScrapeError> for ApiError {
    fn from(err: ScrapeError) -> Self {
        match err {
            ScrapeError::Validation(msg) => ApiError::Validation(msg),
            ScrapeError::Unauthorized => ApiError::Unauthorized,
            ScrapeError::NotFound { resource } => ApiError::NotFound(resource),
            ScrapeError::Conflict(msg) => ApiError::Conflict(msg),
            ScrapeError::DependencyUnavailable { service, message } => {
                ApiError::ServiceUnavailable(format!("{service}: {message}"))
            }
            ScrapeError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        match status {
            StatusCode::INTERNAL_SERVER_ERROR | StatusCode::SERVICE_UNAVAILABLE => {
                tracing::error!(error = %self, "api error");
            }
            StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND | StatusCode::UNAUTHORIZED => {
                tracing::warn!(error = %self, "client error");
            }
            _ => tracing::info!(error = %self, "api error"),
        }

        let body = Json(json!({
            "success": false,
            "error": self.public_message(),
            "message": self.public_message(),
        }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
