use thiserror::Error;

/// Error taxonomy shared by every crate below the HTTP layer. `scrape-api`
/// maps each variant onto the HTTP status codes from the error-handling
/// design (400/401/404/409/500/503) — this enum only names *what* went
/// wrong, never how it's surfaced to a client.
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("authentication failed")]
    Unauthorized,

    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("dependency unavailable: {service} - {message}")]
    DependencyUnavailable { service: String, message: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl ScrapeError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn dependency(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DependencyUnavailable {
            service: service.into(),
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for ScrapeError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => ScrapeError::NotFound {
                resource: "row".to_string(),
            },
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                ScrapeError::Conflict(db_err.message().to_string())
            }
            other => ScrapeError::Internal(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScrapeError>;
