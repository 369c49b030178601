pub mod dom;
pub mod filter;

use std::time::Duration;

use reqwest::Client;
use scraper::Html;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

pub use filter::MediaCandidate;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_REDIRECTS: usize = 5;
const USER_AGENT: &str = "MediaScrapePipeline/1.0 (+static-extractor)";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),
}

/// Outcome of running the static extractor against one URL.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractResult {
    pub url: String,
    pub success: bool,
    pub media: Vec<MediaCandidate>,
    pub scraper_used: &'static str,
    pub error: Option<String>,
}

/// Builds the shared reqwest client used for static extraction: bounded
/// redirects, a fixed deadline, and an identifying User-Agent.
pub fn build_client(timeout: Duration) -> Result<Client, ExtractError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()
        .map_err(ExtractError::from)
}

/// Fetches `url`, parses the body as HTML, and returns the filtered,
/// de-duplicated set of media candidates. Never returns `Err` — any
/// failure is folded into `ExtractResult::success = false` per the
/// fetch-or-parse-raised contract; a zero-media fetch is still success.
pub async fn extract(client: &Client, url: &str, timeout: Duration) -> ExtractResult {
    match extract_inner(client, url, timeout).await {
        Ok(media) => {
            debug!(url, found = media.len(), "static extraction complete");
            ExtractResult {
                url: url.to_string(),
                success: true,
                media,
                scraper_used: "static",
                error: None,
            }
        }
        Err(err) => {
            warn!(url, error = %err, "static extraction failed");
            ExtractResult {
                url: url.to_string(),
                success: false,
                media: Vec::new(),
                scraper_used: "static",
                error: Some(err.to_string()),
            }
        }
    }
}

async fn extract_inner(
    client: &Client,
    url: &str,
    timeout: Duration,
) -> Result<Vec<MediaCandidate>, ExtractError> {
    let page_url = Url::parse(url).map_err(|e| ExtractError::InvalidUrl(e.to_string()))?;

    let response = client
        .get(page_url.clone())
        .timeout(timeout)
        .send()
        .await?
        .error_for_status()?;
    let body = response.text().await?;

    let document = Html::parse_document(&body);
    let raw = dom::scan(&document);
    Ok(filter::resolve_and_filter(&page_url, raw))
}

pub fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_builds_with_custom_timeout() {
        let client = build_client(Duration::from_secs(5));
        assert!(client.is_ok());
    }
}
