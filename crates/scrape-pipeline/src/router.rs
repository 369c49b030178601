use std::time::Duration;

use reqwest::Client;
use scrape_extract::ExtractResult;
use scrape_headless::{BrowserWorker, RenderOptions};
use tracing::{debug, warn};

const RENDERER_FALLBACK_THRESHOLD: usize = 3;

/// Picks the static extractor first, falling back to the headless
/// renderer when the static pass looks too thin to be the whole page.
pub async fn route(
    client: &Client,
    browser: &mut BrowserWorker,
    url: &str,
    timeout: Duration,
    render_options: RenderOptions,
) -> ExtractResult {
    let static_result = scrape_extract::extract(client, url, timeout).await;

    if static_result.success && static_result.media.len() >= RENDERER_FALLBACK_THRESHOLD {
        return static_result;
    }

    debug!(url, found = static_result.media.len(), "static yield low, trying headless renderer");
    let dynamic_result = browser.render(url, render_options).await;

    if dynamic_result.success && dynamic_result.media.len() > static_result.media.len() {
        return dynamic_result;
    }

    if !dynamic_result.success {
        warn!(url, error = ?dynamic_result.error, "headless renderer failed, using static result");
    }

    static_result
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrape_types::MediaType;

    fn candidate(n: usize) -> Vec<scrape_extract::MediaCandidate> {
        (0..n)
            .map(|i| scrape_extract::MediaCandidate {
                media_url: format!("https://example.com/{i}.jpg"),
                media_type: MediaType::Image,
                title: None,
            })
            .collect()
    }

    #[test]
    fn fallback_threshold_is_three() {
        assert_eq!(RENDERER_FALLBACK_THRESHOLD, 3);
        let thin = ExtractResult {
            url: "https://x".into(),
            success: true,
            media: candidate(2),
            scraper_used: "static",
            error: None,
        };
        assert!(thin.media.len() < RENDERER_FALLBACK_THRESHOLD);
    }
}
