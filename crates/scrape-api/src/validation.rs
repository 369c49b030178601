use scrape_db::Pagination;
use scrape_types::{MediaType, ScrapeError};
use std::str::FromStr;
use url::Url;

/// Validates a scrape submission: 1..=max URLs, each a well-formed
/// absolute http(s) URL. De-duplication happens downstream in the
/// controller (it also needs to report `duplicates_removed`); this only
/// rejects malformed input.
pub fn validate_scrape_request(urls: &[String], max: usize) -> Result<(), ScrapeError> {
    if urls.is_empty() {
        return Err(ScrapeError::validation("urls must contain at least 1 entry"));
    }
    if urls.len() > max {
        return Err(ScrapeError::validation(format!(
            "urls must contain at most {max} entries"
        )));
    }
    for url in urls {
        let parsed = Url::parse(url)
            .map_err(|e| ScrapeError::validation(format!("invalid url {url}: {e}")))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ScrapeError::validation(format!(
                "invalid url {url}: only http/https schemes are accepted"
            )));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub fn parse_pagination(query: &PageQuery) -> Result<Pagination, ScrapeError> {
    Pagination::new(query.page.unwrap_or(1), query.limit.unwrap_or(20))
}

pub fn parse_media_type(raw: Option<&str>) -> Result<Option<MediaType>, ScrapeError> {
    raw.map(MediaType::from_str).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_oversized_batches() {
        assert!(validate_scrape_request(&[], 100).is_err());
        let too_many: Vec<String> = (0..101).map(|i| format!("https://x/{i}")).collect();
        assert!(validate_scrape_request(&too_many, 100).is_err());
    }

    #[test]
    fn rejects_non_http_schemes() {
        let urls = vec!["ftp://example.com/a".to_string()];
        assert!(validate_scrape_request(&urls, 100).is_err());
    }

    #[test]
    fn accepts_valid_batch() {
        let urls = vec!["https://example.com".to_string(), "http://x.com/y".to_string()];
        assert!(validate_scrape_request(&urls, 100).is_ok());
    }

    #[test]
    fn media_type_query_parses_or_passes_through_none() {
        assert!(parse_media_type(None).unwrap().is_none());
        assert_eq!(parse_media_type(Some("image")).unwrap(), Some(MediaType::Image));
        assert!(parse_media_type(Some("audio")).is_err());
    }
}
