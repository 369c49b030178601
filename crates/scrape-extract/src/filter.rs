use scrape_types::MediaType;
use serde::{Deserialize, Serialize};
use url::Url;

/// A raw candidate asset found in markup, before resolution/filtering.
#[derive(Debug, Clone)]
pub struct RawCandidate {
    pub url: String,
    pub media_type: MediaType,
    pub title: Option<String>,
}

/// A candidate that survived resolution, scheme/host/path filtering, and
/// dedup. This is what both the static extractor and the headless
/// renderer hand back to the router, and what gets cached under
/// `url:{base64url(url)}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaCandidate {
    pub media_url: String,
    pub media_type: MediaType,
    pub title: Option<String>,
}

const BLOCKED_HOST_FRAGMENTS: &[&str] = &["google-analytics.com", "doubleclick.net", "facebook.com/tr"];
const BLOCKED_PATH_FRAGMENTS: &[&str] = &["1x1", "pixel"];

/// Resolves each raw candidate against `page_url`, drops anything that
/// fails the scheme/host/path heuristics, and de-dups by `media_url`
/// keeping the first occurrence — the filter/dedup pass shared by the
/// static extractor and the headless renderer.
pub fn resolve_and_filter(page_url: &Url, raw: Vec<RawCandidate>) -> Vec<MediaCandidate> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(raw.len());

    for candidate in raw {
        let Some(resolved) = resolve(page_url, &candidate.url) else {
            continue;
        };
        if !is_allowed(&resolved) {
            continue;
        }
        let media_url = resolved.to_string();
        if seen.insert(media_url.clone()) {
            out.push(MediaCandidate {
                media_url,
                media_type: candidate.media_type,
                title: candidate.title,
            });
        }
    }

    out
}

/// Resolves an absolute, protocol-relative, or page-relative reference
/// against `page_url` per RFC 3986.
fn resolve(page_url: &Url, raw: &str) -> Option<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(rest) = trimmed.strip_prefix("//") {
        return Url::parse(&format!("{}://{}", page_url.scheme(), rest)).ok();
    }
    page_url.join(trimmed).ok()
}

fn is_allowed(url: &Url) -> bool {
    if url.scheme() != "http" && url.scheme() != "https" {
        return false;
    }
    let host = url.host_str().unwrap_or("");
    if BLOCKED_HOST_FRAGMENTS.iter().any(|frag| host.contains(frag)) {
        return false;
    }
    let as_str = url.as_str();
    if BLOCKED_PATH_FRAGMENTS.iter().any(|frag| as_str.contains(frag)) {
        return false;
    }
    true
}

/// Splits an `<img srcset>` attribute into its candidate URLs — comma
/// separated descriptors, each a whitespace-delimited `url descriptor?`
/// pair. Only the URL token is kept.
pub fn parse_srcset(value: &str) -> Vec<String> {
    value
        .split(',')
        .filter_map(|entry| entry.trim().split_whitespace().next())
        .map(|s| s.to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Url {
        Url::parse("https://example.com/articles/one").unwrap()
    }

    #[test]
    fn rejects_data_urls() {
        let raw = vec![RawCandidate {
            url: "data:image/png;base64,abcd".to_string(),
            media_type: MediaType::Image,
            title: None,
        }];
        assert!(resolve_and_filter(&page(), raw).is_empty());
    }

    #[test]
    fn rejects_tracking_pixels() {
        let raw = vec![RawCandidate {
            url: "https://example.com/t/pixel.gif".to_string(),
            media_type: MediaType::Image,
            title: None,
        }];
        assert!(resolve_and_filter(&page(), raw).is_empty());
    }

    #[test]
    fn rejects_known_tracker_hosts() {
        let raw = vec![RawCandidate {
            url: "https://www.google-analytics.com/collect.gif".to_string(),
            media_type: MediaType::Image,
            title: None,
        }];
        assert!(resolve_and_filter(&page(), raw).is_empty());
    }

    #[test]
    fn resolves_relative_and_protocol_relative() {
        let raw = vec![
            RawCandidate {
                url: "/img/a.jpg".to_string(),
                media_type: MediaType::Image,
                title: None,
            },
            RawCandidate {
                url: "//cdn.example.com/b.jpg".to_string(),
                media_type: MediaType::Image,
                title: None,
            },
        ];
        let out = resolve_and_filter(&page(), raw);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].media_url, "https://example.com/img/a.jpg");
        assert_eq!(out[1].media_url, "https://cdn.example.com/b.jpg");
    }

    #[test]
    fn dedups_preserving_first_occurrence() {
        let raw = vec![
            RawCandidate {
                url: "https://example.com/a.jpg".to_string(),
                media_type: MediaType::Image,
                title: Some("first".to_string()),
            },
            RawCandidate {
                url: "https://example.com/a.jpg".to_string(),
                media_type: MediaType::Image,
                title: Some("second".to_string()),
            },
        ];
        let out = resolve_and_filter(&page(), raw);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title.as_deref(), Some("first"));
    }

    #[test]
    fn srcset_keeps_only_url_token() {
        let parsed = parse_srcset("a.jpg 1x, b.jpg 2x,  c.jpg");
        assert_eq!(parsed, vec!["a.jpg", "b.jpg", "c.jpg"]);
    }
}
