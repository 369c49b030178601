use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

/// `url:{base64url(url)[0:100]}` — per-URL extraction cache, TTL 3600s.
pub fn url_key(url: &str) -> String {
    let encoded = URL_SAFE_NO_PAD.encode(url.as_bytes());
    let truncated: String = encoded.chars().take(100).collect();
    format!("url:{truncated}")
}

/// `media:list:{page}:{limit}:{type|all}:{search|""}` — TTL 60s.
pub fn media_list_key(page: i64, limit: i64, media_type: Option<&str>, search: Option<&str>) -> String {
    format!(
        "media:list:{page}:{limit}:{}:{}",
        media_type.unwrap_or("all"),
        search.unwrap_or(""),
    )
}

/// `stats:media` — aggregate counts, TTL 30s.
pub const MEDIA_STATS_KEY: &str = "stats:media";

/// `queue:stats` — TTL 5s.
pub const QUEUE_STATS_KEY: &str = "queue:stats";

/// Wildcard used to invalidate every `media:list:*` and `stats:media` entry
/// after a worker persists new media.
pub const MEDIA_CACHE_WILDCARD: &str = "media:*";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_key_is_stable_and_bounded() {
        let k1 = url_key("https://example.com/a.jpg");
        let k2 = url_key("https://example.com/a.jpg");
        assert_eq!(k1, k2);
        assert!(k1.starts_with("url:"));
        assert!(k1.len() <= "url:".len() + 100);
    }

    #[test]
    fn media_list_key_defaults() {
        assert_eq!(media_list_key(1, 20, None, None), "media:list:1:20:all:");
        assert_eq!(
            media_list_key(2, 10, Some("image"), Some("cat")),
            "media:list:2:10:image:cat"
        );
    }
}
