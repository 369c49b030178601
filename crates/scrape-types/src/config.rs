use std::time::Duration;

/// Flat, validated application configuration, parsed from the environment
/// once at startup and then passed by reference into every component —
/// no global state, per the design notes.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Postgres connection string. Required; no default.
    pub database_url: String,
    pub redis_host: String,
    pub redis_port: u16,
    pub basic_auth_username: String,
    pub basic_auth_password: String,
    pub scraper_concurrency: usize,
    pub scraper_timeout: Duration,
    pub max_urls_per_request: usize,
    pub puppeteer_headless: bool,
    pub puppeteer_disable_images: bool,
    pub port: u16,
}

impl AppConfig {
    /// Load configuration from the process environment. Fails only when
    /// `DATABASE_URL` is absent — every other field has a documented
    /// default.
    pub fn from_env() -> Result<Self, crate::error::ScrapeError> {
        let database_url = std::env::var("DATABASE_URL").map_err(|_| {
            crate::error::ScrapeError::validation("DATABASE_URL environment variable is required")
        })?;

        Ok(Self {
            database_url,
            redis_host: env_or("REDIS_HOST", "localhost"),
            redis_port: env_parse_or("REDIS_PORT", 6379),
            basic_auth_username: env_or("BASIC_AUTH_USERNAME", "admin"),
            basic_auth_password: env_or("BASIC_AUTH_PASSWORD", "admin123"),
            scraper_concurrency: env_parse_or("SCRAPER_CONCURRENCY", 3),
            scraper_timeout: Duration::from_millis(env_parse_or("SCRAPER_TIMEOUT", 30_000)),
            max_urls_per_request: env_parse_or("MAX_URLS_PER_REQUEST", 100),
            puppeteer_headless: env_bool_or("PUPPETEER_HEADLESS", true),
            puppeteer_disable_images: env_bool_or("PUPPETEER_DISABLE_IMAGES", true),
            port: env_parse_or("PORT", 3001),
        })
    }

    pub fn redis_url(&self) -> String {
        format!("redis://{}:{}", self.redis_host, self.redis_port)
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool_or(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redis_url_formats_host_and_port() {
        let cfg = AppConfig {
            database_url: "postgres://x".into(),
            redis_host: "cache.local".into(),
            redis_port: 6380,
            basic_auth_username: "admin".into(),
            basic_auth_password: "admin123".into(),
            scraper_concurrency: 3,
            scraper_timeout: Duration::from_secs(30),
            max_urls_per_request: 100,
            puppeteer_headless: true,
            puppeteer_disable_images: true,
            port: 3001,
        };
        assert_eq!(cfg.redis_url(), "redis://cache.local:6380");
    }
}
