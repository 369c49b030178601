use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;
use scrape_cache::CacheClient;
use scrape_db::{JobRepository, MediaRepository, UserRepository};
use scrape_pipeline::{Controller, ControllerConfig};
use scrape_queue::{Queue, QueueConfig};
use scrape_types::AppConfig;
use sqlx::PgPool;

/// Everything a handler needs, constructed once in `main` and shared by
/// reference — no process-wide singletons, per the design notes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: PgPool,
    pub cache: CacheClient,
    pub jobs: JobRepository,
    pub media: MediaRepository,
    pub users: UserRepository,
    pub controller: Arc<Controller>,
    pub started_at: Instant,
}

impl AppState {
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        let db = scrape_db::connect(&config.database_url).await?;
        scrape_db::migrate(&db).await?;

        let cache = CacheClient::connect(&config.redis_url()).await;

        let jobs = JobRepository::new(db.clone());
        let media = MediaRepository::new(db.clone());
        let users = UserRepository::new(db.clone());

        let http_client = scrape_extract::build_client(config.scraper_timeout)?;
        let queue_config = QueueConfig::new(config.scraper_timeout);
        let queue = Arc::new(Queue::connect(&config.redis_url(), queue_config).await?);

        let controller_config = ControllerConfig {
            scraper_timeout: config.scraper_timeout,
            render_options: scrape_headless::RenderOptions {
                block_stylesheets_and_fonts: config.puppeteer_disable_images,
            },
        };
        let controller = Arc::new(Controller::new(
            queue,
            jobs.clone(),
            media.clone(),
            cache.clone(),
            http_client,
            controller_config,
        ));

        Ok(Self {
            config: Arc::new(config),
            db,
            cache,
            jobs,
            media,
            users,
            controller,
            started_at: Instant::now(),
        })
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// `true` if a trivial round-trip query against Postgres succeeds.
    /// Drives the `/health*` endpoints' status code.
    pub async fn db_healthy(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.db).await.is_ok()
    }
}
