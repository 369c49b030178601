//! Headless (JS-rendered) extraction. Holds at most one live browser
//! process per worker, recycling it every [`MAX_PAGES_PER_BROWSER`] pages
//! to bound memory drift.

use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::network::SetBlockedUrlsParams;
use chromiumoxide::cdp::browser_protocol::page::SetLifecycleEventsEnabledParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use scraper::Html;
use sysinfo::System;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use scrape_extract::{dom, filter, ExtractResult, MediaCandidate};

const MAX_PAGES_PER_BROWSER: u32 = 10;
const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);
const LAZY_LOAD_SLEEP: Duration = Duration::from_secs(2);
const LOW_MEMORY_THRESHOLD_MB: u64 = 350;
const POST_SCRAPE_MEMORY_THRESHOLD_MB: u64 = 400;
const VIEWPORT_WIDTH: u32 = 1280;
const VIEWPORT_HEIGHT: u32 = 720;

#[derive(Debug, Error)]
pub enum HeadlessError {
    #[error("browser launch failed: {0}")]
    Launch(String),
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

/// Whether to intercept and abort stylesheet/font requests. Images are
/// never blocked — the extractor relies on the DOM's `<img>` elements.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    pub block_stylesheets_and_fonts: bool,
}

/// A single worker's browser handle. Not `Clone` or `Sync` — one per
/// queue worker, matching the "at most one live browser process per
/// worker" rule.
pub struct BrowserWorker {
    browser: Option<Browser>,
    pages_since_launch: u32,
    system: System,
    headless: bool,
}

impl BrowserWorker {
    /// `headless` mirrors `PUPPETEER_HEADLESS`: `false` launches with
    /// `.with_head()` for local debugging instead of a headless process.
    pub fn new(headless: bool) -> Self {
        Self {
            browser: None,
            pages_since_launch: 0,
            system: System::new(),
            headless,
        }
    }

    /// Renders `url` in a fresh page, collects media candidates from the
    /// live DOM, and closes the page. Never returns `Err` — failures fold
    /// into `ExtractResult::success = false`, matching the static
    /// extractor's contract.
    pub async fn render(&mut self, url: &str, options: RenderOptions) -> ExtractResult {
        self.maybe_gc_hint_for_low_memory().await;

        match self.render_inner(url, options).await {
            Ok(media) => {
                debug!(url, found = media.len(), "headless extraction complete");
                self.maybe_gc_hint_for_low_memory().await;
                ExtractResult {
                    url: url.to_string(),
                    success: true,
                    media,
                    scraper_used: "dynamic",
                    error: None,
                }
            }
            Err(err) => {
                warn!(url, error = %err, "headless extraction failed");
                ExtractResult {
                    url: url.to_string(),
                    success: false,
                    media: Vec::new(),
                    scraper_used: "dynamic",
                    error: Some(err.to_string()),
                }
            }
        }
    }

    async fn render_inner(
        &mut self,
        url: &str,
        options: RenderOptions,
    ) -> Result<Vec<MediaCandidate>, HeadlessError> {
        let page_url = Url::parse(url).map_err(|e| HeadlessError::InvalidUrl(e.to_string()))?;

        self.ensure_browser().await?;
        let browser = self.browser.as_ref().expect("ensured above");

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| HeadlessError::Navigation(e.to_string()))?;
        self.pages_since_launch += 1;

        let result = self.scrape_page(&page, &page_url, options).await;
        let _ = page.close().await;

        if result.is_err() {
            self.gc_hint(&page).await;
        }

        if self.pages_since_launch >= MAX_PAGES_PER_BROWSER {
            self.recycle_browser().await;
        }

        result
    }

    async fn scrape_page(
        &self,
        page: &Page,
        page_url: &Url,
        options: RenderOptions,
    ) -> Result<Vec<MediaCandidate>, HeadlessError> {
        page.execute(SetLifecycleEventsEnabledParams::new(true))
            .await
            .map_err(|e| HeadlessError::Navigation(e.to_string()))?;

        page.set_viewport(chromiumoxide::page::Viewport {
            width: VIEWPORT_WIDTH,
            height: VIEWPORT_HEIGHT,
            ..Default::default()
        })
        .await
        .map_err(|e| HeadlessError::Navigation(e.to_string()))?;

        if options.block_stylesheets_and_fonts {
            if let Err(err) = intercept_heavy_resources(page).await {
                warn!(error = %err, "resource interception setup failed, continuing without it");
            }
        }

        tokio::time::timeout(NAVIGATION_TIMEOUT, page.goto(page_url.as_str()))
            .await
            .map_err(|_| HeadlessError::Navigation("navigation deadline exceeded".into()))?
            .map_err(|e| HeadlessError::Navigation(e.to_string()))?;

        tokio::time::timeout(NAVIGATION_TIMEOUT, page.wait_for_navigation())
            .await
            .map_err(|_| HeadlessError::Navigation("navigation wait deadline exceeded".into()))?
            .map_err(|e| HeadlessError::Navigation(e.to_string()))?;

        tokio::time::sleep(LAZY_LOAD_SLEEP).await;

        let html = page
            .content()
            .await
            .map_err(|e| HeadlessError::Navigation(e.to_string()))?;

        let document = Html::parse_document(&html);
        let raw = dom::scan(&document);
        Ok(filter::resolve_and_filter(page_url, raw))
    }

    async fn ensure_browser(&mut self) -> Result<(), HeadlessError> {
        if self.browser.is_some() {
            return Ok(());
        }

        let mut builder = BrowserConfig::builder()
            .arg("--no-sandbox")
            .arg("--single-process")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage");
        if !self.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(HeadlessError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| HeadlessError::Launch(e.to_string()))?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    warn!(error = %err, "browser event handler error");
                }
            }
        });

        info!("headless browser launched");
        self.browser = Some(browser);
        self.pages_since_launch = 0;
        Ok(())
    }

    async fn recycle_browser(&mut self) {
        if let Some(mut browser) = self.browser.take() {
            let _ = browser.close().await;
            info!(pages = self.pages_since_launch, "recycled headless browser");
        }
        self.pages_since_launch = 0;
    }

    /// Issues a GC hint and logs memory if resident usage exceeds the low
    /// memory threshold, per the "before any scrape" memory check.
    async fn maybe_gc_hint_for_low_memory(&mut self) {
        self.system.refresh_memory();
        let used_mb = self.system.used_memory() / 1024 / 1024;
        if used_mb > LOW_MEMORY_THRESHOLD_MB {
            warn!(used_mb, threshold_mb = LOW_MEMORY_THRESHOLD_MB, "low memory before scrape");
            if let Some(browser) = &self.browser {
                if let Ok(pages) = browser.pages().await {
                    if let Some(page) = pages.first() {
                        self.gc_hint(page).await;
                    }
                }
            }
        }
    }

    /// Issues a GC hint on the live browser's first open page, if any.
    /// A no-op when no browser is launched or no page is currently open —
    /// used by callers outside the scrape path itself (the pipeline's
    /// memory backpressure loop) that only know resident memory is high,
    /// not that a specific page is mid-scrape.
    pub async fn issue_gc_hint(&self) {
        let Some(browser) = &self.browser else { return };
        if let Ok(pages) = browser.pages().await {
            if let Some(page) = pages.first() {
                self.gc_hint(page).await;
            }
        }
    }

    async fn gc_hint(&self, page: &Page) {
        let _ = page.evaluate("if (window.gc) { window.gc(); }").await;
    }

    /// Post-scrape memory check (400MB threshold) — callers should invoke
    /// after a batch of scrapes to surface drift even when every
    /// individual scrape stayed under the low-memory line.
    pub fn post_scrape_memory_mb(&mut self) -> u64 {
        self.system.refresh_memory();
        let used_mb = self.system.used_memory() / 1024 / 1024;
        if used_mb > POST_SCRAPE_MEMORY_THRESHOLD_MB {
            warn!(used_mb, threshold_mb = POST_SCRAPE_MEMORY_THRESHOLD_MB, "high memory after scrape");
        }
        used_mb
    }

    pub async fn shutdown(&mut self) {
        self.recycle_browser().await;
    }
}

impl Default for BrowserWorker {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Blocks stylesheet and font fetches via `Network.setBlockedURLs`. Images
/// are deliberately left off this list — the extractor reads the DOM's
/// `<img>` elements rather than decoded pixels.
async fn intercept_heavy_resources(page: &Page) -> Result<(), HeadlessError> {
    let patterns = vec![
        "*.css".to_string(),
        "*.woff".to_string(),
        "*.woff2".to_string(),
        "*.ttf".to_string(),
        "*.otf".to_string(),
        "*.eot".to_string(),
    ];
    page.execute(SetBlockedUrlsParams::new(patterns))
        .await
        .map_err(|e| HeadlessError::Navigation(e.to_string()))?;
    Ok(())
}

/// A fixed-size pool of [`BrowserWorker`]s, one per concurrent queue
/// handler slot — "at most one live browser process per worker" (§4.2),
/// generalized from a single worker to `scraper.concurrency` of them so
/// the router can be called from any concurrently-running handler.
/// Checkout blocks until a worker is free rather than spawning beyond the
/// configured pool size.
pub struct BrowserPool {
    workers: Arc<tokio::sync::Mutex<Vec<BrowserWorker>>>,
    semaphore: Arc<tokio::sync::Semaphore>,
    headless: bool,
}

/// A checked-out worker; returns itself to the pool on drop.
pub struct PooledBrowserWorker {
    worker: Option<BrowserWorker>,
    workers: Arc<tokio::sync::Mutex<Vec<BrowserWorker>>>,
    _permit: tokio::sync::OwnedSemaphorePermit,
}

impl BrowserPool {
    /// `headless` mirrors `PUPPETEER_HEADLESS` and is applied to every
    /// worker in the pool, including ones lazily recreated after a drop.
    pub fn new(size: usize, headless: bool) -> Self {
        let workers = (0..size.max(1)).map(|_| BrowserWorker::new(headless)).collect();
        Self {
            workers: Arc::new(tokio::sync::Mutex::new(workers)),
            semaphore: Arc::new(tokio::sync::Semaphore::new(size.max(1))),
            headless,
        }
    }

    /// Waits for a free slot, then hands back the worker parked there.
    pub async fn checkout(&self) -> PooledBrowserWorker {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("browser pool semaphore is never closed");
        let headless = self.headless;
        let worker = self
            .workers
            .lock()
            .await
            .pop()
            .unwrap_or_else(|| BrowserWorker::new(headless));
        PooledBrowserWorker {
            worker: Some(worker),
            workers: self.workers.clone(),
            _permit: permit,
        }
    }

    pub async fn shutdown(&self) {
        let mut workers = self.workers.lock().await;
        for worker in workers.iter_mut() {
            worker.shutdown().await;
        }
    }

    /// Issues a GC hint on every currently idle worker's live browser.
    /// Checked-out workers aren't reachable here (they're mid-page and
    /// outside `workers`), so this only reaches whichever workers happen
    /// to be parked at the moment the pipeline's memory loop fires.
    pub async fn issue_gc_hint_to_idle_workers(&self) {
        let workers = self.workers.lock().await;
        for worker in workers.iter() {
            worker.issue_gc_hint().await;
        }
    }
}

impl std::ops::Deref for PooledBrowserWorker {
    type Target = BrowserWorker;
    fn deref(&self) -> &BrowserWorker {
        self.worker.as_ref().expect("worker present until drop")
    }
}

impl std::ops::DerefMut for PooledBrowserWorker {
    fn deref_mut(&mut self) -> &mut BrowserWorker {
        self.worker.as_mut().expect("worker present until drop")
    }
}

impl Drop for PooledBrowserWorker {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let workers = self.workers.clone();
            tokio::spawn(async move {
                workers.lock().await.push(worker);
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_options_default_does_not_block() {
        let opts = RenderOptions::default();
        assert!(!opts.block_stylesheets_and_fonts);
    }

    #[test]
    fn worker_starts_with_no_browser() {
        let worker = BrowserWorker::new(true);
        assert!(worker.browser.is_none());
        assert_eq!(worker.pages_since_launch, 0);
    }
}
