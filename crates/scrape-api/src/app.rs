use std::sync::Arc;
use std::time::Duration;

use scrape_headless::BrowserPool;
use scrape_types::AppConfig;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;

use crate::state::AppState;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Owns every long-lived task of the process: the HTTP server, the
/// worker pool draining the queue, the tracker's event-driven status
/// writer, and the two backpressure loops. One `App` per binary,
/// constructed in `main`, torn down in reverse order on shutdown — no
/// globals, per the design notes.
pub struct App {
    state: AppState,
    browsers: Arc<BrowserPool>,
}

impl App {
    pub async fn bootstrap(config: AppConfig) -> anyhow::Result<Self> {
        let concurrency = config.scraper_concurrency;
        let headless = config.puppeteer_headless;
        let state = AppState::new(config).await?;
        Ok(Self {
            state,
            browsers: Arc::new(BrowserPool::new(concurrency, headless)),
        })
    }

    /// Runs until `SIGINT`/`SIGTERM`, then drains in-flight work up to a
    /// bounded deadline before returning.
    pub async fn run(self, bind: &str) -> anyhow::Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let worker_task = self.spawn_workers(shutdown_rx.clone());
        let tracker_task = {
            let controller = self.state.controller.clone();
            let shutdown_rx = shutdown_rx.clone();
            tokio::spawn(async move { controller.drive_tracker_events(shutdown_rx).await })
        };
        let cpu_task = tokio::spawn(scrape_pipeline::backpressure::run_cpu_loop(
            self.state.controller.queue(),
            shutdown_rx.clone(),
        ));
        let memory_task = tokio::spawn(scrape_pipeline::backpressure::run_memory_loop(
            self.browsers.clone(),
            shutdown_rx.clone(),
        ));

        let router = crate::routes::build(self.state.clone());
        let listener = tokio::net::TcpListener::bind(bind).await?;
        info!(bind, "scrape-api listening");

        let serve = axum::serve(listener, router).with_graceful_shutdown(wait_for_signal());
        serve.await?;

        info!("shutdown signal received, draining in-flight work");
        let _ = shutdown_tx.send(true);
        self.state.controller.drain(SHUTDOWN_GRACE).await;

        let metrics = self.state.controller.queue().metrics();
        info!(?metrics, "queue lifecycle counters at shutdown");

        let _ = tokio::time::timeout(
            SHUTDOWN_GRACE,
            futures::future::join4(worker_task, tracker_task, cpu_task, memory_task),
        )
        .await;

        self.browsers.shutdown().await;
        self.state.db.close().await;
        info!("shutdown complete");
        Ok(())
    }

    fn spawn_workers(&self, shutdown_rx: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        let queue = self.state.controller.queue();
        let controller = self.state.controller.clone();
        let browsers = self.browsers.clone();
        let concurrency = self.state.config.scraper_concurrency;

        tokio::spawn(async move {
            queue
                .process(
                    concurrency,
                    move |item| {
                        let controller = controller.clone();
                        let browsers = browsers.clone();
                        async move {
                            let mut worker = browsers.checkout().await;
                            controller.handle_item(item, &mut worker).await
                        }
                    },
                    shutdown_rx,
                )
                .await;
        })
    }
}

async fn wait_for_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
