use clap::Parser;
use scrape_api::app::App;
use scrape_types::AppConfig;

#[derive(Parser)]
#[command(name = "scrape-service")]
#[command(about = "Media scrape pipeline: HTTP surface + worker pool in one process")]
struct Args {
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:3001")]
    bind: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let config = AppConfig::from_env()?;

    tracing::info!(
        bind = %args.bind,
        port = config.port,
        concurrency = config.scraper_concurrency,
        "starting scrape-service"
    );

    let bind = if args.bind == "0.0.0.0:3001" && config.port != 3001 {
        format!("0.0.0.0:{}", config.port)
    } else {
        args.bind
    };

    let app = App::bootstrap(config).await?;
    app.run(&bind).await
}
