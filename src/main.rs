use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use maps_harvest::crawler::chrome::ChromeFactory;
use maps_harvest::{Config, ScrapeService, TracingObserver};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cfg = Config::from_env()?;
    let query = std::env::args().skip(1).collect::<Vec<_>>().join(" ");

    let service = ScrapeService::with_browser(ChromeFactory, cfg, Arc::new(TracingObserver));
    let result = service
        .scrape(&query)
        .await
        .map_err(|e| anyhow::anyhow!("{} ({})", e.detail(), e.status()))?;

    let json = serde_json::to_string_pretty(&result).context("failed to encode result")?;
    println!("{json}");

    Ok(())
}
