//! Serves the listing search API over the snapshot in `DATA_DIR`.
use std::net::SocketAddr;

use anyhow::Context;
use listing_search::{ListingSearcher, data::DATA_DIR, init_logging, server::router};
use tracing::info;

const DEFAULT_ADDR: &str = "127.0.0.1:8080";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(tracing::Level::INFO)?;

    let addr: SocketAddr = std::env::var("LISTING_SEARCH_ADDR")
        .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
        .parse()
        .context("LISTING_SEARCH_ADDR must be a socket address")?;
    let data_dir = DATA_DIR.as_path();

    let searcher = ListingSearcher::from_data_dir(data_dir)
        .with_context(|| format!("loading listing snapshot from {}", data_dir.display()))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, data_dir = %data_dir.display(), "Listing search listening");

    axum::serve(listener, router(searcher))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;
    Ok(())
}
