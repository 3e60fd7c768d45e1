//! HTTP server binary.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use fridge_thing::server::{router, AppState};
use fridge_thing::{Config, MemoryStore, PgStore, Store};

#[derive(Parser, Debug)]
#[command(name = "fridge-server", about = "Image-selection backend for fridge displays")]
struct Args {
    /// Path to the YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    }
    .with_env_overrides();

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let pg = PgStore::connect(url).context("connecting to postgres")?;
            pg.ping().await.context("postgres ping")?;
            info!("using postgres store");
            Arc::new(pg)
        }
        None => {
            warn!("no database_url configured, using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let listen_addr = config.listen_addr.clone();
    let state = AppState::new(config, store)?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("binding {listen_addr}"))?;
    info!("listening on {listen_addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
