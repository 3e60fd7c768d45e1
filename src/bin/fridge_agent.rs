//! Device agent binary.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fridge_thing::agent::client::HttpApi;
use fridge_thing::agent::hardware::{FilePanel, SystemNetwork};
use fridge_thing::agent::{Agent, AgentConfig, BlockingSleeper, SleepMode, SuspendSleeper};
use fridge_thing::{DEFAULT_DISPLAY_HEIGHT, DEFAULT_DISPLAY_WIDTH};

#[derive(Parser, Debug)]
#[command(name = "fridge-agent", about = "Device-side poll/render loop for fridge displays")]
struct Args {
    /// Path to the YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => AgentConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => AgentConfig::default(),
    };

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating data dir {}", config.data_dir.display()))?;

    let api = HttpApi::new(
        &config.api_base_url,
        Duration::from_secs(config.http_timeout_secs),
    );
    let network = SystemNetwork::default();
    let panel = FilePanel::new(
        &config.data_dir,
        DEFAULT_DISPLAY_WIDTH,
        DEFAULT_DISPLAY_HEIGHT,
    );

    let sleep_mode = config.sleep_mode;
    let suspend_command = config.suspend_command.clone();
    let mut agent = Agent::new(api, network, panel, config);
    info!("device_uuid={}", agent.device_uuid());

    match sleep_mode {
        SleepMode::Blocking => agent.run_forever(&mut BlockingSleeper)?,
        SleepMode::Suspend => agent.run_forever(&mut SuspendSleeper::new(suspend_command))?,
    }
    Ok(())
}
