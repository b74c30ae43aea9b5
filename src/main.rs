use anyhow::Context;
use clap::Parser;

use agriconnect::{
    cli::{self, Cli},
    config::AppConfig,
    logging::init_tracing,
    state::AppState,
};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        tracing::error!("agriconnect failed: {err:?}");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = AppConfig::from_env().context("failed to load config")?;
    init_tracing(&cfg.logging.rust_log);

    tracing::debug!(api = %cfg.api.url, storage = %cfg.storage.path.display(), "starting");
    let state = AppState::new(cfg)?;
    cli::run(cli.command, &state).await
}
