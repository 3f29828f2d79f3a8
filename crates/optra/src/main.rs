use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use optra::{build_runner, load_config};

#[derive(Parser, Debug)]
#[command(
    name = "optra",
    about = "Autonomous options trading agent - runs analysis/trade cycles against a chat model"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/optra.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    if config.broker.live {
        tracing::warn!("LIVE trading enabled - orders will use real funds");
    } else {
        tracing::info!("paper trading mode");
    }

    let runner = build_runner(&config)?;
    let cancel = runner.cancel_token();

    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("received shutdown signal");
        cancel.cancel();
    });

    runner
        .run()
        .await
        .map_err(|e| anyhow::anyhow!("agent error: {e}"))?;

    Ok(())
}
