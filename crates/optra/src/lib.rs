//! Wiring: build the agent runner from configuration.

use std::sync::Arc;

use optra_agent::tools::ToolContext;
use optra_agent::{AgentRunner, OllamaChat};
use optra_broker::search::SearchProvider;
use optra_broker::{AlpacaClient, TavilyClient};
use optra_ledger::DecisionLedger;
use optra_models::config::OptraConfig;

/// Construct the runner with live clients. Missing broker credentials are
/// fatal; a missing search key only disables the research tools.
pub fn build_runner(config: &OptraConfig) -> anyhow::Result<AgentRunner> {
    let brokerage = AlpacaClient::from_config(&config.broker)
        .map_err(|e| anyhow::anyhow!("brokerage client setup failed: {e}"))?;
    let chat = OllamaChat::from_config(&config.chat)
        .map_err(|e| anyhow::anyhow!("chat client setup failed: {e}"))?;

    let search: Option<Arc<dyn SearchProvider>> = if config.search.enabled {
        match TavilyClient::from_config(&config.search) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                tracing::warn!(error = %e, "search disabled, research tools unavailable");
                None
            }
        }
    } else {
        None
    };

    let ctx = ToolContext {
        brokerage: Arc::new(brokerage),
        search,
        ledger: Arc::new(DecisionLedger::new(&config.ledger.path)),
    };

    Ok(AgentRunner::new(
        Arc::new(chat),
        ctx,
        config.agent.clone(),
    ))
}

/// Load configuration from a TOML file, falling back to defaults when the
/// file does not exist.
pub fn load_config(path: &str) -> anyhow::Result<OptraConfig> {
    match std::fs::read_to_string(path) {
        Ok(raw) => {
            let config = toml::from_str(&raw)
                .map_err(|e| anyhow::anyhow!("failed to parse config {path}: {e}"))?;
            Ok(config)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path, "config file not found, using defaults");
            Ok(OptraConfig::default())
        }
        Err(e) => Err(anyhow::anyhow!("failed to read config {path}: {e}")),
    }
}
