use serde::{Deserialize, Serialize};

/// Top-level configuration, loaded from a TOML file.
///
/// Every section has usable defaults so a paper-trading agent can start
/// from an empty file. Credentials are never stored here; each client reads
/// its keys from the environment variables named in its section.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OptraConfig {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Seconds to sleep between trading cycles.
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
    /// Cap on tool-dispatch iterations within a single cycle.
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: u32,
    /// Cap on conversation history length, system message included.
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,
    /// Stop after this many cycles. None = run until cancelled.
    #[serde(default)]
    pub max_cycles: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Base URL of the Ollama-compatible chat endpoint.
    #[serde(default = "default_chat_base_url")]
    pub base_url: String,
    #[serde(default = "default_chat_model")]
    pub model: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_chat_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Route orders to the live trading endpoint instead of paper.
    #[serde(default)]
    pub live: bool,
    #[serde(default = "default_paper_url")]
    pub paper_base_url: String,
    #[serde(default = "default_live_url")]
    pub live_base_url: String,
    #[serde(default = "default_data_url")]
    pub data_base_url: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_secret_key_env")]
    pub secret_key_env: String,
}

impl BrokerConfig {
    /// The trading endpoint selected by the live/paper flag.
    pub fn trading_base_url(&self) -> &str {
        if self.live {
            &self.live_base_url
        } else {
            &self.paper_base_url
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_search_base_url")]
    pub base_url: String,
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Path of the JSON decision ledger file.
    #[serde(default = "default_ledger_path")]
    pub path: String,
}

fn default_interval_seconds() -> u64 {
    900
}
fn default_max_tool_iterations() -> u32 {
    10
}
fn default_history_cap() -> usize {
    50
}
fn default_chat_base_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_chat_model() -> String {
    "llama3.1".to_string()
}
fn default_chat_timeout() -> u64 {
    120
}
fn default_paper_url() -> String {
    "https://paper-api.alpaca.markets".to_string()
}
fn default_live_url() -> String {
    "https://api.alpaca.markets".to_string()
}
fn default_data_url() -> String {
    "https://data.alpaca.markets".to_string()
}
fn default_api_key_env() -> String {
    "ALPACA_API_KEY".to_string()
}
fn default_secret_key_env() -> String {
    "ALPACA_SECRET_KEY".to_string()
}
fn default_search_base_url() -> String {
    "https://api.tavily.com".to_string()
}
fn default_search_key_env() -> String {
    "TAVILY_API_KEY".to_string()
}
fn default_ledger_path() -> String {
    "data/decisions.json".to_string()
}
fn default_true() -> bool {
    true
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
            max_tool_iterations: default_max_tool_iterations(),
            history_cap: default_history_cap(),
            max_cycles: None,
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: default_chat_base_url(),
            model: default_chat_model(),
            timeout_seconds: default_chat_timeout(),
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            live: false,
            paper_base_url: default_paper_url(),
            live_base_url: default_live_url(),
            data_base_url: default_data_url(),
            api_key_env: default_api_key_env(),
            secret_key_env: default_secret_key_env(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_search_base_url(),
            api_key_env: default_search_key_env(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: default_ledger_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_empty_config_uses_defaults() {
        let config: OptraConfig = toml::from_str("").unwrap();
        assert_eq!(config.agent.interval_seconds, 900);
        assert_eq!(config.agent.max_tool_iterations, 10);
        assert_eq!(config.agent.history_cap, 50);
        assert_eq!(config.agent.max_cycles, None);
        assert!(!config.broker.live);
        assert_eq!(
            config.broker.trading_base_url(),
            "https://paper-api.alpaca.markets"
        );
        assert!(config.search.enabled);
        assert_eq!(config.ledger.path, "data/decisions.json");
    }

    #[test]
    fn deserialize_example_config() {
        let toml_str = r#"
[agent]
interval_seconds = 300
max_cycles = 4

[chat]
base_url = "http://ollama:11434"
model = "qwen2.5:32b"

[broker]
live = true

[search]
enabled = false

[ledger]
path = "/var/lib/optra/decisions.json"
"#;
        let config: OptraConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.agent.interval_seconds, 300);
        assert_eq!(config.agent.max_cycles, Some(4));
        assert_eq!(config.chat.model, "qwen2.5:32b");
        assert_eq!(config.broker.trading_base_url(), "https://api.alpaca.markets");
        assert!(!config.search.enabled);
        assert_eq!(config.ledger.path, "/var/lib/optra/decisions.json");
    }

    #[test]
    fn roundtrip_config() {
        let config = OptraConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: OptraConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.agent.history_cap, config.agent.history_cap);
        assert_eq!(parsed.chat.base_url, config.chat.base_url);
    }
}
