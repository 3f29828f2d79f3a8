use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Chat request failed: {0}")]
    Chat(String),

    #[error("Chat request timed out after {0} seconds")]
    Timeout(u64),

    /// Tool argument validation failure; the message is surfaced to the
    /// model as a tool result.
    #[error("{0}")]
    Validation(String),

    #[error("Broker error: {0}")]
    Broker(#[from] optra_broker::BrokerError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] optra_ledger::LedgerError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
