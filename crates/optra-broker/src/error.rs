use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API request rejected ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Missing credentials: {0} is not set")]
    Credentials(String),

    #[error("No data available: {0}")]
    NoData(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
