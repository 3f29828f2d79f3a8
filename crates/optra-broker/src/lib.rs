pub mod client;
pub mod error;
pub mod search;
pub mod types;

pub mod test_support;

pub use client::{AlpacaClient, Brokerage};
pub use error::BrokerError;
pub use search::{SearchProvider, TavilyClient};
