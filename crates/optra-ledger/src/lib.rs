pub mod error;
pub mod performance;
pub mod store;

pub use error::LedgerError;
pub use store::{DecisionLedger, NewDecision};
