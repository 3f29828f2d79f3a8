//! Append-only JSON decision ledger.
//!
//! The whole file is read and rewritten on every append. Volumes are tiny
//! (one record per trade), so simplicity wins over incremental writes.

use std::path::{Path, PathBuf};

use chrono::Utc;

use optra_models::decision::DecisionRecord;

use crate::error::LedgerError;

/// A decision about to be recorded; id and timestamp are assigned on write.
#[derive(Debug, Clone)]
pub struct NewDecision {
    pub reasoning: String,
    pub action: String,
    pub parameters: serde_json::Value,
    pub result: serde_json::Value,
    pub portfolio_value: Option<f64>,
}

pub struct DecisionLedger {
    path: PathBuf,
}

impl DecisionLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all records. A missing file is an empty ledger; an unreadable or
    /// corrupt file is logged and treated as empty rather than stopping the
    /// agent.
    pub fn load(&self) -> Vec<DecisionRecord> {
        if !self.path.exists() {
            return Vec::new();
        }
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to read ledger");
                return Vec::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "ledger file is corrupt, starting empty");
                Vec::new()
            }
        }
    }

    /// Append one record, assigning the next monotonic id and the current
    /// timestamp. Returns the record as written.
    pub fn record(&self, decision: NewDecision) -> Result<DecisionRecord, LedgerError> {
        let mut records = self.load();
        let next_id = records.iter().map(|r| r.decision_id).max().unwrap_or(0) + 1;
        let record = DecisionRecord {
            decision_id: next_id,
            timestamp: Utc::now().to_rfc3339(),
            reasoning: decision.reasoning,
            action: decision.action,
            parameters: decision.parameters,
            result: decision.result,
            portfolio_value: decision.portfolio_value,
        };
        records.push(record.clone());
        self.save(&records)?;
        tracing::info!(
            decision_id = record.decision_id,
            action = %record.action,
            "decision recorded"
        );
        Ok(record)
    }

    /// The most recent `limit` records, newest first.
    pub fn history(&self, limit: usize) -> Vec<DecisionRecord> {
        let records = self.load();
        records.into_iter().rev().take(limit.max(1)).collect()
    }

    fn save(&self, records: &[DecisionRecord]) -> Result<(), LedgerError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(records)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}
