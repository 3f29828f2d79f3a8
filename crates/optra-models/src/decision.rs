use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One recorded trading decision. Appended to the ledger, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionRecord {
    /// Monotonically increasing, 1-based.
    pub decision_id: u64,
    /// ISO-8601 timestamp of when the record was written.
    pub timestamp: String,
    /// The assistant's stated reasoning at the time of the trade.
    pub reasoning: String,
    /// What was done: "options_trade", "close_position", "BUY", "SELL", "HOLD", ...
    pub action: String,
    /// Normalized arguments the trade was placed with.
    pub parameters: serde_json::Value,
    /// The tool result as returned by the brokerage.
    pub result: serde_json::Value,
    /// Portfolio value at recording time, when the account was reachable.
    pub portfolio_value: Option<f64>,
}

/// Derived performance view over a window of decision records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerformanceSummary {
    pub total_decisions: usize,
    /// Decision counts keyed by action.
    pub actions: BTreeMap<String, usize>,
    /// Decisions whose action is a trade (buy, sell, options_trade, close_position).
    pub trades_executed: usize,
    pub first_decision_at: Option<String>,
    pub last_decision_at: Option<String>,
    pub starting_portfolio_value: Option<f64>,
    pub current_portfolio_value: Option<f64>,
    /// current - starting portfolio value.
    pub net_pnl: Option<f64>,
    pub portfolio_change_pct: Option<f64>,
    /// Fraction of consecutive portfolio-value increases across records.
    /// A crude proxy, not a per-trade win rate.
    pub win_rate: Option<f64>,
}

/// Realized change in portfolio value over one calendar day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyPnl {
    /// Calendar date, YYYY-MM-DD.
    pub date: String,
    pub start_value: f64,
    pub end_value: f64,
    pub pnl: f64,
    pub pnl_percent: f64,
    /// Number of decisions recorded that day.
    pub decisions: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_decision_record() {
        let record = DecisionRecord {
            decision_id: 3,
            timestamp: "2026-08-28T14:30:00Z".to_string(),
            reasoning: "RSI oversold on SPY, buying a call".to_string(),
            action: "options_trade".to_string(),
            parameters: serde_json::json!({"symbol": "SPY260918C00450000", "side": "buy", "quantity": 1}),
            result: serde_json::json!({"status": "accepted", "order_id": "abc"}),
            portfolio_value: Some(100_250.75),
        };

        let json = serde_json::to_string(&record).unwrap();
        let deserialized: DecisionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, deserialized);
    }

    #[test]
    fn decision_record_tolerates_null_portfolio_value() {
        let json = r#"{
            "decision_id": 1,
            "timestamp": "2026-08-28T14:30:00Z",
            "reasoning": "holding",
            "action": "HOLD",
            "parameters": {},
            "result": {},
            "portfolio_value": null
        }"#;
        let record: DecisionRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.portfolio_value, None);
    }

    #[test]
    fn roundtrip_performance_summary() {
        let mut actions = BTreeMap::new();
        actions.insert("options_trade".to_string(), 2);
        actions.insert("HOLD".to_string(), 1);
        let summary = PerformanceSummary {
            total_decisions: 3,
            actions,
            trades_executed: 2,
            first_decision_at: Some("2026-08-26T10:00:00Z".to_string()),
            last_decision_at: Some("2026-08-28T10:00:00Z".to_string()),
            starting_portfolio_value: Some(100_000.0),
            current_portfolio_value: Some(101_500.0),
            net_pnl: Some(1_500.0),
            portfolio_change_pct: Some(1.5),
            win_rate: Some(0.5),
        };

        let json = serde_json::to_string(&summary).unwrap();
        let deserialized: PerformanceSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(summary, deserialized);
    }
}
