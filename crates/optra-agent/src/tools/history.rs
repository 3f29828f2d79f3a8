//! Decision ledger tools: history, performance, and explicit decision logging.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use optra_broker::client::Brokerage;
use optra_ledger::{DecisionLedger, NewDecision};

use crate::error::AgentError;
use crate::registry::{function_schema, Tool};
use crate::tools::{str_arg, usize_arg, ToolContext};

pub struct GetDecisionHistory {
    ledger: Arc<DecisionLedger>,
}

impl GetDecisionHistory {
    pub fn new(ctx: &ToolContext) -> Self {
        Self {
            ledger: ctx.ledger.clone(),
        }
    }
}

#[async_trait]
impl Tool for GetDecisionHistory {
    fn name(&self) -> &'static str {
        "get_decision_history"
    }

    fn schema(&self) -> Value {
        function_schema(
            self.name(),
            "Recent decisions from the ledger, newest first, to learn from past cycles.",
            json!({
                "type": "object",
                "properties": {
                    "limit": {"type": "integer", "description": "Max decisions (default 20)"}
                }
            }),
        )
    }

    async fn call(&self, args: &Map<String, Value>) -> Result<Value, AgentError> {
        let limit = usize_arg(args, "limit", 20);
        let records = self.ledger.history(limit);
        Ok(serde_json::to_value(records)?)
    }
}

pub struct GetPerformanceSummary {
    ledger: Arc<DecisionLedger>,
}

impl GetPerformanceSummary {
    pub fn new(ctx: &ToolContext) -> Self {
        Self {
            ledger: ctx.ledger.clone(),
        }
    }
}

#[async_trait]
impl Tool for GetPerformanceSummary {
    fn name(&self) -> &'static str {
        "get_performance_summary"
    }

    fn schema(&self) -> Value {
        function_schema(
            self.name(),
            "Aggregate performance over recent decisions: action counts, trades, \
             portfolio change, and win rate.",
            json!({
                "type": "object",
                "properties": {
                    "window_days": {"type": "integer", "description": "Lookback in days (default 30, 0 for all)"}
                }
            }),
        )
    }

    async fn call(&self, args: &Map<String, Value>) -> Result<Value, AgentError> {
        let window_days = args
            .get("window_days")
            .and_then(Value::as_u64)
            .unwrap_or(30) as u32;
        let records = self.ledger.load();
        let scoped = if window_days > 0 {
            optra_ledger::performance::filter_window(&records, window_days)
        } else {
            records
        };
        let summary = optra_ledger::performance::summarize(&scoped);
        let mut value = serde_json::to_value(&summary)?;
        if let Some(map) = value.as_object_mut() {
            map.insert("window_days".to_string(), json!(window_days));
        }
        Ok(value)
    }
}

pub struct GetDailyPnl {
    ledger: Arc<DecisionLedger>,
}

impl GetDailyPnl {
    pub fn new(ctx: &ToolContext) -> Self {
        Self {
            ledger: ctx.ledger.clone(),
        }
    }
}

#[async_trait]
impl Tool for GetDailyPnl {
    fn name(&self) -> &'static str {
        "get_daily_pnl"
    }

    fn schema(&self) -> Value {
        function_schema(
            self.name(),
            "Per-day portfolio P&L derived from ledger portfolio values, newest first.",
            json!({
                "type": "object",
                "properties": {
                    "limit": {"type": "integer", "description": "Max days (default 30)"}
                }
            }),
        )
    }

    async fn call(&self, args: &Map<String, Value>) -> Result<Value, AgentError> {
        let limit = usize_arg(args, "limit", 30);
        let records = self.ledger.load();
        let days = optra_ledger::performance::daily_pnl(&records, limit);
        Ok(json!({"days": days}))
    }
}

/// Explicit BUY/SELL/HOLD logging so the model records its stance even on
/// cycles without an order.
pub struct LogTradingDecision {
    ledger: Arc<DecisionLedger>,
    brokerage: Arc<dyn Brokerage>,
}

impl LogTradingDecision {
    pub fn new(ctx: &ToolContext) -> Self {
        Self {
            ledger: ctx.ledger.clone(),
            brokerage: ctx.brokerage.clone(),
        }
    }
}

#[async_trait]
impl Tool for LogTradingDecision {
    fn name(&self) -> &'static str {
        "log_trading_decision"
    }

    fn schema(&self) -> Value {
        function_schema(
            self.name(),
            "Record a BUY, SELL, or HOLD decision with your reasoning. Call this \
             once per cycle after analysis.",
            json!({
                "type": "object",
                "properties": {
                    "decision_type": {"type": "string", "enum": ["BUY", "SELL", "HOLD"]},
                    "reasoning": {"type": "string", "description": "Why this decision was made"}
                },
                "required": ["decision_type", "reasoning"]
            }),
        )
    }

    async fn call(&self, args: &Map<String, Value>) -> Result<Value, AgentError> {
        let raw = str_arg(args, "decision_type").unwrap_or_default();
        let decision = raw.trim().to_uppercase();
        if !matches!(decision.as_str(), "BUY" | "SELL" | "HOLD") {
            return Err(AgentError::Validation(format!(
                "Invalid decision_type '{raw}'. Must be 'BUY', 'SELL', or 'HOLD'"
            )));
        }
        let reasoning = str_arg(args, "reasoning").unwrap_or_default().to_string();

        // Best effort; a dead broker connection must not block the log.
        let portfolio_value = match self.brokerage.account().await {
            Ok(account) => Some(account.portfolio_value),
            Err(e) => {
                tracing::debug!(error = %e, "portfolio value unavailable for decision log");
                None
            }
        };

        let record = self.ledger.record(NewDecision {
            reasoning,
            action: decision.clone(),
            parameters: Value::Object(args.clone()),
            result: Value::Object(Map::new()),
            portfolio_value,
        })?;

        Ok(json!({
            "success": true,
            "decision_id": record.decision_id,
            "timestamp": record.timestamp,
            "decision_type": decision,
            "message": format!("Decision logged: {decision}"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use optra_broker::test_support::MockBrokerage;
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    fn ctx(dir: &TempDir, mock: Arc<MockBrokerage>) -> ToolContext {
        ToolContext {
            brokerage: mock,
            search: None,
            ledger: Arc::new(DecisionLedger::new(dir.path().join("decisions.json"))),
        }
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn log_decision_validates_type() {
        let dir = TempDir::new().unwrap();
        let tool = LogTradingDecision::new(&ctx(&dir, Arc::new(MockBrokerage::default())));
        let err = tool
            .call(&args(json!({"decision_type": "MAYBE", "reasoning": "?"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid decision_type 'MAYBE'"));
    }

    #[tokio::test]
    async fn log_decision_captures_portfolio_value() {
        let dir = TempDir::new().unwrap();
        let mock = Arc::new(MockBrokerage::with_portfolio_value(55_000.0));
        let ctx = ctx(&dir, mock);
        let tool = LogTradingDecision::new(&ctx);

        let result = tool
            .call(&args(json!({"decision_type": "hold", "reasoning": "choppy market"})))
            .await
            .unwrap();
        assert_eq!(result["success"], json!(true));
        assert_eq!(result["decision_type"], json!("HOLD"));

        let records = ctx.ledger.load();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action, "HOLD");
        assert_eq!(records[0].portfolio_value, Some(55_000.0));
    }

    #[tokio::test]
    async fn log_decision_survives_broker_failure() {
        let dir = TempDir::new().unwrap();
        let mock = Arc::new(MockBrokerage::default());
        mock.fail.store(true, Ordering::SeqCst);
        let ctx = ctx(&dir, mock);
        let tool = LogTradingDecision::new(&ctx);

        let result = tool
            .call(&args(json!({"decision_type": "BUY", "reasoning": "breakout"})))
            .await
            .unwrap();
        assert_eq!(result["success"], json!(true));
        assert_eq!(ctx.ledger.load()[0].portfolio_value, None);
    }

    #[tokio::test]
    async fn history_and_summary_read_the_ledger() {
        let dir = TempDir::new().unwrap();
        let ctx = ctx(&dir, Arc::new(MockBrokerage::default()));
        for i in 0..3 {
            ctx.ledger
                .record(NewDecision {
                    reasoning: format!("cycle {i}"),
                    action: "options_trade".to_string(),
                    parameters: Value::Null,
                    result: Value::Null,
                    portfolio_value: Some(100_000.0 + i as f64 * 100.0),
                })
                .unwrap();
        }

        let history = GetDecisionHistory::new(&ctx)
            .call(&args(json!({"limit": 2})))
            .await
            .unwrap();
        let list = history.as_array().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0]["decision_id"], json!(3));

        let summary = GetPerformanceSummary::new(&ctx)
            .call(&Map::new())
            .await
            .unwrap();
        assert_eq!(summary["total_decisions"], json!(3));
        assert_eq!(summary["trades_executed"], json!(3));
        assert_eq!(summary["net_pnl"], json!(200.0));
        assert_eq!(summary["window_days"], json!(30));

        let daily = GetDailyPnl::new(&ctx).call(&Map::new()).await.unwrap();
        assert_eq!(daily["days"].as_array().unwrap().len(), 1);
    }
}
