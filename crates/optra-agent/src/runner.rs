//! The agent loop: cycle orchestration, thinking sub-loop, and dispatch.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;

use optra_models::chat::ChatMessage;
use optra_models::config::AgentConfig;
use optra_ledger::NewDecision;

use crate::chat::{assistant_content, ChatClient};
use crate::error::AgentError;
use crate::extract::extract_tool_calls;
use crate::normalize::normalize_parameters;
use crate::prompts::{CycleContext, SNAPSHOT_UNAVAILABLE, SYSTEM_PROMPT};
use crate::registry::ToolRegistry;
use crate::tools::{build_registry, trade_action, ToolContext};

/// Outcome of one cycle, folded into the next cycle's prompt.
struct CycleSummary {
    trade_executed: bool,
    tool_calls: usize,
    reasoning: String,
}

impl CycleSummary {
    fn render(&self) -> String {
        let verdict = if self.trade_executed {
            "trade executed"
        } else {
            "no trade"
        };
        let mut line = format!("{verdict}, {} tool calls", self.tool_calls);
        let reasoning = self.reasoning.trim();
        if !reasoning.is_empty() {
            let snippet: String = reasoning.chars().take(200).collect();
            line.push_str(&format!("; final reasoning: {snippet}"));
        }
        line
    }
}

pub struct AgentRunner {
    chat: Arc<dyn ChatClient>,
    ctx: ToolContext,
    registry: ToolRegistry,
    config: AgentConfig,
    cancel: CancellationToken,
}

impl AgentRunner {
    pub fn new(chat: Arc<dyn ChatClient>, ctx: ToolContext, config: AgentConfig) -> Self {
        let registry = build_registry(&ctx);
        Self {
            chat,
            ctx,
            registry,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Token for triggering a graceful stop between cycles.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run cycles until cancelled or the configured cycle bound is reached.
    /// Cycle failures are logged and recovered from; only cancellation and
    /// the bound stop the loop.
    pub async fn run(&self) -> Result<(), AgentError> {
        tracing::info!(
            tools = self.registry.names().len(),
            interval = self.config.interval_seconds,
            "agent loop starting"
        );

        let mut history = vec![ChatMessage::system(SYSTEM_PROMPT)];
        let mut cycle: u64 = 0;
        let mut previous: Option<String> = None;

        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            cycle += 1;
            if let Some(max) = self.config.max_cycles {
                if cycle > max {
                    tracing::info!(max_cycles = max, "cycle bound reached, stopping");
                    break;
                }
            }

            tracing::info!(cycle, "trading cycle starting");
            match self.run_cycle(&mut history, cycle, previous.take()).await {
                Ok(summary) => {
                    tracing::info!(
                        cycle,
                        tool_calls = summary.tool_calls,
                        trade_executed = summary.trade_executed,
                        "cycle complete"
                    );
                    previous = Some(summary.render());
                }
                Err(e) => {
                    tracing::error!(cycle, error = %e, "cycle failed, recovering");
                }
            }

            trim_history(&mut history, self.config.history_cap);

            if self.config.interval_seconds > 0 {
                let interval = std::time::Duration::from_secs(self.config.interval_seconds);
                tokio::select! {
                    _ = self.cancel.cancelled() => {
                        tracing::info!("agent loop shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        }

        tracing::info!("agent loop stopped");
        Ok(())
    }

    async fn run_cycle(
        &self,
        history: &mut Vec<ChatMessage>,
        cycle: u64,
        previous: Option<String>,
    ) -> Result<CycleSummary, AgentError> {
        let context = CycleContext {
            cycle,
            timestamp: Utc::now().to_rfc3339(),
            account_summary: self.account_summary().await,
            positions_summary: self.positions_summary().await,
            performance_summary: self.performance_summary(),
            previous_cycle: previous,
        };
        history.push(ChatMessage::user(context.render()));

        let schemas = self.registry.schemas();
        let mut tool_calls_made = 0usize;
        let mut trade_executed = false;
        let mut reasoning = String::new();

        for iteration in 0..self.config.max_tool_iterations {
            let response = self.chat.chat(history, &schemas).await?;
            let content = assistant_content(&response);
            history.push(ChatMessage::assistant(content.clone()));
            if !content.trim().is_empty() {
                reasoning = content;
            }

            let calls = extract_tool_calls(&response);
            if calls.is_empty() {
                if tool_calls_made > 0 && !trade_executed {
                    tracing::warn!(
                        cycle,
                        tool_calls = tool_calls_made,
                        reasoning = %reasoning,
                        "model used tools but executed no trade"
                    );
                }
                return Ok(CycleSummary {
                    trade_executed,
                    tool_calls: tool_calls_made,
                    reasoning,
                });
            }

            for call in calls {
                tool_calls_made += 1;
                let raw = Value::Object(call.arguments.clone());
                let (params, result) = match normalize_parameters(&call.name, &raw) {
                    Ok(params) => {
                        tracing::info!(cycle, tool = %call.name, "dispatching tool call");
                        let result = self.registry.dispatch(&call.name, &params).await;
                        (params, result)
                    }
                    Err(e) => {
                        tracing::warn!(cycle, tool = %call.name, error = %e, "parameter normalization failed");
                        (Map::new(), json!({"error": e.to_string()}))
                    }
                };

                let failed = result.get("error").is_some();
                if !failed {
                    if let Some(action) = trade_action(&call.name) {
                        self.record_trade(action, &reasoning, &params, &result).await;
                        trade_executed = true;
                    }
                }

                let serialized =
                    serde_json::to_string(&result).unwrap_or_else(|_| "{}".to_string());
                history.push(ChatMessage::tool(serialized, call.id.clone()));

                if failed {
                    let error_text = result
                        .get("error")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown error");
                    history.push(ChatMessage::user(format!(
                        "The {} call failed: {error_text}. Adjust your arguments or \
                         approach and continue.",
                        call.name
                    )));
                }
            }

            if iteration + 1 == self.config.max_tool_iterations {
                tracing::warn!(
                    cycle,
                    cap = self.config.max_tool_iterations,
                    "tool iteration cap reached, ending cycle"
                );
            }
        }

        Ok(CycleSummary {
            trade_executed,
            tool_calls: tool_calls_made,
            reasoning,
        })
    }

    async fn record_trade(
        &self,
        action: &str,
        reasoning: &str,
        params: &Map<String, Value>,
        result: &Value,
    ) {
        let portfolio_value = self
            .ctx
            .brokerage
            .account()
            .await
            .ok()
            .map(|account| account.portfolio_value);
        let decision = NewDecision {
            reasoning: reasoning.to_string(),
            action: action.to_string(),
            parameters: Value::Object(params.clone()),
            result: result.clone(),
            portfolio_value,
        };
        // Persistence problems must not undo an already-executed trade.
        if let Err(e) = self.ctx.ledger.record(decision) {
            tracing::error!(error = %e, "failed to record trade in ledger");
        }
    }

    async fn account_summary(&self) -> String {
        match self.ctx.brokerage.account().await {
            Ok(account) => format!(
                "value ${:.2}, equity ${:.2}, cash ${:.2}, buying power ${:.2}",
                account.portfolio_value, account.equity, account.cash, account.buying_power,
            ),
            Err(e) => {
                tracing::warn!(error = %e, "account snapshot unavailable");
                SNAPSHOT_UNAVAILABLE.to_string()
            }
        }
    }

    async fn positions_summary(&self) -> String {
        match self.ctx.brokerage.positions().await {
            Ok(positions) if positions.is_empty() => "none".to_string(),
            Ok(positions) => {
                let parts: Vec<String> = positions
                    .iter()
                    .take(8)
                    .map(|p| match p.unrealized_plpc {
                        Some(plpc) => format!("{} ({:+.1}%)", p.symbol, plpc * 100.0),
                        None => p.symbol.clone(),
                    })
                    .collect();
                format!("{} open: {}", positions.len(), parts.join(", "))
            }
            Err(e) => {
                tracing::warn!(error = %e, "positions snapshot unavailable");
                SNAPSHOT_UNAVAILABLE.to_string()
            }
        }
    }

    fn performance_summary(&self) -> String {
        let records = self.ctx.ledger.load();
        if records.is_empty() {
            return "no decision history yet".to_string();
        }
        let parts: Vec<String> = [1u32, 7, 30]
            .iter()
            .map(|days| {
                let windowed = optra_ledger::performance::filter_window(&records, *days);
                let summary = optra_ledger::performance::summarize(&windowed);
                match summary.portfolio_change_pct {
                    Some(pct) => format!("{days}d {pct:+.2}%"),
                    None => format!("{days}d n/a"),
                }
            })
            .collect();
        parts.join(", ")
    }
}

/// Oldest-first eviction that never touches the pinned system message.
fn trim_history(history: &mut Vec<ChatMessage>, cap: usize) {
    let cap = cap.max(2);
    if history.len() <= cap {
        return;
    }
    let keep_from = history.len() - (cap - 1);
    let mut trimmed = Vec::with_capacity(cap);
    trimmed.push(history[0].clone());
    trimmed.extend_from_slice(&history[keep_from..]);
    *history = trimmed;
}

#[cfg(test)]
mod tests {
    use super::*;
    use optra_models::chat::Role;

    #[test]
    fn trim_keeps_system_message_first() {
        let mut history = vec![ChatMessage::system("sys")];
        for i in 0..60 {
            history.push(ChatMessage::user(format!("msg {i}")));
        }
        trim_history(&mut history, 50);
        assert_eq!(history.len(), 50);
        assert_eq!(history[0].role, Role::System);
        assert_eq!(history[0].content, "sys");
        assert_eq!(history[49].content, "msg 59");
        assert_eq!(history[1].content, "msg 11");
    }

    #[test]
    fn trim_is_noop_under_cap() {
        let mut history = vec![ChatMessage::system("sys"), ChatMessage::user("hi")];
        trim_history(&mut history, 50);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn cycle_summary_renders_verdict_and_reasoning() {
        let summary = CycleSummary {
            trade_executed: true,
            tool_calls: 4,
            reasoning: "RSI oversold, bought a call spread".to_string(),
        };
        let line = summary.render();
        assert!(line.starts_with("trade executed, 4 tool calls"));
        assert!(line.contains("call spread"));

        let quiet = CycleSummary {
            trade_executed: false,
            tool_calls: 0,
            reasoning: String::new(),
        };
        assert_eq!(quiet.render(), "no trade, 0 tool calls");
    }
}
