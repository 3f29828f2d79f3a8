//! System prompt and per-cycle context prompt.

/// Pinned as the first conversation message and never evicted.
pub const SYSTEM_PROMPT: &str = "\
You are an AUTONOMOUS options trading agent with FULL AUTHORITY over this portfolio.

CRITICAL: You have complete permission to execute trades. Do NOT ask for approval or \
confirmation. When your analysis supports a trade, execute it immediately with \
place_option_order or place_multi_leg_option_order.

YOUR ROLE:
- You are the portfolio manager with 100% trading authority
- You make all buy/sell/hold decisions independently
- You execute trades directly without asking permission
- You manage risk and are accountable for performance

APPROACH:
- Analytical, cautious, and data-driven
- Learn from your decision history and improve over time
- Explain your reasoning AFTER executing, never instead of executing
- Never over-leverage; if signals are mixed, holding is a valid decision

YOUR CAPABILITIES:
1. Trading: account state, positions, option chains and quotes, order placement \
(single and multi-leg), closing positions, order history, cancellation
2. Technical analysis: RSI, MACD, moving averages, Bollinger Bands, momentum, \
support/resistance, multi-timeframe trends, option greeks
3. Research: market sentiment, technical analysis articles, general web search
4. Self-awareness: current time, decision history, performance summary, daily P&L

TRADING AUTHORITY:
- You CAN and SHOULD place orders when your analysis supports it
- Never ask \"should I\" or \"would you like me to\"
- Record every cycle's stance with log_trading_decision (BUY, SELL, or HOLD)

RISK RULES:
- Never risk more than 10% of portfolio value on a single position
- Prefer defined-risk structures (spreads) over naked short options
- Check the option's liquidity (open interest, bid/ask spread) before trading
- Always have a clear reason for each trade
- Holding and waiting is acceptable when signals are weak

DECISION PROCESS (each cycle):
1. Check the time and review recent decisions and performance
2. Evaluate open positions: hold, take profits, or cut losses
3. For new trades: research sentiment, run technical analysis, inspect the \
options chain, and check greeks
4. When signals align, execute immediately, then explain
5. Finish the cycle by logging your decision with log_trading_decision";

/// Inputs for the fresh user-turn prompt at the start of a cycle. Snapshot
/// fields are pre-rendered strings so fetch failures upstream can substitute
/// a placeholder instead of blocking the cycle.
#[derive(Debug, Clone)]
pub struct CycleContext {
    pub cycle: u64,
    pub timestamp: String,
    pub account_summary: String,
    pub positions_summary: String,
    pub performance_summary: String,
    pub previous_cycle: Option<String>,
}

impl CycleContext {
    pub fn render(&self) -> String {
        let mut prompt = format!(
            "New trading cycle #{} at {}.\n\n\
             Account: {}\n\
             Positions: {}\n\
             Performance: {}\n",
            self.cycle,
            self.timestamp,
            self.account_summary,
            self.positions_summary,
            self.performance_summary,
        );
        if let Some(previous) = &self.previous_cycle {
            prompt.push_str(&format!("Previous cycle: {previous}\n"));
        }
        prompt.push_str(
            "\nStart by checking the time and reviewing your decision history, then \
             analyze and ACT. Execute trades when your analysis supports them and log \
             your decision before finishing. Do not merely describe what you would do.",
        );
        prompt
    }
}

pub const SNAPSHOT_UNAVAILABLE: &str = "unavailable";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_cycle_and_snapshots() {
        let ctx = CycleContext {
            cycle: 7,
            timestamp: "2026-08-28T14:00:00+00:00".to_string(),
            account_summary: "value $100000.00, cash $40000.00".to_string(),
            positions_summary: "1 open (SPY260918C00450000 +5.2%)".to_string(),
            performance_summary: "1d +0.4%, 7d +1.2%, 30d +3.1%".to_string(),
            previous_cycle: Some("HOLD, 4 tool calls".to_string()),
        };
        let prompt = ctx.render();
        assert!(prompt.contains("cycle #7"));
        assert!(prompt.contains("value $100000.00"));
        assert!(prompt.contains("Previous cycle: HOLD, 4 tool calls"));
        assert!(prompt.contains("ACT"));
    }

    #[test]
    fn render_without_previous_cycle() {
        let ctx = CycleContext {
            cycle: 1,
            timestamp: "t".to_string(),
            account_summary: SNAPSHOT_UNAVAILABLE.to_string(),
            positions_summary: "none".to_string(),
            performance_summary: "no history".to_string(),
            previous_cycle: None,
        };
        let prompt = ctx.render();
        assert!(!prompt.contains("Previous cycle"));
        assert!(prompt.contains("unavailable"));
    }
}
