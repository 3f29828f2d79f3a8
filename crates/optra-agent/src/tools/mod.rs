//! Tool implementations grouped by concern.

pub mod analysis;
pub mod broker;
pub mod history;
pub mod research;

use std::sync::Arc;

use serde_json::{Map, Value};

use optra_broker::client::Brokerage;
use optra_broker::search::SearchProvider;
use optra_ledger::DecisionLedger;

use crate::registry::{Tool, ToolRegistry};

/// Injected clients shared by all tools.
#[derive(Clone)]
pub struct ToolContext {
    pub brokerage: Arc<dyn Brokerage>,
    /// None when search is disabled or unconfigured; research tools then
    /// return an error result instead of failing at startup.
    pub search: Option<Arc<dyn SearchProvider>>,
    pub ledger: Arc<DecisionLedger>,
}

/// Tools whose successful results are recorded in the decision ledger,
/// with the ledger action they map to.
pub fn trade_action(tool: &str) -> Option<&'static str> {
    match tool {
        "place_option_order" | "place_multi_leg_option_order" => Some("options_trade"),
        "close_option_position" => Some("close_position"),
        _ => None,
    }
}

/// Build the full tool registry over the given clients.
pub fn build_registry(ctx: &ToolContext) -> ToolRegistry {
    let mut tools: Vec<Arc<dyn Tool>> = vec![
        Arc::new(broker::GetAccountInfo::new(ctx)),
        Arc::new(broker::GetPositions::new(ctx)),
        Arc::new(broker::GetOptionContracts::new(ctx)),
        Arc::new(broker::GetOptionsChain::new(ctx)),
        Arc::new(broker::GetOptionQuote::new(ctx)),
        Arc::new(broker::PlaceOptionOrder::new(ctx)),
        Arc::new(broker::PlaceMultiLegOptionOrder::new(ctx)),
        Arc::new(broker::CloseOptionPosition::new(ctx)),
        Arc::new(broker::GetOrderHistory::new(ctx)),
        Arc::new(broker::CancelOrder::new(ctx)),
        Arc::new(broker::GetPriceBars::new(ctx)),
        Arc::new(broker::GetCurrentDatetime),
        Arc::new(analysis::CalculateRsi::new(ctx)),
        Arc::new(analysis::CalculateMacd::new(ctx)),
        Arc::new(analysis::CalculateMovingAverages::new(ctx)),
        Arc::new(analysis::CalculateBollingerBands::new(ctx)),
        Arc::new(analysis::GetPriceMomentum::new(ctx)),
        Arc::new(analysis::GetSupportResistance::new(ctx)),
        Arc::new(analysis::AnalyzeMultiTimeframes::new(ctx)),
        Arc::new(analysis::AnalyzeOptionGreeks::new(ctx)),
        Arc::new(history::GetDecisionHistory::new(ctx)),
        Arc::new(history::GetPerformanceSummary::new(ctx)),
        Arc::new(history::GetDailyPnl::new(ctx)),
        Arc::new(history::LogTradingDecision::new(ctx)),
    ];
    if let Some(search) = &ctx.search {
        tools.push(Arc::new(research::GetMarketSentiment::new(search.clone())));
        tools.push(Arc::new(research::SearchTechnicalAnalysis::new(
            search.clone(),
        )));
        tools.push(Arc::new(research::SearchGeneralWeb::new(search.clone())));
    }
    ToolRegistry::new(tools)
}

// Small argument accessors shared by the tool impls. Values come from the
// normalizer, but the chat model still controls types, so stay lenient.

pub(crate) fn str_arg<'a>(args: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

pub(crate) fn f64_arg(args: &Map<String, Value>, key: &str) -> Option<f64> {
    match args.get(key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn i64_arg(args: &Map<String, Value>, key: &str) -> Option<i64> {
    f64_arg(args, key).map(|f| f.trunc() as i64)
}

pub(crate) fn usize_arg(args: &Map<String, Value>, key: &str, default: usize) -> usize {
    i64_arg(args, key)
        .filter(|v| *v > 0)
        .map(|v| v as usize)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn trade_action_classification() {
        assert_eq!(trade_action("place_option_order"), Some("options_trade"));
        assert_eq!(
            trade_action("place_multi_leg_option_order"),
            Some("options_trade")
        );
        assert_eq!(trade_action("close_option_position"), Some("close_position"));
        assert_eq!(trade_action("get_account_info"), None);
    }

    #[test]
    fn lenient_numeric_args() {
        let mut args = Map::new();
        args.insert("a".to_string(), json!("2.5"));
        args.insert("b".to_string(), json!(3));
        assert_eq!(f64_arg(&args, "a"), Some(2.5));
        assert_eq!(i64_arg(&args, "a"), Some(2));
        assert_eq!(i64_arg(&args, "b"), Some(3));
        assert_eq!(i64_arg(&args, "missing"), None);
        assert_eq!(usize_arg(&args, "missing", 7), 7);
    }
}
