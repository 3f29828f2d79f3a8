//! End-to-end cycle scenarios over a scripted chat model and mock clients.

use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;

use optra_agent::test_support::ScriptedChat;
use optra_agent::tools::ToolContext;
use optra_agent::AgentRunner;
use optra_broker::test_support::MockBrokerage;
use optra_ledger::DecisionLedger;
use optra_models::chat::Role;
use optra_models::config::AgentConfig;

fn agent_config(max_cycles: u64) -> AgentConfig {
    AgentConfig {
        interval_seconds: 0,
        max_tool_iterations: 10,
        history_cap: 50,
        max_cycles: Some(max_cycles),
    }
}

fn context(dir: &TempDir, brokerage: Arc<MockBrokerage>) -> ToolContext {
    ToolContext {
        brokerage,
        search: None,
        ledger: Arc::new(DecisionLedger::new(dir.path().join("decisions.json"))),
    }
}

#[tokio::test]
async fn aliased_trade_is_normalized_dispatched_and_recorded() {
    let dir = TempDir::new().unwrap();
    let brokerage = Arc::new(MockBrokerage::with_portfolio_value(100_000.0));
    let ctx = context(&dir, brokerage.clone());

    let chat = Arc::new(ScriptedChat::new(vec![
        ScriptedChat::tool_call_response(
            "RSI oversold, buying a call.",
            "place_option_order",
            json!({
                "symbol": "SPY260918C00450000",
                "side": "Long",
                "qty": "2.0",
                "orderType": "MarketOrder"
            }),
        ),
        ScriptedChat::text_response("Order placed, done for this cycle."),
    ]));

    let runner = AgentRunner::new(chat, ctx.clone(), agent_config(1));
    runner.run().await.unwrap();

    let submitted = brokerage.submitted.lock().unwrap();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].qty, "2");
    assert_eq!(submitted[0].side.as_deref(), Some("buy"));
    assert_eq!(submitted[0].order_type, "market");

    let records = ctx.ledger.load();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].decision_id, 1);
    assert_eq!(records[0].action, "options_trade");
    assert_eq!(records[0].reasoning, "RSI oversold, buying a call.");
    assert_eq!(records[0].parameters["quantity"], json!(2));
    assert_eq!(records[0].portfolio_value, Some(100_000.0));
}

#[tokio::test]
async fn root_level_tool_calls_are_dispatched() {
    let dir = TempDir::new().unwrap();
    let brokerage = Arc::new(MockBrokerage::with_portfolio_value(77_000.0));
    let ctx = context(&dir, brokerage);

    let chat = Arc::new(ScriptedChat::new(vec![json!({
        "message": {"role": "assistant", "content": ""},
        "tool_calls": [{"name": "get_account_info", "arguments": {}}]
    })]));

    let runner = AgentRunner::new(chat.clone(), ctx, agent_config(1));
    runner.run().await.unwrap();

    // The second model call must carry the tool result in history.
    let requests = chat.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    let tool_messages: Vec<_> = requests[1]
        .iter()
        .filter(|m| m.role == Role::Tool)
        .collect();
    assert_eq!(tool_messages.len(), 1);
    assert!(tool_messages[0].content.contains("77000"));
}

#[tokio::test]
async fn missing_arguments_produce_error_result_and_no_ledger_entry() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir, Arc::new(MockBrokerage::default()));

    let chat = Arc::new(ScriptedChat::new(vec![
        ScriptedChat::tool_call_response(
            "Placing an order.",
            "place_option_order",
            json!({"side": "buy", "quantity": 1}),
        ),
        ScriptedChat::text_response("Understood, I will gather the symbol first."),
    ]));

    let runner = AgentRunner::new(chat.clone(), ctx.clone(), agent_config(1));
    runner.run().await.unwrap();

    assert!(ctx.ledger.load().is_empty());

    let requests = chat.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    let history = &requests[1];
    let tool_message = history.iter().find(|m| m.role == Role::Tool).unwrap();
    assert!(tool_message.content.contains("missing required arguments"));
    // A corrective user message follows the error result.
    let corrective = history
        .iter()
        .filter(|m| m.role == Role::User)
        .last()
        .unwrap();
    assert!(corrective.content.contains("place_option_order"));
    assert!(corrective.content.contains("failed"));
}

#[tokio::test]
async fn unknown_tool_lists_available_and_cycle_continues() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir, Arc::new(MockBrokerage::default()));

    let chat = Arc::new(ScriptedChat::new(vec![
        ScriptedChat::tool_call_response("Trying a tool.", "fetch_moon_phase", json!({})),
        ScriptedChat::text_response("No such tool, holding."),
    ]));

    let runner = AgentRunner::new(chat.clone(), ctx, agent_config(1));
    runner.run().await.unwrap();

    let requests = chat.requests.lock().unwrap();
    let tool_message = requests[1].iter().find(|m| m.role == Role::Tool).unwrap();
    assert!(tool_message.content.contains("Unknown tool 'fetch_moon_phase'"));
    assert!(tool_message.content.contains("place_option_order"));
    assert!(tool_message.content.contains("get_account_info"));
}

#[tokio::test]
async fn history_is_capped_with_system_message_pinned() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir, Arc::new(MockBrokerage::default()));

    // Each cycle burns a user prompt, one tool round, and a closing message;
    // 12 cycles with cap 10 forces repeated trimming.
    let mut script = Vec::new();
    for _ in 0..12 {
        script.push(ScriptedChat::tool_call_response(
            "Checking the clock.",
            "get_current_datetime",
            json!({}),
        ));
        script.push(ScriptedChat::text_response("Nothing to do."));
    }
    let chat = Arc::new(ScriptedChat::new(script));

    let config = AgentConfig {
        interval_seconds: 0,
        max_tool_iterations: 10,
        history_cap: 10,
        max_cycles: Some(12),
    };
    let runner = AgentRunner::new(chat.clone(), ctx, config);
    runner.run().await.unwrap();

    let requests = chat.requests.lock().unwrap();
    // First request of the final cycle: trimmed history plus the new prompt.
    let cycle_start = &requests[requests.len() - 2];
    assert!(
        cycle_start.len() <= 11,
        "history grew to {}",
        cycle_start.len()
    );
    let last = requests.last().unwrap();
    assert_eq!(last[0].role, Role::System);
    assert!(last[0].content.contains("AUTONOMOUS options trading agent"));
    // Everything after the pinned system message is recent traffic.
    assert!(last[1..].iter().all(|m| m.role != Role::System));
}

#[tokio::test]
async fn multi_leg_trade_records_close_and_trade_actions() {
    let dir = TempDir::new().unwrap();
    let brokerage = Arc::new(MockBrokerage::default());
    brokerage.positions.lock().unwrap().push(
        optra_broker::test_support::sample_option_position("SPY260918C00450000", 2.0),
    );
    let ctx = context(&dir, brokerage.clone());

    let chat = Arc::new(ScriptedChat::new(vec![
        ScriptedChat::tool_call_response(
            "Rolling into a spread.",
            "close_option_position",
            json!({"symbol": "SPY260918C00450000"}),
        ),
        ScriptedChat::tool_call_response(
            "Now opening the spread.",
            "place_multi_leg_option_order",
            json!({
                "legs": [
                    {"symbol": "SPY261016C00455000", "side": "Long"},
                    {"symbol": "SPY261016C00460000", "side": "Short"}
                ],
                "qty": 1
            }),
        ),
        ScriptedChat::text_response("Spread on, done."),
    ]));

    let runner = AgentRunner::new(chat, ctx.clone(), agent_config(1));
    runner.run().await.unwrap();

    let records = ctx.ledger.load();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].action, "close_position");
    assert_eq!(records[1].action, "options_trade");
    assert_eq!(records[1].decision_id, 2);
    assert_eq!(records[1].reasoning, "Now opening the spread.");

    let submitted = brokerage.submitted.lock().unwrap();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].order_class.as_deref(), Some("mleg"));
    let legs = submitted[0].legs.as_ref().unwrap();
    assert_eq!(legs[0].side, "buy");
    assert_eq!(legs[1].side, "sell");
}

#[tokio::test]
async fn broker_outage_does_not_kill_the_loop() {
    let dir = TempDir::new().unwrap();
    let brokerage = Arc::new(MockBrokerage::default());
    brokerage
        .fail
        .store(true, std::sync::atomic::Ordering::SeqCst);
    let ctx = context(&dir, brokerage);

    let chat = Arc::new(ScriptedChat::new(vec![
        ScriptedChat::tool_call_response("Checking account.", "get_account_info", json!({})),
        ScriptedChat::text_response("Broker down, holding."),
        ScriptedChat::text_response("Still holding."),
    ]));

    // Two cycles: the first sees the failure, the second must still run.
    let runner = AgentRunner::new(chat.clone(), ctx, agent_config(2));
    runner.run().await.unwrap();

    let requests = chat.requests.lock().unwrap();
    assert_eq!(requests.len(), 3);
    let tool_message = requests[1].iter().find(|m| m.role == Role::Tool).unwrap();
    assert!(tool_message.content.contains("error"));
    // The second cycle's prompt substitutes a placeholder for the snapshot.
    let second_cycle_prompt = requests[2]
        .iter()
        .filter(|m| m.role == Role::User)
        .last()
        .unwrap();
    assert!(second_cycle_prompt.content.contains("unavailable"));
}
