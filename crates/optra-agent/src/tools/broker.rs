//! Brokerage and market data tools.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, Local, Utc};
use serde_json::{json, Map, Value};

use optra_broker::client::Brokerage;
use optra_broker::types::{ContractFilter, OptionContract, Order, OrderLeg, OrderRequest};
use optra_broker::BrokerError;

use crate::error::AgentError;
use crate::registry::{function_schema, Tool};
use crate::tools::{f64_arg, i64_arg, str_arg, usize_arg, ToolContext};

const VALID_TIF: [&str; 5] = ["day", "gtc", "opg", "ioc", "fok"];

fn time_in_force(args: &Map<String, Value>) -> String {
    let raw = str_arg(args, "time_in_force").unwrap_or("day").to_lowercase();
    if VALID_TIF.contains(&raw.as_str()) {
        raw
    } else {
        "day".to_string()
    }
}

fn require_str(args: &Map<String, Value>, key: &str, tool: &str) -> Result<String, AgentError> {
    str_arg(args, key)
        .map(|s| s.to_string())
        .ok_or_else(|| AgentError::Validation(format!("{tool} requires a string '{key}' argument")))
}

fn order_result(order: &Order) -> Value {
    json!({
        "order_id": order.id,
        "symbol": order.symbol,
        "side": order.side,
        "quantity": order.qty,
        "order_type": order.order_type,
        "status": order.status,
        "submitted_at": order.submitted_at,
        "filled_avg_price": order.filled_avg_price,
    })
}

fn contract_result(contract: &OptionContract) -> Value {
    json!({
        "symbol": contract.symbol,
        "underlying_symbol": contract.underlying_symbol,
        "strike_price": contract.strike_price,
        "expiration_date": contract.expiration_date,
        "type": contract.contract_type,
        "style": contract.style,
        "open_interest": contract.open_interest.unwrap_or(0),
        "close_price": contract.close_price,
    })
}

pub struct GetAccountInfo {
    brokerage: Arc<dyn Brokerage>,
}

impl GetAccountInfo {
    pub fn new(ctx: &ToolContext) -> Self {
        Self {
            brokerage: ctx.brokerage.clone(),
        }
    }
}

#[async_trait]
impl Tool for GetAccountInfo {
    fn name(&self) -> &'static str {
        "get_account_info"
    }

    fn schema(&self) -> Value {
        function_schema(
            self.name(),
            "Get account balance, buying power, portfolio value, and trading status.",
            json!({"type": "object", "properties": {}}),
        )
    }

    async fn call(&self, _args: &Map<String, Value>) -> Result<Value, AgentError> {
        let account = self.brokerage.account().await?;
        Ok(json!({
            "account_id": account.id,
            "buying_power": account.buying_power,
            "cash": account.cash,
            "portfolio_value": account.portfolio_value,
            "equity": account.equity,
            "long_market_value": account.long_market_value,
            "status": account.status,
            "trading_blocked": account.trading_blocked,
        }))
    }
}

pub struct GetPositions {
    brokerage: Arc<dyn Brokerage>,
}

impl GetPositions {
    pub fn new(ctx: &ToolContext) -> Self {
        Self {
            brokerage: ctx.brokerage.clone(),
        }
    }
}

#[async_trait]
impl Tool for GetPositions {
    fn name(&self) -> &'static str {
        "get_positions"
    }

    fn schema(&self) -> Value {
        function_schema(
            self.name(),
            "List all open positions (equities and options) with market value and P&L.",
            json!({"type": "object", "properties": {}}),
        )
    }

    async fn call(&self, _args: &Map<String, Value>) -> Result<Value, AgentError> {
        let positions = self.brokerage.positions().await?;
        let list: Vec<Value> = positions
            .iter()
            .map(|p| {
                json!({
                    "symbol": p.symbol,
                    "quantity": p.qty,
                    "side": p.side,
                    "market_value": p.market_value,
                    "cost_basis": p.cost_basis,
                    "unrealized_pl": p.unrealized_pl,
                    "unrealized_pl_percent": p.unrealized_plpc.map(|v| v * 100.0),
                    "current_price": p.current_price,
                    "asset_class": p.asset_class.as_deref().unwrap_or("unknown"),
                })
            })
            .collect();
        Ok(Value::Array(list))
    }
}

pub struct GetOptionContracts {
    brokerage: Arc<dyn Brokerage>,
}

impl GetOptionContracts {
    pub fn new(ctx: &ToolContext) -> Self {
        Self {
            brokerage: ctx.brokerage.clone(),
        }
    }
}

#[async_trait]
impl Tool for GetOptionContracts {
    fn name(&self) -> &'static str {
        "get_option_contracts"
    }

    fn schema(&self) -> Value {
        function_schema(
            self.name(),
            "List option contracts for an underlying, filtered by type, expiration, and strike.",
            json!({
                "type": "object",
                "properties": {
                    "underlying_symbol": {"type": "string", "description": "Underlying ticker, e.g. SPY"},
                    "contract_type": {"type": "string", "enum": ["call", "put"]},
                    "expiration_date_gte": {"type": "string", "description": "YYYY-MM-DD"},
                    "expiration_date_lte": {"type": "string", "description": "YYYY-MM-DD"},
                    "strike_price_gte": {"type": "number"},
                    "strike_price_lte": {"type": "number"},
                    "limit": {"type": "integer"}
                },
                "required": ["underlying_symbol"]
            }),
        )
    }

    async fn call(&self, args: &Map<String, Value>) -> Result<Value, AgentError> {
        let underlying = require_str(args, "underlying_symbol", self.name())?;
        let filter = ContractFilter {
            underlying_symbol: underlying,
            contract_type: Some(
                str_arg(args, "contract_type")
                    .unwrap_or("call")
                    .to_lowercase(),
            ),
            expiration_date: None,
            expiration_date_gte: str_arg(args, "expiration_date_gte").map(String::from),
            expiration_date_lte: str_arg(args, "expiration_date_lte").map(String::from),
            strike_price_gte: f64_arg(args, "strike_price_gte"),
            strike_price_lte: f64_arg(args, "strike_price_lte"),
            limit: usize_arg(args, "limit", 100),
        };
        let contracts = self.brokerage.option_contracts(&filter).await?;
        Ok(Value::Array(contracts.iter().map(contract_result).collect()))
    }
}

pub struct GetOptionsChain {
    brokerage: Arc<dyn Brokerage>,
}

impl GetOptionsChain {
    pub fn new(ctx: &ToolContext) -> Self {
        Self {
            brokerage: ctx.brokerage.clone(),
        }
    }
}

#[async_trait]
impl Tool for GetOptionsChain {
    fn name(&self) -> &'static str {
        "get_options_chain"
    }

    fn schema(&self) -> Value {
        function_schema(
            self.name(),
            "Snapshot of the options chain around the underlying's current price: \
             calls at/above it, puts at/below it.",
            json!({
                "type": "object",
                "properties": {
                    "underlying_symbol": {"type": "string"},
                    "expiration_date": {"type": "string", "description": "YYYY-MM-DD"},
                    "contract_type": {"type": "string", "enum": ["call", "put"]},
                    "limit": {"type": "integer", "description": "Max contracts to return"}
                },
                "required": ["underlying_symbol"]
            }),
        )
    }

    async fn call(&self, args: &Map<String, Value>) -> Result<Value, AgentError> {
        let underlying = require_str(args, "underlying_symbol", self.name())?;
        let limit = usize_arg(args, "limit", 10);

        let quote = self.brokerage.latest_equity_quote(&underlying).await?;
        let reference_price = quote.reference_price().ok_or_else(|| {
            AgentError::Broker(BrokerError::NoData(format!(
                "missing price data for {underlying}"
            )))
        })?;

        let filter = ContractFilter {
            underlying_symbol: underlying.clone(),
            contract_type: None,
            expiration_date: str_arg(args, "expiration_date").map(String::from),
            expiration_date_gte: None,
            expiration_date_lte: None,
            strike_price_gte: None,
            strike_price_lte: None,
            limit: 1000,
        };
        let contracts = self.brokerage.option_contracts(&filter).await?;

        let mut calls: Vec<&OptionContract> = contracts
            .iter()
            .filter(|c| c.contract_type.eq_ignore_ascii_case("call"))
            .filter(|c| c.strike_price >= reference_price)
            .collect();
        calls.sort_by(|a, b| a.strike_price.total_cmp(&b.strike_price));

        let mut puts: Vec<&OptionContract> = contracts
            .iter()
            .filter(|c| c.contract_type.eq_ignore_ascii_case("put"))
            .filter(|c| c.strike_price <= reference_price)
            .collect();
        puts.sort_by(|a, b| b.strike_price.total_cmp(&a.strike_price));

        let selected: Vec<&OptionContract> = match str_arg(args, "contract_type")
            .map(|t| t.to_lowercase())
            .as_deref()
        {
            Some("call") => calls.into_iter().take(limit).collect(),
            Some("put") => puts.into_iter().take(limit).collect(),
            _ => {
                let half = (limit / 2).max(1);
                calls
                    .into_iter()
                    .take(half)
                    .chain(puts.into_iter().take(half))
                    .collect()
            }
        };

        let chain: Vec<Value> = selected
            .iter()
            .map(|c| {
                json!({
                    "symbol": c.symbol,
                    "type": c.contract_type,
                    "strike_price": c.strike_price,
                    "expiration_date": c.expiration_date,
                    "open_interest": c.open_interest.unwrap_or(0),
                })
            })
            .collect();

        Ok(json!({
            "underlying_symbol": underlying,
            "reference_price": reference_price,
            "contracts": chain,
            "timestamp": Utc::now().to_rfc3339(),
        }))
    }
}

pub struct GetOptionQuote {
    brokerage: Arc<dyn Brokerage>,
}

impl GetOptionQuote {
    pub fn new(ctx: &ToolContext) -> Self {
        Self {
            brokerage: ctx.brokerage.clone(),
        }
    }
}

#[async_trait]
impl Tool for GetOptionQuote {
    fn name(&self) -> &'static str {
        "get_option_quote"
    }

    fn schema(&self) -> Value {
        function_schema(
            self.name(),
            "Latest bid/ask for an option contract, with greeks when available.",
            json!({
                "type": "object",
                "properties": {
                    "symbol": {"type": "string", "description": "OCC option symbol"}
                },
                "required": ["symbol"]
            }),
        )
    }

    async fn call(&self, args: &Map<String, Value>) -> Result<Value, AgentError> {
        let symbol = require_str(args, "symbol", self.name())?;
        let quote = self.brokerage.latest_option_quote(&symbol).await?;
        let greeks = quote.greeks.clone().unwrap_or_default();
        Ok(json!({
            "symbol": symbol,
            "bid_price": quote.bid_price,
            "ask_price": quote.ask_price,
            "mid_price": quote.mid_price(),
            "bid_size": quote.bid_size,
            "ask_size": quote.ask_size,
            "timestamp": quote.timestamp,
            "delta": greeks.delta,
            "gamma": greeks.gamma,
            "theta": greeks.theta,
            "vega": greeks.vega,
            "rho": greeks.rho,
            "implied_volatility": greeks.implied_volatility,
        }))
    }
}

pub struct PlaceOptionOrder {
    brokerage: Arc<dyn Brokerage>,
}

impl PlaceOptionOrder {
    pub fn new(ctx: &ToolContext) -> Self {
        Self {
            brokerage: ctx.brokerage.clone(),
        }
    }
}

#[async_trait]
impl Tool for PlaceOptionOrder {
    fn name(&self) -> &'static str {
        "place_option_order"
    }

    fn schema(&self) -> Value {
        function_schema(
            self.name(),
            "Submit a single-leg option order. Market by default; limit orders need limit_price.",
            json!({
                "type": "object",
                "properties": {
                    "symbol": {"type": "string", "description": "OCC option symbol"},
                    "side": {"type": "string", "enum": ["buy", "sell"]},
                    "quantity": {"type": "integer", "description": "Number of contracts"},
                    "order_type": {"type": "string", "enum": ["market", "limit"]},
                    "limit_price": {"type": "number"},
                    "time_in_force": {"type": "string", "enum": ["day", "gtc", "opg", "ioc", "fok"]}
                },
                "required": ["symbol", "side", "quantity"]
            }),
        )
    }

    async fn call(&self, args: &Map<String, Value>) -> Result<Value, AgentError> {
        let symbol = require_str(args, "symbol", self.name())?;
        let side = str_arg(args, "side").unwrap_or("buy").to_string();
        let quantity = i64_arg(args, "quantity").ok_or_else(|| {
            AgentError::Validation(format!("{} requires a numeric quantity", self.name()))
        })?;
        let order_type = str_arg(args, "order_type").unwrap_or("market").to_string();
        let limit_price = f64_arg(args, "limit_price");

        if order_type == "limit" && limit_price.is_none() {
            return Err(AgentError::Validation(
                "Invalid order type or missing limit_price".to_string(),
            ));
        }

        let request = OrderRequest {
            client_order_id: None,
            symbol: Some(symbol),
            side: Some(side),
            qty: quantity.to_string(),
            order_type,
            limit_price: limit_price.map(|p| p.to_string()),
            time_in_force: time_in_force(args),
            order_class: None,
            legs: None,
        };

        let order = self.brokerage.submit_order(&request).await?;
        tracing::info!(
            order_id = %order.id,
            symbol = ?order.symbol,
            status = %order.status,
            "option order submitted"
        );
        Ok(order_result(&order))
    }
}

pub struct PlaceMultiLegOptionOrder {
    brokerage: Arc<dyn Brokerage>,
}

impl PlaceMultiLegOptionOrder {
    pub fn new(ctx: &ToolContext) -> Self {
        Self {
            brokerage: ctx.brokerage.clone(),
        }
    }
}

#[async_trait]
impl Tool for PlaceMultiLegOptionOrder {
    fn name(&self) -> &'static str {
        "place_multi_leg_option_order"
    }

    fn schema(&self) -> Value {
        function_schema(
            self.name(),
            "Submit a multi-leg option strategy order (spread, straddle, condor).",
            json!({
                "type": "object",
                "properties": {
                    "legs": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "symbol": {"type": "string"},
                                "side": {"type": "string", "enum": ["buy", "sell"]},
                                "ratio_qty": {"type": "number"}
                            },
                            "required": ["symbol", "side"]
                        }
                    },
                    "quantity": {"type": "integer"},
                    "order_type": {"type": "string", "enum": ["market", "limit"]},
                    "limit_price": {"type": "number"},
                    "time_in_force": {"type": "string"}
                },
                "required": ["legs", "quantity"]
            }),
        )
    }

    async fn call(&self, args: &Map<String, Value>) -> Result<Value, AgentError> {
        let raw_legs = args
            .get("legs")
            .and_then(Value::as_array)
            .ok_or_else(|| AgentError::Validation("Each leg must be a dictionary".to_string()))?;
        let quantity = i64_arg(args, "quantity").ok_or_else(|| {
            AgentError::Validation(format!("{} requires a numeric quantity", self.name()))
        })?;
        let order_type = str_arg(args, "order_type").unwrap_or("market").to_string();
        let limit_price = f64_arg(args, "limit_price");

        if order_type == "limit" && limit_price.is_none() {
            return Err(AgentError::Validation(
                "Invalid order type or missing limit_price".to_string(),
            ));
        }

        let legs: Vec<OrderLeg> = raw_legs
            .iter()
            .map(|leg| OrderLeg {
                symbol: leg
                    .get("symbol")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                side: leg
                    .get("side")
                    .and_then(Value::as_str)
                    .unwrap_or("buy")
                    .to_string(),
                ratio_qty: leg.get("ratio_qty").and_then(Value::as_f64).unwrap_or(1.0),
            })
            .collect();
        let leg_count = legs.len();

        let request = OrderRequest {
            client_order_id: None,
            symbol: None,
            side: None,
            qty: quantity.to_string(),
            order_type,
            limit_price: limit_price.map(|p| p.to_string()),
            time_in_force: time_in_force(args),
            order_class: Some("mleg".to_string()),
            legs: Some(legs),
        };

        let order = self.brokerage.submit_order(&request).await?;
        tracing::info!(
            order_id = %order.id,
            legs = leg_count,
            status = %order.status,
            "multi-leg option order submitted"
        );
        Ok(json!({
            "order_id": order.id,
            "status": order.status,
            "quantity": order.qty,
            "order_type": order.order_type,
            "submitted_at": order.submitted_at,
            "legs": leg_count,
        }))
    }
}

pub struct CloseOptionPosition {
    brokerage: Arc<dyn Brokerage>,
}

impl CloseOptionPosition {
    pub fn new(ctx: &ToolContext) -> Self {
        Self {
            brokerage: ctx.brokerage.clone(),
        }
    }
}

#[async_trait]
impl Tool for CloseOptionPosition {
    fn name(&self) -> &'static str {
        "close_option_position"
    }

    fn schema(&self) -> Value {
        function_schema(
            self.name(),
            "Close an open option position, fully or for a given number of contracts.",
            json!({
                "type": "object",
                "properties": {
                    "symbol": {"type": "string", "description": "OCC option symbol"},
                    "quantity": {"type": "integer", "description": "Contracts to close; omit for all"}
                },
                "required": ["symbol"]
            }),
        )
    }

    async fn call(&self, args: &Map<String, Value>) -> Result<Value, AgentError> {
        let symbol = require_str(args, "symbol", self.name())?;
        let quantity = i64_arg(args, "quantity");

        // Verify the position exists first so a typo'd symbol gives the
        // model a clear error rather than a broker rejection.
        if let Err(e) = self.brokerage.open_position(&symbol).await {
            return Err(AgentError::Validation(format!(
                "No open position found for {symbol}: {e}"
            )));
        }

        let order = self.brokerage.close_position(&symbol, quantity).await?;
        tracing::info!(order_id = %order.id, symbol = %symbol, "position close submitted");
        Ok(json!({
            "order_id": order.id,
            "symbol": order.symbol.as_deref().unwrap_or(&symbol),
            "quantity": order.qty,
            "status": order.status,
        }))
    }
}

pub struct GetOrderHistory {
    brokerage: Arc<dyn Brokerage>,
}

impl GetOrderHistory {
    pub fn new(ctx: &ToolContext) -> Self {
        Self {
            brokerage: ctx.brokerage.clone(),
        }
    }
}

#[async_trait]
impl Tool for GetOrderHistory {
    fn name(&self) -> &'static str {
        "get_order_history"
    }

    fn schema(&self) -> Value {
        function_schema(
            self.name(),
            "Recent orders with status and fill details.",
            json!({
                "type": "object",
                "properties": {
                    "limit": {"type": "integer", "description": "Max orders to return (default 10)"}
                }
            }),
        )
    }

    async fn call(&self, args: &Map<String, Value>) -> Result<Value, AgentError> {
        let limit = usize_arg(args, "limit", 10);
        let orders = self.brokerage.orders(limit).await?;
        let list: Vec<Value> = orders
            .iter()
            .map(|o| {
                json!({
                    "order_id": o.id,
                    "symbol": o.symbol,
                    "side": o.side,
                    "quantity": o.qty,
                    "filled_qty": o.filled_qty.unwrap_or(0.0),
                    "status": o.status,
                    "order_type": o.order_type,
                    "submitted_at": o.submitted_at,
                    "filled_at": o.filled_at,
                    "filled_avg_price": o.filled_avg_price,
                })
            })
            .collect();
        Ok(Value::Array(list))
    }
}

pub struct CancelOrder {
    brokerage: Arc<dyn Brokerage>,
}

impl CancelOrder {
    pub fn new(ctx: &ToolContext) -> Self {
        Self {
            brokerage: ctx.brokerage.clone(),
        }
    }
}

#[async_trait]
impl Tool for CancelOrder {
    fn name(&self) -> &'static str {
        "cancel_order"
    }

    fn schema(&self) -> Value {
        function_schema(
            self.name(),
            "Cancel a pending order by id.",
            json!({
                "type": "object",
                "properties": {
                    "order_id": {"type": "string"}
                },
                "required": ["order_id"]
            }),
        )
    }

    async fn call(&self, args: &Map<String, Value>) -> Result<Value, AgentError> {
        let order_id = require_str(args, "order_id", self.name())?;
        self.brokerage.cancel_order(&order_id).await?;
        Ok(json!({
            "success": true,
            "order_id": order_id,
            "message": "Order cancelled successfully",
        }))
    }
}

pub struct GetPriceBars {
    brokerage: Arc<dyn Brokerage>,
}

impl GetPriceBars {
    pub fn new(ctx: &ToolContext) -> Self {
        Self {
            brokerage: ctx.brokerage.clone(),
        }
    }
}

#[async_trait]
impl Tool for GetPriceBars {
    fn name(&self) -> &'static str {
        "get_price_bars"
    }

    fn schema(&self) -> Value {
        function_schema(
            self.name(),
            "Historical OHLCV bars for an equity or ETF.",
            json!({
                "type": "object",
                "properties": {
                    "symbol": {"type": "string"},
                    "timeframe": {"type": "string", "enum": ["1Min", "5Min", "15Min", "1Hour", "1Day"]},
                    "limit": {"type": "integer", "description": "Max bars (default 100)"}
                },
                "required": ["symbol"]
            }),
        )
    }

    async fn call(&self, args: &Map<String, Value>) -> Result<Value, AgentError> {
        let symbol = require_str(args, "symbol", self.name())?;
        let timeframe = str_arg(args, "timeframe").unwrap_or("1Hour").to_string();
        let limit = usize_arg(args, "limit", 100);
        let bars = self.brokerage.bars(&symbol, &timeframe, limit).await?;
        let list: Vec<Value> = bars
            .iter()
            .map(|b| {
                json!({
                    "timestamp": b.timestamp,
                    "open": b.open,
                    "high": b.high,
                    "low": b.low,
                    "close": b.close,
                    "volume": b.volume,
                })
            })
            .collect();
        Ok(json!({
            "symbol": symbol,
            "timeframe": timeframe,
            "bars": list,
        }))
    }
}

/// Pure clock tool so the model has temporal awareness.
pub struct GetCurrentDatetime;

#[async_trait]
impl Tool for GetCurrentDatetime {
    fn name(&self) -> &'static str {
        "get_current_datetime"
    }

    fn schema(&self) -> Value {
        function_schema(
            self.name(),
            "Current date, time, and day of week.",
            json!({"type": "object", "properties": {}}),
        )
    }

    async fn call(&self, _args: &Map<String, Value>) -> Result<Value, AgentError> {
        let now = Local::now();
        let weekday = now.weekday();
        Ok(json!({
            "timestamp": now.to_rfc3339(),
            "date": now.format("%Y-%m-%d").to_string(),
            "time": now.format("%H:%M:%S").to_string(),
            "day_of_week": weekday.to_string(),
            "is_weekend": matches!(weekday, chrono::Weekday::Sat | chrono::Weekday::Sun),
            "unix_timestamp": now.timestamp(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use optra_broker::test_support::{sample_option_position, MockBrokerage};
    use optra_ledger::DecisionLedger;

    fn ctx(mock: Arc<MockBrokerage>) -> ToolContext {
        ToolContext {
            brokerage: mock,
            search: None,
            ledger: Arc::new(DecisionLedger::new("/tmp/unused-ledger.json")),
        }
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn account_info_maps_fields() {
        let mock = Arc::new(MockBrokerage::with_portfolio_value(123_456.0));
        let tool = GetAccountInfo::new(&ctx(mock));
        let result = tool.call(&Map::new()).await.unwrap();
        assert_eq!(result["portfolio_value"], json!(123_456.0));
        assert_eq!(result["trading_blocked"], json!(false));
    }

    #[tokio::test]
    async fn place_order_submits_and_echoes() {
        let mock = Arc::new(MockBrokerage::default());
        let tool = PlaceOptionOrder::new(&ctx(mock.clone()));
        let result = tool
            .call(&args(json!({
                "symbol": "SPY260918C00450000",
                "side": "buy",
                "quantity": 1
            })))
            .await
            .unwrap();
        assert_eq!(result["status"], json!("accepted"));
        assert_eq!(result["symbol"], json!("SPY260918C00450000"));

        let submitted = mock.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].qty, "1");
        assert_eq!(submitted[0].order_type, "market");
    }

    #[tokio::test]
    async fn limit_order_requires_limit_price() {
        let mock = Arc::new(MockBrokerage::default());
        let tool = PlaceOptionOrder::new(&ctx(mock));
        let err = tool
            .call(&args(json!({
                "symbol": "SPY260918C00450000",
                "side": "buy",
                "quantity": 1,
                "order_type": "limit"
            })))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("missing limit_price"));
    }

    #[tokio::test]
    async fn multi_leg_order_carries_legs() {
        let mock = Arc::new(MockBrokerage::default());
        let tool = PlaceMultiLegOptionOrder::new(&ctx(mock.clone()));
        let result = tool
            .call(&args(json!({
                "legs": [
                    {"symbol": "SPY260918C00450000", "side": "buy"},
                    {"symbol": "SPY260918C00455000", "side": "sell"}
                ],
                "quantity": 2
            })))
            .await
            .unwrap();
        assert_eq!(result["legs"], json!(2));

        let submitted = mock.submitted.lock().unwrap();
        assert_eq!(submitted[0].order_class.as_deref(), Some("mleg"));
        assert_eq!(submitted[0].legs.as_ref().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn close_position_rejects_unknown_symbol() {
        let mock = Arc::new(MockBrokerage::default());
        let tool = CloseOptionPosition::new(&ctx(mock));
        let err = tool
            .call(&args(json!({"symbol": "SPY260918C00450000"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No open position found"));
    }

    #[tokio::test]
    async fn close_position_closes_existing() {
        let mock = Arc::new(MockBrokerage::default());
        mock.positions
            .lock()
            .unwrap()
            .push(sample_option_position("SPY260918C00450000", 1.0));
        let tool = CloseOptionPosition::new(&ctx(mock));
        let result = tool
            .call(&args(json!({"symbol": "SPY260918C00450000"})))
            .await
            .unwrap();
        assert_eq!(result["status"], json!("accepted"));
    }

    #[tokio::test]
    async fn current_datetime_has_expected_fields() {
        let result = GetCurrentDatetime.call(&Map::new()).await.unwrap();
        assert!(result["date"].as_str().unwrap().len() == 10);
        assert!(result["unix_timestamp"].as_i64().unwrap() > 0);
    }
}
