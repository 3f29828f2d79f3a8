//! Scriptable mock clients for tests.
//!
//! Compiled unconditionally so dependent crates' integration tests can use
//! them; production code never constructs these.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::client::Brokerage;
use crate::error::BrokerError;
use crate::search::{SearchOptions, SearchProvider, SearchResult};
use crate::types::{
    Account, Bar, ContractFilter, OptionContract, OptionQuote, Order, OrderRequest, Position, Quote,
};

/// In-memory brokerage with canned data and recorded order flow.
pub struct MockBrokerage {
    pub account: Mutex<Option<Account>>,
    pub positions: Mutex<Vec<Position>>,
    pub contracts: Mutex<Vec<OptionContract>>,
    pub equity_quote: Mutex<Quote>,
    pub option_quote: Mutex<OptionQuote>,
    pub bars: Mutex<Vec<Bar>>,
    pub order_log: Mutex<Vec<Order>>,
    /// Every order request that reached `submit_order`.
    pub submitted: Mutex<Vec<OrderRequest>>,
    /// When set, every call fails with an API error.
    pub fail: AtomicBool,
    next_order: AtomicU64,
}

impl Default for MockBrokerage {
    fn default() -> Self {
        Self {
            account: Mutex::new(Some(sample_account(100_000.0))),
            positions: Mutex::new(Vec::new()),
            contracts: Mutex::new(Vec::new()),
            equity_quote: Mutex::new(Quote {
                bid_price: Some(449.5),
                ask_price: Some(450.5),
                timestamp: None,
            }),
            option_quote: Mutex::new(OptionQuote::default()),
            bars: Mutex::new(Vec::new()),
            order_log: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
            next_order: AtomicU64::new(1),
        }
    }
}

impl MockBrokerage {
    pub fn with_portfolio_value(value: f64) -> Self {
        let mock = Self::default();
        *mock.account.lock().unwrap() = Some(sample_account(value));
        mock
    }

    fn check_fail(&self) -> Result<(), BrokerError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(BrokerError::Api {
                status: 500,
                body: "mock failure".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

pub fn sample_account(portfolio_value: f64) -> Account {
    serde_json::from_value(serde_json::json!({
        "id": "mock-account",
        "status": "ACTIVE",
        "buying_power": portfolio_value * 2.0,
        "cash": portfolio_value / 2.0,
        "portfolio_value": portfolio_value,
        "equity": portfolio_value,
        "long_market_value": portfolio_value / 2.0,
        "trading_blocked": false
    }))
    .unwrap()
}

pub fn sample_option_position(symbol: &str, qty: f64) -> Position {
    serde_json::from_value(serde_json::json!({
        "symbol": symbol,
        "qty": qty,
        "side": "long",
        "market_value": 550.0,
        "cost_basis": 500.0,
        "unrealized_pl": 50.0,
        "unrealized_plpc": 0.1,
        "current_price": 5.5,
        "asset_class": "us_option"
    }))
    .unwrap()
}

/// Bars with linearly changing closes, step may be negative.
pub fn sample_bars(start: f64, step: f64, count: usize) -> Vec<Bar> {
    (0..count)
        .map(|i| {
            let close = start + step * i as f64;
            serde_json::from_value(serde_json::json!({
                "t": format!("2026-08-{:02}T15:00:00Z", (i % 27) + 1),
                "o": close - 0.5,
                "h": close + 0.5,
                "l": close - 1.0,
                "c": close,
                "v": 10_000.0
            }))
            .unwrap()
        })
        .collect()
}

#[async_trait]
impl Brokerage for MockBrokerage {
    async fn account(&self) -> Result<Account, BrokerError> {
        self.check_fail()?;
        self.account
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| BrokerError::NoData("account unavailable".to_string()))
    }

    async fn positions(&self) -> Result<Vec<Position>, BrokerError> {
        self.check_fail()?;
        Ok(self.positions.lock().unwrap().clone())
    }

    async fn open_position(&self, symbol: &str) -> Result<Position, BrokerError> {
        self.check_fail()?;
        self.positions
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.symbol == symbol)
            .cloned()
            .ok_or_else(|| BrokerError::NoData(format!("no open position for {symbol}")))
    }

    async fn close_position(&self, symbol: &str, qty: Option<i64>) -> Result<Order, BrokerError> {
        self.check_fail()?;
        let position = self.open_position(symbol).await?;
        let id = self.next_order.fetch_add(1, Ordering::SeqCst);
        Ok(serde_json::from_value(serde_json::json!({
            "id": format!("mock-close-{id}"),
            "symbol": symbol,
            "side": "sell",
            "qty": qty.map(|q| q as f64).unwrap_or(position.qty),
            "type": "market",
            "status": "accepted",
            "submitted_at": "2026-08-28T14:30:00Z"
        }))
        .unwrap())
    }

    async fn option_contracts(
        &self,
        filter: &ContractFilter,
    ) -> Result<Vec<OptionContract>, BrokerError> {
        self.check_fail()?;
        let contracts = self.contracts.lock().unwrap();
        Ok(contracts
            .iter()
            .filter(|c| c.underlying_symbol == filter.underlying_symbol)
            .filter(|c| {
                filter
                    .contract_type
                    .as_deref()
                    .map(|t| c.contract_type.eq_ignore_ascii_case(t))
                    .unwrap_or(true)
            })
            .take(filter.limit.max(1))
            .cloned()
            .collect())
    }

    async fn latest_equity_quote(&self, _symbol: &str) -> Result<Quote, BrokerError> {
        self.check_fail()?;
        Ok(self.equity_quote.lock().unwrap().clone())
    }

    async fn latest_option_quote(&self, _symbol: &str) -> Result<OptionQuote, BrokerError> {
        self.check_fail()?;
        Ok(self.option_quote.lock().unwrap().clone())
    }

    async fn submit_order(&self, request: &OrderRequest) -> Result<Order, BrokerError> {
        self.check_fail()?;
        self.submitted.lock().unwrap().push(request.clone());
        let id = self.next_order.fetch_add(1, Ordering::SeqCst);
        Ok(serde_json::from_value(serde_json::json!({
            "id": format!("mock-order-{id}"),
            "symbol": request.symbol,
            "side": request.side,
            "qty": request.qty,
            "type": request.order_type,
            "status": "accepted",
            "submitted_at": "2026-08-28T14:30:00Z"
        }))
        .unwrap())
    }

    async fn orders(&self, limit: usize) -> Result<Vec<Order>, BrokerError> {
        self.check_fail()?;
        let orders = self.order_log.lock().unwrap();
        Ok(orders.iter().take(limit.max(1)).cloned().collect())
    }

    async fn cancel_order(&self, _order_id: &str) -> Result<(), BrokerError> {
        self.check_fail()?;
        Ok(())
    }

    async fn bars(
        &self,
        symbol: &str,
        _timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Bar>, BrokerError> {
        self.check_fail()?;
        let bars = self.bars.lock().unwrap();
        if bars.is_empty() {
            return Err(BrokerError::NoData(format!("no bars for {symbol}")));
        }
        let skip = bars.len().saturating_sub(limit.max(1));
        Ok(bars.iter().skip(skip).cloned().collect())
    }
}

/// Search provider returning fixed results and recording queries.
#[derive(Default)]
pub struct MockSearch {
    pub results: Mutex<Vec<SearchResult>>,
    pub queries: Mutex<Vec<String>>,
    pub fail: AtomicBool,
}

impl MockSearch {
    pub fn with_results(results: Vec<SearchResult>) -> Self {
        Self {
            results: Mutex::new(results),
            ..Self::default()
        }
    }
}

#[async_trait]
impl SearchProvider for MockSearch {
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, BrokerError> {
        self.queries.lock().unwrap().push(query.to_string());
        if self.fail.load(Ordering::SeqCst) {
            return Err(BrokerError::Api {
                status: 500,
                body: "mock failure".to_string(),
            });
        }
        let results = self.results.lock().unwrap();
        Ok(results
            .iter()
            .take(options.max_results.max(1))
            .cloned()
            .collect())
    }
}
