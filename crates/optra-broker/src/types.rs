//! Wire types for the brokerage REST API.
//!
//! The API serializes most numeric fields as JSON strings ("cash":
//! "100000.25"), so money/quantity fields use lenient deserializers that
//! accept either form.

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Deserialize)]
#[serde(untagged)]
enum NumOrStr {
    Num(f64),
    Str(String),
}

fn f64_lenient<'de, D: Deserializer<'de>>(de: D) -> Result<f64, D::Error> {
    match NumOrStr::deserialize(de)? {
        NumOrStr::Num(n) => Ok(n),
        NumOrStr::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

fn opt_f64_lenient<'de, D: Deserializer<'de>>(de: D) -> Result<Option<f64>, D::Error> {
    match Option::<NumOrStr>::deserialize(de)? {
        None => Ok(None),
        Some(NumOrStr::Num(n)) => Ok(Some(n)),
        Some(NumOrStr::Str(s)) if s.is_empty() => Ok(None),
        Some(NumOrStr::Str(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// Trading account snapshot.
#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub id: String,
    pub status: String,
    #[serde(deserialize_with = "f64_lenient")]
    pub buying_power: f64,
    #[serde(deserialize_with = "f64_lenient")]
    pub cash: f64,
    #[serde(deserialize_with = "f64_lenient")]
    pub portfolio_value: f64,
    #[serde(deserialize_with = "f64_lenient")]
    pub equity: f64,
    #[serde(deserialize_with = "f64_lenient")]
    pub long_market_value: f64,
    #[serde(default)]
    pub trading_blocked: bool,
}

/// An open position, equity or option.
#[derive(Debug, Clone, Deserialize)]
pub struct Position {
    pub symbol: String,
    #[serde(deserialize_with = "f64_lenient")]
    pub qty: f64,
    pub side: String,
    #[serde(default, deserialize_with = "opt_f64_lenient")]
    pub market_value: Option<f64>,
    #[serde(default, deserialize_with = "opt_f64_lenient")]
    pub cost_basis: Option<f64>,
    #[serde(default, deserialize_with = "opt_f64_lenient")]
    pub unrealized_pl: Option<f64>,
    /// Fractional (0.015 = +1.5%).
    #[serde(default, deserialize_with = "opt_f64_lenient")]
    pub unrealized_plpc: Option<f64>,
    #[serde(default, deserialize_with = "opt_f64_lenient")]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub asset_class: Option<String>,
}

impl Position {
    pub fn is_option(&self) -> bool {
        self.asset_class
            .as_deref()
            .map(|c| c.to_ascii_lowercase().contains("option"))
            .unwrap_or(false)
    }
}

/// A listed option contract.
#[derive(Debug, Clone, Deserialize)]
pub struct OptionContract {
    pub symbol: String,
    pub underlying_symbol: String,
    #[serde(deserialize_with = "f64_lenient")]
    pub strike_price: f64,
    pub expiration_date: String,
    #[serde(rename = "type")]
    pub contract_type: String,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub open_interest: Option<u64>,
    #[serde(default, deserialize_with = "opt_f64_lenient")]
    pub close_price: Option<f64>,
}

/// Filters for the option contract listing endpoint.
#[derive(Debug, Clone, Default)]
pub struct ContractFilter {
    pub underlying_symbol: String,
    pub contract_type: Option<String>,
    pub expiration_date: Option<String>,
    pub expiration_date_gte: Option<String>,
    pub expiration_date_lte: Option<String>,
    pub strike_price_gte: Option<f64>,
    pub strike_price_lte: Option<f64>,
    pub limit: usize,
}

/// Latest NBBO quote for an equity.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Quote {
    #[serde(default, rename = "bp")]
    pub bid_price: Option<f64>,
    #[serde(default, rename = "ap")]
    pub ask_price: Option<f64>,
    #[serde(default, rename = "t")]
    pub timestamp: Option<String>,
}

impl Quote {
    /// Midpoint when both sides are quoted, else whichever side exists.
    pub fn reference_price(&self) -> Option<f64> {
        match (self.bid_price, self.ask_price) {
            (Some(b), Some(a)) if b > 0.0 && a > 0.0 => Some((b + a) / 2.0),
            (b, a) => b.filter(|v| *v > 0.0).or(a),
        }
    }
}

/// Option greeks, present when the data feed computes them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Greeks {
    #[serde(default)]
    pub delta: Option<f64>,
    #[serde(default)]
    pub gamma: Option<f64>,
    #[serde(default)]
    pub theta: Option<f64>,
    #[serde(default)]
    pub vega: Option<f64>,
    #[serde(default)]
    pub rho: Option<f64>,
    #[serde(default, alias = "iv")]
    pub implied_volatility: Option<f64>,
}

/// Latest quote for an option contract.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OptionQuote {
    #[serde(default, rename = "bp")]
    pub bid_price: Option<f64>,
    #[serde(default, rename = "ap")]
    pub ask_price: Option<f64>,
    #[serde(default, rename = "bs")]
    pub bid_size: Option<u64>,
    #[serde(default, rename = "as")]
    pub ask_size: Option<u64>,
    #[serde(default, rename = "t")]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub greeks: Option<Greeks>,
}

impl OptionQuote {
    pub fn mid_price(&self) -> Option<f64> {
        match (self.bid_price, self.ask_price) {
            (Some(b), Some(a)) => Some((b + a) / 2.0),
            _ => None,
        }
    }
}

/// One leg of a multi-leg order.
#[derive(Debug, Clone, Serialize)]
pub struct OrderLeg {
    pub symbol: String,
    pub side: String,
    pub ratio_qty: f64,
}

/// Order submission payload.
///
/// Single-leg orders set `symbol` and `side`; multi-leg orders set
/// `order_class: "mleg"` and `legs` instead.
#[derive(Debug, Clone, Serialize)]
pub struct OrderRequest {
    /// Client-assigned id; filled in at submission when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side: Option<String>,
    pub qty: String,
    #[serde(rename = "type")]
    pub order_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<String>,
    pub time_in_force: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legs: Option<Vec<OrderLeg>>,
}

/// An order as reported by the brokerage.
#[derive(Debug, Clone, Deserialize)]
pub struct Order {
    pub id: String,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub side: Option<String>,
    #[serde(default, deserialize_with = "opt_f64_lenient")]
    pub qty: Option<f64>,
    #[serde(default, deserialize_with = "opt_f64_lenient")]
    pub filled_qty: Option<f64>,
    #[serde(default, rename = "type")]
    pub order_type: Option<String>,
    pub status: String,
    #[serde(default)]
    pub submitted_at: Option<String>,
    #[serde(default)]
    pub filled_at: Option<String>,
    #[serde(default, deserialize_with = "opt_f64_lenient")]
    pub filled_avg_price: Option<f64>,
    #[serde(default)]
    pub asset_class: Option<String>,
}

/// OHLCV bar.
#[derive(Debug, Clone, Deserialize)]
pub struct Bar {
    #[serde(rename = "t")]
    pub timestamp: String,
    #[serde(rename = "o")]
    pub open: f64,
    #[serde(rename = "h")]
    pub high: f64,
    #[serde(rename = "l")]
    pub low: f64,
    #[serde(rename = "c")]
    pub close: f64,
    #[serde(rename = "v")]
    pub volume: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_accepts_string_numbers() {
        let json = r#"{
            "id": "acct-1",
            "status": "ACTIVE",
            "buying_power": "200000.50",
            "cash": "100000.25",
            "portfolio_value": "105000",
            "equity": "105000",
            "long_market_value": "5000",
            "trading_blocked": false
        }"#;
        let account: Account = serde_json::from_str(json).unwrap();
        assert_eq!(account.buying_power, 200_000.50);
        assert_eq!(account.cash, 100_000.25);
        assert!(!account.trading_blocked);
    }

    #[test]
    fn position_detects_option_asset_class() {
        let json = r#"{
            "symbol": "AAPL260918C00230000",
            "qty": "2",
            "side": "long",
            "asset_class": "us_option"
        }"#;
        let position: Position = serde_json::from_str(json).unwrap();
        assert!(position.is_option());
        assert_eq!(position.qty, 2.0);
    }

    #[test]
    fn quote_reference_price_prefers_mid() {
        let quote = Quote {
            bid_price: Some(100.0),
            ask_price: Some(101.0),
            timestamp: None,
        };
        assert_eq!(quote.reference_price(), Some(100.5));

        let bid_only = Quote {
            bid_price: Some(100.0),
            ask_price: None,
            timestamp: None,
        };
        assert_eq!(bid_only.reference_price(), Some(100.0));
    }

    #[test]
    fn order_request_omits_empty_fields() {
        let request = OrderRequest {
            client_order_id: None,
            symbol: Some("SPY260918C00450000".to_string()),
            side: Some("buy".to_string()),
            qty: "1".to_string(),
            order_type: "market".to_string(),
            limit_price: None,
            time_in_force: "day".to_string(),
            order_class: None,
            legs: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("limit_price"));
        assert!(!json.contains("legs"));
        assert!(json.contains("\"type\":\"market\""));
    }

    #[test]
    fn option_quote_greeks_alias() {
        let json = r#"{"bp": 1.1, "ap": 1.3, "greeks": {"delta": 0.45, "iv": 0.32}}"#;
        let quote: OptionQuote = serde_json::from_str(json).unwrap();
        assert_eq!(quote.mid_price(), Some(1.2000000000000002));
        let greeks = quote.greeks.unwrap();
        assert_eq!(greeks.delta, Some(0.45));
        assert_eq!(greeks.implied_volatility, Some(0.32));
    }
}
