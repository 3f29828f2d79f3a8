//! Brokerage REST client.
//!
//! `Brokerage` is the seam the tool layer depends on; `AlpacaClient` is the
//! production implementation. Tests use the mock in `test_support`.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use optra_models::config::BrokerConfig;

use crate::error::BrokerError;
use crate::types::{
    Account, Bar, ContractFilter, OptionContract, OptionQuote, Order, OrderRequest, Position, Quote,
};

/// Timeframes accepted by the bars endpoint.
pub const VALID_TIMEFRAMES: [&str; 5] = ["1Min", "5Min", "15Min", "1Hour", "1Day"];

#[async_trait]
pub trait Brokerage: Send + Sync {
    async fn account(&self) -> Result<Account, BrokerError>;
    async fn positions(&self) -> Result<Vec<Position>, BrokerError>;
    /// Errors with `NoData` when no open position exists for the symbol.
    async fn open_position(&self, symbol: &str) -> Result<Position, BrokerError>;
    async fn close_position(&self, symbol: &str, qty: Option<i64>) -> Result<Order, BrokerError>;
    async fn option_contracts(
        &self,
        filter: &ContractFilter,
    ) -> Result<Vec<OptionContract>, BrokerError>;
    async fn latest_equity_quote(&self, symbol: &str) -> Result<Quote, BrokerError>;
    async fn latest_option_quote(&self, symbol: &str) -> Result<OptionQuote, BrokerError>;
    async fn submit_order(&self, request: &OrderRequest) -> Result<Order, BrokerError>;
    async fn orders(&self, limit: usize) -> Result<Vec<Order>, BrokerError>;
    async fn cancel_order(&self, order_id: &str) -> Result<(), BrokerError>;
    async fn bars(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Bar>, BrokerError>;
}

pub struct AlpacaClient {
    http: reqwest::Client,
    trading_base: String,
    data_base: String,
}

#[derive(Deserialize)]
struct ContractsEnvelope {
    #[serde(default)]
    option_contracts: Vec<OptionContract>,
}

#[derive(Deserialize)]
struct StockQuoteEnvelope {
    quote: Quote,
}

#[derive(Deserialize)]
struct OptionQuotesEnvelope {
    #[serde(default)]
    quotes: HashMap<String, OptionQuote>,
}

#[derive(Deserialize)]
struct BarsEnvelope {
    #[serde(default)]
    bars: Vec<Bar>,
}

impl AlpacaClient {
    /// Build a client from config, reading credentials from the environment
    /// variables the config names.
    pub fn from_config(config: &BrokerConfig) -> Result<Self, BrokerError> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| BrokerError::Credentials(config.api_key_env.clone()))?;
        let secret_key = std::env::var(&config.secret_key_env)
            .map_err(|_| BrokerError::Credentials(config.secret_key_env.clone()))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            "APCA-API-KEY-ID",
            HeaderValue::from_str(&api_key)
                .map_err(|_| BrokerError::Credentials(config.api_key_env.clone()))?,
        );
        headers.insert(
            "APCA-API-SECRET-KEY",
            HeaderValue::from_str(&secret_key)
                .map_err(|_| BrokerError::Credentials(config.secret_key_env.clone()))?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        tracing::info!(
            live = config.live,
            trading_base = %config.trading_base_url(),
            "brokerage client ready"
        );

        Ok(Self {
            http,
            trading_base: config.trading_base_url().to_string(),
            data_base: config.data_base_url.clone(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: String,
        query: &[(&str, String)],
    ) -> Result<T, BrokerError> {
        let response = self.http.get(&url).query(query).send().await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, BrokerError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BrokerError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl Brokerage for AlpacaClient {
    async fn account(&self) -> Result<Account, BrokerError> {
        self.get_json(format!("{}/v2/account", self.trading_base), &[])
            .await
    }

    async fn positions(&self) -> Result<Vec<Position>, BrokerError> {
        self.get_json(format!("{}/v2/positions", self.trading_base), &[])
            .await
    }

    async fn open_position(&self, symbol: &str) -> Result<Position, BrokerError> {
        let response = self
            .http
            .get(format!("{}/v2/positions/{symbol}", self.trading_base))
            .send()
            .await?;
        if response.status().as_u16() == 404 {
            return Err(BrokerError::NoData(format!(
                "no open position for {symbol}"
            )));
        }
        Self::decode(response).await
    }

    async fn close_position(&self, symbol: &str, qty: Option<i64>) -> Result<Order, BrokerError> {
        let mut request = self
            .http
            .delete(format!("{}/v2/positions/{symbol}", self.trading_base));
        if let Some(qty) = qty {
            request = request.query(&[("qty", qty.to_string())]);
        }
        Self::decode(request.send().await?).await
    }

    async fn option_contracts(
        &self,
        filter: &ContractFilter,
    ) -> Result<Vec<OptionContract>, BrokerError> {
        let mut query: Vec<(&str, String)> = vec![
            ("underlying_symbols", filter.underlying_symbol.clone()),
            ("status", "active".to_string()),
            ("limit", filter.limit.max(1).to_string()),
        ];
        if let Some(t) = &filter.contract_type {
            query.push(("type", t.clone()));
        }
        if let Some(d) = &filter.expiration_date {
            query.push(("expiration_date", d.clone()));
        }
        if let Some(d) = &filter.expiration_date_gte {
            query.push(("expiration_date_gte", d.clone()));
        }
        if let Some(d) = &filter.expiration_date_lte {
            query.push(("expiration_date_lte", d.clone()));
        }
        if let Some(s) = filter.strike_price_gte {
            query.push(("strike_price_gte", s.to_string()));
        }
        if let Some(s) = filter.strike_price_lte {
            query.push(("strike_price_lte", s.to_string()));
        }
        let envelope: ContractsEnvelope = self
            .get_json(format!("{}/v2/options/contracts", self.trading_base), &query)
            .await?;
        Ok(envelope.option_contracts)
    }

    async fn latest_equity_quote(&self, symbol: &str) -> Result<Quote, BrokerError> {
        let envelope: StockQuoteEnvelope = self
            .get_json(
                format!("{}/v2/stocks/{symbol}/quotes/latest", self.data_base),
                &[],
            )
            .await?;
        Ok(envelope.quote)
    }

    async fn latest_option_quote(&self, symbol: &str) -> Result<OptionQuote, BrokerError> {
        let envelope: OptionQuotesEnvelope = self
            .get_json(
                format!("{}/v1beta1/options/quotes/latest", self.data_base),
                &[("symbols", symbol.to_string()), ("feed", "indicative".to_string())],
            )
            .await?;
        envelope
            .quotes
            .get(symbol)
            .cloned()
            .ok_or_else(|| BrokerError::NoData(format!("no option quote for {symbol}")))
    }

    async fn submit_order(&self, request: &OrderRequest) -> Result<Order, BrokerError> {
        let mut request = request.clone();
        if request.client_order_id.is_none() {
            request.client_order_id = Some(uuid::Uuid::new_v4().to_string());
        }
        let response = self
            .http
            .post(format!("{}/v2/orders", self.trading_base))
            .json(&request)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn orders(&self, limit: usize) -> Result<Vec<Order>, BrokerError> {
        self.get_json(
            format!("{}/v2/orders", self.trading_base),
            &[
                ("status", "all".to_string()),
                ("limit", limit.max(1).to_string()),
            ],
        )
        .await
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), BrokerError> {
        let response = self
            .http
            .delete(format!("{}/v2/orders/{order_id}", self.trading_base))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BrokerError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    async fn bars(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Bar>, BrokerError> {
        let timeframe = if VALID_TIMEFRAMES.contains(&timeframe) {
            timeframe
        } else {
            "1Hour"
        };
        let envelope: BarsEnvelope = self
            .get_json(
                format!("{}/v2/stocks/{symbol}/bars", self.data_base),
                &[
                    ("timeframe", timeframe.to_string()),
                    ("limit", limit.max(1).to_string()),
                ],
            )
            .await?;
        if envelope.bars.is_empty() {
            return Err(BrokerError::NoData(format!("no bars for {symbol}")));
        }
        Ok(envelope.bars)
    }
}
