//! Web research tools backed by the search provider.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use optra_broker::search::{SearchOptions, SearchProvider, SearchResult};

use crate::error::AgentError;
use crate::registry::{function_schema, Tool};
use crate::tools::{str_arg, usize_arg};

fn require_str(args: &Map<String, Value>, key: &str, tool: &str) -> Result<String, AgentError> {
    str_arg(args, key)
        .map(|s| s.to_string())
        .ok_or_else(|| AgentError::Validation(format!("{tool} requires a string '{key}' argument")))
}

fn article(result: &SearchResult) -> Value {
    json!({
        "title": result.title,
        "content": result.content,
        "url": result.url,
        "score": result.score,
        "published_date": result.published_date.as_deref().unwrap_or("unknown"),
    })
}

pub struct GetMarketSentiment {
    search: Arc<dyn SearchProvider>,
}

impl GetMarketSentiment {
    pub fn new(search: Arc<dyn SearchProvider>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl Tool for GetMarketSentiment {
    fn name(&self) -> &'static str {
        "get_market_sentiment"
    }

    fn schema(&self) -> Value {
        function_schema(
            self.name(),
            "Recent market sentiment sources for a symbol. Read the content to \
             judge bullish or bearish tone.",
            json!({
                "type": "object",
                "properties": {
                    "symbol": {"type": "string", "description": "Ticker, e.g. SPY"}
                },
                "required": ["symbol"]
            }),
        )
    }

    async fn call(&self, args: &Map<String, Value>) -> Result<Value, AgentError> {
        let symbol = require_str(args, "symbol", self.name())?;
        let query = format!("{symbol} market sentiment analysis latest");
        let options = SearchOptions {
            max_results: 3,
            depth: "advanced",
            include_domains: Vec::new(),
        };
        let results = self.search.search(&query, &options).await?;
        let sources: Vec<Value> = results
            .iter()
            .map(|r| {
                json!({
                    "source": r.title,
                    "content": r.content,
                    "url": r.url,
                })
            })
            .collect();
        Ok(json!({
            "symbol": symbol,
            "query": query,
            "sentiment_sources": sources,
            "note": "Analyze the content to determine bullish/bearish sentiment",
        }))
    }
}

pub struct SearchTechnicalAnalysis {
    search: Arc<dyn SearchProvider>,
}

impl SearchTechnicalAnalysis {
    pub fn new(search: Arc<dyn SearchProvider>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl Tool for SearchTechnicalAnalysis {
    fn name(&self) -> &'static str {
        "search_technical_analysis"
    }

    fn schema(&self) -> Value {
        function_schema(
            self.name(),
            "Recent technical analysis articles and trading ideas for a symbol.",
            json!({
                "type": "object",
                "properties": {
                    "symbol": {"type": "string", "description": "Ticker, e.g. SPY"}
                },
                "required": ["symbol"]
            }),
        )
    }

    async fn call(&self, args: &Map<String, Value>) -> Result<Value, AgentError> {
        let symbol = require_str(args, "symbol", self.name())?;
        let query = format!("{symbol} technical analysis trading signals chart patterns");
        let options = SearchOptions {
            max_results: 5,
            depth: "advanced",
            include_domains: Vec::new(),
        };
        let results = self.search.search(&query, &options).await?;
        let articles: Vec<Value> = results
            .iter()
            .map(|r| {
                json!({
                    "title": r.title,
                    "content": r.content,
                    "url": r.url,
                    "relevance_score": r.score,
                })
            })
            .collect();
        Ok(Value::Array(articles))
    }
}

pub struct SearchGeneralWeb {
    search: Arc<dyn SearchProvider>,
}

impl SearchGeneralWeb {
    pub fn new(search: Arc<dyn SearchProvider>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl Tool for SearchGeneralWeb {
    fn name(&self) -> &'static str {
        "search_general_web"
    }

    fn schema(&self) -> Value {
        function_schema(
            self.name(),
            "General web search for any trading-related question.",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string"},
                    "max_results": {"type": "integer", "description": "Default 5"}
                },
                "required": ["query"]
            }),
        )
    }

    async fn call(&self, args: &Map<String, Value>) -> Result<Value, AgentError> {
        let query = require_str(args, "query", self.name())?;
        let options = SearchOptions {
            max_results: usize_arg(args, "max_results", 5),
            depth: "basic",
            include_domains: Vec::new(),
        };
        let results = self.search.search(&query, &options).await?;
        Ok(Value::Array(results.iter().map(article).collect()))
    }
}
