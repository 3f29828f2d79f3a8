//! Web search client for market research tools.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use optra_models::config::SearchConfig;

use crate::error::BrokerError;

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub max_results: usize,
    /// "basic" or "advanced".
    pub depth: &'static str,
    pub include_domains: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SearchResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub published_date: Option<String>,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, BrokerError>;
}

/// Tavily search API client.
pub struct TavilyClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
    search_depth: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    include_domains: Vec<String>,
}

#[derive(Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

impl TavilyClient {
    pub fn from_config(config: &SearchConfig) -> Result<Self, BrokerError> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| BrokerError::Credentials(config.api_key_env.clone()))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl SearchProvider for TavilyClient {
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, BrokerError> {
        let body = TavilyRequest {
            api_key: &self.api_key,
            query,
            max_results: options.max_results.max(1),
            search_depth: if options.depth.is_empty() {
                "basic"
            } else {
                options.depth
            },
            include_domains: options.include_domains.clone(),
        };
        let response = self
            .http
            .post(format!("{}/search", self.base_url))
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(BrokerError::Api {
                status: status.as_u16(),
                body: text,
            });
        }
        let parsed: TavilyResponse = response.json().await?;
        Ok(parsed.results)
    }
}
