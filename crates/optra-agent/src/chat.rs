//! Chat model transport.
//!
//! The trait returns the raw response JSON; shape tolerance is the
//! extractor's job, not the transport's.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use optra_models::chat::ChatMessage;
use optra_models::config::ChatConfig;

use crate::error::AgentError;

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn chat(&self, messages: &[ChatMessage], tools: &[Value]) -> Result<Value, AgentError>;
}

/// Ollama-compatible chat client (`POST /api/chat`, non-streaming).
pub struct OllamaChat {
    http: reqwest::Client,
    base_url: String,
    model: String,
    timeout_seconds: u64,
}

impl OllamaChat {
    pub fn from_config(config: &ChatConfig) -> Result<Self, AgentError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| AgentError::Chat(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            timeout_seconds: config.timeout_seconds,
        })
    }
}

#[async_trait]
impl ChatClient for OllamaChat {
    async fn chat(&self, messages: &[ChatMessage], tools: &[Value]) -> Result<Value, AgentError> {
        let body = json!({
            "model": self.model,
            "messages": messages,
            "tools": tools,
            "stream": false,
        });

        let request = self
            .http
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send();

        let response = tokio::time::timeout(Duration::from_secs(self.timeout_seconds), request)
            .await
            .map_err(|_| AgentError::Timeout(self.timeout_seconds))?
            .map_err(|e| AgentError::Chat(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AgentError::Chat(format!("HTTP {status}: {text}")));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| AgentError::Chat(e.to_string()))
    }
}

/// Assistant content from a raw chat response, empty string when absent.
pub fn assistant_content(response: &Value) -> String {
    response
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assistant_content_reads_message() {
        let response = json!({"message": {"role": "assistant", "content": "buying a call"}});
        assert_eq!(assistant_content(&response), "buying a call");
    }

    #[test]
    fn assistant_content_tolerates_missing_fields() {
        assert_eq!(assistant_content(&json!({})), "");
        assert_eq!(assistant_content(&json!({"message": {}})), "");
        assert_eq!(assistant_content(&json!({"message": {"content": 7}})), "");
    }
}
