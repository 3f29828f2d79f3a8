//! Scripted chat client for exercising the loop without a model.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use optra_models::chat::ChatMessage;

use crate::chat::ChatClient;
use crate::error::AgentError;

/// Replays a fixed sequence of raw responses. Once the script runs out it
/// answers with a plain "Done." message so the thinking loop terminates.
#[derive(Default)]
pub struct ScriptedChat {
    responses: Mutex<VecDeque<Value>>,
    /// Snapshot of the history passed to each call, for assertions.
    pub requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedChat {
    pub fn new(responses: Vec<Value>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Convenience for a response that calls one tool.
    pub fn tool_call_response(content: &str, name: &str, arguments: Value) -> Value {
        json!({
            "message": {
                "role": "assistant",
                "content": content,
                "tool_calls": [
                    {"function": {"name": name, "arguments": arguments}}
                ]
            }
        })
    }

    /// Convenience for a final content-only response.
    pub fn text_response(content: &str) -> Value {
        json!({"message": {"role": "assistant", "content": content}})
    }
}

#[async_trait]
impl ChatClient for ScriptedChat {
    async fn chat(&self, messages: &[ChatMessage], _tools: &[Value]) -> Result<Value, AgentError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        let next = self.responses.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| Self::text_response("Done.")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_chat_replays_then_falls_back() {
        let chat = ScriptedChat::new(vec![ScriptedChat::text_response("first")]);
        let r1 = chat.chat(&[], &[]).await.unwrap();
        assert_eq!(r1["message"]["content"], json!("first"));
        let r2 = chat.chat(&[], &[]).await.unwrap();
        assert_eq!(r2["message"]["content"], json!("Done."));
        assert_eq!(chat.requests.lock().unwrap().len(), 2);
    }
}
