//! Tool registry and dispatch.
//!
//! A fixed name -> handler table built at startup. Dispatch isolates every
//! failure: unknown tools and handler errors both come back as an
//! `{"error": ...}` result object so a bad call never aborts the cycle.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::error::AgentError;

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    /// JSON schema advertised to the chat model.
    fn schema(&self) -> Value;
    async fn call(&self, args: &Map<String, Value>) -> Result<Value, AgentError>;
}

pub struct ToolRegistry {
    tools: HashMap<&'static str, Arc<dyn Tool>>,
    /// Stable ordering for schemas and error listings.
    order: Vec<&'static str>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Self {
        let order: Vec<&'static str> = tools.iter().map(|t| t.name()).collect();
        let tools = tools.into_iter().map(|t| (t.name(), t)).collect();
        Self { tools, order }
    }

    pub fn names(&self) -> &[&'static str] {
        &self.order
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn schemas(&self) -> Vec<Value> {
        self.order
            .iter()
            .map(|name| self.tools[name].schema())
            .collect()
    }

    /// Run a tool by name. Always returns a result value; failures are
    /// folded into an `{"error": ...}` object.
    pub async fn dispatch(&self, name: &str, args: &Map<String, Value>) -> Value {
        let Some(tool) = self.tools.get(name) else {
            tracing::warn!(tool = name, "unknown tool requested");
            return json!({
                "error": format!(
                    "Unknown tool '{name}'. Available tools: {}",
                    self.order.join(", ")
                )
            });
        };
        match tool.call(args).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(tool = name, error = %e, "tool call failed");
                json!({"error": e.to_string()})
            }
        }
    }
}

/// Helper for building the `{"type": "function", ...}` schema objects.
pub fn function_schema(name: &str, description: &str, parameters: Value) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": name,
            "description": description,
            "parameters": parameters,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }
        fn schema(&self) -> Value {
            function_schema("echo", "echoes its arguments", json!({"type": "object"}))
        }
        async fn call(&self, args: &Map<String, Value>) -> Result<Value, AgentError> {
            Ok(Value::Object(args.clone()))
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl Tool for AlwaysFails {
        fn name(&self) -> &'static str {
            "always_fails"
        }
        fn schema(&self) -> Value {
            function_schema("always_fails", "fails", json!({"type": "object"}))
        }
        async fn call(&self, _args: &Map<String, Value>) -> Result<Value, AgentError> {
            Err(AgentError::Validation("boom".to_string()))
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::new(vec![Arc::new(Echo), Arc::new(AlwaysFails)])
    }

    #[tokio::test]
    async fn dispatch_runs_known_tool() {
        let registry = registry();
        let mut args = Map::new();
        args.insert("key".to_string(), json!("value"));
        let result = registry.dispatch("echo", &args).await;
        assert_eq!(result["key"], json!("value"));
    }

    #[tokio::test]
    async fn unknown_tool_lists_available_names() {
        let registry = registry();
        let result = registry.dispatch("no_such_tool", &Map::new()).await;
        let message = result["error"].as_str().unwrap();
        assert!(message.contains("Unknown tool 'no_such_tool'"));
        assert!(message.contains("echo"));
        assert!(message.contains("always_fails"));
    }

    #[tokio::test]
    async fn handler_errors_become_error_results() {
        let registry = registry();
        let result = registry.dispatch("always_fails", &Map::new()).await;
        assert_eq!(result["error"], json!("boom"));
    }

    #[test]
    fn schemas_follow_registration_order() {
        let registry = registry();
        let schemas = registry.schemas();
        assert_eq!(schemas.len(), 2);
        assert_eq!(schemas[0]["function"]["name"], json!("echo"));
        assert_eq!(schemas[1]["function"]["name"], json!("always_fails"));
    }
}
