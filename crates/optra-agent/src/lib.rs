pub mod chat;
pub mod error;
pub mod extract;
pub mod normalize;
pub mod prompts;
pub mod registry;
pub mod runner;
pub mod tools;

pub mod test_support;

pub use chat::{ChatClient, OllamaChat};
pub use error::AgentError;
pub use registry::{Tool, ToolRegistry};
pub use runner::AgentRunner;
