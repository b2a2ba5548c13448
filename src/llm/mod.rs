//! Hosted chat-completion model: wire types and an OpenAI-compatible client.

pub mod client;
pub mod types;

pub use client::{CompletionClient, LlmError, OpenAiClient};
pub use types::ChatMessage;
