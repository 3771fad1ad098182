//! Generation endpoint clients

pub mod ollama;

use crate::{EndpointConfig, EventStream, Message, Result};
use async_trait::async_trait;

pub use ollama::OllamaClient;

/// Trait for generation endpoints
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Lightweight request used to fail fast before a real generation.
    /// Success is defined purely by HTTP status.
    async fn probe(&self, config: &EndpointConfig) -> Result<()>;

    /// Send the ordered conversation and stream the reply
    async fn stream_chat(
        &self,
        config: &EndpointConfig,
        messages: &[Message],
    ) -> Result<EventStream>;

    /// List model names available on the endpoint
    async fn list_models(&self, config: &EndpointConfig) -> Result<Vec<String>>;
}
