//! Core types for conversations with a generation endpoint

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default endpoint of a locally hosted Ollama server
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Default model name
pub const DEFAULT_MODEL: &str = "llama3.2";

/// Message roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Get the role as it appears on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Opaque message identifier, generated per message and never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Generate a fresh identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One exchanged conversational turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a user message with its final text
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role: Role::User,
            content: text.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create an empty assistant message, filled in while streaming
    pub fn assistant_empty() -> Self {
        Self::assistant(String::new())
    }

    /// Create an assistant message with text
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role: Role::Assistant,
            content: text.into(),
            timestamp: Utc::now(),
        }
    }

    /// Whether the message carries no visible text
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// Sampling options sent with every generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
            max_tokens: 2000,
        }
    }
}

/// Where and how to generate. Passed explicitly per call, never shared mutably.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointConfig {
    /// Base URL of the server (e.g. "http://localhost:11434")
    pub base_url: String,
    /// Model name (e.g. "llama3.2")
    pub model: String,
    /// Sampling options
    pub options: GenerationOptions,
}

impl EndpointConfig {
    /// Create a config with default sampling options
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            options: GenerationOptions::default(),
        }
    }

    /// Join a path onto the base URL, ignoring trailing slashes on the base
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL, DEFAULT_MODEL)
    }
}

/// Timing information reported by the final record of a stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionStats {
    #[serde(default)]
    pub total_duration: Option<u64>,
    #[serde(default)]
    pub load_duration: Option<u64>,
    #[serde(default)]
    pub prompt_eval_count: Option<u32>,
    #[serde(default)]
    pub prompt_eval_duration: Option<u64>,
    #[serde(default)]
    pub eval_count: Option<u32>,
    #[serde(default)]
    pub eval_duration: Option<u64>,
}
