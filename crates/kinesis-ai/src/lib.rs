//! kinesis-ai: Streaming client for Ollama-compatible generation endpoints
//!
//! This crate opens chat requests against a locally hosted model server and
//! exposes the reply as a stream of cumulative text snapshots.

pub mod error;
pub mod ndjson;
pub mod providers;
pub mod stream;
pub mod types;

pub use error::{Error, Result};
pub use providers::{GenerationClient, OllamaClient};
pub use stream::{EventStream, StreamEvent, TextDelta};
pub use types::*;
