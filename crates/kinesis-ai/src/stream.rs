//! Streaming event types and utilities

use crate::error::Result;
use crate::types::CompletionStats;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio_stream::Stream;

/// An incremental piece of generated text together with the running total
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextDelta {
    /// The newly decoded fragment
    pub fragment: String,
    /// Everything received so far in this stream, `fragment` included
    pub text: String,
}

/// Events emitted while a completion streams
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// New text arrived
    Delta(TextDelta),
    /// The endpoint signalled completion
    Done(CompletionStats),
}

impl StreamEvent {
    /// Check if this is a terminal event
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done(_))
    }

    /// Get the delta if this is a text event
    pub fn as_delta(&self) -> Option<&TextDelta> {
        match self {
            StreamEvent::Delta(delta) => Some(delta),
            _ => None,
        }
    }
}

/// A stream of completion events. Finite and not restartable.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// Folds fragments into cumulative snapshots
#[derive(Debug, Default)]
pub struct TextAccumulator {
    text: String,
}

impl TextAccumulator {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment and return the resulting delta
    pub fn push(&mut self, fragment: &str) -> TextDelta {
        self.text.push_str(fragment);
        TextDelta {
            fragment: fragment.to_string(),
            text: self.text.clone(),
        }
    }
}
