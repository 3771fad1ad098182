//! Conversation state machine: messages, the in-flight turn, and the document.
//!
//! All transitions are synchronous. Every turn-scoped transition takes the
//! [`TurnId`] handed out by [`Conversation::begin_turn`] and is ignored when
//! that turn is no longer current, which is how a reset wins over deltas that
//! arrive late from an abandoned stream.

use chrono::{DateTime, Utc};
use kinesis_ai::{Message, MessageId};
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::extractor::DocumentExtractor;

/// Identifies one request/response cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TurnId(u64);

impl std::fmt::Display for TurnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where the conversation is within a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    Idle,
    AwaitingConnectivity,
    Streaming,
    Finalizing,
}

/// Ephemeral state of one in-flight request. Never reused across turns.
#[derive(Debug)]
struct StreamSession {
    turn: TurnId,
    /// Assistant message being filled; set once the stream opens
    message_id: Option<MessageId>,
    /// Everything received so far in this turn
    buffer: String,
}

/// Result of applying a delta
#[derive(Debug, Clone, PartialEq)]
pub enum DeltaOutcome {
    /// The turn is no longer current; nothing changed
    Stale,
    /// The message was updated, and the document too if `document` is set
    Applied {
        message_id: MessageId,
        document: Option<String>,
    },
}

/// Result of finishing a turn
#[derive(Debug, Clone, PartialEq)]
pub struct TurnSummary {
    pub message_id: MessageId,
    /// Set when the final extraction replaced the document
    pub document: Option<String>,
}

/// Result of a failed turn
#[derive(Debug, Clone, PartialEq)]
pub struct FailedTurn {
    /// The in-flight assistant message, if one was created
    pub message_id: Option<MessageId>,
    /// Whether that message was removed because it was still empty
    pub removed: bool,
}

/// Plain-data view handed to the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub messages: Vec<Message>,
    pub phase: TurnPhase,
    pub loading: bool,
    pub document: String,
    pub document_updating: bool,
    pub document_words: usize,
    pub document_updated_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Conversation state: messages, the current turn, and the document draft
#[derive(Debug)]
pub struct Conversation {
    messages: Vec<Message>,
    phase: TurnPhase,
    document: Document,
    stream: Option<StreamSession>,
    /// Monotonic; survives reset so old turn ids never become current again
    turns_started: u64,
    last_error: Option<String>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            phase: TurnPhase::Idle,
            document: Document::default(),
            stream: None,
            turns_started: 0,
            last_error: None,
        }
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages in exchange order
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Whether a turn is in flight
    pub fn is_loading(&self) -> bool {
        self.phase != TurnPhase::Idle
    }

    /// The turn currently in flight
    pub fn current_turn(&self) -> Option<TurnId> {
        self.stream.as_ref().map(|s| s.turn)
    }

    pub fn is_current(&self, turn: TurnId) -> bool {
        self.current_turn() == Some(turn)
    }

    /// The assistant message being streamed into, if any
    pub fn streaming_message(&self) -> Option<&Message> {
        let id = self.stream.as_ref()?.message_id?;
        self.messages.iter().find(|m| m.id == id)
    }

    /// Error that ended the last failed turn
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            messages: self.messages.clone(),
            phase: self.phase,
            loading: self.is_loading(),
            document: self.document.text().to_string(),
            document_updating: self.document.is_updating(),
            document_words: self.document.word_count(),
            document_updated_at: self.document.updated_at(),
            last_error: self.last_error.clone(),
        }
    }

    /// Idle → AwaitingConnectivity: append the user message.
    /// Returns `None` without touching anything when a turn is already in flight.
    pub fn begin_turn(&mut self, text: impl Into<String>) -> Option<TurnId> {
        if self.phase != TurnPhase::Idle {
            tracing::debug!(phase = ?self.phase, "submit ignored, turn in flight");
            return None;
        }

        self.turns_started += 1;
        let turn = TurnId(self.turns_started);
        self.messages.push(Message::user(text));
        self.stream = Some(StreamSession {
            turn,
            message_id: None,
            buffer: String::new(),
        });
        self.phase = TurnPhase::AwaitingConnectivity;
        self.last_error = None;
        tracing::debug!(%turn, "turn started");
        Some(turn)
    }

    /// AwaitingConnectivity → Streaming: append the empty assistant message.
    /// Returns the history to send, which ends with the new user message.
    pub fn open_stream(&mut self, turn: TurnId) -> Option<Vec<Message>> {
        if !self.is_current(turn) || self.phase != TurnPhase::AwaitingConnectivity {
            return None;
        }

        let history = self.messages.clone();
        let assistant = Message::assistant_empty();
        let id = assistant.id;
        self.messages.push(assistant);
        if let Some(stream) = self.stream.as_mut() {
            stream.message_id = Some(id);
        }
        self.phase = TurnPhase::Streaming;
        tracing::debug!(%turn, message_id = %id, "stream opened");
        Some(history)
    }

    /// AwaitingConnectivity → Idle: the probe failed, no assistant message exists.
    pub fn probe_failed(&mut self, turn: TurnId, error: impl Into<String>) -> bool {
        if !self.is_current(turn) || self.phase != TurnPhase::AwaitingConnectivity {
            return false;
        }
        self.stream = None;
        self.phase = TurnPhase::Idle;
        self.last_error = Some(error.into());
        true
    }

    /// Streaming: set the in-flight message to the cumulative `text` and run
    /// the extractor against it.
    pub fn apply_delta(
        &mut self,
        turn: TurnId,
        text: &str,
        extractor: &DocumentExtractor,
    ) -> DeltaOutcome {
        if !self.is_current(turn) || self.phase != TurnPhase::Streaming {
            tracing::warn!(%turn, "dropping delta for stale turn");
            return DeltaOutcome::Stale;
        }
        let Some(message_id) = self.stream.as_ref().and_then(|s| s.message_id) else {
            return DeltaOutcome::Stale;
        };

        if let Some(stream) = self.stream.as_mut() {
            stream.buffer.clear();
            stream.buffer.push_str(text);
        }
        if let Some(message) = self.messages.iter_mut().find(|m| m.id == message_id) {
            message.content.clear();
            message.content.push_str(text);
        }

        let document = self.update_document(text, extractor);
        DeltaOutcome::Applied {
            message_id,
            document,
        }
    }

    /// Streaming → Finalizing → Idle: run the extractor once more over the
    /// complete text and leave the message as final.
    pub fn finish(&mut self, turn: TurnId, extractor: &DocumentExtractor) -> Option<TurnSummary> {
        if !self.is_current(turn) || self.phase != TurnPhase::Streaming {
            return None;
        }
        self.phase = TurnPhase::Finalizing;

        let stream = self.stream.take()?;
        let message_id = stream.message_id?;
        let document = self.update_document(&stream.buffer, extractor);

        self.phase = TurnPhase::Idle;
        tracing::debug!(%turn, len = stream.buffer.len(), "turn finished");
        Some(TurnSummary {
            message_id,
            document,
        })
    }

    /// Streaming → Idle after a transport failure. An assistant message that
    /// received no text is removed; partial text is kept.
    pub fn fail(&mut self, turn: TurnId, error: impl Into<String>) -> Option<FailedTurn> {
        if !self.is_current(turn) {
            return None;
        }
        let stream = self.stream.take()?;

        let mut removed = false;
        if let Some(id) = stream.message_id {
            let blank = self
                .messages
                .iter()
                .find(|m| m.id == id)
                .is_some_and(|m| m.is_blank());
            if blank {
                self.messages.retain(|m| m.id != id);
                removed = true;
            }
        }

        self.phase = TurnPhase::Idle;
        self.last_error = Some(error.into());
        tracing::debug!(%turn, removed, "turn failed");
        Some(FailedTurn {
            message_id: stream.message_id,
            removed,
        })
    }

    /// Clear messages and document and return to Idle from any phase.
    /// The current turn id is invalidated.
    pub fn reset(&mut self) {
        if let Some(turn) = self.current_turn() {
            tracing::debug!(%turn, "abandoning turn on reset");
        }
        self.messages.clear();
        self.document.clear();
        self.stream = None;
        self.phase = TurnPhase::Idle;
        self.last_error = None;
    }

    /// Replace the document directly, e.g. after a manual edit.
    /// Returns false when the text is unchanged.
    pub fn replace_document(&mut self, text: impl Into<String>) -> bool {
        let text = text.into();
        if text == self.document.text() {
            return false;
        }
        self.document.replace(text);
        true
    }

    fn update_document(&mut self, text: &str, extractor: &DocumentExtractor) -> Option<String> {
        let extracted = extractor.extract(text, self.document.text())?;
        self.document.replace(extracted.clone());
        Some(extracted)
    }
}
