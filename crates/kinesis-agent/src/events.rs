//! Session event types

use kinesis_ai::{CompletionStats, Message, MessageId};
use serde::{Deserialize, Serialize};

use crate::conversation::TurnId;

/// Events emitted by a session, in the order state changed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A user message was accepted and a turn started
    TurnStart { turn: TurnId, message: Message },

    /// The endpoint answered the probe and the assistant message was created
    MessageStart { turn: TurnId, message: Message },

    /// The in-flight assistant message changed
    MessageUpdate {
        turn: TurnId,
        message_id: MessageId,
        fragment: String,
        content: String,
    },

    /// The assistant message is final
    MessageEnd {
        turn: TurnId,
        message_id: MessageId,
        stats: Option<CompletionStats>,
    },

    /// The document text is being replaced; [`SessionEvent::DocumentUpdated`]
    /// follows with the new text
    DocumentUpdating,

    /// Document text was replaced
    DocumentUpdated { text: String, words: usize },

    /// The turn is over and the session is idle again
    TurnEnd { turn: TurnId },

    /// Conversation and document were cleared
    Reset,

    /// A turn or export failed
    Error { kind: ErrorKind, message: String },
}

/// Which failure an [`SessionEvent::Error`] reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Connectivity,
    Transport,
    Export,
}

impl SessionEvent {
    /// Check if this event ends a turn
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionEvent::TurnEnd { .. } | SessionEvent::Reset
        )
    }
}
