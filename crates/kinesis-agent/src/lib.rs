//! kinesis-agent: Conversation runtime for drafting requirements documents
//!
//! This crate owns the conversation state machine, extracts the working
//! document from streamed assistant replies, and drives each turn against a
//! [`kinesis_ai::GenerationClient`].

pub mod conversation;
pub mod document;
pub mod error;
pub mod events;
pub mod export;
pub mod extractor;
pub mod handle;
pub mod session;

pub use conversation::{Conversation, SessionSnapshot, TurnId, TurnPhase};
pub use document::Document;
pub use error::{Error, ExportError, Result};
pub use events::{ErrorKind, SessionEvent};
pub use export::{ExportFormat, Exporter};
pub use extractor::{DocumentExtractor, Recognizer};
pub use handle::SessionHandle;
pub use session::{Session, TurnOutcome};
