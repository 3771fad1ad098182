//! A cloneable handle for observing and resetting a session from external code.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::conversation::{Conversation, SessionSnapshot};
use crate::events::SessionEvent;

/// A cloneable handle for poking the session from external code.
///
/// All fields are `Arc`-wrapped, so cloning is cheap. Lock order is always
/// conversation first, then the cancellation token.
#[derive(Clone)]
pub struct SessionHandle {
    pub(crate) conversation: Arc<Mutex<Conversation>>,
    pub(crate) cancel: Arc<Mutex<CancellationToken>>,
    pub(crate) event_tx: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    pub(crate) fn new() -> Self {
        let (event_tx, _) = broadcast::channel(1024);
        Self {
            conversation: Arc::new(Mutex::new(Conversation::default())),
            cancel: Arc::new(Mutex::new(CancellationToken::new())),
            event_tx,
        }
    }

    /// Clear messages and document and force the session back to idle.
    ///
    /// The in-flight turn, if any, is invalidated and its connection aborted;
    /// anything it still delivers is dropped.
    pub fn reset(&self) {
        let mut conversation = self.conversation.lock();
        conversation.reset();
        self.cancel.lock().cancel();
        self.emit(SessionEvent::Reset);
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// Plain-data view of the current state
    pub fn snapshot(&self) -> SessionSnapshot {
        self.conversation.lock().snapshot()
    }

    /// Whether a turn is in flight
    pub fn is_loading(&self) -> bool {
        self.conversation.lock().is_loading()
    }

    /// Install a fresh token for a new turn. Call with the conversation lock held.
    pub(crate) fn renew_cancel_token(&self) -> CancellationToken {
        let mut cancel = self.cancel.lock();
        *cancel = CancellationToken::new();
        cancel.clone()
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        // no subscribers is fine
        let _ = self.event_tx.send(event);
    }
}
