//! Session controller: wires user input to the conversation, the transport
//! and the export collaborator.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use kinesis_ai::{
    CompletionStats, EndpointConfig, GenerationClient, MessageId, StreamEvent, TextDelta,
};
use tokio::sync::broadcast;

use crate::{
    conversation::{DeltaOutcome, SessionSnapshot, TurnId},
    error::{Error, Result},
    events::{ErrorKind, SessionEvent},
    export::{EXPORT_PREFIX, ExportFormat, Exporter, generate_filename},
    extractor::{DocumentExtractor, word_count},
    handle::SessionHandle,
};

/// How a submitted turn ended, when it did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The stream completed and the assistant message is final
    Completed {
        message_id: MessageId,
        /// Whether the document changed during this turn
        document_updated: bool,
    },
    /// Another turn was in flight; nothing happened
    Busy,
    /// The session was reset while this turn was running
    Abandoned,
}

/// The top-level session
pub struct Session {
    endpoint: EndpointConfig,
    client: Arc<dyn GenerationClient>,
    exporter: Arc<dyn Exporter>,
    extractor: DocumentExtractor,
    handle: SessionHandle,
}

impl Session {
    /// Create a new session
    pub fn new(
        endpoint: EndpointConfig,
        client: Arc<dyn GenerationClient>,
        exporter: Arc<dyn Exporter>,
    ) -> Self {
        Self {
            endpoint,
            client,
            exporter,
            extractor: DocumentExtractor::default(),
            handle: SessionHandle::new(),
        }
    }

    /// Use a custom extraction policy
    pub fn with_extractor(mut self, extractor: DocumentExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.handle.subscribe()
    }

    /// Get a cloneable handle, usable while a turn is running
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Plain-data view of the current state
    pub fn snapshot(&self) -> SessionSnapshot {
        self.handle.snapshot()
    }

    /// Get the endpoint configuration
    pub fn endpoint(&self) -> &EndpointConfig {
        &self.endpoint
    }

    /// Set the endpoint configuration, used from the next turn on
    pub fn set_endpoint(&mut self, endpoint: EndpointConfig) {
        self.endpoint = endpoint;
    }

    /// Probe the configured endpoint
    pub async fn test_connection(&self) -> Result<()> {
        Ok(self.client.probe(&self.endpoint).await?)
    }

    /// List models available on the configured endpoint
    pub async fn list_models(&self) -> Result<Vec<String>> {
        Ok(self.client.list_models(&self.endpoint).await?)
    }

    /// Clear the conversation and document, abandoning any turn in flight
    pub fn reset(&self) {
        self.handle.reset();
    }

    /// Replace the document directly. Returns false when unchanged.
    pub fn replace_document(&self, text: impl Into<String>) -> bool {
        let text = text.into();
        let mut conversation = self.handle.conversation.lock();
        let changed = conversation.replace_document(text.clone());
        if changed {
            self.emit_document(text);
        }
        changed
    }

    /// Submit user input and drive the whole turn.
    ///
    /// Returns [`TurnOutcome::Busy`] without side effects while another turn
    /// is in flight. Connectivity and transport failures return the session
    /// to idle before the error is returned. Dropping the future mid-turn
    /// fails the turn the same way.
    pub async fn submit(&self, text: impl Into<String>) -> Result<TurnOutcome> {
        let (turn, cancel) = {
            let mut conversation = self.handle.conversation.lock();
            let Some(turn) = conversation.begin_turn(text) else {
                return Ok(TurnOutcome::Busy);
            };
            if let Some(message) = conversation.messages().last().cloned() {
                self.handle.emit(SessionEvent::TurnStart { turn, message });
            }
            (turn, self.handle.renew_cancel_token())
        };
        let _guard = TurnGuard {
            handle: &self.handle,
            turn,
        };

        // Settings are read at stream-open time
        let endpoint = self.endpoint.clone();

        let probe = tokio::select! {
            result = self.client.probe(&endpoint) => result,
            _ = cancel.cancelled() => return Ok(TurnOutcome::Abandoned),
        };
        if let Err(e) = probe {
            let mut conversation = self.handle.conversation.lock();
            if !conversation.probe_failed(turn, e.to_string()) {
                return Ok(TurnOutcome::Abandoned);
            }
            self.handle.emit(SessionEvent::Error {
                kind: ErrorKind::Connectivity,
                message: e.to_string(),
            });
            self.handle.emit(SessionEvent::TurnEnd { turn });
            tracing::error!(%turn, error = %e, "connectivity probe failed");
            return Err(e.into());
        }

        let history = {
            let mut conversation = self.handle.conversation.lock();
            let Some(history) = conversation.open_stream(turn) else {
                return Ok(TurnOutcome::Abandoned);
            };
            if let Some(message) = conversation.streaming_message().cloned() {
                self.handle.emit(SessionEvent::MessageStart { turn, message });
            }
            history
        };

        let opened = tokio::select! {
            result = self.client.stream_chat(&endpoint, &history) => result,
            _ = cancel.cancelled() => return Ok(TurnOutcome::Abandoned),
        };
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) => return self.fail_turn(turn, e),
        };

        let mut document_updated = false;
        let mut stats: Option<CompletionStats> = None;
        loop {
            let item = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(TurnOutcome::Abandoned),
                item = stream.next() => item,
            };

            match item {
                Some(Ok(StreamEvent::Delta(delta))) => match self.apply_delta(turn, delta) {
                    Some(updated) => document_updated |= updated,
                    None => return Ok(TurnOutcome::Abandoned),
                },
                Some(Ok(StreamEvent::Done(done))) => {
                    stats = Some(done);
                    break;
                }
                Some(Err(e)) => return self.fail_turn(turn, e),
                None => break,
            }
        }

        let mut conversation = self.handle.conversation.lock();
        let Some(summary) = conversation.finish(turn, &self.extractor) else {
            return Ok(TurnOutcome::Abandoned);
        };
        if let Some(text) = summary.document {
            self.emit_document(text);
            document_updated = true;
        }
        self.handle.emit(SessionEvent::MessageEnd {
            turn,
            message_id: summary.message_id,
            stats,
        });
        self.handle.emit(SessionEvent::TurnEnd { turn });

        Ok(TurnOutcome::Completed {
            message_id: summary.message_id,
            document_updated,
        })
    }

    /// Export the current document. Requires non-empty document text.
    pub async fn request_export(&self, format: ExportFormat) -> Result<PathBuf> {
        let document = {
            let conversation = self.handle.conversation.lock();
            if conversation.document().is_empty() {
                return Err(Error::NothingToExport);
            }
            conversation.document().text().to_string()
        };

        let filename = generate_filename(EXPORT_PREFIX, Utc::now());
        match self.exporter.export(&document, &filename, format).await {
            Ok(path) => {
                tracing::debug!(path = %path.display(), %format, "document exported");
                Ok(path)
            }
            Err(e) => {
                self.handle.emit(SessionEvent::Error {
                    kind: ErrorKind::Export,
                    message: e.to_string(),
                });
                Err(e.into())
            }
        }
    }

    /// Apply one delta. Returns whether the document changed, or `None` when
    /// the turn is no longer current.
    fn apply_delta(&self, turn: TurnId, delta: TextDelta) -> Option<bool> {
        let mut conversation = self.handle.conversation.lock();
        match conversation.apply_delta(turn, &delta.text, &self.extractor) {
            DeltaOutcome::Stale => None,
            DeltaOutcome::Applied {
                message_id,
                document,
            } => {
                self.handle.emit(SessionEvent::MessageUpdate {
                    turn,
                    message_id,
                    fragment: delta.fragment,
                    content: delta.text,
                });
                let updated = document.is_some();
                if let Some(text) = document {
                    self.emit_document(text);
                }
                Some(updated)
            }
        }
    }

    fn emit_document(&self, text: String) {
        self.handle.emit(SessionEvent::DocumentUpdating);
        self.handle.emit(SessionEvent::DocumentUpdated {
            words: word_count(&text),
            text,
        });
    }

    fn fail_turn(&self, turn: TurnId, error: kinesis_ai::Error) -> Result<TurnOutcome> {
        let mut conversation = self.handle.conversation.lock();
        let Some(failed) = conversation.fail(turn, error.to_string()) else {
            return Ok(TurnOutcome::Abandoned);
        };
        let kind = if error.is_connectivity() {
            ErrorKind::Connectivity
        } else {
            ErrorKind::Transport
        };
        self.handle.emit(SessionEvent::Error {
            kind,
            message: error.to_string(),
        });
        self.handle.emit(SessionEvent::TurnEnd { turn });
        tracing::error!(%turn, removed_empty_reply = failed.removed, error = %error, "turn failed");
        Err(error.into())
    }
}

/// Fails the turn if `submit` is dropped before the turn resolved.
/// Once the turn finished, failed or was reset this is a no-op.
struct TurnGuard<'a> {
    handle: &'a SessionHandle,
    turn: TurnId,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        let mut conversation = self.handle.conversation.lock();
        if let Some(failed) = conversation.fail(self.turn, "request cancelled") {
            self.handle.emit(SessionEvent::TurnEnd { turn: self.turn });
            tracing::warn!(
                turn = %self.turn,
                removed_empty_reply = failed.removed,
                "turn dropped before completion"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExportError;
    use async_trait::async_trait;
    use kinesis_ai::{EventStream, Message, Role, stream::TextAccumulator};
    use parking_lot::Mutex;
    use crate::conversation::TurnPhase;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    #[derive(Clone)]
    enum Step {
        Delta(&'static str),
        Wait(Arc<Notify>),
        Fail(&'static str),
        Done,
    }

    /// A client that replays scripted streams, one script per turn.
    struct ScriptedClient {
        probe_ok: bool,
        open_fails: bool,
        scripts: Mutex<Vec<Vec<Step>>>,
        histories: Mutex<Vec<Vec<Message>>>,
        probes: AtomicUsize,
    }

    impl ScriptedClient {
        fn new(scripts: Vec<Vec<Step>>) -> Self {
            Self {
                probe_ok: true,
                open_fails: false,
                scripts: Mutex::new(scripts),
                histories: Mutex::new(Vec::new()),
                probes: AtomicUsize::new(0),
            }
        }

        fn unreachable() -> Self {
            Self {
                probe_ok: false,
                ..Self::new(vec![])
            }
        }
    }

    #[async_trait]
    impl GenerationClient for ScriptedClient {
        async fn probe(&self, config: &EndpointConfig) -> kinesis_ai::Result<()> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            if self.probe_ok {
                Ok(())
            } else {
                Err(kinesis_ai::Error::connectivity(&config.base_url, "connection refused"))
            }
        }

        async fn stream_chat(
            &self,
            config: &EndpointConfig,
            messages: &[Message],
        ) -> kinesis_ai::Result<EventStream> {
            self.histories.lock().push(messages.to_vec());
            if self.open_fails {
                return Err(kinesis_ai::Error::transport(
                    config.url("/api/chat"),
                    "500 Internal Server Error",
                ));
            }
            let steps = {
                let mut scripts = self.scripts.lock();
                if scripts.is_empty() {
                    vec![Step::Delta("done"), Step::Done]
                } else {
                    scripts.remove(0)
                }
            };
            let url = config.url("/api/chat");

            let stream: EventStream = Box::pin(async_stream::stream! {
                let mut acc = TextAccumulator::new();
                for step in steps {
                    match step {
                        Step::Delta(fragment) => yield Ok(StreamEvent::Delta(acc.push(fragment))),
                        Step::Wait(gate) => gate.notified().await,
                        Step::Fail(message) => {
                            yield Err(kinesis_ai::Error::transport(url.clone(), message));
                            return;
                        }
                        Step::Done => {
                            yield Ok(StreamEvent::Done(CompletionStats::default()));
                            return;
                        }
                    }
                }
            });
            Ok(stream)
        }

        async fn list_models(&self, _config: &EndpointConfig) -> kinesis_ai::Result<Vec<String>> {
            Ok(vec!["llama3.2".into(), "mistral".into()])
        }
    }

    #[derive(Default)]
    struct RecordingExporter {
        fail: bool,
        calls: Mutex<Vec<(String, String, ExportFormat)>>,
    }

    #[async_trait]
    impl Exporter for RecordingExporter {
        async fn export(
            &self,
            document: &str,
            filename: &str,
            format: ExportFormat,
        ) -> std::result::Result<PathBuf, ExportError> {
            self.calls
                .lock()
                .push((document.to_string(), filename.to_string(), format));
            if self.fail {
                return Err(ExportError::Io(std::io::Error::other("disk full")));
            }
            Ok(PathBuf::from(format!("{}.{}", filename, format.extension())))
        }
    }

    fn make_session(client: Arc<ScriptedClient>, exporter: Arc<RecordingExporter>) -> Session {
        Session::new(EndpointConfig::default(), client, exporter)
    }

    fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_completed_turn_extracts_document() {
        let client = Arc::new(ScriptedClient::new(vec![vec![
            Step::Delta("Here you go:\n```markdown\n# Spec\n"),
            Step::Delta("body\n```\n"),
            Step::Delta("Anything else?"),
            Step::Done,
        ]]));
        let session = make_session(client.clone(), Arc::default());

        let outcome = session.submit("Draft an SRS").await.unwrap();
        assert!(matches!(outcome, TurnOutcome::Completed { document_updated: true, .. }));

        let snap = session.snapshot();
        assert_eq!(snap.document, "# Spec\nbody");
        assert_eq!(snap.messages.len(), 2);
        assert_eq!(
            snap.messages[1].content,
            "Here you go:\n```markdown\n# Spec\nbody\n```\nAnything else?"
        );
        assert!(!snap.loading);
        assert_eq!(client.probes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_history_includes_new_user_message() {
        let client = Arc::new(ScriptedClient::new(vec![
            vec![Step::Delta("first reply"), Step::Done],
            vec![Step::Delta("second reply"), Step::Done],
        ]));
        let session = make_session(client.clone(), Arc::default());

        session.submit("one").await.unwrap();
        session.submit("two").await.unwrap();

        let histories = client.histories.lock();
        assert_eq!(histories[0].len(), 1);
        assert_eq!(histories[0][0].content, "one");
        let roles: Vec<Role> = histories[1].iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
        assert_eq!(histories[1][1].content, "first reply");
    }

    #[tokio::test]
    async fn test_events_follow_state_order() {
        let client = Arc::new(ScriptedClient::new(vec![vec![
            Step::Delta("# Spec"),
            Step::Done,
        ]]));
        let session = make_session(client, Arc::default());
        let mut rx = session.subscribe();

        session.submit("go").await.unwrap();

        let kinds: Vec<&'static str> = drain(&mut rx)
            .iter()
            .map(|e| match e {
                SessionEvent::TurnStart { .. } => "turn_start",
                SessionEvent::MessageStart { .. } => "message_start",
                SessionEvent::MessageUpdate { .. } => "message_update",
                SessionEvent::MessageEnd { .. } => "message_end",
                SessionEvent::DocumentUpdating => "document_updating",
                SessionEvent::DocumentUpdated { .. } => "document_updated",
                SessionEvent::TurnEnd { .. } => "turn_end",
                SessionEvent::Reset => "reset",
                SessionEvent::Error { .. } => "error",
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                "turn_start",
                "message_start",
                "message_update",
                "document_updating",
                "document_updated",
                "message_end",
                "turn_end",
            ]
        );
    }

    #[tokio::test]
    async fn test_probe_failure_returns_to_idle() {
        let session = make_session(Arc::new(ScriptedClient::unreachable()), Arc::default());
        let mut rx = session.subscribe();

        let err = session.submit("hello").await.unwrap_err();
        assert!(err.is_connectivity());

        let snap = session.snapshot();
        assert_eq!(snap.messages.len(), 1);
        assert_eq!(snap.messages[0].role, Role::User);
        assert!(!snap.loading);
        assert!(snap.last_error.is_some());
        assert!(drain(&mut rx).iter().any(|e| matches!(
            e,
            SessionEvent::Error { kind: ErrorKind::Connectivity, .. }
        )));
    }

    #[tokio::test]
    async fn test_transport_error_before_delta_removes_reply() {
        let client = Arc::new(ScriptedClient::new(vec![vec![Step::Fail("connection reset")]]));
        let session = make_session(client, Arc::default());

        let err = session.submit("hello").await.unwrap_err();
        assert!(matches!(err, Error::Ai(kinesis_ai::Error::Transport { .. })));

        let snap = session.snapshot();
        assert_eq!(snap.messages.len(), 1);
        assert!(!snap.loading);
    }

    #[tokio::test]
    async fn test_open_failure_removes_reply() {
        let client = Arc::new(ScriptedClient {
            open_fails: true,
            ..ScriptedClient::new(vec![])
        });
        let session = make_session(client, Arc::default());
        let mut rx = session.subscribe();

        assert!(session.submit("hello").await.is_err());
        assert_eq!(session.snapshot().messages.len(), 1);
        assert!(drain(&mut rx).iter().any(|e| matches!(
            e,
            SessionEvent::Error { kind: ErrorKind::Transport, message } if message.contains("500")
        )));
    }

    #[tokio::test]
    async fn test_transport_error_after_delta_keeps_partial() {
        let client = Arc::new(ScriptedClient::new(vec![vec![
            Step::Delta("Partial "),
            Step::Delta("answer"),
            Step::Fail("connection reset"),
        ]]));
        let session = make_session(client, Arc::default());

        assert!(session.submit("hello").await.is_err());

        let snap = session.snapshot();
        assert_eq!(snap.messages.len(), 2);
        assert_eq!(snap.messages[1].content, "Partial answer");
        assert!(!snap.loading);
    }

    #[tokio::test]
    async fn test_reset_mid_stream_discards_late_deltas() {
        let gate = Arc::new(Notify::new());
        let client = Arc::new(ScriptedClient::new(vec![vec![
            Step::Delta("# Spec v1"),
            Step::Wait(gate.clone()),
            Step::Delta("\nmore"),
            Step::Done,
        ]]));
        let session = make_session(client, Arc::default());
        let handle = session.handle();
        let mut rx = session.subscribe();

        let (outcome, _) = tokio::join!(session.submit("draft"), async {
            loop {
                match rx.recv().await {
                    Ok(SessionEvent::DocumentUpdated { .. }) => break,
                    Ok(_) => continue,
                    Err(e) => panic!("event channel closed: {}", e),
                }
            }
            assert_eq!(handle.snapshot().document, "# Spec v1");
            handle.reset();
            gate.notify_one();
        });

        assert_eq!(outcome.unwrap(), TurnOutcome::Abandoned);
        let snap = session.snapshot();
        assert!(snap.messages.is_empty());
        assert!(snap.document.is_empty());
        assert!(!snap.loading);
        assert!(!snap.document_updating);
    }

    #[tokio::test]
    async fn test_submit_while_streaming_is_busy() {
        let gate = Arc::new(Notify::new());
        let client = Arc::new(ScriptedClient::new(vec![vec![
            Step::Delta("thinking"),
            Step::Wait(gate.clone()),
            Step::Done,
        ]]));
        let session = make_session(client, Arc::default());
        let mut rx = session.subscribe();

        let (first, second) = tokio::join!(session.submit("first"), async {
            loop {
                if let Ok(SessionEvent::MessageUpdate { .. }) = rx.recv().await {
                    break;
                }
            }
            let before = session.snapshot().messages.len();
            let outcome = session.submit("second").await;
            assert_eq!(session.snapshot().messages.len(), before);
            gate.notify_one();
            outcome
        });

        assert!(matches!(first.unwrap(), TurnOutcome::Completed { .. }));
        assert_eq!(second.unwrap(), TurnOutcome::Busy);
        assert_eq!(session.snapshot().messages.len(), 2);
    }

    #[tokio::test]
    async fn test_dropped_submit_returns_to_idle() {
        let never = Arc::new(Notify::new());
        let client = Arc::new(ScriptedClient::new(vec![
            vec![Step::Wait(never), Step::Done],
            vec![Step::Delta("second reply"), Step::Done],
        ]));
        let session = make_session(client, Arc::default());
        let mut rx = session.subscribe();

        let timed_out =
            tokio::time::timeout(Duration::from_millis(50), session.submit("first")).await;
        assert!(timed_out.is_err());

        let snap = session.snapshot();
        assert!(!snap.loading);
        assert_eq!(snap.phase, TurnPhase::Idle);
        assert_eq!(snap.messages.len(), 1);
        assert_eq!(snap.messages[0].role, Role::User);
        assert!(drain(&mut rx)
            .iter()
            .any(|e| matches!(e, SessionEvent::TurnEnd { .. })));

        let outcome = session.submit("again").await.unwrap();
        assert!(matches!(outcome, TurnOutcome::Completed { .. }));
        let contents: Vec<String> = session
            .snapshot()
            .messages
            .iter()
            .map(|m| m.content.clone())
            .collect();
        assert_eq!(contents, vec!["first", "again", "second reply"]);
    }

    #[tokio::test]
    async fn test_dropped_submit_keeps_partial_reply() {
        let never = Arc::new(Notify::new());
        let client = Arc::new(ScriptedClient::new(vec![vec![
            Step::Delta("Partial"),
            Step::Wait(never),
        ]]));
        let session = make_session(client, Arc::default());

        let _ = tokio::time::timeout(Duration::from_millis(50), session.submit("first")).await;

        let snap = session.snapshot();
        assert!(!snap.loading);
        assert_eq!(snap.messages.len(), 2);
        assert_eq!(snap.messages[1].content, "Partial");
        assert_eq!(snap.last_error.as_deref(), Some("request cancelled"));
    }

    #[tokio::test]
    async fn test_completed_turn_ends_once() {
        let client = Arc::new(ScriptedClient::new(vec![vec![Step::Delta("hi"), Step::Done]]));
        let session = make_session(client, Arc::default());
        let mut rx = session.subscribe();

        session.submit("go").await.unwrap();
        let ends = drain(&mut rx)
            .iter()
            .filter(|e| matches!(e, SessionEvent::TurnEnd { .. }))
            .count();
        assert_eq!(ends, 1);
    }

    #[tokio::test]
    async fn test_replace_document_emits_only_on_change() {
        let session = make_session(Arc::new(ScriptedClient::new(vec![])), Arc::default());
        let mut rx = session.subscribe();

        assert!(session.replace_document("# Spec"));
        assert!(!session.replace_document("# Spec"));

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], SessionEvent::DocumentUpdating));
        assert!(matches!(
            &events[1],
            SessionEvent::DocumentUpdated { text, words: 2 } if text == "# Spec"
        ));
    }

    #[tokio::test]
    async fn test_export_with_empty_document_skips_collaborator() {
        let exporter = Arc::new(RecordingExporter::default());
        let session = make_session(Arc::new(ScriptedClient::new(vec![])), exporter.clone());

        let err = session.request_export(ExportFormat::Markdown).await.unwrap_err();
        assert!(matches!(err, Error::NothingToExport));
        assert!(exporter.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_export_passes_document_through() {
        let exporter = Arc::new(RecordingExporter::default());
        let session = make_session(Arc::new(ScriptedClient::new(vec![])), exporter.clone());
        session.replace_document("# Spec\nbody");

        let path = session.request_export(ExportFormat::Html).await.unwrap();
        assert!(path.to_string_lossy().ends_with(".html"));

        let calls = exporter.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "# Spec\nbody");
        assert!(calls[0].1.starts_with("kinesis-srs-"));
        assert_eq!(calls[0].2, ExportFormat::Html);
    }

    #[tokio::test]
    async fn test_export_failure_keeps_conversation() {
        let exporter = Arc::new(RecordingExporter {
            fail: true,
            ..Default::default()
        });
        let client = Arc::new(ScriptedClient::new(vec![vec![Step::Delta("# Spec"), Step::Done]]));
        let session = make_session(client, exporter);
        session.submit("go").await.unwrap();
        let before = session.snapshot();

        let err = session.request_export(ExportFormat::Markdown).await.unwrap_err();
        assert!(matches!(err, Error::Export(ExportError::Io(_))));
        assert_eq!(session.snapshot().messages, before.messages);
        assert_eq!(session.snapshot().document, "# Spec");
    }

    #[tokio::test]
    async fn test_reset_after_completed_turn() {
        let client = Arc::new(ScriptedClient::new(vec![vec![Step::Delta("# Spec"), Step::Done]]));
        let session = make_session(client, Arc::default());
        session.submit("go").await.unwrap();

        session.reset();
        let snap = session.snapshot();
        assert!(snap.messages.is_empty());
        assert!(snap.document.is_empty());
        assert!(!snap.loading);
        assert!(!snap.document_updating);
    }

    #[tokio::test]
    async fn test_list_models_uses_endpoint() {
        let session = make_session(Arc::new(ScriptedClient::new(vec![])), Arc::default());
        assert_eq!(session.list_models().await.unwrap(), vec!["llama3.2", "mistral"]);
        assert!(session.test_connection().await.is_ok());
    }
}
