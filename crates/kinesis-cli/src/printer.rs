//! Turns session events into terminal output for one turn

use kinesis_agent::{ErrorKind, SessionEvent};

/// A piece of output and the stream it belongs on
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Stdout(String),
    Stderr(String),
}

/// Per-turn printer state.
///
/// Streamed text goes to stdout as it arrives. Document changes are only
/// remembered while streaming and announced once when the message or turn
/// ends, with the final word count.
#[derive(Debug)]
pub struct TurnPrinter {
    show_stats: bool,
    document_words: Option<usize>,
}

impl TurnPrinter {
    pub fn new(show_stats: bool) -> Self {
        Self {
            show_stats,
            document_words: None,
        }
    }

    pub fn handle(&mut self, event: SessionEvent) -> Vec<Output> {
        let mut out = Vec::new();
        match event {
            SessionEvent::MessageUpdate { fragment, .. } => out.push(Output::Stdout(fragment)),
            SessionEvent::DocumentUpdated { words, .. } => self.document_words = Some(words),
            SessionEvent::MessageEnd { stats, .. } => {
                out.push(Output::Stdout("\n".into()));
                let timing = stats.and_then(|s| s.eval_count.zip(s.eval_duration));
                if let (true, Some((tokens, nanos))) = (self.show_stats, timing) {
                    let secs = nanos as f64 / 1e9;
                    out.push(Output::Stdout(format!("[{} tokens in {:.1}s]\n", tokens, secs)));
                }
                out.extend(self.announce_document());
            }
            SessionEvent::TurnEnd { .. } => out.extend(self.announce_document()),
            SessionEvent::Error { kind, message } => {
                let label = match kind {
                    ErrorKind::Connectivity => "Connection error",
                    ErrorKind::Transport => "Error",
                    ErrorKind::Export => "Export failed",
                };
                out.push(Output::Stderr(format!("\n{}: {}\n", label, message)));
            }
            _ => {}
        }
        out
    }

    fn announce_document(&mut self) -> Option<Output> {
        self.document_words
            .take()
            .map(|words| Output::Stderr(format!("[document updated: {} words]\n", words)))
    }
}
