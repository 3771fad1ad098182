//! Newline-delimited JSON record framing
//!
//! Network reads do not respect record boundaries, so bytes are buffered until
//! a full line is available. Bytes are kept raw until a newline is seen, which
//! keeps multi-byte UTF-8 sequences split across reads intact.

use serde::Deserialize;

use crate::types::CompletionStats;

/// Splits a byte stream into complete lines
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes, returning every line it completes.
    /// Blank lines are dropped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(line) = to_line(&line[..line.len() - 1]) {
                lines.push(line);
            }
        }
        lines
    }

    /// Flush a trailing record that was not newline-terminated
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        to_line(&rest)
    }
}

fn to_line(bytes: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(bytes);
    let line = line.trim();
    if line.is_empty() {
        None
    } else {
        Some(line.to_string())
    }
}

/// One record of an Ollama `/api/chat` stream
#[derive(Debug, Deserialize)]
pub struct ChatRecord {
    #[serde(default)]
    pub message: Option<RecordMessage>,
    #[serde(default)]
    pub done: bool,
    /// Error reported inside an otherwise successful response
    #[serde(default)]
    pub error: Option<String>,
    #[serde(flatten)]
    pub stats: CompletionStats,
}

#[derive(Debug, Deserialize)]
pub struct RecordMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: String,
}

impl ChatRecord {
    /// Decode one line
    pub fn parse(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }

    /// Text carried by this record, if any
    pub fn content(&self) -> Option<&str> {
        self.message
            .as_ref()
            .map(|m| m.content.as_str())
            .filter(|c| !c.is_empty())
    }
}
