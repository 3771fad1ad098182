//! Document extraction from streamed assistant output
//!
//! The assistant interleaves conversational commentary with the SRS draft.
//! Extraction runs on every delta, so it is a fixed, ordered list of cheap
//! pattern recognizers: the first one that matches decides what the document
//! is. Recognizers are pure and hold no state across calls.

use std::sync::LazyLock;

use regex::Regex;

/// Fenced block labeled as a document, e.g. "```markdown".
/// The closing fence is required, so an unfinished block falls through to the
/// heading recognizers while it streams.
static FENCED_DOCUMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[ \t]*(?i:markdown|md|srs|document)[ \t]*\r?\n(.*?)\r?\n[ \t]*```")
        .expect("valid fenced document pattern")
});

/// Top-level heading naming the document itself
static DOCUMENT_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)^[ \t]{0,3}#[ \t]+.*(?:requirements|specification|\bsrs\b).*$")
        .expect("valid document title pattern")
});

/// Sub-heading naming a typical SRS section
static SECTION_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?mi)^[ \t]{0,3}#{2,3}[ \t]+.*(?:introduction|overview|scope|requirements|constraints|assumptions|interfaces|appendix|appendices).*$",
    )
    .expect("valid section heading pattern")
});

static TOP_LEVEL_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]{0,3}#[ \t]+\S").expect("valid top-level heading pattern")
});

static ANY_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]{0,3}#{1,6}[ \t]+\S").expect("valid heading pattern")
});

/// A single extraction policy
pub trait Recognizer: Send + Sync {
    /// Short name, used in logs
    fn name(&self) -> &str;

    /// Return the document portion of `text` if this policy recognizes one
    fn recognize<'a>(&self, text: &'a str) -> Option<&'a str>;
}

/// Boxed recognizer
pub type BoxedRecognizer = Box<dyn Recognizer>;

/// Extracts the interior of a fenced block labeled as a document
pub struct FencedBlock;

impl Recognizer for FencedBlock {
    fn name(&self) -> &str {
        "fenced_block"
    }

    fn recognize<'a>(&self, text: &'a str) -> Option<&'a str> {
        FENCED_DOCUMENT
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }
}

/// Extracts everything from the first line matching a heading pattern to the end
pub struct HeadingToEnd {
    name: &'static str,
    pattern: &'static LazyLock<Regex>,
}

impl HeadingToEnd {
    /// "# System Requirements Specification" and similar titles
    pub fn document_title() -> Self {
        Self {
            name: "document_title",
            pattern: &DOCUMENT_TITLE,
        }
    }

    /// "## 1. Introduction", "### Functional Requirements" and similar sections
    pub fn section_heading() -> Self {
        Self {
            name: "section_heading",
            pattern: &SECTION_HEADING,
        }
    }

    /// Any "# " heading
    pub fn top_level_heading() -> Self {
        Self {
            name: "top_level_heading",
            pattern: &TOP_LEVEL_HEADING,
        }
    }
}

impl Recognizer for HeadingToEnd {
    fn name(&self) -> &str {
        self.name
    }

    fn recognize<'a>(&self, text: &'a str) -> Option<&'a str> {
        self.pattern.find(text).map(|m| &text[m.start()..])
    }
}

/// Ordered list of recognizers plus the whole-text fallback
pub struct DocumentExtractor {
    recognizers: Vec<BoxedRecognizer>,
}

impl Default for DocumentExtractor {
    fn default() -> Self {
        Self {
            recognizers: vec![
                Box::new(FencedBlock),
                Box::new(HeadingToEnd::document_title()),
                Box::new(HeadingToEnd::section_heading()),
                Box::new(HeadingToEnd::top_level_heading()),
            ],
        }
    }
}

impl DocumentExtractor {
    /// Create an extractor with the standard recognizers
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an extractor with no recognizers; only the fallback applies
    pub fn empty() -> Self {
        Self {
            recognizers: Vec::new(),
        }
    }

    /// Append a recognizer after the existing ones
    pub fn with_recognizer(mut self, recognizer: impl Recognizer + 'static) -> Self {
        self.recognizers.push(Box::new(recognizer));
        self
    }

    /// Names of the recognizers, in evaluation order
    pub fn recognizer_names(&self) -> Vec<&str> {
        self.recognizers.iter().map(|r| r.name()).collect()
    }

    /// Find the document portion of `full_text`, if any, without comparing to
    /// a previous document. Returns the name of the policy that matched.
    pub fn classify<'a>(&self, full_text: &'a str) -> Option<(&str, &'a str)> {
        self.recognizers
            .iter()
            .find_map(|r| r.recognize(full_text).map(|text| (r.name(), text)))
            .or_else(|| {
                ANY_HEADING
                    .is_match(full_text)
                    .then_some(("whole_text", full_text))
            })
    }

    /// Decide whether `full_text` carries a new document.
    ///
    /// Returns `None` when nothing is recognized, when the candidate is empty,
    /// or when it equals `previous`.
    pub fn extract(&self, full_text: &str, previous: &str) -> Option<String> {
        let (name, candidate) = self.classify(full_text)?;
        let candidate = candidate.trim();
        if candidate.is_empty() || candidate == previous {
            return None;
        }
        tracing::trace!(recognizer = name, len = candidate.len(), "document extracted");
        Some(candidate.to_string())
    }
}

/// Count whitespace-separated words
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
