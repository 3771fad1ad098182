//! The single current SRS draft

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::extractor::word_count;

/// Document state. Text is always replaced wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    text: String,
    updating: bool,
    updated_at: Option<DateTime<Utc>>,
}

impl Document {
    /// Current document text (possibly empty)
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// True only while a replacement is being applied
    pub fn is_updating(&self) -> bool {
        self.updating
    }

    /// When the text last changed
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn word_count(&self) -> usize {
        word_count(&self.text)
    }

    /// Replace the text and touch the timestamp
    pub(crate) fn replace(&mut self, text: String) {
        self.updating = true;
        self.text = text;
        self.updated_at = Some(Utc::now());
        self.updating = false;
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }
}
