use std::sync::Arc;

use grove_core::{LineIndex, Range, TextEdit, TextRange, TextSize};
use thiserror::Error;

/// An LSP-style content change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentChange {
    /// The range of text to replace. If `None`, the entire document is replaced.
    pub range: Option<Range>,
    pub text: String,
}

impl ContentChange {
    pub fn full(text: impl Into<String>) -> Self {
        Self {
            range: None,
            text: text.into(),
        }
    }

    pub fn replace(range: Range, text: impl Into<String>) -> Self {
        Self {
            range: Some(range),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("document not open: {0}")]
    DocumentNotOpen(String),
}

/// An in-memory document with versioning and incremental edits.
#[derive(Debug, Clone)]
pub struct Document {
    text: Arc<String>,
    version: i32,
    line_index: LineIndex,
}

impl Document {
    pub fn new(text: Arc<String>, version: i32) -> Self {
        let line_index = LineIndex::new(&text);
        Self {
            text,
            version,
            line_index,
        }
    }

    pub fn new_string(text: impl Into<String>, version: i32) -> Self {
        Self::new(Arc::new(text.into()), version)
    }

    pub fn text(&self) -> &str {
        self.text.as_str()
    }

    pub fn text_arc(&self) -> Arc<String> {
        Arc::clone(&self.text)
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    /// Replaces the text without touching the version.
    pub fn set_text(&mut self, text: Arc<String>) {
        self.line_index = LineIndex::new(&text);
        self.text = text;
    }

    /// Applies a sequence of LSP changes in order and returns the normalized edits.
    ///
    /// A ranged change whose positions do not map into the current text (stale client state,
    /// lines past the end) is applied as a full replacement with the change's text rather than
    /// rejected; the editor resynchronizes on its next full-content change anyway.
    pub fn apply_changes(&mut self, new_version: i32, changes: &[ContentChange]) -> Vec<TextEdit> {
        let mut edits = Vec::with_capacity(changes.len());
        for change in changes {
            edits.push(self.apply_change(change));
        }
        self.version = new_version;
        edits
    }

    fn apply_change(&mut self, change: &ContentChange) -> TextEdit {
        let range = change
            .range
            .and_then(|range| self.line_index.text_range(&self.text, range));

        let range = match range {
            Some(range) => range,
            None => {
                if change.range.is_some() {
                    tracing::debug!(
                        target: "grove.vfs",
                        range = ?change.range,
                        len = self.text.len(),
                        "change range out of bounds; replacing full document"
                    );
                }
                TextRange::new(TextSize::from(0), self.line_index.text_len())
            }
        };

        let start = u32::from(range.start()) as usize;
        let end = u32::from(range.end()) as usize;
        let text = Arc::make_mut(&mut self.text);
        text.replace_range(start..end, &change.text);
        self.line_index = LineIndex::new(text);

        TextEdit::new(range, change.text.clone())
    }
}
