//! Editable text buffers with their own undo/redo history

use std::fmt;
use std::str::FromStr;

use crate::history::History;

/// The three independent editable panes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Natural-language prompt for the assistant
    Query,
    /// XPath expression
    Expression,
    /// Script handed to the script runner
    Script,
}

impl BufferKind {
    pub const ALL: [BufferKind; 3] = [BufferKind::Query, BufferKind::Expression, BufferKind::Script];
}

impl FromStr for BufferKind {
    type Err = String;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_ascii_lowercase().as_str() {
            "query" | "ask" | "prompt" => Ok(BufferKind::Query),
            "xpath" | "expression" | "expr" => Ok(BufferKind::Expression),
            "code" | "script" => Ok(BufferKind::Script),
            other => Err(format!("Unknown buffer: {}", other)),
        }
    }
}

impl fmt::Display for BufferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BufferKind::Query => "query",
            BufferKind::Expression => "xpath",
            BufferKind::Script => "code",
        };
        f.write_str(name)
    }
}

/// Live text plus the snapshots it can be rolled back to
#[derive(Debug, Clone, Default)]
pub struct EditBuffer {
    text: String,
    history: History<String>,
}

impl EditBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace the live text without recording a snapshot
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Record the live text unless it already is the current snapshot
    pub fn commit(&mut self) {
        if self.history.current() != Some(&self.text) {
            self.history.add(self.text.clone());
        }
    }

    /// Commit pending edits, then step back one snapshot
    ///
    /// Returns `false` when there was nothing to undo; the text is untouched then.
    pub fn undo(&mut self) -> bool {
        self.commit();
        match self.history.undo() {
            Some(previous) => {
                self.text = previous.clone();
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.history.redo() {
            Some(next) => {
                self.text = next.clone();
                true
            }
            None => false,
        }
    }

    /// Empty the live text; history is kept
    pub fn clear(&mut self) {
        self.text.clear();
    }

    pub fn history(&self) -> &History<String> {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_skips_unchanged_text() {
        let mut buffer = EditBuffer::new();
        buffer.set_text("//a");
        buffer.commit();
        buffer.commit();
        assert_eq!(buffer.history().len(), 1);
    }

    #[test]
    fn test_undo_commits_pending_edit() {
        let mut buffer = EditBuffer::new();
        buffer.set_text("//a");
        buffer.commit();
        buffer.set_text("//b");

        assert!(buffer.undo());
        assert_eq!(buffer.text(), "//a");
        assert!(buffer.redo());
        assert_eq!(buffer.text(), "//b");
        assert!(!buffer.redo());
    }

    #[test]
    fn test_undo_with_single_snapshot_keeps_text() {
        let mut buffer = EditBuffer::new();
        buffer.set_text("only");
        assert!(!buffer.undo());
        assert_eq!(buffer.text(), "only");
    }

    #[test]
    fn test_clear_keeps_history() {
        let mut buffer = EditBuffer::new();
        buffer.set_text("x");
        buffer.commit();
        buffer.clear();
        assert_eq!(buffer.text(), "");
        assert_eq!(buffer.history().current().map(String::as_str), Some("x"));
        assert!(buffer.undo());
        assert_eq!(buffer.text(), "x");
    }

    #[test]
    fn test_buffer_kind_names() {
        let names: Vec<String> = BufferKind::ALL.iter().map(ToString::to_string).collect();
        assert_eq!(names, vec!["query", "xpath", "code"]);
        for kind in BufferKind::ALL {
            assert_eq!(kind.to_string().parse::<BufferKind>(), Ok(kind));
        }
        assert_eq!("Script".parse::<BufferKind>(), Ok(BufferKind::Script));
        assert!("window".parse::<BufferKind>().is_err());
    }
}
