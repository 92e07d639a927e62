//! Linear undo/redo history
//!
//! One instance backs each editable buffer. Adding a snapshot while the cursor
//! is behind the newest entry discards the redo branch.

/// Snapshots plus a cursor; the cursor is valid whenever `snapshots` is non-empty
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History<T = String> {
    snapshots: Vec<T>,
    cursor: usize,
}

impl<T> Default for History<T> {
    fn default() -> Self {
        Self {
            snapshots: Vec::new(),
            cursor: 0,
        }
    }
}

impl<T> History<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `snapshot` after the cursor, dropping anything that could be redone
    ///
    /// No deduplication happens here; callers decide when a snapshot is new.
    pub fn add(&mut self, snapshot: T) {
        if !self.snapshots.is_empty() {
            self.snapshots.truncate(self.cursor + 1);
        }
        self.snapshots.push(snapshot);
        self.cursor = self.snapshots.len() - 1;
    }

    pub fn current(&self) -> Option<&T> {
        self.snapshots.get(self.cursor)
    }

    /// Step back; `None` at the oldest snapshot or when empty
    pub fn undo(&mut self) -> Option<&T> {
        if self.cursor == 0 || self.snapshots.is_empty() {
            return None;
        }
        self.cursor -= 1;
        self.snapshots.get(self.cursor)
    }

    /// Step forward; `None` at the newest snapshot or when empty
    pub fn redo(&mut self) -> Option<&T> {
        if self.cursor + 1 >= self.snapshots.len() {
            return None;
        }
        self.cursor += 1;
        self.snapshots.get(self.cursor)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: Option<&String>) -> Option<&str> {
        value.map(String::as_str)
    }

    #[test]
    fn test_empty_history() {
        let mut history: History = History::new();
        assert!(history.is_empty());
        assert_eq!(history.current(), None);
        assert_eq!(history.undo(), None);
        assert_eq!(history.redo(), None);
    }

    #[test]
    fn test_undo_redo_scenario() {
        let mut history = History::new();
        history.add("a".to_string());
        history.add("b".to_string());
        history.add("c".to_string());

        assert_eq!(text(history.undo()), Some("b"));
        assert_eq!(text(history.undo()), Some("a"));
        assert_eq!(text(history.undo()), None);
        assert_eq!(text(history.current()), Some("a"));
        assert_eq!(text(history.redo()), Some("b"));

        history.add("d".to_string());
        assert_eq!(text(history.redo()), None);
        assert_eq!(text(history.current()), Some("d"));
        assert_eq!(history.len(), 3);
        assert_eq!(text(history.undo()), Some("b"));
        assert_eq!(text(history.undo()), Some("a"));
    }

    #[test]
    fn test_redo_at_end_is_unchanged() {
        let mut history = History::new();
        history.add(1);
        history.add(2);
        assert_eq!(history.redo(), None);
        assert_eq!(history.current(), Some(&2));
    }

    #[test]
    fn test_add_does_not_deduplicate() {
        let mut history = History::new();
        history.add("same");
        history.add("same");
        assert_eq!(history.len(), 2);
        assert_eq!(history.undo(), Some(&"same"));
    }

    #[test]
    fn test_add_after_full_undo_discards_everything_ahead() {
        let mut history = History::new();
        history.add("a");
        history.add("b");
        history.undo();
        history.add("x");
        assert_eq!(history.len(), 2);
        assert_eq!(history.undo(), Some(&"a"));
        assert_eq!(history.redo(), Some(&"x"));
    }
}
