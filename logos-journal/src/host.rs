//! Interfaces the host editor provides to the journal.
//!
//! The journal never owns editor state. It reads and patches documents,
//! loads and saves closed files, and asks the user through these traits.

use std::borrow::Cow;
use std::fmt;
use std::io;
use std::ops::Range;

use crate::marks::Mark;
use crate::storage::FileId;

/// Which way a replay goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Undo,
    Redo,
}

impl Direction {
    pub fn verb(self) -> &'static str {
        match self {
            Direction::Undo => "Undo",
            Direction::Redo => "Redo",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Undo => f.write_str("undo"),
            Direction::Redo => f.write_str("redo"),
        }
    }
}

/// An open document with its own native, linear undo stack.
pub trait Document {
    /// Full current text.
    fn text(&self) -> Cow<'_, str>;

    /// Replace a byte range with `text` as one native undo action.
    fn replace_range(&mut self, range: Range<usize>, text: &str);

    /// Undo one native action. `keep_selection` asks the editor to leave the
    /// caret where it is. Returns false when there was nothing to undo.
    fn native_undo(&mut self, keep_selection: bool) -> bool;

    /// Redo one native action. See [`native_undo`](Self::native_undo).
    fn native_redo(&mut self, keep_selection: bool) -> bool;

    fn can_undo(&self) -> bool;

    fn can_redo(&self) -> bool;

    /// Tag the entry at the current undo position.
    fn set_mark(&mut self, mark: Mark);

    /// Tag of the entry that the next undo or redo would process.
    fn mark(&self, direction: Direction) -> Mark;

    /// Drop all native undo/redo history.
    fn empty_undo_buffer(&mut self);

    /// Replace the whole text in a single action.
    fn replace_all(&mut self, text: &str) {
        let len = self.text().len();
        self.replace_range(0..len, text);
    }
}

/// The editor session: documents, files on disk and the user.
pub trait Host {
    type Doc: Document;

    /// File shown in the active editor, if any.
    fn active_file(&self) -> Option<FileId>;

    /// Open document for `file`, if it is open.
    fn document_mut(&mut self, file: FileId) -> Option<&mut Self::Doc>;

    /// Whether `file` still belongs to the workspace.
    fn file_exists(&self, file: FileId) -> bool;

    /// Read the text of a closed file.
    fn load_text(&mut self, file: FileId) -> io::Result<String>;

    /// Write the text of a file to disk.
    fn save_text(&mut self, file: FileId, text: &str) -> io::Result<()>;

    /// Human readable name used in reports.
    fn display_name(&self, file: FileId) -> String;

    /// Yes/no question shown before a multi-file replay.
    fn confirm(&mut self, title: &str, message: &str) -> bool;

    /// Post-operation message, e.g. the list of skipped files.
    fn report(&mut self, message: &str);
}
