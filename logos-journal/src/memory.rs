//! In-memory editor host.
//!
//! Backs the test suites and benchmarks, and serves embedders that keep
//! their buffers in plain strings. Each [`MemoryDocument`] keeps a linear
//! native undo stack; [`MemoryHost`] models a workspace of files that may
//! be open or closed.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::io;
use std::ops::Range;

use crate::host::{Direction, Document, Host};
use crate::marks::{Mark, UndoMarks};
use crate::span::{self, ChangeSpan};
use crate::storage::FileId;

/// One native undo action.
#[derive(Debug, Clone)]
struct Action {
    start: usize,
    removed: String,
    inserted: String,
}

/// Text buffer with a linear undo stack and undo marks.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocument {
    text: String,
    actions: Vec<Action>,
    /// Number of applied actions; `actions[current..]` are redoable
    current: usize,
    marks: UndoMarks,
    last_keep_selection: Option<bool>,
}

impl MemoryDocument {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Apply `spans` as a single undo action.
    pub fn apply_spans(&mut self, spans: &[ChangeSpan]) -> Result<(), crate::error::CodecError> {
        let (Some(first), Some(last)) = (spans.first(), spans.last()) else {
            return Ok(());
        };
        let new_text = span::apply(&self.text, spans)?;
        let tail = self.text.len() - last.end;
        let inserted = new_text[first.start..new_text.len() - tail].to_string();
        self.replace_range(first.start..last.end, &inserted);
        Ok(())
    }

    pub fn undo_len(&self) -> usize {
        self.current
    }

    /// `keep_selection` flag of the most recent native undo/redo.
    pub fn last_keep_selection(&self) -> Option<bool> {
        self.last_keep_selection
    }
}

impl Document for MemoryDocument {
    fn text(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.text)
    }

    fn replace_range(&mut self, range: Range<usize>, text: &str) {
        let removed = self.text[range.clone()].to_string();
        self.text.replace_range(range.clone(), text);
        self.actions.truncate(self.current);
        self.actions.push(Action {
            start: range.start,
            removed,
            inserted: text.to_string(),
        });
        self.current = self.actions.len();
        self.marks.on_modified(self.actions.len());
    }

    fn native_undo(&mut self, keep_selection: bool) -> bool {
        if self.current == 0 {
            return false;
        }
        self.current -= 1;
        let action = &self.actions[self.current];
        let end = action.start + action.inserted.len();
        self.text.replace_range(action.start..end, &action.removed);
        self.last_keep_selection = Some(keep_selection);
        true
    }

    fn native_redo(&mut self, keep_selection: bool) -> bool {
        if self.current == self.actions.len() {
            return false;
        }
        let action = &self.actions[self.current];
        let end = action.start + action.removed.len();
        self.text.replace_range(action.start..end, &action.inserted);
        self.current += 1;
        self.last_keep_selection = Some(keep_selection);
        true
    }

    fn can_undo(&self) -> bool {
        self.current > 0
    }

    fn can_redo(&self) -> bool {
        self.current < self.actions.len()
    }

    fn set_mark(&mut self, mark: Mark) {
        self.marks.set(self.current, mark);
    }

    fn mark(&self, direction: Direction) -> Mark {
        self.marks.get(self.current, self.actions.len(), direction)
    }

    fn empty_undo_buffer(&mut self) {
        self.actions.clear();
        self.current = 0;
        self.marks.clear();
    }
}

#[derive(Debug, Clone)]
struct MemoryFile {
    name: String,
    /// Saved text
    disk: String,
    /// Open editor, if any
    doc: Option<MemoryDocument>,
}

/// Workspace of named files held in memory.
#[derive(Debug, Clone)]
pub struct MemoryHost {
    files: HashMap<FileId, MemoryFile>,
    active: Option<FileId>,
    /// Answer given to every confirmation prompt
    confirm_answer: bool,
    prompts: Vec<(String, String)>,
    reports: Vec<String>,
    failing: HashSet<FileId>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    pub fn new() -> Self {
        Self {
            files: HashMap::new(),
            active: None,
            confirm_answer: true,
            prompts: Vec::new(),
            reports: Vec::new(),
            failing: HashSet::new(),
        }
    }

    /// Add a closed file.
    pub fn add_file(&mut self, name: impl Into<String>, text: impl Into<String>) -> FileId {
        let id = FileId::new();
        self.files.insert(
            id,
            MemoryFile {
                name: name.into(),
                disk: text.into(),
                doc: None,
            },
        );
        id
    }

    /// Open a file in an editor and make it active.
    pub fn open(&mut self, file: FileId) {
        if let Some(f) = self.files.get_mut(&file) {
            if f.doc.is_none() {
                f.doc = Some(MemoryDocument::new(f.disk.clone()));
            }
            self.active = Some(file);
        }
    }

    /// Save and close an editor.
    pub fn close(&mut self, file: FileId) {
        if let Some(f) = self.files.get_mut(&file) {
            if let Some(doc) = f.doc.take() {
                f.disk = doc.text;
            }
        }
        if self.active == Some(file) {
            self.active = None;
        }
    }

    pub fn remove_file(&mut self, file: FileId) {
        self.files.remove(&file);
        if self.active == Some(file) {
            self.active = None;
        }
    }

    /// Current text: the editor's if open, otherwise the saved one.
    pub fn text(&self, file: FileId) -> Option<String> {
        let f = self.files.get(&file)?;
        Some(match &f.doc {
            Some(doc) => doc.text.clone(),
            None => f.disk.clone(),
        })
    }

    /// Apply `spans` like a find/replace would: one undo action in an open
    /// editor, a rewrite of the saved text otherwise. Returns (old, new).
    pub fn apply_edit(&mut self, file: FileId, spans: &[ChangeSpan]) -> Option<(String, String)> {
        let f = self.files.get_mut(&file)?;
        match &mut f.doc {
            Some(doc) => {
                let old = doc.text.clone();
                doc.apply_spans(spans).ok()?;
                Some((old, doc.text.clone()))
            }
            None => {
                let new = span::apply(&f.disk, spans).ok()?;
                let old = std::mem::replace(&mut f.disk, new.clone());
                Some((old, new))
            }
        }
    }

    /// Change a saved file behind the editor's back.
    pub fn write_externally(&mut self, file: FileId, text: impl Into<String>) {
        if let Some(f) = self.files.get_mut(&file) {
            f.disk = text.into();
        }
    }

    /// Make loads and saves of `file` fail.
    pub fn fail_io(&mut self, file: FileId) {
        self.failing.insert(file);
    }

    pub fn document(&self, file: FileId) -> Option<&MemoryDocument> {
        self.files.get(&file)?.doc.as_ref()
    }

    pub fn saved_text(&self, file: FileId) -> Option<&str> {
        self.files.get(&file).map(|f| f.disk.as_str())
    }

    pub fn set_confirm_answer(&mut self, answer: bool) {
        self.confirm_answer = answer;
    }

    pub fn prompts(&self) -> &[(String, String)] {
        &self.prompts
    }

    pub fn reports(&self) -> &[String] {
        &self.reports
    }

    fn check_io(&self, file: FileId) -> io::Result<&MemoryFile> {
        if self.failing.contains(&file) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "access denied"));
        }
        self.files
            .get(&file)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))
    }
}

impl Host for MemoryHost {
    type Doc = MemoryDocument;

    fn active_file(&self) -> Option<FileId> {
        self.active
    }

    fn document_mut(&mut self, file: FileId) -> Option<&mut MemoryDocument> {
        self.files.get_mut(&file)?.doc.as_mut()
    }

    fn file_exists(&self, file: FileId) -> bool {
        self.files.contains_key(&file)
    }

    fn load_text(&mut self, file: FileId) -> io::Result<String> {
        Ok(self.check_io(file)?.disk.clone())
    }

    fn save_text(&mut self, file: FileId, text: &str) -> io::Result<()> {
        self.check_io(file)?;
        if let Some(f) = self.files.get_mut(&file) {
            f.disk = text.to_string();
        }
        Ok(())
    }

    fn display_name(&self, file: FileId) -> String {
        self.files
            .get(&file)
            .map_or_else(|| file.to_string(), |f| f.name.clone())
    }

    fn confirm(&mut self, title: &str, message: &str) -> bool {
        self.prompts.push((title.to_string(), message.to_string()));
        self.confirm_answer
    }

    fn report(&mut self, message: &str) {
        self.reports.push(message.to_string());
    }
}
