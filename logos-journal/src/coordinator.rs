//! Undo/redo coordinator.
//!
//! ```text
//!  undo() / redo()                     undo_multi_file() / redo_multi_file()
//!        │                                         │
//!  mark at active doc ─── Record(id) ──┐           │ next id from the cursor
//!        │ None / NativeOnly           ▼           ▼
//!        ▼                        ┌──────────────────────┐
//!   native undo/redo              │  replay(id, dir)     │
//!                                 │  confirm → per file: │
//!                                 │  native | replace |  │
//!                                 │  patch | load+save | │
//!                                 │  skip                │
//!                                 └──────────────────────┘
//! ```
//!
//! The coordinator is the only owner of the [`EditLog`]. It is created with
//! the editing session and dropped with it.

use crate::edit_log::{CommitOutcome, EditLog};
use crate::error::JournalError;
use crate::hash::ContentHash;
use crate::host::{Direction, Document, Host};
use crate::marks::Mark;
use crate::span::ChangeSpan;
use crate::storage::{FileDelta, FileId, JournalStats, RecordId, StoreConfig};

// ─── Configuration ───────────────────────────────────────────────────────

/// Journal configuration.
#[derive(Debug, Clone)]
pub struct JournalConfig {
    /// Backing store; a `None` path keeps the journal in a temp directory
    pub store: StoreConfig,
    /// Ask the host before every multi-file replay
    pub confirm_replay: bool,
    /// Delete records made unreachable by a history fork
    pub prune_invalidated: bool,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            confirm_replay: true,
            prune_invalidated: true,
        }
    }
}

impl JournalConfig {
    pub fn for_testing() -> Self {
        Self {
            store: StoreConfig::for_testing(),
            confirm_replay: false,
            prune_invalidated: true,
        }
    }
}

// ─── Scratch buffers ─────────────────────────────────────────────────────

/// Buffers reused by every encode and replay.
#[derive(Debug, Default)]
pub struct Scratch {
    pub blob: Vec<u8>,
    pub spans: Vec<ChangeSpan>,
    pub text: String,
}

impl Scratch {
    /// Clear contents, keeping capacity.
    pub fn reset(&mut self) {
        self.blob.clear();
        self.spans.clear();
        self.text.clear();
    }
}

// ─── Events ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalEvent {
    Committed { id: RecordId, files: usize },
    NativeOnly { id: RecordId, file: FileId },
    RolledBack { id: RecordId },
    Replayed {
        id: RecordId,
        direction: Direction,
        applied: usize,
        skipped: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&JournalEvent)>;

// ─── Replay results ──────────────────────────────────────────────────────

/// How one file was brought to its target state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    /// Native undo/redo of the marked document entry
    Native,
    /// Whole text replaced, native history dropped
    Replaced,
    /// Spans applied to the open document
    Patched,
    /// Closed file rewritten on disk
    Saved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Modified,
    NothingToReplay,
    Io(String),
    Corrupt(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Modified => f.write_str("Modified since recorded."),
            SkipReason::NothingToReplay => f.write_str("Nothing to replay in the editor."),
            SkipReason::Io(e) => write!(f, "{e}"),
            SkipReason::Corrupt(e) => write!(f, "Stored delta is unusable: {e}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub file: FileId,
    pub name: String,
    pub reason: SkipReason,
}

/// Result of replaying one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayReport {
    pub id: RecordId,
    pub direction: Direction,
    pub description: String,
    pub applied: Vec<(FileId, FileAction)>,
    pub skipped: Vec<SkippedFile>,
}

impl ReplayReport {
    fn new(id: RecordId, direction: Direction, description: String) -> Self {
        Self {
            id,
            direction,
            description,
            applied: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn action(&self, file: FileId) -> Option<FileAction> {
        self.applied.iter().find(|(f, _)| *f == file).map(|(_, a)| *a)
    }

    pub fn is_skipped(&self, file: FileId) -> bool {
        self.skipped.iter().any(|s| s.file == file)
    }

    /// User-facing summary of skipped files, `None` when nothing was skipped.
    pub fn message(&self) -> Option<String> {
        if self.skipped.is_empty() {
            return None;
        }
        let mut msg = format!("The multi-file {} operation skipped these files:", self.direction);
        for s in &self.skipped {
            msg.push_str(&format!("\n\t{}. {}", s.name, s.reason));
        }
        Some(msg)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoRedoOutcome {
    /// Nothing to undo or redo
    Nothing,
    /// Plain undo/redo of the active document
    Native,
    /// The user declined the replay of this record
    Declined(RecordId),
    Replayed(ReplayReport),
}

// ─── Coordinator ─────────────────────────────────────────────────────────

pub struct UndoRedoCoordinator {
    config: JournalConfig,
    log: EditLog,
    /// Open documents marked for the record being captured
    marked: Vec<FileId>,
    scratch: Scratch,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
}

impl UndoRedoCoordinator {
    /// Open the journal. A store failure leaves multi-file undo disabled.
    pub fn new(config: JournalConfig) -> Self {
        let log = EditLog::open(config.store.clone(), config.prune_invalidated);
        Self::with_log(log, config)
    }

    pub fn with_log(log: EditLog, config: JournalConfig) -> Self {
        Self {
            config,
            log,
            marked: Vec::new(),
            scratch: Scratch::default(),
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.log.is_enabled()
    }

    // ─── Capture ─────────────────────────────────────────────────────────

    /// Open a record. `None` when the journal is disabled.
    pub fn begin_record(&mut self) -> Option<RecordId> {
        self.marked.clear();
        self.scratch.reset();
        match self.log.begin() {
            Ok(id) => Some(id),
            Err(e) => {
                log::debug!("begin_record ignored: {e}");
                None
            }
        }
    }

    /// Journal the change of one file and mark its open document.
    ///
    /// A disabled journal ignores the call.
    pub fn add_file_delta<H: Host>(
        &mut self,
        host: &mut H,
        id: RecordId,
        file: FileId,
        old_text: &str,
        new_text: &str,
        spans: &[ChangeSpan],
    ) -> Result<(), JournalError> {
        let staged = match self.log.add_file_delta(id, file, old_text, new_text, spans, &mut self.scratch.blob) {
            Ok(staged) => staged,
            Err(JournalError::StorageUnavailable) => return Ok(()),
            Err(e) => return Err(e),
        };
        if staged {
            if let Some(doc) = host.document_mut(file) {
                doc.set_mark(Mark::Record(id));
                self.marked.push(file);
            }
        }
        Ok(())
    }

    /// Close the record. Returns false when nothing could be committed.
    pub fn commit_record<H: Host>(&mut self, host: &mut H, id: RecordId, description: &str) -> bool {
        let active = host.active_file();
        let outcome = self.log.commit(id, description, active);
        self.scratch.reset();
        match outcome {
            Ok(CommitOutcome::Persisted { id, files, .. }) => {
                self.marked.clear();
                self.notify(&JournalEvent::Committed { id, files });
                true
            }
            Ok(CommitOutcome::NativeOnly { id, file }) => {
                if let Some(doc) = host.document_mut(file) {
                    doc.set_mark(Mark::NativeOnly);
                }
                self.marked.clear();
                self.notify(&JournalEvent::NativeOnly { id, file });
                true
            }
            Ok(CommitOutcome::Empty(_)) => {
                self.marked.clear();
                true
            }
            Ok(CommitOutcome::Failed { id, reason }) => {
                log::warn!("{}", JournalError::CommitFailed { id, reason });
                self.clear_marks(host);
                self.notify(&JournalEvent::RolledBack { id });
                false
            }
            Err(e) => {
                log::debug!("commit_record ignored: {e}");
                self.clear_marks(host);
                false
            }
        }
    }

    /// Discard the record and the marks it placed.
    pub fn rollback_record<H: Host>(&mut self, host: &mut H, id: RecordId) {
        match self.log.rollback(id) {
            Ok(()) => {
                self.clear_marks(host);
                self.scratch.reset();
                self.notify(&JournalEvent::RolledBack { id });
            }
            Err(e) => log::debug!("rollback_record ignored: {e}"),
        }
    }

    fn clear_marks<H: Host>(&mut self, host: &mut H) {
        for file in self.marked.drain(..) {
            if let Some(doc) = host.document_mut(file) {
                doc.set_mark(Mark::None);
            }
        }
    }

    // ─── Undo / redo ─────────────────────────────────────────────────────

    /// Undo in the active document, replaying the journal when the entry
    /// belongs to a multi-file record.
    pub fn undo<H: Host>(&mut self, host: &mut H) -> Result<UndoRedoOutcome, JournalError> {
        self.perform_undo_redo(host, Direction::Undo)
    }

    pub fn redo<H: Host>(&mut self, host: &mut H) -> Result<UndoRedoOutcome, JournalError> {
        self.perform_undo_redo(host, Direction::Redo)
    }

    /// Undo the record at the cursor, regardless of the active document.
    pub fn undo_multi_file<H: Host>(&mut self, host: &mut H) -> Result<UndoRedoOutcome, JournalError> {
        self.perform_multi_file(host, Direction::Undo)
    }

    pub fn redo_multi_file<H: Host>(&mut self, host: &mut H) -> Result<UndoRedoOutcome, JournalError> {
        self.perform_multi_file(host, Direction::Redo)
    }

    pub fn perform_undo_redo<H: Host>(
        &mut self,
        host: &mut H,
        direction: Direction,
    ) -> Result<UndoRedoOutcome, JournalError> {
        let Some(active) = host.active_file() else {
            return Ok(UndoRedoOutcome::Nothing);
        };
        let mark = match host.document_mut(active) {
            Some(doc) => doc.mark(direction),
            None => return Ok(UndoRedoOutcome::Nothing),
        };
        if let Mark::Record(id) = mark {
            return self.replay(host, id, direction);
        }
        // A marked entry keeps the caret where the batch left it.
        let done = host
            .document_mut(active)
            .is_some_and(|doc| native(doc, direction, !mark.is_none()));
        Ok(if done {
            UndoRedoOutcome::Native
        } else {
            UndoRedoOutcome::Nothing
        })
    }

    pub fn perform_multi_file<H: Host>(
        &mut self,
        host: &mut H,
        direction: Direction,
    ) -> Result<UndoRedoOutcome, JournalError> {
        match self.log.next_target(direction) {
            Some(id) => self.replay(host, id, direction),
            None => Ok(UndoRedoOutcome::Nothing),
        }
    }

    fn replay<H: Host>(
        &mut self,
        host: &mut H,
        id: RecordId,
        direction: Direction,
    ) -> Result<UndoRedoOutcome, JournalError> {
        if !self.log.is_replayable(id) {
            log::debug!("Record {id} is not replayable");
            return Ok(UndoRedoOutcome::Nothing);
        }
        let record = self.log.load_record(id)?;

        if self.config.confirm_replay {
            let title = format!("{} in {} files", direction.verb(), record.file_count());
            let message = format!("It was:\n{}", record.description);
            if !host.confirm(&title, &message) {
                return Ok(UndoRedoOutcome::Declined(id));
            }
        }

        log::info!("{} of record {id} across {} files", direction.verb(), record.file_count());
        self.scratch.reset();
        let mut report = ReplayReport::new(id, direction, record.description);
        for delta in &record.deltas {
            replay_file(host, id, direction, delta, &mut self.scratch, &mut report);
        }
        self.scratch.reset();

        if let Some(message) = report.message() {
            log::info!("Record {id}: {} files skipped", report.skipped.len());
            host.report(&message);
        }
        self.log.replayed(id, direction);
        self.notify(&JournalEvent::Replayed {
            id,
            direction,
            applied: report.applied.len(),
            skipped: report.skipped.len(),
        });
        Ok(UndoRedoOutcome::Replayed(report))
    }

    // ─── Listeners ───────────────────────────────────────────────────────

    pub fn add_listener(&mut self, listener: impl FnMut(&JournalEvent) + 'static) -> ListenerId {
        self.next_listener += 1;
        let id = ListenerId(self.next_listener);
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(l, _)| *l != id);
        self.listeners.len() != before
    }

    fn notify(&mut self, event: &JournalEvent) {
        for (_, listener) in self.listeners.iter_mut().rev() {
            listener(event);
        }
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    pub fn edit_log(&self) -> &EditLog {
        &self.log
    }

    pub fn config(&self) -> &JournalConfig {
        &self.config
    }

    pub fn stats(&self) -> Result<JournalStats, JournalError> {
        self.log.stats()
    }
}

fn native<D: Document>(doc: &mut D, direction: Direction, keep_selection: bool) -> bool {
    match direction {
        Direction::Undo => doc.native_undo(keep_selection),
        Direction::Redo => doc.native_redo(keep_selection),
    }
}

/// Bring one file of the record to its target state, or record why not.
fn replay_file<H: Host>(
    host: &mut H,
    id: RecordId,
    direction: Direction,
    delta: &FileDelta,
    scratch: &mut Scratch,
    report: &mut ReplayReport,
) {
    let file = delta.file_id;
    if !host.file_exists(file) {
        log::debug!("File {file} of record {id} is gone");
        return;
    }
    let expected = delta.expected_before(direction);
    let result = match host.document_mut(file) {
        Some(doc) => replay_open(doc, id, direction, delta, expected, scratch).map(|action| {
            let text = doc.text().into_owned();
            (action, Some(text))
        }),
        None => replay_closed(host, direction, delta, expected, scratch).map(|()| (FileAction::Saved, None)),
    };

    match result {
        Ok((action, saved)) => {
            if let Some(text) = saved {
                if !delta.expected_after(direction).matches(&text) {
                    log::warn!("File {file} does not match its recorded digest after {direction} of {id}");
                }
                if let Err(e) = host.save_text(file, &text) {
                    log::error!("Failed to save {file} after {direction} of {id}: {e}");
                }
            }
            report.applied.push((file, action));
        }
        Err(reason) => {
            report.skipped.push(SkippedFile {
                file,
                name: host.display_name(file),
                reason,
            });
        }
    }
}

fn replay_open<D: Document>(
    doc: &mut D,
    id: RecordId,
    direction: Direction,
    delta: &FileDelta,
    expected: ContentHash,
    scratch: &mut Scratch,
) -> Result<FileAction, SkipReason> {
    if doc.mark(direction) == Mark::Record(id) {
        return if native(doc, direction, true) {
            Ok(FileAction::Native)
        } else {
            Err(SkipReason::NothingToReplay)
        };
    }

    let text = doc.text().into_owned();
    if !expected.matches(&text) {
        return Err(SkipReason::Modified);
    }
    delta
        .codec()
        .apply_into(&text, delta.blob(direction), direction, &mut scratch.spans, &mut scratch.text)
        .map_err(|e| SkipReason::Corrupt(e.to_string()))?;

    if !doc.can_undo() && !doc.can_redo() {
        doc.replace_all(&scratch.text);
        doc.empty_undo_buffer();
        return Ok(FileAction::Replaced);
    }

    // One native action from the first span to the last.
    if let (Some(first), Some(last)) = (scratch.spans.first(), scratch.spans.last()) {
        let tail = text.len() - last.end;
        let patched = &scratch.text[first.start..scratch.text.len() - tail];
        doc.replace_range(first.start..last.end, patched);
        // Undoing this action undoes the record.
        if direction == Direction::Redo {
            doc.set_mark(Mark::Record(id));
        }
    }
    Ok(FileAction::Patched)
}

fn replay_closed<H: Host>(
    host: &mut H,
    direction: Direction,
    delta: &FileDelta,
    expected: ContentHash,
    scratch: &mut Scratch,
) -> Result<(), SkipReason> {
    let file = delta.file_id;
    let text = host.load_text(file).map_err(|e| SkipReason::Io(e.to_string()))?;
    if !expected.matches(&text) {
        return Err(SkipReason::Modified);
    }
    delta
        .codec()
        .apply_into(&text, delta.blob(direction), direction, &mut scratch.spans, &mut scratch.text)
        .map_err(|e| SkipReason::Corrupt(e.to_string()))?;
    if !delta.expected_after(direction).matches(&scratch.text) {
        log::warn!("File {file} does not match its recorded digest after {direction}");
    }
    host.save_text(file, &scratch.text)
        .map_err(|e| SkipReason::Io(e.to_string()))
}
