//! Append-only log of multi-file records with a linear undo cursor.
//!
//! ```text
//! committed:  1   2   3   4
//! cursor:             ▲        (last applied, not yet undone)
//! invalidated: ids skipped by redo after history forked
//! ```
//!
//! Committing after an undo forks history: every id between the cursor
//! and the new record becomes unreachable forever.

use std::collections::BTreeSet;

use crate::codec::DeltaCodec;
use crate::error::JournalError;
use crate::hash::ContentHash;
use crate::host::Direction;
use crate::span::{self, ChangeSpan};
use crate::storage::{
    CaptureBuffer, EditRecord, FileDelta, FileId, JournalStats, JournalStore, RecordId, StoreConfig,
};

/// What a commit did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Written to the store; the cursor now points at `id`.
    Persisted {
        id: RecordId,
        files: usize,
        invalidated: Vec<RecordId>,
    },
    /// Only the active document was touched; nothing was journaled and
    /// the document's native undo covers the operation.
    NativeOnly { id: RecordId, file: FileId },
    /// No file was added; the id is retired.
    Empty(RecordId),
    /// Capture or storage failed; the record was rolled back.
    Failed { id: RecordId, reason: String },
}

impl CommitOutcome {
    pub fn id(&self) -> RecordId {
        match self {
            CommitOutcome::Persisted { id, .. }
            | CommitOutcome::NativeOnly { id, .. }
            | CommitOutcome::Empty(id)
            | CommitOutcome::Failed { id, .. } => *id,
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, CommitOutcome::Failed { .. })
    }
}

pub struct EditLog {
    /// `None` when the store could not be opened; the log is then inert
    store: Option<JournalStore>,
    capture: CaptureBuffer,
    /// Last allocated id, committed or not
    last_id: u64,
    /// Id of the most recently applied record, 0 before the first
    cursor: u64,
    committed: BTreeSet<RecordId>,
    invalidated: BTreeSet<RecordId>,
    /// Delete superseded records from the store after a fork
    prune_invalidated: bool,
}

impl EditLog {
    /// Open the backing store. A failure disables the log for the session.
    pub fn open(config: StoreConfig, prune_invalidated: bool) -> Self {
        match JournalStore::open(config) {
            Ok(store) => Self::with_store(store, prune_invalidated),
            Err(e) => {
                log::warn!("Edit journal disabled, store failed to open: {e}");
                Self::disabled()
            }
        }
    }

    /// Log without storage: every capture call reports `StorageUnavailable`.
    pub fn disabled() -> Self {
        Self {
            store: None,
            capture: CaptureBuffer::new(),
            last_id: 0,
            cursor: 0,
            committed: BTreeSet::new(),
            invalidated: BTreeSet::new(),
            prune_invalidated: false,
        }
    }

    /// Use an opened store, resuming after the records it already holds.
    ///
    /// Ids a fork invalidated in an earlier session stay invalid.
    pub fn with_store(store: JournalStore, prune_invalidated: bool) -> Self {
        let invalidated: BTreeSet<RecordId> = match store.list_invalidated() {
            Ok(ids) => ids.into_iter().collect(),
            Err(e) => {
                log::warn!("Could not read invalidated journal ids: {e}");
                BTreeSet::new()
            }
        };
        let mut committed: BTreeSet<RecordId> = match store.list_records() {
            Ok(ids) => ids.into_iter().collect(),
            Err(e) => {
                log::warn!("Could not read existing journal records: {e}");
                BTreeSet::new()
            }
        };
        committed.retain(|id| !invalidated.contains(id));

        let last_stored = match store.last_record_id() {
            Ok(id) => id.map_or(0, RecordId::get),
            Err(e) => {
                log::warn!("Could not read the last journal id: {e}");
                0
            }
        };
        let last_id = last_stored.max(invalidated.last().map_or(0, |id| id.get()));
        let cursor = committed.last().map_or(0, |id| id.get());
        if last_id > 0 {
            log::info!("Resuming edit journal after record #{last_id}");
        }
        Self {
            store: Some(store),
            capture: CaptureBuffer::new(),
            last_id,
            cursor,
            committed,
            invalidated,
            prune_invalidated,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    // ─── Capture ──────────────────────────────────────────────────────

    /// Allocate the next id and open its capture buffer.
    ///
    /// A record still open from an unpaired `begin` is rolled back first.
    pub fn begin(&mut self) -> Result<RecordId, JournalError> {
        if self.store.is_none() {
            return Err(JournalError::StorageUnavailable);
        }
        if let Some(stale) = self.capture.record() {
            log::warn!("Record {stale} was never committed, rolling it back");
            self.capture.discard();
        }
        self.last_id += 1;
        let id = RecordId(self.last_id);
        self.capture.open(id);
        Ok(id)
    }

    /// Build and stage the delta of one file.
    ///
    /// Returns `Ok(false)` when `spans` is empty. Any error poisons the
    /// open record so that its commit rolls back.
    pub fn add_file_delta(
        &mut self,
        id: RecordId,
        file: FileId,
        old_text: &str,
        new_text: &str,
        spans: &[ChangeSpan],
        blob_buf: &mut Vec<u8>,
    ) -> Result<bool, JournalError> {
        self.check_open(id)?;
        match Self::build_delta(id, file, old_text, new_text, spans, blob_buf) {
            Ok(Some(delta)) => {
                self.capture.stage(delta);
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(e) => {
                self.capture.poison();
                Err(e)
            }
        }
    }

    fn build_delta(
        id: RecordId,
        file: FileId,
        old_text: &str,
        new_text: &str,
        spans: &[ChangeSpan],
        blob_buf: &mut Vec<u8>,
    ) -> Result<Option<FileDelta>, JournalError> {
        if spans.is_empty() {
            return Ok(None);
        }
        span::validate(old_text, spans)?;

        let codec = DeltaCodec::for_spans(old_text, spans);
        codec.encode_undo(old_text, spans, blob_buf)?;
        let undo = blob_buf.clone();
        codec.encode_redo(spans, blob_buf)?;
        let redo = blob_buf.clone();

        Ok(Some(FileDelta {
            record_id: id,
            file_id: file,
            hash_before: ContentHash::of(old_text),
            hash_after: ContentHash::of(new_text),
            undo,
            redo,
            shared: codec.into_shared(),
        }))
    }

    /// Close the open record.
    ///
    /// `active` is the file in the active editor; a record that touched
    /// only that file is not journaled.
    pub fn commit(
        &mut self,
        id: RecordId,
        description: &str,
        active: Option<FileId>,
    ) -> Result<CommitOutcome, JournalError> {
        self.check_open(id)?;

        if self.capture.is_poisoned() {
            self.capture.discard();
            log::debug!("Record {id} rolled back after a failed capture");
            return Ok(CommitOutcome::Failed {
                id,
                reason: "a file could not be captured".to_string(),
            });
        }

        if let Some(file) = active.filter(|_| self.capture.file_count() == 1) {
            if self.capture.last_file() == Some(file) {
                self.capture.discard();
                log::debug!("Record {id} touched only the active document, left to native undo");
                return Ok(CommitOutcome::NativeOnly { id, file });
            }
        }

        if self.capture.file_count() == 0 {
            self.capture.discard();
            return Ok(CommitOutcome::Empty(id));
        }

        let deltas = self.capture.take();
        let Some(store) = self.store.as_ref() else {
            return Err(JournalError::StorageUnavailable);
        };
        // Everything between the cursor and this record was undone and is
        // now unreachable.
        let invalidated: Vec<RecordId> = (self.cursor + 1..id.get()).map(RecordId).collect();
        if let Err(e) = store.commit_record(id, description, &deltas, &invalidated) {
            log::error!("Failed to persist record {id}: {e}");
            return Ok(CommitOutcome::Failed {
                id,
                reason: e.to_string(),
            });
        }

        if !invalidated.is_empty() {
            log::debug!("History forked at #{}, invalidating {} ids", self.cursor, invalidated.len());
            self.invalidated.extend(invalidated.iter().copied());
            self.prune(&invalidated);
        }

        self.committed.insert(id);
        self.cursor = id.get();
        log::debug!("Committed record {id} ({} files): {description}", deltas.len());
        Ok(CommitOutcome::Persisted {
            id,
            files: deltas.len(),
            invalidated,
        })
    }

    /// Drop the open record. Its id is never used again.
    pub fn rollback(&mut self, id: RecordId) -> Result<(), JournalError> {
        self.check_open(id)?;
        let dropped = self.capture.discard();
        log::debug!("Rolled back record {id} ({dropped} staged files)");
        Ok(())
    }

    fn check_open(&self, id: RecordId) -> Result<(), JournalError> {
        if self.store.is_none() {
            return Err(JournalError::StorageUnavailable);
        }
        match self.capture.record() {
            None => Err(JournalError::NoOpenRecord),
            Some(open) if open != id => Err(JournalError::RecordMismatch { expected: open, got: id }),
            Some(_) => Ok(()),
        }
    }

    fn prune(&mut self, ids: &[RecordId]) {
        let stale: Vec<RecordId> = ids.iter().copied().filter(|id| self.committed.remove(id)).collect();
        if !self.prune_invalidated || stale.is_empty() {
            return;
        }
        if let Some(store) = &self.store {
            match store.delete_records(&stale) {
                Ok(n) => log::debug!("Pruned {n} superseded records"),
                Err(e) => log::warn!("Failed to prune superseded records: {e}"),
            }
        }
    }

    // ─── Navigation ───────────────────────────────────────────────────

    /// Record a cursor-driven undo/redo would replay next.
    pub fn next_target(&self, direction: Direction) -> Option<RecordId> {
        let cursor = RecordId(self.cursor);
        let valid = |id: &&RecordId| !self.invalidated.contains(*id);
        match direction {
            Direction::Undo => self.committed.range(..=cursor).rev().find(valid).copied(),
            Direction::Redo => self.committed.range(RecordId(self.cursor + 1)..).find(valid).copied(),
        }
    }

    /// Move the cursor after `id` was replayed in `direction`.
    pub fn replayed(&mut self, id: RecordId, direction: Direction) {
        self.cursor = match direction {
            Direction::Redo => id.get(),
            Direction::Undo => id.get() - 1,
        };
    }

    /// Whether `id` can be replayed.
    pub fn is_replayable(&self, id: RecordId) -> bool {
        self.committed.contains(&id) && !self.invalidated.contains(&id)
    }

    /// Load a replayable record.
    pub fn load_record(&self, id: RecordId) -> Result<EditRecord, JournalError> {
        let store = self.store.as_ref().ok_or(JournalError::StorageUnavailable)?;
        if !self.is_replayable(id) {
            return Err(JournalError::RecordNotFound(id));
        }
        Ok(store.load_record(id)?)
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn last_id(&self) -> u64 {
        self.last_id
    }

    pub fn is_invalidated(&self, id: RecordId) -> bool {
        self.invalidated.contains(&id)
    }

    pub fn invalidated(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.invalidated.iter().copied()
    }

    pub fn open_record(&self) -> Option<RecordId> {
        self.capture.record()
    }

    pub fn capture(&self) -> &CaptureBuffer {
        &self.capture
    }

    pub fn store(&self) -> Option<&JournalStore> {
        self.store.as_ref()
    }

    pub fn stats(&self) -> Result<JournalStats, JournalError> {
        let store = self.store.as_ref().ok_or(JournalError::StorageUnavailable)?;
        Ok(store.stats()?)
    }
}
