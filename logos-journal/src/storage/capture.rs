//! Capture buffer for the record currently being built.
//!
//! ```text
//! begin ──► [ delta | delta | delta ] ──► commit: one WriteBatch
//!                                    └──► rollback: dropped
//! ```
//!
//! Nothing reaches the store before commit, so a record is either fully
//! visible or not at all.

use super::record::{FileDelta, FileId, RecordId};

/// Deltas staged for one open record.
#[derive(Debug, Default)]
pub struct CaptureBuffer {
    /// Open record, if any
    record: Option<RecordId>,
    /// Staged deltas in capture order
    entries: Vec<FileDelta>,
    /// Sum of blob sizes of staged deltas
    buffered_bytes: usize,
    /// File of the most recently staged delta
    last_file: Option<FileId>,
    /// Set when a capture step failed; the record can only be rolled back
    poisoned: bool,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start capturing `record`, dropping anything left over.
    pub fn open(&mut self, record: RecordId) {
        self.reset();
        self.record = Some(record);
    }

    /// Append a delta to the open record.
    pub fn stage(&mut self, delta: FileDelta) {
        self.buffered_bytes += delta.blob_bytes();
        self.last_file = Some(delta.file_id);
        self.entries.push(delta);
    }

    pub fn poison(&mut self) {
        self.poisoned = true;
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Close the record and hand back its staged deltas.
    pub fn take(&mut self) -> Vec<FileDelta> {
        let entries = std::mem::take(&mut self.entries);
        self.reset();
        entries
    }

    /// Close the record, dropping its deltas.
    pub fn discard(&mut self) -> usize {
        let dropped = self.entries.len();
        self.reset();
        dropped
    }

    fn reset(&mut self) {
        self.record = None;
        self.entries.clear();
        self.buffered_bytes = 0;
        self.last_file = None;
        self.poisoned = false;
    }

    pub fn record(&self) -> Option<RecordId> {
        self.record
    }

    pub fn is_open(&self) -> bool {
        self.record.is_some()
    }

    pub fn file_count(&self) -> usize {
        self.entries.len()
    }

    pub fn last_file(&self) -> Option<FileId> {
        self.last_file
    }

    pub fn buffered_bytes(&self) -> usize {
        self.buffered_bytes
    }

    pub fn entries(&self) -> &[FileDelta] {
        &self.entries
    }
}
