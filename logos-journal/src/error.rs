//! Error types for the edit journal.
//!
//! Storage-level failures stay in [`StoreError`](crate::storage::StoreError);
//! everything the host can observe is folded into [`JournalError`].

use thiserror::Error;

use crate::storage::{RecordId, StoreError};

/// Errors produced while encoding, decoding or applying change spans.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Invalid span {start}..{end} (text length {len}): {reason}")]
    InvalidSpan {
        start: usize,
        end: usize,
        len: usize,
        reason: &'static str,
    },
    #[error("Varint error: {0}")]
    Varint(String),
    #[error("Blob truncated: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },
    #[error("Blob contains invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

/// Errors surfaced by the journal to the host.
///
/// None of these are fatal for the host application. Most are logged and
/// turned into a no-op by the coordinator.
#[derive(Error, Debug)]
pub enum JournalError {
    #[error("Journal storage is unavailable")]
    StorageUnavailable,
    #[error("No record is open")]
    NoOpenRecord,
    #[error("Record {got} is not the open record {expected}")]
    RecordMismatch { expected: RecordId, got: RecordId },
    #[error("Record not found: {0}")]
    RecordNotFound(RecordId),
    #[error("Commit of record {id} failed: {reason}")]
    CommitFailed { id: RecordId, reason: String },
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}
