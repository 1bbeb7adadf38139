//! # logos-journal — Multi-file undo journal for Logos
//!
//! Records batch edits that touch many files ("replace X with Y in the
//! whole project") so they can be undone and redone as one operation,
//! while every open document keeps its own native undo stack.
//!
//! ## Architecture
//!
//! ```text
//!  host editor                          logos-journal
//! ┌──────────────┐  begin/add/commit  ┌───────────────────────┐
//! │ Documents    │ ─────────────────► │ UndoRedoCoordinator   │
//! │ (native undo │ ◄───────────────── │  ├─ UndoMarks (marks) │
//! │  + marks)    │  undo/redo replay  │  └─ EditLog           │
//! └──────────────┘                    │      ├─ CaptureBuffer │
//!                                     │      └─ JournalStore  │
//!                                     │          (RocksDB)    │
//!                                     └───────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`hash`] — content digests for conflict detection
//! - [`span`] — change spans and one-pass application
//! - [`codec`] — compact undo/redo blobs with shared find/replace text
//! - [`storage`] — records, capture buffer and the RocksDB store
//! - [`edit_log`] — id allocation, cursor and history forks
//! - [`marks`] — native undo entry tags
//! - [`coordinator`] — undo/redo routing and replay
//! - [`memory`] — in-memory host

pub mod codec;
pub mod coordinator;
pub mod edit_log;
pub mod error;
pub mod hash;
pub mod host;
pub mod marks;
pub mod memory;
pub mod span;
pub mod storage;

// Re-exports for convenience
pub use codec::{DeltaCodec, SharedText};
pub use coordinator::{
    FileAction, JournalConfig, JournalEvent, ListenerId, ReplayReport, Scratch, SkipReason,
    SkippedFile, UndoRedoCoordinator, UndoRedoOutcome,
};
pub use edit_log::{CommitOutcome, EditLog};
pub use error::{CodecError, JournalError};
pub use hash::ContentHash;
pub use host::{Direction, Document, Host};
pub use marks::{Mark, UndoMarks};
pub use memory::{MemoryDocument, MemoryHost};
pub use span::ChangeSpan;
pub use storage::{
    EditRecord, FileDelta, FileId, JournalStats, JournalStore, RecordId, StoreConfig, StoreError,
};
