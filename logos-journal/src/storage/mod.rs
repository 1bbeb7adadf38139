//! Persistent storage for the edit journal.
//!
//! Architecture:
//! ```text
//! ┌─────────────┐  stage   ┌───────────────┐  commit   ┌──────────────┐
//! │   EditLog   │ ───────► │ CaptureBuffer │ ────────► │ JournalStore │
//! │ (begin/add) │          │ (open record) │ WriteBatch│  (RocksDB)   │
//! └─────────────┘          └───────────────┘           └──────┬───────┘
//!                                                             │
//!                                  ┌──────────────────────────┴──────┐
//!                                  │ CF "records" — description, count│
//!                                  │ CF "files"   — FileDelta rows    │
//!                                  └─────────────────────────────────┘
//! ```

pub mod capture;
pub mod record;
pub mod rocks;

pub use capture::CaptureBuffer;
pub use record::{EditRecord, FileDelta, FileId, RecordId};
pub use rocks::{JournalStats, JournalStore, StoreConfig, StoreError};
