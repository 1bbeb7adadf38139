//! Journal records and the per-file deltas they own.
//!
//! A record is one logical batch operation ("replace X with Y in 40
//! files"). Each touched file contributes one [`FileDelta`]: the digests
//! of its text before and after, plus the undo/redo blobs built by
//! [`DeltaCodec`](crate::codec::DeltaCodec). Full texts are never stored.
//!
//! Rows are bincode-encoded and LZ4-compressed before they reach RocksDB.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::rocks::StoreError;
use crate::codec::{DeltaCodec, SharedText};
use crate::hash::ContentHash;
use crate::host::Direction;

/// Journal record id. Allocated sequentially from 1, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub u64);

impl RecordId {
    pub fn get(self) -> u64 {
        self.0
    }

    /// Big-endian key so RocksDB iterates records in id order.
    pub(crate) fn key(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Host-assigned file identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileId(pub Uuid);

impl FileId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One file's contribution to a record. Immutable once committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDelta {
    pub record_id: RecordId,
    pub file_id: FileId,
    pub hash_before: ContentHash,
    pub hash_after: ContentHash,
    pub undo: Vec<u8>,
    pub redo: Vec<u8>,
    pub shared: SharedText,
}

impl FileDelta {
    /// Digest the file must have for a replay in `direction` to apply.
    pub fn expected_before(&self, direction: Direction) -> ContentHash {
        match direction {
            Direction::Undo => self.hash_after,
            Direction::Redo => self.hash_before,
        }
    }

    /// Digest the file should have after a replay in `direction`.
    pub fn expected_after(&self, direction: Direction) -> ContentHash {
        match direction {
            Direction::Undo => self.hash_before,
            Direction::Redo => self.hash_after,
        }
    }

    pub fn blob(&self, direction: Direction) -> &[u8] {
        match direction {
            Direction::Undo => &self.undo,
            Direction::Redo => &self.redo,
        }
    }

    pub fn codec(&self) -> DeltaCodec {
        DeltaCodec::new(self.shared.clone())
    }

    /// Encoded size of both blobs.
    pub fn blob_bytes(&self) -> usize {
        self.undo.len() + self.redo.len()
    }

    /// Serialize and LZ4-compress for storage.
    pub(crate) fn encode(&self) -> Result<Vec<u8>, StoreError> {
        let raw = bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;
        Ok(lz4_flex::compress_prepend_size(&raw))
    }

    pub(crate) fn decode(bytes: &[u8]) -> Result<Self, StoreError> {
        let raw = lz4_flex::decompress_size_prepended(bytes)
            .map_err(|e| StoreError::CompressionError(e.to_string()))?;
        let (delta, _) = bincode::serde::decode_from_slice(&raw, bincode::config::standard())
            .map_err(|e| StoreError::DeserializationError(e.to_string()))?;
        Ok(delta)
    }
}

/// Stored header of a committed record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct RecordHeader {
    pub description: String,
    pub file_count: u32,
}

impl RecordHeader {
    pub(crate) fn encode(&self) -> Result<Vec<u8>, StoreError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| StoreError::SerializationError(e.to_string()))
    }

    pub(crate) fn decode(bytes: &[u8]) -> Result<Self, StoreError> {
        let (header, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| StoreError::DeserializationError(e.to_string()))?;
        Ok(header)
    }
}

/// A committed batch operation with all its file deltas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRecord {
    pub id: RecordId,
    pub description: String,
    pub deltas: Vec<FileDelta>,
}

impl EditRecord {
    pub fn file_count(&self) -> usize {
        self.deltas.len()
    }
}
