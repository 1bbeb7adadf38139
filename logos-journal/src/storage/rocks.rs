//! RocksDB-backed append-only journal store.
//!
//! Column families:
//! - `records` — record header (description, file count), keyed by id (8 bytes BE)
//! - `files`   — file deltas (bincode + LZ4), keyed by id (8 bytes BE) + ordinal (4 bytes BE)
//! - `invalidated` — ids superseded by a history fork, keyed by id, empty values
//!
//! A record and all of its file rows are written in one `WriteBatch`, so
//! a crash can never expose half a record. With no configured path the
//! store lives in a fresh temp directory that is removed on drop.

use rocksdb::{
    BlockBasedOptions, Cache, ColumnFamilyDescriptor, DBCompressionType, DBWithThreadMode,
    IteratorMode, Options, SingleThreaded, WriteBatch, WriteOptions,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use super::record::{EditRecord, FileDelta, RecordHeader, RecordId};

/// Column family names.
const CF_RECORDS: &str = "records";
const CF_FILES: &str = "files";
const CF_INVALIDATED: &str = "invalidated";

const COLUMN_FAMILIES: &[&str] = &[CF_RECORDS, CF_FILES, CF_INVALIDATED];

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Database directory. `None` = ephemeral store in a temp directory.
    pub path: Option<PathBuf>,
    /// Block cache size in bytes (default: 8MB)
    pub block_cache_size: usize,
    /// fsync on every commit (default: false, the journal is best effort)
    pub sync_writes: bool,
    /// Max open files for RocksDB (default: 64)
    pub max_open_files: i32,
    /// Write buffer size per column family (default: 4MB)
    pub write_buffer_size: usize,
    /// Open an existing store for inspection; every write fails
    pub read_only: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            block_cache_size: 8 * 1024 * 1024,
            sync_writes: false,
            max_open_files: 64,
            write_buffer_size: 4 * 1024 * 1024,
            read_only: false,
        }
    }
}

impl StoreConfig {
    /// Persistent store at `path`.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Config for testing (small caches).
    pub fn for_testing() -> Self {
        Self {
            path: None,
            block_cache_size: 1024 * 1024,
            sync_writes: false,
            max_open_files: 32,
            write_buffer_size: 1024 * 1024,
            read_only: false,
        }
    }
}

/// Storage errors.
#[derive(Debug, Clone)]
pub enum StoreError {
    /// RocksDB internal error
    DatabaseError(String),
    /// Record not found
    NotFound(RecordId),
    /// Serialization failed
    SerializationError(String),
    /// Deserialization failed
    DeserializationError(String),
    /// Compression error
    CompressionError(String),
    /// I/O error
    IoError(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::DatabaseError(e) => write!(f, "Database error: {e}"),
            StoreError::NotFound(id) => write!(f, "Record not found: {id}"),
            StoreError::SerializationError(e) => write!(f, "Serialization error: {e}"),
            StoreError::DeserializationError(e) => write!(f, "Deserialization error: {e}"),
            StoreError::CompressionError(e) => write!(f, "Compression error: {e}"),
            StoreError::IoError(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rocksdb::Error> for StoreError {
    fn from(e: rocksdb::Error) -> Self {
        StoreError::DatabaseError(e.to_string())
    }
}

/// Size figures for the whole store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JournalStats {
    /// Committed records
    pub record_count: u64,
    /// File deltas across all records
    pub file_count: u64,
    /// Compressed bytes of all file rows
    pub stored_bytes: u64,
}

/// Append-only store of committed records.
pub struct JournalStore {
    /// RocksDB instance. Declared before `temp_dir` so it closes first.
    db: DBWithThreadMode<SingleThreaded>,
    config: StoreConfig,
    path: PathBuf,
    /// Owns the directory of an ephemeral store
    temp_dir: Option<TempDir>,
}

impl JournalStore {
    /// Open (or create) the store described by `config`.
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        let (path, temp_dir) = match &config.path {
            Some(path) => (path.clone(), None),
            None => {
                let dir = tempfile::Builder::new()
                    .prefix("logos_journal_")
                    .tempdir()
                    .map_err(|e| StoreError::IoError(e.to_string()))?;
                (dir.path().to_path_buf(), Some(dir))
            }
        };

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_max_open_files(config.max_open_files);
        db_opts.set_keep_log_file_num(2);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Self::cf_options(name, &config)))
            .collect();

        let db = if config.read_only {
            DBWithThreadMode::<SingleThreaded>::open_cf_descriptors_read_only(
                &db_opts,
                &path,
                cf_descriptors,
                false,
            )?
        } else {
            DBWithThreadMode::<SingleThreaded>::open_cf_descriptors(&db_opts, &path, cf_descriptors)?
        };

        Ok(Self {
            db,
            config,
            path,
            temp_dir,
        })
    }

    /// Build column-family-specific options.
    fn cf_options(name: &str, config: &StoreConfig) -> Options {
        let mut opts = Options::default();

        let mut block_opts = BlockBasedOptions::default();
        let cache = Cache::new_lru_cache(config.block_cache_size);
        block_opts.set_block_cache(&cache);
        block_opts.set_block_size(16 * 1024);
        opts.set_block_based_table_factory(&block_opts);
        opts.set_write_buffer_size(config.write_buffer_size);

        match name {
            CF_RECORDS => {
                // Tiny values, point lookups by id
                opts.set_max_write_buffer_number(2);
                opts.optimize_for_point_lookup(config.block_cache_size as u64);
            }
            CF_FILES => {
                // Rows are LZ4-compressed before they get here
                opts.set_max_write_buffer_number(2);
                opts.set_compression_type(DBCompressionType::None);
            }
            _ => {}
        }

        opts
    }

    // ─── Records ──────────────────────────────────────────────────────

    /// Persist a record, all its deltas and the ids its commit invalidated
    /// in one batch.
    pub fn commit_record(
        &self,
        id: RecordId,
        description: &str,
        deltas: &[FileDelta],
        invalidated: &[RecordId],
    ) -> Result<(), StoreError> {
        let cf_records = self.cf(CF_RECORDS)?;
        let cf_files = self.cf(CF_FILES)?;
        let cf_invalidated = self.cf(CF_INVALIDATED)?;

        let header = RecordHeader {
            description: description.to_string(),
            file_count: deltas.len() as u32,
        };

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_records, id.key(), header.encode()?);
        for (ordinal, delta) in deltas.iter().enumerate() {
            batch.put_cf(&cf_files, Self::file_key(id, ordinal as u32), delta.encode()?);
        }
        for stale in invalidated {
            batch.put_cf(&cf_invalidated, stale.key(), b"");
        }

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);
        self.db.write_opt(batch, &write_opts)?;
        Ok(())
    }

    /// Description and file count of a record.
    pub fn load_header(&self, id: RecordId) -> Result<(String, usize), StoreError> {
        let cf = self.cf(CF_RECORDS)?;
        match self.db.get_cf(&cf, id.key())? {
            Some(bytes) => {
                let header = RecordHeader::decode(&bytes)?;
                Ok((header.description, header.file_count as usize))
            }
            None => Err(StoreError::NotFound(id)),
        }
    }

    /// Load a full record with its deltas in capture order.
    pub fn load_record(&self, id: RecordId) -> Result<EditRecord, StoreError> {
        let (description, _) = self.load_header(id)?;
        let deltas = self.load_deltas(id)?;
        Ok(EditRecord {
            id,
            description,
            deltas,
        })
    }

    /// Load the file deltas of a record.
    pub fn load_deltas(&self, id: RecordId) -> Result<Vec<FileDelta>, StoreError> {
        let cf = self.cf(CF_FILES)?;
        let start_key = Self::file_key(id, 0);

        let mut deltas = Vec::new();
        let iter = self.db.iterator_cf(
            &cf,
            IteratorMode::From(&start_key, rocksdb::Direction::Forward),
        );
        for item in iter {
            let (key, value) = item.map_err(|e| StoreError::DatabaseError(e.to_string()))?;
            if key.len() != 12 || key[..8] != id.key() {
                break;
            }
            deltas.push(FileDelta::decode(&value)?);
        }
        Ok(deltas)
    }

    /// All committed record ids in ascending order.
    pub fn list_records(&self) -> Result<Vec<RecordId>, StoreError> {
        self.list_ids(CF_RECORDS)
    }

    /// Ids made unreachable by history forks, ascending.
    pub fn list_invalidated(&self) -> Result<Vec<RecordId>, StoreError> {
        self.list_ids(CF_INVALIDATED)
    }

    fn list_ids(&self, name: &str) -> Result<Vec<RecordId>, StoreError> {
        let cf = self.cf(name)?;
        let mut ids = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (key, _) = item.map_err(|e| StoreError::DatabaseError(e.to_string()))?;
            if let Some(id) = Self::parse_record_key(&key) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    /// Highest committed id, used to resume id allocation on reopen.
    pub fn last_record_id(&self) -> Result<Option<RecordId>, StoreError> {
        let cf = self.cf(CF_RECORDS)?;
        let mut iter = self.db.iterator_cf(&cf, IteratorMode::End);
        match iter.next() {
            Some(item) => {
                let (key, _) = item.map_err(|e| StoreError::DatabaseError(e.to_string()))?;
                Ok(Self::parse_record_key(&key))
            }
            None => Ok(None),
        }
    }

    /// Delete records and their file rows. Returns how many records existed.
    pub fn delete_records(&self, ids: &[RecordId]) -> Result<u64, StoreError> {
        let cf_records = self.cf(CF_RECORDS)?;
        let cf_files = self.cf(CF_FILES)?;

        let mut batch = WriteBatch::default();
        let mut count = 0u64;
        for &id in ids {
            if self.db.get_cf(&cf_records, id.key())?.is_none() {
                continue;
            }
            batch.delete_cf(&cf_records, id.key());
            let start_key = Self::file_key(id, 0);
            let iter = self.db.iterator_cf(
                &cf_files,
                IteratorMode::From(&start_key, rocksdb::Direction::Forward),
            );
            for item in iter {
                let (key, _) = item.map_err(|e| StoreError::DatabaseError(e.to_string()))?;
                if key.len() != 12 || key[..8] != id.key() {
                    break;
                }
                batch.delete_cf(&cf_files, &key);
            }
            count += 1;
        }

        if count > 0 {
            self.db.write(batch)?;
        }
        Ok(count)
    }

    /// Count records, file rows and stored bytes.
    pub fn stats(&self) -> Result<JournalStats, StoreError> {
        let mut stats = JournalStats::default();
        let cf_records = self.cf(CF_RECORDS)?;
        for item in self.db.iterator_cf(&cf_records, IteratorMode::Start) {
            item.map_err(|e| StoreError::DatabaseError(e.to_string()))?;
            stats.record_count += 1;
        }
        let cf_files = self.cf(CF_FILES)?;
        for item in self.db.iterator_cf(&cf_files, IteratorMode::Start) {
            let (_, value) = item.map_err(|e| StoreError::DatabaseError(e.to_string()))?;
            stats.file_count += 1;
            stats.stored_bytes += value.len() as u64;
        }
        Ok(stats)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the store is removed when dropped.
    pub fn is_ephemeral(&self) -> bool {
        self.temp_dir.is_some()
    }

    // ─── Helpers ──────────────────────────────────────────────────────

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily, StoreError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::DatabaseError(format!("Column family '{name}' not found")))
    }

    /// File row key: record id (8 bytes BE) + ordinal (4 bytes BE).
    fn file_key(id: RecordId, ordinal: u32) -> Vec<u8> {
        let mut key = Vec::with_capacity(12);
        key.extend_from_slice(&id.key());
        key.extend_from_slice(&ordinal.to_be_bytes());
        key
    }

    fn parse_record_key(key: &[u8]) -> Option<RecordId> {
        let bytes: [u8; 8] = key.try_into().ok()?;
        Some(RecordId(u64::from_be_bytes(bytes)))
    }
}
