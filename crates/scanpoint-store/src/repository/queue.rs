//! # Queue Repository
//!
//! Durable storage for scans that have not been delivered yet.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  pending.csv                                                            │
//! │                                                                         │
//! │  id,code,timestamp,device_id,retry_count,last_attempt,status,metadata  │
//! │  6f1c…,7891234567895,2025-01-01T08:00:00+00:00,dev-1,0,,pending,{}     │
//! │  9a2e…,ABC123,2025-01-01T08:01:10+00:00,dev-1,2,2025-…,pending,"{…}"   │
//! │                                                                         │
//! │  • last_attempt is empty until the first failed attempt                │
//! │  • metadata is a JSON object string                                    │
//! │  • Synced records are never written; the file is removed when the      │
//! │    queue becomes empty                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Write Paths
//! ```text
//!   capture ──► append()  : O_APPEND, header if new, one row, fsync
//!   pass    ──► rewrite() : write pending.csv.tmp, fsync, rename
//! ```
//!
//! A crash during `append` can leave a torn last line. `load_all` skips it
//! and the next `append` starts on a fresh line, so one bad row never blocks
//! startup or corrupts the rows after it.
//!
//! The header is never trusted for column mapping: rows are read by position
//! and line 1 is skipped only when it is exactly [`QUEUE_HEADER`]. A header
//! torn by a crash during the very first append is dropped like any other
//! unreadable line, and the rows appended after it still load.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use scanpoint_core::time::{format_timestamp, parse_timestamp};
use scanpoint_core::validation::validate_code;
use scanpoint_core::{Metadata, RecordStatus, SyncRecord};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{commit_tmp, ensure_parent, remove_if_exists, tmp_path};
use crate::error::{StoreError, StoreResult};

/// Column order of the queue file.
pub const QUEUE_HEADER: &[&str] = &[
    "id",
    "code",
    "timestamp",
    "device_id",
    "retry_count",
    "last_attempt",
    "status",
    "metadata",
];

/// On-disk row. Field order defines the header written by `csv`.
#[derive(Debug, Serialize, Deserialize)]
struct QueueRow {
    id: String,
    code: String,
    timestamp: String,
    device_id: String,
    retry_count: u32,
    last_attempt: String,
    status: String,
    metadata: String,
}

impl From<&SyncRecord> for QueueRow {
    fn from(record: &SyncRecord) -> Self {
        QueueRow {
            id: record.id.to_string(),
            code: record.code.clone(),
            timestamp: format_timestamp(&record.timestamp),
            device_id: record.device_id.clone(),
            retry_count: record.retry_count,
            last_attempt: record
                .last_attempt
                .as_ref()
                .map(format_timestamp)
                .unwrap_or_default(),
            status: record.status.to_string(),
            metadata: record.metadata.to_json(),
        }
    }
}

impl QueueRow {
    fn into_record(self, row: u64) -> StoreResult<SyncRecord> {
        let id = Uuid::parse_str(self.id.trim())
            .map_err(|e| StoreError::invalid_record(row, format!("id: {}", e)))?;

        let code = validate_code(&self.code)?;

        let timestamp = parse_timestamp("timestamp", &self.timestamp)
            .map_err(|e| StoreError::invalid_record(row, e))?;

        let last_attempt = match self.last_attempt.trim() {
            "" => None,
            raw => Some(
                parse_timestamp("last_attempt", raw)
                    .map_err(|e| StoreError::invalid_record(row, e))?,
            ),
        };

        let status: RecordStatus = self
            .status
            .parse()
            .map_err(|e| StoreError::invalid_record(row, e))?;

        let metadata = Metadata::from_json(&self.metadata)?;

        Ok(SyncRecord {
            id,
            code,
            timestamp,
            device_id: self.device_id,
            retry_count: self.retry_count,
            last_attempt,
            status,
            metadata,
        })
    }
}

/// Repository for the pending queue file.
#[derive(Debug, Clone)]
pub struct QueueRepository {
    path: PathBuf,
}

impl QueueRepository {
    /// Creates a repository over `path`. The file need not exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        QueueRepository { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if the queue file is present.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Durably appends one record.
    ///
    /// ## What This Does
    /// 1. Validates the code and metadata keys
    /// 2. Opens the file in append mode (creating it if needed)
    /// 3. Writes the header when the file is new or empty
    /// 4. Terminates a torn last line, if any
    /// 5. Writes the row, flushes and fsyncs
    ///
    /// Returns only after the row is on disk.
    pub fn append(&self, record: &SyncRecord) -> StoreResult<()> {
        validate_code(&record.code)?;
        record.metadata.validate()?;
        ensure_parent(&self.path)?;

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|e| StoreError::io(&self.path, e))?;

        let len = file
            .metadata()
            .map_err(|e| StoreError::io(&self.path, e))?
            .len();

        if len > 0 && !ends_with_newline(&mut file, len).map_err(|e| StoreError::io(&self.path, e))? {
            warn!(path = %self.path.display(), "Queue file ends mid-row, starting a new line");
            file.write_all(b"\n")
                .map_err(|e| StoreError::io(&self.path, e))?;
        }

        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(len == 0)
                .from_writer(&mut file);
            writer.serialize(QueueRow::from(record))?;
            writer.flush().map_err(|e| StoreError::io(&self.path, e))?;
        }

        file.sync_all().map_err(|e| StoreError::io(&self.path, e))?;

        debug!(id = %record.id, code = %record.code, "Record appended to queue");
        Ok(())
    }

    /// Replaces the whole file with `records`.
    ///
    /// An empty slice removes the file.
    pub fn rewrite(&self, records: &[SyncRecord]) -> StoreResult<()> {
        if records.is_empty() {
            if remove_if_exists(&self.path)? {
                debug!(path = %self.path.display(), "Queue empty, file removed");
            }
            return Ok(());
        }

        let tmp = tmp_path(&self.path);
        write_records(&tmp, records)?;
        commit_tmp(&tmp, &self.path)?;

        debug!(count = records.len(), "Queue rewritten");
        Ok(())
    }

    /// Loads every readable record in file order.
    ///
    /// A missing file is an empty queue. Rows that fail to parse are logged
    /// and skipped, including a torn header.
    pub fn load_all(&self) -> StoreResult<Vec<SyncRecord>> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(file);

        let mut records = Vec::new();
        let mut skipped = 0usize;

        for (index, row) in reader.records().enumerate() {
            let line = index as u64 + 1;

            let row = match row {
                Ok(row) => row,
                Err(e) if e.is_io_error() => return Err(StoreError::Csv(e)),
                Err(e) => {
                    skipped += 1;
                    warn!(path = %self.path.display(), line, error = %e, "Skipping unreadable queue row");
                    continue;
                }
            };

            if index == 0 && is_header(&row) {
                continue;
            }

            let parsed = row
                .deserialize::<QueueRow>(None)
                .map_err(|e| StoreError::invalid_record(line, e))
                .and_then(|row| row.into_record(line));

            match parsed {
                Ok(record) => records.push(record),
                Err(e) => {
                    skipped += 1;
                    warn!(path = %self.path.display(), error = %e, "Skipping unreadable queue row");
                }
            }
        }

        debug!(loaded = records.len(), skipped, "Queue loaded");
        Ok(records)
    }

    /// Writes `records` in the queue format to an arbitrary path.
    pub fn export_to(&self, records: &[SyncRecord], destination: &Path) -> StoreResult<usize> {
        let tmp = tmp_path(destination);
        write_records(&tmp, records)?;
        commit_tmp(&tmp, destination)?;
        Ok(records.len())
    }
}

fn is_header(row: &csv::StringRecord) -> bool {
    row.iter().map(str::trim).eq(QUEUE_HEADER.iter().copied())
}

fn ends_with_newline(file: &mut File, len: u64) -> std::io::Result<bool> {
    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

fn write_records(path: &Path, records: &[SyncRecord]) -> StoreResult<()> {
    ensure_parent(path)?;

    let mut file = File::create(path).map_err(|e| StoreError::io(path, e))?;
    {
        let mut writer = csv::Writer::from_writer(&mut file);
        if records.is_empty() {
            writer.write_record(QUEUE_HEADER)?;
        }
        for record in records {
            record.metadata.validate()?;
            writer.serialize(QueueRow::from(record))?;
        }
        writer.flush().map_err(|e| StoreError::io(path, e))?;
    }
    file.sync_all().map_err(|e| StoreError::io(path, e))?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
