//! Append-only log implementation of [`MetaKv`].
//!
//! Every mutation appends one frame:
//!
//! ```text
//! [u32 payload length, LE][op: u8][key: varint-prefixed][value: varint-prefixed][crc32, LE]
//! ```
//!
//! The payload (everything after the length) is produced by a
//! [`StructWriter`], so the CRC covers the operation, key and value. Opening
//! replays the log into an in-memory map. A frame cut short by a crash at the
//! end of the log is truncated away. A bad checksum before the last frame, or
//! a length header that runs past whole frames, means the log is damaged and
//! opening fails without touching the file.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SundialError};
use crate::meta::kv::{MetaKv, scan_btree};
use crate::storage::structured::{StructReader, StructWriter};

const OP_SET: u8 = 1;
const OP_DELETE: u8 = 2;
const FRAME_HEADER_LEN: usize = 4;

/// Configuration for [`FileMetaKv`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMetaKvConfig {
    /// Log file location. Parent directories are created on open.
    pub path: PathBuf,

    /// Whether to fsync after every appended frame.
    #[serde(default)]
    pub sync_writes: bool,
}

impl FileMetaKvConfig {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        FileMetaKvConfig {
            path: path.into(),
            sync_writes: false,
        }
    }

    pub fn sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }
}

#[derive(Debug)]
enum Record {
    Set(String, Vec<u8>),
    Delete(String),
}

impl Record {
    fn encode(&self) -> Vec<u8> {
        let mut writer = StructWriter::new();
        match self {
            Record::Set(key, value) => {
                writer.write_u8(OP_SET);
                writer.write_string(key);
                writer.write_bytes(value);
            }
            Record::Delete(key) => {
                writer.write_u8(OP_DELETE);
                writer.write_string(key);
                writer.write_bytes(&[]);
            }
        }
        let payload = writer.finish();

        let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(&payload);
        frame
    }

    fn decode(payload: &[u8]) -> Result<Record> {
        let mut reader = StructReader::new(payload)?;
        reader.verify()?;
        let op = reader.read_u8()?;
        let key = reader.read_string()?;
        let value = reader.read_bytes()?;
        match op {
            OP_SET => Ok(Record::Set(key, value)),
            OP_DELETE => Ok(Record::Delete(key)),
            other => Err(SundialError::corrupted(format!("unknown log op {other}"))),
        }
    }

    /// Apply to `entries`, returning whether the key was present before.
    fn apply(self, entries: &mut BTreeMap<String, Vec<u8>>) -> bool {
        match self {
            Record::Set(key, value) => entries.insert(key, value).is_some(),
            Record::Delete(key) => entries.remove(&key).is_some(),
        }
    }
}

/// Outcome of replaying a log image.
struct Replay {
    entries: BTreeMap<String, Vec<u8>>,
    records: usize,
    valid_len: usize,
}

fn replay(data: &[u8]) -> Result<Replay> {
    let mut entries = BTreeMap::new();
    let mut records = 0;
    let mut offset = 0;

    while offset < data.len() {
        let rest = &data[offset..];
        if rest.len() < FRAME_HEADER_LEN {
            break;
        }
        let len = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
        let frame_end = FRAME_HEADER_LEN + len;
        if rest.len() < frame_end {
            // A torn write leaves a prefix of one frame. Whole frames behind
            // the overshoot mean the length header itself is damaged.
            if let Some(next) = find_complete_frame(&rest[1..]) {
                return Err(SundialError::corrupted(format!(
                    "metadata log frame at offset {offset} claims {len} bytes \
                     but a valid frame starts at offset {}",
                    offset + 1 + next
                )));
            }
            break;
        }

        match Record::decode(&rest[FRAME_HEADER_LEN..frame_end]) {
            Ok(record) => {
                record.apply(&mut entries);
            }
            // A damaged final frame is a torn write.
            Err(_) if offset + frame_end == data.len() => break,
            Err(e) => {
                return Err(SundialError::corrupted(format!(
                    "metadata log record at offset {offset}: {e}"
                )));
            }
        }
        records += 1;
        offset += frame_end;
    }

    Ok(Replay {
        entries,
        records,
        valid_len: offset,
    })
}

/// Offset of the first position in `data` holding a whole frame with a
/// valid checksum.
fn find_complete_frame(data: &[u8]) -> Option<usize> {
    (0..data.len().saturating_sub(FRAME_HEADER_LEN)).find(|&start| {
        let rest = &data[start..];
        let len = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
        rest.len() - FRAME_HEADER_LEN >= len
            && Record::decode(&rest[FRAME_HEADER_LEN..FRAME_HEADER_LEN + len]).is_ok()
    })
}

/// A [`MetaKv`] persisted as a replayed append-only log.
#[derive(Debug)]
pub struct FileMetaKv {
    path: PathBuf,
    sync_writes: bool,
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
    // `None` once closed.
    log: Mutex<Option<File>>,
    records: Mutex<usize>,
    closed: AtomicBool,
}

impl FileMetaKv {
    /// Open the log at `config.path`, creating it if absent, and replay it.
    pub fn open(config: FileMetaKvConfig) -> Result<Self> {
        let path = config.path;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)
            .map_err(|e| {
                SundialError::storage(format!("failed to open {}: {e}", path.display()))
            })?;

        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        let replay = replay(&data)?;

        if replay.valid_len < data.len() {
            warn!(
                "truncating {} torn bytes at the end of {}",
                data.len() - replay.valid_len,
                path.display()
            );
            file.set_len(replay.valid_len as u64)?;
            file.sync_all()?;
        }

        info!(
            "opened metadata log {} ({} records, {} live keys)",
            path.display(),
            replay.records,
            replay.entries.len()
        );

        Ok(FileMetaKv {
            path,
            sync_writes: config.sync_writes,
            entries: RwLock::new(replay.entries),
            log: Mutex::new(Some(file)),
            records: Mutex::new(replay.records),
            closed: AtomicBool::new(false),
        })
    }

    /// Log file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Frames currently in the log, including superseded ones.
    pub fn record_count(&self) -> usize {
        *self.records.lock()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Rewrite the log so it holds one frame per live key.
    pub fn compact(&self) -> Result<()> {
        let mut log = self.log.lock();
        if log.is_none() {
            return Err(SundialError::StoreClosed);
        }

        let entries = self.entries.read();
        let file_name = self
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("meta.log");
        let temp = self
            .path
            .with_file_name(format!(".{file_name}.compact-{}", uuid::Uuid::new_v4()));

        let rewrite = || -> std::io::Result<()> {
            let mut file = OpenOptions::new().write(true).create_new(true).open(&temp)?;
            for (key, value) in entries.iter() {
                file.write_all(&Record::Set(key.clone(), value.clone()).encode())?;
            }
            file.sync_all()?;
            fs::rename(&temp, &self.path)
        };
        if let Err(e) = rewrite() {
            let _ = fs::remove_file(&temp);
            return Err(SundialError::storage(format!(
                "failed to compact {}: {e}",
                self.path.display()
            )));
        }

        *log = Some(OpenOptions::new().append(true).open(&self.path)?);
        let before = std::mem::replace(&mut *self.records.lock(), entries.len());
        info!(
            "compacted {} from {before} to {} records",
            self.path.display(),
            entries.len()
        );
        Ok(())
    }

    /// Log `record` and apply it to the live set under the log lock.
    fn append(&self, record: Record) -> Result<bool> {
        let mut log = self.log.lock();
        let file = log.as_mut().ok_or(SundialError::StoreClosed)?;
        if let Record::Delete(key) = &record {
            if !self.entries.read().contains_key(key) {
                return Ok(false);
            }
        }

        file.write_all(&record.encode()).map_err(|e| {
            SundialError::storage(format!("failed to append to {}: {e}", self.path.display()))
        })?;
        if self.sync_writes {
            file.sync_data()?;
        }
        *self.records.lock() += 1;
        Ok(record.apply(&mut self.entries.write()))
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(SundialError::StoreClosed)
        } else {
            Ok(())
        }
    }
}

impl MetaKv for FileMetaKv {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.check_open()?;
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.check_open()?;
        self.append(Record::Set(key.to_string(), value.to_vec()))?;
        debug!("set {key} ({} bytes)", value.len());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        self.check_open()?;
        self.append(Record::Delete(key.to_string()))
    }

    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        self.check_open()?;
        Ok(scan_btree(&self.entries.read(), prefix))
    }

    fn sync(&self) -> Result<()> {
        let log = self.log.lock();
        match log.as_ref() {
            Some(file) => Ok(file.sync_all()?),
            None => Err(SundialError::StoreClosed),
        }
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        if let Some(file) = self.log.lock().take() {
            file.sync_all()?;
            debug!("closed metadata log {}", self.path.display());
        }
        Ok(())
    }
}
