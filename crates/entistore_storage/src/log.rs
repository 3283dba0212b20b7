//! Append-only log storage adapter.
//!
//! Every applied change set becomes one framed batch record appended to a
//! single data file. An in-memory index maps each live reference to the
//! location of its latest bytes. Overwritten and removed entries stay in
//! the file until [`LogMapStore::compact`] rewrites it.
//!
//! ## File format
//!
//! ```text
//! header:  magic "ESLOG\0" (6) | format version u16 LE (2)
//! record:  body_len u32 LE | crc32(body) u32 LE | body
//! body:    count u32 LE | entry*
//! entry:   kind u8 | ref_len u32 LE | ref bytes | [data_len u32 LE | data]
//! ```
//!
//! A record whose length or checksum does not match ends the log: it is
//! the tail of a batch that was torn by a crash and is truncated on open.

use crate::adapter::{
    ChangeBuffer, ChangeKind, CommitLock, EntityScan, MapChanges, StorageAdapter,
};
use crate::error::{StorageError, StorageResult};
use crate::reference::EntityReference;
use fs2::FileExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const MAGIC: &[u8; 6] = b"ESLOG\0";
const FORMAT_VERSION: u16 = 1;
const HEADER_SIZE: u64 = 8;
const FRAME_HEADER_SIZE: u64 = 8;
const KIND_PUT: u8 = 1;
const KIND_REMOVE: u8 = 2;
const COMPACTION_BATCH: usize = 1024;

/// Configuration for a [`LogMapStore`].
#[derive(Debug, Clone)]
pub struct LogStoreConfig {
    /// Whether to create the data file if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to sync the file to disk after every change set.
    pub sync_on_commit: bool,

    /// Fraction of dead records that triggers automatic compaction
    /// (0.0 = never compact automatically).
    pub compaction_ratio: f64,

    /// Minimum number of written records before automatic compaction
    /// is considered.
    pub min_compaction_records: usize,
}

impl Default for LogStoreConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_commit: true,
            compaction_ratio: 0.5,
            min_compaction_records: 1024,
        }
    }
}

impl LogStoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the data file if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to sync on every change set.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets the dead-record ratio that triggers compaction.
    #[must_use]
    pub const fn compaction_ratio(mut self, ratio: f64) -> Self {
        self.compaction_ratio = ratio;
        self
    }

    /// Sets the minimum record count for automatic compaction.
    #[must_use]
    pub const fn min_compaction_records(mut self, count: usize) -> Self {
        self.min_compaction_records = count;
        self
    }
}

/// Counters describing a log store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogStoreStats {
    /// Number of live entities.
    pub live_entities: usize,
    /// Number of entries written since the last compaction.
    pub written_records: usize,
    /// Size of the data file in bytes.
    pub file_size: u64,
}

impl LogStoreStats {
    /// Entries in the file that no longer hold live state.
    #[must_use]
    pub fn dead_records(&self) -> usize {
        self.written_records.saturating_sub(self.live_entities)
    }
}

/// Result of a compaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionStats {
    /// Entries in the file before compaction.
    pub records_before: usize,
    /// Entries in the file after compaction.
    pub records_after: usize,
    /// File size before compaction.
    pub bytes_before: u64,
    /// File size after compaction.
    pub bytes_after: u64,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    offset: u64,
    len: u32,
}

#[derive(Debug)]
struct LogInner {
    file: File,
    size: u64,
    index: HashMap<EntityReference, Slot>,
    written: usize,
}

impl LogInner {
    fn read_slot(&mut self, slot: Slot) -> StorageResult<Vec<u8>> {
        self.file.seek(SeekFrom::Start(slot.offset))?;
        let mut buffer = vec![0u8; slot.len as usize];
        self.file.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    fn stats(&self) -> LogStoreStats {
        LogStoreStats {
            live_entities: self.index.len(),
            written_records: self.written,
            file_size: self.size,
        }
    }
}

/// A persistent storage adapter backed by an append-only log file.
///
/// # Durability
///
/// With `sync_on_commit` (the default) every change set is synced to disk
/// before [`StorageAdapter::apply_changes`] returns.
///
/// # Thread Safety
///
/// All file access goes through one internal lock. A sidecar `.lock` file
/// holds an exclusive OS lock so only one process opens the store.
///
/// # Example
///
/// ```no_run
/// use entistore_storage::{LogMapStore, LogStoreConfig};
/// use std::path::Path;
///
/// let store = LogMapStore::open(Path::new("entities.log"), LogStoreConfig::default()).unwrap();
/// let stats = store.stats();
/// println!("{} live entities", stats.live_entities);
/// ```
#[derive(Debug)]
pub struct LogMapStore {
    path: PathBuf,
    config: LogStoreConfig,
    inner: Mutex<LogInner>,
    commit_lock: CommitLock,
    _lock_file: File,
}

impl LogMapStore {
    /// Opens or creates a log store at `path`.
    ///
    /// Existing records are replayed to rebuild the index. A torn trailing
    /// record is truncated.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing and `create_if_missing` is
    /// off, if another process holds the lock, if the header is invalid, or
    /// on I/O failure.
    pub fn open(path: &Path, config: LogStoreConfig) -> StorageResult<Self> {
        if !path.exists() && !config.create_if_missing {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("log store not found: {}", path.display()),
            )));
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path(path))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked);
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let inner = Self::replay(&mut file)?;
        info!(
            path = %path.display(),
            live = inner.index.len(),
            written = inner.written,
            "opened log store"
        );

        Ok(Self {
            path: path.to_path_buf(),
            config,
            inner: Mutex::new(inner),
            commit_lock: CommitLock::default(),
            _lock_file: lock_file,
        })
    }

    /// Returns the path to the data file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the store's configuration.
    #[must_use]
    pub fn config(&self) -> &LogStoreConfig {
        &self.config
    }

    /// Returns current counters.
    #[must_use]
    pub fn stats(&self) -> LogStoreStats {
        self.inner.lock().stats()
    }

    /// Rewrites the data file so it only holds live entities.
    ///
    /// Compaction does not change logical state: every live reference maps
    /// to the same bytes before and after.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure. The original file is left in place
    /// unless the rewritten file was fully synced.
    pub fn compact(&self) -> StorageResult<CompactionStats> {
        let mut inner = self.inner.lock();
        let before = inner.stats();

        let mut live: Vec<(EntityReference, Slot)> =
            inner.index.iter().map(|(r, s)| (r.clone(), *s)).collect();
        live.sort_by(|a, b| a.0.cmp(&b.0));

        let tmp_path = self.path.with_extension("compact");
        let mut tmp = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        write_header(&mut tmp)?;

        let mut size = HEADER_SIZE;
        let mut index = HashMap::with_capacity(live.len());
        for chunk in live.chunks(COMPACTION_BATCH) {
            let mut batch = ChangeBuffer::new();
            for (reference, slot) in chunk {
                let data = inner.read_slot(*slot)?;
                batch.update_entity(reference.clone(), "", data);
            }
            let (frame, slots) = encode_frame(&batch, size)?;
            tmp.write_all(&frame)?;
            size += frame.len() as u64;
            index.extend(slots);
        }
        tmp.sync_all()?;
        drop(tmp);

        fs::rename(&tmp_path, &self.path)?;
        let file = OpenOptions::new().read(true).write(true).open(&self.path)?;

        inner.file = file;
        inner.size = size;
        inner.written = index.len();
        inner.index = index;

        let stats = CompactionStats {
            records_before: before.written_records,
            records_after: inner.written,
            bytes_before: before.file_size,
            bytes_after: size,
        };
        info!(
            records_before = stats.records_before,
            records_after = stats.records_after,
            bytes_saved = stats.bytes_before.saturating_sub(stats.bytes_after),
            "compacted log store"
        );
        Ok(stats)
    }

    fn replay(file: &mut File) -> StorageResult<LogInner> {
        let file_len = file.metadata()?.len();
        if file_len == 0 {
            write_header(file)?;
            file.sync_all()?;
            return Ok(LogInner {
                file: file.try_clone()?,
                size: HEADER_SIZE,
                index: HashMap::new(),
                written: 0,
            });
        }

        let mut bytes = Vec::with_capacity(file_len as usize);
        file.seek(SeekFrom::Start(0))?;
        file.read_to_end(&mut bytes)?;

        if bytes.len() < HEADER_SIZE as usize || &bytes[..6] != MAGIC {
            return Err(StorageError::Corrupted("invalid log header".into()));
        }
        let version = u16::from_le_bytes([bytes[6], bytes[7]]);
        if version != FORMAT_VERSION {
            return Err(StorageError::Corrupted(format!(
                "unsupported log format version {version}"
            )));
        }

        let mut index = HashMap::new();
        let mut written = 0usize;
        let mut pos = HEADER_SIZE as usize;

        while pos < bytes.len() {
            match decode_frame(&bytes[pos..], pos as u64) {
                Some((frame_len, entries)) => {
                    for (reference, slot) in entries {
                        written += 1;
                        match slot {
                            Some(slot) => {
                                index.insert(reference, slot);
                            }
                            None => {
                                index.remove(&reference);
                            }
                        }
                    }
                    pos += frame_len;
                }
                None => {
                    warn!(
                        offset = pos,
                        discarded = bytes.len() - pos,
                        "truncating torn log tail"
                    );
                    file.set_len(pos as u64)?;
                    file.sync_all()?;
                    break;
                }
            }
        }

        Ok(LogInner {
            file: file.try_clone()?,
            size: pos as u64,
            index,
            written,
        })
    }

    fn should_compact(&self, stats: &LogStoreStats) -> bool {
        if self.config.compaction_ratio <= 0.0
            || stats.written_records < self.config.min_compaction_records
        {
            return false;
        }
        #[allow(clippy::cast_precision_loss)]
        let ratio = stats.dead_records() as f64 / stats.written_records as f64;
        ratio >= self.config.compaction_ratio
    }
}

impl StorageAdapter for LogMapStore {
    fn get(&self, reference: &EntityReference) -> StorageResult<Vec<u8>> {
        let mut inner = self.inner.lock();
        let slot = *inner
            .index
            .get(reference)
            .ok_or_else(|| StorageError::not_found(reference))?;
        inner.read_slot(slot)
    }

    fn contains(&self, reference: &EntityReference) -> StorageResult<bool> {
        Ok(self.inner.lock().index.contains_key(reference))
    }

    fn apply_changes(&self, changes: &dyn MapChanges) -> StorageResult<()> {
        let staged = ChangeBuffer::collect(changes)?;
        if staged.is_empty() {
            return Ok(());
        }

        let stats = {
            let mut inner = self.inner.lock();
            staged.validate(|reference| Ok(inner.index.contains_key(reference)))?;

            let start = inner.size;
            let (frame, slots) = encode_frame(&staged, start)?;

            if let Err(e) = write_frame(&mut inner.file, start, &frame, self.config.sync_on_commit)
            {
                // Drop whatever part of the frame reached the file
                if let Err(truncate) = inner.file.set_len(start) {
                    warn!(
                        offset = start,
                        error = %truncate,
                        "failed to truncate partial batch, replay will drop it"
                    );
                }
                return Err(e.into());
            }

            inner.size = start + frame.len() as u64;
            inner.written += staged.len();
            for change in staged.changes() {
                if change.kind == ChangeKind::Remove {
                    inner.index.remove(&change.reference);
                }
            }
            inner.index.extend(slots);
            debug!(changes = staged.len(), size = inner.size, "appended batch");
            inner.stats()
        };

        // The batch is durable at this point, so compaction must not fail it
        if self.should_compact(&stats) {
            if let Err(e) = self.compact() {
                warn!(error = %e, "automatic compaction failed");
            }
        }
        Ok(())
    }

    fn commit_lock(&self) -> CommitLock {
        Arc::clone(&self.commit_lock)
    }

    fn scan_all(&self) -> StorageResult<EntityScan<'_>> {
        let mut keys: Vec<EntityReference> = self.inner.lock().index.keys().cloned().collect();
        keys.sort();
        Ok(Box::new(keys.into_iter().filter_map(move |key| {
            let mut inner = self.inner.lock();
            let slot = *inner.index.get(&key)?;
            Some(inner.read_slot(slot))
        })))
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

fn write_frame(file: &mut File, start: u64, frame: &[u8], sync: bool) -> std::io::Result<()> {
    file.seek(SeekFrom::Start(start))?;
    file.write_all(frame)?;
    if sync {
        file.sync_data()
    } else {
        file.flush()
    }
}

fn write_header(file: &mut File) -> StorageResult<()> {
    file.seek(SeekFrom::Start(0))?;
    file.write_all(MAGIC)?;
    file.write_all(&FORMAT_VERSION.to_le_bytes())?;
    Ok(())
}

/// Converts a length to its on-disk `u32` form.
fn frame_u32(len: usize, what: &str) -> StorageResult<u32> {
    u32::try_from(len).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{what} of {len} does not fit a log record"),
        )
        .into()
    })
}

/// Encodes a batch frame that will start at `frame_offset`, returning the
/// frame and the slots of every put entry.
fn encode_frame(
    batch: &ChangeBuffer,
    frame_offset: u64,
) -> StorageResult<(Vec<u8>, Vec<(EntityReference, Slot)>)> {
    let mut body = Vec::with_capacity(64 * batch.len());
    let mut slots = Vec::with_capacity(batch.len());
    body.extend_from_slice(&frame_u32(batch.len(), "batch size")?.to_le_bytes());

    for change in batch.changes() {
        let kind = if change.kind == ChangeKind::Remove {
            KIND_REMOVE
        } else {
            KIND_PUT
        };
        body.push(kind);
        let ref_len = frame_u32(change.reference.as_bytes().len(), "reference length")?;
        body.extend_from_slice(&ref_len.to_le_bytes());
        body.extend_from_slice(change.reference.as_bytes());
        if kind == KIND_PUT {
            let data_len = frame_u32(change.data.len(), "entity size")?;
            body.extend_from_slice(&data_len.to_le_bytes());
            let offset = frame_offset + FRAME_HEADER_SIZE + body.len() as u64;
            body.extend_from_slice(&change.data);
            slots.push((
                change.reference.clone(),
                Slot {
                    offset,
                    len: data_len,
                },
            ));
        }
    }

    let mut frame = Vec::with_capacity(body.len() + FRAME_HEADER_SIZE as usize);
    frame.extend_from_slice(&frame_u32(body.len(), "batch body")?.to_le_bytes());
    frame.extend_from_slice(&compute_crc32(&body).to_le_bytes());
    frame.extend_from_slice(&body);
    Ok((frame, slots))
}

/// Decodes the frame at the start of `bytes`. Returns `None` for a
/// truncated or corrupt frame.
fn decode_frame(
    bytes: &[u8],
    frame_offset: u64,
) -> Option<(usize, Vec<(EntityReference, Option<Slot>)>)> {
    let body_len = read_u32(bytes, 0)? as usize;
    let crc = read_u32(bytes, 4)?;
    let body = bytes.get(8..8 + body_len)?;
    if compute_crc32(body) != crc {
        return None;
    }

    let count = read_u32(body, 0)? as usize;
    let mut entries = Vec::with_capacity(count);
    let mut pos = 4usize;
    for _ in 0..count {
        let kind = *body.get(pos)?;
        let ref_len = read_u32(body, pos + 1)? as usize;
        let ref_bytes = body.get(pos + 5..pos + 5 + ref_len)?;
        let reference = EntityReference::new(std::str::from_utf8(ref_bytes).ok()?);
        pos += 5 + ref_len;
        match kind {
            KIND_PUT => {
                let data_len = read_u32(body, pos)?;
                let offset = frame_offset + FRAME_HEADER_SIZE + (pos + 4) as u64;
                pos += 4 + data_len as usize;
                if pos > body.len() {
                    return None;
                }
                entries.push((
                    reference,
                    Some(Slot {
                        offset,
                        len: data_len,
                    }),
                ));
            }
            KIND_REMOVE => entries.push((reference, None)),
            _ => return None,
        }
    }
    Some((8 + body_len, entries))
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let slice = bytes.get(at..at + 4)?;
    Some(u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

/// CRC32 (IEEE polynomial) over `data`.
fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}
