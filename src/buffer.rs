//! Log record buffering.
//!
//! A pipeline parks parsed records in a buffer between the line-parsing
//! and frame-assembly stages. Two implementations exist: an in-memory
//! vector for ordinary traces and a disk-backed JSON-lines file for
//! captures too large to hold resident. The factory picks between them
//! from an estimated size against available system memory.
//!
//! A buffer is exclusively owned by one pipeline; it is not safe to share
//! across pipelines.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use sysinfo::System;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::types::LogEntry;

/// Fraction of available memory an estimated trace may claim before the
/// automatic mode falls back to a file-backed buffer.
const MEMORY_FRACTION: f64 = 0.30;

/// Buffer backing selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferMode {
    /// Hold every record resident.
    InMemory,
    /// Spill records to a JSON-lines temp file.
    File,
    /// Choose by estimated size against available memory.
    Auto,
}

/// Storage contract between the pipeline and its record buffer.
///
/// The file-backed implementation performs disk I/O; callers treat `add`,
/// `find` and `dispose` as potentially blocking.
pub trait LogBuffer {
    /// Append a record. Never fails for the in-memory buffer.
    fn add(&mut self, entry: LogEntry) -> Result<()>;

    /// Collect the live records matching `predicate`, in insertion order.
    ///
    /// The file-backed implementation re-scans its file and deserialises
    /// each line on demand.
    fn find(&self, predicate: &dyn Fn(&LogEntry) -> bool) -> Result<Vec<LogEntry>>;

    /// Best-effort removal; the file-backed implementation is a no-op
    /// returning `false`.
    fn remove(&mut self, entry: &LogEntry) -> Result<bool>;

    /// Number of records held (in-memory) or ever inserted (file).
    fn count(&self) -> usize;

    /// Release held resources. Idempotent; the file-backed implementation
    /// deletes its temp file.
    fn dispose(&mut self) -> Result<()>;

    /// Path of the backing file, if the buffer has one.
    fn file_path(&self) -> Option<&Path> {
        None
    }
}

/// Vector-backed buffer.
#[derive(Debug, Default)]
pub struct MemoryLogBuffer {
    entries: Vec<LogEntry>,
}

impl MemoryLogBuffer {
    /// Create an empty in-memory buffer.
    pub fn new() -> Self {
        Self::default()
    }
}

impl LogBuffer for MemoryLogBuffer {
    fn add(&mut self, entry: LogEntry) -> Result<()> {
        self.entries.push(entry);
        Ok(())
    }

    fn find(&self, predicate: &dyn Fn(&LogEntry) -> bool) -> Result<Vec<LogEntry>> {
        Ok(self
            .entries
            .iter()
            .filter(|entry| predicate(entry))
            .cloned()
            .collect())
    }

    fn remove(&mut self, entry: &LogEntry) -> Result<bool> {
        match self.entries.iter().position(|held| held == entry) {
            Some(index) => {
                self.entries.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn count(&self) -> usize {
        self.entries.len()
    }

    fn dispose(&mut self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }
}

/// JSON-lines file buffer.
///
/// One serialised record per line, tagged with its `$type` discriminator.
/// Byte offsets of every appended line are kept for offset-addressed
/// re-reads.
#[derive(Debug)]
pub struct FileLogBuffer {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    offsets: Vec<u64>,
    next_offset: u64,
    inserted: usize,
}

impl FileLogBuffer {
    /// Create a buffer backed by `logbuffer_<uuid>.tmp` in `temp_dir`.
    pub fn create(temp_dir: &Path) -> Result<Self> {
        let path = temp_dir.join(format!("logbuffer_{}.tmp", Uuid::new_v4()));
        let file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&path)?;
        debug!(path = %path.display(), "file-backed log buffer created");

        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
            offsets: Vec::new(),
            next_offset: 0,
            inserted: 0,
        })
    }

    /// Byte offset of each appended record within the backing file.
    pub fn byte_offsets(&self) -> &[u64] {
        &self.offsets
    }
}

impl LogBuffer for FileLogBuffer {
    fn add(&mut self, entry: LogEntry) -> Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "buffer disposed",
            )
            .into());
        };

        let line = serde_json::to_string(&entry)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        // Keep appended lines visible to the shared-path read handle.
        writer.flush()?;

        self.offsets.push(self.next_offset);
        self.next_offset += line.len() as u64 + 1;
        self.inserted += 1;
        Ok(())
    }

    fn find(&self, predicate: &dyn Fn(&LogEntry) -> bool) -> Result<Vec<LogEntry>> {
        if self.writer.is_none() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        let mut matches = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let entry: LogEntry = serde_json::from_str(&line)?;
            if predicate(&entry) {
                matches.push(entry);
            }
        }
        Ok(matches)
    }

    fn remove(&mut self, _entry: &LogEntry) -> Result<bool> {
        // Appended lines are immutable; removal is allowed to be a no-op.
        Ok(false)
    }

    fn count(&self) -> usize {
        self.inserted
    }

    fn dispose(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.flush() {
                warn!(error = %e, "flush on dispose failed");
            }
            drop(writer);
            fs::remove_file(&self.path)?;
            debug!(path = %self.path.display(), "file-backed log buffer deleted");
        }
        Ok(())
    }

    fn file_path(&self) -> Option<&Path> {
        self.writer.as_ref().map(|_| self.path.as_path())
    }
}

impl Drop for FileLogBuffer {
    fn drop(&mut self) {
        if let Err(e) = self.dispose() {
            warn!(error = %e, path = %self.path.display(), "dispose on drop failed");
        }
    }
}

/// Create a buffer for an expected trace size.
///
/// `Auto` picks the in-memory buffer while `estimated_bytes` stays under
/// 30% of the machine's available memory, and the file-backed buffer
/// otherwise.
pub fn create_buffer(
    mode: BufferMode,
    estimated_bytes: u64,
    temp_dir: &Path,
) -> Result<Box<dyn LogBuffer>> {
    match mode {
        BufferMode::InMemory => Ok(Box::new(MemoryLogBuffer::new())),
        BufferMode::File => Ok(Box::new(FileLogBuffer::create(temp_dir)?)),
        BufferMode::Auto => {
            let budget = (available_memory() as f64 * MEMORY_FRACTION) as u64;
            if estimated_bytes < budget {
                debug!(estimated_bytes, budget, "auto buffer mode: in-memory");
                Ok(Box::new(MemoryLogBuffer::new()))
            } else {
                debug!(estimated_bytes, budget, "auto buffer mode: file");
                Ok(Box::new(FileLogBuffer::create(temp_dir)?))
            }
        }
    }
}

fn available_memory() -> u64 {
    let mut sys = System::new();
    sys.refresh_memory();
    sys.available_memory()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LogRecord, ModbusRecord, PowerRecord};

    fn modbus_entry(action: &str) -> LogEntry {
        LogEntry::Modbus(ModbusRecord {
            action: action.into(),
            ..Default::default()
        })
    }

    fn power_entry(channel: i32) -> LogEntry {
        LogEntry::Power(PowerRecord {
            channel,
            ..Default::default()
        })
    }

    #[test]
    fn test_memory_add_find_count() {
        let mut buffer = MemoryLogBuffer::new();
        buffer.add(modbus_entry("Request")).unwrap();
        buffer.add(power_entry(2)).unwrap();
        buffer.add(modbus_entry("Reply()")).unwrap();

        assert_eq!(buffer.count(), 3);

        let modbus = buffer
            .find(&|entry| matches!(entry, LogEntry::Modbus(_)))
            .unwrap();
        assert_eq!(modbus.len(), 2);
    }

    #[test]
    fn test_memory_remove() {
        let mut buffer = MemoryLogBuffer::new();
        let entry = modbus_entry("Request");
        buffer.add(entry.clone()).unwrap();

        assert!(buffer.remove(&entry).unwrap());
        assert!(!buffer.remove(&entry).unwrap());
        assert_eq!(buffer.count(), 0);
    }

    #[test]
    fn test_memory_dispose_idempotent() {
        let mut buffer = MemoryLogBuffer::new();
        buffer.add(power_entry(0)).unwrap();
        buffer.dispose().unwrap();
        buffer.dispose().unwrap();
        assert_eq!(buffer.count(), 0);
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut buffer = FileLogBuffer::create(dir.path()).unwrap();

        buffer.add(modbus_entry("Request")).unwrap();
        buffer.add(power_entry(7)).unwrap();

        assert_eq!(buffer.count(), 2);
        assert_eq!(buffer.byte_offsets().len(), 2);
        assert_eq!(buffer.byte_offsets()[0], 0);

        let found = buffer
            .find(&|entry| matches!(entry, LogEntry::Power(rec) if rec.channel == 7))
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_file_remove_is_noop_and_count_sticks() {
        let dir = tempfile::tempdir().unwrap();
        let mut buffer = FileLogBuffer::create(dir.path()).unwrap();
        let entry = modbus_entry("Request");
        buffer.add(entry.clone()).unwrap();

        assert!(!buffer.remove(&entry).unwrap());
        assert_eq!(buffer.count(), 1);
    }

    #[test]
    fn test_file_name_and_dispose_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let mut buffer = FileLogBuffer::create(dir.path()).unwrap();

        let path = buffer.file_path().unwrap().to_path_buf();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("logbuffer_"));
        assert!(name.ends_with(".tmp"));
        assert!(path.exists());

        buffer.dispose().unwrap();
        assert!(!path.exists());
        assert!(buffer.file_path().is_none());
        // Idempotent
        buffer.dispose().unwrap();
    }

    #[test]
    fn test_file_unknown_discriminator_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let mut buffer = FileLogBuffer::create(dir.path()).unwrap();
        buffer.add(modbus_entry("Request")).unwrap();

        // Append a line with a discriminator from the future by hand
        let path = buffer.file_path().unwrap().to_path_buf();
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            writeln!(file, "{{\"$type\":\"FutureLogEntry\",\"level\":\"INFO\"}}").unwrap();
        }

        let all = buffer.find(&|_| true).unwrap();
        assert_eq!(all.len(), 2);
        assert!(matches!(all[1], LogEntry::Plain(ref rec) if rec.level == "INFO"));
    }

    #[test]
    fn test_factory_explicit_modes() {
        let dir = tempfile::tempdir().unwrap();

        let mem = create_buffer(BufferMode::InMemory, u64::MAX, dir.path()).unwrap();
        assert!(mem.file_path().is_none());

        let file = create_buffer(BufferMode::File, 0, dir.path()).unwrap();
        assert!(file.file_path().is_some());
    }

    #[test]
    fn test_factory_auto_thresholds() {
        let dir = tempfile::tempdir().unwrap();

        // A zero-byte estimate always fits in memory
        let small = create_buffer(BufferMode::Auto, 0, dir.path()).unwrap();
        assert!(small.file_path().is_none());

        // An absurd estimate never does
        let huge = create_buffer(BufferMode::Auto, u64::MAX, dir.path()).unwrap();
        assert!(huge.file_path().is_some());
    }

    #[test]
    fn test_plain_record_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut buffer = FileLogBuffer::create(dir.path()).unwrap();
        buffer
            .add(LogEntry::Plain(LogRecord {
                level: "WARN".into(),
                message: "link lost".into(),
                ..Default::default()
            }))
            .unwrap();

        let found = buffer
            .find(&|entry| entry.header().level == "WARN")
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].header().message, "link lost");
    }
}
