//! engine::protocol
//!
//! Protocol of item-level checkout and return events.
//!
//! # Architecture
//!
//! Every item that changes hands produces one [`ProtocolEntry`] carrying the
//! [`RentalRecord`] involved. Entries go to a [`ProtocolSink`], which may fail;
//! the ledger reports that failure to its caller as a recoverable error.
//!
//! # Sinks
//!
//! - [`TracingProtocol`] - emits each entry as a `tracing` event
//! - [`FileProtocol`] - appends JSON lines to a file under an exclusive lock
//! - [`MemoryProtocol`] - keeps entries in memory; can be told to fail
//! - [`NullProtocol`] - discards entries

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::record::RentalRecord;
use crate::core::types::UtcTimestamp;

/// Errors from protocol sinks.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Failed to write to the protocol file.
    #[error("failed to write protocol file '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to serialize an entry.
    #[error("failed to serialize protocol entry: {0}")]
    Serialize(String),

    /// The sink refused the entry.
    #[error("protocol sink rejected entry: {0}")]
    Rejected(String),
}

/// Kind of protocol event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProtocolEvent {
    Checkout,
    Return,
}

impl std::fmt::Display for ProtocolEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolEvent::Checkout => f.write_str("CHECKOUT"),
            ProtocolEvent::Return => f.write_str("RETURN"),
        }
    }
}

/// One protocol line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolEntry {
    pub event: ProtocolEvent,
    pub record: RentalRecord,
    pub recorded_at: UtcTimestamp,
}

impl ProtocolEntry {
    /// Create an entry stamped with the current time.
    pub fn new(event: ProtocolEvent, record: RentalRecord) -> Self {
        Self {
            event,
            record,
            recorded_at: UtcTimestamp::now(),
        }
    }

    /// Serialize to a single JSON line (no trailing newline).
    pub fn to_json_line(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Serialize(e.to_string()))
    }
}

/// Destination for protocol entries.
pub trait ProtocolSink: Send + Sync {
    /// Record one entry.
    fn record(&self, entry: &ProtocolEntry) -> Result<(), ProtocolError>;
}

/// Emits entries as `info` events on the `rentledger::protocol` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProtocol;

impl ProtocolSink for TracingProtocol {
    fn record(&self, entry: &ProtocolEntry) -> Result<(), ProtocolError> {
        tracing::info!(
            target: "rentledger::protocol",
            event = %entry.event,
            customer = %entry.record.customer().number(),
            item = %entry.record.item(),
            title = entry.record.item_title(),
            checkout_date = %entry.record.checkout_date(),
            "protocol entry"
        );
        Ok(())
    }
}

/// Discards every entry.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProtocol;

impl ProtocolSink for NullProtocol {
    fn record(&self, _entry: &ProtocolEntry) -> Result<(), ProtocolError> {
        Ok(())
    }
}

/// Appends entries as JSON lines to a file.
///
/// Each append holds an exclusive OS lock on the file (via `fs2`) so that
/// concurrent processes sharing one protocol file do not interleave lines.
#[derive(Debug, Clone)]
pub struct FileProtocol {
    path: PathBuf,
}

impl FileProtocol {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back all entries in the file.
    pub fn read_all(&self) -> Result<Vec<ProtocolEntry>, ProtocolError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(self.io_error(e)),
        };
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|e| ProtocolError::Serialize(e.to_string()))
            })
            .collect()
    }

    fn io_error(&self, source: std::io::Error) -> ProtocolError {
        ProtocolError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl ProtocolSink for FileProtocol {
    fn record(&self, entry: &ProtocolEntry) -> Result<(), ProtocolError> {
        let mut line = entry.to_json_line()?;
        line.push('\n');

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;

        file.lock_exclusive().map_err(|e| self.io_error(e))?;
        let written = file
            .write_all(line.as_bytes())
            .and_then(|_| file.sync_data());
        // Unlock even if the write failed; report the write error first.
        let unlocked = file.unlock();
        written.map_err(|e| self.io_error(e))?;
        unlocked.map_err(|e| self.io_error(e))?;

        tracing::debug!(path = %self.path.display(), event = %entry.event, "protocol entry appended");
        Ok(())
    }
}

/// In-memory sink for tests and replays.
///
/// Clones share the same entries. Thread-safe via internal `Arc<Mutex<...>>`.
#[derive(Debug, Clone, Default)]
pub struct MemoryProtocol {
    inner: Arc<Mutex<MemoryProtocolInner>>,
}

#[derive(Debug, Default)]
struct MemoryProtocolInner {
    entries: Vec<ProtocolEntry>,
    /// Fail when this many entries have been accepted.
    fail_after: Option<usize>,
}

impl MemoryProtocol {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `accepted` more entries, then reject every further one.
    pub fn fail_after(&self, accepted: usize) {
        let mut inner = self.lock();
        inner.fail_after = Some(inner.entries.len() + accepted);
    }

    /// Stop failing.
    pub fn recover(&self) {
        self.lock().fail_after = None;
    }

    /// Copy of all accepted entries, oldest first.
    pub fn entries(&self) -> Vec<ProtocolEntry> {
        self.lock().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryProtocolInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ProtocolSink for MemoryProtocol {
    fn record(&self, entry: &ProtocolEntry) -> Result<(), ProtocolError> {
        let mut inner = self.lock();
        if inner.fail_after.is_some_and(|limit| inner.entries.len() >= limit) {
            return Err(ProtocolError::Rejected(format!(
                "{} for item {}",
                entry.event,
                entry.record.item()
            )));
        }
        inner.entries.push(entry.clone());
        Ok(())
    }
}
