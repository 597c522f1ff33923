//! Trace Storage Layer
//!
//! Append-only sinks for the rendered trace. The writer task owns exactly one
//! sink for the whole session and is the only code that touches it.

mod file;
mod memory;
mod naming;

pub use file::{FileSink, FileStorage};
pub use memory::{MemorySink, MemoryStorage};
pub use naming::log_file_name;

use can_bus::SESSION_HEADER;
use thiserror::Error;
use tracing::info;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Short write: requested {requested} bytes, wrote {written}")]
    ShortWrite { requested: usize, written: usize },
}

/// A storage device that can open named append-only logs
pub trait TraceStorage {
    /// Handle type returned by `open_for_append`
    type Sink: TraceSink + 'static;

    /// Open (creating if needed) `name` for appending
    fn open_for_append(&self, name: &str) -> Result<Self::Sink, StorageError>;
}

/// Open append handle
pub trait TraceSink: Send {
    /// Write `bytes`, returning how many were accepted
    fn write(&mut self, bytes: &[u8]) -> Result<usize, StorageError>;

    /// Force buffered data to the device
    fn flush(&mut self) -> Result<(), StorageError>;
}

impl<S: TraceSink + ?Sized> TraceSink for Box<S> {
    fn write(&mut self, bytes: &[u8]) -> Result<usize, StorageError> {
        (**self).write(bytes)
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        (**self).flush()
    }
}

/// Open `name` and write the session header, flushed immediately
pub fn open_session<S: TraceStorage>(storage: &S, name: &str) -> Result<S::Sink, StorageError> {
    let mut sink = storage.open_for_append(name)?;

    let header = SESSION_HEADER.as_bytes();
    let written = sink.write(header)?;
    if written != header.len() {
        return Err(StorageError::ShortWrite {
            requested: header.len(),
            written,
        });
    }
    sink.flush()?;

    info!("Logging to {}", name);
    Ok(sink)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_session_writes_header() {
        let storage = MemoryStorage::new();
        let sink = open_session(&storage, "candump.log").unwrap();
        drop(sink);

        assert_eq!(storage.contents(), SESSION_HEADER.as_bytes());
        assert_eq!(storage.flush_count(), 1);
        assert_eq!(storage.opened().as_deref(), Some("candump.log"));
    }

    #[test]
    fn test_open_session_unavailable() {
        let storage = MemoryStorage::unavailable();
        assert!(matches!(
            open_session(&storage, "candump.log"),
            Err(StorageError::Unavailable(_))
        ));
    }

    #[test]
    fn test_boxed_sink_forwards() {
        let storage = MemoryStorage::new();
        let mut sink: Box<dyn TraceSink> = Box::new(storage.open_for_append("x").unwrap());
        assert_eq!(sink.write(b"abc").unwrap(), 3);
        sink.flush().unwrap();
        assert_eq!(storage.contents(), b"abc");
    }
}
