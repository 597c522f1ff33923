//! File-Backed Storage

use crate::{StorageError, TraceSink, TraceStorage};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Storage rooted at a directory on a mounted volume
#[derive(Debug, Clone)]
pub struct FileStorage {
    directory: PathBuf,
}

impl FileStorage {
    /// Use `directory`, creating it if missing
    pub fn new(directory: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let directory = directory.into();
        fs::create_dir_all(&directory).map_err(|e| {
            StorageError::Unavailable(format!("{}: {}", directory.display(), e))
        })?;

        info!("Using storage directory {}", directory.display());
        Ok(Self { directory })
    }

    /// Root directory
    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl TraceStorage for FileStorage {
    type Sink = FileSink;

    fn open_for_append(&self, name: &str) -> Result<Self::Sink, StorageError> {
        let path = self.directory.join(name);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!("Opened {} for append", path.display());
        Ok(FileSink { path, file })
    }
}

/// Append handle to one trace file
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: File,
}

impl FileSink {
    /// Path of the open file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TraceSink for FileSink {
    fn write(&mut self, bytes: &[u8]) -> Result<usize, StorageError> {
        // A single write call; a short count is reported, not retried.
        Ok(self.file.write(bytes)?)
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        self.file.flush()?;
        self.file.sync_data()?;
        Ok(())
    }
}
