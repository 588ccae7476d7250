use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::models::error::AudioError;
use crate::storage::checksum;

/// Streaming writer for a raw, headerless PCM file.
///
/// Protect with a `Mutex` for cross-thread access.
///
/// ## File Format
///
/// ```text
/// [frame 0][frame 1][frame 2]...
/// ```
///
/// No header or trailer; the `AudioConfig` used to write is the only record
/// of how to read it back.
pub struct PcmFileWriter {
    file_path: PathBuf,
    file: Option<BufWriter<File>>,
    total_bytes_written: u64,
}

impl PcmFileWriter {
    pub fn new(file_path: PathBuf) -> Self {
        Self {
            file_path,
            file: None,
            total_bytes_written: 0,
        }
    }

    /// Create or truncate the file. A second call on an open writer is a no-op.
    pub fn open(&mut self) -> Result<(), AudioError> {
        if self.file.is_some() {
            return Ok(());
        }

        let file = File::create(&self.file_path)
            .map_err(|e| AudioError::FileAccess(format!("failed to create {}: {}", self.file_path.display(), e)))?;

        self.file = Some(BufWriter::new(file));
        self.total_bytes_written = 0;
        Ok(())
    }

    pub fn write(&mut self, data: &[u8]) -> Result<(), AudioError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| AudioError::FileAccess("file is not open for writing".into()))?;
        file.write_all(data)
            .map_err(|e| AudioError::FileAccess(format!("write failed: {}", e)))?;
        self.total_bytes_written += data.len() as u64;
        Ok(())
    }

    /// Flush and close the file, returning its SHA-256 checksum.
    pub fn close(&mut self) -> Result<String, AudioError> {
        let mut file = self
            .file
            .take()
            .ok_or_else(|| AudioError::FileAccess("file is not open".into()))?;

        file.flush()
            .map_err(|e| AudioError::FileAccess(format!("flush failed: {}", e)))?;
        drop(file);

        checksum::sha256_file(&self.file_path)
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    pub fn bytes_written(&self) -> u64 {
        self.total_bytes_written
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}
