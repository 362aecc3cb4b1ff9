use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use super::error::MonitorError;

/// Follows an append-only log file by byte offset.
///
/// Only complete (newline terminated) lines are handed out. A shrinking file
/// is treated as truncation or rotation and the tailer starts over from the
/// beginning of whatever file now lives at the path.
#[derive(Debug)]
pub struct LogTailer {
    path: PathBuf,
    reader: BufReader<File>,
    offset: u64,
    last_size: u64,
    buffer: Vec<u8>,
}

impl LogTailer {
    pub fn open(path: &Path) -> Result<Self, MonitorError> {
        let file_access = |source| MonitorError::FileAccess {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(file_access)?;
        let last_size = file.metadata().map_err(file_access)?.len();

        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            offset: 0,
            last_size,
            buffer: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Visits every complete line currently in the file, once. The visitor
    /// can stop the pass early; the remaining lines are then left for
    /// [`LogTailer::poll_line`]. Returns the number of lines visited.
    pub fn drain_existing<F>(&mut self, mut visit: F) -> Result<u64, MonitorError>
    where
        F: FnMut(&str) -> ControlFlow<()>,
    {
        let mut visited = 0_u64;

        while let Some(line) = self.read_complete_line()? {
            visited += 1;
            if visit(&line).is_break() {
                break;
            }
        }

        self.last_size = self.current_size()?.max(self.offset);
        Ok(visited)
    }

    /// Returns the next complete line, or `None` when nothing new is there.
    ///
    /// The size is checked before every read so a shrunken file is never
    /// read from the old offset.
    pub fn poll_line(&mut self) -> Result<Option<String>, MonitorError> {
        let current_size = self.current_size()?;
        if current_size < self.last_size || current_size < self.offset {
            tracing::info!(
                path = %self.path.display(),
                previous_size = self.last_size,
                current_size,
                "Game log shrank, reopening from the start"
            );
            self.reopen()?;
        } else {
            self.last_size = current_size;
        }

        self.read_complete_line()
    }

    fn reopen(&mut self) -> Result<(), MonitorError> {
        let rotation_recovery = |source| MonitorError::RotationRecovery {
            path: self.path.clone(),
            source,
        };

        let file = File::open(&self.path).map_err(rotation_recovery)?;
        let size = file.metadata().map_err(rotation_recovery)?.len();

        self.reader = BufReader::new(file);
        self.offset = 0;
        self.last_size = size;
        Ok(())
    }

    fn current_size(&self) -> Result<u64, MonitorError> {
        std::fs::metadata(&self.path)
            .map(|metadata| metadata.len())
            .map_err(|source| MonitorError::RotationRecovery {
                path: self.path.clone(),
                source,
            })
    }

    fn read_complete_line(&mut self) -> Result<Option<String>, MonitorError> {
        self.buffer.clear();
        let bytes_read = self
            .reader
            .read_until(b'\n', &mut self.buffer)
            .map_err(|source| MonitorError::Read {
                path: self.path.clone(),
                source,
            })?;

        if bytes_read == 0 {
            return Ok(None);
        }

        // Partial line still being written; pick it up again once complete.
        if self.buffer.last() != Some(&b'\n') {
            self.reader
                .seek(SeekFrom::Start(self.offset))
                .map_err(|source| MonitorError::Read {
                    path: self.path.clone(),
                    source,
                })?;
            return Ok(None);
        }

        self.offset = self.offset.saturating_add(bytes_read as u64);
        let line = String::from_utf8_lossy(&self.buffer);
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}
