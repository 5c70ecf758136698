//! VFS-level open file handles.
//!
//! The position cursor lives here, not in the backend: a handle exclusively
//! owns its position, and backends only implement positional I/O.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::{BackendFile, SetMetadata};
use crate::error::{VfsError, VfsErrorKind, VfsResult};
use crate::flags::OpenFlags;
use crate::stats::Stats;

pub struct FileHandle {
    path: String,
    flags: OpenFlags,
    pos: Mutex<u64>,
    file: Arc<dyn BackendFile>,
}

impl FileHandle {
    /// Wrap a backend file. Append-opened handles start at EOF, everything
    /// else at 0.
    pub(crate) fn new(
        path: String,
        flags: OpenFlags,
        file: Arc<dyn BackendFile>,
    ) -> VfsResult<Self> {
        let pos = if flags.appendable() { file.len()? } else { 0 };
        Ok(Self {
            path,
            flags,
            pos: Mutex::new(pos),
            file,
        })
    }

    /// The caller-visible path this handle was opened on.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn flags(&self) -> OpenFlags {
        self.flags
    }

    pub fn position(&self) -> u64 {
        *self.pos.lock()
    }

    fn check_readable(&self, syscall: &'static str) -> VfsResult<()> {
        if self.flags.readable() {
            Ok(())
        } else {
            Err(VfsError::with_path(
                VfsErrorKind::PermissionDenied,
                syscall,
                &self.path,
            ))
        }
    }

    fn check_writable(&self, syscall: &'static str) -> VfsResult<()> {
        if self.flags.writable() {
            Ok(())
        } else {
            Err(VfsError::with_path(
                VfsErrorKind::PermissionDenied,
                syscall,
                &self.path,
            ))
        }
    }

    /// Read at the current position, advancing it.
    pub fn read(&self, buf: &mut [u8]) -> VfsResult<usize> {
        self.check_readable("read")?;
        let mut pos = self.pos.lock();
        let read = self.file.read_at(*pos, buf)?;
        *pos = pos.saturating_add(read as u64);
        Ok(read)
    }

    /// Write at the current position, advancing it. Append handles write at
    /// EOF regardless of the cursor.
    pub fn write(&self, buf: &[u8]) -> VfsResult<usize> {
        self.check_writable("write")?;
        let mut pos = self.pos.lock();
        if self.flags.appendable() {
            let len = self.file.len()?;
            let written = self.file.write_at(len, buf)?;
            *pos = len.saturating_add(written as u64);
            return Ok(written);
        }
        let written = self.file.write_at(*pos, buf)?;
        *pos = pos.saturating_add(written as u64);
        Ok(written)
    }

    /// Positional read; the cursor does not move.
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> VfsResult<usize> {
        self.check_readable("read")?;
        self.file.read_at(offset, buf)
    }

    /// Positional write; the cursor does not move.
    pub fn write_at(&self, offset: u64, buf: &[u8]) -> VfsResult<usize> {
        self.check_writable("write")?;
        self.file.write_at(offset, buf)
    }

    pub fn stat(&self) -> VfsResult<Stats> {
        self.file.stat()
    }

    pub fn truncate(&self, len: u64) -> VfsResult<()> {
        if !self.flags.writable() {
            return Err(VfsError::with_path(
                VfsErrorKind::InvalidInput,
                "ftruncate",
                &self.path,
            ));
        }
        self.file.set_len(len)
    }

    pub fn set_metadata(&self, set: SetMetadata) -> VfsResult<()> {
        self.file.set_metadata(set)
    }

    pub fn sync(&self) -> VfsResult<()> {
        self.file.sync()
    }

    pub fn datasync(&self) -> VfsResult<()> {
        self.file.datasync()
    }

    pub fn close(&self) -> VfsResult<()> {
        self.file.close()
    }
}
