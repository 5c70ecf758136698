//! Process-wide file descriptor table.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{VfsError, VfsErrorKind, VfsResult};
use crate::handle::FileHandle;

/// A small positive integer bound to an open file handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fd(pub u32);

impl std::fmt::Display for Fd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Mapping `fd -> handle`, shared by every caller of one `Vfs`.
///
/// Allocation hands out the smallest unused positive integer, so retired
/// descriptors are reused eagerly.
pub struct FdTable {
    entries: Mutex<BTreeMap<u32, Arc<FileHandle>>>,
}

impl Default for FdTable {
    fn default() -> Self {
        Self::new()
    }
}

impl FdTable {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn insert(&self, handle: Arc<FileHandle>) -> Fd {
        let mut entries = self.entries.lock();
        let mut next = 1u32;
        for fd in entries.keys() {
            if *fd == next {
                next += 1;
            } else if *fd > next {
                break;
            }
        }
        entries.insert(next, handle);
        Fd(next)
    }

    pub fn get(&self, fd: Fd) -> VfsResult<Arc<FileHandle>> {
        self.entries
            .lock()
            .get(&fd.0)
            .cloned()
            .ok_or(VfsError::new(VfsErrorKind::BadFd, "fstat"))
    }

    pub fn remove(&self, fd: Fd) -> VfsResult<Arc<FileHandle>> {
        self.entries
            .lock()
            .remove(&fd.0)
            .ok_or(VfsError::new(VfsErrorKind::BadFd, "close"))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
