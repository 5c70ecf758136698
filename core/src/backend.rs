//! Backend store abstraction.
//!
//! A backend serves one mounted subtree and only ever sees backend-relative
//! canonical paths (leading `/`, mount point stripped). Symlink traversal,
//! access checks, descriptor bookkeeping and change notifications all live
//! above this trait; a backend is plain storage with POSIX-shaped edges.

use std::sync::Arc;

use bitflags::bitflags;

use crate::error::VfsResult;
use crate::flags::OpenFlags;
use crate::stats::{Stats, Timespec};

bitflags! {
    /// Coarse feature advertisement used by the dispatch layer to gate
    /// semantics (and by callers for capability probing).
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct BackendCaps: u32 {
        const WRITE = 1 << 0;
        const HARDLINKS = 1 << 1;
        const SET_METADATA = 1 << 2;
        const SYNC_IO = 1 << 3;
    }
}

/// Partial metadata update. `None` fields are left untouched; a `mode`
/// update replaces the whole mode word, type bits included.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SetMetadata {
    pub mode: Option<u32>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub atime: Option<Timespec>,
    pub mtime: Option<Timespec>,
    pub size: Option<u64>,
}

/// Filesystem-level statistics, synthesized where the store has no real
/// notion of blocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatFs {
    pub block_size: u64,
    pub blocks: u64,
    pub blocks_free: u64,
    pub blocks_available: u64,
    pub files: u64,
    pub files_free: u64,
}

impl Default for StatFs {
    fn default() -> Self {
        Self {
            block_size: 4096,
            blocks: 0,
            blocks_free: 0,
            blocks_available: 0,
            files: 0,
            files_free: 0,
        }
    }
}

pub trait Backend: std::fmt::Debug + Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> BackendCaps;

    /// Stat without following symlinks (backends never follow; link
    /// semantics are a dispatch-layer concern).
    fn stat(&self, path: &str) -> VfsResult<Stats>;

    fn exists(&self, path: &str) -> bool {
        self.stat(path).is_ok()
    }

    fn open_file(&self, path: &str, flags: OpenFlags) -> VfsResult<Arc<dyn BackendFile>>;

    fn create_file(
        &self,
        path: &str,
        flags: OpenFlags,
        mode: u32,
    ) -> VfsResult<Arc<dyn BackendFile>>;

    fn mkdir(&self, path: &str, mode: u32) -> VfsResult<()>;

    fn rmdir(&self, path: &str) -> VfsResult<()>;

    fn unlink(&self, path: &str) -> VfsResult<()>;

    /// Same-backend rename. Cross-backend moves never reach this method.
    fn rename(&self, from: &str, to: &str) -> VfsResult<()>;

    /// Same-backend hard link. Cross-backend links never reach this method.
    fn link(&self, target: &str, link: &str) -> VfsResult<()>;

    fn readdir(&self, path: &str) -> VfsResult<Vec<String>>;

    fn set_metadata(&self, path: &str, set: SetMetadata) -> VfsResult<()>;

    fn statfs(&self) -> VfsResult<StatFs> {
        Ok(StatFs::default())
    }
}

/// An open file within a backend. Offsets always come from the caller; the
/// current-position cursor lives in the VFS-level handle.
pub trait BackendFile: std::fmt::Debug + Send + Sync {
    fn stat(&self) -> VfsResult<Stats>;

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> VfsResult<usize>;

    fn write_at(&self, offset: u64, buf: &[u8]) -> VfsResult<usize>;

    fn set_len(&self, len: u64) -> VfsResult<()>;

    fn set_metadata(&self, set: SetMetadata) -> VfsResult<()>;

    fn sync(&self) -> VfsResult<()> {
        Ok(())
    }

    fn datasync(&self) -> VfsResult<()> {
        self.sync()
    }

    fn close(&self) -> VfsResult<()> {
        Ok(())
    }

    fn len(&self) -> VfsResult<u64> {
        Ok(self.stat()?.size)
    }
}
