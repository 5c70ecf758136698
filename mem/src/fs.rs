use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use keelfs_core::{path, VfsError, VfsErrorKind, VfsResult};

use crate::inode::MemInode;

/// Writable in-memory filesystem instance.
///
/// Serves one mounted subtree; all paths it sees are backend-relative and
/// canonical. Inode numbers are synthesized from a counter and stable for
/// the lifetime of the instance.
#[derive(Debug)]
pub struct MemFs {
    next_ino: AtomicU64,
    pub(crate) root: Arc<MemInode>,
}

impl Default for MemFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemFs {
    pub fn new() -> Self {
        Self {
            next_ino: AtomicU64::new(2),
            root: MemInode::new_root(),
        }
    }

    pub(crate) fn alloc_ino(&self) -> u64 {
        self.next_ino.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn lookup(&self, rel: &str, syscall: &'static str) -> VfsResult<Arc<MemInode>> {
        let mut node = self.root.clone();
        for component in rel.split('/').filter(|c| !c.is_empty()) {
            let children = node
                .children()
                .ok_or_else(|| VfsError::with_path(VfsErrorKind::NotDir, syscall, rel))?;
            let next = children
                .read()
                .expect("lock")
                .get(component)
                .cloned()
                .ok_or_else(|| VfsError::with_path(VfsErrorKind::NotFound, syscall, rel))?;
            node = next;
        }
        Ok(node)
    }

    /// Resolve the parent directory of `rel` and the final component.
    pub(crate) fn lookup_parent(
        &self,
        rel: &str,
        syscall: &'static str,
    ) -> VfsResult<(Arc<MemInode>, String)> {
        let (dir, base) = path::split(rel);
        if base.is_empty() {
            return Err(VfsError::with_path(VfsErrorKind::InvalidInput, syscall, rel));
        }
        let parent = self.lookup(dir, syscall)?;
        if !parent.is_dir() {
            return Err(VfsError::with_path(VfsErrorKind::NotDir, syscall, rel));
        }
        Ok((parent, base.to_owned()))
    }
}
