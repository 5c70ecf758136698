//! Mount table: longest-prefix routing of absolute paths to backends.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::backend::Backend;
use crate::error::{VfsError, VfsErrorKind, VfsResult};
use crate::path;

/// Result of routing a caller-visible path through the mount table.
pub struct ResolvedMount {
    pub fs: Arc<dyn Backend>,
    /// Backend-relative path: the input with the mount point stripped,
    /// leading `/` preserved (`/` when input equals the mount point).
    pub rel: String,
    /// The matched mount point.
    pub root: String,
}

struct MountEntry {
    point: String,
    fs: Arc<dyn Backend>,
}

/// Table of `(mount point, backend)` bindings.
///
/// Exactly one root mount `/` exists at all times and mount points are
/// unique. Reads are frequent and lock-cheap; mutation is expected to be
/// rare and externally serialized with outstanding operations.
pub struct MountTable {
    // Sorted by descending point length so the first prefix match is the
    // longest one.
    mounts: RwLock<Vec<MountEntry>>,
}

impl MountTable {
    pub fn new(root: Arc<dyn Backend>) -> Self {
        Self {
            mounts: RwLock::new(vec![MountEntry {
                point: "/".to_owned(),
                fs: root,
            }]),
        }
    }

    pub fn mount(&self, point: &str, fs: Arc<dyn Backend>) -> VfsResult<()> {
        let point = path::normalize(point)?;
        let mut mounts = self.mounts.write();
        if mounts.iter().any(|entry| entry.point == point) {
            return Err(VfsError::with_path(
                VfsErrorKind::AlreadyExists,
                "mount",
                point,
            ));
        }
        debug!(mount_point = %point, backend = fs.name(), "mounting backend");
        let at = mounts
            .iter()
            .position(|entry| entry.point.len() < point.len())
            .unwrap_or(mounts.len());
        mounts.insert(at, MountEntry { point, fs });
        Ok(())
    }

    pub fn unmount(&self, point: &str) -> VfsResult<Arc<dyn Backend>> {
        let point = path::normalize(point)?;
        if point == "/" {
            return Err(VfsError::with_path(
                VfsErrorKind::NotPermitted,
                "umount",
                point,
            ));
        }
        let mut mounts = self.mounts.write();
        let at = mounts
            .iter()
            .position(|entry| entry.point == point)
            .ok_or_else(|| VfsError::with_path(VfsErrorKind::NotFound, "umount", &point))?;
        debug!(mount_point = %point, "unmounting backend");
        Ok(mounts.remove(at).fs)
    }

    /// Route a normalized absolute path to its backend.
    pub fn resolve(&self, vpath: &str) -> VfsResult<ResolvedMount> {
        let mounts = self.mounts.read();
        for entry in mounts.iter() {
            if path::is_prefix(&entry.point, vpath) {
                let rel = if entry.point == "/" {
                    vpath.to_owned()
                } else {
                    let rest = &vpath[entry.point.len()..];
                    if rest.is_empty() {
                        "/".to_owned()
                    } else {
                        rest.to_owned()
                    }
                };
                return Ok(ResolvedMount {
                    fs: entry.fs.clone(),
                    rel,
                    root: entry.point.clone(),
                });
            }
        }
        // The root mount matches every path; reaching this point means the
        // table lost its root invariant.
        Err(VfsError::with_path(VfsErrorKind::Io, "mount", vpath))
    }

    pub fn mount_points(&self) -> Vec<String> {
        self.mounts
            .read()
            .iter()
            .map(|entry| entry.point.clone())
            .collect()
    }
}
