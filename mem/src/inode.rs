use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use keelfs_core::{
    SetMetadata, Stats, Timespec, VfsError, VfsErrorKind, VfsResult, S_IFDIR, S_IFREG,
};

#[derive(Debug, Clone)]
pub(crate) struct MemMetadata {
    pub(crate) mode: u32,
    pub(crate) uid: u32,
    pub(crate) gid: u32,
    pub(crate) atime: Timespec,
    pub(crate) mtime: Timespec,
    pub(crate) ctime: Timespec,
}

impl MemMetadata {
    fn new(mode: u32) -> Self {
        let now = Timespec::now();
        Self {
            mode,
            uid: 0,
            gid: 0,
            atime: now,
            mtime: now,
            ctime: now,
        }
    }
}

#[derive(Debug)]
pub(crate) enum MemInodeKind {
    File {
        data: RwLock<Vec<u8>>,
    },
    Dir {
        children: RwLock<BTreeMap<String, Arc<MemInode>>>,
    },
}

/// In-memory filesystem node. Symlinks are `File` nodes whose mode carries
/// `S_IFLNK`; the kind only distinguishes byte storage from child maps.
#[derive(Debug)]
pub(crate) struct MemInode {
    ino: u64,
    pub(crate) kind: MemInodeKind,
    pub(crate) meta: RwLock<MemMetadata>,
}

impl MemInode {
    pub(crate) fn new_root() -> Arc<Self> {
        Arc::new(Self {
            ino: 1,
            kind: MemInodeKind::Dir {
                children: RwLock::new(BTreeMap::new()),
            },
            meta: RwLock::new(MemMetadata::new(S_IFDIR | 0o777)),
        })
    }

    pub(crate) fn new_dir(ino: u64, mode: u32) -> Arc<Self> {
        Arc::new(Self {
            ino,
            kind: MemInodeKind::Dir {
                children: RwLock::new(BTreeMap::new()),
            },
            meta: RwLock::new(MemMetadata::new(S_IFDIR | (mode & 0o7777))),
        })
    }

    pub(crate) fn new_file(ino: u64, mode: u32) -> Arc<Self> {
        Arc::new(Self {
            ino,
            kind: MemInodeKind::File {
                data: RwLock::new(Vec::new()),
            },
            meta: RwLock::new(MemMetadata::new(S_IFREG | (mode & 0o7777))),
        })
    }

    pub(crate) fn is_dir(&self) -> bool {
        matches!(self.kind, MemInodeKind::Dir { .. })
    }

    pub(crate) fn children(
        &self,
    ) -> Option<&RwLock<BTreeMap<String, Arc<MemInode>>>> {
        match &self.kind {
            MemInodeKind::Dir { children } => Some(children),
            _ => None,
        }
    }

    pub(crate) fn data(&self) -> Option<&RwLock<Vec<u8>>> {
        match &self.kind {
            MemInodeKind::File { data } => Some(data),
            _ => None,
        }
    }

    pub(crate) fn stats(&self) -> Stats {
        let meta = self.meta.read().expect("lock");
        let size = match &self.kind {
            MemInodeKind::File { data } => data.read().expect("lock").len() as u64,
            MemInodeKind::Dir { .. } => 0,
        };
        Stats {
            ino: self.ino,
            mode: meta.mode,
            size,
            uid: meta.uid,
            gid: meta.gid,
            atime: meta.atime,
            mtime: meta.mtime,
            ctime: meta.ctime,
        }
    }

    pub(crate) fn touch_mtime(&self) {
        let mut meta = self.meta.write().expect("lock");
        let now = Timespec::now();
        meta.mtime = now;
        meta.ctime = now;
    }

    pub(crate) fn apply(&self, set: SetMetadata, syscall: &'static str) -> VfsResult<()> {
        {
            let mut meta = self.meta.write().expect("lock");
            if let Some(mode) = set.mode {
                meta.mode = mode;
            }
            if let Some(uid) = set.uid {
                meta.uid = uid;
            }
            if let Some(gid) = set.gid {
                meta.gid = gid;
            }
            if let Some(atime) = set.atime {
                meta.atime = atime;
            }
            if let Some(mtime) = set.mtime {
                meta.mtime = mtime;
            }
            if set.mode.is_some() || set.uid.is_some() || set.gid.is_some() {
                meta.ctime = Timespec::now();
            }
        }
        if let Some(size) = set.size {
            let data = self
                .data()
                .ok_or(VfsError::new(VfsErrorKind::InvalidInput, syscall))?;
            let mut data = data.write().expect("lock");
            let len = size as usize;
            if data.len() > len {
                data.truncate(len);
            } else {
                data.resize(len, 0);
            }
            self.touch_mtime();
        }
        Ok(())
    }
}
