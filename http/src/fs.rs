use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::{debug, warn};

use keelfs_core::{
    Backend, BackendCaps, BackendFile, OpenFlags, SetMetadata, Stats, Timespec, VfsError,
    VfsErrorKind, VfsResult, S_IFDIR, S_IFREG,
};

use crate::client::{HttpClient, HttpError};
use crate::config::HttpIndexConfig;

/// Lazily-populated body state of a listed file.
///
/// A file starts *listed* (size unknown, no bytes), becomes *sized* once a
/// `HEAD` learned its length, and *resident* once the body was fetched or
/// preloaded. [`HttpIndexFs::empty`] drops resident bodies back out of
/// memory while keeping the index.
#[derive(Debug, Default)]
struct FileState {
    size: Option<u64>,
    data: Option<Arc<Vec<u8>>>,
}

#[derive(Debug)]
enum IndexNodeKind {
    Dir {
        children: BTreeMap<String, Arc<IndexNode>>,
    },
    File {
        state: RwLock<FileState>,
    },
}

#[derive(Debug)]
struct IndexNode {
    ino: u64,
    kind: IndexNodeKind,
}

impl IndexNode {
    fn is_dir(&self) -> bool {
        matches!(self.kind, IndexNodeKind::Dir { .. })
    }
}

/// Read-only backend built from a JSON listing of paths, fetching file
/// bodies on demand from an HTTP(-like) origin and caching them in memory.
#[derive(Debug)]
pub struct HttpIndexFs {
    config: HttpIndexConfig,
    client: Arc<dyn HttpClient>,
    root: Arc<IndexNode>,
}

impl HttpIndexFs {
    /// Fetch and parse the listing, building the in-memory index tree.
    ///
    /// The listing is a nested object: directory names map to nested
    /// objects, file names to `null` (or any other leaf).
    pub fn new(config: HttpIndexConfig, client: Arc<dyn HttpClient>) -> VfsResult<Self> {
        debug!(url = %config.listing_url, "fetching index listing");
        let bytes = client
            .get(&config.listing_url)
            .map_err(|err| http_error("mount", &config.listing_url, err))?;
        let listing: Value = serde_json::from_slice(&bytes)
            .map_err(|_| VfsError::with_path(VfsErrorKind::InvalidInput, "mount", &config.listing_url))?;
        let Value::Object(entries) = listing else {
            return Err(VfsError::with_path(
                VfsErrorKind::InvalidInput,
                "mount",
                &config.listing_url,
            ));
        };

        let mut next_ino = 1;
        let root = Arc::new(IndexNode {
            ino: next_ino,
            kind: IndexNodeKind::Dir {
                children: build_children(&entries, &mut next_ino),
            },
        });
        Ok(Self {
            config,
            client,
            root,
        })
    }

    fn lookup(&self, rel: &str, syscall: &'static str) -> VfsResult<Arc<IndexNode>> {
        let mut node = self.root.clone();
        for component in rel.split('/').filter(|c| !c.is_empty()) {
            let next = match &node.kind {
                IndexNodeKind::Dir { children } => children.get(component).cloned(),
                IndexNodeKind::File { .. } => {
                    return Err(VfsError::with_path(VfsErrorKind::NotDir, syscall, rel));
                }
            };
            node = next
                .ok_or_else(|| VfsError::with_path(VfsErrorKind::NotFound, syscall, rel))?;
        }
        Ok(node)
    }

    /// Drop every resident file body, keeping the index (and learned
    /// sizes) intact.
    pub fn empty(&self) {
        fn drop_bodies(node: &IndexNode) {
            match &node.kind {
                IndexNodeKind::Dir { children } => {
                    for child in children.values() {
                        drop_bodies(child);
                    }
                }
                IndexNodeKind::File { state } => {
                    state.write().expect("lock").data = None;
                }
            }
        }
        drop_bodies(&self.root);
    }

    /// Make a file resident without touching the network.
    pub fn preload_file(&self, rel: &str, bytes: Vec<u8>) -> VfsResult<()> {
        let node = self.lookup(rel, "open")?;
        let state = match &node.kind {
            IndexNodeKind::File { state } => state,
            IndexNodeKind::Dir { .. } => {
                return Err(VfsError::with_path(VfsErrorKind::IsDir, "open", rel));
            }
        };
        let mut state = state.write().expect("lock");
        state.size = Some(bytes.len() as u64);
        state.data = Some(Arc::new(bytes));
        Ok(())
    }

    fn file_stats(&self, node: &IndexNode, size: u64) -> Stats {
        Stats {
            ino: node.ino,
            mode: S_IFREG | 0o444,
            size,
            uid: 0,
            gid: 0,
            atime: Timespec::EPOCH,
            mtime: Timespec::EPOCH,
            ctime: Timespec::EPOCH,
        }
    }

    fn read_only<T>(syscall: &'static str, path: &str) -> VfsResult<T> {
        Err(VfsError::with_path(
            VfsErrorKind::NotPermitted,
            syscall,
            path,
        ))
    }
}

fn build_children(
    entries: &serde_json::Map<String, Value>,
    next_ino: &mut u64,
) -> BTreeMap<String, Arc<IndexNode>> {
    let mut children = BTreeMap::new();
    for (name, value) in entries {
        *next_ino += 1;
        let kind = match value {
            Value::Object(nested) => IndexNodeKind::Dir {
                children: build_children(nested, next_ino),
            },
            // Files are listed as `null` (or any other leaf sentinel);
            // size stays unknown until the first stat.
            _ => IndexNodeKind::File {
                state: RwLock::new(FileState::default()),
            },
        };
        children.insert(
            name.clone(),
            Arc::new(IndexNode {
                ino: *next_ino,
                kind,
            }),
        );
    }
    children
}

fn http_error(syscall: &'static str, url: &str, err: HttpError) -> VfsError {
    warn!(url, error = %err, "http origin request failed");
    VfsError::with_path(VfsErrorKind::Io, syscall, url)
}

impl Backend for HttpIndexFs {
    fn name(&self) -> &'static str {
        "http-index"
    }

    fn capabilities(&self) -> BackendCaps {
        BackendCaps::SYNC_IO
    }

    fn stat(&self, path: &str) -> VfsResult<Stats> {
        let node = self.lookup(path, "stat")?;
        match &node.kind {
            IndexNodeKind::Dir { .. } => Ok(Stats {
                ino: node.ino,
                mode: S_IFDIR | 0o555,
                size: 0,
                uid: 0,
                gid: 0,
                atime: Timespec::EPOCH,
                mtime: Timespec::EPOCH,
                ctime: Timespec::EPOCH,
            }),
            IndexNodeKind::File { state } => {
                if let Some(size) = state.read().expect("lock").size {
                    return Ok(self.file_stats(&node, size));
                }
                let url = self.config.object_url(path);
                debug!(%url, "sizing file via HEAD");
                let size = self
                    .client
                    .head(&url)
                    .map_err(|err| http_error("stat", path, err))?;
                state.write().expect("lock").size = Some(size);
                Ok(self.file_stats(&node, size))
            }
        }
    }

    fn open_file(&self, path: &str, flags: OpenFlags) -> VfsResult<Arc<dyn BackendFile>> {
        let node = self.lookup(path, "open")?;
        // The write gate is the access mode; TRUNC alone falls through to
        // the exists check below.
        if flags.intersects(OpenFlags::WRITE | OpenFlags::APPEND) {
            return Self::read_only("open", path);
        }
        let state = match &node.kind {
            IndexNodeKind::Dir { .. } => {
                return Err(VfsError::with_path(VfsErrorKind::IsDir, "open", path));
            }
            IndexNodeKind::File { state } => state,
        };
        if flags.exclusive() || flags.truncating() {
            // The index says the file exists, so an exclusive or
            // truncating open can never succeed.
            return Err(VfsError::with_path(
                VfsErrorKind::AlreadyExists,
                "open",
                path,
            ));
        }

        if let Some(data) = state.read().expect("lock").data.clone() {
            return Ok(Arc::new(HttpFile {
                node: node.clone(),
                data,
            }));
        }

        let url = self.config.object_url(path);
        debug!(%url, "fetching file body");
        let bytes = self
            .client
            .get(&url)
            .map_err(|err| http_error("open", path, err))?;
        let data = Arc::new(bytes);
        {
            let mut state = state.write().expect("lock");
            state.size = Some(data.len() as u64);
            state.data = Some(data.clone());
        }
        Ok(Arc::new(HttpFile {
            node: node.clone(),
            data,
        }))
    }

    fn create_file(
        &self,
        path: &str,
        _flags: OpenFlags,
        _mode: u32,
    ) -> VfsResult<Arc<dyn BackendFile>> {
        Self::read_only("open", path)
    }

    fn mkdir(&self, path: &str, _mode: u32) -> VfsResult<()> {
        Self::read_only("mkdir", path)
    }

    fn rmdir(&self, path: &str) -> VfsResult<()> {
        Self::read_only("rmdir", path)
    }

    fn unlink(&self, path: &str) -> VfsResult<()> {
        Self::read_only("unlink", path)
    }

    fn rename(&self, from: &str, _to: &str) -> VfsResult<()> {
        Self::read_only("rename", from)
    }

    fn link(&self, target: &str, _link: &str) -> VfsResult<()> {
        Self::read_only("link", target)
    }

    fn readdir(&self, path: &str) -> VfsResult<Vec<String>> {
        let node = self.lookup(path, "scandir")?;
        match &node.kind {
            IndexNodeKind::Dir { children } => Ok(children.keys().cloned().collect()),
            IndexNodeKind::File { .. } => {
                Err(VfsError::with_path(VfsErrorKind::NotDir, "scandir", path))
            }
        }
    }

    fn set_metadata(&self, path: &str, _set: SetMetadata) -> VfsResult<()> {
        Self::read_only("chmod", path)
    }
}

/// Preloaded read handle: the body snapshot is pinned for the handle's
/// lifetime, so a concurrent [`HttpIndexFs::empty`] cannot pull it away.
#[derive(Debug)]
struct HttpFile {
    node: Arc<IndexNode>,
    data: Arc<Vec<u8>>,
}

impl BackendFile for HttpFile {
    fn stat(&self) -> VfsResult<Stats> {
        Ok(Stats {
            ino: self.node.ino,
            mode: S_IFREG | 0o444,
            size: self.data.len() as u64,
            uid: 0,
            gid: 0,
            atime: Timespec::EPOCH,
            mtime: Timespec::EPOCH,
            ctime: Timespec::EPOCH,
        })
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> VfsResult<usize> {
        let data = &self.data;
        let offset = offset as usize;
        if offset >= data.len() {
            return Ok(0);
        }
        let end = (offset + buf.len()).min(data.len());
        buf[..end - offset].copy_from_slice(&data[offset..end]);
        Ok(end - offset)
    }

    fn write_at(&self, _offset: u64, _buf: &[u8]) -> VfsResult<usize> {
        Err(VfsError::new(VfsErrorKind::NotPermitted, "write"))
    }

    fn set_len(&self, _len: u64) -> VfsResult<()> {
        Err(VfsError::new(VfsErrorKind::NotPermitted, "ftruncate"))
    }

    fn set_metadata(&self, _set: SetMetadata) -> VfsResult<()> {
        Err(VfsError::new(VfsErrorKind::NotPermitted, "chmod"))
    }
}
