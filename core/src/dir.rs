//! Directory entries and the `opendir` iterator.

use crate::stats::FileType;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    /// Entry name. Recursive listings use `/`-joined names relative to the
    /// listed directory.
    pub name: String,
    pub file_type: FileType,
}

impl DirEntry {
    pub fn is_file(&self) -> bool {
        self.file_type == FileType::Regular
    }

    pub fn is_directory(&self) -> bool {
        self.file_type == FileType::Directory
    }

    pub fn is_symbolic_link(&self) -> bool {
        self.file_type == FileType::Symlink
    }
}

/// Snapshot iterator over one directory, bound to the path it was opened
/// on.
#[derive(Debug)]
pub struct Dir {
    path: String,
    entries: std::vec::IntoIter<DirEntry>,
}

impl Dir {
    pub(crate) fn new(path: String, entries: Vec<DirEntry>) -> Self {
        Self {
            path,
            entries: entries.into_iter(),
        }
    }

    /// The caller-visible path this directory was opened on.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn read(&mut self) -> Option<DirEntry> {
        self.entries.next()
    }

    pub fn close(self) -> crate::error::VfsResult<()> {
        Ok(())
    }
}

impl Iterator for Dir {
    type Item = DirEntry;

    fn next(&mut self) -> Option<DirEntry> {
        self.read()
    }
}
