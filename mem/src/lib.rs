//! Writable in-memory backend for keelfs.
//!
//! An inode tree of directories (child maps) and files (byte vectors).
//! Hard links share the file inode; symlinks are ordinary files carrying
//! `S_IFLNK`, written and resolved by the dispatch layer above.

mod fs;
mod inode;

use std::sync::Arc;

use keelfs_core::{
    Backend, BackendCaps, BackendFile, OpenFlags, SetMetadata, Stats, VfsError, VfsErrorKind,
    VfsResult,
};

pub use crate::fs::MemFs;
use crate::inode::MemInode;

impl Backend for MemFs {
    fn name(&self) -> &'static str {
        "mem"
    }

    fn capabilities(&self) -> BackendCaps {
        BackendCaps::WRITE
            | BackendCaps::HARDLINKS
            | BackendCaps::SET_METADATA
            | BackendCaps::SYNC_IO
    }

    fn stat(&self, path: &str) -> VfsResult<Stats> {
        Ok(self.lookup(path, "stat")?.stats())
    }

    fn open_file(&self, path: &str, _flags: OpenFlags) -> VfsResult<Arc<dyn BackendFile>> {
        let node = self.lookup(path, "open")?;
        Ok(Arc::new(MemFile { node }))
    }

    fn create_file(
        &self,
        path: &str,
        flags: OpenFlags,
        mode: u32,
    ) -> VfsResult<Arc<dyn BackendFile>> {
        let (parent, name) = self.lookup_parent(path, "open")?;
        let children = parent
            .children()
            .ok_or_else(|| VfsError::with_path(VfsErrorKind::NotDir, "open", path))?;
        let mut children = children.write().expect("lock");

        if let Some(existing) = children.get(&name) {
            if existing.is_dir() {
                return Err(VfsError::with_path(VfsErrorKind::IsDir, "open", path));
            }
            if flags.exclusive() {
                return Err(VfsError::with_path(
                    VfsErrorKind::AlreadyExists,
                    "open",
                    path,
                ));
            }
            if flags.truncating() {
                if let Some(data) = existing.data() {
                    data.write().expect("lock").clear();
                    existing.touch_mtime();
                }
            }
            return Ok(Arc::new(MemFile {
                node: existing.clone(),
            }));
        }

        let node = MemInode::new_file(self.alloc_ino(), mode);
        children.insert(name, node.clone());
        parent.touch_mtime();
        Ok(Arc::new(MemFile { node }))
    }

    fn mkdir(&self, path: &str, mode: u32) -> VfsResult<()> {
        let (parent, name) = self.lookup_parent(path, "mkdir")?;
        let children = parent
            .children()
            .ok_or_else(|| VfsError::with_path(VfsErrorKind::NotDir, "mkdir", path))?;
        let mut children = children.write().expect("lock");
        if children.contains_key(&name) {
            return Err(VfsError::with_path(
                VfsErrorKind::AlreadyExists,
                "mkdir",
                path,
            ));
        }
        children.insert(name, MemInode::new_dir(self.alloc_ino(), mode));
        parent.touch_mtime();
        Ok(())
    }

    fn rmdir(&self, path: &str) -> VfsResult<()> {
        let (parent, name) = self.lookup_parent(path, "rmdir")?;
        let children = parent
            .children()
            .ok_or_else(|| VfsError::with_path(VfsErrorKind::NotDir, "rmdir", path))?;
        let mut children = children.write().expect("lock");
        let entry = children
            .get(&name)
            .ok_or_else(|| VfsError::with_path(VfsErrorKind::NotFound, "rmdir", path))?;
        let entry_children = entry
            .children()
            .ok_or_else(|| VfsError::with_path(VfsErrorKind::NotDir, "rmdir", path))?;
        if !entry_children.read().expect("lock").is_empty() {
            return Err(VfsError::with_path(VfsErrorKind::NotEmpty, "rmdir", path));
        }
        children.remove(&name);
        parent.touch_mtime();
        Ok(())
    }

    fn unlink(&self, path: &str) -> VfsResult<()> {
        let (parent, name) = self.lookup_parent(path, "unlink")?;
        let children = parent
            .children()
            .ok_or_else(|| VfsError::with_path(VfsErrorKind::NotDir, "unlink", path))?;
        let mut children = children.write().expect("lock");
        let entry = children
            .get(&name)
            .ok_or_else(|| VfsError::with_path(VfsErrorKind::NotFound, "unlink", path))?;
        if entry.is_dir() {
            return Err(VfsError::with_path(VfsErrorKind::IsDir, "unlink", path));
        }
        children.remove(&name);
        parent.touch_mtime();
        Ok(())
    }

    fn rename(&self, from: &str, to: &str) -> VfsResult<()> {
        let (from_parent, from_name) = self.lookup_parent(from, "rename")?;
        let (to_parent, to_name) = self.lookup_parent(to, "rename")?;

        if Arc::ptr_eq(&from_parent, &to_parent) {
            let children = from_parent
                .children()
                .ok_or_else(|| VfsError::with_path(VfsErrorKind::NotDir, "rename", from))?;
            let mut children = children.write().expect("lock");
            let node = children
                .get(&from_name)
                .cloned()
                .ok_or_else(|| VfsError::with_path(VfsErrorKind::NotFound, "rename", from))?;
            if let Some(existing) = children.get(&to_name) {
                check_replace(&node, existing, to)?;
            }
            children.remove(&from_name);
            children.insert(to_name, node);
            from_parent.touch_mtime();
            return Ok(());
        }

        // Distinct parents: take the node out of the source first and put
        // it back if the destination rejects it.
        let src = from_parent
            .children()
            .ok_or_else(|| VfsError::with_path(VfsErrorKind::NotDir, "rename", from))?;
        let node = {
            let mut src = src.write().expect("lock");
            src.remove(&from_name)
                .ok_or_else(|| VfsError::with_path(VfsErrorKind::NotFound, "rename", from))?
        };
        let dst = match to_parent.children() {
            Some(dst) => dst,
            None => {
                src.write().expect("lock").insert(from_name, node);
                return Err(VfsError::with_path(VfsErrorKind::NotDir, "rename", to));
            }
        };
        {
            let mut dst = dst.write().expect("lock");
            if let Some(existing) = dst.get(&to_name) {
                if let Err(err) = check_replace(&node, existing, to) {
                    drop(dst);
                    src.write().expect("lock").insert(from_name, node);
                    return Err(err);
                }
            }
            dst.insert(to_name, node);
        }
        from_parent.touch_mtime();
        to_parent.touch_mtime();
        Ok(())
    }

    fn link(&self, target: &str, link: &str) -> VfsResult<()> {
        let node = self.lookup(target, "link")?;
        if node.is_dir() {
            return Err(VfsError::with_path(
                VfsErrorKind::NotPermitted,
                "link",
                target,
            ));
        }
        let (parent, name) = self.lookup_parent(link, "link")?;
        let children = parent
            .children()
            .ok_or_else(|| VfsError::with_path(VfsErrorKind::NotDir, "link", link))?;
        let mut children = children.write().expect("lock");
        if children.contains_key(&name) {
            return Err(VfsError::with_path(
                VfsErrorKind::AlreadyExists,
                "link",
                link,
            ));
        }
        children.insert(name, node);
        parent.touch_mtime();
        Ok(())
    }

    fn readdir(&self, path: &str) -> VfsResult<Vec<String>> {
        let node = self.lookup(path, "scandir")?;
        let children = node
            .children()
            .ok_or_else(|| VfsError::with_path(VfsErrorKind::NotDir, "scandir", path))?;
        let names = children.read().expect("lock").keys().cloned().collect();
        Ok(names)
    }

    fn set_metadata(&self, path: &str, set: SetMetadata) -> VfsResult<()> {
        self.lookup(path, "chmod")?.apply(set, "chmod")
    }
}

/// POSIX rename-over rules: a directory only replaces an empty directory,
/// and nothing but a directory replaces a directory.
fn check_replace(node: &Arc<MemInode>, existing: &Arc<MemInode>, to: &str) -> VfsResult<()> {
    if existing.is_dir() {
        if !node.is_dir() {
            return Err(VfsError::with_path(VfsErrorKind::IsDir, "rename", to));
        }
        let children = existing
            .children()
            .ok_or_else(|| VfsError::with_path(VfsErrorKind::NotDir, "rename", to))?;
        if !children.read().expect("lock").is_empty() {
            return Err(VfsError::with_path(VfsErrorKind::NotEmpty, "rename", to));
        }
    } else if node.is_dir() {
        return Err(VfsError::with_path(VfsErrorKind::NotDir, "rename", to));
    }
    Ok(())
}

#[derive(Debug)]
struct MemFile {
    node: Arc<MemInode>,
}

impl BackendFile for MemFile {
    fn stat(&self) -> VfsResult<Stats> {
        Ok(self.node.stats())
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> VfsResult<usize> {
        let data = self
            .node
            .data()
            .ok_or(VfsError::new(VfsErrorKind::IsDir, "read"))?;
        let data = data.read().expect("lock");
        let offset = offset as usize;
        if offset >= data.len() {
            return Ok(0);
        }
        let end = (offset + buf.len()).min(data.len());
        buf[..end - offset].copy_from_slice(&data[offset..end]);
        Ok(end - offset)
    }

    fn write_at(&self, offset: u64, buf: &[u8]) -> VfsResult<usize> {
        let data = self
            .node
            .data()
            .ok_or(VfsError::new(VfsErrorKind::IsDir, "write"))?;
        {
            let mut data = data.write().expect("lock");
            let offset = offset as usize;
            if offset + buf.len() > data.len() {
                data.resize(offset + buf.len(), 0);
            }
            data[offset..offset + buf.len()].copy_from_slice(buf);
        }
        self.node.touch_mtime();
        Ok(buf.len())
    }

    fn set_len(&self, len: u64) -> VfsResult<()> {
        self.node.apply(
            SetMetadata {
                size: Some(len),
                ..SetMetadata::default()
            },
            "ftruncate",
        )
    }

    fn set_metadata(&self, set: SetMetadata) -> VfsResult<()> {
        self.node.apply(set, "chmod")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keelfs_core::S_IFREG;
    use pretty_assertions::assert_eq;

    fn create(fs: &MemFs, path: &str, bytes: &[u8]) {
        let file = fs
            .create_file(path, OpenFlags::WRITE | OpenFlags::CREATE, 0o644)
            .expect("create");
        file.write_at(0, bytes).expect("write");
    }

    #[test]
    fn create_then_stat_and_read() {
        let fs = MemFs::new();
        create(&fs, "/a.txt", b"hello");

        let stats = fs.stat("/a.txt").expect("stat");
        assert_eq!(stats.size, 5);
        assert_eq!(stats.mode & !0o7777, S_IFREG);

        let file = fs.open_file("/a.txt", OpenFlags::READ).expect("open");
        let mut buf = [0u8; 8];
        let read = file.read_at(0, &mut buf).expect("read");
        assert_eq!(&buf[..read], b"hello");
    }

    #[test]
    fn lookup_through_file_is_notdir() {
        let fs = MemFs::new();
        create(&fs, "/a.txt", b"x");
        let err = fs.stat("/a.txt/inner").unwrap_err();
        assert_eq!(err.kind(), VfsErrorKind::NotDir);
    }

    #[test]
    fn exclusive_create_on_existing_fails() {
        let fs = MemFs::new();
        create(&fs, "/a.txt", b"x");
        let err = fs
            .create_file(
                "/a.txt",
                OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::EXCL,
                0o644,
            )
            .unwrap_err();
        assert_eq!(err.kind(), VfsErrorKind::AlreadyExists);
    }

    #[test]
    fn rmdir_refuses_non_empty() {
        let fs = MemFs::new();
        fs.mkdir("/d", 0o755).expect("mkdir");
        create(&fs, "/d/f", b"x");
        let err = fs.rmdir("/d").unwrap_err();
        assert_eq!(err.kind(), VfsErrorKind::NotEmpty);
        fs.unlink("/d/f").expect("unlink");
        fs.rmdir("/d").expect("rmdir");
        assert!(!fs.exists("/d"));
    }

    #[test]
    fn rename_moves_across_directories() {
        let fs = MemFs::new();
        fs.mkdir("/src", 0o755).expect("mkdir");
        fs.mkdir("/dst", 0o755).expect("mkdir");
        create(&fs, "/src/f", b"payload");

        fs.rename("/src/f", "/dst/g").expect("rename");
        assert!(!fs.exists("/src/f"));
        let stats = fs.stat("/dst/g").expect("stat");
        assert_eq!(stats.size, 7);
    }

    #[test]
    fn rename_over_non_empty_dir_fails_and_restores() {
        let fs = MemFs::new();
        fs.mkdir("/a", 0o755).expect("mkdir");
        fs.mkdir("/b", 0o755).expect("mkdir");
        fs.mkdir("/b/target", 0o755).expect("mkdir");
        create(&fs, "/b/target/keep", b"x");
        fs.mkdir("/a/dir", 0o755).expect("mkdir");

        let err = fs.rename("/a/dir", "/b/target").unwrap_err();
        assert_eq!(err.kind(), VfsErrorKind::NotEmpty);
        assert!(fs.exists("/a/dir"));
        assert!(fs.exists("/b/target/keep"));
    }

    #[test]
    fn hard_link_shares_content() {
        let fs = MemFs::new();
        create(&fs, "/a", b"one");
        fs.link("/a", "/b").expect("link");

        let file = fs.open_file("/b", OpenFlags::WRITE).expect("open");
        file.write_at(0, b"two").expect("write");

        let via_a = fs.open_file("/a", OpenFlags::READ).expect("open");
        let mut buf = [0u8; 3];
        via_a.read_at(0, &mut buf).expect("read");
        assert_eq!(&buf, b"two");

        assert_eq!(fs.stat("/a").expect("stat").ino, fs.stat("/b").expect("stat").ino);
    }

    #[test]
    fn link_to_directory_not_permitted() {
        let fs = MemFs::new();
        fs.mkdir("/d", 0o755).expect("mkdir");
        let err = fs.link("/d", "/e").unwrap_err();
        assert_eq!(err.kind(), VfsErrorKind::NotPermitted);
    }

    #[test]
    fn readdir_lists_sorted_names() {
        let fs = MemFs::new();
        create(&fs, "/b", b"");
        create(&fs, "/a", b"");
        fs.mkdir("/c", 0o755).expect("mkdir");
        assert_eq!(fs.readdir("/").expect("readdir"), vec!["a", "b", "c"]);
        let err = fs.readdir("/a").unwrap_err();
        assert_eq!(err.kind(), VfsErrorKind::NotDir);
    }
}
