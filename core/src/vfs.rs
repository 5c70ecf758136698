//! `Vfs` service object and the dispatch surface.
//!
//! Every operation normalizes its paths against the caller context, routes
//! them through the mount table, optionally dereferences symlinks, invokes
//! the backend, and on the way out rewrites backend-relative paths in
//! errors and emits change notifications. Handles acquired inside an
//! operation are released on every exit path.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bitflags::bitflags;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::trace;

use crate::backend::{Backend, SetMetadata, StatFs};
use crate::cache::OpCache;
use crate::context::VfsContext;
use crate::dir::{Dir, DirEntry};
use crate::error::{VfsError, VfsErrorKind, VfsResult};
use crate::events::{EventBus, EventSink, FsEventKind};
use crate::fd::{Fd, FdTable};
use crate::flags::OpenFlags;
use crate::handle::FileHandle;
use crate::mount::{MountTable, ResolvedMount};
use crate::path;
use crate::resolver;
use crate::stats::{FileType, Stats, S_IFLNK, S_IFMT, R_OK, W_OK};

/// Global dispatch configuration.
#[derive(Clone, Copy, Debug, Default)]
pub struct VfsConfig {
    /// Gate for the uid/gid access checks. Off by default; everything else
    /// (existence, type and flag validation) is always enforced.
    pub check_access: bool,
}

/// A dispatch target that is either a path or an already-open descriptor.
#[derive(Clone, Copy, Debug)]
pub enum FileRef<'a> {
    Path(&'a str),
    Fd(Fd),
}

#[derive(Clone, Copy, Debug)]
pub struct ReadFileOptions {
    pub flags: OpenFlags,
}

impl Default for ReadFileOptions {
    fn default() -> Self {
        Self {
            flags: OpenFlags::READ,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct WriteFileOptions {
    pub flags: OpenFlags,
    pub mode: u32,
}

impl Default for WriteFileOptions {
    fn default() -> Self {
        Self {
            flags: OpenFlags::READ
                .union(OpenFlags::WRITE)
                .union(OpenFlags::CREATE)
                .union(OpenFlags::TRUNC),
            mode: 0o644,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct AppendFileOptions {
    pub flags: OpenFlags,
    pub mode: u32,
}

impl Default for AppendFileOptions {
    fn default() -> Self {
        Self {
            flags: OpenFlags::WRITE
                .union(OpenFlags::APPEND)
                .union(OpenFlags::CREATE),
            mode: 0o644,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct MkdirOptions {
    pub mode: u32,
    pub recursive: bool,
}

impl Default for MkdirOptions {
    fn default() -> Self {
        Self {
            mode: 0o777,
            recursive: false,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ReaddirOptions {
    pub recursive: bool,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RmOptions {
    pub recursive: bool,
    pub force: bool,
}

/// Options for [`Vfs::cp`]. The filter decides per `(src, dst)` pair
/// whether an entry is copied; directories it rejects are skipped whole.
#[derive(Clone, Copy, Default)]
pub struct CpOptions<'a> {
    pub recursive: bool,
    pub error_on_exist: bool,
    pub preserve_timestamps: bool,
    pub filter: Option<&'a dyn Fn(&str, &str) -> bool>,
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct CopyFileFlags: u32 {
        /// Fail with `EEXIST` when the destination already exists.
        const EXCL = 1 << 0;
    }
}

/// Symlink flavor, kept for API compatibility; the stored representation
/// is identical for all three.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SymlinkType {
    #[default]
    File,
    Dir,
    Junction,
}

pub struct Vfs {
    mounts: MountTable,
    fds: FdTable,
    events: EventBus,
    config: VfsConfig,
}

impl Vfs {
    pub fn new(root: Arc<dyn Backend>) -> Self {
        Self::with_config(root, VfsConfig::default())
    }

    pub fn with_config(root: Arc<dyn Backend>, config: VfsConfig) -> Self {
        Self {
            mounts: MountTable::new(root),
            fds: FdTable::new(),
            events: EventBus::default(),
            config,
        }
    }

    pub fn config(&self) -> VfsConfig {
        self.config
    }

    pub fn mount(&self, point: &str, backend: Arc<dyn Backend>) -> VfsResult<()> {
        self.mounts.mount(point, backend)
    }

    pub fn unmount(&self, point: &str) -> VfsResult<Arc<dyn Backend>> {
        self.mounts.unmount(point)
    }

    pub fn mount_points(&self) -> Vec<String> {
        self.mounts.mount_points()
    }

    /// Register a change-notification sink.
    pub fn watch(&self, sink: Arc<dyn EventSink>) {
        self.events.subscribe(sink);
    }

    // ---- path plumbing -------------------------------------------------

    fn abs(&self, ctx: &VfsContext, input: &str) -> VfsResult<String> {
        if input.is_empty() {
            return Err(VfsError::new(VfsErrorKind::InvalidInput, "normalize"));
        }
        if ctx.root == "/" {
            path::normalize(input)
        } else {
            path::normalize(&format!("{}/{}", ctx.root, input))
        }
    }

    /// Stat a caller-visible path without following a final symlink,
    /// memoizing through the per-op cache.
    fn stat_cached(&self, vpath: &str, cache: &mut OpCache) -> VfsResult<Stats> {
        if let Some(stats) = cache.stat_hit(vpath) {
            return Ok(stats);
        }
        let mount = self.mounts.resolve(vpath)?;
        let stats = mount
            .fs
            .stat(&mount.rel)
            .map_err(|err| err.rewritten(&[(mount.rel.as_str(), vpath)]))?;
        cache.record_stat(vpath, stats);
        Ok(stats)
    }

    fn check_access(
        &self,
        ctx: &VfsContext,
        stats: &Stats,
        want: u32,
        syscall: &'static str,
        vpath: &str,
    ) -> VfsResult<()> {
        if !self.config.check_access {
            return Ok(());
        }
        if crate::stats::has_access(stats, ctx, want) {
            Ok(())
        } else {
            Err(VfsError::with_path(
                VfsErrorKind::PermissionDenied,
                syscall,
                vpath,
            ))
        }
    }

    fn resolve_mount(&self, vpath: &str) -> VfsResult<ResolvedMount> {
        self.mounts.resolve(vpath)
    }

    // ---- open / close --------------------------------------------------

    /// Open `vpath` (already canonical) into a handle.
    fn open_handle(
        &self,
        ctx: &VfsContext,
        vpath: &str,
        flags: OpenFlags,
        mode: u32,
        follow: bool,
        dir_ok: bool,
        cache: &mut OpCache,
    ) -> VfsResult<Arc<FileHandle>> {
        let vpath = vpath.to_owned();
        let vpath = if follow {
            resolver::realpath(&self.mounts, &vpath, cache)?
        } else {
            vpath
        };
        let mount = self.resolve_mount(&vpath)?;

        let file = match self.stat_cached(&vpath, cache) {
            Err(err) if err.kind() == VfsErrorKind::NotFound => {
                // Creation path. `r+` never creates: O_RDWR without
                // O_CREAT fails on a missing file.
                if flags.must_exist() || !flags.writable() {
                    return Err(err);
                }
                let parent = path::dirname(&vpath);
                let parent_stats = self.stat_cached(parent, cache)?;
                if !parent_stats.is_directory() {
                    return Err(VfsError::with_path(VfsErrorKind::NotDir, "open", parent));
                }
                self.check_access(ctx, &parent_stats, W_OK, "open", parent)?;
                mount
                    .fs
                    .create_file(&mount.rel, flags, mode)
                    .map_err(|err| err.rewritten(&[(mount.rel.as_str(), vpath.as_str())]))?
            }
            Ok(stats) => {
                if flags.exclusive() {
                    return Err(VfsError::with_path(
                        VfsErrorKind::AlreadyExists,
                        "open",
                        vpath,
                    ));
                }
                if stats.is_directory() && !dir_ok {
                    return Err(VfsError::with_path(VfsErrorKind::IsDir, "open", vpath));
                }
                self.check_access(ctx, &stats, flags.access_mode(), "open", &vpath)?;
                let file = mount
                    .fs
                    .open_file(&mount.rel, flags)
                    .map_err(|err| err.rewritten(&[(mount.rel.as_str(), vpath.as_str())]))?;
                if flags.truncating() {
                    file.set_len(0)
                        .map_err(|err| err.rewritten(&[(mount.rel.as_str(), vpath.as_str())]))?;
                }
                file
            }
            Err(err) => return Err(err),
        };

        Ok(Arc::new(FileHandle::new(vpath, flags, file)?))
    }

    /// Open a file and bind it to a descriptor, following symlinks.
    pub fn open(
        &self,
        ctx: &VfsContext,
        path: &str,
        flags: OpenFlags,
        mode: u32,
    ) -> VfsResult<Fd> {
        self.open_with(ctx, path, flags, mode, true)
    }

    /// [`Vfs::open`] with explicit control over final-symlink resolution.
    pub fn open_with(
        &self,
        ctx: &VfsContext,
        path: &str,
        flags: OpenFlags,
        mode: u32,
        resolve_symlinks: bool,
    ) -> VfsResult<Fd> {
        let mut cache = OpCache::default();
        let vpath = self.abs(ctx, path)?;
        let handle =
            self.open_handle(ctx, &vpath, flags, mode, resolve_symlinks, false, &mut cache)?;
        Ok(self.fds.insert(handle))
    }

    /// Bind an already-open handle to a descriptor.
    pub fn file_to_fd(&self, handle: Arc<FileHandle>) -> Fd {
        self.fds.insert(handle)
    }

    pub fn fd_to_file(&self, fd: Fd) -> VfsResult<Arc<FileHandle>> {
        self.fds.get(fd)
    }

    /// Close a descriptor. Fails with `EBADF` when the descriptor is
    /// retired or was never issued, and keeps the entry when the backend
    /// close itself fails.
    pub fn close(&self, fd: Fd) -> VfsResult<()> {
        let handle = self.fds.get(fd)?;
        handle.close()?;
        self.fds.remove(fd)?;
        Ok(())
    }

    // ---- descriptor I/O ------------------------------------------------

    pub fn read(&self, fd: Fd, buf: &mut [u8]) -> VfsResult<usize> {
        self.fds.get(fd)?.read(buf)
    }

    pub fn write(&self, fd: Fd, buf: &[u8]) -> VfsResult<usize> {
        let handle = self.fds.get(fd)?;
        let written = handle.write(buf)?;
        self.events.emit(FsEventKind::Change, handle.path());
        Ok(written)
    }

    /// Scatter read. With an explicit `position` the cursor is left alone;
    /// otherwise each buffer advances it.
    pub fn readv(
        &self,
        fd: Fd,
        bufs: &mut [&mut [u8]],
        position: Option<u64>,
    ) -> VfsResult<usize> {
        let handle = self.fds.get(fd)?;
        let mut total = 0;
        match position {
            Some(mut offset) => {
                for buf in bufs.iter_mut() {
                    let read = handle.read_at(offset, buf)?;
                    total += read;
                    offset += read as u64;
                    if read < buf.len() {
                        break;
                    }
                }
            }
            None => {
                for buf in bufs.iter_mut() {
                    let read = handle.read(buf)?;
                    total += read;
                    if read < buf.len() {
                        break;
                    }
                }
            }
        }
        Ok(total)
    }

    /// Gather write. Mirrors [`Vfs::readv`] position semantics.
    pub fn writev(&self, fd: Fd, bufs: &[&[u8]], position: Option<u64>) -> VfsResult<usize> {
        let handle = self.fds.get(fd)?;
        let mut total = 0;
        match position {
            Some(mut offset) => {
                for buf in bufs {
                    let written = handle.write_at(offset, buf)?;
                    total += written;
                    offset += written as u64;
                }
            }
            None => {
                for buf in bufs {
                    total += handle.write(buf)?;
                }
            }
        }
        self.events.emit(FsEventKind::Change, handle.path());
        Ok(total)
    }

    pub fn fsync(&self, fd: Fd) -> VfsResult<()> {
        self.fds.get(fd)?.sync()
    }

    pub fn fdatasync(&self, fd: Fd) -> VfsResult<()> {
        self.fds.get(fd)?.datasync()
    }

    // ---- whole-file convenience ---------------------------------------

    /// Run `op` against `target` (paths already canonical), opening (and
    /// always closing) a scratch handle for path targets. Descriptor
    /// targets stay open: their lifetime belongs to the caller.
    fn with_file<T>(
        &self,
        ctx: &VfsContext,
        target: FileRef<'_>,
        flags: OpenFlags,
        mode: u32,
        cache: &mut OpCache,
        op: impl FnOnce(&FileHandle) -> VfsResult<T>,
    ) -> VfsResult<T> {
        match target {
            FileRef::Fd(fd) => {
                let handle = self.fds.get(fd)?;
                op(&handle)
            }
            FileRef::Path(vpath) => {
                let handle = self.open_handle(ctx, vpath, flags, mode, true, false, cache)?;
                let result = op(&handle);
                let closed = handle.close();
                let value = result?;
                closed?;
                Ok(value)
            }
        }
    }

    pub fn read_file(
        &self,
        ctx: &VfsContext,
        target: FileRef<'_>,
        opts: ReadFileOptions,
    ) -> VfsResult<Vec<u8>> {
        let mut cache = OpCache::default();
        match target {
            FileRef::Path(p) => {
                let vpath = self.abs(ctx, p)?;
                self.read_file_with(ctx, FileRef::Path(&vpath), opts, &mut cache)
            }
            FileRef::Fd(_) => self.read_file_with(ctx, target, opts, &mut cache),
        }
    }

    fn read_file_with(
        &self,
        ctx: &VfsContext,
        target: FileRef<'_>,
        opts: ReadFileOptions,
        cache: &mut OpCache,
    ) -> VfsResult<Vec<u8>> {
        if !opts.flags.readable() {
            return Err(VfsError::new(VfsErrorKind::InvalidInput, "read"));
        }
        self.with_file(ctx, target, opts.flags, 0o666, cache, |handle| {
            let stats = handle.stat()?;
            let mut buf = vec![0u8; stats.size as usize];
            let read = handle.read_at(0, &mut buf)?;
            buf.truncate(read);
            Ok(buf)
        })
    }

    /// [`Vfs::read_file`] decoded as UTF-8.
    pub fn read_file_to_string(
        &self,
        ctx: &VfsContext,
        target: FileRef<'_>,
        opts: ReadFileOptions,
    ) -> VfsResult<String> {
        let bytes = self.read_file(ctx, target, opts)?;
        String::from_utf8(bytes).map_err(|_| match target {
            FileRef::Path(p) => VfsError::with_path(VfsErrorKind::InvalidInput, "read", p),
            FileRef::Fd(_) => VfsError::new(VfsErrorKind::InvalidInput, "read"),
        })
    }

    pub fn write_file(
        &self,
        ctx: &VfsContext,
        target: FileRef<'_>,
        data: &[u8],
        opts: WriteFileOptions,
    ) -> VfsResult<()> {
        let mut cache = OpCache::default();
        match target {
            FileRef::Path(p) => {
                let vpath = self.abs(ctx, p)?;
                self.write_file_with(ctx, FileRef::Path(&vpath), data, opts, &mut cache)
            }
            FileRef::Fd(_) => self.write_file_with(ctx, target, data, opts, &mut cache),
        }
    }

    fn write_file_with(
        &self,
        ctx: &VfsContext,
        target: FileRef<'_>,
        data: &[u8],
        opts: WriteFileOptions,
        cache: &mut OpCache,
    ) -> VfsResult<()> {
        if !opts.flags.writable() {
            return Err(VfsError::new(VfsErrorKind::InvalidInput, "write"));
        }
        let path = self.with_file(ctx, target, opts.flags, opts.mode, cache, |handle| {
            handle.write_at(0, data)?;
            Ok(handle.path().to_owned())
        })?;
        self.events.emit(FsEventKind::Change, &path);
        Ok(())
    }

    /// Like [`Vfs::write_file`] but writes at the handle position, which
    /// append-opened handles hold at EOF.
    pub fn append_file(
        &self,
        ctx: &VfsContext,
        target: FileRef<'_>,
        data: &[u8],
        opts: AppendFileOptions,
    ) -> VfsResult<()> {
        if !opts.flags.appendable() {
            return Err(VfsError::new(VfsErrorKind::InvalidInput, "write"));
        }
        let mut cache = OpCache::default();
        let storage;
        let target = match target {
            FileRef::Path(p) => {
                storage = self.abs(ctx, p)?;
                FileRef::Path(storage.as_str())
            }
            FileRef::Fd(_) => target,
        };
        let path = self.with_file(ctx, target, opts.flags, opts.mode, &mut cache, |handle| {
            handle.write(data)?;
            Ok(handle.path().to_owned())
        })?;
        self.events.emit(FsEventKind::Change, &path);
        Ok(())
    }

    // ---- namespace mutation -------------------------------------------

    pub fn rename(&self, ctx: &VfsContext, old: &str, new: &str) -> VfsResult<()> {
        let mut cache = OpCache::default();
        let vold = self.abs(ctx, old)?;
        let vnew = self.abs(ctx, new)?;

        let old_parent = path::dirname(&vold);
        let parent_stats = self.stat_cached(old_parent, &mut cache)?;
        self.check_access(ctx, &parent_stats, W_OK, "rename", old_parent)?;

        let m_old = self.resolve_mount(&vold)?;
        let m_new = self.resolve_mount(&vnew)?;
        if Arc::ptr_eq(&m_old.fs, &m_new.fs) {
            m_old.fs.rename(&m_old.rel, &m_new.rel).map_err(|err| {
                err.rewritten(&[
                    (m_old.rel.as_str(), vold.as_str()),
                    (m_new.rel.as_str(), vnew.as_str()),
                ])
            })?;
            self.events.emit(FsEventKind::Rename, &vold);
            self.events.emit(FsEventKind::Change, &vnew);
            return Ok(());
        }

        // Crossing a mount boundary: degrade to copy + unlink.
        trace!(from = %vold, to = %vnew, "cross-backend rename");
        let bytes = self.read_file_with(
            ctx,
            FileRef::Path(&vold),
            ReadFileOptions::default(),
            &mut cache,
        )?;
        self.write_file_with(
            ctx,
            FileRef::Path(&vnew),
            &bytes,
            WriteFileOptions::default(),
            &mut cache,
        )?;
        self.unlink_with(ctx, &vold, &mut cache)
    }

    pub fn unlink(&self, ctx: &VfsContext, path: &str) -> VfsResult<()> {
        let mut cache = OpCache::default();
        let vpath = self.abs(ctx, path)?;
        self.unlink_with(ctx, &vpath, &mut cache)
    }

    fn unlink_with(&self, ctx: &VfsContext, vpath: &str, cache: &mut OpCache) -> VfsResult<()> {
        let parent = path::dirname(vpath);
        let parent_stats = self.stat_cached(parent, cache)?;
        self.check_access(ctx, &parent_stats, W_OK, "unlink", parent)?;
        let mount = self.resolve_mount(vpath)?;
        mount
            .fs
            .unlink(&mount.rel)
            .map_err(|err| err.rewritten(&[(mount.rel.as_str(), vpath)]))?;
        self.events.emit(FsEventKind::Rename, vpath);
        Ok(())
    }

    pub fn rmdir(&self, ctx: &VfsContext, path: &str) -> VfsResult<()> {
        let mut cache = OpCache::default();
        let vpath = self.abs(ctx, path)?;
        self.rmdir_with(ctx, &vpath, &mut cache)
    }

    fn rmdir_with(&self, ctx: &VfsContext, vpath: &str, cache: &mut OpCache) -> VfsResult<()> {
        let stats = self.stat_cached(vpath, cache)?;
        if !stats.is_directory() {
            return Err(VfsError::with_path(VfsErrorKind::NotDir, "rmdir", vpath));
        }
        let parent = path::dirname(vpath);
        let parent_stats = self.stat_cached(parent, cache)?;
        self.check_access(ctx, &parent_stats, W_OK, "rmdir", parent)?;
        let mount = self.resolve_mount(vpath)?;
        mount
            .fs
            .rmdir(&mount.rel)
            .map_err(|err| err.rewritten(&[(mount.rel.as_str(), vpath)]))?;
        self.events.emit(FsEventKind::Rename, vpath);
        Ok(())
    }

    /// Create a directory. The recursive form returns the caller-visible
    /// path of the first directory it actually created.
    pub fn mkdir(
        &self,
        ctx: &VfsContext,
        path: &str,
        opts: MkdirOptions,
    ) -> VfsResult<Option<String>> {
        let mut cache = OpCache::default();
        let vpath = self.abs(ctx, path)?;
        self.mkdir_with(ctx, &vpath, opts, &mut cache)
    }

    fn mkdir_with(
        &self,
        ctx: &VfsContext,
        vpath: &str,
        opts: MkdirOptions,
        cache: &mut OpCache,
    ) -> VfsResult<Option<String>> {
        if !opts.recursive {
            let parent = path::dirname(vpath);
            let parent_stats = self.stat_cached(parent, cache)?;
            if !parent_stats.is_directory() {
                return Err(VfsError::with_path(VfsErrorKind::NotDir, "mkdir", parent));
            }
            self.check_access(ctx, &parent_stats, W_OK, "mkdir", parent)?;
            let mount = self.resolve_mount(vpath)?;
            mount
                .fs
                .mkdir(&mount.rel, opts.mode)
                .map_err(|err| err.rewritten(&[(mount.rel.as_str(), vpath)]))?;
            self.events.emit(FsEventKind::Rename, vpath);
            return Ok(None);
        }

        // Walk upward collecting the missing ancestors, then create them
        // top-down.
        let mut missing: Vec<String> = Vec::new();
        let mut cursor = vpath.to_owned();
        loop {
            match self.stat_cached(&cursor, cache) {
                Ok(stats) => {
                    if !stats.is_directory() {
                        return Err(VfsError::with_path(VfsErrorKind::NotDir, "mkdir", cursor));
                    }
                    self.check_access(ctx, &stats, W_OK, "mkdir", &cursor)?;
                    break;
                }
                Err(err) if err.kind() == VfsErrorKind::NotFound => {
                    missing.push(cursor.clone());
                    if cursor == "/" {
                        break;
                    }
                    cursor = path::dirname(&cursor).to_owned();
                }
                Err(err) => return Err(err),
            }
        }

        let mut first_created = None;
        for dir in missing.iter().rev() {
            let mount = self.resolve_mount(dir)?;
            mount
                .fs
                .mkdir(&mount.rel, opts.mode)
                .map_err(|err| err.rewritten(&[(mount.rel.as_str(), dir.as_str())]))?;
            self.events.emit(FsEventKind::Rename, dir);
            if first_created.is_none() {
                first_created = Some(dir.clone());
            }
        }
        Ok(first_created)
    }

    // ---- directory reads -----------------------------------------------

    pub fn readdir(
        &self,
        ctx: &VfsContext,
        path: &str,
        opts: ReaddirOptions,
    ) -> VfsResult<Vec<DirEntry>> {
        let mut cache = OpCache::default();
        let vpath = self.abs(ctx, path)?;
        let vpath = resolver::realpath(&self.mounts, &vpath, &mut cache)?;
        self.readdir_with(ctx, &vpath, opts.recursive, &mut cache)
    }

    fn readdir_with(
        &self,
        ctx: &VfsContext,
        vpath: &str,
        recursive: bool,
        cache: &mut OpCache,
    ) -> VfsResult<Vec<DirEntry>> {
        let stats = self.stat_cached(vpath, cache)?;
        if !stats.is_directory() {
            return Err(VfsError::with_path(VfsErrorKind::NotDir, "scandir", vpath));
        }
        self.check_access(ctx, &stats, R_OK, "scandir", vpath)?;

        let mount = self.resolve_mount(vpath)?;
        let mut names = mount
            .fs
            .readdir(&mount.rel)
            .map_err(|err| err.rewritten(&[(mount.rel.as_str(), vpath)]))?;
        names.sort();

        let mut entries = Vec::with_capacity(names.len());
        for name in names {
            let child = path::join(vpath, &name);
            let child_stats = self.stat_cached(&child, cache)?;
            let file_type = child_stats.file_type();
            entries.push(DirEntry {
                name: name.clone(),
                file_type,
            });
            if recursive && file_type == FileType::Directory {
                for sub in self.readdir_with(ctx, &child, true, cache)? {
                    entries.push(DirEntry {
                        name: format!("{name}/{}", sub.name),
                        file_type: sub.file_type,
                    });
                }
            }
        }
        Ok(entries)
    }

    pub fn opendir(&self, ctx: &VfsContext, path: &str) -> VfsResult<Dir> {
        let mut cache = OpCache::default();
        let vpath = self.abs(ctx, path)?;
        let vpath = resolver::realpath(&self.mounts, &vpath, &mut cache)?;
        let entries = self.readdir_with(ctx, &vpath, false, &mut cache)?;
        Ok(Dir::new(vpath, entries))
    }

    // ---- stats ----------------------------------------------------------

    pub fn stat(&self, ctx: &VfsContext, path: &str) -> VfsResult<Stats> {
        let mut cache = OpCache::default();
        let vpath = self.abs(ctx, path)?;
        let vpath = resolver::realpath(&self.mounts, &vpath, &mut cache)?;
        self.stat_cached(&vpath, &mut cache)
    }

    pub fn lstat(&self, ctx: &VfsContext, path: &str) -> VfsResult<Stats> {
        let mut cache = OpCache::default();
        let vpath = self.abs(ctx, path)?;
        self.stat_cached(&vpath, &mut cache)
    }

    pub fn fstat(&self, fd: Fd) -> VfsResult<Stats> {
        self.fds.get(fd)?.stat()
    }

    pub fn exists(&self, ctx: &VfsContext, path: &str) -> bool {
        self.stat(ctx, path).is_ok()
    }

    pub fn realpath(&self, ctx: &VfsContext, path: &str) -> VfsResult<String> {
        let mut cache = OpCache::default();
        let vpath = self.abs(ctx, path)?;
        resolver::realpath(&self.mounts, &vpath, &mut cache)
    }

    pub fn statfs(&self, ctx: &VfsContext, path: &str) -> VfsResult<StatFs> {
        let vpath = self.abs(ctx, path)?;
        let mount = self.resolve_mount(&vpath)?;
        mount.fs.statfs()
    }

    // ---- links -----------------------------------------------------------

    /// Hard link. Both paths must land on the same backend; a symlink may
    /// cross mounts, a hard link may not.
    pub fn link(&self, ctx: &VfsContext, target: &str, link_path: &str) -> VfsResult<()> {
        let mut cache = OpCache::default();
        let vtarget = self.abs(ctx, target)?;
        let vlink = self.abs(ctx, link_path)?;

        let m_target = self.resolve_mount(&vtarget)?;
        let m_link = self.resolve_mount(&vlink)?;
        if !Arc::ptr_eq(&m_target.fs, &m_link.fs) {
            return Err(VfsError::with_path(
                VfsErrorKind::CrossDevice,
                "link",
                vlink,
            ));
        }

        let target_stats = self.stat_cached(&vtarget, &mut cache)?;
        self.check_access(ctx, &target_stats, R_OK, "link", &vtarget)?;
        let link_parent = path::dirname(&vlink);
        let parent_stats = self.stat_cached(link_parent, &mut cache)?;
        self.check_access(ctx, &parent_stats, W_OK, "link", link_parent)?;

        m_target.fs.link(&m_target.rel, &m_link.rel).map_err(|err| {
            err.rewritten(&[
                (m_target.rel.as_str(), vtarget.as_str()),
                (m_link.rel.as_str(), vlink.as_str()),
            ])
        })
    }

    /// Create a symlink: the target is stored verbatim as the body of a
    /// regular file whose mode is then switched to `S_IFLNK`.
    pub fn symlink(
        &self,
        ctx: &VfsContext,
        target: &str,
        link_path: &str,
        _kind: SymlinkType,
    ) -> VfsResult<()> {
        let mut cache = OpCache::default();
        let vlink = self.abs(ctx, link_path)?;
        if self.stat_cached(&vlink, &mut cache).is_ok() {
            return Err(VfsError::with_path(
                VfsErrorKind::AlreadyExists,
                "symlink",
                vlink,
            ));
        }
        let parent = path::dirname(&vlink);
        let parent_stats = self.stat_cached(parent, &mut cache)?;
        self.check_access(ctx, &parent_stats, W_OK, "symlink", parent)?;

        let mount = self.resolve_mount(&vlink)?;
        let rewrite =
            |err: VfsError| err.rewritten(&[(mount.rel.as_str(), vlink.as_str())]);
        let file = mount
            .fs
            .create_file(
                &mount.rel,
                OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::EXCL,
                0o644,
            )
            .map_err(rewrite)?;
        let written = (|| {
            file.write_at(0, target.as_bytes())?;
            file.set_metadata(SetMetadata {
                mode: Some(S_IFLNK | 0o777),
                ..SetMetadata::default()
            })
        })();
        let closed = file.close();
        written.map_err(rewrite)?;
        closed.map_err(rewrite)?;
        self.events.emit(FsEventKind::Rename, &vlink);
        Ok(())
    }

    /// Read a symlink target without following it.
    pub fn readlink(&self, ctx: &VfsContext, path: &str) -> VfsResult<String> {
        let mut cache = OpCache::default();
        let vpath = self.abs(ctx, path)?;
        let stats = self.stat_cached(&vpath, &mut cache)?;
        if !stats.is_symbolic_link() {
            return Err(VfsError::with_path(
                VfsErrorKind::InvalidInput,
                "readlink",
                vpath,
            ));
        }
        resolver::read_symlink_body(&self.mounts, &vpath)
    }

    // ---- metadata --------------------------------------------------------

    fn metadata_op(
        &self,
        ctx: &VfsContext,
        path: &str,
        follow: bool,
        op: impl FnOnce(&FileHandle) -> VfsResult<()>,
    ) -> VfsResult<()> {
        let mut cache = OpCache::default();
        let vpath = self.abs(ctx, path)?;
        let flags = OpenFlags::READ | OpenFlags::WRITE;
        let handle = self.open_handle(ctx, &vpath, flags, 0o666, follow, true, &mut cache)?;
        let result = op(&handle);
        let closed = handle.close();
        result?;
        closed
    }

    fn apply_chmod(handle: &FileHandle, mode: u32) -> VfsResult<()> {
        // Permission-bit update: the node keeps its type discriminant.
        let stats = handle.stat()?;
        handle.set_metadata(SetMetadata {
            mode: Some((stats.mode & S_IFMT) | (mode & !S_IFMT)),
            ..SetMetadata::default()
        })
    }

    pub fn chmod(&self, ctx: &VfsContext, path: &str, mode: u32) -> VfsResult<()> {
        self.metadata_op(ctx, path, true, |handle| Self::apply_chmod(handle, mode))
    }

    pub fn lchmod(&self, ctx: &VfsContext, path: &str, mode: u32) -> VfsResult<()> {
        self.metadata_op(ctx, path, false, |handle| Self::apply_chmod(handle, mode))
    }

    pub fn fchmod(&self, fd: Fd, mode: u32) -> VfsResult<()> {
        let handle = self.fds.get(fd)?;
        Self::apply_chmod(&handle, mode)
    }

    pub fn chown(&self, ctx: &VfsContext, path: &str, uid: u32, gid: u32) -> VfsResult<()> {
        self.metadata_op(ctx, path, true, |handle| {
            handle.set_metadata(SetMetadata {
                uid: Some(uid),
                gid: Some(gid),
                ..SetMetadata::default()
            })
        })
    }

    pub fn lchown(&self, ctx: &VfsContext, path: &str, uid: u32, gid: u32) -> VfsResult<()> {
        self.metadata_op(ctx, path, false, |handle| {
            handle.set_metadata(SetMetadata {
                uid: Some(uid),
                gid: Some(gid),
                ..SetMetadata::default()
            })
        })
    }

    pub fn fchown(&self, fd: Fd, uid: u32, gid: u32) -> VfsResult<()> {
        self.fds.get(fd)?.set_metadata(SetMetadata {
            uid: Some(uid),
            gid: Some(gid),
            ..SetMetadata::default()
        })
    }

    pub fn utimes(
        &self,
        ctx: &VfsContext,
        path: &str,
        atime: crate::stats::Timespec,
        mtime: crate::stats::Timespec,
    ) -> VfsResult<()> {
        self.metadata_op(ctx, path, true, |handle| {
            handle.set_metadata(SetMetadata {
                atime: Some(atime),
                mtime: Some(mtime),
                ..SetMetadata::default()
            })
        })
    }

    pub fn lutimes(
        &self,
        ctx: &VfsContext,
        path: &str,
        atime: crate::stats::Timespec,
        mtime: crate::stats::Timespec,
    ) -> VfsResult<()> {
        self.metadata_op(ctx, path, false, |handle| {
            handle.set_metadata(SetMetadata {
                atime: Some(atime),
                mtime: Some(mtime),
                ..SetMetadata::default()
            })
        })
    }

    pub fn futimes(
        &self,
        fd: Fd,
        atime: crate::stats::Timespec,
        mtime: crate::stats::Timespec,
    ) -> VfsResult<()> {
        self.fds.get(fd)?.set_metadata(SetMetadata {
            atime: Some(atime),
            mtime: Some(mtime),
            ..SetMetadata::default()
        })
    }

    // ---- truncation ------------------------------------------------------

    pub fn truncate(&self, ctx: &VfsContext, path: &str, len: i64) -> VfsResult<()> {
        if len < 0 {
            return Err(VfsError::with_path(
                VfsErrorKind::InvalidInput,
                "truncate",
                path,
            ));
        }
        let mut cache = OpCache::default();
        let canonical = self.abs(ctx, path)?;
        let vpath = self.with_file(
            ctx,
            FileRef::Path(&canonical),
            OpenFlags::READ | OpenFlags::WRITE,
            0o666,
            &mut cache,
            |handle| {
                handle.truncate(len as u64)?;
                Ok(handle.path().to_owned())
            },
        )?;
        self.events.emit(FsEventKind::Change, &vpath);
        Ok(())
    }

    pub fn ftruncate(&self, fd: Fd, len: i64) -> VfsResult<()> {
        if len < 0 {
            return Err(VfsError::new(VfsErrorKind::InvalidInput, "ftruncate"));
        }
        let handle = self.fds.get(fd)?;
        handle.truncate(len as u64)?;
        self.events.emit(FsEventKind::Change, handle.path());
        Ok(())
    }

    // ---- removal ---------------------------------------------------------

    pub fn rm(&self, ctx: &VfsContext, path: &str, opts: RmOptions) -> VfsResult<()> {
        let mut cache = OpCache::default();
        let vpath = self.abs(ctx, path)?;
        self.rm_with(ctx, &vpath, opts, &mut cache)
    }

    fn rm_with(
        &self,
        ctx: &VfsContext,
        vpath: &str,
        opts: RmOptions,
        cache: &mut OpCache,
    ) -> VfsResult<()> {
        let stats = match self.stat_cached(vpath, cache) {
            Ok(stats) => stats,
            Err(err) if err.kind() == VfsErrorKind::NotFound && opts.force => return Ok(()),
            Err(err) => return Err(err),
        };
        match stats.file_type() {
            FileType::Directory => {
                if !opts.recursive {
                    return Err(VfsError::with_path(VfsErrorKind::IsDir, "rm", vpath));
                }
                for entry in self.readdir_with(ctx, vpath, false, cache)? {
                    self.rm_with(ctx, &path::join(vpath, &entry.name), opts, cache)?;
                }
                self.rmdir_with(ctx, vpath, cache)
            }
            FileType::Regular
            | FileType::Symlink
            | FileType::BlockDevice
            | FileType::CharDevice => self.unlink_with(ctx, vpath, cache),
            FileType::Fifo | FileType::Socket | FileType::Unknown => Err(VfsError::with_path(
                VfsErrorKind::NotPermitted,
                "rm",
                vpath,
            )),
        }
    }

    // ---- copying ---------------------------------------------------------

    pub fn copy_file(
        &self,
        ctx: &VfsContext,
        src: &str,
        dst: &str,
        flags: CopyFileFlags,
    ) -> VfsResult<()> {
        let mut cache = OpCache::default();
        let vsrc = self.abs(ctx, src)?;
        let vdst = self.abs(ctx, dst)?;
        self.copy_file_with(ctx, &vsrc, &vdst, flags, &mut cache)
    }

    fn copy_file_with(
        &self,
        ctx: &VfsContext,
        vsrc: &str,
        vdst: &str,
        flags: CopyFileFlags,
        cache: &mut OpCache,
    ) -> VfsResult<()> {
        if flags.contains(CopyFileFlags::EXCL) && self.exists_with(vdst, cache)? {
            return Err(VfsError::with_path(
                VfsErrorKind::AlreadyExists,
                "copyfile",
                vdst,
            ));
        }
        let bytes = self.read_file_with(
            ctx,
            FileRef::Path(vsrc),
            ReadFileOptions::default(),
            cache,
        )?;
        self.write_file_with(
            ctx,
            FileRef::Path(vdst),
            &bytes,
            WriteFileOptions::default(),
            cache,
        )?;
        self.events.emit(FsEventKind::Rename, vdst);
        Ok(())
    }

    fn exists_with(&self, vpath: &str, cache: &mut OpCache) -> VfsResult<bool> {
        match self.stat_cached(vpath, cache) {
            Ok(_) => Ok(true),
            Err(err) if err.kind() == VfsErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }

    pub fn cp(
        &self,
        ctx: &VfsContext,
        src: &str,
        dst: &str,
        opts: CpOptions<'_>,
    ) -> VfsResult<()> {
        let mut cache = OpCache::default();
        let vsrc = self.abs(ctx, src)?;
        let vdst = self.abs(ctx, dst)?;
        self.cp_with(ctx, &vsrc, &vdst, &opts, &mut cache)
    }

    fn cp_with(
        &self,
        ctx: &VfsContext,
        vsrc: &str,
        vdst: &str,
        opts: &CpOptions<'_>,
        cache: &mut OpCache,
    ) -> VfsResult<()> {
        if let Some(filter) = opts.filter {
            if !filter(vsrc, vdst) {
                return Ok(());
            }
        }
        let stats = self.stat_cached(vsrc, cache)?;
        if opts.error_on_exist && self.exists_with(vdst, cache)? {
            return Err(VfsError::with_path(
                VfsErrorKind::AlreadyExists,
                "cp",
                vdst,
            ));
        }
        match stats.file_type() {
            FileType::Directory => {
                if !opts.recursive {
                    return Err(VfsError::with_path(VfsErrorKind::IsDir, "cp", vsrc));
                }
                self.mkdir_with(
                    ctx,
                    vdst,
                    MkdirOptions {
                        mode: stats.perms(),
                        recursive: true,
                    },
                    cache,
                )?;
                for entry in self.readdir_with(ctx, vsrc, false, cache)? {
                    self.cp_with(
                        ctx,
                        &path::join(vsrc, &entry.name),
                        &path::join(vdst, &entry.name),
                        opts,
                        cache,
                    )?;
                }
            }
            FileType::Regular | FileType::Symlink => {
                self.copy_file_with(ctx, vsrc, vdst, CopyFileFlags::empty(), cache)?;
            }
            _ => {
                return Err(VfsError::with_path(VfsErrorKind::NotPermitted, "cp", vsrc));
            }
        }
        if opts.preserve_timestamps {
            let mount = self.resolve_mount(vdst)?;
            mount
                .fs
                .set_metadata(
                    &mount.rel,
                    SetMetadata {
                        atime: Some(stats.atime),
                        mtime: Some(stats.mtime),
                        ..SetMetadata::default()
                    },
                )
                .map_err(|err| err.rewritten(&[(mount.rel.as_str(), vdst)]))?;
        }
        Ok(())
    }

    // ---- temp dirs -------------------------------------------------------

    /// Create a uniquely named directory under `/tmp`.
    pub fn mkdtemp(&self, ctx: &VfsContext, prefix: &str) -> VfsResult<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or(0);
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(6)
            .map(char::from)
            .collect();
        let path = format!("/tmp/{prefix}{now}{suffix}");
        self.mkdir(
            ctx,
            &path,
            MkdirOptions {
                mode: 0o700,
                recursive: false,
            },
        )?;
        Ok(path)
    }
}
