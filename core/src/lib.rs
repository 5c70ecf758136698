//! keelfs core: a POSIX-style file API dispatched over pluggable backend
//! stores.
//!
//! Paths are routed through a longest-prefix mount table to a backend and a
//! backend-relative path; symlinks are regular files carrying `S_IFLNK` and
//! are resolved component-wise by the [`resolver`] with per-operation
//! memoization. Errors are errno-structured and always name caller-visible
//! paths.

pub mod backend;
mod cache;
pub mod context;
pub mod dir;
pub mod error;
pub mod events;
pub mod fd;
pub mod flags;
pub mod handle;
pub mod mount;
pub mod path;
mod resolver;
pub mod stats;
mod vfs;

pub use backend::{Backend, BackendCaps, BackendFile, SetMetadata, StatFs};
pub use context::VfsContext;
pub use dir::{Dir, DirEntry};
pub use error::{VfsError, VfsErrorKind, VfsResult};
pub use events::{ChannelSink, EventSink, FsEvent, FsEventKind};
pub use fd::{Fd, FdTable};
pub use flags::OpenFlags;
pub use handle::FileHandle;
pub use mount::{MountTable, ResolvedMount};
pub use stats::{has_access, FileType, Stats, Timespec};
pub use stats::{F_OK, R_OK, W_OK, X_OK};
pub use stats::{S_IFBLK, S_IFCHR, S_IFDIR, S_IFIFO, S_IFLNK, S_IFMT, S_IFREG, S_IFSOCK};
pub use vfs::{
    AppendFileOptions, CopyFileFlags, CpOptions, FileRef, MkdirOptions, ReadFileOptions,
    ReaddirOptions, RmOptions, SymlinkType, Vfs, VfsConfig, WriteFileOptions,
};
