//! File metadata, mode bits and access checks.

use crate::context::VfsContext;

pub const S_IFMT: u32 = 0o170000;
pub const S_IFSOCK: u32 = 0o140000;
pub const S_IFLNK: u32 = 0o120000;
pub const S_IFREG: u32 = 0o100000;
pub const S_IFBLK: u32 = 0o060000;
pub const S_IFDIR: u32 = 0o040000;
pub const S_IFCHR: u32 = 0o020000;
pub const S_IFIFO: u32 = 0o010000;

pub const F_OK: u32 = 0;
pub const X_OK: u32 = 1;
pub const W_OK: u32 = 2;
pub const R_OK: u32 = 4;

/// Seconds/nanoseconds since the Unix epoch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timespec {
    pub secs: i64,
    pub nanos: u32,
}

impl Timespec {
    pub const EPOCH: Timespec = Timespec { secs: 0, nanos: 0 };

    pub fn now() -> Self {
        match std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH) {
            Ok(elapsed) => Timespec {
                secs: elapsed.as_secs() as i64,
                nanos: elapsed.subsec_nanos(),
            },
            Err(_) => Timespec::EPOCH,
        }
    }
}

/// File type discriminant, derived from the `S_IFMT` bits of a mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FileType {
    Regular,
    Directory,
    Symlink,
    BlockDevice,
    CharDevice,
    Fifo,
    Socket,
    Unknown,
}

impl FileType {
    pub fn from_mode(mode: u32) -> Self {
        match mode & S_IFMT {
            S_IFREG => FileType::Regular,
            S_IFDIR => FileType::Directory,
            S_IFLNK => FileType::Symlink,
            S_IFBLK => FileType::BlockDevice,
            S_IFCHR => FileType::CharDevice,
            S_IFIFO => FileType::Fifo,
            S_IFSOCK => FileType::Socket,
            _ => FileType::Unknown,
        }
    }
}

/// Stat block for a filesystem object.
///
/// Inode numbers are synthesized by the owning backend and are only stable
/// for the lifetime of that backend instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stats {
    pub ino: u64,
    pub mode: u32,
    pub size: u64,
    pub uid: u32,
    pub gid: u32,
    pub atime: Timespec,
    pub mtime: Timespec,
    pub ctime: Timespec,
}

impl Stats {
    pub fn file_type(&self) -> FileType {
        FileType::from_mode(self.mode)
    }

    pub fn is_file(&self) -> bool {
        self.mode & S_IFMT == S_IFREG
    }

    pub fn is_directory(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }

    pub fn is_symbolic_link(&self) -> bool {
        self.mode & S_IFMT == S_IFLNK
    }

    pub fn is_block_device(&self) -> bool {
        self.mode & S_IFMT == S_IFBLK
    }

    pub fn is_character_device(&self) -> bool {
        self.mode & S_IFMT == S_IFCHR
    }

    pub fn is_fifo(&self) -> bool {
        self.mode & S_IFMT == S_IFIFO
    }

    pub fn is_socket(&self) -> bool {
        self.mode & S_IFMT == S_IFSOCK
    }

    /// Permission bits without the type discriminant.
    pub fn perms(&self) -> u32 {
        self.mode & 0o7777
    }
}

/// POSIX owner/group/other access check.
///
/// `want` is a bitwise OR of `R_OK`/`W_OK`/`X_OK` (`F_OK` always passes).
/// Uid 0 bypasses read/write checks; execute still requires at least one
/// execute bit on non-directories.
pub fn has_access(stats: &Stats, ctx: &VfsContext, want: u32) -> bool {
    if want & (R_OK | W_OK | X_OK) == 0 {
        return true;
    }
    if ctx.uid == 0 {
        if want & X_OK != 0 && !stats.is_directory() && stats.mode & 0o111 == 0 {
            return false;
        }
        return true;
    }
    let shift = if ctx.uid == stats.uid {
        6
    } else if ctx.gid == stats.gid {
        3
    } else {
        0
    };
    let granted = (stats.mode >> shift) & 0o7;
    granted & want == want
}
