use std::fmt;

/// Semantic failure modes of the VFS.
///
/// This is intentionally "errno-like": every variant maps to exactly one
/// POSIX errno so callers can translate in a single place.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VfsErrorKind {
    NotFound,         // ENOENT
    AlreadyExists,    // EEXIST
    IsDir,            // EISDIR
    NotDir,           // ENOTDIR
    NotEmpty,         // ENOTEMPTY
    PermissionDenied, // EACCES
    NotPermitted,     // EPERM
    InvalidInput,     // EINVAL
    BadFd,            // EBADF
    CrossDevice,      // EXDEV
    TooManySymlinks,  // ELOOP
    Io,               // EIO
}

impl VfsErrorKind {
    /// The POSIX errno symbol for this kind.
    pub fn errno_name(self) -> &'static str {
        match self {
            VfsErrorKind::NotFound => "ENOENT",
            VfsErrorKind::AlreadyExists => "EEXIST",
            VfsErrorKind::IsDir => "EISDIR",
            VfsErrorKind::NotDir => "ENOTDIR",
            VfsErrorKind::NotEmpty => "ENOTEMPTY",
            VfsErrorKind::PermissionDenied => "EACCES",
            VfsErrorKind::NotPermitted => "EPERM",
            VfsErrorKind::InvalidInput => "EINVAL",
            VfsErrorKind::BadFd => "EBADF",
            VfsErrorKind::CrossDevice => "EXDEV",
            VfsErrorKind::TooManySymlinks => "ELOOP",
            VfsErrorKind::Io => "EIO",
        }
    }

    fn description(self) -> &'static str {
        match self {
            VfsErrorKind::NotFound => "no such file or directory",
            VfsErrorKind::AlreadyExists => "file already exists",
            VfsErrorKind::IsDir => "illegal operation on a directory",
            VfsErrorKind::NotDir => "not a directory",
            VfsErrorKind::NotEmpty => "directory not empty",
            VfsErrorKind::PermissionDenied => "permission denied",
            VfsErrorKind::NotPermitted => "operation not permitted",
            VfsErrorKind::InvalidInput => "invalid argument",
            VfsErrorKind::BadFd => "bad file descriptor",
            VfsErrorKind::CrossDevice => "cross-device link not permitted",
            VfsErrorKind::TooManySymlinks => "too many symbolic links encountered",
            VfsErrorKind::Io => "i/o error",
        }
    }
}

/// Structured VFS error: errno kind, the syscall that failed, and the
/// affected path when one is known.
///
/// Backends raise these with backend-relative paths; the dispatch layer
/// rewrites them to caller-visible paths before they escape (see
/// [`VfsError::rewritten`]).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VfsError {
    kind: VfsErrorKind,
    syscall: &'static str,
    path: Option<String>,
}

impl VfsError {
    pub fn new(kind: VfsErrorKind, syscall: &'static str) -> Self {
        Self {
            kind,
            syscall,
            path: None,
        }
    }

    pub fn with_path(kind: VfsErrorKind, syscall: &'static str, path: impl Into<String>) -> Self {
        Self {
            kind,
            syscall,
            path: Some(path.into()),
        }
    }

    pub fn kind(&self) -> VfsErrorKind {
        self.kind
    }

    pub fn syscall(&self) -> &'static str {
        self.syscall
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Substitute backend-relative paths with the matching caller-visible
    /// path. `pairs` is `(backend_path, caller_path)`; a pathless error is
    /// pinned to the caller path when the call site only involves one.
    pub fn rewritten(mut self, pairs: &[(&str, &str)]) -> Self {
        match &self.path {
            Some(current) => {
                for (backend_path, caller_path) in pairs {
                    if current == backend_path {
                        self.path = Some((*caller_path).to_owned());
                        break;
                    }
                }
            }
            None => {
                if let [(_, caller_path)] = pairs {
                    self.path = Some((*caller_path).to_owned());
                }
            }
        }
        self
    }
}

impl fmt::Display for VfsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}, {}",
            self.kind.errno_name(),
            self.kind.description(),
            self.syscall
        )?;
        if let Some(path) = &self.path {
            write!(f, " '{path}'")?;
        }
        Ok(())
    }
}

impl std::error::Error for VfsError {}

pub type VfsResult<T> = Result<T, VfsError>;
