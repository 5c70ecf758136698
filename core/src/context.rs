/// Caller context threaded through every dispatch operation.
///
/// `root` is the base every path in the call resolves against (the
/// namespace root, not a cwd). `uid`/`gid` feed the access checks when the
/// VFS has them enabled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VfsContext {
    pub root: String,
    pub uid: u32,
    pub gid: u32,
}

impl Default for VfsContext {
    fn default() -> Self {
        Self {
            root: "/".to_owned(),
            uid: 0,
            gid: 0,
        }
    }
}

impl VfsContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, uid: u32, gid: u32) -> Self {
        self.uid = uid;
        self.gid = gid;
        self
    }

    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = root.into();
        self
    }
}
