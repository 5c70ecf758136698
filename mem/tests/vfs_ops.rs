//! Dispatch-surface behavior over the in-memory backend.

use std::sync::{Arc, Mutex};

use keelfs_core::{
    CopyFileFlags, CpOptions, EventSink, Fd, FileRef, FsEvent, FsEventKind, MkdirOptions,
    OpenFlags, ReadFileOptions, ReaddirOptions, RmOptions, SymlinkType, Vfs, VfsConfig,
    VfsContext, VfsErrorKind, WriteFileOptions,
};
use keelfs_mem::MemFs;
use pretty_assertions::assert_eq;

fn vfs() -> Vfs {
    Vfs::new(Arc::new(MemFs::new()))
}

fn ctx() -> VfsContext {
    VfsContext::new()
}

fn flags(s: &str) -> OpenFlags {
    OpenFlags::from_flag_str(s).expect("flags")
}

fn write(vfs: &Vfs, path: &str, data: &[u8]) {
    vfs.write_file(&ctx(), FileRef::Path(path), data, WriteFileOptions::default())
        .expect("write_file");
}

fn read(vfs: &Vfs, path: &str) -> Vec<u8> {
    vfs.read_file(&ctx(), FileRef::Path(path), ReadFileOptions::default())
        .expect("read_file")
}

struct Recorder(Mutex<Vec<FsEvent>>);

impl Recorder {
    fn new() -> Arc<Self> {
        Arc::new(Self(Mutex::new(Vec::new())))
    }

    fn take(&self) -> Vec<FsEvent> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

impl EventSink for Recorder {
    fn notify(&self, event: &FsEvent) {
        self.0.lock().unwrap().push(event.clone());
    }
}

fn event(kind: FsEventKind, path: &str) -> FsEvent {
    FsEvent {
        kind,
        path: path.to_owned(),
    }
}

#[test]
fn write_then_read_round_trips() {
    let vfs = vfs();
    write(&vfs, "/a.txt", b"payload");
    assert_eq!(read(&vfs, "/a.txt"), b"payload");
    assert_eq!(
        vfs.read_file_to_string(&ctx(), FileRef::Path("/a.txt"), ReadFileOptions::default())
            .expect("read string"),
        "payload"
    );
}

#[test]
fn zero_length_read_returns_empty() {
    let vfs = vfs();
    write(&vfs, "/empty", b"");
    assert_eq!(read(&vfs, "/empty"), b"");
}

#[test]
fn open_errors_match_posix() {
    let vfs = vfs();
    write(&vfs, "/a.txt", b"x");
    vfs.mkdir(&ctx(), "/d", MkdirOptions::default()).expect("mkdir");

    let err = vfs.open(&ctx(), "/a.txt", flags("wx"), 0o644).unwrap_err();
    assert_eq!(err.kind(), VfsErrorKind::AlreadyExists);

    let err = vfs.open(&ctx(), "/missing", flags("r"), 0o644).unwrap_err();
    assert_eq!(err.kind(), VfsErrorKind::NotFound);
    assert_eq!(err.path(), Some("/missing"));

    let err = vfs.open(&ctx(), "/d", flags("r"), 0o644).unwrap_err();
    assert_eq!(err.kind(), VfsErrorKind::IsDir);

    // O_RDWR without O_CREAT never creates.
    let err = vfs.open(&ctx(), "/nope", flags("r+"), 0o644).unwrap_err();
    assert_eq!(err.kind(), VfsErrorKind::NotFound);

    // Creating inside a missing parent fails, and through a file fails
    // with ENOTDIR.
    let err = vfs.open(&ctx(), "/no/dir/f", flags("w"), 0o644).unwrap_err();
    assert_eq!(err.kind(), VfsErrorKind::NotFound);
    let err = vfs.open(&ctx(), "/a.txt/f", flags("w"), 0o644).unwrap_err();
    assert_eq!(err.kind(), VfsErrorKind::NotDir);

    let err = OpenFlags::from_flag_str("rw").unwrap_err();
    assert_eq!(err.kind(), VfsErrorKind::InvalidInput);
}

#[test]
fn descriptors_are_smallest_unused_and_close_once() {
    let vfs = vfs();
    write(&vfs, "/a", b"");
    write(&vfs, "/b", b"");
    write(&vfs, "/c", b"");

    let fd1 = vfs.open(&ctx(), "/a", flags("r"), 0).expect("open");
    let fd2 = vfs.open(&ctx(), "/b", flags("r"), 0).expect("open");
    let fd3 = vfs.open(&ctx(), "/c", flags("r"), 0).expect("open");
    assert_eq!((fd1, fd2, fd3), (Fd(1), Fd(2), Fd(3)));

    vfs.close(fd2).expect("close");
    let reused = vfs.open(&ctx(), "/b", flags("r"), 0).expect("open");
    assert_eq!(reused, Fd(2));

    vfs.close(fd1).expect("close");
    let err = vfs.close(fd1).unwrap_err();
    assert_eq!(err.kind(), VfsErrorKind::BadFd);
    let err = vfs.fstat(Fd(99)).unwrap_err();
    assert_eq!(err.kind(), VfsErrorKind::BadFd);
}

#[test]
fn fstat_agrees_with_stat_right_after_open() {
    let vfs = vfs();
    write(&vfs, "/a.txt", b"hello world");
    let fd = vfs.open(&ctx(), "/a.txt", flags("r"), 0).expect("open");
    assert_eq!(
        vfs.fstat(fd).expect("fstat").size,
        vfs.stat(&ctx(), "/a.txt").expect("stat").size
    );
    vfs.close(fd).expect("close");
}

#[test]
fn append_starts_at_eof() {
    let vfs = vfs();
    write(&vfs, "/log", b"one");
    vfs.append_file(
        &ctx(),
        FileRef::Path("/log"),
        b"-two",
        Default::default(),
    )
    .expect("append");
    assert_eq!(read(&vfs, "/log"), b"one-two");

    let fd = vfs.open(&ctx(), "/log", flags("a"), 0o644).expect("open");
    let handle = vfs.fd_to_file(fd).expect("handle");
    assert_eq!(handle.position(), 7);
    vfs.close(fd).expect("close");
}

#[test]
fn writing_a_read_only_handle_is_denied() {
    let vfs = vfs();
    write(&vfs, "/a", b"x");
    let fd = vfs.open(&ctx(), "/a", flags("r"), 0).expect("open");
    let err = vfs.write(fd, b"y").unwrap_err();
    assert_eq!(err.kind(), VfsErrorKind::PermissionDenied);
    vfs.close(fd).expect("close");

    let err = vfs
        .write_file(
            &ctx(),
            FileRef::Path("/a"),
            b"y",
            WriteFileOptions {
                flags: flags("r"),
                mode: 0o644,
            },
        )
        .unwrap_err();
    assert_eq!(err.kind(), VfsErrorKind::InvalidInput);
}

#[test]
fn rename_within_a_backend() {
    let vfs = vfs();
    write(&vfs, "/a", b"data");
    vfs.rename(&ctx(), "/a", "/b").expect("rename");

    assert!(!vfs.exists(&ctx(), "/a"));
    assert!(vfs.exists(&ctx(), "/b"));
    let err = vfs.stat(&ctx(), "/a").unwrap_err();
    assert_eq!(err.kind(), VfsErrorKind::NotFound);
    assert_eq!(read(&vfs, "/b"), b"data");
}

#[test]
fn rename_emits_rename_then_change() {
    let vfs = vfs();
    write(&vfs, "/a", b"data");
    let recorder = Recorder::new();
    vfs.watch(recorder.clone());

    vfs.rename(&ctx(), "/a", "/b").expect("rename");
    assert_eq!(
        recorder.take(),
        vec![
            event(FsEventKind::Rename, "/a"),
            event(FsEventKind::Change, "/b"),
        ]
    );
}

#[test]
fn mkdir_recursive_creates_missing_ancestors() {
    let vfs = vfs();
    let recorder = Recorder::new();
    vfs.watch(recorder.clone());

    let first = vfs
        .mkdir(
            &ctx(),
            "/a/b/c",
            MkdirOptions {
                recursive: true,
                ..Default::default()
            },
        )
        .expect("mkdir");
    assert_eq!(first.as_deref(), Some("/a"));
    for dir in ["/a", "/a/b", "/a/b/c"] {
        assert!(vfs.stat(&ctx(), dir).expect("stat").is_directory());
    }
    assert_eq!(
        recorder.take(),
        vec![
            event(FsEventKind::Rename, "/a"),
            event(FsEventKind::Rename, "/a/b"),
            event(FsEventKind::Rename, "/a/b/c"),
        ]
    );

    // Partially-existing ancestry only creates what is missing.
    let first = vfs
        .mkdir(
            &ctx(),
            "/a/b/c/d/e",
            MkdirOptions {
                recursive: true,
                ..Default::default()
            },
        )
        .expect("mkdir");
    assert_eq!(first.as_deref(), Some("/a/b/c/d"));

    // Nothing missing: no creation, no value.
    let none = vfs
        .mkdir(
            &ctx(),
            "/a/b",
            MkdirOptions {
                recursive: true,
                ..Default::default()
            },
        )
        .expect("mkdir");
    assert_eq!(none, None);
}

#[test]
fn mkdir_non_recursive_needs_existing_parent() {
    let vfs = vfs();
    let err = vfs.mkdir(&ctx(), "/x/y", MkdirOptions::default()).unwrap_err();
    assert_eq!(err.kind(), VfsErrorKind::NotFound);

    vfs.mkdir(&ctx(), "/x", MkdirOptions::default()).expect("mkdir");
    let err = vfs.mkdir(&ctx(), "/x", MkdirOptions::default()).unwrap_err();
    assert_eq!(err.kind(), VfsErrorKind::AlreadyExists);
}

#[test]
fn readdir_reports_types_and_recurses() {
    let vfs = vfs();
    vfs.mkdir(
        &ctx(),
        "/top/nested",
        MkdirOptions {
            recursive: true,
            ..Default::default()
        },
    )
    .expect("mkdir");
    write(&vfs, "/top/file", b"x");
    write(&vfs, "/top/nested/deep", b"y");
    vfs.symlink(&ctx(), "/top/file", "/top/ln", SymlinkType::File)
        .expect("symlink");

    let entries = vfs
        .readdir(&ctx(), "/top", ReaddirOptions::default())
        .expect("readdir");
    let summary: Vec<(String, bool, bool)> = entries
        .iter()
        .map(|e| (e.name.clone(), e.is_directory(), e.is_symbolic_link()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("file".to_owned(), false, false),
            ("ln".to_owned(), false, true),
            ("nested".to_owned(), true, false),
        ]
    );

    let entries = vfs
        .readdir(&ctx(), "/top", ReaddirOptions { recursive: true })
        .expect("readdir");
    let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["file", "ln", "nested", "nested/deep"]);

    let err = vfs
        .readdir(&ctx(), "/top/file", ReaddirOptions::default())
        .unwrap_err();
    assert_eq!(err.kind(), VfsErrorKind::NotDir);
}

#[test]
fn rm_recursive_then_force() {
    let vfs = vfs();
    vfs.mkdir(&ctx(), "/d", MkdirOptions::default()).expect("mkdir");
    write(&vfs, "/d/b.txt", b"x");

    let err = vfs.rm(&ctx(), "/d", RmOptions::default()).unwrap_err();
    assert_eq!(err.kind(), VfsErrorKind::IsDir);

    vfs.rm(
        &ctx(),
        "/d",
        RmOptions {
            recursive: true,
            force: false,
        },
    )
    .expect("rm");
    assert!(!vfs.exists(&ctx(), "/d"));

    let err = vfs.rm(&ctx(), "/d", RmOptions::default()).unwrap_err();
    assert_eq!(err.kind(), VfsErrorKind::NotFound);

    vfs.rm(
        &ctx(),
        "/d",
        RmOptions {
            recursive: false,
            force: true,
        },
    )
    .expect("rm --force on missing path");
}

#[test]
fn symlink_round_trip() {
    let vfs = vfs();
    vfs.symlink(&ctx(), "/target", "/link", SymlinkType::File)
        .expect("symlink");

    assert_eq!(vfs.readlink(&ctx(), "/link").expect("readlink"), "/target");
    // The dangling link stats as itself: the body is the 7-byte target.
    assert_eq!(vfs.stat(&ctx(), "/link").expect("stat").size, 7);
    assert!(vfs.lstat(&ctx(), "/link").expect("lstat").is_symbolic_link());

    write(&vfs, "/target", b"hello");
    assert_eq!(vfs.stat(&ctx(), "/link").expect("stat").size, 5);
    assert_eq!(read(&vfs, "/link"), b"hello");
    assert_eq!(vfs.realpath(&ctx(), "/link").expect("realpath"), "/target");

    let err = vfs
        .symlink(&ctx(), "/other", "/link", SymlinkType::File)
        .unwrap_err();
    assert_eq!(err.kind(), VfsErrorKind::AlreadyExists);

    let err = vfs.readlink(&ctx(), "/target").unwrap_err();
    assert_eq!(err.kind(), VfsErrorKind::InvalidInput);
}

#[test]
fn symlinked_directories_resolve_mid_path() {
    let vfs = vfs();
    vfs.mkdir(&ctx(), "/dir", MkdirOptions::default()).expect("mkdir");
    write(&vfs, "/dir/f", b"inner");
    vfs.symlink(&ctx(), "/dir", "/ln", SymlinkType::Dir)
        .expect("symlink");

    assert_eq!(read(&vfs, "/ln/f"), b"inner");
    assert_eq!(vfs.realpath(&ctx(), "/ln/f").expect("realpath"), "/dir/f");
}

#[test]
fn symlink_cycles_surface_eloop() {
    let vfs = vfs();
    vfs.symlink(&ctx(), "/b", "/a", SymlinkType::File).expect("symlink");
    vfs.symlink(&ctx(), "/a", "/b", SymlinkType::File).expect("symlink");

    let err = vfs.stat(&ctx(), "/a").unwrap_err();
    assert_eq!(err.kind(), VfsErrorKind::TooManySymlinks);
    let err = vfs.realpath(&ctx(), "/b").unwrap_err();
    assert_eq!(err.kind(), VfsErrorKind::TooManySymlinks);
}

#[test]
fn realpath_is_idempotent() {
    let vfs = vfs();
    vfs.mkdir(&ctx(), "/dir", MkdirOptions::default()).expect("mkdir");
    write(&vfs, "/dir/f", b"x");
    vfs.symlink(&ctx(), "/dir", "/ln", SymlinkType::Dir)
        .expect("symlink");

    for path in ["/ln/f", "/dir/f", "/missing", "/ln"] {
        let once = vfs.realpath(&ctx(), path).expect("realpath");
        assert_eq!(vfs.realpath(&ctx(), &once).expect("realpath"), once);
    }
}

#[test]
fn truncate_validates_length() {
    let vfs = vfs();
    write(&vfs, "/f", b"hello");

    let err = vfs.truncate(&ctx(), "/f", -1).unwrap_err();
    assert_eq!(err.kind(), VfsErrorKind::InvalidInput);

    vfs.truncate(&ctx(), "/f", 2).expect("truncate");
    assert_eq!(read(&vfs, "/f"), b"he");

    let fd = vfs.open(&ctx(), "/f", flags("r+"), 0).expect("open");
    let err = vfs.ftruncate(fd, -3).unwrap_err();
    assert_eq!(err.kind(), VfsErrorKind::InvalidInput);
    vfs.ftruncate(fd, 0).expect("ftruncate");
    vfs.close(fd).expect("close");
    assert_eq!(read(&vfs, "/f"), b"");
}

#[test]
fn vectored_io_moves_the_cursor() {
    let vfs = vfs();
    write(&vfs, "/v", b"");
    let fd = vfs.open(&ctx(), "/v", flags("r+"), 0).expect("open");

    let written = vfs
        .writev(fd, &[b"abc", b"def"], None)
        .expect("writev");
    assert_eq!(written, 6);

    let mut one = [0u8; 2];
    let mut two = [0u8; 4];
    let read_bytes = vfs
        .readv(fd, &mut [&mut one, &mut two], Some(0))
        .expect("readv");
    assert_eq!(read_bytes, 6);
    assert_eq!(&one, b"ab");
    assert_eq!(&two, b"cdef");

    // Positional writev leaves the cursor where sequential writes put it.
    vfs.writev(fd, &[b"xy"], Some(0)).expect("writev");
    vfs.close(fd).expect("close");
    assert_eq!(read(&vfs, "/v"), b"xycdef");
}

#[test]
fn hard_links_stay_within_one_backend() {
    let vfs = vfs();
    write(&vfs, "/a", b"shared");
    vfs.link(&ctx(), "/a", "/b").expect("link");
    assert_eq!(
        vfs.stat(&ctx(), "/a").expect("stat").ino,
        vfs.stat(&ctx(), "/b").expect("stat").ino
    );

    vfs.mount("/other", Arc::new(MemFs::new())).expect("mount");
    let err = vfs.link(&ctx(), "/a", "/other/b").unwrap_err();
    assert_eq!(err.kind(), VfsErrorKind::CrossDevice);
}

#[test]
fn cross_backend_rename_degrades_to_copy_unlink() {
    let vfs = vfs();
    vfs.mount("/other", Arc::new(MemFs::new())).expect("mount");
    write(&vfs, "/f", b"moved");

    vfs.rename(&ctx(), "/f", "/other/g").expect("rename");
    assert!(!vfs.exists(&ctx(), "/f"));
    assert_eq!(read(&vfs, "/other/g"), b"moved");
}

#[test]
fn cp_recursive_honors_filter_and_timestamps() {
    let vfs = vfs();
    vfs.mkdir(
        &ctx(),
        "/src/sub",
        MkdirOptions {
            recursive: true,
            ..Default::default()
        },
    )
    .expect("mkdir");
    write(&vfs, "/src/keep.txt", b"keep");
    write(&vfs, "/src/skip.tmp", b"skip");
    write(&vfs, "/src/sub/inner", b"inner");

    let err = vfs
        .cp(&ctx(), "/src", "/dst", CpOptions::default())
        .unwrap_err();
    assert_eq!(err.kind(), VfsErrorKind::IsDir);

    let filter = |src: &str, _dst: &str| !src.ends_with(".tmp");
    vfs.cp(
        &ctx(),
        "/src",
        "/dst",
        CpOptions {
            recursive: true,
            preserve_timestamps: true,
            filter: Some(&filter),
            ..Default::default()
        },
    )
    .expect("cp");

    assert_eq!(read(&vfs, "/dst/keep.txt"), b"keep");
    assert_eq!(read(&vfs, "/dst/sub/inner"), b"inner");
    assert!(!vfs.exists(&ctx(), "/dst/skip.tmp"));
    assert_eq!(
        vfs.stat(&ctx(), "/dst/sub/inner").expect("stat").mtime,
        vfs.stat(&ctx(), "/src/sub/inner").expect("stat").mtime
    );

    let err = vfs
        .cp(
            &ctx(),
            "/src",
            "/dst",
            CpOptions {
                recursive: true,
                error_on_exist: true,
                ..Default::default()
            },
        )
        .unwrap_err();
    assert_eq!(err.kind(), VfsErrorKind::AlreadyExists);
}

#[test]
fn copy_file_excl_rejects_existing_destination() {
    let vfs = vfs();
    write(&vfs, "/a", b"one");
    write(&vfs, "/b", b"two");

    let err = vfs
        .copy_file(&ctx(), "/a", "/b", CopyFileFlags::EXCL)
        .unwrap_err();
    assert_eq!(err.kind(), VfsErrorKind::AlreadyExists);

    vfs.copy_file(&ctx(), "/a", "/b", CopyFileFlags::empty())
        .expect("copy_file");
    assert_eq!(read(&vfs, "/b"), b"one");
}

#[test]
fn mkdtemp_creates_unique_directories() {
    let vfs = vfs();
    vfs.mkdir(&ctx(), "/tmp", MkdirOptions::default()).expect("mkdir");

    let first = vfs.mkdtemp(&ctx(), "job-").expect("mkdtemp");
    let second = vfs.mkdtemp(&ctx(), "job-").expect("mkdtemp");
    assert!(first.starts_with("/tmp/job-"));
    assert_ne!(first, second);
    assert!(vfs.stat(&ctx(), &first).expect("stat").is_directory());
}

#[test]
fn statfs_reports_synthetic_geometry() {
    let vfs = vfs();
    assert_eq!(vfs.statfs(&ctx(), "/").expect("statfs").block_size, 4096);
}

#[test]
fn opendir_iterates_a_snapshot() {
    let vfs = vfs();
    vfs.mkdir(&ctx(), "/d", MkdirOptions::default()).expect("mkdir");
    write(&vfs, "/d/a", b"");
    write(&vfs, "/d/b", b"");

    let dir = vfs.opendir(&ctx(), "/d").expect("opendir");
    assert_eq!(dir.path(), "/d");
    let names: Vec<String> = dir.map(|entry| entry.name).collect();
    assert_eq!(names, vec!["a", "b"]);

    let err = vfs.opendir(&ctx(), "/d/a").unwrap_err();
    assert_eq!(err.kind(), VfsErrorKind::NotDir);
}

#[test]
fn fd_targets_share_the_dispatch_surface() {
    let vfs = vfs();
    write(&vfs, "/f", b"start");
    let fd = vfs.open(&ctx(), "/f", flags("r+"), 0).expect("open");

    vfs.write_file(&ctx(), FileRef::Fd(fd), b"next!", WriteFileOptions::default())
        .expect("write_file by fd");
    assert_eq!(
        vfs.read_file(&ctx(), FileRef::Fd(fd), ReadFileOptions::default())
            .expect("read_file by fd"),
        b"next!"
    );
    // The descriptor stays open and usable afterwards.
    vfs.close(fd).expect("close");
}

#[test]
fn access_checks_use_context_identity() {
    let vfs = Vfs::with_config(
        Arc::new(MemFs::new()),
        VfsConfig { check_access: true },
    );
    let root = ctx();
    let user = VfsContext::new().with_user(1000, 1000);

    write(&vfs, "/f", b"secret");
    vfs.chown(&root, "/f", 1000, 1000).expect("chown");
    vfs.chmod(&root, "/f", 0o400).expect("chmod");

    // Owner may read but not write.
    assert_eq!(
        vfs.read_file(&user, FileRef::Path("/f"), ReadFileOptions::default())
            .expect("read"),
        b"secret"
    );
    let err = vfs.open(&user, "/f", flags("r+"), 0).unwrap_err();
    assert_eq!(err.kind(), VfsErrorKind::PermissionDenied);

    // A third party may not even read.
    let outsider = VfsContext::new().with_user(2000, 2000);
    let err = vfs.open(&outsider, "/f", flags("r"), 0).unwrap_err();
    assert_eq!(err.kind(), VfsErrorKind::PermissionDenied);
}

#[test]
fn chmod_preserves_the_type_bits() {
    let vfs = vfs();
    write(&vfs, "/f", b"x");
    vfs.chmod(&ctx(), "/f", 0o600).expect("chmod");
    let stats = vfs.stat(&ctx(), "/f").expect("stat");
    assert!(stats.is_file());
    assert_eq!(stats.perms(), 0o600);
}

#[test]
fn lchmod_operates_on_the_link_itself() {
    let vfs = vfs();
    write(&vfs, "/target", b"x");
    vfs.symlink(&ctx(), "/target", "/ln", SymlinkType::File)
        .expect("symlink");

    vfs.lchmod(&ctx(), "/ln", 0o700).expect("lchmod");
    assert!(vfs.lstat(&ctx(), "/ln").expect("lstat").is_symbolic_link());
    assert_eq!(vfs.lstat(&ctx(), "/ln").expect("lstat").perms(), 0o700);
    // The target is untouched.
    assert_eq!(vfs.stat(&ctx(), "/target").expect("stat").perms(), 0o644);
}

#[test]
fn utimes_sets_both_timestamps() {
    let vfs = vfs();
    write(&vfs, "/f", b"x");
    let atime = keelfs_core::Timespec { secs: 100, nanos: 0 };
    let mtime = keelfs_core::Timespec { secs: 200, nanos: 0 };
    vfs.utimes(&ctx(), "/f", atime, mtime).expect("utimes");
    let stats = vfs.stat(&ctx(), "/f").expect("stat");
    assert_eq!((stats.atime, stats.mtime), (atime, mtime));
}

#[test]
fn write_and_unlink_emit_events_in_order() {
    let vfs = vfs();
    let recorder = Recorder::new();
    vfs.watch(recorder.clone());

    write(&vfs, "/watched", b"v1");
    vfs.unlink(&ctx(), "/watched").expect("unlink");
    assert_eq!(
        recorder.take(),
        vec![
            event(FsEventKind::Change, "/watched"),
            event(FsEventKind::Rename, "/watched"),
        ]
    );
}

#[test]
fn relative_paths_resolve_against_the_context_root() {
    let vfs = vfs();
    vfs.mkdir(&ctx(), "/jail", MkdirOptions::default()).expect("mkdir");
    let jailed = VfsContext::new().with_root("/jail");

    vfs.write_file(&jailed, FileRef::Path("f"), b"inside", WriteFileOptions::default())
        .expect("write_file");
    assert_eq!(read(&vfs, "/jail/f"), b"inside");
    assert_eq!(
        vfs.read_file(&jailed, FileRef::Path("/f"), ReadFileOptions::default())
            .expect("read_file"),
        b"inside"
    );
}

#[test]
fn mount_routing_rewrites_error_paths() {
    let vfs = vfs();
    vfs.mount("/data", Arc::new(MemFs::new())).expect("mount");

    write(&vfs, "/data/present", b"x");
    assert_eq!(read(&vfs, "/data/present"), b"x");

    // The backend saw "/missing"; the caller must see "/data/missing".
    let err = vfs.stat(&ctx(), "/data/missing").unwrap_err();
    assert_eq!(err.kind(), VfsErrorKind::NotFound);
    assert_eq!(err.path(), Some("/data/missing"));

    let err = vfs.unlink(&ctx(), "/data/missing").unwrap_err();
    assert_eq!(err.path(), Some("/data/missing"));
}
