//! Symlink-aware path resolution.
//!
//! A symlink is stored as a regular file whose mode carries `S_IFLNK` and
//! whose body is the UTF-8 target path. Resolution walks from the leaf
//! toward the root, memoizing intermediate results in the per-operation
//! cache; symlink targets re-enter the mount table, so a link may legally
//! cross mounts.

use crate::cache::OpCache;
use crate::error::{VfsError, VfsErrorKind, VfsResult};
use crate::flags::OpenFlags;
use crate::mount::MountTable;
use crate::path;

/// Fully dereference `vpath` (normalized absolute).
///
/// POSIX-`realpath` compatible for unresolvable tails: `ENOENT` anywhere
/// during the walk yields the original input. Symlink cycles surface as
/// `ELOOP`; every other error propagates with caller-visible paths.
pub(crate) fn realpath(
    mounts: &MountTable,
    vpath: &str,
    cache: &mut OpCache,
) -> VfsResult<String> {
    match walk(mounts, vpath, cache) {
        Err(err) if err.kind() == VfsErrorKind::NotFound => Ok(vpath.to_owned()),
        other => other,
    }
}

fn walk(mounts: &MountTable, vpath: &str, cache: &mut OpCache) -> VfsResult<String> {
    if vpath == "/" {
        return Ok("/".to_owned());
    }
    if let Some(hit) = cache.realpath_hit(vpath) {
        return Ok(hit.to_owned());
    }
    if !cache.begin_visit(vpath) {
        return Err(VfsError::with_path(
            VfsErrorKind::TooManySymlinks,
            "realpath",
            vpath,
        ));
    }
    let resolved = walk_step(mounts, vpath, cache);
    cache.end_visit(vpath);
    if let Ok(real) = &resolved {
        cache.record_realpath(vpath, real);
    }
    resolved
}

fn walk_step(mounts: &MountTable, vpath: &str, cache: &mut OpCache) -> VfsResult<String> {
    let (dir, base) = path::split(vpath);
    let real_dir = walk(mounts, dir, cache)?;
    let lpath = path::join(&real_dir, base);

    let stats = match cache.stat_hit(&lpath) {
        Some(stats) => stats,
        None => {
            let mount = mounts.resolve(&lpath)?;
            let stats = mount
                .fs
                .stat(&mount.rel)
                .map_err(|err| err.rewritten(&[(mount.rel.as_str(), lpath.as_str())]))?;
            cache.record_stat(&lpath, stats);
            stats
        }
    };

    if !stats.is_symbolic_link() {
        return Ok(lpath);
    }

    let target = read_symlink_body(mounts, &lpath)?;
    let resolved = path::resolve(&real_dir, &target)?;
    walk(mounts, &resolved, cache)
}

/// Read a symlink's body as UTF-8, without following it.
pub(crate) fn read_symlink_body(mounts: &MountTable, lpath: &str) -> VfsResult<String> {
    let mount = mounts.resolve(lpath)?;
    let file = mount
        .fs
        .open_file(&mount.rel, OpenFlags::READ)
        .map_err(|err| err.rewritten(&[(mount.rel.as_str(), lpath)]))?;
    let body = (|| {
        let len = file.len()? as usize;
        let mut buf = vec![0u8; len];
        let read = file.read_at(0, &mut buf)?;
        buf.truncate(read);
        String::from_utf8(buf)
            .map_err(|_| VfsError::with_path(VfsErrorKind::InvalidInput, "readlink", lpath))
    })();
    let closed = file.close();
    let body = body?;
    closed?;
    Ok(body)
}
