//! Canonical POSIX path handling.
//!
//! Every path crossing the dispatch boundary is normalized first: absolute,
//! forward-slash separated, no `.`/`..` components, no trailing slash except
//! for the root itself. Backends only ever see paths in this form.

use crate::error::{VfsError, VfsErrorKind, VfsResult};

/// Normalize `input` into absolute canonical form.
///
/// Relative input is interpreted as rooted. `..` clamps at the root, per
/// POSIX path resolution. Empty input is rejected.
pub fn normalize(input: &str) -> VfsResult<String> {
    if input.is_empty() {
        return Err(VfsError::new(VfsErrorKind::InvalidInput, "normalize"));
    }
    let mut parts: Vec<&str> = Vec::new();
    for component in input.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            name => parts.push(name),
        }
    }
    if parts.is_empty() {
        Ok("/".to_owned())
    } else {
        Ok(format!("/{}", parts.join("/")))
    }
}

/// Parent directory of a normalized absolute path. The root is its own
/// parent.
pub fn dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}

/// Split a normalized absolute path into `(dir, base)`. The root splits
/// into `("/", "")`.
pub fn split(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(idx) => {
            let dir = if idx == 0 { "/" } else { &path[..idx] };
            (dir, &path[idx + 1..])
        }
        None => ("/", path),
    }
}

/// Append one component to a normalized absolute base.
pub fn join(base: &str, name: &str) -> String {
    if name.is_empty() {
        return base.to_owned();
    }
    if base == "/" {
        format!("/{name}")
    } else {
        format!("{base}/{name}")
    }
}

/// Resolve `rel` against `base`: absolute `rel` stands alone, anything else
/// is interpreted relative to `base`. The result is normalized.
pub fn resolve(base: &str, rel: &str) -> VfsResult<String> {
    if rel.is_empty() {
        return Err(VfsError::new(VfsErrorKind::InvalidInput, "resolve"));
    }
    if rel.starts_with('/') {
        normalize(rel)
    } else {
        normalize(&format!("{base}/{rel}"))
    }
}

/// Whether `point` is a path prefix of `path`, component-wise.
pub fn is_prefix(point: &str, path: &str) -> bool {
    if point == "/" {
        return true;
    }
    match path.strip_prefix(point) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
