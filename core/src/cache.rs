//! Per-operation memoization.
//!
//! One `OpCache` is constructed by each public dispatch entry point and
//! threaded by `&mut` into every sub-call, so nested work shares lookups
//! and the whole thing drops when the outermost frame returns. Nothing in
//! here survives across public calls.

use std::collections::{HashMap, HashSet};

use crate::stats::Stats;

#[derive(Debug, Default)]
pub(crate) struct OpCache {
    paths: HashMap<String, String>,
    stats: HashMap<String, Stats>,
    visiting: HashSet<String>,
}

impl OpCache {
    pub(crate) fn realpath_hit(&self, path: &str) -> Option<&str> {
        self.paths.get(path).map(String::as_str)
    }

    pub(crate) fn record_realpath(&mut self, path: &str, real: &str) {
        self.paths.insert(path.to_owned(), real.to_owned());
    }

    pub(crate) fn stat_hit(&self, path: &str) -> Option<Stats> {
        self.stats.get(path).copied()
    }

    pub(crate) fn record_stat(&mut self, path: &str, stats: Stats) {
        self.stats.insert(path.to_owned(), stats);
    }

    /// Mark `path` as being resolved. Returns `false` when the path is
    /// already on the resolution stack, i.e. a symlink cycle.
    pub(crate) fn begin_visit(&mut self, path: &str) -> bool {
        self.visiting.insert(path.to_owned())
    }

    pub(crate) fn end_visit(&mut self, path: &str) {
        self.visiting.remove(path);
    }
}
