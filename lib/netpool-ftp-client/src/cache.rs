/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::num::NonZeroUsize;

use foldhash::fast::FixedState;
use lru::LruCache;

/// Resolve `path` against `home` into an absolute path without `.`, `..`
/// or empty components.
pub(crate) fn canonical_path(home: &str, path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    let joined = if path.starts_with('/') {
        [path, ""]
    } else {
        [home, path]
    };
    for s in joined.iter().flat_map(|s| s.split('/')) {
        match s {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    let mut canonical = String::with_capacity(path.len() + home.len() + 1);
    for p in parts {
        canonical.push('/');
        canonical.push_str(p);
    }
    if canonical.is_empty() {
        canonical.push('/');
    }
    canonical
}

/// The parent directory of a canonical path.
pub(crate) fn parent_path(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(i) => &path[..i],
    }
}

/// Per session memory of what the server said about paths.
pub(crate) struct FtpPathCache {
    exists: LruCache<String, bool, FixedState>,
    is_dir: LruCache<String, bool, FixedState>,
}

impl FtpPathCache {
    pub(crate) fn new(capacity: NonZeroUsize) -> Self {
        FtpPathCache {
            exists: LruCache::with_hasher(capacity, FixedState::with_seed(0)),
            is_dir: LruCache::with_hasher(capacity, FixedState::with_seed(0)),
        }
    }

    pub(crate) fn exists(&mut self, path: &str) -> Option<bool> {
        self.exists.get(path).copied()
    }

    pub(crate) fn is_dir(&mut self, path: &str) -> Option<bool> {
        self.is_dir.get(path).copied()
    }

    pub(crate) fn set_exists(&mut self, path: &str, exists: bool) {
        self.exists.put(path.to_string(), exists);
        if !exists {
            self.is_dir.put(path.to_string(), false);
        }
    }

    pub(crate) fn set_is_dir(&mut self, path: &str, is_dir: bool) {
        self.is_dir.put(path.to_string(), is_dir);
        if is_dir {
            self.exists.put(path.to_string(), true);
        }
    }

    /// Forget `path` and everything below it.
    pub(crate) fn remove_tree(&mut self, path: &str) {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        let below = |k: &String| k == path || k.starts_with(&prefix);
        let keys: Vec<String> = self
            .exists
            .iter()
            .chain(self.is_dir.iter())
            .map(|(k, _)| k)
            .filter(|k| below(*k))
            .cloned()
            .collect();
        for k in keys {
            self.exists.pop(&k);
            self.is_dir.pop(&k);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.exists.clear();
        self.is_dir.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.exists.len() + self.is_dir.len()
    }
}
