/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

/// The pool facing side of one physical connection.
pub trait ResourceAdapter: Send + 'static {
    /// Checked before an idle adapter is handed out again. Must not block.
    fn is_alive(&mut self) -> bool;

    /// The adapter should be retired instead of going back to the idle set.
    fn must_close(&self) -> bool;

    fn on_acquire(&mut self) {}

    fn on_release(&mut self) {}

    /// Called once before the pool drops the adapter.
    fn close(&mut self) {}
}

#[async_trait]
pub trait ResourceFactory: Send + Sync + 'static {
    /// The equivalence class key.
    type Key: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static;
    type Adapter: ResourceAdapter;
    type Error: std::error::Error + Send + Sync + 'static;

    async fn create(&self, key: &Self::Key) -> Result<Self::Adapter, Self::Error>;
}

/// Decide whether an existing adapter of class `candidate` can serve a
/// request for `class_key`.
pub trait EqualityTest<K>: Send + Sync {
    fn matches(&self, class_key: &K, candidate: &K) -> bool;
}

impl<K, F> EqualityTest<K> for F
where
    F: Fn(&K, &K) -> bool + Send + Sync,
{
    fn matches(&self, class_key: &K, candidate: &K) -> bool {
        self(class_key, candidate)
    }
}

/// Plain key equality, the same test the pool uses for class membership.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeyEquality;

impl<K: Eq> EqualityTest<K> for KeyEquality {
    fn matches(&self, class_key: &K, candidate: &K) -> bool {
        class_key == candidate
    }
}

/// Identity of a borrower.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequesterId(u64);

impl RequesterId {
    pub fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        RequesterId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for RequesterId {
    fn default() -> Self {
        RequesterId::new()
    }
}

impl fmt::Display for RequesterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "requester#{}", self.0)
    }
}
