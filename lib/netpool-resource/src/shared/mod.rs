/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use async_trait::async_trait;
use foldhash::fast::FixedState;
use lru::LruCache;
use tokio::task::JoinHandle;

use crate::{SharedCacheConfig, SharedCacheError};

/// Open and close connections that may be used by many callers at once.
#[async_trait]
pub trait SharedConnectionAdapter: Send + Sync + 'static {
    type Key: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static;
    type Connection: Send + Sync + 'static;
    type Error: std::error::Error + Send + Sync + 'static;

    async fn open(&self, key: &Self::Key) -> Result<Self::Connection, Self::Error>;

    fn close(&self, key: &Self::Key, conn: Arc<Self::Connection>);
}

struct Entry<C> {
    id: u64,
    conn: Arc<C>,
    refcount: usize,
    timer: Option<JoinHandle<()>>,
}

impl<C> Entry<C> {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

struct CacheState<K, C> {
    lru: LruCache<K, Entry<C>, FixedState>,
    /// Still referenced but no longer handed out: dirty or evicted.
    detached: HashMap<u64, (K, Entry<C>)>,
    next_id: u64,
}

impl<K: Hash + Eq, C> CacheState<K, C> {
    fn detach_or_close(&mut self, key: K, mut entry: Entry<C>, closing: &mut Vec<(K, Arc<C>)>) {
        entry.cancel_timer();
        if entry.refcount == 0 {
            closing.push((key, entry.conn));
        } else {
            self.detached.insert(entry.id, (key, entry));
        }
    }
}

struct CacheInner<A: SharedConnectionAdapter> {
    adapter: A,
    config: SharedCacheConfig,
    state: Mutex<CacheState<A::Key, A::Connection>>,
}

impl<A: SharedConnectionAdapter> CacheInner<A> {
    fn lock(&self) -> MutexGuard<'_, CacheState<A::Key, A::Connection>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn close_all(&self, closing: Vec<(A::Key, Arc<A::Connection>)>) {
        for (key, conn) in closing {
            log::debug!("close shared connection for {key:?}");
            self.adapter.close(&key, conn);
        }
    }

    fn release(self: &Arc<Self>, key: &A::Key, id: u64, dirty: bool) {
        let mut closing = Vec::new();
        {
            let mut guard = self.lock();
            let state = &mut *guard;
            if let Some(entry) = state.lru.peek_mut(key).filter(|e| e.id == id) {
                entry.refcount -= 1;
                if dirty {
                    if let Some(entry) = state.lru.pop(key) {
                        state.detach_or_close(key.clone(), entry, &mut closing);
                    }
                } else if entry.refcount == 0 {
                    entry.timer = self.arm_idle_timer(key, id);
                    if entry.timer.is_none() {
                        if let Some(entry) = state.lru.pop(key) {
                            closing.push((key.clone(), entry.conn));
                        }
                    }
                }
            } else if let Some((_, entry)) = state.detached.get_mut(&id) {
                entry.refcount -= 1;
                if entry.refcount == 0 {
                    if let Some((key, entry)) = state.detached.remove(&id) {
                        closing.push((key, entry.conn));
                    }
                }
            } else {
                log::warn!("release of unknown shared connection for {key:?}");
            }
        }
        self.close_all(closing);
    }

    fn arm_idle_timer(self: &Arc<Self>, key: &A::Key, id: u64) -> Option<JoinHandle<()>> {
        let timeout = self.config.idle_timeout();
        if timeout.is_zero() {
            return None;
        }
        let rt = tokio::runtime::Handle::try_current().ok()?;
        let cache = Arc::downgrade(self);
        let key = key.clone();
        Some(rt.spawn(async move {
            tokio::time::sleep(timeout).await;
            expire(cache, key, id);
        }))
    }
}

fn expire<A: SharedConnectionAdapter>(cache: Weak<CacheInner<A>>, key: A::Key, id: u64) {
    let Some(cache) = cache.upgrade() else {
        return;
    };
    let conn = {
        let mut state = cache.lock();
        match state.lru.peek(&key) {
            Some(entry) if entry.id == id && entry.refcount == 0 => {
                state.lru.pop(&key).map(|entry| entry.conn)
            }
            _ => None,
        }
    };
    if let Some(conn) = conn {
        log::debug!("shared connection for {key:?} idle timeout");
        cache.adapter.close(&key, conn);
    }
}

/// Reference counted connections keyed by what they connect to.
pub struct SharedConnectionCache<A: SharedConnectionAdapter> {
    inner: Arc<CacheInner<A>>,
}

impl<A: SharedConnectionAdapter> Clone for SharedConnectionCache<A> {
    fn clone(&self) -> Self {
        SharedConnectionCache {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: SharedConnectionAdapter> SharedConnectionCache<A> {
    pub fn new(adapter: A, config: SharedCacheConfig) -> Self {
        let lru = LruCache::with_hasher(config.capacity(), FixedState::with_seed(0));
        SharedConnectionCache {
            inner: Arc::new(CacheInner {
                adapter,
                config,
                state: Mutex::new(CacheState {
                    lru,
                    detached: HashMap::new(),
                    next_id: 1,
                }),
            }),
        }
    }

    pub fn adapter(&self) -> &A {
        &self.inner.adapter
    }

    fn reuse(&self, key: &A::Key) -> Option<SharedConnection<A>> {
        let mut state = self.inner.lock();
        let entry = state.lru.get_mut(key)?;
        entry.refcount += 1;
        entry.cancel_timer();
        Some(SharedConnection {
            cache: self.inner.clone(),
            key: key.clone(),
            id: entry.id,
            conn: Some(entry.conn.clone()),
        })
    }

    /// Get the cached connection for `key`, opening one on miss.
    pub async fn get(
        &self,
        key: &A::Key,
    ) -> Result<SharedConnection<A>, SharedCacheError<A::Error>> {
        if let Some(conn) = self.reuse(key) {
            return Ok(conn);
        }

        let conn = self
            .inner
            .adapter
            .open(key)
            .await
            .map_err(SharedCacheError::OpenFailed)?;
        let conn = Arc::new(conn);

        let mut closing = Vec::new();
        let shared = {
            let mut guard = self.inner.lock();
            let state = &mut *guard;
            if let Some(entry) = state.lru.get_mut(key) {
                // lost the race with another opener
                entry.refcount += 1;
                entry.cancel_timer();
                closing.push((key.clone(), conn));
                SharedConnection {
                    cache: self.inner.clone(),
                    key: key.clone(),
                    id: entry.id,
                    conn: Some(entry.conn.clone()),
                }
            } else {
                let id = state.next_id;
                state.next_id += 1;
                let entry = Entry {
                    id,
                    conn: conn.clone(),
                    refcount: 1,
                    timer: None,
                };
                if let Some((evicted_key, evicted)) = state.lru.push(key.clone(), entry) {
                    log::debug!("evict shared connection for {evicted_key:?}");
                    state.detach_or_close(evicted_key, evicted, &mut closing);
                }
                SharedConnection {
                    cache: self.inner.clone(),
                    key: key.clone(),
                    id,
                    conn: Some(conn),
                }
            }
        };
        self.inner.close_all(closing);
        Ok(shared)
    }

    /// Stop handing out the connection for `key`. It is closed once unreferenced.
    pub fn invalidate(&self, key: &A::Key) {
        let mut closing = Vec::new();
        {
            let mut state = self.inner.lock();
            if let Some(entry) = state.lru.pop(key) {
                state.detach_or_close(key.clone(), entry, &mut closing);
            }
        }
        self.inner.close_all(closing);
    }

    pub fn clear(&self) {
        let mut closing = Vec::new();
        {
            let mut state = self.inner.lock();
            while let Some((key, entry)) = state.lru.pop_lru() {
                state.detach_or_close(key, entry, &mut closing);
            }
        }
        self.inner.close_all(closing);
    }

    /// Connections that can still be handed out.
    pub fn len(&self) -> usize {
        self.inner.lock().lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A counted reference to a cached connection.
///
/// Dropping it is the same as a clean release.
pub struct SharedConnection<A: SharedConnectionAdapter> {
    cache: Arc<CacheInner<A>>,
    key: A::Key,
    id: u64,
    conn: Option<Arc<A::Connection>>,
}

impl<A: SharedConnectionAdapter> SharedConnection<A> {
    #[inline]
    pub fn key(&self) -> &A::Key {
        &self.key
    }

    /// Give back the reference. A dirty connection is never handed out again.
    pub fn release(mut self, dirty: bool) {
        self.release_ref(dirty);
    }

    fn release_ref(&mut self, dirty: bool) {
        if self.conn.take().is_some() {
            self.cache.release(&self.key, self.id, dirty);
        }
    }
}

impl<A: SharedConnectionAdapter> Deref for SharedConnection<A> {
    type Target = A::Connection;

    fn deref(&self) -> &Self::Target {
        match &self.conn {
            Some(conn) => conn,
            None => unreachable!("shared connection used after release"),
        }
    }
}

impl<A: SharedConnectionAdapter> Drop for SharedConnection<A> {
    fn drop(&mut self) {
        self.release_ref(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroUsize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug, thiserror::Error)]
    #[error("unreachable directory")]
    struct Unreachable;

    #[derive(Default)]
    struct Directory {
        opened: AtomicUsize,
        closed: Mutex<Vec<(String, usize)>>,
    }

    #[async_trait]
    impl SharedConnectionAdapter for Directory {
        type Key = String;
        type Connection = usize;
        type Error = Unreachable;

        async fn open(&self, key: &String) -> Result<usize, Unreachable> {
            if key == "down" {
                return Err(Unreachable);
            }
            Ok(self.opened.fetch_add(1, Ordering::SeqCst))
        }

        fn close(&self, key: &String, conn: Arc<usize>) {
            self.closed.lock().unwrap().push((key.clone(), *conn));
        }
    }

    fn cache(capacity: usize, idle: Duration) -> SharedConnectionCache<Directory> {
        let mut config = SharedCacheConfig::default();
        config.set_capacity(NonZeroUsize::new(capacity).unwrap());
        config.set_idle_timeout(idle);
        SharedConnectionCache::new(Directory::default(), config)
    }

    fn closed(cache: &SharedConnectionCache<Directory>) -> Vec<(String, usize)> {
        cache.adapter().closed.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn share() {
        let cache = cache(4, Duration::from_secs(60));
        let a = cache.get(&"ldap".to_string()).await.unwrap();
        let b = cache.get(&"ldap".to_string()).await.unwrap();
        assert_eq!(*a, 0);
        assert_eq!(*b, 0);
        assert_eq!(cache.adapter().opened.load(Ordering::SeqCst), 1);
        drop(a);
        drop(b);
        assert!(closed(&cache).is_empty());
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn open_failed() {
        let cache = cache(4, Duration::from_secs(60));
        let r = cache.get(&"down".to_string()).await;
        assert!(matches!(r, Err(SharedCacheError::OpenFailed(Unreachable))));
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_timeout() {
        let cache = cache(4, Duration::from_secs(60));
        let key = "ldap".to_string();
        cache.get(&key).await.unwrap().release(false);

        tokio::time::sleep(Duration::from_secs(30)).await;
        let c = cache.get(&key).await.unwrap();
        assert_eq!(*c, 0);
        c.release(false);

        // the first timer was cancelled by the reuse
        tokio::time::sleep(Duration::from_secs(45)).await;
        assert!(closed(&cache).is_empty());

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(closed(&cache), vec![(key.clone(), 0)]);
        assert!(cache.is_empty());

        let c = cache.get(&key).await.unwrap();
        assert_eq!(*c, 1);
    }

    #[tokio::test]
    async fn dirty_release() {
        let cache = cache(4, Duration::from_secs(60));
        let key = "ldap".to_string();
        let a = cache.get(&key).await.unwrap();
        let b = cache.get(&key).await.unwrap();

        a.release(true);
        assert!(closed(&cache).is_empty());

        // a new caller gets a fresh connection
        let c = cache.get(&key).await.unwrap();
        assert_eq!(*c, 1);

        drop(b);
        assert_eq!(closed(&cache), vec![(key.clone(), 0)]);
        drop(c);
        assert_eq!(closed(&cache).len(), 1);
    }

    #[tokio::test]
    async fn evict() {
        let cache = cache(1, Duration::from_secs(60));
        let a = cache.get(&"a".to_string()).await.unwrap();
        cache.get(&"b".to_string()).await.unwrap().release(false);
        // "a" was still in use when evicted
        assert!(closed(&cache).is_empty());
        drop(a);
        assert_eq!(closed(&cache), vec![("a".to_string(), 0)]);

        let _c = cache.get(&"c".to_string()).await.unwrap();
        assert_eq!(closed(&cache).len(), 2);
        assert_eq!(closed(&cache)[1], ("b".to_string(), 1));
    }

    #[tokio::test]
    async fn zero_idle_timeout() {
        let cache = cache(4, Duration::ZERO);
        cache.get(&"a".to_string()).await.unwrap().release(false);
        assert_eq!(closed(&cache).len(), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn invalidate_and_clear() {
        let cache = cache(4, Duration::from_secs(60));
        let a = cache.get(&"a".to_string()).await.unwrap();
        cache.get(&"b".to_string()).await.unwrap().release(false);

        cache.invalidate(&"a".to_string());
        assert!(closed(&cache).is_empty());
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert_eq!(closed(&cache), vec![("b".to_string(), 1)]);
        drop(a);
        assert_eq!(closed(&cache).len(), 2);
    }
}
