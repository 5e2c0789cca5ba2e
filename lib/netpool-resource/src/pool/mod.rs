/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;

use crate::{ResourcePoolConfig, ResourcePoolError};

mod adapter;
pub use adapter::{EqualityTest, KeyEquality, RequesterId, ResourceAdapter, ResourceFactory};

mod handle;
use handle::close_adapter;
pub use handle::PoolHandle;

struct Tuple<K, A> {
    id: u64,
    key: K,
    /// `None` while lent out.
    adapter: Option<A>,
    occupant: Option<RequesterId>,
    /// Close on release, set by pool reset.
    retired: bool,
}

impl<K, A> Tuple<K, A> {
    fn is_idle(&self) -> bool {
        self.occupant.is_none()
    }
}

struct ClassState {
    /// Including reserved slots whose adapter is still being created.
    members: usize,
    notify: Arc<Notify>,
}

enum Scan<A> {
    Found(u64, A),
    Create(u64),
    Wait(Arc<Notify>),
    Blocked,
}

struct PoolState<K, A> {
    config: ResourcePoolConfig,
    tuples: Vec<Tuple<K, A>>,
    classes: HashMap<K, ClassState>,
    total: usize,
    next_tuple_id: u64,
    notify: Arc<Notify>,
}

impl<K, A> PoolState<K, A>
where
    K: Clone + Eq + Hash + std::fmt::Debug,
    A: ResourceAdapter,
{
    fn new(config: ResourcePoolConfig) -> Self {
        PoolState {
            config,
            tuples: Vec::new(),
            classes: HashMap::new(),
            total: 0,
            next_tuple_id: 1,
            notify: Arc::new(Notify::new()),
        }
    }

    fn class_members(&self, key: &K) -> usize {
        self.classes.get(key).map(|c| c.members).unwrap_or(0)
    }

    fn position(&self, tuple_id: u64) -> Option<usize> {
        self.tuples.iter().position(|t| t.id == tuple_id)
    }

    fn remove_at(&mut self, i: usize, wake: &mut Vec<Arc<Notify>>) -> Tuple<K, A> {
        let tuple = self.tuples.remove(i);
        self.total -= 1;
        if let Some(class) = self.classes.get_mut(&tuple.key) {
            class.members -= 1;
            wake.push(class.notify.clone());
            if class.members == 0 {
                self.classes.remove(&tuple.key);
            }
        }
        wake.push(self.notify.clone());
        tuple
    }

    fn reserve(&mut self, key: &K, requester: RequesterId) -> u64 {
        let id = self.next_tuple_id;
        self.next_tuple_id += 1;
        self.total += 1;
        self.classes
            .entry(key.clone())
            .or_insert_with(|| ClassState {
                members: 0,
                notify: Arc::new(Notify::new()),
            })
            .members += 1;
        self.tuples.push(Tuple {
            id,
            key: key.clone(),
            adapter: None,
            occupant: Some(requester),
            retired: false,
        });
        id
    }

    fn evict_idle<P>(&mut self, pred: P, wake: &mut Vec<Arc<Notify>>) -> Option<A>
    where
        P: Fn(&Tuple<K, A>) -> bool,
    {
        let i = self.tuples.iter().position(|t| t.is_idle() && pred(t))?;
        let tuple = self.remove_at(i, wake);
        log::debug!("evict idle pooled resource of class {:?}", tuple.key);
        tuple.adapter
    }

    fn scan<T>(
        &mut self,
        requester: RequesterId,
        test: &T,
        key: &K,
        closing: &mut Vec<A>,
        wake: &mut Vec<Arc<Notify>>,
    ) -> Scan<A>
    where
        T: EqualityTest<K> + ?Sized,
    {
        let mut i = 0;
        while i < self.tuples.len() {
            let tuple = &mut self.tuples[i];
            if !tuple.is_idle() || !test.matches(key, &tuple.key) {
                i += 1;
                continue;
            }
            let Some(mut adapter) = tuple.adapter.take() else {
                i += 1;
                continue;
            };
            if !adapter.must_close() && adapter.is_alive() {
                tuple.occupant = Some(requester);
                return Scan::Found(tuple.id, adapter);
            }
            log::debug!("evict dead pooled resource of class {:?}", tuple.key);
            self.remove_at(i, wake);
            closing.push(adapter);
        }

        // idle members that did not match the test still take class room
        if self.class_members(key) >= self.config.max_class_size() {
            if let Some(adapter) = self.evict_idle(|t| t.key == *key, wake) {
                closing.push(adapter);
            }
        }
        if self.class_members(key) < self.config.max_class_size() {
            if self.total >= self.config.max_pool_size() {
                if let Some(adapter) = self.evict_idle(|_| true, wake) {
                    closing.push(adapter);
                }
            }
            if self.total < self.config.max_pool_size() {
                return Scan::Create(self.reserve(key, requester));
            }
        }

        if !self.config.blocking() {
            return Scan::Blocked;
        }
        match self.classes.get(key) {
            Some(class) if class.members >= self.config.max_class_size() => {
                Scan::Wait(class.notify.clone())
            }
            _ => Scan::Wait(self.notify.clone()),
        }
    }
}

fn finish_locked_work<A: ResourceAdapter>(closing: Vec<A>, wake: Vec<Arc<Notify>>) {
    for adapter in closing {
        close_adapter(adapter);
    }
    for notify in wake {
        notify.notify_one();
    }
}

pub(crate) struct PoolInner<F: ResourceFactory> {
    factory: F,
    state: Mutex<PoolState<F::Key, F::Adapter>>,
}

impl<F: ResourceFactory> PoolInner<F> {
    fn lock(&self) -> MutexGuard<'_, PoolState<F::Key, F::Adapter>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn release(&self, requester: RequesterId, tuple_id: u64, mut adapter: F::Adapter) {
        adapter.on_release();

        let mut wake = Vec::new();
        let to_close = {
            let mut guard = self.lock();
            let state = &mut *guard;
            match state.position(tuple_id) {
                Some(i) if state.tuples[i].occupant == Some(requester) => {
                    let key = &state.tuples[i].key;
                    let over_capacity = state.total > state.config.max_pool_size()
                        || state.class_members(key) > state.config.max_class_size();
                    if state.tuples[i].retired || adapter.must_close() || over_capacity {
                        state.remove_at(i, &mut wake);
                        Some(adapter)
                    } else {
                        let tuple = &mut state.tuples[i];
                        tuple.occupant = None;
                        if let Some(class) = state.classes.get(&tuple.key) {
                            wake.push(class.notify.clone());
                        }
                        tuple.adapter = Some(adapter);
                        wake.push(state.notify.clone());
                        None
                    }
                }
                _ => {
                    log::warn!("{requester} released a resource it does not hold, close it");
                    Some(adapter)
                }
            }
        };
        finish_locked_work(to_close.into_iter().collect(), wake);
    }

    /// Drop the reservation of a slot whose adapter could not be created.
    fn abandon(&self, tuple_id: u64) {
        let mut wake = Vec::new();
        {
            let mut state = self.lock();
            if let Some(i) = state.position(tuple_id) {
                state.remove_at(i, &mut wake);
            }
        }
        finish_locked_work::<F::Adapter>(Vec::new(), wake);
    }
}

struct Reservation<'a, F: ResourceFactory> {
    pool: &'a PoolInner<F>,
    tuple_id: u64,
    armed: bool,
}

impl<F: ResourceFactory> Drop for Reservation<'_, F> {
    fn drop(&mut self) {
        if self.armed {
            self.pool.abandon(self.tuple_id);
        }
    }
}

/// A pool of adapters partitioned into equivalence classes.
pub struct ResourcePool<F: ResourceFactory> {
    inner: Arc<PoolInner<F>>,
}

impl<F: ResourceFactory> Clone for ResourcePool<F> {
    fn clone(&self) -> Self {
        ResourcePool {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: ResourceFactory> ResourcePool<F> {
    pub fn new(factory: F, config: ResourcePoolConfig) -> Self {
        ResourcePool {
            inner: Arc::new(PoolInner {
                factory,
                state: Mutex::new(PoolState::new(config)),
            }),
        }
    }

    pub fn factory(&self) -> &F {
        &self.inner.factory
    }

    pub fn config(&self) -> ResourcePoolConfig {
        self.inner.lock().config.clone()
    }

    /// Get an unoccupied live adapter whose class passes `test` against `key`,
    /// or create a new one in class `key`.
    ///
    /// If both are impossible a blocking pool waits for a release, a
    /// non-blocking pool returns [`ResourcePoolError::Blocked`].
    pub async fn acquire<T>(
        &self,
        requester: RequesterId,
        test: &T,
        key: &F::Key,
    ) -> Result<PoolHandle<F>, ResourcePoolError<F::Error>>
    where
        T: EqualityTest<F::Key> + ?Sized,
    {
        loop {
            let mut closing = Vec::new();
            let mut wake = Vec::new();
            let mut wait_on: Option<Arc<Notify>> = None;
            let scan;
            let notified = {
                let mut state = self.inner.lock();
                scan = state.scan(requester, test, key, &mut closing, &mut wake);
                if let Scan::Wait(notify) = &scan {
                    wait_on = Some(notify.clone());
                }
                // register before unlock so that no release is missed
                wait_on.as_ref().map(|notify| {
                    let mut notified = Box::pin(notify.notified());
                    notified.as_mut().enable();
                    notified
                })
            };
            finish_locked_work(closing, wake);

            match scan {
                Scan::Found(tuple_id, adapter) => {
                    return Ok(PoolHandle::new(
                        self.inner.clone(),
                        requester,
                        tuple_id,
                        adapter,
                    ));
                }
                Scan::Create(tuple_id) => return self.create(requester, tuple_id, key).await,
                Scan::Blocked => return Err(ResourcePoolError::Blocked),
                Scan::Wait(_) => {}
            }
            if let Some(notified) = notified {
                notified.await;
            }
        }
    }

    async fn create(
        &self,
        requester: RequesterId,
        tuple_id: u64,
        key: &F::Key,
    ) -> Result<PoolHandle<F>, ResourcePoolError<F::Error>> {
        let mut reservation = Reservation {
            pool: &self.inner,
            tuple_id,
            armed: true,
        };
        match self.inner.factory.create(key).await {
            Ok(adapter) => {
                reservation.armed = false;
                Ok(PoolHandle::new(
                    self.inner.clone(),
                    requester,
                    tuple_id,
                    adapter,
                ))
            }
            Err(e) => {
                log::debug!("failed to create pooled resource of class {key:?}: {e}");
                Err(ResourcePoolError::FactoryFailed(e))
            }
        }
    }

    /// Give back `handle`. Same as dropping it.
    pub fn release(&self, handle: PoolHandle<F>) {
        if !handle.belongs_to(&self.inner) {
            log::warn!(
                "{} released a resource to a foreign pool",
                handle.requester()
            );
        }
        handle.release();
    }

    /// Close every idle adapter. Adapters in use are closed on release.
    pub fn reset(&self) {
        let mut closing = Vec::new();
        let mut wake = Vec::new();
        {
            let mut state = self.inner.lock();
            let mut i = 0;
            while i < state.tuples.len() {
                if state.tuples[i].is_idle() {
                    let tuple = state.remove_at(i, &mut wake);
                    closing.extend(tuple.adapter);
                } else {
                    state.tuples[i].retired = true;
                    i += 1;
                }
            }
        }
        finish_locked_work(closing, wake);
    }

    /// Change the limits. Idle adapters over the new limits are closed, adapters
    /// in use are closed when they come back.
    pub fn resize(&self, max_pool_size: usize, max_class_size: usize) {
        let mut closing = Vec::new();
        let mut wake = Vec::new();
        let notifies = {
            let mut state = self.inner.lock();
            state.config.set_max_pool_size(max_pool_size);
            state.config.set_max_class_size(max_class_size);

            while state.total > state.config.max_pool_size() {
                let Some(adapter) = state.evict_idle(|_| true, &mut wake) else {
                    break;
                };
                closing.push(adapter);
            }
            let max_class_size = state.config.max_class_size();
            let over_classes: Vec<_> = state
                .classes
                .iter()
                .filter(|(_, c)| c.members > max_class_size)
                .map(|(k, _)| k.clone())
                .collect();
            for key in over_classes {
                while state.class_members(&key) > max_class_size {
                    let Some(adapter) = state.evict_idle(|t| t.key == key, &mut wake) else {
                        break;
                    };
                    closing.push(adapter);
                }
            }

            let mut notifies = vec![state.notify.clone()];
            notifies.extend(state.classes.values().map(|c| c.notify.clone()));
            notifies
        };
        finish_locked_work(closing, wake);
        // the limits may have grown, let every waiter check again
        for notify in notifies {
            notify.notify_waiters();
        }
    }

    pub fn idle_count(&self) -> usize {
        self.inner.lock().tuples.iter().filter(|t| t.is_idle()).count()
    }

    /// Live adapters, including those in use and those being created.
    pub fn total_count(&self) -> usize {
        self.inner.lock().total
    }

    pub fn class_count(&self, key: &F::Key) -> usize {
        self.inner.lock().class_members(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    #[derive(Debug, thiserror::Error)]
    #[error("refused")]
    struct Refused;

    struct TestAdapter {
        id: usize,
        alive: Arc<AtomicBool>,
        in_use: Arc<AtomicBool>,
        must_close: bool,
        closed: Arc<AtomicUsize>,
    }

    impl ResourceAdapter for TestAdapter {
        fn is_alive(&mut self) -> bool {
            self.alive.load(Ordering::Relaxed)
        }

        fn must_close(&self) -> bool {
            self.must_close
        }

        fn on_acquire(&mut self) {
            assert!(!self.in_use.swap(true, Ordering::SeqCst));
        }

        fn on_release(&mut self) {
            assert!(self.in_use.swap(false, Ordering::SeqCst));
        }

        fn close(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct TestFactory {
        created: AtomicUsize,
        closed: Arc<AtomicUsize>,
        alive: Arc<AtomicBool>,
        delay: Option<Duration>,
    }

    impl TestFactory {
        fn new() -> Self {
            TestFactory {
                alive: Arc::new(AtomicBool::new(true)),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl ResourceFactory for TestFactory {
        type Key = String;
        type Adapter = TestAdapter;
        type Error = Refused;

        async fn create(&self, key: &String) -> Result<TestAdapter, Refused> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if key.starts_with("bad") {
                return Err(Refused);
            }
            let id = self.created.fetch_add(1, Ordering::SeqCst);
            Ok(TestAdapter {
                id,
                alive: self.alive.clone(),
                in_use: Arc::new(AtomicBool::new(false)),
                must_close: false,
                closed: self.closed.clone(),
            })
        }
    }

    fn pool(max_pool: usize, max_class: usize, blocking: bool) -> ResourcePool<TestFactory> {
        ResourcePool::new(
            TestFactory::new(),
            ResourcePoolConfig::new(max_pool, max_class, blocking),
        )
    }

    fn key(s: &str) -> String {
        s.to_string()
    }

    #[tokio::test]
    async fn reuse_idle() {
        let pool = pool(4, 2, false);
        let h = pool
            .acquire(RequesterId::new(), &KeyEquality, &key("a"))
            .await
            .unwrap();
        let id = h.id;
        h.release();
        assert_eq!(pool.idle_count(), 1);

        let h = pool
            .acquire(RequesterId::new(), &KeyEquality, &key("a"))
            .await
            .unwrap();
        assert_eq!(h.id, id);
        assert_eq!(pool.factory().created.load(Ordering::SeqCst), 1);
        assert_eq!(pool.idle_count(), 0);
    }

    #[tokio::test]
    async fn class_limit() {
        let pool = pool(8, 1, false);
        let _a = pool
            .acquire(RequesterId::new(), &KeyEquality, &key("a"))
            .await
            .unwrap();
        let r = pool
            .acquire(RequesterId::new(), &KeyEquality, &key("a"))
            .await;
        assert!(matches!(r, Err(ResourcePoolError::Blocked)));

        let _b = pool
            .acquire(RequesterId::new(), &KeyEquality, &key("b"))
            .await
            .unwrap();
        assert_eq!(pool.total_count(), 2);
        assert_eq!(pool.class_count(&key("a")), 1);
    }

    #[tokio::test]
    async fn pool_full_evicts_idle() {
        let pool = pool(1, 1, false);
        let a = pool
            .acquire(RequesterId::new(), &KeyEquality, &key("a"))
            .await
            .unwrap();

        let r = pool
            .acquire(RequesterId::new(), &KeyEquality, &key("b"))
            .await;
        assert!(matches!(r, Err(e) if e.is_blocked()));

        drop(a);
        let _b = pool
            .acquire(RequesterId::new(), &KeyEquality, &key("b"))
            .await
            .unwrap();
        assert_eq!(pool.factory().closed.load(Ordering::SeqCst), 1);
        assert_eq!(pool.total_count(), 1);
        assert_eq!(pool.class_count(&key("a")), 0);
    }

    #[tokio::test]
    async fn blocking_wait() {
        let pool = pool(1, 1, true);
        let a = pool
            .acquire(RequesterId::new(), &KeyEquality, &key("a"))
            .await
            .unwrap();
        let id = a.id;

        let pool2 = pool.clone();
        let waiter = tokio::spawn(async move {
            let h = pool2
                .acquire(RequesterId::new(), &KeyEquality, &key("a"))
                .await
                .unwrap();
            h.id
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        pool.release(a);
        let got = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got, id);
        assert_eq!(pool.factory().created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn blocking_wait_other_class() {
        let pool = pool(1, 1, true);
        let a = pool
            .acquire(RequesterId::new(), &KeyEquality, &key("a"))
            .await
            .unwrap();

        let pool2 = pool.clone();
        let waiter = tokio::spawn(async move {
            pool2
                .acquire(RequesterId::new(), &KeyEquality, &key("b"))
                .await
                .map(|h| h.id)
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(a);
        let got = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(got, 1);
        assert_eq!(pool.total_count(), 1);
    }

    #[tokio::test]
    async fn must_close_on_release() {
        let pool = pool(4, 2, false);
        let mut h = pool
            .acquire(RequesterId::new(), &KeyEquality, &key("a"))
            .await
            .unwrap();
        h.must_close = true;
        h.release();
        assert_eq!(pool.factory().closed.load(Ordering::SeqCst), 1);
        assert_eq!(pool.total_count(), 0);
        assert_eq!(pool.idle_count(), 0);
    }

    #[tokio::test]
    async fn dead_adapter_evicted() {
        let pool = pool(4, 2, false);
        let h = pool
            .acquire(RequesterId::new(), &KeyEquality, &key("a"))
            .await
            .unwrap();
        drop(h);

        pool.factory().alive.store(false, Ordering::SeqCst);
        let h = pool
            .acquire(RequesterId::new(), &KeyEquality, &key("a"))
            .await
            .unwrap();
        assert_eq!(h.id, 1);
        assert_eq!(pool.factory().closed.load(Ordering::SeqCst), 1);
        assert_eq!(pool.class_count(&key("a")), 1);
    }

    #[tokio::test]
    async fn factory_failure() {
        let pool = pool(4, 2, true);
        let r = pool
            .acquire(RequesterId::new(), &KeyEquality, &key("bad-host"))
            .await;
        assert!(matches!(r, Err(ResourcePoolError::FactoryFailed(Refused))));
        assert_eq!(pool.total_count(), 0);
        assert_eq!(pool.class_count(&key("bad-host")), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_create() {
        let factory = TestFactory {
            delay: Some(Duration::from_secs(10)),
            ..TestFactory::new()
        };
        let pool = ResourcePool::new(factory, ResourcePoolConfig::new(1, 1, true));
        let r = tokio::time::timeout(
            Duration::from_secs(1),
            pool.acquire(RequesterId::new(), &KeyEquality, &key("a")),
        )
        .await;
        assert!(r.is_err());
        assert_eq!(pool.total_count(), 0);
    }

    #[tokio::test]
    async fn release_after_reset() {
        let pool = pool(4, 2, false);
        let a = pool
            .acquire(RequesterId::new(), &KeyEquality, &key("a"))
            .await
            .unwrap();
        let b = pool
            .acquire(RequesterId::new(), &KeyEquality, &key("b"))
            .await
            .unwrap();
        drop(b);

        pool.reset();
        assert_eq!(pool.factory().closed.load(Ordering::SeqCst), 1);
        assert_eq!(pool.total_count(), 1);

        a.release();
        assert_eq!(pool.factory().closed.load(Ordering::SeqCst), 2);
        assert_eq!(pool.total_count(), 0);
    }

    #[tokio::test]
    async fn shrink() {
        let pool = pool(4, 4, false);
        let mut handles = Vec::new();
        for _ in 0..3 {
            handles.push(
                pool.acquire(RequesterId::new(), &KeyEquality, &key("a"))
                    .await
                    .unwrap(),
            );
        }
        let last = handles.pop().unwrap();
        handles.clear();
        assert_eq!(pool.idle_count(), 2);

        pool.resize(1, 1);
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(pool.total_count(), 1);

        drop(last);
        assert_eq!(pool.factory().closed.load(Ordering::SeqCst), 2);
        assert_eq!(pool.total_count(), 1);
        assert_eq!(pool.idle_count(), 1);
    }

    #[tokio::test]
    async fn custom_equality() {
        let pool = pool(4, 2, false);
        let h = pool
            .acquire(RequesterId::new(), &KeyEquality, &key("www.example.net:80"))
            .await
            .unwrap();
        drop(h);

        let same_host = |want: &String, have: &String| {
            want.split(':').next() == have.split(':').next()
        };
        let h = pool
            .acquire(RequesterId::new(), &same_host, &key("www.example.net:8080"))
            .await
            .unwrap();
        assert_eq!(h.id, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_exclusive() {
        let pool = pool(3, 3, true);
        let holders = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let pool = pool.clone();
            let holders = holders.clone();
            tasks.push(tokio::spawn(async move {
                let requester = RequesterId::new();
                for _ in 0..50 {
                    let h = pool
                        .acquire(requester, &KeyEquality, &key("a"))
                        .await
                        .unwrap();
                    let n = holders.fetch_add(1, Ordering::SeqCst);
                    assert!(n < 3);
                    tokio::task::yield_now().await;
                    holders.fetch_sub(1, Ordering::SeqCst);
                    drop(h);
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert!(pool.factory().created.load(Ordering::SeqCst) <= 3);
        assert_eq!(pool.total_count(), pool.idle_count());
    }
}
