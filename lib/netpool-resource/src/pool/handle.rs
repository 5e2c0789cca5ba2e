/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use super::{PoolInner, RequesterId, ResourceAdapter, ResourceFactory};

/// Exclusive access to one pooled adapter.
///
/// The adapter goes back to the pool when the handle is released or dropped.
pub struct PoolHandle<F: ResourceFactory> {
    pool: Arc<PoolInner<F>>,
    requester: RequesterId,
    tuple_id: u64,
    adapter: Option<F::Adapter>,
}

impl<F: ResourceFactory> PoolHandle<F> {
    pub(super) fn new(
        pool: Arc<PoolInner<F>>,
        requester: RequesterId,
        tuple_id: u64,
        mut adapter: F::Adapter,
    ) -> Self {
        adapter.on_acquire();
        PoolHandle {
            pool,
            requester,
            tuple_id,
            adapter: Some(adapter),
        }
    }

    #[inline]
    pub fn requester(&self) -> RequesterId {
        self.requester
    }

    pub(super) fn belongs_to(&self, pool: &Arc<PoolInner<F>>) -> bool {
        Arc::ptr_eq(&self.pool, pool)
    }

    pub fn release(mut self) {
        self.release_adapter();
    }

    fn release_adapter(&mut self) {
        if let Some(adapter) = self.adapter.take() {
            self.pool.release(self.requester, self.tuple_id, adapter);
        }
    }
}

impl<F: ResourceFactory> Deref for PoolHandle<F> {
    type Target = F::Adapter;

    fn deref(&self) -> &Self::Target {
        match &self.adapter {
            Some(adapter) => adapter,
            None => unreachable!("pool handle used after release"),
        }
    }
}

impl<F: ResourceFactory> DerefMut for PoolHandle<F> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.adapter {
            Some(adapter) => adapter,
            None => unreachable!("pool handle used after release"),
        }
    }
}

impl<F: ResourceFactory> Drop for PoolHandle<F> {
    fn drop(&mut self) {
        self.release_adapter();
    }
}

pub(super) fn close_adapter<A: ResourceAdapter>(mut adapter: A) {
    adapter.close();
}
