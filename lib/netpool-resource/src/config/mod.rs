/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::num::NonZeroUsize;
use std::time::Duration;

#[cfg(feature = "yaml")]
mod yaml;

const DEFAULT_SHARED_CACHE_CAPACITY: NonZeroUsize = NonZeroUsize::new(64).unwrap();

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResourcePoolConfig {
    max_pool_size: usize,
    max_class_size: usize,
    blocking: bool,
}

impl Default for ResourcePoolConfig {
    fn default() -> Self {
        ResourcePoolConfig {
            max_pool_size: 64,
            max_class_size: 8,
            blocking: true,
        }
    }
}

impl ResourcePoolConfig {
    pub fn new(max_pool_size: usize, max_class_size: usize, blocking: bool) -> Self {
        let mut config = ResourcePoolConfig::default();
        config.set_max_pool_size(max_pool_size);
        config.set_max_class_size(max_class_size);
        config.set_blocking(blocking);
        config
    }

    /// At least 1.
    pub fn set_max_pool_size(&mut self, size: usize) {
        self.max_pool_size = size.max(1);
    }

    #[inline]
    pub fn max_pool_size(&self) -> usize {
        self.max_pool_size
    }

    /// At least 1.
    pub fn set_max_class_size(&mut self, size: usize) {
        self.max_class_size = size.max(1);
    }

    #[inline]
    pub fn max_class_size(&self) -> usize {
        self.max_class_size
    }

    pub fn set_blocking(&mut self, blocking: bool) {
        self.blocking = blocking;
    }

    #[inline]
    pub fn blocking(&self) -> bool {
        self.blocking
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SharedCacheConfig {
    capacity: NonZeroUsize,
    idle_timeout: Duration,
}

impl Default for SharedCacheConfig {
    fn default() -> Self {
        SharedCacheConfig {
            capacity: DEFAULT_SHARED_CACHE_CAPACITY,
            idle_timeout: Duration::from_secs(60),
        }
    }
}

impl SharedCacheConfig {
    pub fn set_capacity(&mut self, capacity: NonZeroUsize) {
        self.capacity = capacity;
    }

    #[inline]
    pub fn capacity(&self) -> NonZeroUsize {
        self.capacity
    }

    /// A zero timeout closes unreferenced connections at once.
    pub fn set_idle_timeout(&mut self, timeout: Duration) {
        self.idle_timeout = timeout;
    }

    #[inline]
    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }
}
