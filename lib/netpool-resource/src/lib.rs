/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

mod config;
pub use config::{ResourcePoolConfig, SharedCacheConfig};

mod error;
pub use error::{ResourcePoolError, SharedCacheError};

mod pool;
pub use pool::{
    EqualityTest, KeyEquality, PoolHandle, RequesterId, ResourceAdapter, ResourceFactory,
    ResourcePool,
};

mod shared;
pub use shared::{SharedConnection, SharedConnectionAdapter, SharedConnectionCache};
