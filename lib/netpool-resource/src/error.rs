/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResourcePoolError<E> {
    #[error("no resource available now")]
    Blocked,
    #[error("failed to create resource: {0}")]
    FactoryFailed(#[source] E),
}

impl<E> ResourcePoolError<E> {
    pub fn is_blocked(&self) -> bool {
        matches!(self, ResourcePoolError::Blocked)
    }
}

#[derive(Debug, Error)]
pub enum SharedCacheError<E> {
    #[error("failed to open shared connection: {0}")]
    OpenFailed(#[source] E),
}
