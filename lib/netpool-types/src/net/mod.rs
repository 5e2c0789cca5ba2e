/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

mod host;
mod proxy;
mod upstream;

pub use host::Host;
pub use proxy::{NoProxy, ProxyLookup, StaticProxyLookup};
pub use upstream::UpstreamAddr;
