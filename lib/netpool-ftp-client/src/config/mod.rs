/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::num::NonZeroUsize;
use std::time::Duration;

use netpool_resource::ResourcePoolConfig;

#[cfg(feature = "yaml")]
mod yaml;

const DEFAULT_CACHE_SIZE: NonZeroUsize = NonZeroUsize::new(256).unwrap();

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FtpControlConfig {
    pub max_line_len: usize,
    pub max_multi_lines: usize,
    pub command_timeout: Duration,
}

impl Default for FtpControlConfig {
    fn default() -> Self {
        FtpControlConfig {
            max_line_len: 2048,
            max_multi_lines: 128,
            command_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FtpTransferConfig {
    pub list_max_line_len: usize,
    pub list_max_entries: usize,
    /// Wait time for the completion reply once the data channel is done.
    pub end_wait_timeout: Duration,
}

impl Default for FtpTransferConfig {
    fn default() -> Self {
        FtpTransferConfig {
            list_max_line_len: 2048,
            list_max_entries: 4096,
            end_wait_timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FtpClientConfig {
    pub control: FtpControlConfig,
    pub transfer: FtpTransferConfig,
    pub connect_timeout: Duration,
    pub greeting_timeout: Duration,
    /// Timeout of a single socket read or write, on both channels.
    pub socket_timeout: Option<Duration>,
    pub try_block_mode: bool,
    /// Capacity of each of the two path caches of a session.
    pub cache_size: NonZeroUsize,
    pub trace_connections: bool,
    pub pool: ResourcePoolConfig,
}

impl Default for FtpClientConfig {
    fn default() -> Self {
        FtpClientConfig {
            control: FtpControlConfig::default(),
            transfer: FtpTransferConfig::default(),
            connect_timeout: Duration::from_secs(30),
            greeting_timeout: Duration::from_secs(10),
            socket_timeout: Some(Duration::from_secs(60)),
            try_block_mode: true,
            cache_size: DEFAULT_CACHE_SIZE,
            trace_connections: false,
            pool: ResourcePoolConfig::default(),
        }
    }
}
