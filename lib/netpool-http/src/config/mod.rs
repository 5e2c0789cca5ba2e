/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::time::Duration;

use netpool_resource::ResourcePoolConfig;

#[cfg(feature = "yaml")]
mod yaml;

const DEFAULT_USER_AGENT: &str = concat!("netpool/", env!("CARGO_PKG_VERSION"));

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HttpClientConfig {
    pub connect_timeout: Duration,
    /// Timeout of a single socket read or write.
    pub socket_timeout: Option<Duration>,
    pub max_header_size: usize,
    pub max_chunk_line_size: usize,
    pub max_trailer_size: usize,
    pub max_retries: usize,
    /// Base of the linear backoff between two retries.
    pub retry_interval: Duration,
    pub max_redirects: usize,
    /// Unread response bytes that may be skipped to keep a connection.
    pub max_drain_size: u64,
    /// Send a deferred body anyway if no interim response arrived in time.
    pub expect_continue_timeout: Duration,
    pub compression: bool,
    pub expect_continue: bool,
    pub trace_connections: bool,
    /// Retry authentication even if the same challenge came back.
    pub interactive_auth: bool,
    pub user_agent: String,
    pub pool: ResourcePoolConfig,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        HttpClientConfig {
            connect_timeout: Duration::from_secs(30),
            socket_timeout: Some(Duration::from_secs(60)),
            max_header_size: 64 * 1024,
            max_chunk_line_size: 1024,
            max_trailer_size: 16 * 1024,
            max_retries: 3,
            retry_interval: Duration::from_millis(500),
            max_redirects: 10,
            max_drain_size: 64 * 1024,
            expect_continue_timeout: Duration::from_secs(1),
            compression: false,
            expect_continue: true,
            trace_connections: false,
            interactive_auth: false,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            pool: ResourcePoolConfig::default(),
        }
    }
}

impl HttpClientConfig {
    /// Linear backoff: the n-th retry (starting at 1) waits n intervals.
    pub(crate) fn retry_delay(&self, retry: usize) -> Duration {
        self.retry_interval
            .saturating_mul(u32::try_from(retry).unwrap_or(u32::MAX))
    }
}
