/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;

use thiserror::Error;

use netpool_types::net::UpstreamAddr;

use super::FtpCommandError;

#[derive(Debug, Error)]
pub enum FtpConnectError {
    #[error("connect to {0} failed: {1:?}")]
    ConnectFailed(UpstreamAddr, io::Error),
    #[error("timed out to connect to {0}")]
    ConnectTimedOut(UpstreamAddr),
    #[error("timed out to receive greetings")]
    GreetingTimedOut,
    #[error("greeting failed: {0}")]
    GreetingFailed(FtpCommandError),
    #[error("service not available")]
    ServiceNotAvailable,
}
