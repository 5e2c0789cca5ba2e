/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use thiserror::Error;

use super::{FtpCommandError, FtpConnectError};

#[derive(Debug, Error)]
pub enum FtpSessionOpenError {
    #[error("connect failed: {0}")]
    ConnectFailed(#[from] FtpConnectError),
    #[error("raw command error: {0}")]
    RawCommandError(FtpCommandError),
    #[error("service not available")]
    ServiceNotAvailable,
    #[error("not logged in")]
    NotLoggedIn,
    #[error("extra account is needed")]
    AccountIsNeeded,
}

impl From<FtpCommandError> for FtpSessionOpenError {
    fn from(e: FtpCommandError) -> Self {
        match e {
            FtpCommandError::ServiceNotAvailable => FtpSessionOpenError::ServiceNotAvailable,
            FtpCommandError::NotLoggedIn => FtpSessionOpenError::NotLoggedIn,
            _ => FtpSessionOpenError::RawCommandError(e),
        }
    }
}
