/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;

use thiserror::Error;

use super::{FtpCommandError, FtpTransferError};

#[derive(Debug, Error)]
pub enum FtpFileError {
    #[error("command error: {0}")]
    CommandError(FtpCommandError),
    #[error("service not available")]
    ServiceNotAvailable,
    #[error("file unavailable: {0}")]
    FileUnavailable(String),
    #[error("filename not allowed: {0}")]
    FileNameNotAllowed(String),
    #[error("insufficient storage space")]
    InsufficientStorageSpace,
    #[error("data transfer failed: {0}")]
    TransferFailed(#[from] FtpTransferError),
    #[error("local io failed: {0:?}")]
    LocalIoFailed(io::Error),
}

impl From<FtpCommandError> for FtpFileError {
    fn from(e: FtpCommandError) -> Self {
        match e {
            FtpCommandError::ServiceNotAvailable => FtpFileError::ServiceNotAvailable,
            _ => FtpFileError::CommandError(e),
        }
    }
}

impl FtpFileError {
    pub(crate) fn is_connection_broken(&self) -> bool {
        match self {
            FtpFileError::CommandError(e) => e.is_connection_broken(),
            FtpFileError::ServiceNotAvailable => true,
            _ => false,
        }
    }
}
