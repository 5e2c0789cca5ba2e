/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use super::FtpCommandError;

#[derive(Debug, Error)]
pub enum FtpLineDataReadError {
    #[error("read failed: {0:?}")]
    ReadFailed(io::Error),
    #[error("line too long")]
    LineTooLong,
    #[error("too many lines")]
    TooManyLines,
    #[error("line is not utf8")]
    LineIsNotUtf8,
}

#[derive(Debug, Error)]
pub enum FtpTransferError {
    #[error("no valid passive address in reply")]
    NoPassiveAddress,
    #[error("data connect to {0} failed: {1:?}")]
    ConnectFailed(SocketAddr, io::Error),
    #[error("timed out to connect to data port {0}")]
    ConnectTimedOut(SocketAddr),
    #[error("data read failed: {0:?}")]
    ReadFailed(io::Error),
    #[error("data write failed: {0:?}")]
    WriteFailed(io::Error),
    #[error("line data read failed: {0}")]
    LineDataReadFailed(#[from] FtpLineDataReadError),
    #[error("server aborted the transfer with reply {0}")]
    AbortedByServer(u16),
    #[error("timeout to wait end reply")]
    TimeoutToWaitEndReply,
    #[error("unexpected end reply code {0}")]
    UnexpectedEndReply(u16),
    #[error("end reply error: {0}")]
    EndReplyFailed(FtpCommandError),
}
