/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

mod cache;
mod transfer;

mod config;
pub use config::{FtpClientConfig, FtpControlConfig, FtpTransferConfig};

mod error;
pub use error::{
    FtpClientError, FtpCommandError, FtpConnectError, FtpFileError, FtpLineDataReadError,
    FtpRawResponseError, FtpSessionOpenError, FtpTransferError,
};

mod control;
pub use control::FtpCommand;

mod connection;
pub use connection::{FtpConnection, FtpConnectionFactory, FtpPoolKey};
pub use transfer::FtpTransferMode;

mod client;
pub use client::{FtpClient, FtpClientBuilder};

pub mod trace;
