/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use thiserror::Error;
use url::Url;

use netpool_resource::ResourcePoolError;

mod response;
pub use response::FtpRawResponseError;

mod command;
pub use command::FtpCommandError;

mod connect;
pub use connect::FtpConnectError;

mod session;
pub use session::FtpSessionOpenError;

mod transfer;
pub use transfer::{FtpLineDataReadError, FtpTransferError};

mod file;
pub use file::FtpFileError;

#[derive(Debug, Error)]
pub enum FtpClientError {
    #[error("invalid ftp url {0}: {1}")]
    InvalidUrl(Url, &'static str),
    #[error("no ftp session: {0}")]
    Pool(#[from] ResourcePoolError<FtpSessionOpenError>),
    #[error("{0}")]
    File(#[from] FtpFileError),
}
