/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;

use thiserror::Error;

use netpool_codec::HttpLineParseError;

#[derive(Debug, Error)]
pub enum HttpResponseParseError {
    #[error("remote closed")]
    RemoteClosed,
    #[error("too large header, should be less than {0}")]
    TooLargeHeader(usize),
    #[error("invalid status line: {0}")]
    InvalidStatusLine(HttpLineParseError),
    #[error("invalid header line: {0}")]
    InvalidHeaderLine(HttpLineParseError),
    #[error("invalid chunked transfer-encoding")]
    InvalidChunkedTransferEncoding,
    #[error("invalid content length")]
    InvalidContentLength,
    #[error("io failed: {0:?}")]
    IoFailed(#[from] io::Error),
}

impl HttpResponseParseError {
    /// The peer sent something, but not a valid HTTP/1.x response.
    pub fn is_malformed(&self) -> bool {
        !matches!(
            self,
            HttpResponseParseError::RemoteClosed | HttpResponseParseError::IoFailed(_)
        )
    }

    pub fn into_io_error(self) -> io::Error {
        match self {
            HttpResponseParseError::IoFailed(e) => e,
            HttpResponseParseError::RemoteClosed => io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "remote closed before response",
            ),
            e => io::Error::new(io::ErrorKind::InvalidData, e),
        }
    }
}
