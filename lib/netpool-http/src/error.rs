/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;

use thiserror::Error;
use url::Url;

use netpool_resource::ResourcePoolError;
use netpool_types::net::UpstreamAddr;

use crate::parse::HttpResponseParseError;

#[derive(Debug, Error)]
pub enum HttpConnectError {
    #[error("connect to {0} timed out")]
    ConnectTimeout(UpstreamAddr),
    #[error("connect to {0} failed: {1:?}")]
    ConnectFailed(UpstreamAddr, io::Error),
    #[error("tls config for {0} unavailable: {1}")]
    TlsConfigUnavailable(UpstreamAddr, String),
    #[error("invalid tls server name {0}")]
    InvalidTlsServerName(String),
    #[error("tls handshake with {0} failed: {1:?}")]
    TlsHandshakeFailed(UpstreamAddr, io::Error),
    #[error("tunnel write failed: {0:?}")]
    TunnelWriteFailed(io::Error),
    #[error("invalid tunnel response: {0}")]
    TunnelResponse(#[from] HttpResponseParseError),
    #[error("proxy replied {0} {1} to tunnel request")]
    TunnelRefused(u16, String),
    #[error("unexpected data after tunnel response")]
    TunnelUnexpectedData,
}

impl HttpConnectError {
    /// Transport level failures that a fresh attempt may not hit again.
    pub fn is_transient(&self) -> bool {
        match self {
            HttpConnectError::ConnectTimeout(_)
            | HttpConnectError::ConnectFailed(..)
            | HttpConnectError::TlsHandshakeFailed(..)
            | HttpConnectError::TunnelWriteFailed(_) => true,
            HttpConnectError::TunnelResponse(e) => !e.is_malformed(),
            _ => false,
        }
    }

    pub(crate) fn into_io_error(self) -> io::Error {
        match self {
            HttpConnectError::ConnectFailed(_, e)
            | HttpConnectError::TlsHandshakeFailed(_, e)
            | HttpConnectError::TunnelWriteFailed(e) => e,
            HttpConnectError::TunnelResponse(e) => e.into_io_error(),
            HttpConnectError::ConnectTimeout(addr) => io::Error::new(
                io::ErrorKind::TimedOut,
                format!("connect to {addr} timed out"),
            ),
            e => io::Error::other(e),
        }
    }
}

#[derive(Debug, Error)]
pub enum HttpClientError {
    #[error("io failed: {0:?}")]
    Io(#[from] io::Error),
    /// A status the request could not get past, or -1 for a malformed response.
    #[error("{url} returned {code} {reason}")]
    Protocol { code: i32, reason: String, url: Url },
    #[error("no connection available: {0}")]
    Pool(ResourcePoolError<HttpConnectError>),
    #[error("tls failed: {0}")]
    Tls(HttpConnectError),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl HttpClientError {
    pub(crate) fn protocol(code: i32, reason: impl Into<String>, url: &Url) -> Self {
        HttpClientError::Protocol {
            code,
            reason: reason.into(),
            url: url.clone(),
        }
    }

    /// The status code of a protocol failure.
    pub fn status(&self) -> Option<i32> {
        match self {
            HttpClientError::Protocol { code, .. } => Some(*code),
            _ => None,
        }
    }
}
