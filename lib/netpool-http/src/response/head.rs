/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::str::FromStr;

use http::{HeaderMap, Method, Version, header};
use tokio::io::AsyncBufRead;

use netpool_codec::HttpHeaderLine;
use netpool_io_ext::LimitedBufReadExt;

use crate::parse::{HttpResponseParseError, HttpStatusLine};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum HttpBodyType {
    ContentLength(u64),
    Chunked,
    ReadUntilEnd,
}

/// Status line and header section of a response.
#[derive(Debug)]
pub struct HttpResponseHead {
    pub version: Version,
    pub code: u16,
    pub reason: String,
    pub headers: HeaderMap,
    keep_alive: bool,
    content_length: Option<u64>,
    chunked: bool,
    has_transfer_encoding: bool,
}

impl HttpResponseHead {
    fn new(version: Version, code: u16, reason: String) -> Self {
        HttpResponseHead {
            version,
            code,
            reason,
            headers: HeaderMap::new(),
            keep_alive: version == Version::HTTP_11,
            content_length: None,
            chunked: false,
            has_transfer_encoding: false,
        }
    }

    /// The connection can carry another exchange once the body is consumed.
    #[inline]
    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    #[inline]
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    #[inline]
    pub fn is_interim(&self) -> bool {
        (100..200).contains(&self.code)
    }

    pub(crate) fn body_type(&self, method: &Method) -> Option<HttpBodyType> {
        if self.code < 200
            || self.code == 204
            || self.code == 205
            || self.code == 304
            || method == Method::HEAD
        {
            None
        } else if let Some(len) = self.content_length {
            if len > 0 {
                Some(HttpBodyType::ContentLength(len))
            } else {
                None
            }
        } else if self.chunked {
            Some(HttpBodyType::Chunked)
        } else {
            Some(HttpBodyType::ReadUntilEnd)
        }
    }

    pub async fn parse<R>(
        reader: &mut R,
        method: &Method,
        max_header_size: usize,
    ) -> Result<Self, HttpResponseParseError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut line_buf = Vec::<u8>::with_capacity(1024);
        let mut header_size: usize = 0;

        let (found, nr) = reader
            .limited_read_until(b'\n', max_header_size, &mut line_buf)
            .await?;
        if nr == 0 {
            return Err(HttpResponseParseError::RemoteClosed);
        }
        if !found {
            return if nr < max_header_size {
                Err(HttpResponseParseError::RemoteClosed)
            } else {
                Err(HttpResponseParseError::TooLargeHeader(max_header_size))
            };
        }
        header_size += nr;

        let status = HttpStatusLine::parse(line_buf.as_ref())
            .map_err(HttpResponseParseError::InvalidStatusLine)?;
        let mut rsp = HttpResponseHead::new(status.version, status.code, status.reason.to_string());

        loop {
            if header_size >= max_header_size {
                return Err(HttpResponseParseError::TooLargeHeader(max_header_size));
            }
            line_buf.clear();
            let max_len = max_header_size - header_size;
            let (found, nr) = reader
                .limited_read_until(b'\n', max_len, &mut line_buf)
                .await?;
            if nr == 0 {
                return Err(HttpResponseParseError::RemoteClosed);
            }
            if !found {
                return if nr < max_len {
                    Err(HttpResponseParseError::RemoteClosed)
                } else {
                    Err(HttpResponseParseError::TooLargeHeader(max_header_size))
                };
            }
            header_size += nr;
            if line_buf.as_slice() == b"\n" || line_buf.as_slice() == b"\r\n" {
                // header end line
                break;
            }

            rsp.parse_header_line(line_buf.as_ref())?;
        }

        if rsp.body_type(method) == Some(HttpBodyType::ReadUntilEnd) {
            rsp.keep_alive = false;
        }
        Ok(rsp)
    }

    fn parse_header_line(&mut self, line_buf: &[u8]) -> Result<(), HttpResponseParseError> {
        let header =
            HttpHeaderLine::parse(line_buf).map_err(HttpResponseParseError::InvalidHeaderLine)?;
        let (name, value) = header
            .to_http()
            .map_err(HttpResponseParseError::InvalidHeaderLine)?;

        match name.as_str() {
            "connection" | "proxy-connection" => {
                // keep-alive is ignored, HTTP/1.0 connections are never reused
                if header
                    .value
                    .split(',')
                    .any(|v| v.trim().eq_ignore_ascii_case("close"))
                {
                    self.keep_alive = false;
                }
            }
            "transfer-encoding" => {
                self.has_transfer_encoding = true;
                if self.content_length.take().is_some() {
                    self.headers.remove(header::CONTENT_LENGTH);
                    self.keep_alive = false; // according to rfc9112 Section 6.1
                }

                let v = header.value.to_lowercase();
                if v.ends_with("chunked") {
                    self.chunked = true;
                } else if v.contains("chunked") {
                    return Err(HttpResponseParseError::InvalidChunkedTransferEncoding);
                }
            }
            "content-length" => {
                if self.has_transfer_encoding {
                    // ignore content-length
                    self.keep_alive = false; // according to rfc9112 Section 6.1
                    return Ok(());
                }

                let content_length = u64::from_str(header.value)
                    .map_err(|_| HttpResponseParseError::InvalidContentLength)?;
                if let Some(len) = self.content_length {
                    if len != content_length {
                        return Err(HttpResponseParseError::InvalidContentLength);
                    }
                    return Ok(());
                }
                self.content_length = Some(content_length);
            }
            _ => {}
        }

        self.headers.append(name, value);
        Ok(())
    }
}
