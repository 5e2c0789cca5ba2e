/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io::{self, Write};

use flate2::Compression;
use flate2::write::GzEncoder;
use http::{HeaderMap, HeaderName, HeaderValue, Method, header};
use url::{Position, Url};

/// How the request body goes on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum BodyMode {
    None,
    /// Buffered, sent right after the head with a `Content-Length`.
    Fixed(u64),
    /// Streamed as chunks once the server sent 100 or the wait timed out.
    Chunked,
}

pub(super) struct RequestHead<'a> {
    pub(super) method: &'a Method,
    pub(super) url: &'a Url,
    pub(super) absolute_form: bool,
    pub(super) headers: &'a HeaderMap,
    pub(super) proxy_authorization: Option<&'a HeaderValue>,
    pub(super) user_agent: &'a str,
    pub(super) body: BodyMode,
    pub(super) gzip: bool,
    pub(super) trailer: Option<&'a HeaderMap>,
}

/// Set by the engine, never copied from the caller headers.
const FRAMING_HEADERS: [HeaderName; 5] = [
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
    header::EXPECT,
    header::TRAILER,
    header::PROXY_AUTHORIZATION,
];

fn write_header(buf: &mut Vec<u8>, name: &str, value: &[u8]) {
    buf.extend_from_slice(name.as_bytes());
    buf.extend_from_slice(b": ");
    buf.extend_from_slice(value);
    buf.extend_from_slice(b"\r\n");
}

impl RequestHead<'_> {
    fn request_target(&self) -> &str {
        if self.absolute_form {
            &self.url[..Position::AfterQuery]
        } else {
            &self.url[Position::BeforePath..Position::AfterQuery]
        }
    }

    pub(super) fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(512);
        let _ = write!(buf, "{} {} HTTP/1.1\r\n", self.method, self.request_target());

        if !self.headers.contains_key(header::HOST) {
            let host = self.url.host_str().unwrap_or_default();
            match self.url.port() {
                Some(port) => {
                    let _ = write!(buf, "Host: {host}:{port}\r\n");
                }
                None => write_header(&mut buf, "Host", host.as_bytes()),
            }
        }
        if !self.headers.contains_key(header::USER_AGENT) {
            write_header(&mut buf, "User-Agent", self.user_agent.as_bytes());
        }
        for (name, value) in self.headers.iter() {
            if FRAMING_HEADERS.contains(name) {
                continue;
            }
            write_header(&mut buf, name.as_str(), value.as_bytes());
        }
        if self.absolute_form {
            if let Some(v) = self.proxy_authorization {
                write_header(&mut buf, "Proxy-Authorization", v.as_bytes());
            }
        }
        if self.gzip {
            write_header(&mut buf, "Content-Encoding", b"gzip");
        }
        match self.body {
            BodyMode::None => {
                if *self.method == Method::POST || *self.method == Method::PUT {
                    buf.extend_from_slice(b"Content-Length: 0\r\n");
                }
            }
            BodyMode::Fixed(len) => {
                let mut b = itoa::Buffer::new();
                write_header(&mut buf, "Content-Length", b.format(len).as_bytes());
            }
            BodyMode::Chunked => {
                buf.extend_from_slice(b"Expect: 100-continue\r\n");
                buf.extend_from_slice(b"Transfer-Encoding: chunked\r\n");
                if let Some(trailer) = self.trailer {
                    let names: Vec<&str> = trailer.keys().map(|n| n.as_str()).collect();
                    if !names.is_empty() {
                        write_header(&mut buf, "Trailer", names.join(", ").as_bytes());
                    }
                }
            }
        }
        buf.extend_from_slice(b"\r\n");
        buf
    }
}

/// Content that would not shrink by another gzip pass.
pub(super) fn is_precompressed(headers: &HeaderMap) -> bool {
    if headers.contains_key(header::CONTENT_ENCODING) {
        return true;
    }
    let Some(content_type) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if mime.starts_with("image/") || mime.starts_with("video/") || mime.starts_with("audio/") {
        return !matches!(mime.as_str(), "image/svg+xml" | "image/bmp" | "audio/wav");
    }
    matches!(
        mime.as_str(),
        "application/zip"
            | "application/gzip"
            | "application/x-gzip"
            | "application/x-compress"
            | "application/x-bzip2"
            | "application/x-xz"
            | "application/x-7z-compressed"
            | "application/x-rar-compressed"
            | "application/zstd"
    )
}

pub(super) fn gzip(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}
