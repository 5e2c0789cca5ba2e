/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use http::{HeaderMap, HeaderValue, Method, Version, header};
use tokio::io::{AsyncBufRead, AsyncRead, AsyncReadExt, ReadBuf};
use url::Url;

use netpool_codec::chunked::ChunkedDecodeReader;

use super::head::{HttpBodyType, HttpResponseHead};
use crate::connection::PooledConnection;

enum BodyReader {
    Fixed {
        conn: PooledConnection,
        left: u64,
    },
    Chunked(Box<ChunkedDecodeReader<PooledConnection>>),
    UntilEof(PooledConnection),
    Done,
}

/// A response whose body is read from a pooled connection.
///
/// The connection goes back to the pool once the body has been read to the
/// end. Dropping an unfinished response closes the connection.
#[must_use = "the response body must be read or dropped to free its connection"]
pub struct HttpResponse {
    head: HttpResponseHead,
    url: Url,
    reader: BodyReader,
    trailer: Option<HeaderMap>,
    received: u64,
}

impl HttpResponse {
    pub(crate) fn new(
        head: HttpResponseHead,
        method: &Method,
        url: Url,
        conn: PooledConnection,
        max_chunk_line_size: usize,
        max_trailer_size: usize,
    ) -> Self {
        let reader = match head.body_type(method) {
            None => {
                if head.keep_alive() {
                    conn.release();
                } else {
                    conn.close();
                }
                BodyReader::Done
            }
            Some(HttpBodyType::ContentLength(left)) => BodyReader::Fixed { conn, left },
            Some(HttpBodyType::Chunked) => BodyReader::Chunked(Box::new(
                ChunkedDecodeReader::new(conn, max_chunk_line_size).with_trailer(max_trailer_size),
            )),
            Some(HttpBodyType::ReadUntilEnd) => BodyReader::UntilEof(conn),
        };
        HttpResponse {
            head,
            url,
            reader,
            trailer: None,
            received: 0,
        }
    }

    #[inline]
    pub fn code(&self) -> u16 {
        self.head.code
    }

    #[inline]
    pub fn reason(&self) -> &str {
        &self.head.reason
    }

    #[inline]
    pub fn version(&self) -> Version {
        self.head.version
    }

    /// After a chunked body is finished the transfer coding is replaced by
    /// the `Content-Length` actually received.
    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    /// Only set after a chunked body with trailer fields is finished.
    #[inline]
    pub fn trailer(&self) -> Option<&HeaderMap> {
        self.trailer.as_ref()
    }

    /// The final URL after redirects.
    #[inline]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The whole body has been read and the connection released.
    pub fn is_finished(&self) -> bool {
        matches!(self.reader, BodyReader::Done)
    }

    pub async fn bytes(mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    /// Skip at most `max_size` bytes of the remaining body.
    ///
    /// Return whether the body reached its end, in which case the connection
    /// has been given back to the pool.
    pub(crate) async fn drain(mut self, max_size: u64) -> bool {
        let mut sink = tokio::io::sink();
        let mut limited = (&mut self).take(max_size.saturating_add(1));
        match tokio::io::copy(&mut limited, &mut sink).await {
            Ok(_) => self.is_finished(),
            Err(_) => false,
        }
    }

    fn finish(&mut self) {
        match std::mem::replace(&mut self.reader, BodyReader::Done) {
            BodyReader::Fixed { conn, .. } => {
                if self.head.keep_alive() {
                    conn.release();
                } else {
                    conn.close();
                }
            }
            BodyReader::Chunked(decoder) => {
                let mut decoder = *decoder;
                self.trailer = decoder.take_trailer().filter(|t| !t.is_empty());
                self.head.headers.remove(header::TRANSFER_ENCODING);
                self.head
                    .headers
                    .insert(header::CONTENT_LENGTH, HeaderValue::from(self.received));
                let conn = decoder.into_inner();
                if self.head.keep_alive() {
                    conn.release();
                } else {
                    conn.close();
                }
            }
            BodyReader::UntilEof(conn) => conn.close(),
            BodyReader::Done => {}
        }
    }

    fn abort(&mut self) {
        match std::mem::replace(&mut self.reader, BodyReader::Done) {
            BodyReader::Fixed { conn, .. } | BodyReader::UntilEof(conn) => conn.close(),
            BodyReader::Chunked(decoder) => decoder.into_inner().close(),
            BodyReader::Done => {}
        }
    }
}

fn copy_buffered(
    conn: &mut PooledConnection,
    cx: &mut Context<'_>,
    buf: &mut ReadBuf<'_>,
    limit: u64,
) -> Poll<io::Result<usize>> {
    let data = ready!(Pin::new(&mut *conn).poll_fill_buf(cx))?;
    let n = data
        .len()
        .min(buf.remaining())
        .min(usize::try_from(limit).unwrap_or(usize::MAX));
    buf.put_slice(&data[..n]);
    Pin::new(conn).consume(n);
    Poll::Ready(Ok(n))
}

impl AsyncRead for HttpResponse {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }
        let r = match &mut this.reader {
            BodyReader::Done => return Poll::Ready(Ok(())),
            BodyReader::Fixed { conn, left } => match ready!(copy_buffered(conn, cx, buf, *left)) {
                Ok(0) => Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("connection closed with {left} body bytes left"),
                )),
                Ok(n) => {
                    *left -= n as u64;
                    this.received += n as u64;
                    if *left == 0 {
                        this.finish();
                    }
                    Ok(())
                }
                Err(e) => Err(e),
            },
            BodyReader::Chunked(decoder) => {
                let filled = buf.filled().len();
                match ready!(Pin::new(decoder.as_mut()).poll_read(cx, buf)) {
                    Ok(()) => {
                        this.received += (buf.filled().len() - filled) as u64;
                        if decoder.finished() {
                            this.finish();
                        }
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }
            BodyReader::UntilEof(conn) => match ready!(copy_buffered(conn, cx, buf, u64::MAX)) {
                Ok(0) => {
                    this.finish();
                    Ok(())
                }
                Ok(n) => {
                    this.received += n as u64;
                    Ok(())
                }
                Err(e) => Err(e),
            },
        };
        if r.is_err() {
            this.abort();
        }
        Poll::Ready(r)
    }
}

impl Drop for HttpResponse {
    fn drop(&mut self) {
        self.abort();
    }
}
