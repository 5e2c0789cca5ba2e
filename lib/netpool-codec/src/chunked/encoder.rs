/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io::{self, Write};
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use http::HeaderMap;
use tokio::io::AsyncWrite;

const DEFAULT_MAX_CHUNK_SIZE: usize = 64 * 1024;

/// Chunked transfer encoder.
///
/// Every non-empty write becomes one chunk. `poll_shutdown` writes the
/// terminating zero-length chunk, the trailer if set, and the final blank
/// line, then flushes. The inner writer itself is not shut down.
pub struct ChunkedEncodeWriter<W> {
    writer: W,
    max_chunk_size: usize,
    pending: Vec<u8>,
    pending_offset: usize,
    trailer: Option<HeaderMap>,
    closing: bool,
    finished: bool,
}

impl<W> ChunkedEncodeWriter<W> {
    pub fn new(writer: W) -> Self {
        ChunkedEncodeWriter {
            writer,
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            pending: Vec::with_capacity(DEFAULT_MAX_CHUNK_SIZE + 16),
            pending_offset: 0,
            trailer: None,
            closing: false,
            finished: false,
        }
    }

    pub fn set_max_chunk_size(&mut self, size: usize) {
        self.max_chunk_size = size.max(1);
    }

    /// The trailer is written after the terminating chunk.
    pub fn set_trailer(&mut self, trailer: HeaderMap) {
        self.trailer = Some(trailer);
    }

    pub fn finished(&self) -> bool {
        self.finished
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn push_end(&mut self) {
        self.pending.extend_from_slice(b"0\r\n");
        if let Some(trailer) = self.trailer.take() {
            for (name, value) in trailer.iter() {
                self.pending.extend_from_slice(name.as_str().as_bytes());
                self.pending.extend_from_slice(b": ");
                self.pending.extend_from_slice(value.as_bytes());
                self.pending.extend_from_slice(b"\r\n");
            }
        }
        self.pending.extend_from_slice(b"\r\n");
    }
}

impl<W> ChunkedEncodeWriter<W>
where
    W: AsyncWrite + Unpin,
{
    fn poll_write_pending(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        while self.pending_offset < self.pending.len() {
            let nw = ready!(
                Pin::new(&mut self.writer).poll_write(cx, &self.pending[self.pending_offset..])
            )?;
            if nw == 0 {
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "writer closed while writing chunk",
                )));
            }
            self.pending_offset += nw;
        }
        self.pending.clear();
        self.pending_offset = 0;
        Poll::Ready(Ok(()))
    }
}

impl<W> AsyncWrite for ChunkedEncodeWriter<W>
where
    W: AsyncWrite + Unpin,
{
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.closing {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "write after the last chunk",
            )));
        }
        ready!(self.poll_write_pending(cx))?;
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }

        let len = buf.len().min(self.max_chunk_size);
        let _ = write!(&mut self.pending, "{len:x}\r\n");
        self.pending.extend_from_slice(&buf[..len]);
        self.pending.extend_from_slice(b"\r\n");
        // the chunk is owned by us now, start sending but don't wait for it
        if let Poll::Ready(Err(e)) = self.poll_write_pending(cx) {
            return Poll::Ready(Err(e));
        }
        Poll::Ready(Ok(len))
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        ready!(self.poll_write_pending(cx))?;
        Pin::new(&mut self.writer).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        if !self.closing {
            ready!(self.poll_write_pending(cx))?;
            self.closing = true;
            self.push_end();
        }
        ready!(self.poll_write_pending(cx))?;
        ready!(Pin::new(&mut self.writer).poll_flush(cx))?;
        self.finished = true;
        Poll::Ready(Ok(()))
    }
}
