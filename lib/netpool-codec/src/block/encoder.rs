/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use tokio::io::AsyncWrite;

use super::{DESCRIPTOR_EOF, MAX_BLOCK_SIZE};

/// Block mode encoder.
///
/// `poll_shutdown` writes the end of file block and flushes, then shuts
/// down the inner writer.
pub struct BlockEncodeWriter<W> {
    writer: W,
    pending: Vec<u8>,
    pending_offset: usize,
    closing: bool,
}

impl<W> BlockEncodeWriter<W> {
    pub fn new(writer: W) -> Self {
        BlockEncodeWriter {
            writer,
            pending: Vec::with_capacity(MAX_BLOCK_SIZE + 3),
            pending_offset: 0,
            closing: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W> BlockEncodeWriter<W>
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
                    "writer closed while writing block",
                )));
            }
            self.pending_offset += nw;
        }
        self.pending.clear();
        self.pending_offset = 0;
        Poll::Ready(Ok(()))
    }
}

impl<W> AsyncWrite for BlockEncodeWriter<W>
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
                "write after the end of file block",
            )));
        }
        ready!(self.poll_write_pending(cx))?;
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }

        let len = buf.len().min(MAX_BLOCK_SIZE);
        self.pending.push(0);
        self.pending.extend_from_slice(&(len as u16).to_be_bytes());
        self.pending.extend_from_slice(&buf[..len]);
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
            self.pending.extend_from_slice(&[DESCRIPTOR_EOF, 0, 0]);
        }
        ready!(self.poll_write_pending(cx))?;
        ready!(Pin::new(&mut self.writer).poll_flush(cx))?;
        Pin::new(&mut self.writer).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockDecodeReader;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};

    #[tokio::test]
    async fn frames() {
        let mut out = Vec::new();
        let mut writer = BlockEncodeWriter::new(&mut out);
        writer.write_all(b"abc").await.unwrap();
        writer.shutdown().await.unwrap();
        assert_eq!(out.as_slice(), &[0, 0, 3, b'a', b'b', b'c', 0x40, 0, 0]);
    }

    #[tokio::test]
    async fn split_large_write() {
        let body = vec![7u8; MAX_BLOCK_SIZE + 10];
        let mut out = Vec::new();
        let mut writer = BlockEncodeWriter::new(&mut out);
        writer.write_all(&body).await.unwrap();
        writer.shutdown().await.unwrap();
        assert_eq!(&out[..3], &[0, 0xff, 0xff]);
        assert_eq!(out.len(), body.len() + 3 * 3);

        let mut reader = BlockDecodeReader::new(BufReader::new(out.as_slice()));
        let mut decoded = Vec::new();
        reader.read_to_end(&mut decoded).await.unwrap();
        assert_eq!(decoded, body);
    }
}
