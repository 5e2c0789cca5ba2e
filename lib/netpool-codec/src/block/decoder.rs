/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use tokio::io::{AsyncBufRead, AsyncRead, ReadBuf};

use super::{DESCRIPTOR_EOF, DESCRIPTOR_RESTART_MARKER};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DecodeState {
    Header,
    Data,
    Finished,
}

/// Block mode decoder. Restart marker blocks are skipped.
pub struct BlockDecodeReader<R> {
    reader: R,
    state: DecodeState,
    header: [u8; 3],
    header_len: usize,
    descriptor: u8,
    left_block_size: usize,
    delayed_error: Option<io::Error>,
}

impl<R> BlockDecodeReader<R> {
    pub fn new(reader: R) -> Self {
        BlockDecodeReader {
            reader,
            state: DecodeState::Header,
            header: [0; 3],
            header_len: 0,
            descriptor: 0,
            left_block_size: 0,
            delayed_error: None,
        }
    }

    pub fn finished(&self) -> bool {
        self.state == DecodeState::Finished
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    fn block_done(&mut self) {
        if self.descriptor & DESCRIPTOR_EOF != 0 {
            self.state = DecodeState::Finished;
        } else {
            self.state = DecodeState::Header;
        }
    }
}

impl<R> BlockDecodeReader<R>
where
    R: AsyncBufRead + Unpin,
{
    fn poll_decode(
        &mut self,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        loop {
            match self.state {
                DecodeState::Finished => return Poll::Ready(Ok(())),
                DecodeState::Header => {
                    let r_buf = ready!(Pin::new(&mut self.reader).poll_fill_buf(cx))?;
                    if r_buf.is_empty() {
                        return Poll::Ready(Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "reader closed before the end of file block",
                        )));
                    }
                    let to_copy = (3 - self.header_len).min(r_buf.len());
                    self.header[self.header_len..self.header_len + to_copy]
                        .copy_from_slice(&r_buf[..to_copy]);
                    Pin::new(&mut self.reader).consume(to_copy);
                    self.header_len += to_copy;
                    if self.header_len < 3 {
                        continue;
                    }
                    self.header_len = 0;
                    self.descriptor = self.header[0];
                    self.left_block_size =
                        u16::from_be_bytes([self.header[1], self.header[2]]) as usize;
                    if self.left_block_size == 0 {
                        self.block_done();
                    } else {
                        self.state = DecodeState::Data;
                    }
                }
                DecodeState::Data => {
                    let skip = self.descriptor & DESCRIPTOR_RESTART_MARKER != 0;
                    if !skip && buf.remaining() == 0 {
                        return Poll::Ready(Ok(()));
                    }
                    let r_buf = ready!(Pin::new(&mut self.reader).poll_fill_buf(cx))?;
                    if r_buf.is_empty() {
                        return Poll::Ready(Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "reader closed while reading block data",
                        )));
                    }
                    let mut to_copy = self.left_block_size.min(r_buf.len());
                    if !skip {
                        to_copy = to_copy.min(buf.remaining());
                        buf.put_slice(&r_buf[..to_copy]);
                    }
                    Pin::new(&mut self.reader).consume(to_copy);
                    self.left_block_size -= to_copy;
                    if self.left_block_size == 0 {
                        self.block_done();
                    }
                }
            }
        }
    }
}

impl<R> AsyncRead for BlockDecodeReader<R>
where
    R: AsyncBufRead + Unpin,
{
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if let Some(e) = self.delayed_error.take() {
            return Poll::Ready(Err(e));
        }
        let old_remaining = buf.remaining();
        match self.poll_decode(cx, buf) {
            Poll::Pending => {
                if old_remaining > buf.remaining() {
                    Poll::Ready(Ok(()))
                } else {
                    Poll::Pending
                }
            }
            Poll::Ready(Err(e)) if old_remaining > buf.remaining() => {
                // hand out the data first, the error goes with the next read
                self.delayed_error = Some(e);
                Poll::Ready(Ok(()))
            }
            Poll::Ready(r) => Poll::Ready(r),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, BufReader};

    #[tokio::test]
    async fn blocks() {
        let stream = tokio_test::io::Builder::new()
            .read(&[0x00, 0x00, 0x03])
            .read(b"abc")
            .read(&[0x00])
            .read(&[0x00, 0x02, b'd'])
            .read(&[b'e', 0x40, 0x00, 0x01, b'f'])
            .build();
        let mut reader = BlockDecodeReader::new(BufReader::new(stream));
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf.as_slice(), b"abcdef");
        assert!(reader.finished());
    }

    #[tokio::test]
    async fn skip_restart_marker() {
        let content = [
            0x00, 0x00, 0x02, b'a', b'b', 0x10, 0x00, 0x04, b'1', b'2', b'3', b'4', 0x40, 0x00,
            0x00,
        ];
        let mut reader = BlockDecodeReader::new(BufReader::new(&content[..]));
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf.as_slice(), b"ab");
        assert!(reader.finished());
    }

    #[tokio::test]
    async fn stop_at_eof_block() {
        let content = [0x40, 0x00, 0x00, b'x', b'y'];
        let mut inner = BufReader::new(&content[..]);
        let mut reader = BlockDecodeReader::new(&mut inner);
        let mut buf = Vec::new();
        assert_eq!(reader.read_to_end(&mut buf).await.unwrap(), 0);
        assert!(reader.finished());

        let mut left = Vec::new();
        inner.read_to_end(&mut left).await.unwrap();
        assert_eq!(left.as_slice(), b"xy");
    }

    #[tokio::test]
    async fn short_block() {
        let content = [0x40, 0x00, 0x05, b'a', b'b'];
        let mut reader = BlockDecodeReader::new(BufReader::new(&content[..]));
        let mut buf = Vec::new();
        let e = reader.read_to_end(&mut buf).await.unwrap_err();
        assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn missing_eof_block() {
        let content = [0x00, 0x00, 0x01, b'a'];
        let mut reader = BlockDecodeReader::new(BufReader::new(&content[..]));
        let mut buf = Vec::new();
        let e = reader.read_to_end(&mut buf).await.unwrap_err();
        assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn data_before_error() {
        let content = [0x00, 0x00, 0x04, b'a', b'b'];
        let mut reader = BlockDecodeReader::new(BufReader::new(&content[..]));
        let mut buf = [0u8; 8];
        let len = reader.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"ab");
        let e = reader.read(&mut buf).await.unwrap_err();
        assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof);
        assert!(!reader.finished());
    }
}
