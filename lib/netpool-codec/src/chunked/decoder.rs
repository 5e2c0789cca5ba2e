/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use http::HeaderMap;
use tokio::io::{AsyncBufRead, AsyncRead, ReadBuf};

use super::HttpChunkedLine;
use crate::HttpHeaderLine;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DecodeState {
    ChunkSize,
    ChunkData,
    ChunkEnd,
    Trailer,
    Finished,
}

/// Decode a chunked transfer encoded body.
///
/// The inner reader is left positioned right after the final blank line, so
/// it can be reused for the next message.
pub struct ChunkedDecodeReader<R> {
    reader: R,
    state: DecodeState,
    line: Vec<u8>,
    max_line_size: usize,
    left_chunk_size: u64,
    trailer: Option<HeaderMap>,
    trailer_size: usize,
    max_trailer_size: usize,
    delayed_error: Option<io::Error>,
}

impl<R> ChunkedDecodeReader<R> {
    pub fn new(reader: R, max_line_size: usize) -> Self {
        ChunkedDecodeReader {
            reader,
            state: DecodeState::ChunkSize,
            line: Vec::with_capacity(32),
            max_line_size,
            left_chunk_size: 0,
            trailer: None,
            trailer_size: 0,
            max_trailer_size: 0,
            delayed_error: None,
        }
    }

    /// Keep the trailer header lines instead of discarding them.
    pub fn with_trailer(mut self, max_trailer_size: usize) -> Self {
        self.trailer = Some(HeaderMap::new());
        self.max_trailer_size = max_trailer_size;
        self
    }

    pub fn finished(&self) -> bool {
        self.state == DecodeState::Finished
    }

    /// Only available if trailer parsing is enabled.
    pub fn trailer(&self) -> Option<&HeaderMap> {
        self.trailer.as_ref()
    }

    pub fn take_trailer(&mut self) -> Option<HeaderMap> {
        self.trailer.take()
    }

    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R> ChunkedDecodeReader<R>
where
    R: AsyncBufRead + Unpin,
{
    fn poll_line(&mut self, cx: &mut Context<'_>, stage: &'static str) -> Poll<io::Result<()>> {
        loop {
            let r_buf = ready!(Pin::new(&mut self.reader).poll_fill_buf(cx))?;
            if r_buf.is_empty() {
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("reader closed while reading {stage}"),
                )));
            }

            let (found, len) = match memchr::memchr(b'\n', r_buf) {
                Some(p) => (true, p + 1),
                None => (false, r_buf.len()),
            };
            if self.line.len() + len > self.max_line_size {
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("{stage} too long (> {})", self.max_line_size),
                )));
            }
            self.line.extend_from_slice(&r_buf[..len]);
            Pin::new(&mut self.reader).consume(len);
            if found {
                return Poll::Ready(Ok(()));
            }
        }
    }

    fn handle_trailer_line(&mut self) -> io::Result<()> {
        let Some(trailer) = &mut self.trailer else {
            return Ok(());
        };
        self.trailer_size += self.line.len();
        if self.trailer_size > self.max_trailer_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("trailer too large (> {})", self.max_trailer_size),
            ));
        }
        let header = HttpHeaderLine::parse(&self.line)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let (name, value) = header
            .to_http()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        trailer.append(name, value);
        Ok(())
    }

    fn poll_decode(
        &mut self,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        loop {
            match self.state {
                DecodeState::Finished => return Poll::Ready(Ok(())),
                DecodeState::ChunkSize => {
                    ready!(self.poll_line(cx, "chunk size line"))?;
                    let chunk_line = HttpChunkedLine::parse(&self.line)
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                    self.left_chunk_size = chunk_line.chunk_size;
                    self.line.clear();
                    if self.left_chunk_size == 0 {
                        self.state = DecodeState::Trailer;
                    } else {
                        self.state = DecodeState::ChunkData;
                    }
                }
                DecodeState::ChunkData => {
                    if buf.remaining() == 0 {
                        return Poll::Ready(Ok(()));
                    }
                    let r_buf = ready!(Pin::new(&mut self.reader).poll_fill_buf(cx))?;
                    if r_buf.is_empty() {
                        return Poll::Ready(Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "reader closed while reading chunk data",
                        )));
                    }
                    let to_copy = usize::try_from(self.left_chunk_size)
                        .unwrap_or(usize::MAX)
                        .min(buf.remaining())
                        .min(r_buf.len());
                    buf.put_slice(&r_buf[..to_copy]);
                    Pin::new(&mut self.reader).consume(to_copy);
                    self.left_chunk_size -= to_copy as u64;
                    if self.left_chunk_size == 0 {
                        self.state = DecodeState::ChunkEnd;
                    }
                }
                DecodeState::ChunkEnd => {
                    ready!(self.poll_line(cx, "chunk data end"))?;
                    if !matches!(self.line.as_slice(), b"\r\n" | b"\n") {
                        return Poll::Ready(Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            "no line end found after chunk data",
                        )));
                    }
                    self.line.clear();
                    self.state = DecodeState::ChunkSize;
                }
                DecodeState::Trailer => {
                    ready!(self.poll_line(cx, "trailer line"))?;
                    if matches!(self.line.as_slice(), b"\r\n" | b"\n") {
                        self.state = DecodeState::Finished;
                    } else {
                        self.handle_trailer_line()?;
                    }
                    self.line.clear();
                }
            }
        }
    }
}

impl<R> AsyncRead for ChunkedDecodeReader<R>
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
    async fn single_chunk() {
        let content = b"5\r\nhello\r\n0\r\n\r\nXXX";
        let stream = tokio_test::io::Builder::new().read(content).build();
        let mut buf_stream = BufReader::new(stream);
        let mut body_reader = ChunkedDecodeReader::new(&mut buf_stream, 1024);

        let mut buf = Vec::new();
        body_reader.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf.as_slice(), b"hello");
        assert!(body_reader.finished());

        let mut left = Vec::new();
        buf_stream.read_to_end(&mut left).await.unwrap();
        assert_eq!(left.as_slice(), b"XXX");
    }

    #[tokio::test]
    async fn split_everywhere() {
        let stream = tokio_test::io::Builder::new()
            .read(b"3;ext=1\r")
            .read(b"\nabc")
            .read(b"\r\n4\r\nde")
            .read(b"fg\r")
            .read(b"\n0\r\n")
            .read(b"\r\n")
            .build();
        let mut body_reader = ChunkedDecodeReader::new(BufReader::new(stream), 1024);

        let mut buf = Vec::new();
        body_reader.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf.as_slice(), b"abcdefg");
        assert!(body_reader.finished());
    }

    #[tokio::test]
    async fn with_trailer() {
        let content = b"2\r\nok\r\n0\r\nChecksum: abc\r\nExpires: never\r\n\r\n";
        let stream = tokio_test::io::Builder::new().read(content).build();
        let mut body_reader =
            ChunkedDecodeReader::new(BufReader::new(stream), 1024).with_trailer(4096);

        let mut buf = Vec::new();
        body_reader.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf.as_slice(), b"ok");
        let trailer = body_reader.take_trailer().unwrap();
        assert_eq!(trailer.len(), 2);
        assert_eq!(trailer.get("checksum").unwrap(), "abc");
    }

    #[tokio::test]
    async fn trailer_skipped() {
        let content = b"0\r\nChecksum: abc\r\n\r\n";
        let stream = tokio_test::io::Builder::new().read(content).build();
        let mut body_reader = ChunkedDecodeReader::new(BufReader::new(stream), 1024);

        let mut buf = Vec::new();
        let len = body_reader.read_to_end(&mut buf).await.unwrap();
        assert_eq!(len, 0);
        assert!(body_reader.finished());
        assert!(body_reader.trailer().is_none());
    }

    #[tokio::test]
    async fn truncated_data() {
        let content = b"a\r\nhello";
        let stream = tokio_test::io::Builder::new().read(content).build();
        let mut body_reader = ChunkedDecodeReader::new(BufReader::new(stream), 1024);

        let mut buf = Vec::new();
        let e = body_reader.read_to_end(&mut buf).await.unwrap_err();
        assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof);
        assert!(!body_reader.finished());
    }

    #[tokio::test]
    async fn missing_data_end() {
        let content = b"2\r\nokXX0\r\n\r\n";
        let stream = tokio_test::io::Builder::new().read(content).build();
        let mut body_reader = ChunkedDecodeReader::new(BufReader::new(stream), 1024);

        let mut buf = Vec::new();
        let e = body_reader.read_to_end(&mut buf).await.unwrap_err();
        assert_eq!(e.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn missing_terminal_chunk() {
        let content = b"2\r\nok\r\n";
        let stream = tokio_test::io::Builder::new().read(content).build();
        let mut body_reader = ChunkedDecodeReader::new(BufReader::new(stream), 1024);

        let mut buf = Vec::new();
        let e = body_reader.read_to_end(&mut buf).await.unwrap_err();
        assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn data_before_error() {
        let content = b"a\r\nhello";
        let stream = tokio_test::io::Builder::new().read(content).build();
        let mut body_reader = ChunkedDecodeReader::new(BufReader::new(stream), 1024);

        let mut buf = [0u8; 16];
        let len = body_reader.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"hello");
        let e = body_reader.read(&mut buf).await.unwrap_err();
        assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof);
    }
}
