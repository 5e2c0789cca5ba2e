/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, BufReader, ReadBuf};
use tokio::net::TcpStream;

use netpool_codec::block::{BlockDecodeReader, BlockEncodeWriter};
use netpool_io_ext::TimeoutStream;

mod line;
pub(crate) use line::{FtpLineDataReceiver, FtpLineDataTransfer};

pub(crate) type FtpDataStream = TimeoutStream<TcpStream>;

/// Data channel framing negotiated by `MODE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FtpTransferMode {
    /// The end of data is the close of the data connection.
    Stream,
    /// Data is framed in blocks with an explicit end of file block.
    Block,
}

impl FtpTransferMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FtpTransferMode::Stream => "stream",
            FtpTransferMode::Block => "block",
        }
    }
}

pub(crate) enum FtpDataReader {
    Stream(FtpDataStream),
    Block(BlockDecodeReader<BufReader<FtpDataStream>>),
}

impl FtpDataReader {
    pub(crate) fn new(stream: FtpDataStream, mode: FtpTransferMode) -> Self {
        match mode {
            FtpTransferMode::Stream => FtpDataReader::Stream(stream),
            FtpTransferMode::Block => {
                FtpDataReader::Block(BlockDecodeReader::new(BufReader::new(stream)))
            }
        }
    }
}

impl AsyncRead for FtpDataReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            FtpDataReader::Stream(s) => Pin::new(s).poll_read(cx, buf),
            FtpDataReader::Block(r) => Pin::new(r).poll_read(cx, buf),
        }
    }
}

pub(crate) enum FtpDataWriter {
    Stream(FtpDataStream),
    Block(BlockEncodeWriter<FtpDataStream>),
}

impl FtpDataWriter {
    pub(crate) fn new(stream: FtpDataStream, mode: FtpTransferMode) -> Self {
        match mode {
            FtpTransferMode::Stream => FtpDataWriter::Stream(stream),
            FtpTransferMode::Block => FtpDataWriter::Block(BlockEncodeWriter::new(stream)),
        }
    }
}

impl AsyncWrite for FtpDataWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            FtpDataWriter::Stream(s) => Pin::new(s).poll_write(cx, buf),
            FtpDataWriter::Block(w) => Pin::new(w).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            FtpDataWriter::Stream(s) => Pin::new(s).poll_flush(cx),
            FtpDataWriter::Block(w) => Pin::new(w).poll_flush(cx),
        }
    }

    /// In block mode this sends the end of file block before closing.
    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            FtpDataWriter::Stream(s) => Pin::new(s).poll_shutdown(cx),
            FtpDataWriter::Block(w) => Pin::new(w).poll_shutdown(cx),
        }
    }
}
