/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::FutureExt;
use futures_util::future::poll_fn;
use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite, BufReader, ReadBuf};

use netpool_io_ext::TimeoutStream;
use netpool_resource::{PoolHandle, ResourceAdapter};
use netpool_types::net::UpstreamAddr;

mod stream;
pub use stream::HttpStream;

mod tunnel;

mod factory;
pub use factory::{HttpConnectionFactory, HttpPoolKey, SameEndpoint};

/// One pooled transport connection to an origin server or proxy.
pub struct HttpConnection {
    stream: BufReader<TimeoutStream<HttpStream>>,
    peer: UpstreamAddr,
    must_close: bool,
    in_exchange: bool,
    exchanges: usize,
}

impl HttpConnection {
    pub(crate) fn new(
        stream: HttpStream,
        peer: UpstreamAddr,
        config: &crate::HttpClientConfig,
    ) -> Self {
        HttpConnection {
            stream: BufReader::new(TimeoutStream::new(stream, config.socket_timeout)),
            peer,
            must_close: false,
            in_exchange: false,
            exchanges: 0,
        }
    }

    #[inline]
    pub fn peer(&self) -> &UpstreamAddr {
        &self.peer
    }

    pub fn is_tls(&self) -> bool {
        self.stream.get_ref().get_ref().is_tls()
    }

    /// Exchanges started on this connection, including the current one.
    #[inline]
    pub fn exchanges(&self) -> usize {
        self.exchanges
    }

    /// Until [`Self::finish_exchange`] is called the connection is not reusable.
    pub(crate) fn start_exchange(&mut self) {
        self.exchanges += 1;
        self.in_exchange = true;
    }

    pub(crate) fn finish_exchange(&mut self) {
        self.in_exchange = false;
    }

    pub fn set_must_close(&mut self) {
        self.must_close = true;
    }
}

impl ResourceAdapter for HttpConnection {
    fn is_alive(&mut self) -> bool {
        if self.must_close || !self.stream.buffer().is_empty() {
            return false;
        }
        // an idle connection must have nothing to read, not even EOF
        let inner = self.stream.get_mut().get_mut();
        let mut probe = [0u8; 1];
        let mut buf = ReadBuf::new(&mut probe);
        poll_fn(|cx| Pin::new(&mut *inner).poll_read(cx, &mut buf))
            .now_or_never()
            .is_none()
    }

    fn must_close(&self) -> bool {
        self.must_close || self.in_exchange
    }

    fn close(&mut self) {
        log::debug!(
            "close http connection to {} after {} exchanges",
            self.peer,
            self.exchanges
        );
    }
}

impl AsyncRead for HttpConnection {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_read(cx, buf)
    }
}

impl AsyncBufRead for HttpConnection {
    fn poll_fill_buf(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<&[u8]>> {
        Pin::new(&mut self.get_mut().stream).poll_fill_buf(cx)
    }

    fn consume(self: Pin<&mut Self>, amt: usize) {
        Pin::new(&mut self.get_mut().stream).consume(amt)
    }
}

impl AsyncWrite for HttpConnection {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().stream).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_shutdown(cx)
    }
}

/// A pooled connection usable as an owned byte stream.
pub struct PooledConnection(PoolHandle<HttpConnectionFactory>);

impl PooledConnection {
    pub(crate) fn new(handle: PoolHandle<HttpConnectionFactory>) -> Self {
        PooledConnection(handle)
    }

    pub(crate) fn conn(&mut self) -> &mut HttpConnection {
        &mut self.0
    }

    /// The exchange completed cleanly. Give the connection back to the pool
    /// unless it was marked for closing.
    pub(crate) fn release(mut self) {
        self.0.finish_exchange();
        self.0.release();
    }

    pub(crate) fn close(mut self) {
        self.0.set_must_close();
        self.0.release();
    }
}

impl AsyncRead for PooledConnection {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut *self.get_mut().0).poll_read(cx, buf)
    }
}

impl AsyncBufRead for PooledConnection {
    fn poll_fill_buf(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<&[u8]>> {
        Pin::new(&mut *self.get_mut().0).poll_fill_buf(cx)
    }

    fn consume(self: Pin<&mut Self>, amt: usize) {
        Pin::new(&mut *self.get_mut().0).consume(amt)
    }
}

impl AsyncWrite for PooledConnection {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut *self.get_mut().0).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut *self.get_mut().0).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut *self.get_mut().0).poll_shutdown(cx)
    }
}
