/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::FutureExt;
use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::time::{Instant, Sleep};

struct OpTimer {
    timeout: Option<Duration>,
    delay: Pin<Box<Sleep>>,
    armed: bool,
}

impl OpTimer {
    fn new(timeout: Option<Duration>) -> Self {
        OpTimer {
            timeout,
            delay: Box::pin(tokio::time::sleep(Duration::ZERO)),
            armed: false,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }

    /// Called when the inner op returned pending.
    fn poll_expired(&mut self, cx: &mut Context<'_>) -> bool {
        let Some(timeout) = self.timeout else {
            return false;
        };
        if !self.armed {
            self.delay.as_mut().reset(Instant::now() + timeout);
            self.armed = true;
        }
        if self.delay.poll_unpin(cx).is_ready() {
            self.armed = false;
            true
        } else {
            false
        }
    }
}

pin_project! {
    /// A stream wrapper that fails a single read or write that makes no
    /// progress within the configured timeout.
    pub struct TimeoutStream<S> {
        #[pin]
        inner: S,
        read_timer: OpTimer,
        write_timer: OpTimer,
    }
}

impl<S> TimeoutStream<S> {
    pub fn new(inner: S, timeout: Option<Duration>) -> Self {
        TimeoutStream {
            inner,
            read_timer: OpTimer::new(timeout),
            write_timer: OpTimer::new(timeout),
        }
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

fn timed_out(op: &str) -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, format!("socket {op} timed out"))
}

impl<S: AsyncRead> AsyncRead for TimeoutStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.project();
        match this.inner.poll_read(cx, buf) {
            Poll::Ready(r) => {
                this.read_timer.disarm();
                Poll::Ready(r)
            }
            Poll::Pending => {
                if this.read_timer.poll_expired(cx) {
                    Poll::Ready(Err(timed_out("read")))
                } else {
                    Poll::Pending
                }
            }
        }
    }
}

impl<S: AsyncWrite> AsyncWrite for TimeoutStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.project();
        match this.inner.poll_write(cx, buf) {
            Poll::Ready(r) => {
                this.write_timer.disarm();
                Poll::Ready(r)
            }
            Poll::Pending => {
                if this.write_timer.poll_expired(cx) {
                    Poll::Ready(Err(timed_out("write")))
                } else {
                    Poll::Pending
                }
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.project();
        match this.inner.poll_flush(cx) {
            Poll::Ready(r) => {
                this.write_timer.disarm();
                Poll::Ready(r)
            }
            Poll::Pending => {
                if this.write_timer.poll_expired(cx) {
                    Poll::Ready(Err(timed_out("flush")))
                } else {
                    Poll::Pending
                }
            }
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().inner.poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test(start_paused = true)]
    async fn read_timeout() {
        let (client, _server) = tokio::io::duplex(64);
        let mut stream = TimeoutStream::new(client, Some(Duration::from_secs(2)));
        let mut buf = [0u8; 8];
        let e = stream.read(&mut buf).await.unwrap_err();
        assert_eq!(e.kind(), io::ErrorKind::TimedOut);
    }

    #[tokio::test]
    async fn read_data() {
        let s = tokio_test::io::Builder::new().read(b"hello").build();
        let mut stream = TimeoutStream::new(s, Some(Duration::from_secs(2)));
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf.as_slice(), b"hello");
    }
}
