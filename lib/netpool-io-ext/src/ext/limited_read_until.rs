/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::future::Future;
use std::io;
use std::mem;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use tokio::io::AsyncBufRead;

pub struct LimitedReadUntil<'a, R: ?Sized> {
    reader: &'a mut R,
    delimiter: u8,
    buf: &'a mut Vec<u8>,
    read: usize,
    limit: usize,
}

impl<'a, R> LimitedReadUntil<'a, R>
where
    R: AsyncBufRead + ?Sized + Unpin,
{
    pub(super) fn new(
        reader: &'a mut R,
        delimiter: u8,
        max_len: usize,
        buf: &'a mut Vec<u8>,
    ) -> Self {
        LimitedReadUntil {
            reader,
            delimiter,
            buf,
            read: 0,
            limit: max_len,
        }
    }
}

fn read_until_internal<R: AsyncBufRead + ?Sized>(
    mut reader: Pin<&mut R>,
    cx: &mut Context<'_>,
    delimiter: u8,
    buf: &mut Vec<u8>,
    read: &mut usize,
    limit: usize,
) -> Poll<io::Result<(bool, usize)>> {
    loop {
        let (done, used) = {
            let available = ready!(reader.as_mut().poll_fill_buf(cx))?;
            let left = limit - *read;
            let search = if available.len() > left {
                &available[..left]
            } else {
                available
            };
            if let Some(i) = memchr::memchr(delimiter, search) {
                buf.extend_from_slice(&search[..=i]);
                (true, i + 1)
            } else {
                buf.extend_from_slice(search);
                (false, search.len())
            }
        };
        reader.as_mut().consume(used);
        *read += used;
        if done {
            return Poll::Ready(Ok((true, mem::replace(read, 0))));
        }
        if used == 0 || *read >= limit {
            return Poll::Ready(Ok((false, mem::replace(read, 0))));
        }
    }
}

impl<R: AsyncBufRead + ?Sized + Unpin> Future for LimitedReadUntil<'_, R> {
    type Output = io::Result<(bool, usize)>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let LimitedReadUntil {
            reader,
            delimiter,
            buf,
            read,
            limit,
        } = &mut *self;
        read_until_internal(Pin::new(reader), cx, *delimiter, buf, read, *limit)
    }
}

#[cfg(test)]
mod tests {
    use crate::LimitedBufReadExt;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn split_line() {
        let stream = tokio_test::io::Builder::new()
            .read(b"220 ser")
            .read(b"vice ready\r\n221")
            .build();
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        let (found, len) = reader.limited_read_until(b'\n', 64, &mut buf).await.unwrap();
        assert!(found);
        assert_eq!(len, 19);
        assert_eq!(buf.as_slice(), b"220 service ready\r\n");

        buf.clear();
        let (found, len) = reader.limited_read_until(b'\n', 64, &mut buf).await.unwrap();
        assert!(!found);
        assert_eq!(len, 3);
    }

    #[tokio::test]
    async fn too_long() {
        let stream = tokio_test::io::Builder::new().read(b"0123456789\n").build();
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        let (found, len) = reader.limited_read_until(b'\n', 4, &mut buf).await.unwrap();
        assert!(!found);
        assert_eq!(len, 4);
        assert_eq!(buf.as_slice(), b"0123");
    }

    #[tokio::test]
    async fn exact_limit() {
        let stream = tokio_test::io::Builder::new().read(b"abc\n").build();
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        let (found, len) = reader.limited_read_until(b'\n', 4, &mut buf).await.unwrap();
        assert!(found);
        assert_eq!(len, 4);
    }
}
