/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use tokio::io::AsyncBufRead;

pub struct FillWaitData<'a, R: ?Sized> {
    reader: &'a mut R,
}

impl<'a, R> FillWaitData<'a, R>
where
    R: AsyncBufRead + ?Sized + Unpin,
{
    pub(super) fn new(reader: &'a mut R) -> Self {
        FillWaitData { reader }
    }
}

impl<R: AsyncBufRead + ?Sized + Unpin> Future for FillWaitData<'_, R> {
    type Output = io::Result<bool>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let buf = ready!(Pin::new(&mut *self.reader).poll_fill_buf(cx))?;
        Poll::Ready(Ok(!buf.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn has_data() {
        let stream = tokio_test::io::Builder::new().read(b"abc").build();
        let mut reader = BufReader::new(stream);
        assert!(FillWaitData::new(&mut reader).await.unwrap());
    }

    #[tokio::test]
    async fn closed() {
        let stream = tokio_test::io::Builder::new().build();
        let mut reader = BufReader::new(stream);
        assert!(!FillWaitData::new(&mut reader).await.unwrap());
    }
}
