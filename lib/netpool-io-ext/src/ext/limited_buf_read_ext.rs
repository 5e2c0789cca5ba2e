/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use tokio::io::AsyncBufRead;

use super::fill_wait_data::FillWaitData;
use super::limited_read_until::LimitedReadUntil;

pub trait LimitedBufReadExt: AsyncBufRead {
    /// Read until `delimiter` (included) but never store more than `max_len` bytes.
    ///
    /// Returns `(found, nread)`. `found` is false if EOF was reached or the limit
    /// was hit before the delimiter.
    fn limited_read_until<'a>(
        &'a mut self,
        delimiter: u8,
        max_len: usize,
        buf: &'a mut Vec<u8>,
    ) -> LimitedReadUntil<'a, Self>
    where
        Self: Unpin,
    {
        LimitedReadUntil::new(self, delimiter, max_len, buf)
    }

    /// return Ok(false) if the reader reached EOF without any buffered data
    fn fill_wait_data(&mut self) -> FillWaitData<'_, Self>
    where
        Self: Unpin,
    {
        FillWaitData::new(self)
    }
}

impl<R: AsyncBufRead + ?Sized> LimitedBufReadExt for R {}
