/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use tokio::io::{AsyncRead, BufReader};

use netpool_io_ext::LimitedBufReadExt;

use crate::config::FtpTransferConfig;
use crate::error::FtpLineDataReadError;

pub(crate) trait FtpLineDataReceiver {
    fn recv_line(&mut self, line: &str);
}

pub(crate) struct FtpLineDataTransfer<T: AsyncRead> {
    io: BufReader<T>,
    max_lines: usize,
    max_line_len: usize,
    line_buf: Vec<u8>,
}

impl<T> FtpLineDataTransfer<T>
where
    T: AsyncRead + Unpin,
{
    pub(crate) fn new(io: T, config: &FtpTransferConfig) -> Self {
        FtpLineDataTransfer {
            io: BufReader::new(io),
            max_lines: config.list_max_entries,
            max_line_len: config.list_max_line_len,
            line_buf: Vec::with_capacity(256),
        }
    }

    fn send_buf_to_receiver<R>(&mut self, receiver: &mut R) -> Result<(), FtpLineDataReadError>
    where
        R: FtpLineDataReceiver,
    {
        let s = std::str::from_utf8(&self.line_buf)
            .map_err(|_| FtpLineDataReadError::LineIsNotUtf8)?;
        let line = s.trim_end_matches(['\r', '\n']);
        if !line.is_empty() {
            receiver.recv_line(line);
        }
        self.line_buf.clear();
        Ok(())
    }

    /// Feed every line to `receiver` until the data channel is closed.
    pub(crate) async fn read_to_end<R>(
        mut self,
        receiver: &mut R,
    ) -> Result<(), FtpLineDataReadError>
    where
        R: FtpLineDataReceiver,
    {
        for _ in 0..self.max_lines {
            let (found, nr) = self
                .io
                .limited_read_until(b'\n', self.max_line_len, &mut self.line_buf)
                .await
                .map_err(FtpLineDataReadError::ReadFailed)?;
            if nr == 0 {
                return Ok(());
            }
            if !found && nr >= self.max_line_len {
                return Err(FtpLineDataReadError::LineTooLong);
            }

            self.send_buf_to_receiver(receiver)?;
        }

        Err(FtpLineDataReadError::TooManyLines)
    }
}
