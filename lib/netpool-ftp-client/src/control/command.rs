/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::io;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use super::FtpControlChannel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FtpCommand(&'static str);

impl FtpCommand {
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for FtpCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

macro_rules! ftp_commands {
    (
        $(
            $(#[$docs:meta])*
            ($konst:ident, $phrase:expr);
        )+
    ) => {
        impl FtpCommand {
        $(
            $(#[$docs])*
            pub const $konst: FtpCommand = FtpCommand($phrase);
        )+
        }
    };
}

ftp_commands! {
    /// a fake command for greeting
    (GREETING, "-");
    (USER, "USER");
    (PASS, "PASS");
    (QUIT, "QUIT");
    (MODE_B, "MODE B");
    (MODE_S, "MODE S");
    (TYPE_I, "TYPE I");
    (PWD, "PWD");
    (CWD, "CWD");
    (PASV, "PASV");
    (LIST, "LIST");
    (NLST, "NLST");
    (SIZE, "SIZE");
    (RETR, "RETR");
    (STOR, "STOR");
    (DELE, "DELE");
    (RMD, "RMD");
    (MKD, "MKD");
    (RNFR, "RNFR");
    (RNTO, "RNTO");
}

impl<T> FtpControlChannel<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    async fn send_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.stream.write_all(buf).await?;
        self.stream.flush().await?;
        Ok(())
    }

    pub(super) async fn send_cmd(&mut self, cmd: FtpCommand) -> io::Result<()> {
        if self.trace {
            crate::trace::log_cmd(cmd.0);
        }

        let mut buf: Vec<u8> = Vec::with_capacity(cmd.0.len() + 2);
        buf.extend_from_slice(cmd.0.as_bytes());
        buf.extend_from_slice(b"\r\n");

        self.send_all(buf.as_ref()).await
    }

    pub(super) async fn send_cmd1(&mut self, cmd: FtpCommand, param1: &str) -> io::Result<()> {
        if self.trace {
            if cmd == FtpCommand::PASS {
                crate::trace::log_cmd("PASS ******");
            } else {
                crate::trace::log_cmd(&format!("{} {param1}", cmd.0));
            }
        }

        let mut buf: Vec<u8> = Vec::with_capacity(cmd.0.len() + 1 + param1.len() + 2);
        buf.extend_from_slice(cmd.0.as_bytes());
        buf.push(b' ');
        buf.extend_from_slice(param1.as_bytes());
        buf.extend_from_slice(b"\r\n");

        self.send_all(buf.as_ref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    use crate::FtpControlConfig;

    #[tokio::test]
    async fn send_with_param() {
        let stream = Builder::new()
            .write(b"NLST /pub\r\n")
            .write(b"PWD\r\n")
            .build();
        let mut channel = FtpControlChannel::new(stream, FtpControlConfig::default(), false);
        channel.send_cmd1(FtpCommand::NLST, "/pub").await.unwrap();
        channel.send_cmd(FtpCommand::PWD).await.unwrap();
    }
}
