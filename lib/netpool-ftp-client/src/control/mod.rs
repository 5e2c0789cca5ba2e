/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, BufReader};

use crate::FtpControlConfig;
use crate::error::{FtpCommandError, FtpRawResponseError, FtpTransferError};

mod response;
pub(crate) use response::FtpRawResponse;

mod command;
pub use command::FtpCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FtpAuthStatus {
    LoggedIn,
    NeedPassword,
    NeedAccount,
    NotLoggedIn,
}

/// The server reply to a command that opens a data transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FtpTransferStart {
    Proceed,
    /// The transfer completed without any data, e.g. an empty listing.
    Finished,
    Rejected(u16),
}

/// Reply codes that name a missing or inaccessible file.
const FILE_UNAVAILABLE_CODES: [u16; 4] = [450, 550, 551, 553];

fn command_error(cmd: FtpCommand, code: u16) -> FtpCommandError {
    match code {
        421 => FtpCommandError::ServiceNotAvailable,
        500 | 501 => FtpCommandError::RejectedCommandSyntax(cmd),
        502 => FtpCommandError::CommandNotImplemented(cmd),
        503 => FtpCommandError::BadCommandSequence(cmd),
        504 => FtpCommandError::ParameterNotImplemented(cmd),
        530 => FtpCommandError::NotLoggedIn,
        n => FtpCommandError::UnexpectedReplyCode(cmd, n),
    }
}

pub(crate) struct FtpControlChannel<T>
where
    T: AsyncRead + AsyncWrite,
{
    config: FtpControlConfig,
    stream: BufReader<T>,
    trace: bool,
    replies: Vec<u16>,
}

impl<T> FtpControlChannel<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    pub(crate) fn new(stream: T, config: FtpControlConfig, trace: bool) -> Self {
        FtpControlChannel {
            config,
            stream: BufReader::new(stream),
            trace,
            replies: Vec::with_capacity(4),
        }
    }

    #[inline]
    pub(crate) fn stream_mut(&mut self) -> &mut BufReader<T> {
        &mut self.stream
    }

    /// The codes of all replies read since the last call.
    pub(crate) fn take_replies(&mut self) -> Vec<u16> {
        std::mem::take(&mut self.replies)
    }

    async fn command(
        &mut self,
        cmd: FtpCommand,
        param: Option<&str>,
        stage: &'static str,
    ) -> Result<FtpRawResponse, FtpCommandError> {
        match param {
            Some(p) => self.send_cmd1(cmd, p).await,
            None => self.send_cmd(cmd).await,
        }
        .map_err(FtpCommandError::SendFailed)?;
        let reply = self.timed_read_raw_response(stage).await?;
        Ok(reply)
    }

    pub(crate) async fn wait_greetings(&mut self) -> Result<(), FtpCommandError> {
        loop {
            let reply = self.read_raw_response().await?;
            match reply.code() {
                120 => continue,
                220 => return Ok(()),
                n => return Err(command_error(FtpCommand::GREETING, n)),
            }
        }
    }

    pub(crate) async fn send_username(
        &mut self,
        name: &str,
    ) -> Result<FtpAuthStatus, FtpCommandError> {
        let reply = self.command(FtpCommand::USER, Some(name), "send user").await?;
        match reply.code() {
            230 => Ok(FtpAuthStatus::LoggedIn),
            331 => Ok(FtpAuthStatus::NeedPassword),
            332 => Ok(FtpAuthStatus::NeedAccount),
            530 => Ok(FtpAuthStatus::NotLoggedIn),
            n => Err(command_error(FtpCommand::USER, n)),
        }
    }

    pub(crate) async fn send_password(
        &mut self,
        pass: &str,
    ) -> Result<FtpAuthStatus, FtpCommandError> {
        let reply = self.command(FtpCommand::PASS, Some(pass), "send pass").await?;
        match reply.code() {
            202 | 230 => Ok(FtpAuthStatus::LoggedIn),
            332 => Ok(FtpAuthStatus::NeedAccount),
            530 => Ok(FtpAuthStatus::NotLoggedIn),
            n => Err(command_error(FtpCommand::PASS, n)),
        }
    }

    pub(crate) async fn send_quit(&mut self) -> Result<(), FtpCommandError> {
        let reply = self.command(FtpCommand::QUIT, None, "quit").await?;
        match reply.code() {
            221 => Ok(()),
            n => Err(command_error(FtpCommand::QUIT, n)),
        }
    }

    /// Return false if the server refused block mode.
    pub(crate) async fn use_block_mode(&mut self) -> Result<bool, FtpCommandError> {
        let reply = self.command(FtpCommand::MODE_B, None, "mode b").await?;
        match reply.code() {
            200 => Ok(true),
            500 | 501 | 502 | 504 => Ok(false),
            n => Err(command_error(FtpCommand::MODE_B, n)),
        }
    }

    pub(crate) async fn use_binary_type(&mut self) -> Result<(), FtpCommandError> {
        let reply = self.command(FtpCommand::TYPE_I, None, "type i").await?;
        match reply.code() {
            200 => Ok(()),
            n => Err(command_error(FtpCommand::TYPE_I, n)),
        }
    }

    pub(crate) async fn print_working_dir(&mut self) -> Result<String, FtpCommandError> {
        let reply = self.command(FtpCommand::PWD, None, "pwd").await?;
        match reply.code() {
            257 => reply
                .parse_pwd_257_reply()
                .ok_or(FtpCommandError::InvalidReplySyntax(FtpCommand::PWD)),
            n => Err(command_error(FtpCommand::PWD, n)),
        }
    }

    /// Return false if the path is not an accessible directory.
    pub(crate) async fn change_dir(&mut self, path: &str) -> Result<bool, FtpCommandError> {
        let reply = self.command(FtpCommand::CWD, Some(path), "cwd").await?;
        match reply.code() {
            200 | 250 => Ok(true),
            n if FILE_UNAVAILABLE_CODES.contains(&n) => Ok(false),
            n => Err(command_error(FtpCommand::CWD, n)),
        }
    }

    pub(crate) async fn request_pasv_port(&mut self) -> Result<SocketAddr, FtpCommandError> {
        let reply = self.command(FtpCommand::PASV, None, "pasv").await?;
        match reply.code() {
            227 => reply
                .parse_pasv_227_reply()
                .ok_or(FtpCommandError::InvalidReplySyntax(FtpCommand::PASV)),
            n => Err(command_error(FtpCommand::PASV, n)),
        }
    }

    pub(crate) async fn start_transfer(
        &mut self,
        cmd: FtpCommand,
        path: Option<&str>,
    ) -> Result<FtpTransferStart, FtpCommandError> {
        let reply = self.command(cmd, path, "start transfer").await?;
        match reply.code() {
            125 | 150 => Ok(FtpTransferStart::Proceed),
            226 | 250 => Ok(FtpTransferStart::Finished),
            n @ (450 | 452 | 532 | 550 | 551 | 552 | 553) => Ok(FtpTransferStart::Rejected(n)),
            n => Err(command_error(cmd, n)),
        }
    }

    /// Wait for the completion reply after the data channel is done.
    pub(crate) async fn wait_transfer_end(
        &mut self,
        timeout: Duration,
    ) -> Result<(), FtpTransferError> {
        let reply = match self.read_raw_response_within(timeout, "transfer end").await {
            Ok(reply) => reply,
            Err(FtpRawResponseError::ReadResponseTimedOut(_)) => {
                return Err(FtpTransferError::TimeoutToWaitEndReply);
            }
            Err(e) => return Err(FtpTransferError::EndReplyFailed(e.into())),
        };
        match reply.code() {
            226 | 250 => Ok(()),
            n @ (425 | 426 | 450 | 451 | 452 | 550 | 551 | 552) => {
                Err(FtpTransferError::AbortedByServer(n))
            }
            n => Err(FtpTransferError::UnexpectedEndReply(n)),
        }
    }

    /// Return `None` if the file is unavailable.
    pub(crate) async fn request_size(
        &mut self,
        path: &str,
    ) -> Result<Option<u64>, FtpCommandError> {
        let reply = self.command(FtpCommand::SIZE, Some(path), "size").await?;
        match reply.code() {
            213 => reply
                .parse_size_213_reply()
                .map(Some)
                .ok_or(FtpCommandError::InvalidReplySyntax(FtpCommand::SIZE)),
            n if FILE_UNAVAILABLE_CODES.contains(&n) => Ok(None),
            n => Err(command_error(FtpCommand::SIZE, n)),
        }
    }

    /// Run a single reply path command, like `DELE` or `MKD`.
    ///
    /// Return false if the server reported the path as unavailable.
    pub(crate) async fn path_command(
        &mut self,
        cmd: FtpCommand,
        path: &str,
    ) -> Result<bool, FtpCommandError> {
        let reply = self.command(cmd, Some(path), "path command").await?;
        match reply.code() {
            200 | 250 | 257 => Ok(true),
            n if FILE_UNAVAILABLE_CODES.contains(&n) => Ok(false),
            n => Err(command_error(cmd, n)),
        }
    }

    pub(crate) async fn rename(&mut self, from: &str, to: &str) -> Result<bool, FtpCommandError> {
        let reply = self.command(FtpCommand::RNFR, Some(from), "rnfr").await?;
        match reply.code() {
            350 => {}
            n if FILE_UNAVAILABLE_CODES.contains(&n) => return Ok(false),
            n => return Err(command_error(FtpCommand::RNFR, n)),
        }
        self.path_command(FtpCommand::RNTO, to).await
    }
}
