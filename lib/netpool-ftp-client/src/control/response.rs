/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};

use netpool_io_ext::LimitedBufReadExt;

use super::FtpControlChannel;
use crate::error::FtpRawResponseError;

#[derive(Debug)]
pub(crate) enum FtpRawResponse {
    SingleLine(u16, String),
    MultiLine(u16, Vec<String>),
}

fn parse_reply_code(line: &[u8]) -> Result<u16, FtpRawResponseError> {
    let mut code = 0u16;
    for c in &line[..3] {
        if !c.is_ascii_digit() {
            return Err(FtpRawResponseError::InvalidReplyCode);
        }
        code = code * 10 + (c - b'0') as u16;
    }
    if !(100..600).contains(&code) {
        return Err(FtpRawResponseError::InvalidReplyCode);
    }
    Ok(code)
}

fn line_text(line: &[u8]) -> Result<String, FtpRawResponseError> {
    let msg = std::str::from_utf8(line).map_err(|_| FtpRawResponseError::LineIsNotUtf8)?;
    Ok(msg.trim_end().to_string())
}

impl FtpRawResponse {
    pub(crate) fn parse_single_line(line: &[u8]) -> Result<Self, FtpRawResponseError> {
        let code = parse_reply_code(line)?;
        let msg = line_text(line.get(4..).unwrap_or_default())?;
        Ok(FtpRawResponse::SingleLine(code, msg))
    }

    pub(crate) fn get_multi_line_parser(
        line: &[u8],
        max_lines: usize,
    ) -> Result<FtpMultiLineReplyParser, FtpRawResponseError> {
        let code = parse_reply_code(line)?;
        let end_prefix = [line[0], line[1], line[2], b' '];
        let mut lines = Vec::<String>::with_capacity(max_lines.min(16));
        lines.push(line_text(&line[4..])?);
        Ok(FtpMultiLineReplyParser {
            code,
            end_prefix,
            lines,
        })
    }

    pub(crate) fn code(&self) -> u16 {
        match self {
            FtpRawResponse::SingleLine(code, _) => *code,
            FtpRawResponse::MultiLine(code, _) => *code,
        }
    }

    /// The text of a single line reply, or the terminating line of a multi line one.
    pub(crate) fn last_line(&self) -> &str {
        match self {
            FtpRawResponse::SingleLine(_, line) => line.as_str(),
            FtpRawResponse::MultiLine(_, lines) => {
                lines.last().map(|s| s.as_str()).unwrap_or_default()
            }
        }
    }

    pub(crate) fn parse_pasv_227_reply(&self) -> Option<SocketAddr> {
        let line = self.last_line();

        let p_start = memchr::memchr(b'(', line.as_bytes())?;
        let p_end = memchr::memchr(b')', &line.as_bytes()[p_start..])? + p_start;

        let a: Vec<&str> = line[p_start + 1..p_end].split(',').collect();
        if a.len() != 6 {
            return None;
        }

        let mut v = [0u8; 6];
        for (i, s) in a.iter().enumerate() {
            v[i] = u8::from_str(s.trim()).ok()?;
        }

        let ip = IpAddr::V4(Ipv4Addr::new(v[0], v[1], v[2], v[3]));
        let port = ((v[4] as u16) << 8) + (v[5] as u16);
        Some(SocketAddr::new(ip, port))
    }

    /// Extract the quoted path of a `257` reply, with doubled quotes unescaped.
    pub(crate) fn parse_pwd_257_reply(&self) -> Option<String> {
        let line = self.last_line();
        let start = memchr::memchr(b'"', line.as_bytes())? + 1;

        let mut path = String::with_capacity(line.len() - start);
        let mut chars = line[start..].chars().peekable();
        while let Some(c) = chars.next() {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                } else {
                    return Some(path);
                }
            }
            path.push(c);
        }
        None
    }

    pub(crate) fn parse_size_213_reply(&self) -> Option<u64> {
        u64::from_str(self.last_line().trim()).ok()
    }
}

pub(crate) struct FtpMultiLineReplyParser {
    code: u16,
    end_prefix: [u8; 4],
    lines: Vec<String>,
}

impl FtpMultiLineReplyParser {
    pub(crate) fn feed_line(&mut self, line: &[u8]) -> Result<bool, FtpRawResponseError> {
        if line.starts_with(&self.end_prefix) {
            self.lines.push(line_text(&line[4..])?);
            Ok(true)
        } else {
            // do not trim whitespace at beginning
            self.lines.push(line_text(line)?);
            Ok(false)
        }
    }

    pub(crate) fn finish(self) -> FtpRawResponse {
        FtpRawResponse::MultiLine(self.code, self.lines)
    }
}

impl<T> FtpControlChannel<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    async fn read_line(
        &mut self,
        buf: &mut Vec<u8>,
        min_len: usize,
    ) -> Result<(), FtpRawResponseError> {
        buf.clear();

        let (found, len) = self
            .stream
            .limited_read_until(b'\n', self.config.max_line_len, buf)
            .await
            .map_err(FtpRawResponseError::ReadFailed)?;
        if len == 0 {
            return Err(FtpRawResponseError::ConnectionClosed);
        }
        if self.trace {
            crate::trace::log_rsp(String::from_utf8_lossy(buf).trim_end());
        }
        if !found {
            if len >= self.config.max_line_len {
                return Err(FtpRawResponseError::LineTooLong);
            }
            return Err(FtpRawResponseError::ConnectionClosed);
        }
        if len < min_len {
            return Err(FtpRawResponseError::InvalidLineFormat);
        }
        Ok(())
    }

    pub(crate) async fn read_raw_response(
        &mut self,
    ) -> Result<FtpRawResponse, FtpRawResponseError> {
        let mut buf = Vec::<u8>::with_capacity(256);
        // at least <code>\n
        self.read_line(&mut buf, 4).await?;

        let rsp = match buf[3] {
            b' ' | b'\r' | b'\n' => FtpRawResponse::parse_single_line(&buf)?,
            b'-' => {
                let mut ml_parser =
                    FtpRawResponse::get_multi_line_parser(&buf, self.config.max_multi_lines)?;
                let mut finished = false;
                for _i in 0..self.config.max_multi_lines {
                    self.read_line(&mut buf, 1).await?;
                    if ml_parser.feed_line(&buf)? {
                        finished = true;
                        break;
                    }
                }
                if !finished {
                    return Err(FtpRawResponseError::TooManyLines);
                }
                ml_parser.finish()
            }
            _ => return Err(FtpRawResponseError::InvalidLineFormat),
        };
        self.replies.push(rsp.code());
        Ok(rsp)
    }

    pub(crate) async fn timed_read_raw_response(
        &mut self,
        stage: &'static str,
    ) -> Result<FtpRawResponse, FtpRawResponseError> {
        let timeout = self.config.command_timeout;
        self.read_raw_response_within(timeout, stage).await
    }

    pub(crate) async fn read_raw_response_within(
        &mut self,
        timeout: Duration,
        stage: &'static str,
    ) -> Result<FtpRawResponse, FtpRawResponseError> {
        match tokio::time::timeout(timeout, self.read_raw_response()).await {
            Ok(r) => r,
            Err(_) => Err(FtpRawResponseError::ReadResponseTimedOut(stage)),
        }
    }
}
