/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use atoi::FromRadix10;
use http::Version;

use netpool_codec::HttpLineParseError;

pub struct HttpStatusLine<'a> {
    pub version: Version,
    pub code: u16,
    pub reason: &'a str,
}

impl<'a> HttpStatusLine<'a> {
    pub fn parse(buf: &'a [u8]) -> Result<HttpStatusLine<'a>, HttpLineParseError> {
        const MINIMAL_LENGTH: usize = 13; // HTTP/1.x XYZ\n

        if buf.len() < MINIMAL_LENGTH {
            return Err(HttpLineParseError::NotLongEnough);
        }

        let Some(p) = memchr::memchr(b' ', buf) else {
            return Err(HttpLineParseError::NoDelimiterFound(' '));
        };
        let version = match &buf[0..p] {
            b"HTTP/1.0" => Version::HTTP_10,
            b"HTTP/1.1" => Version::HTTP_11,
            _ => return Err(HttpLineParseError::InvalidVersion),
        };

        let left = &buf[p + 1..];
        let (code, len) = u16::from_radix_10(left);
        if len != 3 || !(100..600).contains(&code) {
            return Err(HttpLineParseError::InvalidStatusCode);
        }

        if left.len() < len + 1 {
            return Err(HttpLineParseError::NotLongEnough);
        }
        let reason = std::str::from_utf8(&left[len + 1..])?.trim();

        Ok(HttpStatusLine {
            version,
            code,
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal() {
        let s = HttpStatusLine::parse(b"HTTP/1.1 200 OK\r\n").unwrap();
        assert_eq!(s.version, Version::HTTP_11);
        assert_eq!(s.code, 200);
        assert_eq!(s.reason, "OK");
    }

    #[test]
    fn no_reason() {
        let s = HttpStatusLine::parse(b"HTTP/1.0 204\r\n").unwrap();
        assert_eq!(s.version, Version::HTTP_10);
        assert_eq!(s.code, 204);
        assert_eq!(s.reason, "");
    }

    #[test]
    fn invalid() {
        assert!(HttpStatusLine::parse(b"HTTP/2 200 OK\r\n").is_err());
        assert!(HttpStatusLine::parse(b"HTTP/1.1 2000 OK\r\n").is_err());
        assert!(HttpStatusLine::parse(b"HTTP/1.1 abc OK\r\n").is_err());
        assert!(HttpStatusLine::parse(b"SSH-2.0-OpenSSH_9.6\r\n").is_err());
    }
}
