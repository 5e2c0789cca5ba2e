/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use atoi::FromRadix16Checked;

use crate::HttpLineParseError;

pub struct HttpChunkedLine<'a> {
    pub chunk_size: u64,
    pub extension: Option<&'a str>,
}

impl<'a> HttpChunkedLine<'a> {
    pub fn parse(buf: &'a [u8]) -> Result<HttpChunkedLine<'a>, HttpLineParseError> {
        let (chunk_size, offset) = u64::from_radix_16_checked(buf);
        if offset == 0 {
            return Err(HttpLineParseError::InvalidChunkSize);
        }
        let Some(chunk_size) = chunk_size else {
            return Err(HttpLineParseError::InvalidChunkSize);
        };

        if buf.len() == offset {
            return Err(HttpLineParseError::NotLongEnough);
        }

        match buf[offset] {
            b'\r' | b'\n' => Ok(HttpChunkedLine {
                chunk_size,
                extension: None,
            }),
            b';' | b' ' | b'\t' => {
                let left = std::str::from_utf8(&buf[offset..])?.trim();
                let extension = match left.strip_prefix(';') {
                    Some(ext) => Some(ext.trim()),
                    None if left.is_empty() => None,
                    None => return Err(HttpLineParseError::InvalidChunkSize),
                };
                Ok(HttpChunkedLine {
                    chunk_size,
                    extension,
                })
            }
            _ => Err(HttpLineParseError::InvalidChunkSize),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple() {
        let chunk = HttpChunkedLine::parse(b"1a\r\n").unwrap();
        assert_eq!(chunk.chunk_size, 0x1a);
        assert!(chunk.extension.is_none());

        let chunk = HttpChunkedLine::parse(b"0\n").unwrap();
        assert_eq!(chunk.chunk_size, 0);
    }

    #[test]
    fn extension() {
        let chunk = HttpChunkedLine::parse(b"10 ; name=value\r\n").unwrap();
        assert_eq!(chunk.chunk_size, 16);
        assert_eq!(chunk.extension, Some("name=value"));
    }

    #[test]
    fn invalid() {
        assert!(HttpChunkedLine::parse(b"\r\n").is_err());
        assert!(HttpChunkedLine::parse(b"zz\r\n").is_err());
        assert!(HttpChunkedLine::parse(b"1f").is_err());
        assert!(HttpChunkedLine::parse(b"1ffffffffffffffff\r\n").is_err());
    }
}
