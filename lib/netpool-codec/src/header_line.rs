/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use http::{HeaderName, HeaderValue};

use crate::HttpLineParseError;

pub struct HttpHeaderLine<'a> {
    pub name: &'a str,
    pub value: &'a str,
}

impl<'a> HttpHeaderLine<'a> {
    pub fn parse(buf: &'a [u8]) -> Result<HttpHeaderLine<'a>, HttpLineParseError> {
        let line = std::str::from_utf8(buf)?;
        let Some(p) = memchr::memchr(b':', line.as_bytes()) else {
            return Err(HttpLineParseError::NoDelimiterFound(':'));
        };

        let name = line[0..p].trim();
        if name.is_empty() {
            return Err(HttpLineParseError::InvalidHeaderName);
        }
        let value = line[p + 1..].trim();

        Ok(HttpHeaderLine { name, value })
    }

    pub fn to_http(&self) -> Result<(HeaderName, HeaderValue), HttpLineParseError> {
        let name = HeaderName::from_bytes(self.name.as_bytes())
            .map_err(|_| HttpLineParseError::InvalidHeaderName)?;
        let value = HeaderValue::from_str(self.value)
            .map_err(|_| HttpLineParseError::InvalidHeaderValue)?;
        Ok((name, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse() {
        let h = HttpHeaderLine::parse(b"Content-Length:  5 \r\n").unwrap();
        assert_eq!(h.name, "Content-Length");
        assert_eq!(h.value, "5");

        let (name, value) = h.to_http().unwrap();
        assert_eq!(name, http::header::CONTENT_LENGTH);
        assert_eq!(value, "5");

        assert!(HttpHeaderLine::parse(b"no delimiter\r\n").is_err());
        assert!(HttpHeaderLine::parse(b": value\r\n").is_err());
    }
}
