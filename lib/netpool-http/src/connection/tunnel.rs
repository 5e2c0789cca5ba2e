/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io::Write;

use http::{HeaderValue, Method};
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt};

use netpool_types::net::UpstreamAddr;

use crate::HttpConnectError;
use crate::response::HttpResponseHead;

/// Ask the proxy on `stream` to open a tunnel to `target`.
pub(crate) async fn http_connect_to<S>(
    stream: &mut S,
    target: &UpstreamAddr,
    proxy_authorization: Option<&HeaderValue>,
    user_agent: &str,
    max_header_size: usize,
) -> Result<(), HttpConnectError>
where
    S: AsyncBufRead + AsyncWrite + Unpin,
{
    let mut buf = Vec::with_capacity(256);
    let _ = write!(
        buf,
        "CONNECT {target} HTTP/1.1\r\nHost: {target}\r\nUser-Agent: {user_agent}\r\n"
    );
    if let Some(v) = proxy_authorization {
        buf.extend_from_slice(b"Proxy-Authorization: ");
        buf.extend_from_slice(v.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }
    buf.extend_from_slice(b"\r\n");

    stream
        .write_all(&buf)
        .await
        .map_err(HttpConnectError::TunnelWriteFailed)?;
    stream
        .flush()
        .await
        .map_err(HttpConnectError::TunnelWriteFailed)?;

    let rsp = HttpResponseHead::parse(stream, &Method::CONNECT, max_header_size).await?;
    if (200..300).contains(&rsp.code) {
        Ok(())
    } else {
        Err(HttpConnectError::TunnelRefused(rsp.code, rsp.reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use tokio::io::BufStream;

    #[tokio::test]
    async fn established() {
        let target = UpstreamAddr::from_str("www.example.net:443").unwrap();
        let stream = tokio_test::io::Builder::new()
            .write(
                b"CONNECT www.example.net:443 HTTP/1.1\r\n\
                Host: www.example.net:443\r\nUser-Agent: t\r\n\
                Proxy-Authorization: Basic dTpw\r\n\r\n",
            )
            .read(b"HTTP/1.1 200 Connection established\r\n\r\n")
            .build();
        let mut stream = BufStream::new(stream);
        let auth = HeaderValue::from_static("Basic dTpw");
        http_connect_to(&mut stream, &target, Some(&auth), "t", 4096)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn refused() {
        let target = UpstreamAddr::from_str("www.example.net:443").unwrap();
        let stream = tokio_test::io::Builder::new()
            .write(
                b"CONNECT www.example.net:443 HTTP/1.1\r\n\
                Host: www.example.net:443\r\nUser-Agent: t\r\n\r\n",
            )
            .read(b"HTTP/1.1 403 Forbidden\r\nContent-Length: 0\r\n\r\n")
            .build();
        let mut stream = BufStream::new(stream);
        let r = http_connect_to(&mut stream, &target, None, "t", 4096).await;
        assert!(matches!(r, Err(HttpConnectError::TunnelRefused(403, _))));
    }
}
