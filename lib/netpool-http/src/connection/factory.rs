/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use http::HeaderValue;
use rustls_pki_types::ServerName;
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

use netpool_resource::{EqualityTest, ResourceFactory};
use netpool_types::net::UpstreamAddr;

use super::tunnel::http_connect_to;
use super::{HttpConnection, HttpStream};
use crate::{HttpClientConfig, HttpConnectError, TlsKeyManager};

/// Equivalence class of pooled HTTP connections.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct HttpPoolKey {
    /// The origin server, or the proxy if there is one.
    pub peer: UpstreamAddr,
    pub tls: bool,
    /// The origin server reached through a proxy tunnel.
    pub tunnel: Option<UpstreamAddr>,
    /// Sent with the tunnel request only.
    pub proxy_authorization: Option<HeaderValue>,
}

impl HttpPoolKey {
    pub fn direct(peer: UpstreamAddr, tls: bool) -> Self {
        HttpPoolKey {
            peer,
            tls,
            tunnel: None,
            proxy_authorization: None,
        }
    }
}

impl fmt::Debug for HttpPoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = if self.tls { "https" } else { "http" };
        match &self.tunnel {
            Some(target) => write!(f, "{scheme}://{target} via {}", self.peer),
            None => write!(f, "{scheme}://{}", self.peer),
        }
    }
}

/// Reuse test that ignores the tunnel credentials.
#[derive(Clone, Copy, Debug, Default)]
pub struct SameEndpoint;

impl EqualityTest<HttpPoolKey> for SameEndpoint {
    fn matches(&self, class_key: &HttpPoolKey, candidate: &HttpPoolKey) -> bool {
        class_key.peer == candidate.peer
            && class_key.tls == candidate.tls
            && class_key.tunnel == candidate.tunnel
    }
}

pub struct HttpConnectionFactory {
    config: Arc<HttpClientConfig>,
    tls: Arc<dyn TlsKeyManager>,
}

impl HttpConnectionFactory {
    pub fn new(config: Arc<HttpClientConfig>, tls: Arc<dyn TlsKeyManager>) -> Self {
        HttpConnectionFactory { config, tls }
    }

    async fn connect_tcp(&self, peer: &UpstreamAddr) -> Result<TcpStream, HttpConnectError> {
        let host = peer.host().to_string();
        let stream = tokio::time::timeout(
            self.config.connect_timeout,
            TcpStream::connect((host.as_str(), peer.port())),
        )
        .await
        .map_err(|_| HttpConnectError::ConnectTimeout(peer.clone()))?
        .map_err(|e| HttpConnectError::ConnectFailed(peer.clone(), e))?;
        let _ = stream.set_nodelay(true);
        Ok(stream)
    }

    async fn open_tunnel(
        &self,
        stream: TcpStream,
        key: &HttpPoolKey,
        target: &UpstreamAddr,
    ) -> Result<TcpStream, HttpConnectError> {
        let mut stream = BufReader::new(stream);
        let connect = http_connect_to(
            &mut stream,
            target,
            key.proxy_authorization.as_ref(),
            &self.config.user_agent,
            self.config.max_header_size,
        );
        tokio::time::timeout(self.config.connect_timeout, connect)
            .await
            .map_err(|_| HttpConnectError::ConnectTimeout(key.peer.clone()))??;
        if !stream.buffer().is_empty() {
            return Err(HttpConnectError::TunnelUnexpectedData);
        }
        log::debug!("tunnel to {target} established through {}", key.peer);
        Ok(stream.into_inner())
    }

    async fn tls_handshake(
        &self,
        stream: TcpStream,
        server: &UpstreamAddr,
    ) -> Result<HttpStream, HttpConnectError> {
        let config = self
            .tls
            .client_config(server)
            .map_err(|e| HttpConnectError::TlsConfigUnavailable(server.clone(), e))?;
        let name = server.host().to_string();
        let server_name = ServerName::try_from(name.clone())
            .map_err(|_| HttpConnectError::InvalidTlsServerName(name))?;

        let connector = TlsConnector::from(config);
        let handshake = tokio::time::timeout(
            self.config.connect_timeout,
            connector.connect(server_name, stream),
        )
        .await
        .map_err(|_| HttpConnectError::ConnectTimeout(server.clone()));
        match handshake {
            Ok(Ok(tls)) => Ok(HttpStream::Tls(Box::new(tls))),
            Ok(Err(e)) => {
                self.tls.handshake_failed(server);
                Err(HttpConnectError::TlsHandshakeFailed(server.clone(), e))
            }
            Err(e) => {
                self.tls.handshake_failed(server);
                Err(e)
            }
        }
    }
}

#[async_trait]
impl ResourceFactory for HttpConnectionFactory {
    type Key = HttpPoolKey;
    type Adapter = HttpConnection;
    type Error = HttpConnectError;

    async fn create(&self, key: &HttpPoolKey) -> Result<HttpConnection, HttpConnectError> {
        let mut tcp = self.connect_tcp(&key.peer).await?;
        if let Some(target) = &key.tunnel {
            tcp = self.open_tunnel(tcp, key, target).await?;
        }

        let stream = if key.tls {
            let server = key.tunnel.as_ref().unwrap_or(&key.peer);
            self.tls_handshake(tcp, server).await?
        } else {
            HttpStream::Plain(tcp)
        };
        log::debug!("new http connection {key:?}");
        Ok(HttpConnection::new(stream, key.peer.clone(), &self.config))
    }
}
