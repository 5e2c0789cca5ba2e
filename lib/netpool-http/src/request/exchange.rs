/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io::{self, Write};
use std::sync::Arc;

use flate2::Compression;
use flate2::write::GzEncoder;
use http::{HeaderMap, HeaderValue, Method, header};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use url::Url;

use netpool_codec::chunked::ChunkedEncodeWriter;
use netpool_io_ext::LimitedBufReadExt;
use netpool_resource::{RequesterId, ResourcePoolError};
use netpool_types::auth::{AuthProtocol, AuthScope, Credentials};
use netpool_types::net::UpstreamAddr;

use super::head::{self, BodyMode, RequestHead};
use super::{BodyReader, HttpRequest, RequestBody};
use crate::client::HttpClientInner;
use crate::connection::{HttpPoolKey, PooledConnection, SameEndpoint};
use crate::parse::HttpResponseParseError;
use crate::{
    HttpClientConfig, HttpClientError, HttpConnectError, HttpResponse, HttpResponseHead, auth,
    trace,
};

const UPLOAD_BUFFER_SIZE: usize = 16 * 1024;

enum AttemptError {
    /// The next attempt may succeed.
    Transient(HttpClientError),
    Fatal(HttpClientError),
    /// The proxy refused the tunnel with 407.
    TunnelAuth(String),
}

enum Decision {
    Finish,
    Retry,
}

enum PreparedBody {
    None,
    Fixed(Vec<u8>),
    Chunked(BodyReader),
}

/// Body framing negotiated for one attempt.
#[derive(Clone, Copy)]
struct Framing {
    chunked: bool,
    gzip: bool,
}

fn transient_io(e: io::Error) -> AttemptError {
    AttemptError::Transient(HttpClientError::Io(e))
}

struct RequestState {
    method: Method,
    url: Url,
    headers: HeaderMap,
    trailer: Option<HeaderMap>,
    body: Option<Arc<dyn RequestBody>>,
    proxy: Option<Url>,
    /// Chosen by a 305 reply, lookup is skipped from then on.
    proxy_fixed: bool,
    proxy_authorization: Option<HeaderValue>,
    tunnel: bool,
    auth_attempted: Option<Credentials>,
    proxy_auth_attempted: Option<Credentials>,
    retries: usize,
    redirects: usize,
    max_redirects: usize,
    visited: Vec<Url>,
    first_error: Option<HttpClientError>,
}

impl RequestState {
    fn new(inner: &HttpClientInner, req: HttpRequest) -> Self {
        let mut state = RequestState {
            method: req.method,
            visited: vec![req.url.clone()],
            url: req.url,
            headers: req.headers,
            trailer: req.trailer,
            body: req.body,
            proxy: None,
            proxy_fixed: false,
            proxy_authorization: None,
            tunnel: false,
            auth_attempted: None,
            proxy_auth_attempted: None,
            retries: 0,
            redirects: 0,
            max_redirects: inner.config.max_redirects,
            first_error: None,
        };
        state.lookup_proxy(inner);
        state
    }

    fn lookup_proxy(&mut self, inner: &HttpClientInner) {
        if self.proxy_fixed {
            return;
        }
        let proxy = self
            .url
            .host()
            .and_then(|host| inner.proxy.lookup(self.url.scheme(), &host.into()));
        if proxy != self.proxy {
            if let Some(url) = &proxy {
                log::debug!("use proxy {url} for {}", self.url);
            }
            self.proxy = proxy;
            self.tunnel = false;
            self.proxy_authorization = None;
            self.proxy_auth_attempted = None;
        }
    }

    fn target(&self) -> Result<UpstreamAddr, HttpClientError> {
        UpstreamAddr::from_url(&self.url)
            .map_err(|e| HttpClientError::InvalidRequest(format!("invalid target: {e}")))
    }

    fn proxy_addr(&self) -> Result<Option<UpstreamAddr>, HttpClientError> {
        match &self.proxy {
            Some(url) => UpstreamAddr::from_url(url)
                .map(Some)
                .map_err(|e| HttpClientError::InvalidRequest(format!("invalid proxy: {e}"))),
            None => Ok(None),
        }
    }

    /// The pool key, and whether the request target goes in absolute form.
    fn pool_key(&self) -> Result<(HttpPoolKey, bool), HttpClientError> {
        let target = self.target()?;
        let tls = self.url.scheme() == "https";
        match self.proxy_addr()? {
            Some(proxy) if tls || self.tunnel => Ok((
                HttpPoolKey {
                    peer: proxy,
                    tls,
                    tunnel: Some(target),
                    proxy_authorization: self.proxy_authorization.clone(),
                },
                false,
            )),
            Some(proxy) => Ok((HttpPoolKey::direct(proxy, false), true)),
            None => Ok((HttpPoolKey::direct(target, tls), false)),
        }
    }

    fn framing(&self, inner: &HttpClientInner, target: &UpstreamAddr) -> Framing {
        if self.body.is_none() {
            return Framing {
                chunked: false,
                gzip: false,
            };
        }
        let config = &inner.config;
        Framing {
            chunked: config.expect_continue && !inner.features.continue_disabled(target),
            gzip: config.compression
                && !inner.features.compression_disabled(target)
                && !head::is_precompressed(&self.headers),
        }
    }

    async fn prepare_body(&self, framing: Framing) -> io::Result<PreparedBody> {
        let Some(body) = &self.body else {
            return Ok(PreparedBody::None);
        };
        let mut reader = body.open().await?;
        if framing.chunked {
            return Ok(PreparedBody::Chunked(reader));
        }
        let capacity = body
            .size()
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0);
        let mut buf = Vec::with_capacity(capacity);
        reader.read_to_end(&mut buf).await?;
        if framing.gzip {
            buf = head::gzip(&buf)?;
        }
        Ok(PreparedBody::Fixed(buf))
    }

    fn protocol_error(&self, code: u16, reason: &str) -> HttpClientError {
        HttpClientError::protocol(i32::from(code), reason, &self.url)
    }

    fn pool_error(&self, e: ResourcePoolError<HttpConnectError>) -> AttemptError {
        let e = match e {
            ResourcePoolError::FactoryFailed(e) => e,
            e => return AttemptError::Fatal(HttpClientError::Pool(e)),
        };
        match e {
            HttpConnectError::TunnelRefused(407, reason) => AttemptError::TunnelAuth(reason),
            HttpConnectError::TunnelRefused(code, reason) => {
                AttemptError::Fatal(self.protocol_error(code, &reason))
            }
            e if e.is_transient() => transient_io(e.into_io_error()),
            e @ (HttpConnectError::TlsConfigUnavailable(..)
            | HttpConnectError::InvalidTlsServerName(_)) => {
                AttemptError::Fatal(HttpClientError::Tls(e))
            }
            e => AttemptError::Fatal(HttpClientError::Pool(ResourcePoolError::FactoryFailed(e))),
        }
    }

    fn parse_failure(&self, e: HttpResponseParseError) -> AttemptError {
        if e.is_malformed() {
            AttemptError::Transient(HttpClientError::protocol(-1, e.to_string(), &self.url))
        } else {
            transient_io(e.into_io_error())
        }
    }

    async fn attempt(
        &mut self,
        inner: &HttpClientInner,
        requester: RequesterId,
    ) -> Result<(HttpResponse, Framing), AttemptError> {
        let config = &inner.config;
        let target = self.target().map_err(AttemptError::Fatal)?;
        let (key, absolute_form) = self.pool_key().map_err(AttemptError::Fatal)?;
        let framing = self.framing(inner, &target);
        let body = self
            .prepare_body(framing)
            .await
            .map_err(|e| AttemptError::Fatal(HttpClientError::Io(e)))?;

        let handle = inner
            .pool
            .acquire(requester, &SameEndpoint, &key)
            .await
            .map_err(|e| self.pool_error(e))?;
        let mut conn = PooledConnection::new(handle);
        conn.conn().start_exchange();

        match self
            .exchange(config, &mut conn, absolute_form, framing, body)
            .await
        {
            Ok(head) => {
                let rsp = HttpResponse::new(
                    head,
                    &self.method,
                    self.url.clone(),
                    conn,
                    config.max_chunk_line_size,
                    config.max_trailer_size,
                );
                Ok((rsp, framing))
            }
            Err(e) => {
                conn.close();
                Err(e)
            }
        }
    }

    async fn exchange(
        &self,
        config: &HttpClientConfig,
        conn: &mut PooledConnection,
        absolute_form: bool,
        framing: Framing,
        body: PreparedBody,
    ) -> Result<HttpResponseHead, AttemptError> {
        let mode = match &body {
            PreparedBody::None => BodyMode::None,
            PreparedBody::Fixed(data) => BodyMode::Fixed(data.len() as u64),
            PreparedBody::Chunked(_) => BodyMode::Chunked,
        };
        let request_head = RequestHead {
            method: &self.method,
            url: &self.url,
            absolute_form,
            headers: &self.headers,
            proxy_authorization: self.proxy_authorization.as_ref(),
            user_agent: &config.user_agent,
            body: mode,
            gzip: framing.gzip,
            trailer: self.trailer.as_ref(),
        };
        let mut buf = request_head.serialize();
        if config.trace_connections {
            trace::log_request_head(&buf);
        }

        let mut deferred = None;
        match body {
            PreparedBody::None => {}
            PreparedBody::Fixed(data) => buf.extend_from_slice(&data),
            PreparedBody::Chunked(reader) => deferred = Some(reader),
        }
        conn.write_all(&buf).await.map_err(transient_io)?;
        conn.flush().await.map_err(transient_io)?;

        let head = loop {
            if deferred.is_some() {
                let wait =
                    tokio::time::timeout(config.expect_continue_timeout, conn.fill_wait_data());
                match wait.await {
                    Ok(Ok(true)) => {}
                    Ok(Ok(false)) => {
                        return Err(self.parse_failure(HttpResponseParseError::RemoteClosed));
                    }
                    Ok(Err(e)) => return Err(transient_io(e)),
                    Err(_) => {
                        if let Some(reader) = deferred.take() {
                            log::debug!("no interim response in time, send body anyway");
                            self.send_chunked(conn, reader, framing.gzip)
                                .await
                                .map_err(transient_io)?;
                        }
                        continue;
                    }
                }
            }

            let head = HttpResponseHead::parse(conn, &self.method, config.max_header_size)
                .await
                .map_err(|e| self.parse_failure(e))?;
            if config.trace_connections {
                trace::log_response_head(&head);
            }
            if head.code == 100 {
                if let Some(reader) = deferred.take() {
                    self.send_chunked(conn, reader, framing.gzip)
                        .await
                        .map_err(transient_io)?;
                }
                continue;
            }
            if head.is_interim() {
                continue;
            }
            break head;
        };

        if deferred.is_some() {
            // the server still expects the announced chunked body
            conn.conn().set_must_close();
        }
        Ok(head)
    }

    async fn send_chunked(
        &self,
        conn: &mut PooledConnection,
        mut reader: BodyReader,
        gzip: bool,
    ) -> io::Result<()> {
        let mut encoder = ChunkedEncodeWriter::new(&mut *conn);
        if let Some(trailer) = &self.trailer {
            encoder.set_trailer(trailer.clone());
        }
        if gzip {
            let mut gz = GzEncoder::new(
                Vec::with_capacity(UPLOAD_BUFFER_SIZE),
                Compression::default(),
            );
            let mut buf = vec![0u8; UPLOAD_BUFFER_SIZE];
            loop {
                let n = reader.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                gz.write_all(&buf[..n])?;
                let out = gz.get_mut();
                if !out.is_empty() {
                    encoder.write_all(out.as_slice()).await?;
                    out.clear();
                }
            }
            let tail = gz.finish()?;
            encoder.write_all(&tail).await?;
        } else {
            tokio::io::copy(&mut reader, &mut encoder).await?;
        }
        encoder.shutdown().await
    }

    /// Wait before the next attempt, or give up with the first failure.
    async fn backoff(
        &mut self,
        config: &HttpClientConfig,
        e: HttpClientError,
    ) -> Result<(), HttpClientError> {
        let first = match self.first_error.take() {
            Some(first) => {
                log::debug!("attempt {} failed again: {e}", self.retries + 1);
                first
            }
            None => e,
        };
        if self.retries >= config.max_retries {
            return Err(first);
        }
        log::debug!("{} {} failed: {first}", self.method, self.url);
        self.first_error = Some(first);
        self.retries += 1;
        let delay = config.retry_delay(self.retries);
        log::debug!("retry {} {} in {delay:?}", self.method, self.url);
        tokio::time::sleep(delay).await;
        Ok(())
    }

    fn count_redirect(&mut self, code: u16, reason: &str) -> Result<(), HttpClientError> {
        self.redirects += 1;
        if self.redirects > self.max_redirects {
            return Err(self.protocol_error(code, reason));
        }
        Ok(())
    }

    fn decide(
        &mut self,
        inner: &HttpClientInner,
        rsp: &HttpResponse,
        framing: Framing,
    ) -> Result<Decision, HttpClientError> {
        let code = rsp.code();
        let features = &inner.features;
        let target = self.target()?;
        match code {
            300 | 301 | 302 | 307 => self.redirect(inner, rsp, false),
            303 => self.redirect(inner, rsp, true),
            305 => self.use_proxy(inner, rsp),
            401 => self.authenticate(
                inner,
                false,
                code,
                rsp.reason(),
                rsp.headers().get(header::WWW_AUTHENTICATE),
            ),
            407 => self.authenticate(
                inner,
                true,
                code,
                rsp.reason(),
                rsp.headers().get(header::PROXY_AUTHENTICATE),
            ),
            415 if framing.gzip => {
                self.count_redirect(code, rsp.reason())?;
                features.disable_compression(&target);
                Ok(Decision::Retry)
            }
            400 if framing.gzip && !features.compression_aware(&target) => {
                self.count_redirect(code, rsp.reason())?;
                features.disable_compression(&target);
                Ok(Decision::Retry)
            }
            411 | 417 if framing.chunked => {
                self.count_redirect(code, rsp.reason())?;
                features.disable_continue(&target);
                Ok(Decision::Retry)
            }
            501 if self.proxy.is_some() && !self.tunnel && self.url.scheme() == "http" => {
                self.count_redirect(code, rsp.reason())?;
                log::debug!("proxy refused {}, switch to tunnel", self.method);
                self.tunnel = true;
                Ok(Decision::Retry)
            }
            _ => {
                if framing.gzip && (200..300).contains(&code) {
                    features.set_compression_aware(&target);
                }
                Ok(Decision::Finish)
            }
        }
    }

    fn redirect(
        &mut self,
        inner: &HttpClientInner,
        rsp: &HttpResponse,
        to_get: bool,
    ) -> Result<Decision, HttpClientError> {
        let code = rsp.code();
        let Some(location) = rsp
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
        else {
            return Ok(Decision::Finish);
        };
        let next = self
            .url
            .join(location)
            .map_err(|_| self.protocol_error(code, rsp.reason()))?;
        if !matches!(next.scheme(), "http" | "https")
            || next.host().is_none()
            || self.visited.contains(&next)
        {
            return Err(self.protocol_error(code, rsp.reason()));
        }
        self.count_redirect(code, rsp.reason())?;
        log::debug!("{} {} redirected to {next}", self.method, self.url);

        let same_origin = next.scheme() == self.url.scheme()
            && UpstreamAddr::from_url(&next).ok() == UpstreamAddr::from_url(&self.url).ok();
        if !same_origin && self.auth_attempted.take().is_some() {
            self.headers.remove(header::AUTHORIZATION);
        }
        self.visited.push(next.clone());
        self.url = next;
        if to_get && self.method != Method::HEAD {
            self.method = Method::GET;
            self.body = None;
            self.trailer = None;
            self.headers.remove(header::CONTENT_TYPE);
            self.headers.remove(header::CONTENT_ENCODING);
        }
        self.lookup_proxy(inner);
        Ok(Decision::Retry)
    }

    fn use_proxy(
        &mut self,
        inner: &HttpClientInner,
        rsp: &HttpResponse,
    ) -> Result<Decision, HttpClientError> {
        let code = rsp.code();
        let proxy = rsp
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|location| self.url.join(location).ok())
            .ok_or_else(|| self.protocol_error(code, rsp.reason()))?;
        self.count_redirect(code, rsp.reason())?;
        log::debug!("use proxy {proxy} for {} as told by server", self.url);

        self.proxy = Some(proxy);
        self.proxy_fixed = true;
        self.tunnel = false;
        self.proxy_authorization = None;
        self.proxy_auth_attempted = None;
        if let (Some(store), Some(addr)) = (&inner.auth, self.proxy_addr()?) {
            let scope = AuthScope::new(AuthProtocol::HttpProxy, addr);
            if let Some(credentials) = store.lookup(&scope) {
                self.proxy_authorization = Some(auth::basic_authorization(&credentials));
                self.proxy_auth_attempted = Some(credentials);
            }
        }
        Ok(Decision::Retry)
    }

    fn authenticate(
        &mut self,
        inner: &HttpClientInner,
        proxy: bool,
        code: u16,
        reason: &str,
        challenge: Option<&HeaderValue>,
    ) -> Result<Decision, HttpClientError> {
        let Some(store) = inner.auth.clone() else {
            return Err(self.protocol_error(code, reason));
        };
        let (protocol, resource) = if proxy {
            match self.proxy_addr()? {
                Some(addr) => (AuthProtocol::HttpProxy, addr),
                None => return Err(self.protocol_error(code, reason)),
            }
        } else {
            (AuthProtocol::Http, self.target()?)
        };
        let realm = challenge
            .and_then(|v| v.to_str().ok())
            .and_then(auth::parse_realm);
        let scope = AuthScope::new(protocol, resource).with_realm(realm);

        let attempted = if proxy {
            self.proxy_auth_attempted.take()
        } else {
            self.auth_attempted.take()
        };
        if attempted.is_some() {
            store.invalidate(&scope);
            if !inner.config.interactive_auth {
                return Err(self.protocol_error(code, reason));
            }
        }
        let Some(credentials) = store.lookup(&scope) else {
            return Err(self.protocol_error(code, reason));
        };
        if attempted.as_ref() == Some(&credentials) {
            return Err(self.protocol_error(code, reason));
        }
        self.count_redirect(code, reason)?;
        log::debug!("authenticate to {scope} as {}", credentials.username);

        let value = auth::basic_authorization(&credentials);
        if proxy {
            self.proxy_authorization = Some(value);
            self.proxy_auth_attempted = Some(credentials);
        } else {
            self.headers.insert(header::AUTHORIZATION, value);
            self.auth_attempted = Some(credentials);
        }
        Ok(Decision::Retry)
    }
}

pub(crate) async fn execute(
    inner: &HttpClientInner,
    req: HttpRequest,
) -> Result<HttpResponse, HttpClientError> {
    let mut state = RequestState::new(inner, req);
    let requester = RequesterId::new();
    loop {
        let (rsp, framing) = match state.attempt(inner, requester).await {
            Ok(v) => v,
            Err(AttemptError::Fatal(e)) => return Err(e),
            Err(AttemptError::Transient(e)) => {
                state.backoff(&inner.config, e).await?;
                continue;
            }
            Err(AttemptError::TunnelAuth(reason)) => {
                state.authenticate(inner, true, 407, &reason, None)?;
                continue;
            }
        };

        match state.decide(inner, &rsp, framing)? {
            Decision::Finish => return Ok(rsp),
            Decision::Retry => {
                if !rsp.drain(inner.config.max_drain_size).await {
                    log::debug!("connection closed instead of draining the unused response");
                }
            }
        }
    }
}
