/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;

use http::{HeaderMap, HeaderName, HeaderValue, Method};
use url::Url;

use crate::HttpClientError;

mod body;
pub use body::{BodyReader, FileBody, RequestBody};

mod head;

mod exchange;
pub(crate) use exchange::execute;

/// One logical request. The client may send it several times.
pub struct HttpRequest {
    pub(crate) method: Method,
    pub(crate) url: Url,
    pub(crate) headers: HeaderMap,
    pub(crate) trailer: Option<HeaderMap>,
    pub(crate) body: Option<Arc<dyn RequestBody>>,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url) -> Result<Self, HttpClientError> {
        match url.scheme() {
            "http" | "https" => {}
            s => {
                return Err(HttpClientError::InvalidRequest(format!(
                    "unsupported scheme {s}"
                )));
            }
        }
        if url.host().is_none() {
            return Err(HttpClientError::InvalidRequest(format!(
                "no host found in {url}"
            )));
        }
        Ok(HttpRequest {
            method,
            url,
            headers: HeaderMap::new(),
            trailer: None,
            body: None,
        })
    }

    pub fn get(url: Url) -> Result<Self, HttpClientError> {
        HttpRequest::new(Method::GET, url)
    }

    pub fn head(url: Url) -> Result<Self, HttpClientError> {
        HttpRequest::new(Method::HEAD, url)
    }

    pub fn put<B: RequestBody + 'static>(url: Url, body: B) -> Result<Self, HttpClientError> {
        let mut req = HttpRequest::new(Method::PUT, url)?;
        req.set_body(body);
        Ok(req)
    }

    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[inline]
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn append_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.append(name, value);
    }

    pub fn set_body<B: RequestBody + 'static>(&mut self, body: B) {
        self.body = Some(Arc::new(body));
    }

    /// Sent after a chunked body. Dropped if the body goes with a fixed length.
    pub fn set_trailer(&mut self, trailer: HeaderMap) {
        self.trailer = Some(trailer);
    }
}
