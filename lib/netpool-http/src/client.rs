/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;

use url::Url;

use netpool_resource::ResourcePool;
use netpool_types::auth::Authenticate;
use netpool_types::net::{NoProxy, ProxyLookup};

use crate::connection::HttpConnectionFactory;
use crate::request::{HttpRequest, RequestBody};
use crate::{
    HttpClientConfig, HttpClientError, HttpHostFeatures, HttpResponse, TlsKeyManager,
    WebPkiKeyManager,
};

pub(crate) struct HttpClientInner {
    pub(crate) config: Arc<HttpClientConfig>,
    pub(crate) pool: ResourcePool<HttpConnectionFactory>,
    pub(crate) features: Arc<HttpHostFeatures>,
    pub(crate) auth: Option<Arc<dyn Authenticate>>,
    pub(crate) proxy: Arc<dyn ProxyLookup>,
}

pub struct HttpClientBuilder {
    config: HttpClientConfig,
    auth: Option<Arc<dyn Authenticate>>,
    proxy: Arc<dyn ProxyLookup>,
    tls: Arc<dyn TlsKeyManager>,
    features: Arc<HttpHostFeatures>,
}

impl HttpClientBuilder {
    pub fn new(config: HttpClientConfig) -> Self {
        HttpClientBuilder {
            config,
            auth: None,
            proxy: Arc::new(NoProxy),
            tls: Arc::new(WebPkiKeyManager::default()),
            features: Arc::new(HttpHostFeatures::default()),
        }
    }

    pub fn with_authenticator(mut self, auth: Arc<dyn Authenticate>) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_proxy_lookup(mut self, proxy: Arc<dyn ProxyLookup>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_tls_key_manager(mut self, tls: Arc<dyn TlsKeyManager>) -> Self {
        self.tls = tls;
        self
    }

    /// Share the per-host feature memory with other clients.
    pub fn with_features(mut self, features: Arc<HttpHostFeatures>) -> Self {
        self.features = features;
        self
    }

    pub fn build(self) -> HttpClient {
        let config = Arc::new(self.config);
        let factory = HttpConnectionFactory::new(config.clone(), self.tls);
        let pool = ResourcePool::new(factory, config.pool.clone());
        HttpClient {
            inner: Arc::new(HttpClientInner {
                config,
                pool,
                features: self.features,
                auth: self.auth,
                proxy: self.proxy,
            }),
        }
    }
}

/// HTTP/1.1 client over a pool of persistent connections.
#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<HttpClientInner>,
}

impl Default for HttpClient {
    fn default() -> Self {
        HttpClientBuilder::new(HttpClientConfig::default()).build()
    }
}

impl HttpClient {
    pub fn new(config: HttpClientConfig) -> Self {
        HttpClientBuilder::new(config).build()
    }

    #[inline]
    pub fn config(&self) -> &HttpClientConfig {
        &self.inner.config
    }

    #[inline]
    pub fn pool(&self) -> &ResourcePool<HttpConnectionFactory> {
        &self.inner.pool
    }

    #[inline]
    pub fn features(&self) -> &HttpHostFeatures {
        &self.inner.features
    }

    /// Run one logical request, following redirects and auth challenges.
    ///
    /// The returned response holds its connection until the body is finished
    /// or the response is dropped.
    pub async fn execute(&self, req: HttpRequest) -> Result<HttpResponse, HttpClientError> {
        crate::request::execute(&self.inner, req).await
    }

    pub async fn get(&self, url: Url) -> Result<HttpResponse, HttpClientError> {
        self.execute(HttpRequest::get(url)?).await
    }

    pub async fn head(&self, url: Url) -> Result<HttpResponse, HttpClientError> {
        self.execute(HttpRequest::head(url)?).await
    }

    pub async fn put<B: RequestBody + 'static>(
        &self,
        url: Url,
        body: B,
    ) -> Result<HttpResponse, HttpClientError> {
        self.execute(HttpRequest::put(url, body)?).await
    }
}
