/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

mod auth;
pub use auth::{basic_authorization, parse_realm};

mod config;
pub use config::HttpClientConfig;

mod error;
pub use error::{HttpClientError, HttpConnectError};

mod features;
pub use features::HttpHostFeatures;

pub mod parse;

mod tls;
pub use tls::{TlsKeyManager, WebPkiKeyManager};

pub mod trace;

mod connection;
pub use connection::{
    HttpConnection, HttpConnectionFactory, HttpPoolKey, HttpStream, SameEndpoint,
};

mod request;
pub use request::{BodyReader, FileBody, HttpRequest, RequestBody};

mod response;
pub use response::{HttpResponse, HttpResponseHead};

mod client;
pub use client::{HttpClient, HttpClientBuilder};
