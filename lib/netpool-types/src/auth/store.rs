/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use super::{Password, Username};
use crate::net::UpstreamAddr;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum AuthProtocol {
    Http,
    HttpProxy,
    Ftp,
}

impl AuthProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthProtocol::Http => "http",
            AuthProtocol::HttpProxy => "http-proxy",
            AuthProtocol::Ftp => "ftp",
        }
    }
}

/// The resource a set of credentials applies to.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct AuthScope {
    protocol: AuthProtocol,
    resource: UpstreamAddr,
    realm: Option<String>,
}

impl AuthScope {
    pub fn new(protocol: AuthProtocol, resource: UpstreamAddr) -> Self {
        AuthScope {
            protocol,
            resource,
            realm: None,
        }
    }

    pub fn with_realm(mut self, realm: Option<String>) -> Self {
        self.realm = realm;
        self
    }

    pub fn protocol(&self) -> AuthProtocol {
        self.protocol
    }

    pub fn resource(&self) -> &UpstreamAddr {
        &self.resource
    }

    pub fn realm(&self) -> Option<&str> {
        self.realm.as_deref()
    }

    fn without_realm(&self) -> Self {
        AuthScope {
            protocol: self.protocol,
            resource: self.resource.clone(),
            realm: None,
        }
    }
}

impl fmt::Display for AuthScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.realm {
            Some(realm) => write!(
                f,
                "{}://{} (realm {realm})",
                self.protocol.as_str(),
                self.resource
            ),
            None => write!(f, "{}://{}", self.protocol.as_str(), self.resource),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Credentials {
    pub username: Username,
    pub password: Password,
}

impl Credentials {
    pub fn new(username: Username, password: Password) -> Self {
        Credentials { username, password }
    }
}

/// Credential storage capability used by the protocol engines.
///
/// Engines call [`Authenticate::invalidate`] when the server rejected the
/// credentials, and then [`Authenticate::lookup`] for a replacement.
pub trait Authenticate: Send + Sync {
    fn lookup(&self, scope: &AuthScope) -> Option<Credentials>;

    fn store(&self, scope: &AuthScope, credentials: Credentials);

    fn invalidate(&self, scope: &AuthScope);
}

/// In-memory credential table.
///
/// A lookup with a realm falls back to the entry stored without realm.
#[derive(Default)]
pub struct MemoryAuthenticator {
    table: Mutex<HashMap<AuthScope, Credentials>>,
}

impl Authenticate for MemoryAuthenticator {
    fn lookup(&self, scope: &AuthScope) -> Option<Credentials> {
        let table = self.table.lock().ok()?;
        if let Some(c) = table.get(scope) {
            return Some(c.clone());
        }
        if scope.realm.is_some() {
            table.get(&scope.without_realm()).cloned()
        } else {
            None
        }
    }

    fn store(&self, scope: &AuthScope, credentials: Credentials) {
        if let Ok(mut table) = self.table.lock() {
            table.insert(scope.clone(), credentials);
        }
    }

    fn invalidate(&self, scope: &AuthScope) {
        log::debug!("invalidate credentials for {scope}");
        if let Ok(mut table) = self.table.lock() {
            if table.remove(scope).is_none() && scope.realm.is_some() {
                table.remove(&scope.without_realm());
            }
        }
    }
}
