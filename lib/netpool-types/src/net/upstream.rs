/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use anyhow::anyhow;
use url::Url;

use super::Host;

/// A `host:port` pair identifying a remote peer.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct UpstreamAddr {
    host: Host,
    port: u16,
}

impl UpstreamAddr {
    pub fn new(host: Host, port: u16) -> Self {
        UpstreamAddr { host, port }
    }

    #[inline]
    pub fn host(&self) -> &Host {
        &self.host
    }

    #[inline]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Build from the authority part of `url`, using the scheme default port if
    /// no explicit port is present.
    pub fn from_url(url: &Url) -> anyhow::Result<Self> {
        let host = url
            .host()
            .ok_or_else(|| anyhow!("no host found in url {url}"))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| anyhow!("no port found in url {url}"))?;
        Ok(UpstreamAddr::new(Host::from(host), port))
    }
}

impl fmt::Display for UpstreamAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.is_ipv6() {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl From<SocketAddr> for UpstreamAddr {
    fn from(addr: SocketAddr) -> Self {
        UpstreamAddr::new(Host::from(addr.ip()), addr.port())
    }
}

impl FromStr for UpstreamAddr {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(i) = s.rfind(':') else {
            return Err(anyhow!("no port found in {s}"));
        };
        let host = Host::from_str(&s[..i])?;
        let port = u16::from_str(&s[i + 1..]).map_err(|e| anyhow!("invalid port: {e}"))?;
        Ok(UpstreamAddr::new(host, port))
    }
}
