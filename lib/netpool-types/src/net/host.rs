/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::net::{IpAddr, Ipv6Addr};
use std::str::FromStr;

use anyhow::anyhow;

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum Host {
    Ip(IpAddr),
    Domain(String),
}

impl Host {
    fn from_maybe_mapped_ip6(ip6: Ipv6Addr) -> Self {
        if let Some(ip4) = ip6.to_ipv4_mapped() {
            Host::Ip(IpAddr::V4(ip4))
        } else {
            Host::Ip(IpAddr::V6(ip6))
        }
    }

    pub fn is_ipv6(&self) -> bool {
        matches!(self, Host::Ip(IpAddr::V6(_)))
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Host::Ip(ip) => write!(f, "{ip}"),
            Host::Domain(domain) => write!(f, "{domain}"),
        }
    }
}

impl From<url::Host<&str>> for Host {
    fn from(v: url::Host<&str>) -> Self {
        match v {
            url::Host::Ipv4(ip4) => Host::Ip(IpAddr::V4(ip4)),
            url::Host::Ipv6(ip6) => Host::from_maybe_mapped_ip6(ip6),
            url::Host::Domain(domain) => Host::Domain(domain.to_ascii_lowercase()),
        }
    }
}

impl From<IpAddr> for Host {
    fn from(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => Host::Ip(ip),
            IpAddr::V6(ip6) => Host::from_maybe_mapped_ip6(ip6),
        }
    }
}

impl FromStr for Host {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(anyhow!("empty string"));
        }
        if let Ok(ip6) = Ipv6Addr::from_str(s) {
            return Ok(Host::from_maybe_mapped_ip6(ip6));
        }
        match url::Host::parse(s).map_err(|e| anyhow!("invalid host {s}: {e}"))? {
            url::Host::Ipv4(ip4) => Ok(Host::Ip(IpAddr::V4(ip4))),
            url::Host::Ipv6(ip6) => Ok(Host::from_maybe_mapped_ip6(ip6)),
            url::Host::Domain(domain) => Ok(Host::Domain(domain)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn parse() {
        assert_eq!(
            Host::from_str("127.0.0.1").unwrap(),
            Host::Ip(IpAddr::V4(Ipv4Addr::LOCALHOST))
        );
        assert_eq!(
            Host::from_str("[::1]").unwrap(),
            Host::Ip(IpAddr::V6(Ipv6Addr::LOCALHOST))
        );
        assert_eq!(
            Host::from_str("::ffff:10.0.0.1").unwrap(),
            Host::Ip(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)))
        );
        assert_eq!(
            Host::from_str("Example.COM").unwrap(),
            Host::Domain("example.com".to_string())
        );
        assert!(Host::from_str("").is_err());
    }
}
