/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use url::Url;

use super::Host;

/// Resolve the proxy to use for a `scheme` request to `host`.
pub trait ProxyLookup: Send + Sync {
    fn lookup(&self, scheme: &str, host: &Host) -> Option<Url>;
}

#[derive(Default)]
pub struct NoProxy;

impl ProxyLookup for NoProxy {
    fn lookup(&self, _scheme: &str, _host: &Host) -> Option<Url> {
        None
    }
}

/// Fixed proxy table with a domain suffix bypass list.
#[derive(Clone, Debug, Default)]
pub struct StaticProxyLookup {
    http: Option<Url>,
    https: Option<Url>,
    bypass: Vec<String>,
}

impl StaticProxyLookup {
    pub fn set_http_proxy(&mut self, url: Url) {
        self.http = Some(url);
    }

    pub fn set_https_proxy(&mut self, url: Url) {
        self.https = Some(url);
    }

    pub fn add_bypass(&mut self, domain_suffix: &str) {
        self.bypass
            .push(domain_suffix.trim_start_matches('.').to_ascii_lowercase());
    }

    fn bypassed(&self, host: &Host) -> bool {
        match host {
            Host::Ip(ip) => ip.is_loopback() || self.bypass.iter().any(|b| *b == ip.to_string()),
            Host::Domain(domain) => self.bypass.iter().any(|b| {
                domain == b
                    || (domain.len() > b.len()
                        && domain.ends_with(b.as_str())
                        && domain.as_bytes()[domain.len() - b.len() - 1] == b'.')
            }),
        }
    }
}

impl ProxyLookup for StaticProxyLookup {
    fn lookup(&self, scheme: &str, host: &Host) -> Option<Url> {
        if self.bypassed(host) {
            return None;
        }
        match scheme {
            "http" => self.http.clone(),
            "https" => self.https.clone().or_else(|| self.http.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn bypass() {
        let mut lookup = StaticProxyLookup::default();
        lookup.set_http_proxy(Url::parse("http://proxy.local:3128").unwrap());
        lookup.add_bypass(".example.net");

        let h = Host::from_str("www.example.net").unwrap();
        assert!(lookup.lookup("http", &h).is_none());
        let h = Host::from_str("example.net").unwrap();
        assert!(lookup.lookup("http", &h).is_none());
        let h = Host::from_str("badexample.net").unwrap();
        assert!(lookup.lookup("http", &h).is_some());
        let h = Host::from_str("127.0.0.1").unwrap();
        assert!(lookup.lookup("http", &h).is_none());
    }

    #[test]
    fn https_fallback() {
        let mut lookup = StaticProxyLookup::default();
        lookup.set_http_proxy(Url::parse("http://proxy.local:3128").unwrap());
        let h = Host::from_str("www.example.net").unwrap();
        let url = lookup.lookup("https", &h).unwrap();
        assert_eq!(url.host_str(), Some("proxy.local"));
        assert!(lookup.lookup("ftp", &h).is_none());
    }
}
