/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;

use anyhow::{Context, anyhow};
use url::Url;

use netpool_ftp_client::{FtpClient, FtpClientBuilder};
use netpool_http::{HttpClient, HttpClientBuilder};
use netpool_types::auth::{
    AuthProtocol, AuthScope, Authenticate, Credentials, MemoryAuthenticator, Password, Username,
};
use netpool_types::net::{StaticProxyLookup, UpstreamAddr};

use crate::config::FetchConfig;

pub(crate) enum Target {
    Http(Url),
    Ftp(Url),
}

/// The clients shared by all subcommands.
pub(crate) struct FetchContext {
    http: HttpClient,
    ftp: FtpClient,
    auth: Arc<MemoryAuthenticator>,
    credentials: Option<Credentials>,
}

fn url_credentials(url: &Url) -> anyhow::Result<Option<Credentials>> {
    if url.username().is_empty() {
        return Ok(None);
    }
    let username = Username::from_encoded(url.username())?;
    let password = Password::from_encoded(url.password().unwrap_or_default())?;
    Ok(Some(Credentials::new(username, password)))
}

pub(crate) fn credentials(
    username: Option<&str>,
    password: Option<&str>,
) -> anyhow::Result<Option<Credentials>> {
    let Some(username) = username else {
        if password.is_some() {
            return Err(anyhow!("password is set without username"));
        }
        return Ok(None);
    };
    let username = Username::from_original(username).context("invalid username")?;
    let password =
        Password::from_original(password.unwrap_or_default()).context("invalid password")?;
    Ok(Some(Credentials::new(username, password)))
}

impl FetchContext {
    pub(crate) fn new(
        config: FetchConfig,
        proxy: Option<Url>,
        credentials: Option<Credentials>,
    ) -> anyhow::Result<Self> {
        let auth = Arc::new(MemoryAuthenticator::default());

        let mut proxy_lookup = StaticProxyLookup::default();
        for domain in &config.no_proxy {
            proxy_lookup.add_bypass(domain);
        }
        if let Some(mut proxy) = proxy {
            if proxy.scheme() != "http" {
                return Err(anyhow!("unsupported proxy scheme {}", proxy.scheme()));
            }
            let addr = UpstreamAddr::from_url(&proxy).context("invalid proxy address")?;
            if let Some(c) = url_credentials(&proxy).context("invalid proxy credentials")? {
                auth.store(&AuthScope::new(AuthProtocol::HttpProxy, addr), c);
                let _ = proxy.set_username("");
                let _ = proxy.set_password(None);
            }
            proxy_lookup.set_http_proxy(proxy);
        }

        let http = HttpClientBuilder::new(config.http)
            .with_authenticator(auth.clone())
            .with_proxy_lookup(Arc::new(proxy_lookup))
            .build();
        let ftp = FtpClientBuilder::new(config.ftp)
            .with_authenticator(auth.clone())
            .build();
        Ok(FetchContext {
            http,
            ftp,
            auth,
            credentials,
        })
    }

    #[inline]
    pub(crate) fn http(&self) -> &HttpClient {
        &self.http
    }

    #[inline]
    pub(crate) fn ftp(&self) -> &FtpClient {
        &self.ftp
    }

    /// Parse `s` and register the command line credentials for its server.
    pub(crate) fn target(&self, s: &str) -> anyhow::Result<Target> {
        let url = Url::parse(s).context(format!("invalid url {s}"))?;
        let protocol = match url.scheme() {
            "http" | "https" => AuthProtocol::Http,
            "ftp" => AuthProtocol::Ftp,
            scheme => return Err(anyhow!("unsupported url scheme {scheme}")),
        };
        if let Some(c) = &self.credentials {
            let addr = UpstreamAddr::from_url(&url)?;
            self.auth.store(&AuthScope::new(protocol, addr), c.clone());
        }
        match protocol {
            AuthProtocol::Ftp => Ok(Target::Ftp(url)),
            _ => Ok(Target::Http(url)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target() {
        let c = credentials(Some("bob"), Some("secret")).unwrap();
        let ctx = FetchContext::new(FetchConfig::default(), None, c).unwrap();
        assert!(matches!(
            ctx.target("ftp://ftp.example.net/pub").unwrap(),
            Target::Ftp(_)
        ));
        assert!(matches!(
            ctx.target("https://www.example.net/").unwrap(),
            Target::Http(_)
        ));
        assert!(ctx.target("gopher://www.example.net/").is_err());

        let addr: UpstreamAddr = "ftp.example.net:21".parse().unwrap();
        let stored = ctx
            .auth
            .lookup(&AuthScope::new(AuthProtocol::Ftp, addr))
            .unwrap();
        assert_eq!(stored.username.as_original(), "bob");
    }

    #[test]
    fn proxy_credentials() {
        let proxy = Url::parse("http://u:p@proxy.local:3128").unwrap();
        let ctx = FetchContext::new(FetchConfig::default(), Some(proxy), None).unwrap();
        let addr: UpstreamAddr = "proxy.local:3128".parse().unwrap();
        assert!(
            ctx.auth
                .lookup(&AuthScope::new(AuthProtocol::HttpProxy, addr))
                .is_some()
        );

        let proxy = Url::parse("socks5://proxy.local:1080").unwrap();
        assert!(FetchContext::new(FetchConfig::default(), Some(proxy), None).is_err());
    }

    #[test]
    fn credentials_args() {
        assert!(credentials(None, None).unwrap().is_none());
        assert!(credentials(None, Some("x")).is_err());
        let c = credentials(Some("anna"), None).unwrap().unwrap();
        assert!(c.password.is_empty());
    }
}
