/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::path::Path;

use anyhow::{Context, anyhow};
use yaml_rust::{Yaml, YamlLoader};

use netpool_ftp_client::FtpClientConfig;
use netpool_http::HttpClientConfig;

#[derive(Default)]
pub(crate) struct FetchConfig {
    pub(crate) http: HttpClientConfig,
    pub(crate) ftp: FtpClientConfig,
    pub(crate) no_proxy: Vec<String>,
}

impl FetchConfig {
    pub(crate) fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("failed to read config file {}", path.display()))?;
        FetchConfig::parse_str(&content)
            .context(format!("failed to parse config file {}", path.display()))
    }

    fn parse_str(content: &str) -> anyhow::Result<Self> {
        let docs = YamlLoader::load_from_str(content).map_err(|e| anyhow!("invalid yaml: {e}"))?;
        match docs.first() {
            None => Ok(FetchConfig::default()),
            Some(doc) => FetchConfig::parse_yaml(doc),
        }
    }

    fn parse_yaml(value: &Yaml) -> anyhow::Result<Self> {
        let Yaml::Hash(map) = value else {
            return Err(anyhow!("the root value should be a map"));
        };
        let mut config = FetchConfig::default();
        netpool_yaml::foreach_kv(map, |k, v| match netpool_yaml::key::normalize(k).as_str() {
            "http" => {
                config.http = HttpClientConfig::parse_yaml(v)
                    .context(format!("invalid http client config value for key {k}"))?;
                Ok(())
            }
            "ftp" => {
                config.ftp = FtpClientConfig::parse_yaml(v)
                    .context(format!("invalid ftp client config value for key {k}"))?;
                Ok(())
            }
            "no_proxy" => {
                if let Yaml::Array(seq) = v {
                    for (i, v) in seq.iter().enumerate() {
                        let domain = netpool_yaml::value::as_string(v)
                            .context(format!("invalid string value for {k}#{i}"))?;
                        config.no_proxy.push(domain);
                    }
                } else {
                    let domain = netpool_yaml::value::as_string(v)
                        .context(format!("invalid string value for key {k}"))?;
                    config
                        .no_proxy
                        .extend(domain.split(',').map(|s| s.trim().to_string()));
                }
                Ok(())
            }
            _ => Err(anyhow!("invalid key {k}")),
        })?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse() {
        let config = FetchConfig::parse_str(
            r#"
            http:
              max_redirects: 3
              trace_connections: true
            ftp:
              try_block_mode: false
            no_proxy: localhost, .example.net
            "#,
        )
        .unwrap();
        assert_eq!(config.http.max_redirects, 3);
        assert!(config.http.trace_connections);
        assert!(!config.ftp.try_block_mode);
        assert_eq!(config.no_proxy, vec!["localhost", ".example.net"]);

        let config = FetchConfig::parse_str("").unwrap();
        assert_eq!(config.http.max_redirects, 10);
        assert!(config.no_proxy.is_empty());
    }

    #[test]
    fn parse_err() {
        assert!(FetchConfig::parse_str("smtp: {}").is_err());
        assert!(FetchConfig::parse_str("- http").is_err());
        assert!(FetchConfig::parse_str("ftp:\n  cache_size: 0").is_err());
    }
}
