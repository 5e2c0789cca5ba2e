/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use anyhow::{Context, anyhow};
use yaml_rust::Yaml;

use netpool_resource::ResourcePoolConfig;

use super::HttpClientConfig;

impl HttpClientConfig {
    pub fn parse_yaml(value: &Yaml) -> anyhow::Result<Self> {
        if let Yaml::Hash(map) = value {
            let mut config = HttpClientConfig::default();
            netpool_yaml::foreach_kv(map, |k, v| match netpool_yaml::key::normalize(k).as_str() {
                "connect_timeout" => {
                    config.connect_timeout = netpool_yaml::humanize::as_duration(v)
                        .context(format!("invalid humanize duration value for key {k}"))?;
                    Ok(())
                }
                "socket_timeout" | "read_timeout" => {
                    let timeout = netpool_yaml::humanize::as_duration(v)
                        .context(format!("invalid humanize duration value for key {k}"))?;
                    config.socket_timeout = (!timeout.is_zero()).then_some(timeout);
                    Ok(())
                }
                "max_header_size" => {
                    config.max_header_size = netpool_yaml::humanize::as_usize(v)
                        .context(format!("invalid humanize usize value for key {k}"))?;
                    Ok(())
                }
                "max_chunk_line_size" => {
                    config.max_chunk_line_size = netpool_yaml::humanize::as_usize(v)
                        .context(format!("invalid humanize usize value for key {k}"))?;
                    Ok(())
                }
                "max_trailer_size" => {
                    config.max_trailer_size = netpool_yaml::humanize::as_usize(v)
                        .context(format!("invalid humanize usize value for key {k}"))?;
                    Ok(())
                }
                "max_retries" => {
                    config.max_retries = netpool_yaml::value::as_usize(v)
                        .context(format!("invalid usize value for key {k}"))?;
                    Ok(())
                }
                "retry_interval" => {
                    config.retry_interval = netpool_yaml::humanize::as_duration(v)
                        .context(format!("invalid humanize duration value for key {k}"))?;
                    Ok(())
                }
                "max_redirects" => {
                    config.max_redirects = netpool_yaml::value::as_usize(v)
                        .context(format!("invalid usize value for key {k}"))?;
                    Ok(())
                }
                "max_drain_size" => {
                    let size = netpool_yaml::humanize::as_usize(v)
                        .context(format!("invalid humanize usize value for key {k}"))?;
                    config.max_drain_size = size as u64;
                    Ok(())
                }
                "expect_continue_timeout" => {
                    config.expect_continue_timeout = netpool_yaml::humanize::as_duration(v)
                        .context(format!("invalid humanize duration value for key {k}"))?;
                    Ok(())
                }
                "compression" => {
                    config.compression = netpool_yaml::value::as_bool(v)
                        .context(format!("invalid bool value for key {k}"))?;
                    Ok(())
                }
                "expect_continue" => {
                    config.expect_continue = netpool_yaml::value::as_bool(v)
                        .context(format!("invalid bool value for key {k}"))?;
                    Ok(())
                }
                "trace_connections" => {
                    config.trace_connections = netpool_yaml::value::as_bool(v)
                        .context(format!("invalid bool value for key {k}"))?;
                    Ok(())
                }
                "interactive_auth" => {
                    config.interactive_auth = netpool_yaml::value::as_bool(v)
                        .context(format!("invalid bool value for key {k}"))?;
                    Ok(())
                }
                "user_agent" => {
                    config.user_agent = netpool_yaml::value::as_string(v)
                        .context(format!("invalid string value for key {k}"))?;
                    Ok(())
                }
                "pool" => {
                    config.pool = ResourcePoolConfig::parse_yaml(v)
                        .context(format!("invalid resource pool config value for key {k}"))?;
                    Ok(())
                }
                _ => Err(anyhow!("invalid key {k}")),
            })?;
            Ok(config)
        } else {
            Err(anyhow!("invalid yaml type"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use yaml_rust::YamlLoader;

    fn load(s: &str) -> Yaml {
        YamlLoader::load_from_str(s).unwrap().remove(0)
    }

    #[test]
    fn parse_ok() {
        let yaml = load(
            r#"
                connect-timeout: 5s
                socket_timeout: 0
                max_header_size: 32KB
                max_retries: 1
                retry_interval: 100ms
                compression: true
                expect_continue: false
                user_agent: "fetch/1.0"
                pool:
                  max_pool_size: 4
                  max_class_size: 1
            "#,
        );
        let config = HttpClientConfig::parse_yaml(&yaml).unwrap();
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.socket_timeout, None);
        assert_eq!(config.max_header_size, 32000);
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.retry_interval, Duration::from_millis(100));
        assert!(config.compression);
        assert!(!config.expect_continue);
        assert_eq!(config.user_agent, "fetch/1.0");
        assert_eq!(config.pool.max_pool_size(), 4);
        assert_eq!(config.max_redirects, 10);
    }

    #[test]
    fn parse_err() {
        let yaml = load("invalid_key: 1");
        assert!(HttpClientConfig::parse_yaml(&yaml).is_err());

        let yaml = load("compression: maybe");
        assert!(HttpClientConfig::parse_yaml(&yaml).is_err());

        let yaml = load("pool: 1");
        assert!(HttpClientConfig::parse_yaml(&yaml).is_err());

        assert!(HttpClientConfig::parse_yaml(&Yaml::Null).is_err());
    }
}
