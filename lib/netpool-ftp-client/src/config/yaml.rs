/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::num::NonZeroUsize;

use anyhow::{Context, anyhow};
use yaml_rust::Yaml;

use netpool_resource::ResourcePoolConfig;

use super::{FtpClientConfig, FtpControlConfig, FtpTransferConfig};

impl FtpControlConfig {
    pub fn parse_yaml(value: &Yaml) -> anyhow::Result<Self> {
        if let Yaml::Hash(map) = value {
            let mut config = FtpControlConfig::default();
            netpool_yaml::foreach_kv(map, |k, v| match netpool_yaml::key::normalize(k).as_str() {
                "max_line_len" | "max_line_length" => {
                    config.max_line_len = netpool_yaml::humanize::as_usize(v)
                        .context(format!("invalid humanize usize value for key {k}"))?;
                    Ok(())
                }
                "max_multi_lines" => {
                    config.max_multi_lines = netpool_yaml::value::as_usize(v)
                        .context(format!("invalid usize value for key {k}"))?;
                    Ok(())
                }
                "command_timeout" => {
                    config.command_timeout = netpool_yaml::humanize::as_duration(v)
                        .context(format!("invalid humanize duration value for key {k}"))?;
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

impl FtpTransferConfig {
    pub fn parse_yaml(value: &Yaml) -> anyhow::Result<Self> {
        if let Yaml::Hash(map) = value {
            let mut config = FtpTransferConfig::default();
            netpool_yaml::foreach_kv(map, |k, v| match netpool_yaml::key::normalize(k).as_str() {
                "list_max_line_len" | "list_max_line_length" => {
                    config.list_max_line_len = netpool_yaml::humanize::as_usize(v)
                        .context(format!("invalid humanize usize value for key {k}"))?;
                    Ok(())
                }
                "list_max_entries" => {
                    config.list_max_entries = netpool_yaml::value::as_usize(v)
                        .context(format!("invalid usize value for key {k}"))?;
                    Ok(())
                }
                "end_wait_timeout" => {
                    config.end_wait_timeout = netpool_yaml::humanize::as_duration(v)
                        .context(format!("invalid humanize duration value for key {k}"))?;
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

impl FtpClientConfig {
    pub fn parse_yaml(value: &Yaml) -> anyhow::Result<Self> {
        if let Yaml::Hash(map) = value {
            let mut config = FtpClientConfig::default();
            netpool_yaml::foreach_kv(map, |k, v| match netpool_yaml::key::normalize(k).as_str() {
                "control" => {
                    config.control = FtpControlConfig::parse_yaml(v).context(format!(
                        "invalid ftp control connection config value for key {k}"
                    ))?;
                    Ok(())
                }
                "transfer" => {
                    config.transfer = FtpTransferConfig::parse_yaml(v).context(format!(
                        "invalid ftp transfer connection config value for key {k}"
                    ))?;
                    Ok(())
                }
                "connect_timeout" => {
                    config.connect_timeout = netpool_yaml::humanize::as_duration(v)
                        .context(format!("invalid humanize duration value for key {k}"))?;
                    Ok(())
                }
                "greeting_timeout" => {
                    config.greeting_timeout = netpool_yaml::humanize::as_duration(v)
                        .context(format!("invalid humanize duration value for key {k}"))?;
                    Ok(())
                }
                "socket_timeout" => {
                    let timeout = netpool_yaml::humanize::as_duration(v)
                        .context(format!("invalid humanize duration value for key {k}"))?;
                    config.socket_timeout = (!timeout.is_zero()).then_some(timeout);
                    Ok(())
                }
                "try_block_mode" => {
                    config.try_block_mode = netpool_yaml::value::as_bool(v)
                        .context(format!("invalid bool value for key {k}"))?;
                    Ok(())
                }
                "cache_size" => {
                    let size = netpool_yaml::value::as_usize(v)
                        .context(format!("invalid usize value for key {k}"))?;
                    config.cache_size = NonZeroUsize::new(size)
                        .ok_or_else(|| anyhow!("cache size should not be zero"))?;
                    Ok(())
                }
                "trace_connections" => {
                    config.trace_connections = netpool_yaml::value::as_bool(v)
                        .context(format!("invalid bool value for key {k}"))?;
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
    fn control_config() {
        let yaml = load(
            r#"
                max_line_length: "1KB"
                max_multi_lines: 256
                command_timeout: "30s"
            "#,
        );
        let config = FtpControlConfig::parse_yaml(&yaml).unwrap();
        assert_eq!(config.max_line_len, 1000);
        assert_eq!(config.max_multi_lines, 256);
        assert_eq!(config.command_timeout, Duration::from_secs(30));

        assert!(FtpControlConfig::parse_yaml(&load("max_multi_lines: -1")).is_err());
        assert!(FtpControlConfig::parse_yaml(&load("command_timeout: soon")).is_err());
        assert!(FtpControlConfig::parse_yaml(&load("invalid")).is_err());
    }

    #[test]
    fn transfer_config() {
        let yaml = load(
            r#"
                list_max_line_len: "4KB"
                list_max_entries: 2048
                end_wait_timeout: "500ms"
            "#,
        );
        let config = FtpTransferConfig::parse_yaml(&yaml).unwrap();
        assert_eq!(config.list_max_line_len, 4000);
        assert_eq!(config.list_max_entries, 2048);
        assert_eq!(config.end_wait_timeout, Duration::from_millis(500));

        assert!(FtpTransferConfig::parse_yaml(&load("list_all_timeout: 5m")).is_err());
    }

    #[test]
    fn client_config() {
        let yaml = load(
            r#"
                control:
                  command_timeout: "15s"
                transfer:
                  list_max_entries: 16
                connect-timeout: "10s"
                greeting_timeout: "5s"
                socket_timeout: 0
                try_block_mode: false
                cache_size: 8
                trace_connections: true
                pool:
                  max_class_size: 2
            "#,
        );
        let config = FtpClientConfig::parse_yaml(&yaml).unwrap();
        assert_eq!(config.control.command_timeout, Duration::from_secs(15));
        assert_eq!(config.control.max_line_len, 2048);
        assert_eq!(config.transfer.list_max_entries, 16);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.greeting_timeout, Duration::from_secs(5));
        assert_eq!(config.socket_timeout, None);
        assert!(!config.try_block_mode);
        assert_eq!(config.cache_size.get(), 8);
        assert!(config.trace_connections);
        assert_eq!(config.pool.max_class_size(), 2);
    }

    #[test]
    fn client_config_err() {
        assert!(FtpClientConfig::parse_yaml(&load("control: invalid")).is_err());
        assert!(FtpClientConfig::parse_yaml(&load("transfer: 1234")).is_err());
        assert!(FtpClientConfig::parse_yaml(&load("cache_size: 0")).is_err());
        assert!(FtpClientConfig::parse_yaml(&load("try_block_mode: maybe")).is_err());
        assert!(FtpClientConfig::parse_yaml(&load("always_try_epsv: true")).is_err());
    }
}
