/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::num::NonZeroUsize;

use anyhow::{Context, anyhow};
use yaml_rust::Yaml;

use super::{ResourcePoolConfig, SharedCacheConfig};

impl ResourcePoolConfig {
    pub fn parse_yaml(v: &Yaml) -> anyhow::Result<Self> {
        if let Yaml::Hash(map) = v {
            let mut config = ResourcePoolConfig::default();
            netpool_yaml::foreach_kv(map, |k, v| {
                match netpool_yaml::key::normalize(k).as_str() {
                    "max_pool_size" | "max_size" => {
                        let size = netpool_yaml::value::as_usize(v)?;
                        config.set_max_pool_size(size);
                    }
                    "max_class_size" | "max_per_class" => {
                        let size = netpool_yaml::value::as_usize(v)?;
                        config.set_max_class_size(size);
                    }
                    "blocking" => {
                        config.blocking = netpool_yaml::value::as_bool(v)?;
                    }
                    _ => return Err(anyhow!("invalid key {k}")),
                }
                Ok(())
            })?;
            Ok(config)
        } else {
            Err(anyhow!(
                "yaml value type for 'resource pool config' should be 'map'"
            ))
        }
    }
}

impl SharedCacheConfig {
    pub fn parse_yaml(v: &Yaml) -> anyhow::Result<Self> {
        if let Yaml::Hash(map) = v {
            let mut config = SharedCacheConfig::default();
            netpool_yaml::foreach_kv(map, |k, v| {
                match netpool_yaml::key::normalize(k).as_str() {
                    "capacity" => {
                        let size = netpool_yaml::value::as_usize(v)?;
                        let size = NonZeroUsize::new(size)
                            .ok_or_else(|| anyhow!("capacity should not be zero"))?;
                        config.set_capacity(size);
                    }
                    "idle_timeout" => {
                        let timeout = netpool_yaml::humanize::as_duration(v)
                            .context(format!("invalid humanize duration value for key {k}"))?;
                        config.set_idle_timeout(timeout);
                    }
                    _ => return Err(anyhow!("invalid key {k}")),
                }
                Ok(())
            })?;
            Ok(config)
        } else {
            Err(anyhow!(
                "yaml value type for 'shared connection cache config' should be 'map'"
            ))
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
    fn pool_config() {
        let yaml = load("Max-Pool-Size: 16\nmax_class_size: 2\nblocking: false");
        let config = ResourcePoolConfig::parse_yaml(&yaml).unwrap();
        assert_eq!(config.max_pool_size(), 16);
        assert_eq!(config.max_class_size(), 2);
        assert!(!config.blocking());

        let yaml = load("max_pool_size: 0");
        let config = ResourcePoolConfig::parse_yaml(&yaml).unwrap();
        assert_eq!(config.max_pool_size(), 1);

        let yaml = load("max_idle: 1");
        assert!(ResourcePoolConfig::parse_yaml(&yaml).is_err());
        let yaml = load("- 1");
        assert!(ResourcePoolConfig::parse_yaml(&yaml).is_err());
    }

    #[test]
    fn shared_cache_config() {
        let yaml = load("capacity: 4\nidle_timeout: 2m");
        let config = SharedCacheConfig::parse_yaml(&yaml).unwrap();
        assert_eq!(config.capacity().get(), 4);
        assert_eq!(config.idle_timeout(), Duration::from_secs(120));

        let yaml = load("capacity: 0");
        assert!(SharedCacheConfig::parse_yaml(&yaml).is_err());
    }
}
