/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use anyhow::{Context, anyhow};
use yaml_rust::{Yaml, yaml};

pub fn foreach_kv<F>(table: &yaml::Hash, mut f: F) -> anyhow::Result<()>
where
    F: FnMut(&str, &Yaml) -> anyhow::Result<()>,
{
    for (k, v) in table.iter() {
        if let Yaml::String(key) = k {
            f(key, v).context(format!("failed to parse value of key {key}"))?;
        } else {
            return Err(anyhow!("key in hash should be string"));
        }
    }
    Ok(())
}

pub fn get_required<'a>(map: &'a yaml::Hash, k: &str) -> anyhow::Result<&'a Yaml> {
    let key = Yaml::String(k.to_owned());
    map.get(&key)
        .ok_or_else(|| anyhow!("no required key {k} found in this map"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use yaml_rust::YamlLoader;

    #[test]
    fn foreach_kv_order() {
        let yaml = yaml_doc!("max_pool_size: 8\nblocking: true");
        let hash = yaml.as_hash().unwrap();
        let mut keys = Vec::new();
        foreach_kv(hash, |k, _| {
            keys.push(k.to_string());
            Ok(())
        })
        .unwrap();
        assert_eq!(keys, vec!["max_pool_size", "blocking"]);
    }

    #[test]
    fn foreach_kv_err() {
        let yaml = yaml_doc!("1: 1");
        let hash = yaml.as_hash().unwrap();
        assert!(foreach_kv(hash, |_, _| Ok(())).is_err());
    }

    #[test]
    fn required() {
        let yaml = yaml_doc!("url: http://localhost/");
        let hash = yaml.as_hash().unwrap();
        assert!(get_required(hash, "url").is_ok());
        assert!(get_required(hash, "proxy").is_err());
    }
}
