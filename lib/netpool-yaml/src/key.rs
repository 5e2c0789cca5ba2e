/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

/// Normalize a config key: lower case, `-` replaced by `_`.
pub fn normalize(key: &str) -> String {
    key.to_lowercase().replace('-', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_normalize() {
        assert_eq!(normalize("Max-Pool-Size"), "max_pool_size");
        assert_eq!(normalize("socket_timeout"), "socket_timeout");
    }
}
