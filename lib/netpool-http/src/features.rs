/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use netpool_types::net::UpstreamAddr;

#[derive(Default)]
struct FeatureSets {
    compression_disabled: HashSet<UpstreamAddr>,
    continue_disabled: HashSet<UpstreamAddr>,
    compression_aware: HashSet<UpstreamAddr>,
}

/// Per-authority protocol feature memory.
///
/// Shared by every request of a client. Races only cost one extra negotiation
/// round trip.
#[derive(Default)]
pub struct HttpHostFeatures {
    sets: Mutex<FeatureSets>,
}

impl HttpHostFeatures {
    fn lock(&self) -> MutexGuard<'_, FeatureSets> {
        self.sets.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn compression_disabled(&self, authority: &UpstreamAddr) -> bool {
        self.lock().compression_disabled.contains(authority)
    }

    pub fn disable_compression(&self, authority: &UpstreamAddr) {
        log::debug!("disable request compression for {authority}");
        self.lock().compression_disabled.insert(authority.clone());
    }

    pub fn continue_disabled(&self, authority: &UpstreamAddr) -> bool {
        self.lock().continue_disabled.contains(authority)
    }

    pub fn disable_continue(&self, authority: &UpstreamAddr) {
        log::debug!("disable chunked upload with 100-continue for {authority}");
        self.lock().continue_disabled.insert(authority.clone());
    }

    /// The server accepted a compressed request body before.
    pub fn compression_aware(&self, authority: &UpstreamAddr) -> bool {
        self.lock().compression_aware.contains(authority)
    }

    pub fn set_compression_aware(&self, authority: &UpstreamAddr) {
        let mut sets = self.lock();
        if !sets.compression_aware.contains(authority) {
            sets.compression_aware.insert(authority.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn per_authority() {
        let features = HttpHostFeatures::default();
        let a = UpstreamAddr::from_str("www.example.net:80").unwrap();
        let b = UpstreamAddr::from_str("www.example.net:8080").unwrap();

        features.disable_compression(&a);
        features.disable_continue(&b);
        assert!(features.compression_disabled(&a));
        assert!(!features.compression_disabled(&b));
        assert!(!features.continue_disabled(&a));
        assert!(features.continue_disabled(&b));

        assert!(!features.compression_aware(&a));
        features.set_compression_aware(&a);
        assert!(features.compression_aware(&a));
    }
}
