/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rustls::{ClientConfig, RootCertStore};

use netpool_types::net::UpstreamAddr;

/// Trust and client certificate decisions for TLS connections.
pub trait TlsKeyManager: Send + Sync {
    fn client_config(&self, peer: &UpstreamAddr) -> Result<Arc<ClientConfig>, String>;

    /// The handshake with `peer` failed. The next connection should not reuse
    /// the client certificate choice made for it.
    fn handshake_failed(&self, _peer: &UpstreamAddr) {}
}

/// Verify servers against the bundled webpki roots, no client certificate.
///
/// Configs are cached per peer so TLS sessions can be resumed.
#[derive(Default)]
pub struct WebPkiKeyManager {
    cache: Mutex<HashMap<UpstreamAddr, Arc<ClientConfig>>>,
}

impl WebPkiKeyManager {
    fn build() -> Result<ClientConfig, String> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let roots = RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };
        let mut config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| format!("unsupported protocol versions: {e}"))?
            .with_root_certificates(roots)
            .with_no_client_auth();
        config.alpn_protocols = vec![b"http/1.1".to_vec()];
        Ok(config)
    }
}

impl TlsKeyManager for WebPkiKeyManager {
    fn client_config(&self, peer: &UpstreamAddr) -> Result<Arc<ClientConfig>, String> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(config) = cache.get(peer) {
            return Ok(config.clone());
        }
        let config = Arc::new(Self::build()?);
        cache.insert(peer.clone(), config.clone());
        Ok(config)
    }

    fn handshake_failed(&self, peer: &UpstreamAddr) {
        log::debug!("drop cached tls config for {peer} after handshake failure");
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(peer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn cached_per_peer() {
        let manager = WebPkiKeyManager::default();
        let peer = UpstreamAddr::from_str("www.example.net:443").unwrap();
        let a = manager.client_config(&peer).unwrap();
        let b = manager.client_config(&peer).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        manager.handshake_failed(&peer);
        let c = manager.client_config(&peer).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
    }
}
