use std::collections::HashMap;
use std::sync::Arc;

use gossip_crypto::Ed25519KeyPair;
use tracing::info;

use crate::domain::{
    CachedMessage, ConfigError, DataTypeId, OverlayConfig, OverlayError, Peer, Timestamp,
};
use crate::ports::OverlayApi;
use crate::service::OverlayService;

impl OverlayApi for OverlayService {
    fn config(&self) -> OverlayConfig {
        self.config.read().clone()
    }

    fn replace_config(&self, mut config: OverlayConfig) -> Result<(), ConfigError> {
        config.validate()?;
        {
            let current = self.config.read();
            // Listeners are bound once; keep the addresses they actually use.
            config.api_address = current.api_address.clone();
            config.p2p_address = current.p2p_address.clone();
        }
        self.cache.lock().resize(config.cache_size);
        self.counters.lock().set_limit(config.counter_limit);
        info!(
            degree = config.degree,
            cache_size = config.cache_size,
            counter_limit = config.counter_limit,
            "Configuration replaced"
        );
        *self.config.write() = config;
        Ok(())
    }

    fn counters(&self) -> HashMap<String, u32> {
        self.counters.lock().snapshot()
    }

    fn block_list(&self) -> HashMap<String, Timestamp> {
        self.block_list.lock().snapshot()
    }

    fn keypair(&self) -> Arc<Ed25519KeyPair> {
        Arc::clone(&self.keypair)
    }

    fn public_key_pem(&self) -> String {
        self.public_key_pem.clone()
    }

    fn peers(&self) -> Vec<Peer> {
        self.peers.lock().snapshot()
    }

    fn peer_addresses(&self) -> Vec<String> {
        self.peers.lock().server_addresses()
    }

    fn candidates(&self) -> HashMap<String, String> {
        self.candidates.lock().snapshot()
    }

    fn candidate_addresses(&self) -> Vec<String> {
        self.candidates.lock().addresses()
    }

    fn cached_messages(&self) -> Vec<CachedMessage> {
        self.cache.lock().snapshot()
    }

    fn announce(&self, data_type: DataTypeId, payload: Vec<u8>) -> Result<String, OverlayError> {
        OverlayService::announce(self, data_type, payload, None)
    }
}
