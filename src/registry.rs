//! Chain Registry
//!
//! Read-only lookup of the static per-chain table loaded at startup.

use std::collections::HashMap;

use crate::config::{ChainConfig, OmnigasConfig};
use crate::error::OmnigasError;
use crate::types::ChainId;

/// Immutable table of supported chains, in configuration order.
#[derive(Debug, Clone)]
pub struct ChainRegistry {
    chains: Vec<ChainConfig>,
    index: HashMap<ChainId, usize>,
    default_finality_secs: u64,
}

impl ChainRegistry {
    pub fn new(chains: Vec<ChainConfig>, default_finality_secs: u64) -> Self {
        let index = chains
            .iter()
            .enumerate()
            .map(|(i, c)| (c.chain_id, i))
            .collect();
        Self {
            chains,
            index,
            default_finality_secs,
        }
    }

    pub fn from_config(config: &OmnigasConfig) -> Self {
        Self::new(config.chains.clone(), config.bridge.default_finality_secs)
    }

    /// Looks up a chain, failing with `UnsupportedChain` if it is not configured.
    pub fn get(&self, chain_id: ChainId) -> Result<&ChainConfig, OmnigasError> {
        self.index
            .get(&chain_id)
            .map(|&i| &self.chains[i])
            .ok_or(OmnigasError::UnsupportedChain(chain_id))
    }

    pub fn contains(&self, chain_id: ChainId) -> bool {
        self.index.contains_key(&chain_id)
    }

    pub fn chains(&self) -> &[ChainConfig] {
        &self.chains
    }

    pub fn chain_ids(&self) -> Vec<ChainId> {
        self.chains.iter().map(|c| c.chain_id).collect()
    }

    /// Bridge domain of a chain, if it can bridge.
    pub fn domain(&self, chain_id: ChainId) -> Option<u32> {
        self.get(chain_id).ok().and_then(|c| c.domain)
    }

    /// Standard-mode finality wait for a chain; the configured default when unknown.
    pub fn finality_secs(&self, chain_id: ChainId) -> u64 {
        self.get(chain_id)
            .ok()
            .and_then(|c| c.finality_secs)
            .unwrap_or(self.default_finality_secs)
    }

    pub fn supports_bridge(&self, chain_id: ChainId) -> bool {
        self.get(chain_id).map(|c| c.supports_bridge()).unwrap_or(false)
    }
}
