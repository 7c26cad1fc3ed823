//! Chain access
//!
//! JSON-RPC client for EVM chains and the minimal ABI encoding it needs.

pub mod abi;
pub mod evm;

pub use evm::{CallRequest, EvmClient, EvmLog, TransactionReceipt};

use std::collections::HashMap;
use std::time::Duration;

use crate::error::OmnigasError;
use crate::registry::ChainRegistry;
use crate::types::ChainId;

/// One `EvmClient` per supported chain.
#[derive(Debug, Clone)]
pub struct ChainClients {
    clients: HashMap<ChainId, EvmClient>,
}

impl ChainClients {
    pub fn from_registry(registry: &ChainRegistry, timeout: Duration) -> anyhow::Result<Self> {
        let mut clients = HashMap::new();
        for chain in registry.chains() {
            clients.insert(chain.chain_id, EvmClient::new(chain, timeout)?);
        }
        Ok(Self { clients })
    }

    pub fn get(&self, chain_id: ChainId) -> Result<&EvmClient, OmnigasError> {
        self.clients
            .get(&chain_id)
            .ok_or(OmnigasError::UnsupportedChain(chain_id))
    }
}
