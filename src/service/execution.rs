//! Execution Backends
//!
//! Sends the caller's target transaction on the execution chain:
//!
//! - **Sponsored**: an ERC-4337 user operation from the caller's smart account, with gas
//!   paid in stablecoin by the chain's paymaster
//! - **Direct**: `eth_sendTransaction` through the caller's interactive wallet

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ethereum_types::U256;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::chains::{abi, CallRequest, ChainClients};
use crate::config::{BridgeConfig, ChainConfig};
use crate::crypto::{LocalKeySigner, Signer, TransactionRequest, WalletSigner};
use crate::error::OmnigasError;
use crate::paymaster_client::{PaymasterClient, UserOperation};
use crate::registry::ChainRegistry;
use crate::types::{ChainId, TransactionIntent, Urgency};

/// How the target transaction was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionBackend {
    Sponsored,
    Direct,
}

/// Request-scoped authorization supplied by the caller.
///
/// Never stored beyond the request it was passed to.
#[derive(Debug, Clone, Default)]
pub struct Authorization {
    /// Local key: signs user operations and bridge transactions
    pub private_key: Option<LocalKeySigner>,
    /// Smart account address the key controls
    pub smart_account: Option<String>,
    /// Interactive wallet for direct execution
    pub wallet: Option<WalletSigner>,
}

impl Authorization {
    pub fn with_key(private_key: LocalKeySigner, smart_account: &str) -> Self {
        Self {
            private_key: Some(private_key),
            smart_account: Some(smart_account.to_lowercase()),
            wallet: None,
        }
    }

    pub fn with_wallet(wallet: WalletSigner) -> Self {
        Self {
            private_key: None,
            smart_account: None,
            wallet: Some(wallet),
        }
    }

    /// Signer for bridge transactions spending `account`'s funds: the local key if it
    /// controls `account`, else the wallet if it does.
    pub fn bridge_signer(&self, account: &str) -> Option<Signer> {
        let key = self
            .private_key
            .as_ref()
            .filter(|key| key.address().eq_ignore_ascii_case(account))
            .map(|key| Signer::Local(key.clone()));
        key.or_else(|| {
            self.wallet
                .as_ref()
                .filter(|wallet| wallet.address().eq_ignore_ascii_case(account))
                .map(|wallet| Signer::Wallet(wallet.clone()))
        })
    }
}

/// Runs the target transaction on one chain through one backend.
#[derive(Debug, Clone)]
pub struct ExecutionEngine {
    registry: Arc<ChainRegistry>,
    clients: Arc<ChainClients>,
    paymasters: Arc<HashMap<ChainId, PaymasterClient>>,
    receipt_poll_interval: Duration,
    receipt_timeout: Duration,
}

impl ExecutionEngine {
    /// Builds a paymaster client for every chain with sponsorship configured.
    pub fn new(
        registry: Arc<ChainRegistry>,
        clients: Arc<ChainClients>,
        rpc_timeout: Duration,
        config: &BridgeConfig,
    ) -> anyhow::Result<Self> {
        let mut paymasters = HashMap::new();
        for chain in registry.chains() {
            if let (Some(paymaster_url), Some(bundler_url)) = (&chain.paymaster_url, &chain.bundler_url) {
                paymasters.insert(
                    chain.chain_id,
                    PaymasterClient::new(paymaster_url, bundler_url, &chain.entry_point, rpc_timeout)?,
                );
            }
        }
        Ok(Self {
            registry,
            clients,
            paymasters: Arc::new(paymasters),
            receipt_poll_interval: Duration::from_millis(config.receipt_poll_interval_ms),
            receipt_timeout: Duration::from_millis(config.receipt_timeout_ms),
        })
    }

    /// Picks the backend before anything is spent.
    ///
    /// Sponsored needs a paymaster on the chain plus a key and smart account; direct
    /// needs a wallet.
    pub fn select_backend(&self, chain_id: ChainId, auth: &Authorization) -> Result<ExecutionBackend, OmnigasError> {
        let chain = self.registry.get(chain_id)?;
        if chain.supports_sponsorship()
            && self.paymasters.contains_key(&chain_id)
            && auth.private_key.is_some()
            && auth.smart_account.is_some()
        {
            return Ok(ExecutionBackend::Sponsored);
        }
        if auth.wallet.is_some() {
            return Ok(ExecutionBackend::Direct);
        }
        Err(OmnigasError::NoExecutionMethod(format!(
            "chain {} needs a paymaster with a private key and smart account, or a wallet signer",
            chain_id
        )))
    }

    /// Sends `intent` on `chain_id`; returns the transaction hash.
    pub async fn execute(
        &self,
        backend: ExecutionBackend,
        intent: &TransactionIntent,
        chain_id: ChainId,
        urgency: Urgency,
        auth: &Authorization,
    ) -> Result<String, OmnigasError> {
        let chain = self.registry.get(chain_id)?;
        match backend {
            ExecutionBackend::Sponsored => {
                let (key, smart_account) = match (&auth.private_key, &auth.smart_account) {
                    (Some(key), Some(account)) => (key, account.as_str()),
                    _ => {
                        return Err(OmnigasError::NoExecutionMethod(
                            "sponsored execution requires a private key and smart account".to_string(),
                        ))
                    }
                };
                self.execute_sponsored(intent, chain, urgency, key, smart_account).await
            }
            ExecutionBackend::Direct => {
                let wallet = auth.wallet.as_ref().ok_or_else(|| {
                    OmnigasError::NoExecutionMethod("direct execution requires a wallet signer".to_string())
                })?;
                self.execute_direct(intent, chain, urgency, wallet).await
            }
        }
    }

    // ========================================================================
    // SPONSORED
    // ========================================================================

    async fn execute_sponsored(
        &self,
        intent: &TransactionIntent,
        chain: &ChainConfig,
        urgency: Urgency,
        key: &LocalKeySigner,
        smart_account: &str,
    ) -> Result<String, OmnigasError> {
        let paymaster = self.paymasters.get(&chain.chain_id).ok_or_else(|| {
            OmnigasError::NoExecutionMethod(format!("no paymaster configured for chain {}", chain.chain_id))
        })?;
        let client = self.clients.get(chain.chain_id)?;

        let nonce_data = abi::entry_point_get_nonce(smart_account).map_err(invalid_intent)?;
        let nonce_hex = client
            .call(&CallRequest {
                to: paymaster.entry_point().to_string(),
                data: Some(nonce_data),
                ..Default::default()
            })
            .await
            .map_err(|e| unavailable(chain.chain_id, e))?;
        let nonce = abi::decode_uint(&nonce_hex).map_err(|e| unavailable(chain.chain_id, e))?;

        let gas_price = self.tiered_gas_price(chain, urgency).await?;
        let call_data = abi::smart_account_execute(&intent.to, intent_value(intent), &intent_data(intent)?)
            .map_err(invalid_intent)?;
        let mut op = UserOperation::new(smart_account, nonce, call_data, gas_price).map_err(internal)?;

        let sponsorship = paymaster
            .sponsor(&op, &chain.usdc_addr)
            .await
            .map_err(|e| rejected(e, false))?;
        sponsorship.apply(&mut op).map_err(internal)?;

        let op_hash = op.hash(paymaster.entry_point(), chain.chain_id.0).map_err(internal)?;
        op.signature = key.sign_message_hash(&op_hash).map_err(internal)?;

        let user_op_hash = paymaster.send(&op).await.map_err(|e| rejected(e, false))?;
        info!(
            "User operation {} submitted on chain {} from {}",
            user_op_hash, chain.chain_id, smart_account
        );

        let deadline = tokio::time::Instant::now() + self.receipt_timeout;
        loop {
            match paymaster.get_receipt(&user_op_hash).await {
                Ok(Some(receipt)) if receipt.success => {
                    return receipt.transaction_hash.ok_or_else(|| {
                        OmnigasError::Internal(format!("user operation {} receipt has no tx hash", user_op_hash))
                    });
                }
                Ok(Some(receipt)) => {
                    return Err(OmnigasError::ContractExecutionFailed {
                        reason: receipt
                            .reason
                            .unwrap_or_else(|| format!("user operation {} reverted", user_op_hash)),
                        retryable: false,
                    });
                }
                Ok(None) => debug!("User operation {} not yet included", user_op_hash),
                Err(e) => warn!("User operation receipt poll failed: {:#}", e),
            }
            if tokio::time::Instant::now() + self.receipt_poll_interval > deadline {
                return Err(OmnigasError::ContractExecutionFailed {
                    reason: format!("user operation {} not included within {:?}", user_op_hash, self.receipt_timeout),
                    retryable: true,
                });
            }
            tokio::time::sleep(self.receipt_poll_interval).await;
        }
    }

    // ========================================================================
    // DIRECT
    // ========================================================================

    async fn execute_direct(
        &self,
        intent: &TransactionIntent,
        chain: &ChainConfig,
        urgency: Urgency,
        wallet: &WalletSigner,
    ) -> Result<String, OmnigasError> {
        let client = self.clients.get(chain.chain_id)?;
        let request = TransactionRequest {
            to: intent.to.clone(),
            value: intent_value(intent),
            data: intent_data(intent)?,
            gas_limit: intent.gas_limit,
            gas_price: Some(self.tiered_gas_price(chain, urgency).await?),
        };

        let tx_hash = wallet
            .send_transaction(client, &request)
            .await
            .map_err(|e| rejected(e, false))?;
        info!("Direct transaction {} submitted on chain {}", tx_hash, chain.chain_id);

        let receipt = client
            .wait_for_receipt(&tx_hash, self.receipt_poll_interval, self.receipt_timeout)
            .await
            .map_err(|e| rejected(e, true))?;
        if !receipt.is_success() {
            return Err(OmnigasError::ContractExecutionFailed {
                reason: format!("transaction {} reverted on chain {}", tx_hash, chain.chain_id),
                retryable: false,
            });
        }
        Ok(tx_hash)
    }

    async fn tiered_gas_price(&self, chain: &ChainConfig, urgency: Urgency) -> Result<U256, OmnigasError> {
        let client = self.clients.get(chain.chain_id)?;
        let base = match client.gas_price().await {
            Ok(price) if !price.is_zero() => price,
            Ok(_) => U256::from(chain.fallback_gas_price_wei),
            Err(e) => {
                warn!("eth_gasPrice failed on chain {}, using fallback: {:#}", chain.chain_id, e);
                U256::from(chain.fallback_gas_price_wei)
            }
        };
        Ok(base.saturating_mul(U256::from(urgency.gas_price_percent())) / U256::from(100u64))
    }
}

fn intent_value(intent: &TransactionIntent) -> U256 {
    intent.value.map(|v| v.as_u256()).unwrap_or_default()
}

fn intent_data(intent: &TransactionIntent) -> Result<Vec<u8>, OmnigasError> {
    match &intent.data {
        Some(data) => abi::from_hex(data).map_err(invalid_intent),
        None => Ok(Vec::new()),
    }
}

fn rejected(e: anyhow::Error, retryable: bool) -> OmnigasError {
    OmnigasError::ContractExecutionFailed {
        reason: format!("{:#}", e),
        retryable,
    }
}

fn unavailable(chain_id: ChainId, e: anyhow::Error) -> OmnigasError {
    OmnigasError::ChainUnavailable {
        chain_id,
        reason: format!("{:#}", e),
    }
}

fn invalid_intent(e: anyhow::Error) -> OmnigasError {
    OmnigasError::InvalidIntent(format!("{:#}", e))
}

fn internal(e: anyhow::Error) -> OmnigasError {
    OmnigasError::Internal(format!("{:#}", e))
}
