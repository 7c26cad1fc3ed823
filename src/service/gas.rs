//! Gas Estimation Service
//!
//! Estimates what executing an intent costs on a chain, first in native wei and then in
//! stablecoin minor units. Every external input has a deterministic fallback so an
//! estimate is always produced for a supported chain.

use std::sync::Arc;

use ethereum_types::U256;
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::TtlCache;
use crate::chains::{abi, CallRequest, ChainClients};
use crate::config::{ChainConfig, GasConfig};
use crate::error::OmnigasError;
use crate::price_feed::PriceFeed;
use crate::registry::ChainRegistry;
use crate::types::{mul_div_ceil, Amount, ChainId, TransactionIntent, Urgency};

/// Cost of executing an intent on one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GasEstimate {
    pub chain_id: ChainId,
    pub gas_limit: u64,
    /// Tiered gas price in wei
    pub gas_price: U256,
    /// `gas_limit * gas_price` in wei
    pub native_cost: U256,
    /// Native cost converted to stablecoin minor units, after the floor
    pub stablecoin_cost: Amount,
    pub estimated_time_seconds: u64,
    /// True when the cost was raised to the practical minimum
    pub floored: bool,
}

/// Gas cost estimator.
#[derive(Debug, Clone)]
pub struct GasEstimator {
    registry: Arc<ChainRegistry>,
    clients: Arc<ChainClients>,
    price_feed: PriceFeed,
    gas_price_cache: TtlCache<ChainId, U256>,
    config: GasConfig,
    min_bridge_amount: Amount,
}

impl GasEstimator {
    pub fn new(
        registry: Arc<ChainRegistry>,
        clients: Arc<ChainClients>,
        price_feed: PriceFeed,
        gas_price_cache: TtlCache<ChainId, U256>,
        config: GasConfig,
        min_bridge_amount: Amount,
    ) -> Self {
        Self {
            registry,
            clients,
            price_feed,
            gas_price_cache,
            config,
            min_bridge_amount,
        }
    }

    /// Estimates the cost of `intent` on `chain_id` at `urgency`.
    ///
    /// Fails only for an unsupported chain; RPC and price-feed failures fall back.
    pub async fn estimate(
        &self,
        intent: &TransactionIntent,
        chain_id: ChainId,
        urgency: Urgency,
    ) -> Result<GasEstimate, OmnigasError> {
        let chain = self.registry.get(chain_id)?;

        let gas_limit = self.gas_limit(intent, chain).await?;
        let base_price = self.gas_price(chain).await?;
        let gas_price = base_price.saturating_mul(U256::from(urgency.gas_price_percent())) / U256::from(100u64);
        let native_cost = U256::from(gas_limit).saturating_mul(gas_price);

        let price = self.price_feed.native_price(chain).await;
        let decimals = U256::from(10u64)
            .checked_pow(U256::from(chain.native_decimals))
            .unwrap_or_else(U256::max_value);
        let raw_cost = Amount::from_u256(mul_div_ceil(native_cost, price.as_u256(), decimals));

        let (stablecoin_cost, floored) = self.apply_floor(raw_cost);
        if floored {
            debug!(
                "Gas cost {} on chain {} below bridge minimum {}, raised to {}",
                raw_cost, chain_id, self.min_bridge_amount, stablecoin_cost
            );
        }

        Ok(GasEstimate {
            chain_id,
            gas_limit,
            gas_price,
            native_cost,
            stablecoin_cost,
            estimated_time_seconds: urgency.confirmation_secs(),
            floored,
        })
    }

    /// Estimates on every supported chain concurrently.
    pub async fn estimate_all(&self, intent: &TransactionIntent, urgency: Urgency) -> Vec<GasEstimate> {
        let results = join_all(
            self.registry
                .chain_ids()
                .into_iter()
                .map(|chain_id| self.estimate(intent, chain_id, urgency)),
        )
        .await;

        results
            .into_iter()
            .filter_map(|r| match r {
                Ok(estimate) => Some(estimate),
                Err(e) => {
                    warn!("Skipping chain in gas estimation: {}", e);
                    None
                }
            })
            .collect()
    }

    /// Raises costs below the bridge minimum to the practical minimum.
    fn apply_floor(&self, cost: Amount) -> (Amount, bool) {
        if cost < self.min_bridge_amount {
            (self.config.practical_min_cost, true)
        } else {
            (cost, false)
        }
    }

    async fn gas_limit(&self, intent: &TransactionIntent, chain: &ChainConfig) -> Result<u64, OmnigasError> {
        if let Some(limit) = intent.gas_limit {
            return Ok(limit);
        }

        let client = self.clients.get(chain.chain_id)?;
        let data = match &intent.data {
            Some(d) if !intent.is_plain_transfer() => Some(abi::from_hex(d).map_err(|e| {
                OmnigasError::InvalidIntent(format!("calldata is not valid hex: {}", e))
            })?),
            _ => None,
        };
        let request = CallRequest {
            from: None,
            to: intent.to.clone(),
            value: intent.value.map(|v| v.as_u256()),
            data,
        };

        let reason = match client.estimate_gas(&request).await {
            Ok(limit) if limit > 0 => return Ok(limit),
            Ok(_) => "zero estimate".to_string(),
            Err(e) => format!("{:#}", e),
        };
        let fallback = if intent.is_plain_transfer() {
            self.config.transfer_gas_limit
        } else {
            self.config.default_call_gas_limit
        };
        warn!(
            "eth_estimateGas failed on chain {} ({}), using fallback gas limit {}",
            chain.chain_id, reason, fallback
        );
        Ok(fallback)
    }

    /// Current gas price of a chain (cached), falling back to the configured price.
    pub async fn gas_price(&self, chain: &ChainConfig) -> Result<U256, OmnigasError> {
        if let Some(price) = self.gas_price_cache.get(&chain.chain_id).await {
            return Ok(price);
        }
        let client = self.clients.get(chain.chain_id)?;
        let reason = match client.gas_price().await {
            Ok(price) if !price.is_zero() => {
                self.gas_price_cache.insert(chain.chain_id, price).await;
                return Ok(price);
            }
            Ok(_) => "zero price".to_string(),
            Err(e) => format!("{:#}", e),
        };
        warn!(
            "eth_gasPrice failed on chain {} ({}), using fallback {} wei",
            chain.chain_id, reason, chain.fallback_gas_price_wei
        );
        Ok(U256::from(chain.fallback_gas_price_wei))
    }
}
