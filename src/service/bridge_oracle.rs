//! Bridge Fee & Timing Oracle
//!
//! Display-only quotes for a bridge transfer: service fee, fast-mode eligibility and
//! expected completion time. Needs no signing capability. API failures fall back to
//! the static configuration.

use std::sync::Arc;

use ethereum_types::U256;
use serde::Serialize;
use tracing::{debug, warn};

use crate::chains::abi::{FAST_FINALITY_THRESHOLD, STANDARD_FINALITY_THRESHOLD};
use crate::config::BridgeConfig;
use crate::fee_client::{FeeClient, FeeTier};
use crate::registry::ChainRegistry;
use crate::types::{mul_div_ceil, Amount, ChainId, TransferMode};

/// 1 bps = 1000 milli-bps; 10_000 bps = 100%.
const MILLI_BPS_DENOMINATOR: u64 = 10_000_000;

/// Re-quotes allowed while growing the fee to cover the burned amount.
const MAX_FEE_REQUOTES: usize = 8;

/// Fee and time quote for one transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BridgeQuote {
    pub mode: TransferMode,
    pub fee: Amount,
    pub estimated_time_seconds: u64,
}

/// Bridge fee and timing oracle.
#[derive(Debug, Clone)]
pub struct BridgeOracle {
    registry: Arc<ChainRegistry>,
    fee_client: FeeClient,
    config: BridgeConfig,
}

impl BridgeOracle {
    pub fn new(registry: Arc<ChainRegistry>, fee_client: FeeClient, config: BridgeConfig) -> Self {
        Self {
            registry,
            fee_client,
            config,
        }
    }

    /// Service fee for bridging `amount` from `from` to `to`, rounded up.
    pub async fn estimate_fee(&self, amount: Amount, from: ChainId, to: ChainId, fast: bool) -> Amount {
        let milli_bps = self.fee_milli_bps(from, to, fast).await;
        Amount::from_u256(mul_div_ceil(
            amount.as_u256(),
            U256::from(milli_bps),
            U256::from(MILLI_BPS_DENOMINATOR),
        ))
    }

    /// Whether the fast-transfer allowance currently covers `amount`.
    pub async fn can_use_fast_mode(&self, amount: Amount, from: ChainId, to: ChainId) -> bool {
        match self.fee_client.fast_allowance().await {
            Ok(allowance) => {
                debug!("Fast allowance {} for {} -> {} (amount {})", allowance, from, to, amount);
                allowance >= amount
            }
            Err(e) => {
                warn!(
                    "Fast allowance API unavailable, using ceiling {}: {:#}",
                    self.config.fast_mode_ceiling, e
                );
                amount < self.config.fast_mode_ceiling
            }
        }
    }

    /// Expected completion time in seconds.
    ///
    /// `fast = None` decides eligibility via `can_use_fast_mode`.
    pub async fn estimate_time(&self, amount: Amount, from: ChainId, to: ChainId, fast: Option<bool>) -> u64 {
        let fast = match fast {
            Some(f) => f,
            None => self.can_use_fast_mode(amount, from, to).await,
        };
        if fast {
            self.config.fast_transfer_secs
        } else {
            self.registry.finality_secs(from) + self.config.attestation_secs + self.config.destination_execution_secs
        }
    }

    /// Resolves a requested mode: `auto` becomes fast when eligible.
    ///
    /// An explicit `fast` request that is not eligible drops to standard.
    pub async fn resolve_mode(&self, amount: Amount, from: ChainId, to: ChainId, requested: TransferMode) -> TransferMode {
        match requested {
            TransferMode::Standard => TransferMode::Standard,
            TransferMode::Fast | TransferMode::Auto => {
                if self.can_use_fast_mode(amount, from, to).await {
                    TransferMode::Fast
                } else {
                    if requested == TransferMode::Fast {
                        warn!("Fast mode requested but not available for {} on {} -> {}", amount, from, to);
                    }
                    TransferMode::Standard
                }
            }
        }
    }

    /// Resolved mode, fee and time in one call.
    pub async fn quote(&self, amount: Amount, from: ChainId, to: ChainId, requested: TransferMode) -> BridgeQuote {
        let mode = self.resolve_mode(amount, from, to, requested).await;
        let fast = mode == TransferMode::Fast;
        let fee = self.estimate_fee(amount, from, to, fast).await;
        let estimated_time_seconds = self.estimate_time(amount, from, to, Some(fast)).await;
        BridgeQuote {
            mode,
            fee,
            estimated_time_seconds,
        }
    }

    /// Quote for delivering `net` to the destination after the fee.
    ///
    /// The protocol charges its fee on the burned amount `net + fee`, which rounds up to
    /// more than the fee on `net` alone. The fee is re-quoted on the burned amount until
    /// it covers itself, so `fee >= estimate_fee(net + fee)`.
    pub async fn quote_for_delivery(&self, net: Amount, from: ChainId, to: ChainId, requested: TransferMode) -> BridgeQuote {
        let mut quote = self.quote(net, from, to, requested).await;
        let fast = quote.mode == TransferMode::Fast;
        for _ in 0..MAX_FEE_REQUOTES {
            let burned = net.saturating_add(quote.fee);
            let fee = self.estimate_fee(burned, from, to, fast).await;
            if fee <= quote.fee {
                return quote;
            }
            debug!("Fee on burned amount {} is {}, raising from {}", burned, fee, quote.fee);
            quote.fee = fee;
        }
        warn!(
            "Fee for {} on {} -> {} did not settle after {} re-quotes; using {}",
            net, from, to, MAX_FEE_REQUOTES, quote.fee
        );
        quote
    }

    async fn fee_milli_bps(&self, from: ChainId, to: ChainId, fast: bool) -> u64 {
        if let (Some(src), Some(dst)) = (self.registry.domain(from), self.registry.domain(to)) {
            match self.fee_client.fee_schedule(src, dst).await {
                Ok(tiers) => {
                    if let Some(fee) = select_tier(&tiers, fast) {
                        return fee;
                    }
                    warn!("Fee schedule {} -> {} has no usable tier, using fallback", src, dst);
                }
                Err(e) => warn!("Fee API unavailable for {} -> {}, using fallback: {:#}", src, dst, e),
            }
        }
        self.fallback_milli_bps(from, to, fast)
    }

    fn fallback_milli_bps(&self, from: ChainId, to: ChainId, fast: bool) -> u64 {
        let route = self
            .config
            .fee_routes
            .iter()
            .find(|r| r.from_chain == from && r.to_chain == to);
        match (route, fast) {
            (Some(r), true) => r.fast_milli_bps,
            (Some(r), false) => r.standard_milli_bps,
            (None, true) => self.config.default_fast_fee_milli_bps,
            (None, false) => self.config.default_standard_fee_milli_bps,
        }
    }
}

/// Fee of the tier matching the mode: the fast threshold for fast transfers, the
/// standard threshold otherwise.
fn select_tier(tiers: &[FeeTier], fast: bool) -> Option<u64> {
    let threshold = if fast {
        FAST_FINALITY_THRESHOLD
    } else {
        STANDARD_FINALITY_THRESHOLD
    };
    tiers
        .iter()
        .find(|t| t.finality_threshold == threshold)
        .map(|t| t.minimum_fee_milli_bps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_tier() {
        let tiers = vec![
            FeeTier { finality_threshold: 1000, minimum_fee_milli_bps: 1300 },
            FeeTier { finality_threshold: 2000, minimum_fee_milli_bps: 0 },
        ];
        assert_eq!(select_tier(&tiers, true), Some(1300));
        assert_eq!(select_tier(&tiers, false), Some(0));
        assert_eq!(select_tier(&tiers[..1], false), None);
    }
}
