//! Balance Aggregation Service
//!
//! Reads the caller's stablecoin balance on every supported chain, caches it per
//! (account, chain), and exposes a unified view plus a periodic-refresh subscription.
//! Read failures degrade to zero; they are logged and never cached.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{CachedEntry, TtlCache};
use crate::chains::ChainClients;
use crate::error::OmnigasError;
use crate::registry::ChainRegistry;
use crate::types::{Amount, ChainBalance, ChainId, UnifiedBalance};

/// Cache key: (lowercased account, chain).
pub type BalanceKey = (String, ChainId);

/// Aggregates stablecoin balances across chains.
///
/// Cheap to clone; clones share the cache.
#[derive(Debug, Clone)]
pub struct BalanceAggregator {
    registry: Arc<ChainRegistry>,
    clients: Arc<ChainClients>,
    cache: TtlCache<BalanceKey, Amount>,
    retry_delay: Duration,
}

impl BalanceAggregator {
    pub fn new(
        registry: Arc<ChainRegistry>,
        clients: Arc<ChainClients>,
        cache: TtlCache<BalanceKey, Amount>,
        retry_delay: Duration,
    ) -> Self {
        Self {
            registry,
            clients,
            cache,
            retry_delay,
        }
    }

    /// Balance of `account` on `chain_id`, zero when the chain cannot be read.
    pub async fn get_balance(&self, account: &str, chain_id: ChainId) -> Amount {
        match self.balance_entry(account, chain_id).await {
            Ok(entry) => entry.value,
            Err(e) => {
                warn!("Balance degraded to zero: {}", e);
                Amount::zero()
            }
        }
    }

    /// Balance of `account` on `chain_id`, surfacing `ChainUnavailable` instead of zero.
    pub async fn try_get_balance(&self, account: &str, chain_id: ChainId) -> Result<Amount, OmnigasError> {
        self.balance_entry(account, chain_id).await.map(|e| e.value)
    }

    /// Reads the balance from the chain, bypassing (and refreshing) the cache.
    ///
    /// Used right before settlement, where a stale value is not acceptable.
    pub async fn fresh_balance(&self, account: &str, chain_id: ChainId) -> Result<Amount, OmnigasError> {
        let key = (account.to_lowercase(), chain_id);
        let balance = self.fetch_with_retry(account, chain_id).await?;
        self.cache.insert(key, balance).await;
        Ok(balance)
    }

    /// Unified balance over all supported chains.
    ///
    /// Chains are queried concurrently. A failing chain contributes zero; the aggregate
    /// itself never fails. `last_updated` is the newest fetch time among the chains that
    /// answered, or the Unix epoch when none did.
    pub async fn get_unified_balance(&self, account: &str) -> UnifiedBalance {
        let chain_ids = self.registry.chain_ids();
        let results = join_all(
            chain_ids
                .iter()
                .map(|&chain_id| async move { (chain_id, self.balance_entry(account, chain_id).await) }),
        )
        .await;

        let mut per_chain = Vec::with_capacity(results.len());
        let mut last_updated: Option<DateTime<Utc>> = None;
        for (chain_id, result) in results {
            let balance = match result {
                Ok(entry) => {
                    last_updated = Some(match last_updated {
                        Some(ts) if ts >= entry.fetched_at => ts,
                        _ => entry.fetched_at,
                    });
                    entry.value
                }
                Err(e) => {
                    warn!("Balance degraded to zero: {}", e);
                    Amount::zero()
                }
            };
            per_chain.push(ChainBalance { chain_id, balance });
        }

        // Epoch when no chain answered
        UnifiedBalance::from_entries(per_chain, last_updated.unwrap_or(DateTime::<Utc>::UNIX_EPOCH))
    }

    /// Starts a background refresh of `account`'s unified balance every `interval`.
    ///
    /// The task stops when the subscription is unsubscribed or dropped.
    pub fn subscribe(&self, account: &str, interval: Duration) -> BalanceSubscription {
        let (sender, receiver) = watch::channel(None);
        let aggregator = self.clone();
        let account = account.to_string();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let balance = aggregator.get_unified_balance(&account).await;
                debug!("Balance refresh for {}: total {}", account, balance.total_amount);
                if sender.send(Some(balance)).is_err() {
                    break;
                }
            }
        });

        info!("Started balance subscription (interval: {:?})", interval);
        BalanceSubscription { receiver, handle }
    }

    async fn balance_entry(&self, account: &str, chain_id: ChainId) -> Result<CachedEntry<Amount>, OmnigasError> {
        let key = (account.to_lowercase(), chain_id);
        if let Some(entry) = self.cache.get_entry(&key).await {
            return Ok(entry);
        }
        let balance = self.fetch_with_retry(account, chain_id).await?;
        Ok(self.cache.insert(key, balance).await)
    }

    /// `balanceOf` with one retry.
    async fn fetch_with_retry(&self, account: &str, chain_id: ChainId) -> Result<Amount, OmnigasError> {
        let chain = self.registry.get(chain_id)?;
        let client = self.clients.get(chain_id)?;

        let first = client.erc20_balance(&chain.usdc_addr, account).await;
        let result = match first {
            Ok(balance) => Ok(balance),
            Err(e) => {
                debug!("balanceOf on chain {} failed, retrying: {:#}", chain_id, e);
                tokio::time::sleep(self.retry_delay).await;
                client.erc20_balance(&chain.usdc_addr, account).await
            }
        };

        result
            .map(Amount::from_u256)
            .map_err(|e| OmnigasError::ChainUnavailable {
                chain_id,
                reason: format!("{:#}", e),
            })
    }
}

/// Handle to a running balance refresh.
///
/// Dropping the handle stops the refresh task.
#[derive(Debug)]
pub struct BalanceSubscription {
    receiver: watch::Receiver<Option<UnifiedBalance>>,
    handle: JoinHandle<()>,
}

impl BalanceSubscription {
    /// Most recent published balance, if any refresh has completed.
    pub fn latest(&self) -> Option<UnifiedBalance> {
        self.receiver.borrow().clone()
    }

    /// Waits for the next published balance.
    pub async fn changed(&mut self) -> Option<UnifiedBalance> {
        self.receiver.changed().await.ok()?;
        self.receiver.borrow_and_update().clone()
    }

    pub fn receiver(&self) -> watch::Receiver<Option<UnifiedBalance>> {
        self.receiver.clone()
    }

    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stops the refresh task.
    pub fn unsubscribe(self) {
        self.handle.abort();
    }
}

impl Drop for BalanceSubscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
