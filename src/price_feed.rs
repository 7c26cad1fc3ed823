//! Native token price feed
//!
//! Fetches native-token prices in stablecoin minor units from a CoinGecko-compatible
//! `/simple/price` endpoint. Prices are cached per feed id; concurrent misses for the
//! same id share one fetch. When the feed fails, the chain's static fallback price is used.

use anyhow::{Context, Result};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::cache::TtlCache;
use crate::config::ChainConfig;
use crate::types::{parse_decimal_units, Amount, STABLECOIN_DECIMALS};

/// Cached native token price feed.
#[derive(Debug, Clone)]
pub struct PriceFeed {
    client: Client,
    base_url: String,
    timeout: Duration,
    cache: TtlCache<String, Amount>,
    /// Per feed id fetch locks
    inflight: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl PriceFeed {
    pub fn new(base_url: &str, timeout: Duration, cache: TtlCache<String, Amount>) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            cache,
            inflight: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Price of one whole native token of `chain` in stablecoin minor units.
    ///
    /// Never fails: feed errors degrade to the configured fallback price.
    pub async fn native_price(&self, chain: &ChainConfig) -> Amount {
        let feed_id = chain.price_feed_id.clone();
        if let Some(price) = self.cache.get(&feed_id).await {
            return price;
        }

        let lock = {
            let mut inflight = self.inflight.lock().await;
            inflight
                .entry(feed_id.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let _guard = lock.lock().await;

        // Another task may have filled the cache while we waited
        if let Some(price) = self.cache.get(&feed_id).await {
            return price;
        }

        match self.fetch_price(&feed_id).await {
            Ok(price) => {
                debug!("Fetched {} price: {} minor units", feed_id, price);
                self.cache.insert(feed_id, price).await;
                price
            }
            Err(e) => {
                warn!(
                    "Price feed unavailable for {} (chain {}), using fallback {}: {:#}",
                    feed_id, chain.chain_id, chain.fallback_native_price, e
                );
                chain.fallback_native_price
            }
        }
    }

    async fn fetch_price(&self, feed_id: &str) -> Result<Amount> {
        let url = format!("{}/simple/price", self.base_url);
        let request = self
            .client
            .get(&url)
            .query(&[("ids", feed_id), ("vs_currencies", "usd")])
            .send();

        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| anyhow::anyhow!("Timed out after {:?} waiting for price of {}", self.timeout, feed_id))?
            .with_context(|| format!("Failed to send price request to {}", url))?;

        if !response.status().is_success() {
            anyhow::bail!("Price feed returned HTTP {}", response.status());
        }

        let body: serde_json::Value = response
            .json()
            .await
            .context("Failed to parse price feed response")?;

        let usd = body
            .get(feed_id)
            .and_then(|entry| entry.get("usd"))
            .ok_or_else(|| anyhow::anyhow!("Price feed response has no usd price for {}", feed_id))?;

        let text = match usd {
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::String(s) => s.clone(),
            other => anyhow::bail!("Unexpected price value: {}", other),
        };

        let price = parse_decimal_units(&text, STABLECOIN_DECIMALS)?;
        if price.is_zero() {
            anyhow::bail!("Price feed returned zero price for {}", feed_id);
        }
        Ok(Amount::from_u256(price))
    }
}
