//! Bridge Fee API Client
//!
//! Client for the bridge fee schedule (`/v2/burn/USDC/fees/{src}/{dst}`) and the
//! fast-transfer allowance (`/v2/fastBurn/USDC/allowance`).

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::{parse_decimal_units, Amount, STABLECOIN_DECIMALS};

/// One tier of the fee schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeTier {
    pub finality_threshold: u32,
    /// Minimum fee in milli-basis-points (1000 = 1 bps)
    pub minimum_fee_milli_bps: u64,
}

#[derive(Debug, Deserialize)]
struct RawFeeTier {
    #[serde(rename = "finalityThreshold")]
    finality_threshold: u32,
    #[serde(rename = "minimumFee")]
    minimum_fee: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RawAllowance {
    allowance: serde_json::Value,
}

/// Client for the fee schedule and fast allowance API
#[derive(Debug, Clone)]
pub struct FeeClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl FeeClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Fetches the fee tiers for a (source domain, destination domain) pair.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<FeeTier>)` - Tiers as published, fees converted to milli-bps
    /// * `Err(anyhow::Error)` - Timeout, HTTP error, or malformed body
    pub async fn fee_schedule(&self, source_domain: u32, destination_domain: u32) -> Result<Vec<FeeTier>> {
        let url = format!(
            "{}/v2/burn/USDC/fees/{}/{}",
            self.base_url, source_domain, destination_domain
        );
        let raw: Vec<RawFeeTier> = self.get_json(&url).await?;
        if raw.is_empty() {
            anyhow::bail!("Empty fee schedule for {} -> {}", source_domain, destination_domain);
        }
        raw.into_iter()
            .map(|tier| {
                let text = json_number_text(&tier.minimum_fee)?;
                let milli_bps = parse_decimal_units(&text, 3)?;
                if milli_bps > ethereum_types::U256::from(u64::MAX) {
                    anyhow::bail!("Fee out of range: {}", text);
                }
                Ok(FeeTier {
                    finality_threshold: tier.finality_threshold,
                    minimum_fee_milli_bps: milli_bps.as_u64(),
                })
            })
            .collect()
    }

    /// Remaining fast-transfer allowance in stablecoin minor units.
    pub async fn fast_allowance(&self) -> Result<Amount> {
        let url = format!("{}/v2/fastBurn/USDC/allowance", self.base_url);
        let raw: RawAllowance = self.get_json(&url).await?;
        let text = json_number_text(&raw.allowance)?;
        Amount::from_decimal_str(&text, STABLECOIN_DECIMALS)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = tokio::time::timeout(self.timeout, self.client.get(url).send())
            .await
            .map_err(|_| anyhow::anyhow!("Timed out after {:?} waiting for {}", self.timeout, url))?
            .with_context(|| format!("Failed to send request to {}", url))?;

        if !response.status().is_success() {
            anyhow::bail!("{} returned HTTP {}", url, response.status());
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse response from {}", url))
    }
}

/// Decimal text of a JSON number or numeric string.
fn json_number_text(value: &serde_json::Value) -> Result<String> {
    match value {
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::String(s) => Ok(s.clone()),
        other => anyhow::bail!("Expected a number, got {}", other),
    }
}
