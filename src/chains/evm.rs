//! EVM Chain Client
//!
//! JSON-RPC client for one EVM chain: stablecoin reads, gas price and gas estimation,
//! raw transaction submission and receipt polling. Every call is bounded by both the
//! HTTP client timeout and an explicit `tokio::time::timeout`.

use anyhow::{Context, Result};
use ethereum_types::U256;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::chains::abi;
use crate::config::ChainConfig;
use crate::types::ChainId;

/// EVM JSON-RPC request wrapper
#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: Vec<serde_json::Value>,
    id: u64,
}

/// EVM JSON-RPC response wrapper
#[derive(Debug, Deserialize)]
pub(crate) struct JsonRpcResponse<T> {
    pub result: Option<T>,
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcError {
    /// Error text with the decoded `Error(string)` reason appended when present.
    pub fn describe(&self) -> String {
        let reason = self
            .data
            .as_ref()
            .and_then(|d| d.as_str())
            .and_then(abi::decode_revert_reason);
        match reason {
            Some(reason) => format!("{}: {} (code: {})", self.message, reason, self.code),
            None => format!("{} (code: {})", self.message, self.code),
        }
    }
}

/// EVM event log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvmLog {
    /// Address of the contract that emitted the event
    pub address: String,
    /// Array of topics (indexed event parameters)
    pub topics: Vec<String>,
    /// Event data (non-indexed parameters)
    pub data: String,
}

/// Transaction receipt (fields the orchestration reads)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionReceipt {
    #[serde(rename = "transactionHash")]
    pub transaction_hash: String,
    /// "0x1" on success, "0x0" on revert
    #[serde(default)]
    pub status: Option<String>,
    #[serde(rename = "blockNumber", default)]
    pub block_number: Option<String>,
    #[serde(default)]
    pub logs: Vec<EvmLog>,
}

impl TransactionReceipt {
    pub fn is_success(&self) -> bool {
        self.status.as_deref() == Some("0x1")
    }

    /// Logs emitted by `address` with `topic` as the first topic.
    pub fn logs_matching<'a>(&'a self, address: &'a str, topic: &'a str) -> impl Iterator<Item = &'a EvmLog> + 'a {
        self.logs.iter().filter(move |log| {
            log.address.eq_ignore_ascii_case(address)
                && log.topics.first().map(|t| t.eq_ignore_ascii_case(topic)).unwrap_or(false)
        })
    }
}

/// Unsigned call parameters.
#[derive(Debug, Clone, Default)]
pub struct CallRequest {
    pub from: Option<String>,
    pub to: String,
    pub value: Option<U256>,
    pub data: Option<Vec<u8>>,
}

impl CallRequest {
    pub fn to_json(&self) -> serde_json::Value {
        let mut obj = serde_json::json!({ "to": self.to });
        if let Some(from) = &self.from {
            obj["from"] = serde_json::json!(from);
        }
        if let Some(value) = self.value {
            obj["value"] = serde_json::json!(abi::u256_to_quantity(value));
        }
        if let Some(data) = &self.data {
            obj["data"] = serde_json::json!(abi::to_hex(data));
        }
        obj
    }
}

/// Client for one EVM chain
#[derive(Debug, Clone)]
pub struct EvmClient {
    /// HTTP client for JSON-RPC calls
    client: Client,
    /// RPC URL
    rpc_url: String,
    chain_id: ChainId,
    /// Upper bound on a single call
    timeout: Duration,
}

impl EvmClient {
    /// Creates a new EVM chain client
    ///
    /// # Arguments
    ///
    /// * `config` - Chain configuration
    /// * `timeout` - Per-call timeout
    ///
    /// # Returns
    ///
    /// * `Ok(EvmClient)` - Successfully created client
    /// * `Err(anyhow::Error)` - Failed to create the HTTP client
    pub fn new(config: &ChainConfig, timeout: Duration) -> Result<Self> {
        Self::with_url(config.chain_id, &config.rpc_url, timeout)
    }

    pub fn with_url(chain_id: ChainId, rpc_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .no_proxy() // Avoid macOS system-configuration issues in tests
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            rpc_url: rpc_url.to_string(),
            chain_id,
            timeout,
        })
    }

    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Generic JSON-RPC call helper.
    ///
    /// A `null` result deserializes into `T` (use `Option<_>` for calls that may return nothing).
    pub async fn json_rpc<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<T> {
        json_rpc_call(&self.client, &self.rpc_url, self.timeout, method, params).await
    }

    /// `eth_call` at the latest block, returning the raw hex result.
    pub async fn call(&self, request: &CallRequest) -> Result<String> {
        self.json_rpc("eth_call", vec![request.to_json(), serde_json::json!("latest")])
            .await
    }

    /// ERC-20 `balanceOf(owner)`.
    pub async fn erc20_balance(&self, token: &str, owner: &str) -> Result<U256> {
        let result = self
            .call(&CallRequest {
                to: token.to_string(),
                data: Some(abi::erc20_balance_of(owner)?),
                ..Default::default()
            })
            .await
            .context("Failed to call balanceOf")?;
        abi::decode_uint(&result).context("Failed to decode balanceOf result")
    }

    /// ERC-20 `allowance(owner, spender)`.
    pub async fn erc20_allowance(&self, token: &str, owner: &str, spender: &str) -> Result<U256> {
        let result = self
            .call(&CallRequest {
                to: token.to_string(),
                data: Some(abi::erc20_allowance(owner, spender)?),
                ..Default::default()
            })
            .await
            .context("Failed to call allowance")?;
        abi::decode_uint(&result).context("Failed to decode allowance result")
    }

    pub async fn gas_price(&self) -> Result<U256> {
        let price_hex: String = self
            .json_rpc("eth_gasPrice", vec![])
            .await
            .context("eth_gasPrice failed")?;
        abi::parse_hex_u256(&price_hex)
    }

    pub async fn estimate_gas(&self, request: &CallRequest) -> Result<u64> {
        let gas_hex: String = self
            .json_rpc("eth_estimateGas", vec![request.to_json()])
            .await
            .context("eth_estimateGas failed")?;
        abi::parse_hex_u64(&gas_hex)
    }

    /// Pending nonce of `address`.
    pub async fn nonce(&self, address: &str) -> Result<u64> {
        let nonce_hex: String = self
            .json_rpc(
                "eth_getTransactionCount",
                vec![serde_json::json!(address), serde_json::json!("pending")],
            )
            .await
            .context("eth_getTransactionCount failed")?;
        abi::parse_hex_u64(&nonce_hex).context("Failed to parse nonce")
    }

    pub async fn send_raw_transaction(&self, raw_tx: &str) -> Result<String> {
        self.json_rpc("eth_sendRawTransaction", vec![serde_json::json!(raw_tx)])
            .await
            .context("eth_sendRawTransaction failed")
    }

    pub async fn get_receipt(&self, tx_hash: &str) -> Result<Option<TransactionReceipt>> {
        self.json_rpc("eth_getTransactionReceipt", vec![serde_json::json!(tx_hash)])
            .await
    }

    /// Polls for a receipt until it appears or `timeout` elapses.
    ///
    /// Transient RPC errors while polling are logged and retried. A reverted receipt is
    /// returned as-is; callers check `is_success()`.
    pub async fn wait_for_receipt(
        &self,
        tx_hash: &str,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<TransactionReceipt> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match self.get_receipt(tx_hash).await {
                Ok(Some(receipt)) => return Ok(receipt),
                Ok(None) => {}
                Err(e) => debug!("Receipt poll for {} on chain {} failed: {:#}", tx_hash, self.chain_id, e),
            }
            if tokio::time::Instant::now() + poll_interval > deadline {
                anyhow::bail!("Timed out waiting for transaction receipt: {}", tx_hash);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}

/// JSON-RPC call against an arbitrary endpoint (chain RPC, wallet, bundler, paymaster).
pub(crate) async fn json_rpc_call<T: serde::de::DeserializeOwned>(
    client: &Client,
    url: &str,
    timeout: Duration,
    method: &str,
    params: Vec<serde_json::Value>,
) -> Result<T> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let rpc_future = async {
        client
            .post(url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to send {} request to {}", method, url))?
            .json::<JsonRpcResponse<serde_json::Value>>()
            .await
            .with_context(|| format!("Failed to parse {} response from {}", method, url))
    };

    let response = tokio::time::timeout(timeout, rpc_future)
        .await
        .map_err(|_| anyhow::anyhow!("Timed out after {:?} waiting for {} from {}", timeout, method, url))??;

    if let Some(error) = response.error {
        anyhow::bail!("JSON-RPC error from {} ({}): {}", url, method, error.describe());
    }

    let result = response.result.unwrap_or(serde_json::Value::Null);
    serde_json::from_value(result).with_context(|| format!("Unexpected {} result shape", method))
}
