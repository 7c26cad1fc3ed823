//! Configuration Management Module
//!
//! This module handles loading and validating configuration for the omnigas service.
//! Configuration includes external service endpoints, bridge and gas parameters, and the
//! static per-chain table (stablecoin address, bridge domain, gas token, finality).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::types::{is_valid_address, Amount, ChainId};

// ============================================================================
// CONFIGURATION STRUCTURES
// ============================================================================

/// Main configuration structure containing all omnigas settings.
///
/// This structure holds configuration for:
/// - External service endpoints (attestation, fee API, price feed) and timeouts
/// - Bridge protocol parameters (minimum amount, polling, fee fallbacks)
/// - Gas estimation parameters (floors, cache TTLs)
/// - Balance cache parameters
/// - HTTP API listen address
/// - Supported chains (use [[chain]] in TOML, one block per chain)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OmnigasConfig {
    /// External service endpoints and request timeouts
    #[serde(default)]
    pub service: ServiceConfig,
    /// Bridge protocol parameters
    #[serde(default)]
    pub bridge: BridgeConfig,
    /// Gas estimation parameters
    #[serde(default)]
    pub gas: GasConfig,
    /// Balance aggregation parameters
    #[serde(default)]
    pub balance: BalanceConfig,
    /// HTTP API settings
    #[serde(default)]
    pub api: ApiConfig,
    /// Supported chains
    #[serde(rename = "chain", default)]
    pub chains: Vec<ChainConfig>,
}

/// External service endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Attestation service base URL (e.g., "https://iris-api-sandbox.circle.com")
    #[serde(default = "default_attestation_url")]
    pub attestation_url: String,
    /// Fee schedule and fast allowance API base URL
    #[serde(default = "default_attestation_url")]
    pub fee_api_url: String,
    /// Price feed base URL (CoinGecko-compatible `/simple/price`)
    #[serde(default = "default_price_feed_url")]
    pub price_feed_url: String,
    /// Use the in-process mock attestation service instead of the HTTP one
    #[serde(default)]
    pub mock_attestation: bool,
    /// Number of polls after which the mock attestation reports complete
    #[serde(default = "default_mock_attestation_polls")]
    pub mock_attestation_polls: u32,
    /// Timeout for chain JSON-RPC calls in milliseconds
    #[serde(default = "default_rpc_timeout_ms")]
    pub rpc_timeout_ms: u64,
    /// Timeout for fee schedule and allowance requests in milliseconds
    #[serde(default = "default_fee_api_timeout_ms")]
    pub fee_api_timeout_ms: u64,
    /// Timeout for price feed requests in milliseconds
    #[serde(default = "default_price_feed_timeout_ms")]
    pub price_feed_timeout_ms: u64,
    /// Timeout for a single attestation poll request in milliseconds
    #[serde(default = "default_attestation_request_timeout_ms")]
    pub attestation_request_timeout_ms: u64,
}

/// Bridge protocol parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Smallest amount the bridge protocol accepts (stablecoin minor units)
    #[serde(default = "default_min_bridge_amount")]
    pub min_bridge_amount: Amount,
    /// Fallback fast-mode ceiling when the allowance API is unreachable
    #[serde(default = "default_fast_mode_ceiling")]
    pub fast_mode_ceiling: Amount,
    /// Fallback fast-mode fee in milli-basis-points (1000 = 1 bps)
    #[serde(default = "default_fast_fee_milli_bps")]
    pub default_fast_fee_milli_bps: u64,
    /// Fallback standard-mode fee in milli-basis-points
    #[serde(default)]
    pub default_standard_fee_milli_bps: u64,
    /// Static per-pair fee table used when the fee API fails
    #[serde(rename = "fee_route", default)]
    pub fee_routes: Vec<FeeRouteConfig>,
    /// Fast transfer completion estimate in seconds
    #[serde(default = "default_fast_transfer_secs")]
    pub fast_transfer_secs: u64,
    /// Source finality wait used when a chain has none configured
    #[serde(default = "default_finality_secs")]
    pub default_finality_secs: u64,
    /// Attestation service processing constant in seconds
    #[serde(default = "default_attestation_secs")]
    pub attestation_secs: u64,
    /// Destination execution constant in seconds
    #[serde(default = "default_destination_execution_secs")]
    pub destination_execution_secs: u64,
    /// Interval between attestation polls in milliseconds
    #[serde(default = "default_attestation_poll_interval_ms")]
    pub attestation_poll_interval_ms: u64,
    /// Attestation polling ceiling in milliseconds
    #[serde(default = "default_attestation_timeout_ms")]
    pub attestation_timeout_ms: u64,
    /// Attempts per contract submission before giving up on transient errors
    #[serde(default = "default_max_submit_attempts")]
    pub max_submit_attempts: u32,
    /// Interval between receipt polls in milliseconds
    #[serde(default = "default_receipt_poll_interval_ms")]
    pub receipt_poll_interval_ms: u64,
    /// Receipt wait ceiling in milliseconds
    #[serde(default = "default_receipt_timeout_ms")]
    pub receipt_timeout_ms: u64,
}

/// Static fee entry for a (source, destination) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeRouteConfig {
    pub from_chain: ChainId,
    pub to_chain: ChainId,
    /// Fast-mode fee in milli-basis-points
    pub fast_milli_bps: u64,
    /// Standard-mode fee in milli-basis-points
    #[serde(default)]
    pub standard_milli_bps: u64,
}

/// Gas estimation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasConfig {
    /// Cost a below-minimum estimate is raised to (stablecoin minor units)
    #[serde(default = "default_practical_min_cost")]
    pub practical_min_cost: Amount,
    /// Gas limit for a plain native transfer
    #[serde(default = "default_transfer_gas_limit")]
    pub transfer_gas_limit: u64,
    /// Gas limit used for contract calls when estimation fails
    #[serde(default = "default_call_gas_limit")]
    pub default_call_gas_limit: u64,
    /// Gas price cache TTL in seconds
    #[serde(default = "default_gas_price_ttl_secs")]
    pub gas_price_ttl_secs: u64,
    /// Native token price cache TTL in seconds (60-120)
    #[serde(default = "default_price_ttl_secs")]
    pub price_ttl_secs: u64,
}

/// Balance aggregation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceConfig {
    /// Per (account, chain) cache TTL in seconds
    #[serde(default = "default_balance_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Delay before the single retry of a failed balance query in milliseconds
    #[serde(default = "default_balance_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

/// HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

/// Static configuration for one supported EVM chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Native chain ID (e.g., 84532 for Base Sepolia)
    pub chain_id: ChainId,
    /// Human-readable name for the chain
    pub name: String,
    /// RPC endpoint URL
    pub rpc_url: String,
    /// USDC contract address
    pub usdc_addr: String,
    /// Native gas token symbol (e.g., "ETH")
    #[serde(default = "default_gas_token")]
    pub gas_token: String,
    /// Price feed id of the native token (e.g., "ethereum")
    #[serde(default = "default_price_feed_id")]
    pub price_feed_id: String,
    /// Fallback native token price in stablecoin minor units per whole native token
    pub fallback_native_price: Amount,
    /// Decimals of the native token
    #[serde(default = "default_native_decimals")]
    pub native_decimals: u32,
    /// Fallback gas price in wei when `eth_gasPrice` fails
    #[serde(default = "default_fallback_gas_price_wei")]
    pub fallback_gas_price_wei: u64,
    /// CCTP bridge domain; chains without one cannot bridge
    #[serde(default)]
    pub domain: Option<u32>,
    /// CCTP TokenMessenger contract address
    #[serde(default)]
    pub token_messenger: Option<String>,
    /// CCTP MessageTransmitter contract address
    #[serde(default)]
    pub message_transmitter: Option<String>,
    /// Standard-mode finality wait in seconds
    #[serde(default)]
    pub finality_secs: Option<u64>,
    /// ERC-4337 paymaster RPC URL
    #[serde(default)]
    pub paymaster_url: Option<String>,
    /// ERC-4337 bundler RPC URL
    #[serde(default)]
    pub bundler_url: Option<String>,
    /// ERC-4337 EntryPoint address
    #[serde(default = "default_entry_point")]
    pub entry_point: String,
}

impl ChainConfig {
    /// True when both CCTP contracts and a domain are configured.
    pub fn supports_bridge(&self) -> bool {
        self.domain.is_some() && self.token_messenger.is_some() && self.message_transmitter.is_some()
    }

    /// True when both a paymaster and a bundler are configured.
    pub fn supports_sponsorship(&self) -> bool {
        self.paymaster_url.is_some() && self.bundler_url.is_some()
    }
}

fn default_attestation_url() -> String {
    "https://iris-api-sandbox.circle.com".to_string()
}

fn default_price_feed_url() -> String {
    "https://api.coingecko.com/api/v3".to_string()
}

fn default_mock_attestation_polls() -> u32 {
    2
}

fn default_rpc_timeout_ms() -> u64 {
    15_000
}

fn default_fee_api_timeout_ms() -> u64 {
    4_000
}

fn default_price_feed_timeout_ms() -> u64 {
    5_000
}

fn default_attestation_request_timeout_ms() -> u64 {
    10_000
}

fn default_min_bridge_amount() -> Amount {
    Amount::from(10_000u64)
}

fn default_fast_mode_ceiling() -> Amount {
    // 10,000 USDC
    Amount::from(10_000_000_000u64)
}

fn default_fast_fee_milli_bps() -> u64 {
    1_000
}

fn default_fast_transfer_secs() -> u64 {
    30
}

fn default_finality_secs() -> u64 {
    300
}

fn default_attestation_secs() -> u64 {
    60
}

fn default_destination_execution_secs() -> u64 {
    30
}

fn default_attestation_poll_interval_ms() -> u64 {
    5_000
}

fn default_attestation_timeout_ms() -> u64 {
    20 * 60 * 1_000
}

fn default_max_submit_attempts() -> u32 {
    3
}

fn default_receipt_poll_interval_ms() -> u64 {
    500
}

fn default_receipt_timeout_ms() -> u64 {
    120_000
}

fn default_practical_min_cost() -> Amount {
    Amount::from(20_000u64)
}

fn default_transfer_gas_limit() -> u64 {
    21_000
}

fn default_call_gas_limit() -> u64 {
    200_000
}

fn default_gas_price_ttl_secs() -> u64 {
    15
}

fn default_price_ttl_secs() -> u64 {
    60
}

fn default_balance_ttl_secs() -> u64 {
    30
}

fn default_balance_retry_delay_ms() -> u64 {
    250
}

fn default_api_host() -> String {
    "127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
    4480
}

fn default_gas_token() -> String {
    "ETH".to_string()
}

fn default_price_feed_id() -> String {
    "ethereum".to_string()
}

fn default_native_decimals() -> u32 {
    18
}

fn default_fallback_gas_price_wei() -> u64 {
    1_000_000_000
}

fn default_entry_point() -> String {
    // ERC-4337 v0.6 EntryPoint
    "0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789".to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            attestation_url: default_attestation_url(),
            fee_api_url: default_attestation_url(),
            price_feed_url: default_price_feed_url(),
            mock_attestation: false,
            mock_attestation_polls: default_mock_attestation_polls(),
            rpc_timeout_ms: default_rpc_timeout_ms(),
            fee_api_timeout_ms: default_fee_api_timeout_ms(),
            price_feed_timeout_ms: default_price_feed_timeout_ms(),
            attestation_request_timeout_ms: default_attestation_request_timeout_ms(),
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            min_bridge_amount: default_min_bridge_amount(),
            fast_mode_ceiling: default_fast_mode_ceiling(),
            default_fast_fee_milli_bps: default_fast_fee_milli_bps(),
            default_standard_fee_milli_bps: 0,
            fee_routes: Vec::new(),
            fast_transfer_secs: default_fast_transfer_secs(),
            default_finality_secs: default_finality_secs(),
            attestation_secs: default_attestation_secs(),
            destination_execution_secs: default_destination_execution_secs(),
            attestation_poll_interval_ms: default_attestation_poll_interval_ms(),
            attestation_timeout_ms: default_attestation_timeout_ms(),
            max_submit_attempts: default_max_submit_attempts(),
            receipt_poll_interval_ms: default_receipt_poll_interval_ms(),
            receipt_timeout_ms: default_receipt_timeout_ms(),
        }
    }
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            practical_min_cost: default_practical_min_cost(),
            transfer_gas_limit: default_transfer_gas_limit(),
            default_call_gas_limit: default_call_gas_limit(),
            gas_price_ttl_secs: default_gas_price_ttl_secs(),
            price_ttl_secs: default_price_ttl_secs(),
        }
    }
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_balance_ttl_secs(),
            retry_delay_ms: default_balance_retry_delay_ms(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
        }
    }
}

impl OmnigasConfig {
    /// Loads configuration from a TOML file.
    ///
    /// This function:
    /// 1. Resolves the path (argument, else OMNIGAS_CONFIG_PATH env var, else config/omnigas.toml)
    /// 2. If it exists, loads, parses and validates the configuration
    /// 3. If it doesn't exist, returns an error asking the user to copy the template
    ///
    /// # Arguments
    ///
    /// * `path` - Optional path to config file
    ///
    /// # Returns
    ///
    /// * `Ok(OmnigasConfig)` - Successfully loaded and validated configuration
    /// * `Err(anyhow::Error)` - File missing, unparsable, or invalid
    pub fn load_from_path(path: Option<&str>) -> anyhow::Result<Self> {
        let config_path = path
            .map(|p| p.to_string())
            .or_else(|| std::env::var("OMNIGAS_CONFIG_PATH").ok())
            .unwrap_or_else(|| "config/omnigas.toml".to_string());

        if std::path::Path::new(&config_path).exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_toml_str(&content)
        } else {
            Err(anyhow::anyhow!(
                "Configuration file '{}' not found. Please copy the template:\n\
                cp config/omnigas.template.toml config/omnigas.toml\n\
                Then edit config/omnigas.toml with your actual values.",
                config_path
            ))
        }
    }

    /// Loads configuration from the default location.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from_path(None)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: OmnigasConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for consistency and correctness.
    ///
    /// Checks:
    /// - At least one chain is configured
    /// - Chain IDs and bridge domains are unique
    /// - Contract addresses are 20-byte hex
    /// - Chains with a domain also configure both CCTP contracts
    /// - Intervals and timeouts are positive
    /// - The practical minimum cost covers the bridge minimum
    /// - The price TTL lies within 60-120 seconds
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.chains.is_empty() {
            return Err(anyhow::anyhow!(
                "Configuration error: At least one [[chain]] must be configured"
            ));
        }

        let mut chain_ids = HashSet::new();
        let mut domains = HashSet::new();
        for chain in &self.chains {
            if chain.chain_id.0 == 0 {
                anyhow::bail!("Configuration error: Chain '{}' has chain ID 0", chain.name);
            }
            if !chain_ids.insert(chain.chain_id) {
                anyhow::bail!(
                    "Configuration error: Duplicate chain ID {} ('{}')",
                    chain.chain_id,
                    chain.name
                );
            }
            if let Some(domain) = chain.domain {
                if !domains.insert(domain) {
                    anyhow::bail!(
                        "Configuration error: Duplicate bridge domain {} ('{}')",
                        domain,
                        chain.name
                    );
                }
                if chain.token_messenger.is_none() || chain.message_transmitter.is_none() {
                    anyhow::bail!(
                        "Configuration error: Chain '{}' has a bridge domain but no token_messenger/message_transmitter",
                        chain.name
                    );
                }
            }

            validate_address(&chain.usdc_addr)
                .map_err(|e| anyhow::anyhow!("Invalid usdc_addr for chain '{}': {}", chain.name, e))?;
            validate_address(&chain.entry_point)
                .map_err(|e| anyhow::anyhow!("Invalid entry_point for chain '{}': {}", chain.name, e))?;
            if let Some(addr) = &chain.token_messenger {
                validate_address(addr)
                    .map_err(|e| anyhow::anyhow!("Invalid token_messenger for chain '{}': {}", chain.name, e))?;
            }
            if let Some(addr) = &chain.message_transmitter {
                validate_address(addr).map_err(|e| {
                    anyhow::anyhow!("Invalid message_transmitter for chain '{}': {}", chain.name, e)
                })?;
            }
            if chain.paymaster_url.is_some() != chain.bundler_url.is_some() {
                anyhow::bail!(
                    "Configuration error: Chain '{}' must configure both paymaster_url and bundler_url, or neither",
                    chain.name
                );
            }
        }

        for route in &self.bridge.fee_routes {
            if !chain_ids.contains(&route.from_chain) || !chain_ids.contains(&route.to_chain) {
                anyhow::bail!(
                    "Configuration error: fee_route {} -> {} references an unknown chain",
                    route.from_chain,
                    route.to_chain
                );
            }
        }

        let positive = [
            ("bridge.attestation_poll_interval_ms", self.bridge.attestation_poll_interval_ms),
            ("bridge.attestation_timeout_ms", self.bridge.attestation_timeout_ms),
            ("bridge.receipt_poll_interval_ms", self.bridge.receipt_poll_interval_ms),
            ("bridge.receipt_timeout_ms", self.bridge.receipt_timeout_ms),
            ("service.rpc_timeout_ms", self.service.rpc_timeout_ms),
            ("service.fee_api_timeout_ms", self.service.fee_api_timeout_ms),
            ("service.price_feed_timeout_ms", self.service.price_feed_timeout_ms),
            ("service.attestation_request_timeout_ms", self.service.attestation_request_timeout_ms),
            ("balance.cache_ttl_secs", self.balance.cache_ttl_secs),
            ("gas.gas_price_ttl_secs", self.gas.gas_price_ttl_secs),
        ];
        for (name, value) in positive {
            if value == 0 {
                anyhow::bail!("Configuration error: {} must be positive", name);
            }
        }

        if self.bridge.max_submit_attempts == 0 {
            anyhow::bail!("Configuration error: bridge.max_submit_attempts must be at least 1");
        }
        if self.gas.practical_min_cost < self.bridge.min_bridge_amount {
            anyhow::bail!(
                "Configuration error: gas.practical_min_cost ({}) is below bridge.min_bridge_amount ({})",
                self.gas.practical_min_cost,
                self.bridge.min_bridge_amount
            );
        }
        if !(60..=120).contains(&self.gas.price_ttl_secs) {
            anyhow::bail!(
                "Configuration error: gas.price_ttl_secs must be between 60 and 120, got {}",
                self.gas.price_ttl_secs
            );
        }

        Ok(())
    }
}

/// Validates a `0x`-prefixed 20-byte hex address.
fn validate_address(addr: &str) -> anyhow::Result<()> {
    if !addr.starts_with("0x") {
        anyhow::bail!("address must be 0x-prefixed hex string");
    }
    if !is_valid_address(addr) {
        anyhow::bail!("address must be 20 bytes of hex, got '{}'", addr);
    }
    Ok(())
}
