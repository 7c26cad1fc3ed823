//! Shared test helpers for omnigas tests
//!
//! This module provides constants, config builders and JSON-RPC mock helpers.

#![allow(dead_code)]

use omnigas::attestation_client::{AttestationService, MockAttestation};
use omnigas::chains::abi::{self, Token};
use omnigas::config::{
    ApiConfig, BalanceConfig, BridgeConfig, ChainConfig, GasConfig, OmnigasConfig, ServiceConfig,
};
use omnigas::{Amount, ChainId, ExecuteOn, ExecutionCoordinator, PayFrom, TransactionIntent};
use serde_json::json;
use wiremock::matchers::{body_partial_json, body_string_contains, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// CONSTANTS
// ============================================================================

// -------------------------------- CHAINS --------------------------------

/// Bridge-capable chain with expensive gas (domain 0)
pub const CHAIN_A: ChainId = ChainId(11155111);
pub const DOMAIN_A: u32 = 0;

/// Bridge-capable chain with cheap gas (domain 6)
pub const CHAIN_B: ChainId = ChainId(84532);
pub const DOMAIN_B: u32 = 6;

/// Chain without a bridge domain
pub const CHAIN_C: ChainId = ChainId(421614);

// -------------------------------- USERS ---------------------------------

/// Dummy paying account (EVM format, 40 hex characters)
pub const DUMMY_ACCOUNT_ADDR: &str = "0x0000000000000000000000000000000000000006";

/// Dummy smart account address
pub const DUMMY_SMART_ACCOUNT_ADDR: &str = "0x0000000000000000000000000000000000000007";

/// Private key 1; its address is `DUMMY_SIGNER_ADDR`
pub const DUMMY_PRIVATE_KEY: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";
pub const DUMMY_SIGNER_ADDR: &str = "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf";

// ------------------------- TOKENS AND CONTRACTS -------------------------

/// Dummy target contract of an intent
pub const DUMMY_TARGET_ADDR: &str = "0x000000000000000000000000000000000000000a";

/// Dummy USDC token address
pub const DUMMY_USDC_ADDR: &str = "0x000000000000000000000000000000000000000b";

/// Dummy CCTP TokenMessenger address
pub const DUMMY_TOKEN_MESSENGER_ADDR: &str = "0x000000000000000000000000000000000000000e";

/// Dummy CCTP MessageTransmitter address
pub const DUMMY_MESSAGE_TRANSMITTER_ADDR: &str = "0x000000000000000000000000000000000000000f";

// -------------------------------- OTHER ---------------------------------

/// Dummy burn transaction hash
pub const DUMMY_BURN_TX_HASH: &str = "0x0000000000000000000000000000000000000000000000000000000000000012";

/// Dummy mint transaction hash
pub const DUMMY_MINT_TX_HASH: &str = "0x0000000000000000000000000000000000000000000000000000000000000013";

/// Dummy approve transaction hash
pub const DUMMY_APPROVE_TX_HASH: &str = "0x0000000000000000000000000000000000000000000000000000000000000014";

/// Dummy target transaction hash
pub const DUMMY_TX_HASH: &str = "0x0000000000000000000000000000000000000000000000000000000000000015";

/// Dummy bridge message bytes
pub const DUMMY_MESSAGE: &[u8] = &[0x00, 0x00, 0x00, 0x01, 0xde, 0xad, 0xbe, 0xef];

/// Nothing listens here; requests fail fast and exercise fallbacks
pub const UNREACHABLE_URL: &str = "http://127.0.0.1:9";

/// 1 USDC in minor units
pub const ONE_USDC: u64 = 1_000_000;

/// 1 gwei
pub const GWEI: u64 = 1_000_000_000;

/// Native token price used by every test chain: 3000 USDC
pub const NATIVE_PRICE: u64 = 3_000_000_000;

/// Gas limit set on test intents
pub const TEST_GAS_LIMIT: u64 = 100_000;

// ============================================================================
// CONFIG BUILDERS
// ============================================================================

/// Create a default chain config with test values.
/// Customize with struct update syntax:
/// ```
/// let chain = ChainConfig {
///     paymaster_url: Some(url),
///     ..create_default_chain_config(CHAIN_B, &rpc_url, Some(DOMAIN_B))
/// };
/// ```
pub fn create_default_chain_config(chain_id: ChainId, rpc_url: &str, domain: Option<u32>) -> ChainConfig {
    let bridge = domain.is_some();
    ChainConfig {
        chain_id,
        name: format!("test-chain-{}", chain_id),
        rpc_url: rpc_url.to_string(),
        usdc_addr: DUMMY_USDC_ADDR.to_string(),
        gas_token: "ETH".to_string(),
        price_feed_id: "ethereum".to_string(),
        fallback_native_price: Amount::from(NATIVE_PRICE),
        native_decimals: 18,
        fallback_gas_price_wei: GWEI,
        domain,
        token_messenger: bridge.then(|| DUMMY_TOKEN_MESSENGER_ADDR.to_string()),
        message_transmitter: bridge.then(|| DUMMY_MESSAGE_TRANSMITTER_ADDR.to_string()),
        finality_secs: bridge.then_some(60),
        paymaster_url: None,
        bundler_url: None,
        entry_point: "0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789".to_string(),
    }
}

/// Create a default service config pointing every external API at an unreachable URL.
pub fn create_default_service_config() -> ServiceConfig {
    ServiceConfig {
        attestation_url: UNREACHABLE_URL.to_string(),
        fee_api_url: UNREACHABLE_URL.to_string(),
        price_feed_url: UNREACHABLE_URL.to_string(),
        mock_attestation: true,
        mock_attestation_polls: 1,
        rpc_timeout_ms: 2_000,
        fee_api_timeout_ms: 1_000,
        price_feed_timeout_ms: 1_000,
        attestation_request_timeout_ms: 1_000,
    }
}

/// Create a default bridge config with fast polling.
pub fn create_default_bridge_config() -> BridgeConfig {
    BridgeConfig {
        attestation_poll_interval_ms: 20,
        attestation_timeout_ms: 2_000,
        receipt_poll_interval_ms: 10,
        receipt_timeout_ms: 1_000,
        ..BridgeConfig::default()
    }
}

/// Create a default config over `chains`.
pub fn create_default_config(chains: Vec<ChainConfig>) -> OmnigasConfig {
    OmnigasConfig {
        service: create_default_service_config(),
        bridge: create_default_bridge_config(),
        gas: GasConfig::default(),
        balance: BalanceConfig {
            cache_ttl_secs: 30,
            retry_delay_ms: 10,
        },
        api: ApiConfig::default(),
        chains,
    }
}

/// Intent with a fixed gas limit so no `eth_estimateGas` is needed.
pub fn create_test_intent(execute_on: ExecuteOn, pay_from: PayFrom) -> TransactionIntent {
    TransactionIntent {
        gas_limit: Some(TEST_GAS_LIMIT),
        execute_on,
        pay_from,
        ..TransactionIntent::new(DUMMY_TARGET_ADDR)
    }
}

/// Wire a coordinator whose attestation completes after `attestation_polls` pending polls.
pub fn create_coordinator(config: &OmnigasConfig, attestation_polls: u32) -> ExecutionCoordinator {
    create_coordinator_with(config, AttestationService::Mock(MockAttestation::new(attestation_polls)))
}

pub fn create_coordinator_with(config: &OmnigasConfig, attestation: AttestationService) -> ExecutionCoordinator {
    ExecutionCoordinator::with_attestation(config, attestation).expect("coordinator wiring")
}

// ============================================================================
// EXPECTED VALUES
// ============================================================================

/// Stablecoin cost of `TEST_GAS_LIMIT` at `gas_price_wei` with `NATIVE_PRICE`, before the floor.
pub fn expected_gas_cost(gas_price_wei: u64) -> Amount {
    let wei = TEST_GAS_LIMIT as u128 * gas_price_wei as u128;
    let denominator = 1_000_000_000_000_000_000u128;
    Amount::from((wei * NATIVE_PRICE as u128 + denominator - 1) / denominator)
}

/// Default fast fee (1 bps) on `amount`, rounded up.
pub fn expected_fast_fee(amount: u64) -> Amount {
    Amount::from((amount as u128 * 1_000 + 9_999_999) / 10_000_000)
}

// ============================================================================
// JSON-RPC MOCKS
// ============================================================================

/// 32-byte ABI word for `value`.
pub fn uint_word(value: u64) -> String {
    format!("0x{:064x}", value)
}

/// Selector of `signature` as bare hex, for matching inside request bodies.
pub fn selector_hex(signature: &str) -> String {
    hex::encode(abi::selector(signature))
}

/// Mount a JSON-RPC mock answering `rpc_method` with `result`.
pub async fn mount_rpc(server: &MockServer, rpc_method: &str, result: serde_json::Value) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": rpc_method })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": result
        })))
        .mount(server)
        .await;
}

/// Mount a JSON-RPC mock answering `rpc_method` with an error.
pub async fn mount_rpc_error(server: &MockServer, rpc_method: &str, message: &str) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": rpc_method })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32000, "message": message }
        })))
        .mount(server)
        .await;
}

/// Mount a `balanceOf` mock returning `amount` for any owner.
pub async fn mount_usdc_balance(server: &MockServer, amount: u64) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_call" })))
        .and(body_string_contains(selector_hex("balanceOf(address)")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": uint_word(amount)
        })))
        .mount(server)
        .await;
}

/// Mount a `balanceOf` mock returning `amount` for `owner` only.
///
/// Mount before any catch-all balance mock; wiremock answers with the first match.
pub async fn mount_usdc_balance_of(server: &MockServer, owner: &str, amount: u64) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_call" })))
        .and(body_string_contains(selector_hex("balanceOf(address)")))
        .and(body_string_contains(owner.trim_start_matches("0x").to_lowercase()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": uint_word(amount)
        })))
        .mount(server)
        .await;
}

/// Mount an `allowance` mock returning `amount`.
pub async fn mount_usdc_allowance(server: &MockServer, amount: u64) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_call" })))
        .and(body_string_contains(selector_hex("allowance(address,address)")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": uint_word(amount)
        })))
        .mount(server)
        .await;
}

pub async fn mount_gas_price(server: &MockServer, wei: u64) {
    mount_rpc(server, "eth_gasPrice", json!(format!("{:#x}", wei))).await;
}

/// Mount what a local-key signer needs before `eth_sendRawTransaction`.
pub async fn mount_signing_plumbing(server: &MockServer) {
    mount_rpc(server, "eth_getTransactionCount", json!("0x0")).await;
    mount_rpc(server, "eth_estimateGas", json!("0x30d40")).await;
}

/// Mount `eth_sendRawTransaction` for calldata containing `selector_signature`.
pub async fn mount_send_raw(server: &MockServer, selector_signature: &str, tx_hash: &str, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_sendRawTransaction" })))
        .and(body_string_contains(selector_hex(selector_signature)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": tx_hash
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

/// Receipt JSON with optional `MessageSent(bytes)` log from the message transmitter.
pub fn receipt_json(tx_hash: &str, success: bool, message: Option<&[u8]>) -> serde_json::Value {
    let logs = match message {
        Some(message) => {
            let data = abi::encode_tokens(&[Token::Bytes(message.to_vec())]).unwrap();
            json!([{
                "address": DUMMY_MESSAGE_TRANSMITTER_ADDR,
                "topics": [abi::event_topic("MessageSent(bytes)")],
                "data": abi::to_hex(&data)
            }])
        }
        None => json!([]),
    };
    json!({
        "transactionHash": tx_hash,
        "status": if success { "0x1" } else { "0x0" },
        "blockNumber": "0x64",
        "logs": logs
    })
}

/// Mount `eth_getTransactionReceipt` for one transaction hash.
pub async fn mount_receipt(server: &MockServer, tx_hash: &str, receipt: serde_json::Value) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_getTransactionReceipt", "params": [tx_hash] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": receipt
        })))
        .mount(server)
        .await;
}
