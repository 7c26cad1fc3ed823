//! Unit tests for configuration loading and validation

use omnigas::config::{ApiConfig, BridgeConfig, GasConfig};
use omnigas::{Amount, ChainId, OmnigasConfig};

#[path = "helpers.rs"]
mod test_helpers;
use test_helpers::{create_default_chain_config, create_default_config, CHAIN_A, CHAIN_B, DOMAIN_A, UNREACHABLE_URL};

const TEMPLATE: &str = include_str!("../config/omnigas.template.toml");

const MINIMAL: &str = r#"
[[chain]]
chain_id = 84532
name = "Base Sepolia"
rpc_url = "http://127.0.0.1:8545"
usdc_addr = "0x036CbD53842c5426634e7929541eC2318f3dCF7e"
fallback_native_price = 3000000000
"#;

fn assert_config_error(config: &OmnigasConfig, fragment: &str) {
    let err = config.validate().expect_err("validation should fail");
    let message = err.to_string();
    assert!(message.starts_with("Configuration error:"), "unexpected error: {}", message);
    assert!(message.contains(fragment), "'{}' does not mention '{}'", message, fragment);
}

// ============================================================================
// PARSING
// ============================================================================

/// Test that the shipped template is a valid configuration
/// What is tested: The template parses and validates as-is
/// Why: Users start from the template; it must never drift out of the schema
#[test]
fn test_template_is_valid() {
    let config = OmnigasConfig::from_toml_str(TEMPLATE).unwrap();

    assert!(config.chains.len() >= 2);
    assert!(!config.service.mock_attestation);
    assert_eq!(config.bridge.fee_routes.len(), 1);
    assert_eq!(config.api.port, 4480);
    let base = config.chains.iter().find(|c| c.chain_id == ChainId(84532)).unwrap();
    assert_eq!(base.domain, Some(6));
    assert!(base.supports_bridge());
    assert!(!base.supports_sponsorship());
}

/// Test that omitted sections take their defaults
/// What is tested: A file with a single bare chain
/// Why: Only chains are mandatory; every tunable has a sensible default
#[test]
fn test_defaults_apply() {
    let config = OmnigasConfig::from_toml_str(MINIMAL).unwrap();

    let bridge = BridgeConfig::default();
    assert_eq!(config.bridge.min_bridge_amount, Amount::from(10_000u64));
    assert_eq!(config.bridge.min_bridge_amount, bridge.min_bridge_amount);
    assert_eq!(config.bridge.default_fast_fee_milli_bps, 1000);
    assert_eq!(config.bridge.max_submit_attempts, 3);
    assert_eq!(config.gas.practical_min_cost, GasConfig::default().practical_min_cost);
    assert_eq!(config.gas.price_ttl_secs, 60);
    assert_eq!(config.api.host, ApiConfig::default().host);

    let chain = &config.chains[0];
    assert_eq!(chain.gas_token, "ETH");
    assert_eq!(chain.native_decimals, 18);
    assert!(chain.domain.is_none());
    assert!(!chain.supports_bridge());
}

/// Test the missing-file error
/// What is tested: load_from_path with a path that does not exist
/// Why: The error should tell the user how to create the file
#[test]
fn test_missing_file_points_to_template() {
    let err = OmnigasConfig::load_from_path(Some("/nonexistent/omnigas.toml")).unwrap_err();

    assert!(err.to_string().contains("cp config/omnigas.template.toml"));
}

/// Test that malformed TOML is rejected
/// What is tested: A chain entry missing its RPC URL
/// Why: Required fields must not silently default
#[test]
fn test_missing_required_field() {
    let content = r#"
[[chain]]
chain_id = 1
name = "no rpc"
usdc_addr = "0x036CbD53842c5426634e7929541eC2318f3dCF7e"
fallback_native_price = 1
"#;

    assert!(OmnigasConfig::from_toml_str(content).is_err());
}

// ============================================================================
// VALIDATION
// ============================================================================

/// Test that at least one chain is required
/// What is tested: Configuration with no [[chain]] entries
/// Why: Nothing can be routed without chains
#[test]
fn test_validate_requires_chains() {
    assert_config_error(&create_default_config(vec![]), "At least one [[chain]]");
}

/// Test chain identity checks
/// What is tested: Chain id 0, duplicate ids, duplicate domains
/// Why: The registry keys chains by id and the bridge keys them by domain
#[test]
fn test_validate_chain_identity() {
    let zero = create_default_config(vec![create_default_chain_config(ChainId(0), UNREACHABLE_URL, None)]);
    assert_config_error(&zero, "chain ID 0");

    let duplicate_id = create_default_config(vec![
        create_default_chain_config(CHAIN_A, UNREACHABLE_URL, None),
        create_default_chain_config(CHAIN_A, UNREACHABLE_URL, None),
    ]);
    assert_config_error(&duplicate_id, "Duplicate chain ID");

    let duplicate_domain = create_default_config(vec![
        create_default_chain_config(CHAIN_A, UNREACHABLE_URL, Some(DOMAIN_A)),
        create_default_chain_config(CHAIN_B, UNREACHABLE_URL, Some(DOMAIN_A)),
    ]);
    assert_config_error(&duplicate_domain, "Duplicate bridge domain");
}

/// Test bridge contract requirements
/// What is tested: A chain with a domain but no message transmitter
/// Why: A half-configured bridge chain would fail mid-transfer
#[test]
fn test_validate_domain_needs_contracts() {
    let mut chain = create_default_chain_config(CHAIN_A, UNREACHABLE_URL, Some(DOMAIN_A));
    chain.message_transmitter = None;

    assert_config_error(&create_default_config(vec![chain]), "no token_messenger/message_transmitter");
}

/// Test address validation
/// What is tested: A stablecoin address that is not 20 bytes
/// Why: Every balance read and burn targets this address
#[test]
fn test_validate_addresses() {
    let mut chain = create_default_chain_config(CHAIN_A, UNREACHABLE_URL, None);
    chain.usdc_addr = "0x1234".to_string();

    assert!(create_default_config(vec![chain]).validate().is_err());
}

/// Test sponsorship endpoint pairing
/// What is tested: paymaster_url without bundler_url
/// Why: Sponsored execution needs both endpoints
#[test]
fn test_validate_paymaster_needs_bundler() {
    let mut chain = create_default_chain_config(CHAIN_A, UNREACHABLE_URL, None);
    chain.paymaster_url = Some("http://127.0.0.1:3000".to_string());

    assert_config_error(&create_default_config(vec![chain]), "both paymaster_url and bundler_url");
}

/// Test numeric bounds
/// What is tested: Price TTL outside 60-120s, practical minimum below bridge minimum, zero submit attempts
/// Why: These bounds keep quotes fresh and every cost bridgeable
#[test]
fn test_validate_numeric_bounds() {
    let chains = || vec![create_default_chain_config(CHAIN_A, UNREACHABLE_URL, None)];

    let mut stale_prices = create_default_config(chains());
    stale_prices.gas.price_ttl_secs = 300;
    assert_config_error(&stale_prices, "price_ttl_secs");

    let mut unbridgeable = create_default_config(chains());
    unbridgeable.gas.practical_min_cost = Amount::from(5_000u64);
    assert_config_error(&unbridgeable, "practical_min_cost");

    let mut no_attempts = create_default_config(chains());
    no_attempts.bridge.max_submit_attempts = 0;
    assert_config_error(&no_attempts, "max_submit_attempts");

    let mut zero_poll = create_default_config(chains());
    zero_poll.bridge.attestation_poll_interval_ms = 0;
    assert_config_error(&zero_poll, "must be positive");
}

/// Test that fee routes reference configured chains
/// What is tested: A fee_route to a chain id absent from [[chain]]
/// Why: A typo in the fee table would otherwise be ignored silently
#[test]
fn test_validate_fee_route_chains() {
    let mut config = create_default_config(vec![create_default_chain_config(CHAIN_A, UNREACHABLE_URL, None)]);
    config.bridge.fee_routes.push(omnigas::config::FeeRouteConfig {
        from_chain: CHAIN_A,
        to_chain: CHAIN_B,
        fast_milli_bps: 1000,
        standard_milli_bps: 0,
    });

    assert_config_error(&config, "unknown chain");
}
