//! Unit tests for the REST API
//!
//! Routes are exercised in-process with `warp::test`; chains are wiremock servers.

use std::sync::Arc;

use omnigas::api::{ApiResponse, ApiServer, ChainSummary};
use omnigas::config::ApiConfig;
use omnigas::{OmnigasConfig, RouteAnalysis, UnifiedBalance};
use serde_json::json;
use warp::http::StatusCode;
use warp::test::request;
use wiremock::MockServer;

#[path = "helpers.rs"]
mod test_helpers;
use test_helpers::{
    create_coordinator, create_default_chain_config, create_default_config, mount_gas_price, mount_usdc_balance,
    CHAIN_A, CHAIN_B, CHAIN_C, DOMAIN_A, DOMAIN_B, DUMMY_ACCOUNT_ADDR, DUMMY_TARGET_ADDR, GWEI, ONE_USDC,
    TEST_GAS_LIMIT, UNREACHABLE_URL,
};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn create_test_api_server(config: &OmnigasConfig) -> ApiServer {
    ApiServer::new(ApiConfig::default(), Arc::new(create_coordinator(config, 0)))
}

fn offline_config() -> OmnigasConfig {
    create_default_config(vec![
        create_default_chain_config(CHAIN_A, UNREACHABLE_URL, Some(DOMAIN_A)),
        create_default_chain_config(CHAIN_B, UNREACHABLE_URL, Some(DOMAIN_B)),
        create_default_chain_config(CHAIN_C, UNREACHABLE_URL, None),
    ])
}

fn estimate_body(account: &str) -> serde_json::Value {
    json!({
        "intent": {
            "to": DUMMY_TARGET_ADDR,
            "gas_limit": TEST_GAS_LIMIT,
            "execute_on": "optimal",
            "urgency": "medium"
        },
        "account": account
    })
}

// ============================================================================
// HEALTH AND CHAINS
// ============================================================================

/// Test that health endpoint returns success
/// What is tested: GET /health
/// Why: Ensures service is running and responsive
#[tokio::test]
async fn test_health_endpoint() {
    let api_server = create_test_api_server(&offline_config());
    let routes = api_server.routes();

    let response = request().method("GET").path("/health").reply(&routes).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: ApiResponse<String> = serde_json::from_slice(response.body()).unwrap();
    assert!(body.success);
    assert!(body.data.is_some());
}

/// Test the chain listing
/// What is tested: GET /chains reports every configured chain with its capabilities
/// Why: Clients discover which chains can bridge before building intents
#[tokio::test]
async fn test_chains_endpoint() {
    let api_server = create_test_api_server(&offline_config());
    let routes = api_server.routes();

    let response = request().method("GET").path("/chains").reply(&routes).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: ApiResponse<Vec<ChainSummary>> = serde_json::from_slice(response.body()).unwrap();
    let chains = body.data.unwrap();
    assert_eq!(chains.len(), 3);
    assert_eq!(chains[0].chain_id, CHAIN_A);
    assert!(chains[0].bridge);
    assert!(!chains[2].bridge);
    assert!(chains.iter().all(|c| !c.sponsorship));
}

// ============================================================================
// BALANCES
// ============================================================================

/// Test the unified balance endpoint
/// What is tested: GET /balances/{account} sums the reachable chains
/// Why: Wallet UIs show one stablecoin balance across chains
#[tokio::test]
async fn test_balances_endpoint() {
    let server = MockServer::start().await;
    mount_usdc_balance(&server, 3 * ONE_USDC).await;
    let config = create_default_config(vec![
        create_default_chain_config(CHAIN_A, UNREACHABLE_URL, Some(DOMAIN_A)),
        create_default_chain_config(CHAIN_B, &server.uri(), Some(DOMAIN_B)),
    ]);
    let api_server = create_test_api_server(&config);
    let routes = api_server.routes();

    let response = request()
        .method("GET")
        .path(&format!("/balances/{}", DUMMY_ACCOUNT_ADDR))
        .reply(&routes)
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let raw: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
    // Amounts travel as decimal strings
    assert_eq!(raw["data"]["total_amount"], "3000000");
    let body: ApiResponse<UnifiedBalance> = serde_json::from_slice(response.body()).unwrap();
    let balance = body.data.unwrap();
    assert_eq!(balance.per_chain.len(), 2);
    assert_eq!(balance.balance_on(CHAIN_B).to_string(), "3000000");
}

/// Test that a malformed account is rejected
/// What is tested: GET /balances/not-an-address
/// Why: Bad input is a client error, not a zero balance
#[tokio::test]
async fn test_balances_rejects_invalid_account() {
    let api_server = create_test_api_server(&offline_config());
    let routes = api_server.routes();

    let response = request().method("GET").path("/balances/not-an-address").reply(&routes).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ApiResponse<()> = serde_json::from_slice(response.body()).unwrap();
    assert!(!body.success);
    assert!(body.error.unwrap().contains("not-an-address"));
}

// ============================================================================
// ESTIMATE
// ============================================================================

/// Test a successful route estimate
/// What is tested: POST /estimate with the account funded on chain B
/// Why: The estimate is the API's main read path
#[tokio::test]
async fn test_estimate_endpoint() {
    let server = MockServer::start().await;
    mount_gas_price(&server, GWEI).await;
    mount_usdc_balance(&server, 50 * ONE_USDC).await;
    let config = create_default_config(vec![create_default_chain_config(CHAIN_B, &server.uri(), Some(DOMAIN_B))]);
    let api_server = create_test_api_server(&config);
    let routes = api_server.routes();

    let response = request()
        .method("POST")
        .path("/estimate")
        .json(&estimate_body(DUMMY_ACCOUNT_ADDR))
        .reply(&routes)
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: ApiResponse<RouteAnalysis> = serde_json::from_slice(response.body()).unwrap();
    let analysis = body.data.unwrap();
    assert_eq!(analysis.best_route.execute_on_chain, CHAIN_B);
    assert_eq!(analysis.best_route.total_cost.to_string(), "300000");
    assert_eq!(analysis.recommendation.chain_id, CHAIN_B);
}

/// Test that an unfunded account gets 422
/// What is tested: POST /estimate with every chain unreachable
/// Why: "No viable route" is a well-formed request that cannot be satisfied
#[tokio::test]
async fn test_estimate_no_viable_route() {
    let api_server = create_test_api_server(&offline_config());
    let routes = api_server.routes();

    let response = request()
        .method("POST")
        .path("/estimate")
        .json(&estimate_body(DUMMY_ACCOUNT_ADDR))
        .reply(&routes)
        .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: ApiResponse<()> = serde_json::from_slice(response.body()).unwrap();
    assert!(body.error.unwrap().starts_with("NO_VIABLE_ROUTE"));
}

/// Test estimate input validation
/// What is tested: Invalid account, invalid target, unsupported chain, and malformed JSON
/// Why: Every client mistake must map to 400 with a readable message
#[tokio::test]
async fn test_estimate_rejects_bad_requests() {
    let api_server = create_test_api_server(&offline_config());
    let routes = api_server.routes();

    let bad_account = request()
        .method("POST")
        .path("/estimate")
        .json(&estimate_body("0x1234"))
        .reply(&routes)
        .await;
    assert_eq!(bad_account.status(), StatusCode::BAD_REQUEST);

    let mut bad_target = estimate_body(DUMMY_ACCOUNT_ADDR);
    bad_target["intent"]["to"] = json!("0xnothex");
    let response = request()
        .method("POST")
        .path("/estimate")
        .json(&bad_target)
        .reply(&routes)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ApiResponse<()> = serde_json::from_slice(response.body()).unwrap();
    assert!(body.error.unwrap().starts_with("INVALID_INTENT"));

    let mut unsupported = estimate_body(DUMMY_ACCOUNT_ADDR);
    unsupported["intent"]["execute_on"] = json!(999);
    let response = request()
        .method("POST")
        .path("/estimate")
        .json(&unsupported)
        .reply(&routes)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let malformed = request()
        .method("POST")
        .path("/estimate")
        .header("content-type", "application/json")
        .body("{not json")
        .reply(&routes)
        .await;
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
    let body: ApiResponse<()> = serde_json::from_slice(malformed.body()).unwrap();
    assert!(body.error.unwrap().starts_with("Invalid JSON"));
}

// ============================================================================
// ROUTING ERRORS
// ============================================================================

/// Test unknown paths
/// What is tested: GET /unknown
/// Why: Unknown endpoints return 404 with the standard envelope
#[tokio::test]
async fn test_unknown_endpoint() {
    let api_server = create_test_api_server(&offline_config());
    let routes = api_server.routes();

    let response = request().method("GET").path("/unknown").reply(&routes).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: ApiResponse<()> = serde_json::from_slice(response.body()).unwrap();
    assert!(!body.success);
}

/// Test that execution is not exposed over HTTP
/// What is tested: POST /execute
/// Why: Execution needs signing capability, which the HTTP surface never accepts
#[tokio::test]
async fn test_execute_not_exposed() {
    let api_server = create_test_api_server(&offline_config());
    let routes = api_server.routes();

    let response = request()
        .method("POST")
        .path("/execute")
        .json(&estimate_body(DUMMY_ACCOUNT_ADDR))
        .reply(&routes)
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
