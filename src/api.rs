//! REST API
//!
//! Read-only HTTP surface over the execution coordinator: health, unified balances and
//! route estimates. Execution itself needs request-scoped signing capability and is only
//! offered through the library and the CLI.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::config::ApiConfig;
use crate::error::OmnigasError;
use crate::service::ExecutionCoordinator;
use crate::types::{is_valid_address, ChainId, TransactionIntent};

// ============================================================================
// REQUEST/RESPONSE STRUCTURES
// ============================================================================

/// Standardized response structure for all API endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the request was successful
    pub success: bool,
    /// Response data (if successful)
    pub data: Option<T>,
    /// Error message (if failed), prefixed with the error code
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

/// Body of `POST /estimate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimateRequest {
    pub intent: TransactionIntent,
    /// Account whose balances pay for the transaction
    pub account: String,
}

/// Entry of `GET /chains`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSummary {
    pub chain_id: ChainId,
    pub name: String,
    pub gas_token: String,
    pub bridge: bool,
    pub sponsorship: bool,
}

// ============================================================================
// HANDLERS
// ============================================================================

async fn get_balances_handler(
    account: String,
    coordinator: Arc<ExecutionCoordinator>,
) -> Result<warp::reply::Response, Rejection> {
    if !is_valid_address(&account) {
        return Err(warp::reject::custom(BadRequest(format!(
            "'{}' is not a 20-byte 0x address",
            account
        ))));
    }
    let balance = coordinator.balances().get_unified_balance(&account).await;
    Ok(warp::reply::json(&ApiResponse::ok(balance)).into_response())
}

async fn post_estimate_handler(
    request: EstimateRequest,
    coordinator: Arc<ExecutionCoordinator>,
) -> Result<warp::reply::Response, Rejection> {
    debug!("POST /estimate for {} -> {}", request.account, request.intent.to);
    if !is_valid_address(&request.account) {
        return Err(warp::reject::custom(BadRequest(format!(
            "'{}' is not a 20-byte 0x address",
            request.account
        ))));
    }
    match coordinator.estimate(&request.intent, &request.account).await {
        Ok(analysis) => Ok(warp::reply::json(&ApiResponse::ok(analysis)).into_response()),
        Err(e) => Ok(error_reply(&e)),
    }
}

fn list_chains(coordinator: &ExecutionCoordinator) -> Vec<ChainSummary> {
    coordinator
        .registry()
        .chains()
        .iter()
        .map(|c| ChainSummary {
            chain_id: c.chain_id,
            name: c.name.clone(),
            gas_token: c.gas_token.clone(),
            bridge: c.supports_bridge(),
            sponsorship: c.supports_sponsorship(),
        })
        .collect()
}

/// Maps a domain error to a status code and a coded message.
fn error_reply(err: &OmnigasError) -> warp::reply::Response {
    let status = match err {
        OmnigasError::InvalidIntent(_) | OmnigasError::UnsupportedChain(_) | OmnigasError::BridgeValidation(_) => {
            StatusCode::BAD_REQUEST
        }
        OmnigasError::NoViableRoute(_) | OmnigasError::InsufficientBalance { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        OmnigasError::ChainUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warp::reply::with_status(
        warp::reply::json(&ApiResponse::<()>::err(format!("{}: {}", err.code(), err))),
        status,
    )
    .into_response()
}

// ============================================================================
// WARP FILTER HELPERS
// ============================================================================

fn with_coordinator(
    coordinator: Arc<ExecutionCoordinator>,
) -> impl Filter<Extract = (Arc<ExecutionCoordinator>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || coordinator.clone())
}

// ============================================================================
// CUSTOM REJECTION TYPES
// ============================================================================

/// Custom rejection for malformed request parameters
#[derive(Debug)]
pub struct BadRequest(pub String);

impl warp::reject::Reject for BadRequest {}

// ============================================================================
// REJECTION HANDLER
// ============================================================================

/// Global rejection handler for all API routes.
pub async fn handle_rejection(rej: Rejection) -> Result<impl Reply, std::convert::Infallible> {
    let (status, message) = if let Some(err) = rej.find::<BadRequest>() {
        (StatusCode::BAD_REQUEST, err.0.clone())
    } else if let Some(err) = rej.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("Invalid JSON: {}", err))
    } else if rej.is_not_found() {
        (StatusCode::NOT_FOUND, "Endpoint not found".to_string())
    } else if rej.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else if rej.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large".to_string())
    } else {
        error!("Unhandled rejection: {:?}", rej);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&ApiResponse::<()>::err(message)),
        status,
    ))
}

// ============================================================================
// API SERVER IMPLEMENTATION
// ============================================================================

/// REST API server.
pub struct ApiServer {
    config: ApiConfig,
    coordinator: Arc<ExecutionCoordinator>,
}

impl ApiServer {
    pub fn new(config: ApiConfig, coordinator: Arc<ExecutionCoordinator>) -> Self {
        Self { config, coordinator }
    }

    /// Serves until the process is stopped.
    pub async fn run(&self) -> Result<()> {
        info!("Starting API server on {}:{}", self.config.host, self.config.port);

        let addr: std::net::SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .context("Failed to parse API server address")?;

        warp::serve(self.routes()).run(addr).await;
        Ok(())
    }

    /// All API routes with the rejection handler applied.
    pub fn routes(&self) -> impl Filter<Extract = impl warp::Reply, Error = std::convert::Infallible> + Clone {
        let health = warp::path("health").and(warp::path::end()).and(warp::get()).map(|| {
            warp::reply::json(&ApiResponse::ok("Omnigas service is running".to_string()))
        });

        let chains_coordinator = self.coordinator.clone();
        let chains = warp::path("chains")
            .and(warp::path::end())
            .and(warp::get())
            .map(move || warp::reply::json(&ApiResponse::ok(list_chains(&chains_coordinator))));

        let balances = warp::path("balances")
            .and(warp::path::param::<String>())
            .and(warp::path::end())
            .and(warp::get())
            .and(with_coordinator(self.coordinator.clone()))
            .and_then(get_balances_handler);

        let estimate = warp::path("estimate")
            .and(warp::path::end())
            .and(warp::post())
            .and(warp::body::content_length_limit(64 * 1024))
            .and(warp::body::json::<EstimateRequest>())
            .and(with_coordinator(self.coordinator.clone()))
            .and_then(post_estimate_handler);

        health
            .or(chains)
            .or(balances)
            .or(estimate)
            .recover(handle_rejection)
    }
}
