//! Omnigas library
//!
//! Cross-chain gas payment routing: estimates what a transaction costs on each supported
//! EVM chain, finds the cheapest way to pay for it from stablecoin held on any chain, and
//! settles cross-chain payments through the burn -> attest -> mint bridge flow.

pub mod api;
pub mod attestation_client;
pub mod cache;
pub mod chains;
pub mod config;
pub mod crypto;
pub mod error;
pub mod fee_client;
pub mod paymaster_client;
pub mod price_feed;
pub mod registry;
pub mod service;
pub mod types;

// Re-export public types for convenience
pub use config::{ChainConfig, OmnigasConfig};
pub use error::OmnigasError;
pub use registry::ChainRegistry;
pub use service::{
    Authorization, BalanceAggregator, BridgeOrchestrator, BridgeState, ExecutionBackend, ExecutionCoordinator,
    ExecutionResult, RouteOptimizer,
};
pub use types::{
    Amount, ChainId, ExecuteOn, PayFrom, RouteAnalysis, RouteOption, TransactionIntent, TransactionStatus,
    TransactionUpdate, TransferMode, UnifiedBalance, Urgency,
};
