//! Omnigas service modules
//!
//! Planning (balances, gas, bridge quotes, routing) and settlement (bridge
//! orchestration, execution backends, coordination).

pub mod balance;
pub mod bridge;
pub mod bridge_oracle;
pub mod coordinator;
pub mod execution;
pub mod gas;
pub mod router;

// Re-export for convenience
pub use balance::{BalanceAggregator, BalanceSubscription};
pub use bridge::{BridgeOrchestrator, BridgeRequest, BridgeState, BridgeTransfer};
pub use bridge_oracle::{BridgeOracle, BridgeQuote};
pub use coordinator::{updates_channel, ExecutionCoordinator, ExecutionResult};
pub use execution::{Authorization, ExecutionBackend, ExecutionEngine};
pub use gas::{GasEstimate, GasEstimator};
pub use router::RouteOptimizer;
