//! Execution Coordinator
//!
//! Top-level entry point: plans a route for an intent, bridges when the route crosses
//! chains, and sends the target transaction through exactly one backend. Progress is
//! reported on a per-request bounded channel.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::attestation_client::{AttestationClient, AttestationService, MockAttestation};
use crate::cache::TtlCache;
use crate::chains::ChainClients;
use crate::config::OmnigasConfig;
use crate::error::OmnigasError;
use crate::fee_client::FeeClient;
use crate::price_feed::PriceFeed;
use crate::registry::ChainRegistry;
use crate::service::balance::BalanceAggregator;
use crate::service::bridge::{BridgeOrchestrator, BridgeRequest, BridgeTransfer};
use crate::service::bridge_oracle::BridgeOracle;
use crate::service::execution::{Authorization, ExecutionBackend, ExecutionEngine};
use crate::service::gas::GasEstimator;
use crate::service::router::RouteOptimizer;
use crate::types::{
    ExecuteOn, PayFrom, RouteAnalysis, RouteOption, TransactionIntent, TransactionStatus, TransactionUpdate,
    TransferMode, UpdateError,
};

/// Capacity of a per-request update channel.
pub const UPDATE_CHANNEL_CAPACITY: usize = 8;

/// Channel sized for one request's updates.
pub fn updates_channel() -> (mpsc::Sender<TransactionUpdate>, mpsc::Receiver<TransactionUpdate>) {
    mpsc::channel(UPDATE_CHANNEL_CAPACITY)
}

/// Outcome of a completed `execute`.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub request_id: Uuid,
    pub route: RouteOption,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bridge: Option<BridgeTransfer>,
    /// Target transaction hash on the execution chain
    pub tx_hash: String,
    pub backend: ExecutionBackend,
}

/// Execution coordinator.
#[derive(Debug, Clone)]
pub struct ExecutionCoordinator {
    registry: Arc<ChainRegistry>,
    balances: BalanceAggregator,
    gas: GasEstimator,
    optimizer: RouteOptimizer,
    orchestrator: BridgeOrchestrator,
    engine: ExecutionEngine,
}

impl ExecutionCoordinator {
    /// Wires every component from configuration.
    pub fn from_config(config: &OmnigasConfig) -> anyhow::Result<Self> {
        let attestation = if config.service.mock_attestation {
            warn!(
                "Using mock attestation service (completes after {} polls)",
                config.service.mock_attestation_polls
            );
            AttestationService::Mock(MockAttestation::new(config.service.mock_attestation_polls))
        } else {
            AttestationService::Production(AttestationClient::new(
                &config.service.attestation_url,
                Duration::from_millis(config.service.attestation_request_timeout_ms),
            )?)
        };
        Self::with_attestation(config, attestation)
    }

    /// Same as `from_config` with an explicit attestation service.
    pub fn with_attestation(config: &OmnigasConfig, attestation: AttestationService) -> anyhow::Result<Self> {
        let registry = Arc::new(ChainRegistry::from_config(config));
        let rpc_timeout = Duration::from_millis(config.service.rpc_timeout_ms);
        let clients = Arc::new(ChainClients::from_registry(&registry, rpc_timeout)?);

        let balances = BalanceAggregator::new(
            registry.clone(),
            clients.clone(),
            TtlCache::new(Duration::from_secs(config.balance.cache_ttl_secs)),
            Duration::from_millis(config.balance.retry_delay_ms),
        );

        let price_feed = PriceFeed::new(
            &config.service.price_feed_url,
            Duration::from_millis(config.service.price_feed_timeout_ms),
            TtlCache::new(Duration::from_secs(config.gas.price_ttl_secs)),
        )?;
        let gas = GasEstimator::new(
            registry.clone(),
            clients.clone(),
            price_feed,
            TtlCache::new(Duration::from_secs(config.gas.gas_price_ttl_secs)),
            config.gas.clone(),
            config.bridge.min_bridge_amount,
        );

        let fee_client = FeeClient::new(
            &config.service.fee_api_url,
            Duration::from_millis(config.service.fee_api_timeout_ms),
        )?;
        let oracle = BridgeOracle::new(registry.clone(), fee_client, config.bridge.clone());

        let optimizer = RouteOptimizer::new(
            registry.clone(),
            balances.clone(),
            gas.clone(),
            oracle.clone(),
            config.bridge.min_bridge_amount,
        );
        let orchestrator = BridgeOrchestrator::new(
            registry.clone(),
            clients.clone(),
            balances.clone(),
            attestation,
            oracle,
            config.bridge.clone(),
        );
        let engine = ExecutionEngine::new(registry.clone(), clients, rpc_timeout, &config.bridge)?;

        info!(
            "Execution coordinator ready: {} chain(s), {} bridge-capable",
            registry.chains().len(),
            registry.chains().iter().filter(|c| c.supports_bridge()).count()
        );

        Ok(Self {
            registry,
            balances,
            gas,
            optimizer,
            orchestrator,
            engine,
        })
    }

    pub fn registry(&self) -> &ChainRegistry {
        &self.registry
    }

    pub fn balances(&self) -> &BalanceAggregator {
        &self.balances
    }

    pub fn gas(&self) -> &GasEstimator {
        &self.gas
    }

    pub fn optimizer(&self) -> &RouteOptimizer {
        &self.optimizer
    }

    pub fn orchestrator(&self) -> &BridgeOrchestrator {
        &self.orchestrator
    }

    /// Route analysis for `intent` paid by `account`. Read-only.
    pub async fn estimate(&self, intent: &TransactionIntent, account: &str) -> Result<RouteAnalysis, OmnigasError> {
        self.optimizer
            .analyze_optimal_route(intent, account, intent.urgency)
            .await
    }

    /// Executes `intent` for `account`.
    ///
    /// Emits `pending`, then `bridging` when the route crosses chains, `executing`, and
    /// exactly one terminal `completed` or `failed` update.
    ///
    /// # Arguments
    ///
    /// * `auth` - Request-scoped signing capability; not retained
    /// * `updates` - Optional per-request channel (see `updates_channel`)
    /// * `cancel` - Aborts attestation polling with `Cancelled`
    pub async fn execute(
        &self,
        intent: &TransactionIntent,
        account: &str,
        auth: &Authorization,
        updates: Option<mpsc::Sender<TransactionUpdate>>,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult, OmnigasError> {
        let mut emitter = UpdateEmitter::new(Uuid::new_v4(), updates);
        emitter.emit(TransactionStatus::Pending, None, None);
        info!("Execution request {} for {} started", emitter.request_id, account);

        let result = self.run(intent, account, auth, cancel, &mut emitter).await;
        match &result {
            Ok(outcome) => {
                info!(
                    "Execution request {} completed: {} on chain {} via {:?}",
                    outcome.request_id, outcome.tx_hash, outcome.route.execute_on_chain, outcome.backend
                );
                emitter.emit(TransactionStatus::Completed, Some(outcome.tx_hash.clone()), None);
            }
            Err(e) => {
                error!("Execution request {} failed: {}", emitter.request_id, e);
                emitter.emit(TransactionStatus::Failed, None, Some(UpdateError::from(e)));
            }
        }
        result
    }

    async fn run(
        &self,
        intent: &TransactionIntent,
        account: &str,
        auth: &Authorization,
        cancel: &CancellationToken,
        emitter: &mut UpdateEmitter,
    ) -> Result<ExecutionResult, OmnigasError> {
        intent.validate()?;

        // Fail fast on a pinned chain the caller cannot execute on
        let pinned_backend = match intent.execute_on {
            ExecuteOn::Chain(chain_id) => Some(self.engine.select_backend(chain_id, auth)?),
            ExecuteOn::Optimal => None,
        };

        let route = match (intent.execute_on, intent.pay_from) {
            (ExecuteOn::Chain(execute_on), PayFrom::Chain(pay_from)) => {
                debug!("Pinned route {} -> {}, skipping analysis", pay_from, execute_on);
                self.optimizer
                    .pinned_route(intent, execute_on, pay_from, intent.urgency)
                    .await?
            }
            _ => self.estimate(intent, account).await?.best_route,
        };

        let backend = match pinned_backend {
            Some(b) => b,
            None => self.engine.select_backend(route.execute_on_chain, auth)?,
        };

        let bridge = if route.requires_bridge() {
            Some(self.bridge(&route, account, auth, backend, cancel, emitter).await?)
        } else {
            None
        };

        if cancel.is_cancelled() {
            return Err(OmnigasError::Cancelled);
        }

        emitter.emit(TransactionStatus::Executing, None, None);
        let tx_hash = self
            .engine
            .execute(backend, intent, route.execute_on_chain, intent.urgency, auth)
            .await?;

        Ok(ExecutionResult {
            request_id: emitter.request_id,
            route,
            bridge,
            tx_hash,
            backend,
        })
    }

    /// Bridges the route's total cost to the execution chain.
    ///
    /// The route was planned on `account`'s balances, so only a signer for `account` may burn.
    async fn bridge(
        &self,
        route: &RouteOption,
        account: &str,
        auth: &Authorization,
        backend: ExecutionBackend,
        cancel: &CancellationToken,
        emitter: &mut UpdateEmitter,
    ) -> Result<BridgeTransfer, OmnigasError> {
        if cancel.is_cancelled() {
            return Err(OmnigasError::Cancelled);
        }
        let signer = auth.bridge_signer(account).ok_or_else(|| {
            OmnigasError::NoExecutionMethod(format!(
                "bridging from {} requires a private key or wallet signer for that account",
                account
            ))
        })?;

        // Funds land where the backend spends from
        let recipient = match backend {
            ExecutionBackend::Sponsored => auth.smart_account.clone(),
            ExecutionBackend::Direct => auth.wallet.as_ref().map(|w| w.address().to_string()),
        }
        .unwrap_or_else(|| signer.address().to_string());

        let transfer_mode = match route.transfer_mode {
            Some(TransferMode::Fast) => TransferMode::Fast,
            _ => TransferMode::Standard,
        };
        let request = BridgeRequest {
            amount: route.total_cost,
            from_chain: route.pay_from_chain,
            to_chain: route.execute_on_chain,
            recipient,
            transfer_mode,
            max_fee: route.bridge_cost.unwrap_or_default(),
        };

        let mut transfer = self.orchestrator.start(&request)?;
        emitter.emit(TransactionStatus::Bridging, None, None);

        self.orchestrator.burn(&mut transfer, &signer).await?;
        emitter.bridge_tx_hash = transfer.source_tx_hash.clone();
        emitter.emit(TransactionStatus::Bridging, None, None);

        self.orchestrator.drive(&mut transfer, &signer, cancel).await?;
        Ok(transfer)
    }
}

/// Per-request update sender.
///
/// Intermediate updates are dropped when the channel is full; the terminal update is
/// handed to a task so it is delivered without blocking.
struct UpdateEmitter {
    request_id: Uuid,
    sender: Option<mpsc::Sender<TransactionUpdate>>,
    bridge_tx_hash: Option<String>,
    terminal_sent: bool,
}

impl UpdateEmitter {
    fn new(request_id: Uuid, sender: Option<mpsc::Sender<TransactionUpdate>>) -> Self {
        Self {
            request_id,
            sender,
            bridge_tx_hash: None,
            terminal_sent: false,
        }
    }

    fn emit(&mut self, status: TransactionStatus, tx_hash: Option<String>, error: Option<UpdateError>) {
        if self.terminal_sent {
            return;
        }
        self.terminal_sent = status.is_terminal();
        let Some(sender) = &self.sender else {
            return;
        };

        let update = TransactionUpdate {
            request_id: self.request_id,
            status,
            tx_hash,
            bridge_tx_hash: self.bridge_tx_hash.clone(),
            error,
        };
        match sender.try_send(update) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(update)) if status.is_terminal() => {
                let sender = sender.clone();
                tokio::spawn(async move {
                    let _ = sender.send(update).await;
                });
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("Update channel full, dropping {:?} for request {}", status, self.request_id);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Update receiver gone for request {}", self.request_id);
            }
        }
    }
}
