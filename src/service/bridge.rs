//! Bridge Orchestration Service
//!
//! Drives one stablecoin transfer through burn -> attest -> mint:
//!
//! 1. `initiated -> burned`: re-check the balance, raise the token-messenger allowance if
//!    short, submit `depositForBurn`, and read the message from the `MessageSent` log
//! 2. `burned -> attested`: poll the attestation service until the attestation is complete
//! 3. `attested -> completed`: submit `receiveMessage` on the destination chain
//!
//! Unrecoverable failures move the transfer to `failed`. An attestation timeout or a
//! cancellation leaves it `burned` so it can be resumed; the funds may still arrive.

use std::sync::Arc;
use std::time::Duration;

use ethereum_types::U256;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::attestation_client::{AttestationService, AttestationStatus};
use crate::chains::abi::{self, FAST_FINALITY_THRESHOLD, MESSAGE_SENT_EVENT, STANDARD_FINALITY_THRESHOLD};
use crate::chains::{ChainClients, EvmClient, TransactionReceipt};
use crate::config::BridgeConfig;
use crate::crypto::{Signer, TransactionRequest};
use crate::error::OmnigasError;
use crate::registry::ChainRegistry;
use crate::service::balance::BalanceAggregator;
use crate::service::bridge_oracle::{BridgeOracle, BridgeQuote};
use crate::types::{is_valid_address, Amount, ChainId, TransferMode};

// ============================================================================
// TRANSFER STATE
// ============================================================================

/// Lifecycle state of a bridge transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BridgeState {
    Initiated,
    Burned,
    Attested,
    Completed,
    Failed,
}

impl BridgeState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BridgeState::Completed | BridgeState::Failed)
    }

    /// Forward-only transitions; `failed` is reachable from any non-terminal state.
    pub fn can_transition_to(&self, next: BridgeState) -> bool {
        use BridgeState::*;
        matches!(
            (self, next),
            (Initiated, Burned) | (Burned, Attested) | (Attested, Completed)
        ) || (!self.is_terminal() && next == Failed)
    }
}

/// What to bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeRequest {
    /// Amount burned on the source chain; the protocol fee is taken out of it
    pub amount: Amount,
    pub from_chain: ChainId,
    pub to_chain: ChainId,
    /// Mint recipient on the destination chain
    pub recipient: String,
    /// Resolved mode (`auto` is treated as standard)
    pub transfer_mode: TransferMode,
    /// Fee ceiling for fast transfers
    pub max_fee: Amount,
}

/// One bridge transfer, owned by the orchestrator while it runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeTransfer {
    pub id: Uuid,
    pub amount: Amount,
    pub from_chain: ChainId,
    pub to_chain: ChainId,
    pub recipient: String,
    pub transfer_mode: TransferMode,
    pub max_fee: Amount,
    pub state: BridgeState,
    /// Every state entered, in order
    pub history: Vec<BridgeState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_tx_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_tx_hash: Option<String>,
    /// keccak256 of the burn message, or the burn tx hash when degraded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_handle: Option<String>,
    /// True when the handle could not be derived from the `MessageSent` event
    #[serde(default)]
    pub degraded_handle: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attestation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_tx_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl BridgeTransfer {
    fn new(request: &BridgeRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            amount: request.amount,
            from_chain: request.from_chain,
            to_chain: request.to_chain,
            recipient: request.recipient.clone(),
            transfer_mode: request.transfer_mode,
            max_fee: request.max_fee,
            state: BridgeState::Initiated,
            history: vec![BridgeState::Initiated],
            approval_tx_hash: None,
            source_tx_hash: None,
            message_handle: None,
            degraded_handle: false,
            message: None,
            attestation: None,
            destination_tx_hash: None,
            failure: None,
        }
    }

    /// Moves to `next`, rejecting transitions that skip or reverse a step.
    pub fn advance(&mut self, next: BridgeState) -> Result<(), OmnigasError> {
        if !self.state.can_transition_to(next) {
            return Err(OmnigasError::Internal(format!(
                "illegal bridge transition {:?} -> {:?} for transfer {}",
                self.state, next, self.id
            )));
        }
        debug!("Bridge transfer {}: {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
        self.history.push(next);
        Ok(())
    }

    fn fail(&mut self, reason: String) {
        if self.state.is_terminal() {
            return;
        }
        self.failure = Some(reason);
        self.state = BridgeState::Failed;
        self.history.push(BridgeState::Failed);
    }

    fn is_fast(&self) -> bool {
        self.transfer_mode == TransferMode::Fast
    }
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

/// Bridge orchestrator.
#[derive(Debug, Clone)]
pub struct BridgeOrchestrator {
    registry: Arc<ChainRegistry>,
    clients: Arc<ChainClients>,
    balances: BalanceAggregator,
    attestation: AttestationService,
    oracle: BridgeOracle,
    config: BridgeConfig,
}

impl BridgeOrchestrator {
    pub fn new(
        registry: Arc<ChainRegistry>,
        clients: Arc<ChainClients>,
        balances: BalanceAggregator,
        attestation: AttestationService,
        oracle: BridgeOracle,
        config: BridgeConfig,
    ) -> Self {
        Self {
            registry,
            clients,
            balances,
            attestation,
            oracle,
            config,
        }
    }

    /// Display-only fee and time quote. Needs no signer.
    pub async fn estimate(&self, amount: Amount, from: ChainId, to: ChainId, mode: TransferMode) -> BridgeQuote {
        self.oracle.quote(amount, from, to, mode).await
    }

    /// Checks a request without touching the network.
    pub fn validate(&self, request: &BridgeRequest) -> Result<(), OmnigasError> {
        if request.amount.is_zero() {
            return Err(OmnigasError::BridgeValidation("amount must be positive".to_string()));
        }
        if request.amount < self.config.min_bridge_amount {
            return Err(OmnigasError::BridgeValidation(format!(
                "amount {} is below the protocol minimum {}",
                request.amount, self.config.min_bridge_amount
            )));
        }
        if !is_valid_address(&request.recipient) {
            return Err(OmnigasError::BridgeValidation(format!(
                "recipient '{}' is not a 20-byte 0x address",
                request.recipient
            )));
        }
        if request.from_chain == request.to_chain {
            return Err(OmnigasError::BridgeValidation(format!(
                "source and destination are both chain {}",
                request.from_chain
            )));
        }
        for chain_id in [request.from_chain, request.to_chain] {
            if !self.registry.supports_bridge(chain_id) {
                return Err(OmnigasError::BridgeValidation(format!(
                    "chain {} is not bridge-supported",
                    chain_id
                )));
            }
        }
        if request.transfer_mode == TransferMode::Fast && request.max_fee >= request.amount {
            return Err(OmnigasError::BridgeValidation(format!(
                "fee ceiling {} leaves nothing to mint from {}",
                request.max_fee, request.amount
            )));
        }
        Ok(())
    }

    /// Validates and creates a transfer in `initiated`.
    pub fn start(&self, request: &BridgeRequest) -> Result<BridgeTransfer, OmnigasError> {
        self.validate(request)?;
        let transfer = BridgeTransfer::new(request);
        info!(
            "Bridge transfer {} initiated: {} from chain {} to chain {} ({:?})",
            transfer.id, transfer.amount, transfer.from_chain, transfer.to_chain, transfer.transfer_mode
        );
        Ok(transfer)
    }

    /// Runs a transfer from its current state to `completed`.
    pub async fn drive(
        &self,
        transfer: &mut BridgeTransfer,
        signer: &Signer,
        cancel: &CancellationToken,
    ) -> Result<(), OmnigasError> {
        loop {
            let step = match transfer.state {
                BridgeState::Initiated => self.burn_step(transfer, signer).await,
                BridgeState::Burned => self.attestation_step(transfer, cancel).await,
                BridgeState::Attested => self.mint_step(transfer, signer).await,
                BridgeState::Completed => return Ok(()),
                BridgeState::Failed => {
                    return Err(OmnigasError::Internal(format!(
                        "bridge transfer {} already failed",
                        transfer.id
                    )))
                }
            };
            if let Err(e) = step {
                record_failure(transfer, &e);
                return Err(e);
            }
        }
    }

    /// Submits the burn only (`initiated -> burned`).
    pub async fn burn(&self, transfer: &mut BridgeTransfer, signer: &Signer) -> Result<(), OmnigasError> {
        let result = self.burn_step(transfer, signer).await;
        if let Err(e) = &result {
            record_failure(transfer, e);
        }
        result
    }

    /// Continues a transfer left `burned` (e.g., after an attestation timeout).
    pub async fn resume(
        &self,
        transfer: &mut BridgeTransfer,
        signer: &Signer,
        cancel: &CancellationToken,
    ) -> Result<(), OmnigasError> {
        match transfer.state {
            BridgeState::Burned | BridgeState::Attested => {
                info!("Resuming bridge transfer {} from {:?}", transfer.id, transfer.state);
                self.drive(transfer, signer, cancel).await
            }
            state => Err(OmnigasError::Internal(format!(
                "bridge transfer {} cannot be resumed from {:?}",
                transfer.id, state
            ))),
        }
    }

    // ------------------------------------------------------------------------
    // initiated -> burned
    // ------------------------------------------------------------------------

    async fn burn_step(&self, transfer: &mut BridgeTransfer, signer: &Signer) -> Result<(), OmnigasError> {
        let source = self.registry.get(transfer.from_chain)?;
        let destination_domain = self
            .registry
            .domain(transfer.to_chain)
            .ok_or_else(|| OmnigasError::BridgeValidation(format!("chain {} has no bridge domain", transfer.to_chain)))?;
        let (token_messenger, message_transmitter) = match (&source.token_messenger, &source.message_transmitter) {
            (Some(tm), Some(mt)) => (tm.clone(), mt.clone()),
            _ => {
                return Err(OmnigasError::BridgeValidation(format!(
                    "chain {} has no bridge contracts",
                    transfer.from_chain
                )))
            }
        };
        let client = self.clients.get(transfer.from_chain)?;
        let owner = signer.address().to_string();

        // Balances are advisory until now; re-read right before burning
        let available = self.balances.fresh_balance(&owner, transfer.from_chain).await?;
        if available < transfer.amount {
            return Err(OmnigasError::InsufficientBalance {
                chain_id: transfer.from_chain,
                required: transfer.amount,
                available,
            });
        }

        let allowance = client
            .erc20_allowance(&source.usdc_addr, &owner, &token_messenger)
            .await
            .map_err(|e| chain_unavailable(transfer.from_chain, e))?;
        if allowance < transfer.amount.as_u256() {
            info!(
                "Approving {} for token messenger on chain {} (current allowance {})",
                transfer.amount, transfer.from_chain, allowance
            );
            let approve = TransactionRequest {
                to: source.usdc_addr.clone(),
                data: abi::erc20_approve(&token_messenger, transfer.amount.as_u256()).map_err(internal)?,
                ..Default::default()
            };
            let approve_hash = self.submit_with_retry(client, signer, &approve).await?;
            self.wait_confirmed(client, &approve_hash).await?;
            transfer.approval_tx_hash = Some(approve_hash);
        }

        let (max_fee, finality) = if transfer.is_fast() {
            (transfer.max_fee.as_u256(), FAST_FINALITY_THRESHOLD)
        } else {
            (U256::zero(), STANDARD_FINALITY_THRESHOLD)
        };
        let burn = TransactionRequest {
            to: token_messenger,
            data: abi::cctp_deposit_for_burn(
                transfer.amount.as_u256(),
                destination_domain,
                &transfer.recipient,
                &source.usdc_addr,
                max_fee,
                finality,
            )
            .map_err(internal)?,
            ..Default::default()
        };
        let burn_hash = self.submit_with_retry(client, signer, &burn).await?;
        transfer.source_tx_hash = Some(burn_hash.clone());
        let receipt = self.wait_confirmed(client, &burn_hash).await?;

        match extract_message(&receipt, &message_transmitter) {
            Some(message) => {
                transfer.message_handle = Some(abi::to_hex(&abi::keccak256(&message)));
                transfer.message = Some(abi::to_hex(&message));
            }
            None => {
                warn!(
                    "No {} event in burn receipt {}; using the transaction hash as a degraded message handle",
                    MESSAGE_SENT_EVENT, burn_hash
                );
                transfer.message_handle = Some(burn_hash.clone());
                transfer.degraded_handle = true;
            }
        }

        transfer.advance(BridgeState::Burned)?;
        info!("Bridge transfer {} burned in {}", transfer.id, burn_hash);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // burned -> attested
    // ------------------------------------------------------------------------

    async fn attestation_step(&self, transfer: &mut BridgeTransfer, cancel: &CancellationToken) -> Result<(), OmnigasError> {
        let source_tx_hash = transfer
            .source_tx_hash
            .clone()
            .ok_or_else(|| OmnigasError::Internal(format!("transfer {} burned without a tx hash", transfer.id)))?;
        let source_domain = self
            .registry
            .domain(transfer.from_chain)
            .ok_or_else(|| OmnigasError::BridgeValidation(format!("chain {} has no bridge domain", transfer.from_chain)))?;

        let interval = Duration::from_millis(self.config.attestation_poll_interval_ms);
        let timeout = Duration::from_millis(self.config.attestation_timeout_ms);
        let deadline = tokio::time::Instant::now() + timeout;
        let mut polls: u64 = 0;

        info!(
            "Polling attestation for {} (domain {}, every {:?}, up to {:?})",
            source_tx_hash, source_domain, interval, timeout
        );

        loop {
            if cancel.is_cancelled() {
                return Err(OmnigasError::Cancelled);
            }

            polls += 1;
            match self.attestation.fetch(source_domain, &source_tx_hash).await {
                Ok(AttestationStatus::Complete(messages)) => {
                    if let Some((message, attestation)) = select_attestation(transfer, messages) {
                        transfer.message = Some(abi::to_hex(&message));
                        transfer.attestation = Some(abi::to_hex(&attestation));
                        transfer.advance(BridgeState::Attested)?;
                        info!("Bridge transfer {} attested after {} poll(s)", transfer.id, polls);
                        return Ok(());
                    }
                    warn!("Attestation for {} carries no message and none was read from the burn", source_tx_hash);
                }
                Ok(AttestationStatus::Pending) => {
                    debug!("Attestation for {} pending (poll {})", source_tx_hash, polls);
                }
                Err(e) => {
                    warn!("Attestation poll {} for {} failed: {:#}", polls, source_tx_hash, e);
                }
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                error!("Attestation for {} not received within {:?}", source_tx_hash, timeout);
                return Err(OmnigasError::AttestationTimeout { source_tx_hash });
            }
            let wait = interval.min(deadline - now);
            tokio::select! {
                _ = cancel.cancelled() => return Err(OmnigasError::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    // ------------------------------------------------------------------------
    // attested -> completed
    // ------------------------------------------------------------------------

    async fn mint_step(&self, transfer: &mut BridgeTransfer, signer: &Signer) -> Result<(), OmnigasError> {
        let destination = self.registry.get(transfer.to_chain)?;
        let message_transmitter = destination.message_transmitter.clone().ok_or_else(|| {
            OmnigasError::BridgeValidation(format!("chain {} has no message transmitter", transfer.to_chain))
        })?;
        let client = self.clients.get(transfer.to_chain)?;

        let message = transfer
            .message
            .as_deref()
            .map(abi::from_hex)
            .transpose()
            .map_err(internal)?
            .ok_or_else(|| OmnigasError::Internal(format!("transfer {} attested without a message", transfer.id)))?;
        let attestation = transfer
            .attestation
            .as_deref()
            .map(abi::from_hex)
            .transpose()
            .map_err(internal)?
            .ok_or_else(|| OmnigasError::Internal(format!("transfer {} attested without an attestation", transfer.id)))?;

        let receive = TransactionRequest {
            to: message_transmitter,
            data: abi::cctp_receive_message(&message, &attestation).map_err(internal)?,
            ..Default::default()
        };
        let mint_hash = self.submit_with_retry(client, signer, &receive).await?;
        self.wait_confirmed(client, &mint_hash).await?;

        transfer.destination_tx_hash = Some(mint_hash.clone());
        transfer.advance(BridgeState::Completed)?;
        info!("Bridge transfer {} completed: minted in {}", transfer.id, mint_hash);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Submission helpers
    // ------------------------------------------------------------------------

    /// Submits a transaction, resending only when the node definitely rejected it.
    ///
    /// A local key signs once per attempt. When the node may already hold the transaction
    /// (timeout, "already known"), the hash of the signed bytes is returned so the caller
    /// waits for that receipt instead of broadcasting a second transaction. A replacement
    /// after an underpriced rejection reuses the nonce. Wallet submissions are never resent.
    async fn submit_with_retry(
        &self,
        client: &EvmClient,
        signer: &Signer,
        request: &TransactionRequest,
    ) -> Result<String, OmnigasError> {
        let key = match signer {
            Signer::Local(key) => key,
            Signer::Wallet(wallet) => {
                return wallet.send_transaction(client, request).await.map_err(|e| {
                    let reason = format!("{:#}", e);
                    OmnigasError::ContractExecutionFailed {
                        retryable: classify_submit_failure(&reason) != SubmitFailure::Fatal,
                        reason,
                    }
                });
            }
        };

        let attempts = self.config.max_submit_attempts.max(1);
        let mut attempt = 1;
        let mut nonce = None;
        let mut gas_price = request.gas_price;
        loop {
            let pending = TransactionRequest {
                gas_price,
                ..request.clone()
            };
            let signed = key.sign_request(client, &pending, nonce).await.map_err(|e| {
                let reason = format!("{:#}", e);
                OmnigasError::ContractExecutionFailed {
                    retryable: classify_submit_failure(&reason) != SubmitFailure::Fatal,
                    reason,
                }
            })?;

            let reason = match client.send_raw_transaction(&abi::to_hex(&signed.raw)).await {
                Ok(hash) => {
                    debug!("Submitted tx {} to {} on chain {}", hash, request.to, client.chain_id());
                    return Ok(hash);
                }
                Err(e) => format!("{:#}", e),
            };

            let failure = classify_submit_failure(&reason);
            match failure {
                SubmitFailure::MaybeAccepted => {
                    warn!(
                        "Submission of {} on chain {} is unconfirmed ({}); waiting for its receipt",
                        signed.hash,
                        client.chain_id(),
                        reason
                    );
                    return Ok(signed.hash);
                }
                SubmitFailure::Fatal => {
                    return Err(OmnigasError::ContractExecutionFailed {
                        reason,
                        retryable: false,
                    })
                }
                SubmitFailure::StaleNonce | SubmitFailure::Underpriced if attempt >= attempts => {
                    return Err(OmnigasError::ContractExecutionFailed {
                        reason,
                        retryable: true,
                    })
                }
                SubmitFailure::StaleNonce => {
                    nonce = None;
                }
                SubmitFailure::Underpriced => {
                    nonce = Some(signed.nonce);
                    gas_price = Some(bump_gas_price(signed.gas_price));
                }
            }
            warn!(
                "Submission to {} on chain {} rejected (attempt {}/{}), re-signing: {}",
                request.to,
                client.chain_id(),
                attempt,
                attempts,
                reason
            );
            attempt += 1;
            tokio::time::sleep(Duration::from_millis(self.config.receipt_poll_interval_ms)).await;
        }
    }

    async fn wait_confirmed(&self, client: &EvmClient, tx_hash: &str) -> Result<TransactionReceipt, OmnigasError> {
        let receipt = client
            .wait_for_receipt(
                tx_hash,
                Duration::from_millis(self.config.receipt_poll_interval_ms),
                Duration::from_millis(self.config.receipt_timeout_ms),
            )
            .await
            .map_err(|e| OmnigasError::ContractExecutionFailed {
                reason: format!("{:#}", e),
                retryable: true,
            })?;
        if !receipt.is_success() {
            return Err(OmnigasError::ContractExecutionFailed {
                reason: format!("transaction {} reverted on chain {}", tx_hash, client.chain_id()),
                retryable: false,
            });
        }
        Ok(receipt)
    }
}

/// Marks the transfer failed unless the error leaves it resumable.
fn record_failure(transfer: &mut BridgeTransfer, err: &OmnigasError) {
    match err {
        OmnigasError::AttestationTimeout { .. } | OmnigasError::Cancelled => {
            warn!("Bridge transfer {} left {:?}: {}", transfer.id, transfer.state, err);
        }
        _ => {
            error!("Bridge transfer {} failed in {:?}: {}", transfer.id, transfer.state, err);
            transfer.fail(err.to_string());
        }
    }
}

/// Message bytes from the transmitter's `MessageSent(bytes)` log.
fn extract_message(receipt: &TransactionReceipt, message_transmitter: &str) -> Option<Vec<u8>> {
    let topic = abi::event_topic(MESSAGE_SENT_EVENT);
    let message = receipt
        .logs_matching(message_transmitter, &topic)
        .find_map(|log| abi::from_hex(&log.data).ok().and_then(|data| abi::decode_bytes(&data).ok()));
    message
}

/// Picks the attested message for the burn.
///
/// The lookup is keyed by the burn transaction, so the service's message is taken as-is:
/// it fills in the nonce and finality fields left empty on chain, and its hash differs
/// from the receipt-derived handle. An exact hash match is preferred when a transaction
/// emitted several messages. When the service does not echo the message, the
/// receipt-derived message is used.
fn select_attestation(
    transfer: &BridgeTransfer,
    messages: Vec<crate::attestation_client::AttestedMessage>,
) -> Option<(Vec<u8>, Vec<u8>)> {
    let handle = transfer.message_handle.as_deref();
    let exact = messages.iter().position(|attested| {
        attested
            .message
            .as_deref()
            .is_some_and(|message| handle == Some(abi::to_hex(&abi::keccak256(message)).as_str()))
    });
    let chosen = messages.into_iter().nth(exact.unwrap_or(0))?;
    match chosen.message {
        Some(message) => Some((message, chosen.attestation)),
        None => {
            let receipt_message = transfer.message.as_deref().and_then(|m| abi::from_hex(m).ok())?;
            Some((receipt_message, chosen.attestation))
        }
    }
}

/// How a failed submission affects the next attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubmitFailure {
    /// The node may hold the transaction; resending could execute it twice
    MaybeAccepted,
    /// Rejected for its nonce; re-sign with a fresh one
    StaleNonce,
    /// Rejected for its price; replace with the same nonce and a higher price
    Underpriced,
    Fatal,
}

fn classify_submit_failure(reason: &str) -> SubmitFailure {
    let reason = reason.to_lowercase();
    let contains_any = |needles: &[&str]| needles.iter().any(|needle| reason.contains(needle));
    if reason.contains("execution reverted") {
        SubmitFailure::Fatal
    } else if contains_any(&["already known", "known transaction", "timed out", "failed to send", "failed to parse"]) {
        SubmitFailure::MaybeAccepted
    } else if reason.contains("nonce too low") {
        SubmitFailure::StaleNonce
    } else if contains_any(&["underpriced", "fee too low", "base fee", "gas price too low"]) {
        SubmitFailure::Underpriced
    } else {
        SubmitFailure::Fatal
    }
}

/// Replacement price: at least 10% above the rejected one, as nodes require.
fn bump_gas_price(price: U256) -> U256 {
    price.saturating_add(price / 10).saturating_add(U256::one())
}

fn chain_unavailable(chain_id: ChainId, e: anyhow::Error) -> OmnigasError {
    OmnigasError::ChainUnavailable {
        chain_id,
        reason: format!("{:#}", e),
    }
}

fn internal(e: anyhow::Error) -> OmnigasError {
    OmnigasError::Internal(format!("{:#}", e))
}
