//! Error types

use thiserror::Error;

use crate::types::{Amount, ChainId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OmnigasError {
    #[error("Chain {chain_id} unavailable: {reason}")]
    ChainUnavailable { chain_id: ChainId, reason: String },

    #[error("Insufficient balance on chain {chain_id}: required {required}, available {available}")]
    InsufficientBalance {
        chain_id: ChainId,
        required: Amount,
        available: Amount,
    },

    #[error("No viable route: {0}")]
    NoViableRoute(String),

    #[error("Bridge validation failed: {0}")]
    BridgeValidation(String),

    #[error("Attestation not received before timeout; burn {source_tx_hash} may still complete")]
    AttestationTimeout { source_tx_hash: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Contract execution failed: {reason}")]
    ContractExecutionFailed { reason: String, retryable: bool },

    #[error("No execution method available: {0}")]
    NoExecutionMethod(String),

    #[error("Unsupported chain {0}")]
    UnsupportedChain(ChainId),

    #[error("Invalid intent: {0}")]
    InvalidIntent(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl OmnigasError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            OmnigasError::ChainUnavailable { .. } => "CHAIN_UNAVAILABLE",
            OmnigasError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            OmnigasError::NoViableRoute(_) => "NO_VIABLE_ROUTE",
            OmnigasError::BridgeValidation(_) => "BRIDGE_VALIDATION_ERROR",
            OmnigasError::AttestationTimeout { .. } => "ATTESTATION_TIMEOUT",
            OmnigasError::Cancelled => "CANCELLED",
            OmnigasError::ContractExecutionFailed { .. } => "CONTRACT_EXECUTION_FAILED",
            OmnigasError::NoExecutionMethod(_) => "NO_EXECUTION_METHOD",
            OmnigasError::UnsupportedChain(_) => "UNSUPPORTED_CHAIN",
            OmnigasError::InvalidIntent(_) => "INVALID_INTENT",
            OmnigasError::Internal(_) => "INTERNAL",
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            OmnigasError::ChainUnavailable { .. } => true,
            OmnigasError::AttestationTimeout { .. } => true,
            OmnigasError::ContractExecutionFailed { retryable, .. } => *retryable,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, OmnigasError>;
