//! Attestation Service Client
//!
//! Looks up the attestation for a burn by (source domain, transaction hash).
//! The service is chosen once at construction: the HTTP service or an in-process mock
//! that completes after a fixed number of polls.

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::chains::abi;

/// One attested message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestedMessage {
    /// Message bytes as indexed by the service; absent when the service does not echo it
    pub message: Option<Vec<u8>>,
    /// Attestation signature(s)
    pub attestation: Vec<u8>,
}

/// Result of one attestation lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttestationStatus {
    /// Not yet indexed or still waiting for finality
    Pending,
    Complete(Vec<AttestedMessage>),
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    messages: Vec<RawMessage>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    attestation: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// HTTP attestation service
#[derive(Debug, Clone)]
pub struct AttestationClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl AttestationClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// `GET /v2/messages/{sourceDomain}?transactionHash=`
    ///
    /// A 404 means the burn is not indexed yet and is reported as `Pending`.
    pub async fn fetch(&self, source_domain: u32, tx_hash: &str) -> Result<AttestationStatus> {
        let url = format!("{}/v2/messages/{}", self.base_url, source_domain);
        let request = self
            .client
            .get(&url)
            .query(&[("transactionHash", tx_hash)])
            .send();

        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| anyhow::anyhow!("Timed out after {:?} polling attestation for {}", self.timeout, tx_hash))?
            .with_context(|| format!("Failed to send attestation request to {}", url))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(AttestationStatus::Pending);
        }
        if !response.status().is_success() {
            anyhow::bail!("Attestation service returned HTTP {}", response.status());
        }

        let body: MessagesResponse = response
            .json()
            .await
            .context("Failed to parse attestation response")?;

        let mut complete = Vec::new();
        for raw in body.messages {
            if raw.status.as_deref() != Some("complete") {
                continue;
            }
            let attestation = match raw.attestation.as_deref() {
                Some(a) if a.starts_with("0x") => abi::from_hex(a)?,
                _ => continue,
            };
            let message = raw.message.as_deref().map(abi::from_hex).transpose()?;
            complete.push(AttestedMessage { message, attestation });
        }

        if complete.is_empty() {
            Ok(AttestationStatus::Pending)
        } else {
            Ok(AttestationStatus::Complete(complete))
        }
    }
}

/// In-process attestation service for local runs and tests.
///
/// Reports `Pending` for the first `polls_until_complete` lookups of a transaction, then
/// a deterministic attestation. It never echoes the message, so the receipt-derived
/// message is used for the mint.
#[derive(Debug, Clone)]
pub struct MockAttestation {
    polls_until_complete: u32,
    polls: Arc<Mutex<HashMap<String, u32>>>,
}

impl MockAttestation {
    pub fn new(polls_until_complete: u32) -> Self {
        Self {
            polls_until_complete,
            polls: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Never completes; used to exercise timeouts.
    pub fn never() -> Self {
        Self::new(u32::MAX)
    }

    pub async fn fetch(&self, _source_domain: u32, tx_hash: &str) -> Result<AttestationStatus> {
        let mut polls = self.polls.lock().await;
        let count = polls.entry(tx_hash.to_lowercase()).or_insert(0);
        *count = count.saturating_add(1);
        if *count <= self.polls_until_complete {
            return Ok(AttestationStatus::Pending);
        }

        let seed = abi::keccak256(tx_hash.as_bytes());
        let mut attestation = Vec::with_capacity(65);
        attestation.extend_from_slice(&seed);
        attestation.extend_from_slice(&abi::keccak256(&seed));
        attestation.push(27);
        Ok(AttestationStatus::Complete(vec![AttestedMessage {
            message: None,
            attestation,
        }]))
    }

    /// Number of lookups made for `tx_hash`.
    pub async fn poll_count(&self, tx_hash: &str) -> u32 {
        self.polls
            .lock()
            .await
            .get(&tx_hash.to_lowercase())
            .copied()
            .unwrap_or(0)
    }
}

/// Attestation service selected at construction.
#[derive(Debug, Clone)]
pub enum AttestationService {
    Production(AttestationClient),
    Mock(MockAttestation),
}

impl AttestationService {
    pub async fn fetch(&self, source_domain: u32, tx_hash: &str) -> Result<AttestationStatus> {
        match self {
            AttestationService::Production(client) => client.fetch(source_domain, tx_hash).await,
            AttestationService::Mock(mock) => mock.fetch(source_domain, tx_hash).await,
        }
    }

    pub fn is_mock(&self) -> bool {
        matches!(self, AttestationService::Mock(_))
    }
}
