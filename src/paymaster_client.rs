//! Paymaster and Bundler Client
//!
//! ERC-4337 (EntryPoint v0.6) user operations: sponsorship through a stablecoin paymaster
//! (`pm_sponsorUserOperation`), submission to a bundler (`eth_sendUserOperation`) and
//! receipt lookup (`eth_getUserOperationReceipt`).

use anyhow::{Context, Result};
use ethereum_types::U256;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::chains::abi::{self, Token};
use crate::chains::evm::json_rpc_call;

/// Placeholder signature used while the paymaster simulates the operation.
const DUMMY_SIGNATURE: &str = "0xfffffffffffffffffffffffffffffff0000000000000000000000000000000007aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa1c";

/// v0.6 user operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserOperation {
    pub sender: String,
    pub nonce: U256,
    pub init_code: Vec<u8>,
    pub call_data: Vec<u8>,
    pub call_gas_limit: U256,
    pub verification_gas_limit: U256,
    pub pre_verification_gas: U256,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
    pub paymaster_and_data: Vec<u8>,
    pub signature: Vec<u8>,
}

impl UserOperation {
    /// Unsigned operation with the placeholder signature.
    pub fn new(sender: &str, nonce: U256, call_data: Vec<u8>, gas_price: U256) -> Result<Self> {
        Ok(Self {
            sender: sender.to_string(),
            nonce,
            init_code: Vec::new(),
            call_data,
            call_gas_limit: U256::zero(),
            verification_gas_limit: U256::zero(),
            pre_verification_gas: U256::zero(),
            max_fee_per_gas: gas_price,
            max_priority_fee_per_gas: gas_price,
            paymaster_and_data: Vec::new(),
            signature: abi::from_hex(DUMMY_SIGNATURE)?,
        })
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "sender": self.sender,
            "nonce": abi::u256_to_quantity(self.nonce),
            "initCode": abi::to_hex(&self.init_code),
            "callData": abi::to_hex(&self.call_data),
            "callGasLimit": abi::u256_to_quantity(self.call_gas_limit),
            "verificationGasLimit": abi::u256_to_quantity(self.verification_gas_limit),
            "preVerificationGas": abi::u256_to_quantity(self.pre_verification_gas),
            "maxFeePerGas": abi::u256_to_quantity(self.max_fee_per_gas),
            "maxPriorityFeePerGas": abi::u256_to_quantity(self.max_priority_fee_per_gas),
            "paymasterAndData": abi::to_hex(&self.paymaster_and_data),
            "signature": abi::to_hex(&self.signature),
        })
    }

    /// EntryPoint v0.6 `getUserOpHash`.
    ///
    /// keccak256(abi.encode(keccak256(pack(op)), entryPoint, chainId)), where `pack` hashes
    /// the dynamic fields and omits the signature.
    pub fn hash(&self, entry_point: &str, chain_id: u64) -> Result<[u8; 32]> {
        let packed = abi::encode_tokens(&[
            Token::Address(self.sender.clone()),
            Token::Uint(self.nonce),
            Token::FixedBytes(abi::keccak256(&self.init_code)),
            Token::FixedBytes(abi::keccak256(&self.call_data)),
            Token::Uint(self.call_gas_limit),
            Token::Uint(self.verification_gas_limit),
            Token::Uint(self.pre_verification_gas),
            Token::Uint(self.max_fee_per_gas),
            Token::Uint(self.max_priority_fee_per_gas),
            Token::FixedBytes(abi::keccak256(&self.paymaster_and_data)),
        ])?;
        let encoded = abi::encode_tokens(&[
            Token::FixedBytes(abi::keccak256(&packed)),
            Token::Address(entry_point.to_string()),
            Token::Uint(U256::from(chain_id)),
        ])?;
        Ok(abi::keccak256(&encoded))
    }
}

/// Paymaster sponsorship result.
#[derive(Debug, Clone, Deserialize)]
pub struct SponsorResult {
    #[serde(rename = "paymasterAndData")]
    pub paymaster_and_data: String,
    #[serde(rename = "preVerificationGas")]
    pub pre_verification_gas: String,
    #[serde(rename = "verificationGasLimit")]
    pub verification_gas_limit: String,
    #[serde(rename = "callGasLimit")]
    pub call_gas_limit: String,
}

impl SponsorResult {
    /// Copies the sponsored gas fields and paymaster data into `op`.
    pub fn apply(&self, op: &mut UserOperation) -> Result<()> {
        op.paymaster_and_data = abi::from_hex(&self.paymaster_and_data)?;
        op.pre_verification_gas = abi::parse_hex_u256(&self.pre_verification_gas)?;
        op.verification_gas_limit = abi::parse_hex_u256(&self.verification_gas_limit)?;
        op.call_gas_limit = abi::parse_hex_u256(&self.call_gas_limit)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawReceipt {
    success: bool,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    receipt: Option<RawInnerReceipt>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawInnerReceipt {
    #[serde(rename = "transactionHash")]
    transaction_hash: String,
}

/// Outcome of an included user operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserOperationReceipt {
    pub success: bool,
    pub transaction_hash: Option<String>,
    pub reason: Option<String>,
}

/// Client for one chain's paymaster and bundler
#[derive(Debug, Clone)]
pub struct PaymasterClient {
    client: Client,
    paymaster_url: String,
    bundler_url: String,
    entry_point: String,
    timeout: Duration,
}

impl PaymasterClient {
    pub fn new(paymaster_url: &str, bundler_url: &str, entry_point: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            paymaster_url: paymaster_url.to_string(),
            bundler_url: bundler_url.to_string(),
            entry_point: entry_point.to_string(),
            timeout,
        })
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// Requests sponsorship paid in `token` (the chain's stablecoin).
    pub async fn sponsor(&self, op: &UserOperation, token: &str) -> Result<SponsorResult> {
        json_rpc_call(
            &self.client,
            &self.paymaster_url,
            self.timeout,
            "pm_sponsorUserOperation",
            vec![
                op.to_json(),
                serde_json::json!(self.entry_point),
                serde_json::json!({ "token": token }),
            ],
        )
        .await
        .context("Paymaster refused to sponsor user operation")
    }

    /// Submits a signed operation; returns the user operation hash.
    pub async fn send(&self, op: &UserOperation) -> Result<String> {
        json_rpc_call(
            &self.client,
            &self.bundler_url,
            self.timeout,
            "eth_sendUserOperation",
            vec![op.to_json(), serde_json::json!(self.entry_point)],
        )
        .await
        .context("Bundler rejected user operation")
    }

    pub async fn get_receipt(&self, user_op_hash: &str) -> Result<Option<UserOperationReceipt>> {
        let raw: Option<RawReceipt> = json_rpc_call(
            &self.client,
            &self.bundler_url,
            self.timeout,
            "eth_getUserOperationReceipt",
            vec![serde_json::json!(user_op_hash)],
        )
        .await?;
        Ok(raw.map(|r| UserOperationReceipt {
            success: r.success,
            transaction_hash: r.receipt.map(|inner| inner.transaction_hash),
            reason: r.reason,
        }))
    }
}
