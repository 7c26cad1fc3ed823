//! Transaction Authorization Module
//!
//! Signing capabilities supplied by the caller for one request:
//! - a local secp256k1 key that signs EIP-155 legacy transactions and EIP-191 messages
//! - an interactive wallet endpoint that holds the key and signs `eth_sendTransaction`
//!
//! Private keys must never be logged. Neither signer is persisted beyond one request.

use anyhow::{Context, Result};
use ethereum_types::U256;
use k256::ecdsa::{
    RecoveryId, Signature as EcdsaSignature, SigningKey as EcdsaSigningKey,
    VerifyingKey as EcdsaVerifyingKey,
};
use reqwest::Client;
use std::fmt;
use std::time::Duration;
use tracing::debug;

use crate::chains::abi;
use crate::chains::evm::{json_rpc_call, CallRequest, EvmClient};

/// Gas headroom applied on top of `eth_estimateGas`, in percent.
const GAS_LIMIT_BUFFER_PERCENT: u64 = 120;

// ============================================================================
// LOCAL KEY SIGNER
// ============================================================================

/// Legacy (pre-EIP-1559) transaction fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas_limit: u64,
    pub to: String,
    pub value: U256,
    pub data: Vec<u8>,
}

/// Local secp256k1 key.
#[derive(Clone)]
pub struct LocalKeySigner {
    signing_key: EcdsaSigningKey,
    address: String,
}

impl fmt::Debug for LocalKeySigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalKeySigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl LocalKeySigner {
    /// Creates a signer from a 32-byte hex private key (0x prefix optional).
    pub fn from_hex(private_key: &str) -> Result<Self> {
        let key_bytes = abi::from_hex(private_key.trim()).context("Invalid private key hex")?;
        if key_bytes.len() != 32 {
            return Err(anyhow::anyhow!(
                "Invalid private key length: expected 32 bytes, got {}",
                key_bytes.len()
            ));
        }
        let secret: [u8; 32] = key_bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("Failed to convert private key to array"))?;
        let signing_key = EcdsaSigningKey::from_bytes(&secret.into())
            .map_err(|e| anyhow::anyhow!("Failed to create ECDSA signing key: {}", e))?;
        let address = ethereum_address(signing_key.verifying_key())?;
        Ok(Self { signing_key, address })
    }

    /// Lowercase 0x-prefixed Ethereum address of the key.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Signs a 32-byte hash without any prefix.
    ///
    /// # Returns
    ///
    /// * `Ok((r, s, recovery_id))` - r and s are 32-byte big-endian, recovery_id is 0 or 1
    pub fn sign_hash(&self, hash: &[u8; 32]) -> Result<([u8; 32], [u8; 32], u8)> {
        use k256::ecdsa::signature::hazmat::PrehashSigner;
        let signature: EcdsaSignature = self
            .signing_key
            .sign_prehash(hash)
            .map_err(|e| anyhow::anyhow!("Failed to sign hash: {}", e))?;

        let sig_bytes = signature.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&sig_bytes[..32]);
        s.copy_from_slice(&sig_bytes[32..64]);

        // Recovery ID: whichever of 0/1 recovers our own key
        let public_key_point = self.signing_key.verifying_key().to_encoded_point(false);
        let recovery_id = match EcdsaVerifyingKey::recover_from_prehash(
            hash,
            &signature,
            RecoveryId::new(false, false),
        ) {
            Ok(recovered) if recovered.to_encoded_point(false).as_bytes() == public_key_point.as_bytes() => 0u8,
            _ => 1u8,
        };

        Ok((r, s, recovery_id))
    }

    /// EIP-191 personal-message signature over a 32-byte hash.
    ///
    /// Signs keccak256("\x19Ethereum Signed Message:\n32" || hash) and returns
    /// r || s || v (65 bytes, v = 27 or 28).
    pub fn sign_message_hash(&self, hash: &[u8; 32]) -> Result<Vec<u8>> {
        let prefix = b"\x19Ethereum Signed Message:\n32";
        let mut prefixed = Vec::with_capacity(prefix.len() + 32);
        prefixed.extend_from_slice(prefix);
        prefixed.extend_from_slice(hash);
        let digest = abi::keccak256(&prefixed);

        let (r, s, recovery_id) = self.sign_hash(&digest)?;
        let mut signature = Vec::with_capacity(65);
        signature.extend_from_slice(&r);
        signature.extend_from_slice(&s);
        signature.push(recovery_id + 27);
        Ok(signature)
    }

    /// Signs a legacy transaction with EIP-155 replay protection.
    ///
    /// Returns the RLP-encoded signed transaction.
    pub fn sign_legacy_transaction(&self, tx: &LegacyTransaction, chain_id: u64) -> Result<Vec<u8>> {
        let to_bytes = abi::from_hex(&tx.to).context("Failed to decode 'to' address")?;

        // [nonce, gasPrice, gasLimit, to, value, data, chainId, 0, 0]
        let unsigned_items: Vec<Vec<u8>> = vec![
            rlp_encode_u64(tx.nonce),
            rlp_encode_u256(tx.gas_price),
            rlp_encode_u64(tx.gas_limit),
            to_bytes.clone(),
            rlp_encode_u256(tx.value),
            tx.data.clone(),
            rlp_encode_u64(chain_id),
            vec![],
            vec![],
        ];
        let tx_hash = abi::keccak256(&rlp_encode_list(&unsigned_items));

        let (r, s, recovery_id) = self.sign_hash(&tx_hash)?;
        let v = (recovery_id as u64) + chain_id * 2 + 35;

        // [nonce, gasPrice, gasLimit, to, value, data, v, r, s]
        let signed_items: Vec<Vec<u8>> = vec![
            rlp_encode_u64(tx.nonce),
            rlp_encode_u256(tx.gas_price),
            rlp_encode_u64(tx.gas_limit),
            to_bytes,
            rlp_encode_u256(tx.value),
            tx.data.clone(),
            rlp_encode_u64(v),
            strip_leading_zeros(&r),
            strip_leading_zeros(&s),
        ];
        Ok(rlp_encode_list(&signed_items))
    }

    /// Builds and signs a transaction for `evm` without broadcasting it.
    ///
    /// Gas limit defaults to the node's estimate plus headroom. `nonce` pins the nonce of a
    /// replacement; otherwise the pending nonce is used.
    pub async fn sign_request(
        &self,
        evm: &EvmClient,
        request: &TransactionRequest,
        nonce: Option<u64>,
    ) -> Result<SignedTransaction> {
        let nonce = match nonce {
            Some(nonce) => nonce,
            None => evm.nonce(&self.address).await?,
        };
        let gas_price = match request.gas_price {
            Some(price) => price,
            None => evm.gas_price().await?,
        };
        let gas_limit = match request.gas_limit {
            Some(limit) => limit,
            None => {
                let estimate = evm
                    .estimate_gas(&CallRequest {
                        from: Some(self.address.clone()),
                        to: request.to.clone(),
                        value: Some(request.value),
                        data: Some(request.data.clone()),
                    })
                    .await?;
                estimate.saturating_mul(GAS_LIMIT_BUFFER_PERCENT) / 100
            }
        };

        let tx = LegacyTransaction {
            nonce,
            gas_price,
            gas_limit,
            to: request.to.clone(),
            value: request.value,
            data: request.data.clone(),
        };
        let raw = self.sign_legacy_transaction(&tx, evm.chain_id().0)?;

        debug!(
            "Raw tx: nonce={}, gas_price={}, gas_limit={}, chain_id={}, from={}",
            nonce,
            gas_price,
            gas_limit,
            evm.chain_id(),
            self.address
        );

        Ok(SignedTransaction {
            hash: abi::to_hex(&abi::keccak256(&raw)),
            raw,
            nonce,
            gas_price,
        })
    }
}

/// Signed legacy transaction ready for `eth_sendRawTransaction`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub raw: Vec<u8>,
    /// keccak256 of `raw`, the hash the transaction is mined under
    pub hash: String,
    pub nonce: u64,
    pub gas_price: U256,
}

/// Derives the Ethereum address from a public key.
///
/// keccak256(uncompressed_public_key without 0x04)[12..32]
fn ethereum_address(verifying_key: &EcdsaVerifyingKey) -> Result<String> {
    let point = verifying_key.to_encoded_point(false);
    let public_key_bytes = point.as_bytes();
    if public_key_bytes.len() != 65 || public_key_bytes[0] != 0x04 {
        return Err(anyhow::anyhow!(
            "Invalid public key format: expected 65 bytes with 0x04 prefix"
        ));
    }
    let hash = abi::keccak256(&public_key_bytes[1..]);
    Ok(abi::to_hex(&hash[12..32]))
}

// ============================================================================
// WALLET SIGNER
// ============================================================================

/// Interactive wallet reachable over JSON-RPC (`eth_sendTransaction`).
///
/// The wallet holds the key and prompts its user; this side never sees it.
#[derive(Debug, Clone)]
pub struct WalletSigner {
    client: Client,
    url: String,
    address: String,
    timeout: Duration,
}

impl WalletSigner {
    /// `timeout` bounds how long the wallet user has to approve.
    pub fn new(url: &str, address: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            url: url.to_string(),
            address: address.to_lowercase(),
            timeout,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Asks the wallet to sign and broadcast.
    pub async fn send_transaction(&self, evm: &EvmClient, request: &TransactionRequest) -> Result<String> {
        let mut tx = serde_json::json!({
            "from": self.address,
            "to": request.to,
            "value": abi::u256_to_quantity(request.value),
            "data": abi::to_hex(&request.data),
            "chainId": format!("{:#x}", evm.chain_id().0),
        });
        if let Some(limit) = request.gas_limit {
            tx["gas"] = serde_json::json!(format!("{:#x}", limit));
        }
        if let Some(price) = request.gas_price {
            tx["gasPrice"] = serde_json::json!(abi::u256_to_quantity(price));
        }
        json_rpc_call(&self.client, &self.url, self.timeout, "eth_sendTransaction", vec![tx])
            .await
            .context("Wallet rejected or failed eth_sendTransaction")
    }
}

// ============================================================================
// SIGNER
// ============================================================================

/// Transaction to authorize on one chain.
#[derive(Debug, Clone, Default)]
pub struct TransactionRequest {
    pub to: String,
    pub value: U256,
    pub data: Vec<u8>,
    pub gas_limit: Option<u64>,
    pub gas_price: Option<U256>,
}

/// Per-chain transaction authorization capability.
#[derive(Debug, Clone)]
pub enum Signer {
    Local(LocalKeySigner),
    Wallet(WalletSigner),
}

impl Signer {
    pub fn address(&self) -> &str {
        match self {
            Signer::Local(s) => s.address(),
            Signer::Wallet(s) => s.address(),
        }
    }
}

// ============================================================================
// RLP ENCODING HELPERS (for legacy EVM transactions)
// ============================================================================

fn strip_leading_zeros(bytes: &[u8]) -> Vec<u8> {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    bytes[start..].to_vec()
}

/// Encode a u64 as big-endian bytes with no leading zeros (RLP integer format).
fn rlp_encode_u64(val: u64) -> Vec<u8> {
    strip_leading_zeros(&val.to_be_bytes())
}

fn rlp_encode_u256(val: U256) -> Vec<u8> {
    strip_leading_zeros(&abi::u256_to_word(val))
}

/// RLP-encode a single byte-string item.
fn rlp_encode_item(data: &[u8]) -> Vec<u8> {
    if data.len() == 1 && data[0] < 0x80 {
        vec![data[0]]
    } else if data.len() <= 55 {
        let mut out = vec![0x80 + data.len() as u8];
        out.extend_from_slice(data);
        out
    } else {
        let len_bytes = rlp_encode_u64(data.len() as u64);
        let mut out = vec![0xb7 + len_bytes.len() as u8];
        out.extend_from_slice(&len_bytes);
        out.extend_from_slice(data);
        out
    }
}

/// RLP-encode a list of items (each item is raw bytes, NOT RLP-encoded).
fn rlp_encode_list(items: &[Vec<u8>]) -> Vec<u8> {
    let mut payload = Vec::new();
    for item in items {
        payload.extend(rlp_encode_item(item));
    }

    if payload.len() <= 55 {
        let mut out = vec![0xc0 + payload.len() as u8];
        out.extend(payload);
        out
    } else {
        let len_bytes = rlp_encode_u64(payload.len() as u64);
        let mut out = vec![0xf7 + len_bytes.len() as u8];
        out.extend_from_slice(&len_bytes);
        out.extend(payload);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_ONE: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";

    #[test]
    fn test_address_derivation() {
        let signer = LocalKeySigner::from_hex(KEY_ONE).unwrap();
        assert_eq!(signer.address(), "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf");
    }

    #[test]
    fn test_debug_does_not_leak_key() {
        let signer = LocalKeySigner::from_hex(KEY_ONE).unwrap();
        let debug = format!("{:?}", signer);
        assert!(debug.contains("0x7e5f4552"));
        assert!(!debug.contains("0000000000000000000000000000000000000000000000000000000000000001"));
    }

    /// What is tested: EIP-155 signing of the canonical example transaction
    /// Why: Raw transactions must match what every other Ethereum signer produces
    #[test]
    fn test_eip155_example_transaction() {
        let signer = LocalKeySigner::from_hex(
            "0x4646464646464646464646464646464646464646464646464646464646464646",
        )
        .unwrap();
        let tx = LegacyTransaction {
            nonce: 9,
            gas_price: U256::from(20_000_000_000u64),
            gas_limit: 21_000,
            to: "0x3535353535353535353535353535353535353535".to_string(),
            value: U256::from(1_000_000_000_000_000_000u64),
            data: vec![],
        };
        let raw = signer.sign_legacy_transaction(&tx, 1).unwrap();
        assert_eq!(
            hex::encode(raw),
            "f86c098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a76400008025a028ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276a067cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83"
        );
    }

    #[test]
    fn test_message_signature_recovers_signer() {
        let signer = LocalKeySigner::from_hex(KEY_ONE).unwrap();
        let hash = abi::keccak256(b"user operation");
        let sig = signer.sign_message_hash(&hash).unwrap();
        assert_eq!(sig.len(), 65);
        assert!(sig[64] == 27 || sig[64] == 28);

        let prefix = b"\x19Ethereum Signed Message:\n32";
        let mut prefixed = prefix.to_vec();
        prefixed.extend_from_slice(&hash);
        let digest = abi::keccak256(&prefixed);
        let signature = EcdsaSignature::from_slice(&sig[..64]).unwrap();
        let recovery_id = RecoveryId::from_byte(sig[64] - 27).unwrap();
        let recovered = EcdsaVerifyingKey::recover_from_prehash(&digest, &signature, recovery_id).unwrap();
        assert_eq!(ethereum_address(&recovered).unwrap(), signer.address());
    }

    #[test]
    fn test_rlp_items() {
        assert_eq!(rlp_encode_item(&[]), vec![0x80]);
        assert_eq!(rlp_encode_item(&[0x7f]), vec![0x7f]);
        assert_eq!(rlp_encode_item(&[0x80]), vec![0x81, 0x80]);
        assert_eq!(rlp_encode_u64(0), Vec::<u8>::new());
        assert_eq!(rlp_encode_u64(1024), vec![0x04, 0x00]);
    }
}
