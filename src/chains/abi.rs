//! Minimal ABI encoding
//!
//! Only what the orchestration needs: ERC-20 reads and approvals, CCTP burn and receive,
//! smart-account execution, revert reason and `MessageSent(bytes)` decoding.

use anyhow::{Context, Result};
use ethereum_types::U256;
use sha3::{Digest, Keccak256};

/// `Error(string)` revert selector.
const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// CCTP MessageTransmitter event carrying the outbound message.
pub const MESSAGE_SENT_EVENT: &str = "MessageSent(bytes)";

/// CCTP v2 finality thresholds.
pub const FAST_FINALITY_THRESHOLD: u32 = 1000;
pub const STANDARD_FINALITY_THRESHOLD: u32 = 2000;

/// ABI value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Address(String),
    Uint(U256),
    FixedBytes([u8; 32]),
    Bytes(Vec<u8>),
}

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// First four bytes of keccak256 of a function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// keccak256 event topic for an event signature, 0x-prefixed.
pub fn event_topic(signature: &str) -> String {
    to_hex(&keccak256(signature.as_bytes()))
}

pub fn to_hex(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

pub fn from_hex(value: &str) -> Result<Vec<u8>> {
    let clean = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(clean).with_context(|| format!("Invalid hex string '{}'", value))
}

pub fn parse_hex_u64(value: &str) -> Result<u64> {
    let clean = value.strip_prefix("0x").unwrap_or(value);
    if clean.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(clean, 16).with_context(|| format!("Invalid hex quantity '{}'", value))
}

pub fn parse_hex_u256(value: &str) -> Result<U256> {
    let clean = value.strip_prefix("0x").unwrap_or(value);
    if clean.is_empty() {
        return Ok(U256::zero());
    }
    U256::from_str_radix(clean, 16).map_err(|e| anyhow::anyhow!("Invalid hex quantity '{}': {:?}", value, e))
}

/// Hex quantity as JSON-RPC expects it (no leading zeros).
pub fn u256_to_quantity(value: U256) -> String {
    format!("{:#x}", value)
}

pub fn u256_to_word(value: U256) -> [u8; 32] {
    let mut word = [0u8; 32];
    value.to_big_endian(&mut word);
    word
}

/// Left-pads a 20-byte address into a 32-byte word.
pub fn address_to_word(addr: &str) -> Result<[u8; 32]> {
    let bytes = from_hex(addr)?;
    if bytes.len() != 20 {
        anyhow::bail!("Invalid address length: expected 20 bytes, got {}", bytes.len());
    }
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(&bytes);
    Ok(word)
}

/// ABI-encodes a tuple of tokens (head/tail layout).
pub fn encode_tokens(tokens: &[Token]) -> Result<Vec<u8>> {
    let head_len = tokens.len() * 32;
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for token in tokens {
        match token {
            Token::Address(addr) => head.extend_from_slice(&address_to_word(addr)?),
            Token::Uint(value) => head.extend_from_slice(&u256_to_word(*value)),
            Token::FixedBytes(word) => head.extend_from_slice(word),
            Token::Bytes(data) => {
                head.extend_from_slice(&u256_to_word(U256::from(head_len + tail.len())));
                tail.extend_from_slice(&u256_to_word(U256::from(data.len())));
                tail.extend_from_slice(data);
                let padding = (32 - (data.len() % 32)) % 32;
                tail.extend(std::iter::repeat(0u8).take(padding));
            }
        }
    }

    head.extend(tail);
    Ok(head)
}

/// Selector plus encoded arguments.
pub fn encode_call(signature: &str, tokens: &[Token]) -> Result<Vec<u8>> {
    let mut data = selector(signature).to_vec();
    data.extend(encode_tokens(tokens)?);
    Ok(data)
}

// ============================================================================
// CONTRACT CALLS
// ============================================================================

pub fn erc20_balance_of(owner: &str) -> Result<Vec<u8>> {
    encode_call("balanceOf(address)", &[Token::Address(owner.to_string())])
}

pub fn erc20_allowance(owner: &str, spender: &str) -> Result<Vec<u8>> {
    encode_call(
        "allowance(address,address)",
        &[Token::Address(owner.to_string()), Token::Address(spender.to_string())],
    )
}

pub fn erc20_approve(spender: &str, amount: U256) -> Result<Vec<u8>> {
    encode_call(
        "approve(address,uint256)",
        &[Token::Address(spender.to_string()), Token::Uint(amount)],
    )
}

/// CCTP v2 `depositForBurn`.
///
/// An all-zero `destinationCaller` lets anyone relay the mint.
pub fn cctp_deposit_for_burn(
    amount: U256,
    destination_domain: u32,
    mint_recipient: &str,
    burn_token: &str,
    max_fee: U256,
    min_finality_threshold: u32,
) -> Result<Vec<u8>> {
    encode_call(
        "depositForBurn(uint256,uint32,bytes32,address,bytes32,uint256,uint32)",
        &[
            Token::Uint(amount),
            Token::Uint(U256::from(destination_domain)),
            Token::FixedBytes(address_to_word(mint_recipient)?),
            Token::Address(burn_token.to_string()),
            Token::FixedBytes([0u8; 32]),
            Token::Uint(max_fee),
            Token::Uint(U256::from(min_finality_threshold)),
        ],
    )
}

pub fn cctp_receive_message(message: &[u8], attestation: &[u8]) -> Result<Vec<u8>> {
    encode_call(
        "receiveMessage(bytes,bytes)",
        &[Token::Bytes(message.to_vec()), Token::Bytes(attestation.to_vec())],
    )
}

/// Smart account `execute(address,uint256,bytes)`.
pub fn smart_account_execute(to: &str, value: U256, data: &[u8]) -> Result<Vec<u8>> {
    encode_call(
        "execute(address,uint256,bytes)",
        &[Token::Address(to.to_string()), Token::Uint(value), Token::Bytes(data.to_vec())],
    )
}

/// EntryPoint `getNonce(address,uint192)` with key 0.
pub fn entry_point_get_nonce(sender: &str) -> Result<Vec<u8>> {
    encode_call(
        "getNonce(address,uint192)",
        &[Token::Address(sender.to_string()), Token::Uint(U256::zero())],
    )
}

// ============================================================================
// DECODING
// ============================================================================

/// Decodes a single `uint256` return value.
pub fn decode_uint(data: &str) -> Result<U256> {
    let bytes = from_hex(data)?;
    if bytes.is_empty() {
        return Ok(U256::zero());
    }
    if bytes.len() < 32 {
        anyhow::bail!("Return data too short for uint256: {} bytes", bytes.len());
    }
    Ok(U256::from_big_endian(&bytes[..32]))
}

/// Decodes a single dynamic `bytes` value (e.g., `MessageSent(bytes)` log data).
pub fn decode_bytes(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < 64 {
        anyhow::bail!("ABI bytes value too short: {} bytes", data.len());
    }
    let offset = U256::from_big_endian(&data[..32]);
    if offset > U256::from(data.len()) {
        anyhow::bail!("ABI bytes offset out of range");
    }
    let offset = offset.as_usize();
    if data.len() < offset + 32 {
        anyhow::bail!("ABI bytes length word out of range");
    }
    let len = U256::from_big_endian(&data[offset..offset + 32]);
    if len > U256::from(data.len()) {
        anyhow::bail!("ABI bytes length out of range");
    }
    let len = len.as_usize();
    let start = offset + 32;
    if data.len() < start + len {
        anyhow::bail!("ABI bytes value truncated");
    }
    Ok(data[start..start + len].to_vec())
}

/// Extracts the human-readable reason from `Error(string)` revert data.
pub fn decode_revert_reason(data: &str) -> Option<String> {
    let bytes = from_hex(data).ok()?;
    if bytes.len() < 4 || bytes[..4] != ERROR_STRING_SELECTOR {
        return None;
    }
    let reason = decode_bytes(&bytes[4..]).ok()?;
    String::from_utf8(reason).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_selectors() {
        assert_eq!(hex::encode(selector("balanceOf(address)")), "70a08231");
        assert_eq!(hex::encode(selector("allowance(address,address)")), "dd62ed3e");
        assert_eq!(hex::encode(selector("approve(address,uint256)")), "095ea7b3");
        assert_eq!(hex::encode(selector("transfer(address,uint256)")), "a9059cbb");
    }

    #[test]
    fn test_balance_of_layout() {
        let data = erc20_balance_of("0x000000000000000000000000000000000000000a").unwrap();
        assert_eq!(data.len(), 36);
        assert_eq!(data[35], 0x0a);
        assert!(data[4..35].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_dynamic_bytes_roundtrip_through_decoder() {
        let message = vec![0xab; 45];
        let encoded = encode_tokens(&[Token::Bytes(message.clone())]).unwrap();
        // offset + length + two padded words
        assert_eq!(encoded.len(), 32 + 32 + 64);
        assert_eq!(decode_bytes(&encoded).unwrap(), message);
    }

    #[test]
    fn test_receive_message_offsets() {
        let data = cctp_receive_message(&[1, 2, 3], &[4; 65]).unwrap();
        let args = &data[4..];
        assert_eq!(U256::from_big_endian(&args[..32]), U256::from(64));
        // first tail: len word + one padded word
        assert_eq!(U256::from_big_endian(&args[32..64]), U256::from(128));
    }

    #[test]
    fn test_decode_revert_reason() {
        let mut data = ERROR_STRING_SELECTOR.to_vec();
        data.extend(encode_tokens(&[Token::Bytes(b"Insufficient allowance".to_vec())]).unwrap());
        assert_eq!(
            decode_revert_reason(&to_hex(&data)).as_deref(),
            Some("Insufficient allowance")
        );
        assert_eq!(decode_revert_reason("0x1234"), None);
    }

    #[test]
    fn test_hex_quantities() {
        assert_eq!(parse_hex_u64("0x5208").unwrap(), 21000);
        assert_eq!(parse_hex_u256("0x").unwrap(), U256::zero());
        assert_eq!(u256_to_quantity(U256::from(255)), "0xff");
        assert_eq!(u256_to_quantity(U256::zero()), "0x0");
    }
}
