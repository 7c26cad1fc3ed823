//! Core data model
//!
//! Chain identifiers, exact-integer stablecoin amounts, transaction intents, route options
//! and the lifecycle updates emitted while a request executes.

use ethereum_types::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::OmnigasError;

/// Number of implied decimals of the stablecoin (USDC).
pub const STABLECOIN_DECIMALS: u32 = 6;

// ============================================================================
// IDENTIFIERS AND AMOUNTS
// ============================================================================

/// Native chain identifier (EIP-155 chain id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(pub u64);

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        ChainId(id)
    }
}

/// Non-negative integer amount in minor units.
///
/// Stablecoin amounts carry 6 implied decimals. All arithmetic is exact; the type never
/// goes through floating point. Serialized as a decimal string so JSON consumers do not
/// lose precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(U256);

impl Amount {
    pub fn zero() -> Self {
        Amount(U256::zero())
    }

    pub fn from_u256(value: U256) -> Self {
        Amount(value)
    }

    pub fn as_u256(&self) -> U256 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn saturating_add(self, other: Amount) -> Amount {
        Amount(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: Amount) -> Amount {
        Amount(self.0.saturating_sub(other.0))
    }

    /// Parses a decimal string such as `"3012.45"` into minor units with `decimals`
    /// implied decimals. Digits beyond the precision are truncated.
    pub fn from_decimal_str(value: &str, decimals: u32) -> anyhow::Result<Self> {
        parse_decimal_units(value, decimals).map(Amount)
    }

    /// Sum of an iterator of amounts, saturating at `U256::MAX`.
    pub fn sum<'a>(amounts: impl IntoIterator<Item = &'a Amount>) -> Amount {
        amounts
            .into_iter()
            .fold(Amount::zero(), |acc, a| acc.saturating_add(*a))
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Amount(U256::from(value))
    }
}

impl From<u128> for Amount {
    fn from(value: u128) -> Self {
        Amount(U256::from(value))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        U256::from_dec_str(s.trim())
            .map(Amount)
            .map_err(|e| anyhow::anyhow!("Invalid amount '{}': {:?}", s, e))
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(Amount::from(n)),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Converts a decimal string into an integer scaled by `10^decimals`.
///
/// Accepts plain decimals (`"0.25"`) and exponent notation (`"2.5e-1"`), which is what
/// JSON number rendering produces for small prices. Rejects negative values.
pub fn parse_decimal_units(value: &str, decimals: u32) -> anyhow::Result<U256> {
    let value = value.trim();
    if value.is_empty() || value.starts_with('-') {
        anyhow::bail!("Invalid decimal value '{}'", value);
    }

    let (mantissa, exponent) = match value.find(['e', 'E']) {
        Some(pos) => {
            let exp: i64 = value[pos + 1..]
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid exponent in '{}'", value))?;
            (&value[..pos], exp)
        }
        None => (value, 0),
    };

    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((i, f)) => (i, f),
        None => (mantissa, ""),
    };
    if !int_part.chars().all(|c| c.is_ascii_digit()) || !frac_part.chars().all(|c| c.is_ascii_digit()) {
        anyhow::bail!("Invalid decimal value '{}'", value);
    }

    // digits * 10^(scale) where scale = decimals + exponent - len(frac)
    let digits = format!("{}{}", int_part, frac_part);
    let digits = if digits.is_empty() { "0".to_string() } else { digits };
    let scale = decimals as i64 + exponent - frac_part.len() as i64;

    let mut result = U256::from_dec_str(&digits)
        .map_err(|e| anyhow::anyhow!("Invalid decimal value '{}': {:?}", value, e))?;
    if scale >= 0 {
        let factor = U256::from(10u64)
            .checked_pow(U256::from(scale as u64))
            .ok_or_else(|| anyhow::anyhow!("Decimal value '{}' overflows", value))?;
        result = result
            .checked_mul(factor)
            .ok_or_else(|| anyhow::anyhow!("Decimal value '{}' overflows", value))?;
    } else {
        let divisor_exp = (-scale) as u64;
        if divisor_exp > 77 {
            return Ok(U256::zero());
        }
        result /= U256::from(10u64).pow(U256::from(divisor_exp));
    }
    Ok(result)
}

/// Ceiling of `value * numerator / denominator`.
pub fn mul_div_ceil(value: U256, numerator: U256, denominator: U256) -> U256 {
    if denominator.is_zero() {
        return U256::zero();
    }
    let product = value.saturating_mul(numerator);
    let quotient = product / denominator;
    if (product % denominator).is_zero() {
        quotient
    } else {
        quotient.saturating_add(U256::one())
    }
}

/// Returns true when `addr` is a `0x`-prefixed 20-byte hex address.
pub fn is_valid_address(addr: &str) -> bool {
    match addr.strip_prefix("0x") {
        Some(hex_part) => hex_part.len() == 40 && hex_part.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

// ============================================================================
// INTENT
// ============================================================================

/// Where the caller wants the transaction to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSelector", into = "RawSelector")]
pub enum ExecuteOn {
    /// Let the optimizer pick the cheapest chain
    Optimal,
    Chain(ChainId),
}

/// Which chain's stablecoin balance pays for the execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSelector", into = "RawSelector")]
pub enum PayFrom {
    /// Let the optimizer pick the funding chain
    Auto,
    Chain(ChainId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawSelector {
    Id(u64),
    Keyword(String),
}

impl TryFrom<RawSelector> for ExecuteOn {
    type Error = String;

    fn try_from(raw: RawSelector) -> Result<Self, Self::Error> {
        match raw {
            RawSelector::Id(id) => Ok(ExecuteOn::Chain(ChainId(id))),
            RawSelector::Keyword(k) if k == "optimal" => Ok(ExecuteOn::Optimal),
            RawSelector::Keyword(k) => k
                .parse::<u64>()
                .map(|id| ExecuteOn::Chain(ChainId(id)))
                .map_err(|_| format!("expected chain id or \"optimal\", got \"{}\"", k)),
        }
    }
}

impl From<ExecuteOn> for RawSelector {
    fn from(value: ExecuteOn) -> Self {
        match value {
            ExecuteOn::Optimal => RawSelector::Keyword("optimal".to_string()),
            ExecuteOn::Chain(id) => RawSelector::Id(id.0),
        }
    }
}

impl TryFrom<RawSelector> for PayFrom {
    type Error = String;

    fn try_from(raw: RawSelector) -> Result<Self, Self::Error> {
        match raw {
            RawSelector::Id(id) => Ok(PayFrom::Chain(ChainId(id))),
            RawSelector::Keyword(k) if k == "auto" => Ok(PayFrom::Auto),
            RawSelector::Keyword(k) => k
                .parse::<u64>()
                .map(|id| PayFrom::Chain(ChainId(id)))
                .map_err(|_| format!("expected chain id or \"auto\", got \"{}\"", k)),
        }
    }
}

impl From<PayFrom> for RawSelector {
    fn from(value: PayFrom) -> Self {
        match value {
            PayFrom::Auto => RawSelector::Keyword("auto".to_string()),
            PayFrom::Chain(id) => RawSelector::Id(id.0),
        }
    }
}

impl Default for ExecuteOn {
    fn default() -> Self {
        ExecuteOn::Optimal
    }
}

impl Default for PayFrom {
    fn default() -> Self {
        PayFrom::Auto
    }
}

/// Caller-selected urgency tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    #[default]
    Medium,
    High,
}

impl Urgency {
    /// Percentage of the chain's current gas price paid at this tier.
    pub fn gas_price_percent(&self) -> u64 {
        match self {
            Urgency::Low => 80,
            Urgency::Medium => 100,
            Urgency::High => 120,
        }
    }

    /// Advisory expected confirmation time in seconds.
    pub fn confirmation_secs(&self) -> u64 {
        match self {
            Urgency::Low => 300,
            Urgency::Medium => 120,
            Urgency::High => 30,
        }
    }
}

impl FromStr for Urgency {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Urgency::Low),
            "medium" => Ok(Urgency::Medium),
            "high" => Ok(Urgency::High),
            other => anyhow::bail!("Unknown urgency '{}'", other),
        }
    }
}

/// Bridge transfer speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    #[default]
    Auto,
    Fast,
    Standard,
}

impl FromStr for TransferMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(TransferMode::Auto),
            "fast" => Ok(TransferMode::Fast),
            "standard" => Ok(TransferMode::Standard),
            other => anyhow::bail!("Unknown transfer mode '{}'", other),
        }
    }
}

/// A transaction the caller wants executed, plus routing preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionIntent {
    /// Target address (0x-prefixed, 20 bytes)
    pub to: String,
    /// Native value sent with the call, in wei
    #[serde(default)]
    pub value: Option<Amount>,
    /// Calldata (0x-prefixed hex)
    #[serde(default)]
    pub data: Option<String>,
    /// Gas limit override; estimated when absent
    #[serde(default)]
    pub gas_limit: Option<u64>,
    #[serde(default)]
    pub execute_on: ExecuteOn,
    #[serde(default)]
    pub pay_from: PayFrom,
    #[serde(default)]
    pub urgency: Urgency,
    #[serde(default)]
    pub transfer_mode: Option<TransferMode>,
}

impl TransactionIntent {
    /// Plain intent targeting `to` with optimizer defaults.
    pub fn new(to: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            value: None,
            data: None,
            gas_limit: None,
            execute_on: ExecuteOn::Optimal,
            pay_from: PayFrom::Auto,
            urgency: Urgency::Medium,
            transfer_mode: None,
        }
    }

    pub fn validate(&self) -> Result<(), OmnigasError> {
        if !is_valid_address(&self.to) {
            return Err(OmnigasError::InvalidIntent(format!(
                "target '{}' is not a 20-byte 0x address",
                self.to
            )));
        }
        if let Some(data) = &self.data {
            let stripped = data.strip_prefix("0x").ok_or_else(|| {
                OmnigasError::InvalidIntent("calldata must be 0x-prefixed hex".to_string())
            })?;
            if hex::decode(stripped).is_err() {
                return Err(OmnigasError::InvalidIntent("calldata is not valid hex".to_string()));
            }
        }
        if self.gas_limit == Some(0) {
            return Err(OmnigasError::InvalidIntent("gas limit must be positive".to_string()));
        }
        Ok(())
    }

    /// True when the intent carries no calldata (plain native transfer).
    pub fn is_plain_transfer(&self) -> bool {
        match &self.data {
            None => true,
            Some(d) => d == "0x" || d.is_empty(),
        }
    }

    pub fn transfer_mode(&self) -> TransferMode {
        self.transfer_mode.unwrap_or_default()
    }
}

// ============================================================================
// ROUTES
// ============================================================================

/// One candidate (execute-on, pay-from) pair with its cost and time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteOption {
    pub execute_on_chain: ChainId,
    pub pay_from_chain: ChainId,
    pub gas_cost: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bridge_cost: Option<Amount>,
    pub total_cost: Amount,
    pub estimated_time_seconds: u64,
    /// Resolved bridge mode for cross-chain routes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_mode: Option<TransferMode>,
}

impl RouteOption {
    /// Route paying on the execution chain itself.
    pub fn direct(chain: ChainId, gas_cost: Amount, estimated_time_seconds: u64) -> Self {
        Self {
            execute_on_chain: chain,
            pay_from_chain: chain,
            gas_cost,
            bridge_cost: None,
            total_cost: gas_cost,
            estimated_time_seconds,
            transfer_mode: None,
        }
    }

    /// Route bridging stablecoin from `pay_from` to `execute_on` first.
    pub fn cross_chain(
        execute_on: ChainId,
        pay_from: ChainId,
        gas_cost: Amount,
        bridge_cost: Amount,
        estimated_time_seconds: u64,
        transfer_mode: TransferMode,
    ) -> Self {
        Self {
            execute_on_chain: execute_on,
            pay_from_chain: pay_from,
            gas_cost,
            bridge_cost: Some(bridge_cost),
            total_cost: gas_cost.saturating_add(bridge_cost),
            estimated_time_seconds,
            transfer_mode: Some(transfer_mode),
        }
    }

    pub fn requires_bridge(&self) -> bool {
        self.pay_from_chain != self.execute_on_chain
    }
}

/// Human-readable recommendation accompanying a route analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub chain_id: ChainId,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_savings: Option<Amount>,
}

/// Result of route analysis: all viable routes best-first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteAnalysis {
    pub best_route: RouteOption,
    pub all_routes: Vec<RouteOption>,
    pub recommendation: Recommendation,
}

// ============================================================================
// BALANCES
// ============================================================================

/// Stablecoin balance on one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainBalance {
    pub chain_id: ChainId,
    pub balance: Amount,
}

/// Stablecoin balance across all supported chains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnifiedBalance {
    pub total_amount: Amount,
    pub per_chain: Vec<ChainBalance>,
    pub last_updated: chrono::DateTime<chrono::Utc>,
}

impl UnifiedBalance {
    /// Builds the aggregate, deriving `total_amount` from the entries.
    pub fn from_entries(per_chain: Vec<ChainBalance>, last_updated: chrono::DateTime<chrono::Utc>) -> Self {
        let total_amount = Amount::sum(per_chain.iter().map(|c| &c.balance));
        Self {
            total_amount,
            per_chain,
            last_updated,
        }
    }

    pub fn balance_on(&self, chain_id: ChainId) -> Amount {
        self.per_chain
            .iter()
            .find(|c| c.chain_id == chain_id)
            .map(|c| c.balance)
            .unwrap_or_default()
    }
}

// ============================================================================
// LIFECYCLE UPDATES
// ============================================================================

/// Phase of an end-to-end execution request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Bridging,
    Executing,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Completed | TransactionStatus::Failed)
    }
}

/// Machine-readable failure attached to a `failed` update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateError {
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

impl From<&OmnigasError> for UpdateError {
    fn from(err: &OmnigasError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

/// Lifecycle event emitted by the execution coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionUpdate {
    pub request_id: uuid::Uuid,
    pub status: TransactionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bridge_tx_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<UpdateError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_decimal_units() {
        assert_eq!(parse_decimal_units("3012.45", 6).unwrap(), U256::from(3_012_450_000u64));
        assert_eq!(parse_decimal_units("1", 6).unwrap(), U256::from(1_000_000u64));
        assert_eq!(parse_decimal_units("0.1234567", 6).unwrap(), U256::from(123_456u64));
        assert_eq!(parse_decimal_units("2.5e-1", 6).unwrap(), U256::from(250_000u64));
        assert_eq!(parse_decimal_units("1e3", 0).unwrap(), U256::from(1000u64));
        assert!(parse_decimal_units("-1", 6).is_err());
        assert!(parse_decimal_units("abc", 6).is_err());
    }

    #[test]
    fn test_mul_div_ceil_rounds_up() {
        assert_eq!(mul_div_ceil(U256::from(10), U256::from(1), U256::from(3)), U256::from(4));
        assert_eq!(mul_div_ceil(U256::from(9), U256::from(1), U256::from(3)), U256::from(3));
        assert_eq!(mul_div_ceil(U256::from(9), U256::from(1), U256::zero()), U256::zero());
    }

    #[test]
    fn test_amount_serde_as_decimal_string() {
        let amount = Amount::from(5_000_000u64);
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "\"5000000\"");
        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, amount);
        let from_number: Amount = serde_json::from_str("42").unwrap();
        assert_eq!(from_number, Amount::from(42u64));
    }

    #[test]
    fn test_selectors_deserialize_keywords_and_ids() {
        let intent: TransactionIntent = serde_json::from_str(
            r#"{"to":"0x000000000000000000000000000000000000000a","execute_on":"optimal","pay_from":8453}"#,
        )
        .unwrap();
        assert_eq!(intent.execute_on, ExecuteOn::Optimal);
        assert_eq!(intent.pay_from, PayFrom::Chain(ChainId(8453)));
        assert_eq!(intent.urgency, Urgency::Medium);
    }

    #[test]
    fn test_route_option_total_cost_identity() {
        let direct = RouteOption::direct(ChainId(1), Amount::from(100u64), 30);
        assert_eq!(direct.total_cost, direct.gas_cost);
        assert!(direct.bridge_cost.is_none());

        let cross = RouteOption::cross_chain(
            ChainId(1),
            ChainId(2),
            Amount::from(100u64),
            Amount::from(7u64),
            120,
            TransferMode::Fast,
        );
        assert_eq!(cross.total_cost, Amount::from(107u64));
        assert!(cross.requires_bridge());
    }

    #[test]
    fn test_intent_validation() {
        let mut intent = TransactionIntent::new("0x000000000000000000000000000000000000000a");
        assert!(intent.validate().is_ok());
        intent.data = Some("0xzz".to_string());
        assert!(intent.validate().is_err());
        intent.data = None;
        intent.to = "0x1234".to_string();
        assert!(intent.validate().is_err());
    }

    #[test]
    fn test_unified_balance_sums_entries() {
        let balance = UnifiedBalance::from_entries(
            vec![
                ChainBalance { chain_id: ChainId(1), balance: Amount::from(5u64) },
                ChainBalance { chain_id: ChainId(2), balance: Amount::from(7u64) },
            ],
            chrono::Utc::now(),
        );
        assert_eq!(balance.total_amount, Amount::from(12u64));
        assert_eq!(balance.balance_on(ChainId(2)), Amount::from(7u64));
        assert_eq!(balance.balance_on(ChainId(3)), Amount::zero());
    }
}
