//! Common types used throughout the relayer

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::StressError;

/// Ledger amounts in the chain's smallest unit (wei-scale, 18 decimals).
pub type Amount = u128;

/// Number of smallest units per display unit.
pub const UNITS_PER_TOKEN: Amount = 1_000_000_000_000_000_000;

/// A 20-byte account address, hex-encoded with a `0x` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    /// Wrap an existing hex address string.
    pub fn from_hex(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Generate a random 20-byte address.
    pub fn random(rng: &mut impl rand::Rng) -> Self {
        let mut bytes = [0u8; 20];
        rng.fill_bytes(&mut bytes);
        Self(format!("0x{}", hex::encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A 32-byte transaction hash, hex-encoded with a `0x` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHash(String);

impl TxHash {
    pub fn from_hex(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Generate a random 32-byte hash.
    pub fn random(rng: &mut impl rand::Rng) -> Self {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        Self(format!("0x{}", hex::encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle to a submitted-but-unconfirmed transaction.
///
/// Returned by the gateway's submit calls; redeemed for the final hash
/// via `await_confirmation`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PendingTx {
    pub hash: TxHash,
}

/// One inbound stress-test request.
///
/// The indices are caller-supplied correlation ids and are echoed back
/// verbatim in the outcome; they carry no meaning inside the relayer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StressRequest {
    pub wallet_index: i64,
    pub tx_index: i64,
}

impl StressRequest {
    pub fn new(wallet_index: i64, tx_index: i64) -> Self {
        Self {
            wallet_index,
            tx_index,
        }
    }

    /// Reject malformed correlation indices before any funding work starts.
    pub fn validate(&self) -> Result<(), StressError> {
        if self.wallet_index < 0 || self.tx_index < 0 {
            return Err(StressError::InvalidRequest(format!(
                "correlation indices must be non-negative (wallet_index={}, tx_index={})",
                self.wallet_index, self.tx_index
            )));
        }
        Ok(())
    }
}

/// Final result of one stress-test request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressOutcome {
    pub success: bool,
    pub wallet_index: i64,
    pub tx_index: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<TxHash>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ephemeral_address: Option<Address>,
    /// Human-readable description of the dispatched variant and its key
    /// parameters, e.g. `stressNumber(42)`. The per-operation audit trail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StressOutcome {
    pub fn succeeded(
        request: &StressRequest,
        tx_hash: TxHash,
        ephemeral_address: Address,
        method: String,
    ) -> Self {
        Self {
            success: true,
            wallet_index: request.wallet_index,
            tx_index: request.tx_index,
            tx_hash: Some(tx_hash),
            ephemeral_address: Some(ephemeral_address),
            method: Some(method),
            error: None,
        }
    }

    pub fn failed(
        request: &StressRequest,
        ephemeral_address: Option<Address>,
        error: &StressError,
    ) -> Self {
        Self {
            success: false,
            wallet_index: request.wallet_index,
            tx_index: request.tx_index,
            tx_hash: None,
            ephemeral_address,
            method: None,
            error: Some(error.to_string()),
        }
    }
}

/// Phases of the per-request state machine, in transition order.
///
/// Transitions are strictly forward; a request terminates in either
/// `Completed` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Created,
    RateLimited,
    Funding,
    AwaitingBalance,
    Dispatching,
    Completed,
    Failed,
}

impl fmt::Display for RequestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequestPhase::Created => "created",
            RequestPhase::RateLimited => "rate_limited",
            RequestPhase::Funding => "funding",
            RequestPhase::AwaitingBalance => "awaiting_balance",
            RequestPhase::Dispatching => "dispatching",
            RequestPhase::Completed => "completed",
            RequestPhase::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Read-only contract statistics (`call_count` / `user_calls` views).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractStats {
    pub total_calls: u64,
    pub relayer_calls: u64,
    pub contract_address: Address,
}

/// Liveness report for the relayer process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    /// ISO-8601 timestamp of the report.
    pub timestamp: String,
    pub source_address: Address,
    pub contract_address: Address,
}

/// Render an `Amount` in display units, trimming trailing zeros
/// (e.g. `500_000_000_000_000` -> `"0.0005"`).
pub fn format_units(amount: Amount) -> String {
    let whole = amount / UNITS_PER_TOKEN;
    let frac = amount % UNITS_PER_TOKEN;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{:018}", frac);
    let frac = frac.trim_end_matches('0');
    format!("{}.{}", whole, frac)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn address_is_prefixed_20_byte_hex() {
        let mut rng = StdRng::seed_from_u64(7);
        let addr = Address::random(&mut rng);
        assert!(addr.as_str().starts_with("0x"));
        assert_eq!(addr.as_str().len(), 42);
    }

    #[test]
    fn request_validation_rejects_negative_indices() {
        assert!(StressRequest::new(0, 0).validate().is_ok());
        assert!(StressRequest::new(-1, 0).validate().is_err());
        assert!(StressRequest::new(0, -3).validate().is_err());
    }

    #[test]
    fn outcome_echoes_correlation_indices() {
        let request = StressRequest::new(3, 9);
        let outcome =
            StressOutcome::failed(&request, None, &StressError::InvalidRequest("x".into()));
        assert!(!outcome.success);
        assert_eq!(outcome.wallet_index, 3);
        assert_eq!(outcome.tx_index, 9);
        assert!(outcome.error.is_some());
    }

    #[test]
    fn format_units_trims_trailing_zeros() {
        assert_eq!(format_units(0), "0");
        assert_eq!(format_units(UNITS_PER_TOKEN), "1");
        assert_eq!(format_units(500_000_000_000_000), "0.0005");
        assert_eq!(
            format_units(2 * UNITS_PER_TOKEN + 500_000_000_000_000),
            "2.0005"
        );
    }
}
