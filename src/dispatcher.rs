//! Randomized transaction dispatcher
//!
//! Once an ephemeral wallet is funded and confirmed, exactly one stress
//! transaction is sent from it: one of five variants chosen uniformly at
//! random. Four exercise the stress contract, the fifth is a plain value
//! transfer to a random address. Selection takes an injectable `Rng` so
//! tests can pin or sample it deterministically.
//!
//! Each variant carries a fixed gas ceiling; budgets are constants, never
//! computed.

use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::debug;

use crate::errors::StressError;
use crate::gateway::{ContractCall, FeeBudget, LedgerGateway};
use crate::metrics::metrics;
use crate::types::{format_units, Address, Amount, TxHash};

/// Gas ceiling for the payable `stress(bytes,uint256,string)` call.
pub const PAYLOAD_GAS_LIMIT: u64 = 150_000;
/// Gas ceiling for the three simple contract calls.
pub const SIMPLE_CALL_GAS_LIMIT: u64 = 100_000;
/// Gas ceiling for a plain value transfer.
pub const TRANSFER_GAS_LIMIT: u64 = 21_000;

/// Probability that the payload variant attaches value.
const VALUE_ATTACH_PROBABILITY: f64 = 0.3;

const PAYLOAD_MIN_BYTES: usize = 16;
const PAYLOAD_MAX_BYTES: usize = 80;
const MAYBE_REVERT_RANGE: u64 = 1_000_000;
const NUMBER_RANGE: u64 = 1_000_000_000;
const TEXT_MIN_LEN: usize = 5;
const TEXT_MAX_LEN: usize = 24;

/// The closed set of stress transaction shapes, with parameters already
/// generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StressVariant {
    /// Structured contract call with a random byte payload; sometimes
    /// carries value.
    Payload {
        data: Vec<u8>,
        call_type: u8,
        note: String,
        value: Amount,
    },
    /// Numeric call the contract may reject; rejection is expected.
    MaybeRevert { n: u64 },
    /// Numeric call, larger range.
    Number { n: u64 },
    /// String call with a random alphanumeric argument.
    Text { s: String },
    /// Plain value transfer to a random address, bypassing the contract.
    Transfer { to: Address, value: Amount },
}

impl StressVariant {
    /// Pick one of the five variants uniformly at random and generate its
    /// parameters. `value_amount` bounds the value attached by the
    /// value-bearing variants.
    pub fn choose(rng: &mut impl Rng, value_amount: Amount) -> Self {
        match rng.gen_range(0..5) {
            0 => {
                let len = rng.gen_range(PAYLOAD_MIN_BYTES..=PAYLOAD_MAX_BYTES);
                let mut data = vec![0u8; len];
                rng.fill_bytes(&mut data);
                let call_type = rng.gen_range(0..4u8);
                let note = format!("Stress test {}", chrono::Utc::now().timestamp_millis());
                let value = if rng.gen_bool(VALUE_ATTACH_PROBABILITY) {
                    value_amount
                } else {
                    0
                };
                StressVariant::Payload {
                    data,
                    call_type,
                    note,
                    value,
                }
            }
            1 => StressVariant::MaybeRevert {
                n: rng.gen_range(0..MAYBE_REVERT_RANGE),
            },
            2 => StressVariant::Number {
                n: rng.gen_range(0..NUMBER_RANGE),
            },
            3 => {
                let len = rng.gen_range(TEXT_MIN_LEN..=TEXT_MAX_LEN);
                let s: String = rng
                    .sample_iter(&Alphanumeric)
                    .take(len)
                    .map(char::from)
                    .collect();
                StressVariant::Text { s }
            }
            _ => StressVariant::Transfer {
                to: Address::random(rng),
                value: rng.gen_range(1..=value_amount.max(1)),
            },
        }
    }

    /// Short label for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            StressVariant::Payload { .. } => "stress",
            StressVariant::MaybeRevert { .. } => "stressMaybeRevert",
            StressVariant::Number { .. } => "stressNumber",
            StressVariant::Text { .. } => "stressString",
            StressVariant::Transfer { .. } => "transfer",
        }
    }

    /// Human-facing description carried back in the outcome: the variant
    /// and its key parameters. The only per-operation audit trail.
    pub fn describe(&self) -> String {
        match self {
            StressVariant::Payload {
                call_type, note, ..
            } => format!("stress({}, \"{}\")", call_type, note),
            StressVariant::MaybeRevert { n } => format!("stressMaybeRevert({})", n),
            StressVariant::Number { n } => format!("stressNumber({})", n),
            StressVariant::Text { s } => format!("stressString(\"{}\")", s),
            StressVariant::Transfer { value, .. } => {
                format!("transfer({} OMEGA)", format_units(*value))
            }
        }
    }

    pub fn gas_limit(&self) -> u64 {
        match self {
            StressVariant::Payload { .. } => PAYLOAD_GAS_LIMIT,
            StressVariant::MaybeRevert { .. }
            | StressVariant::Number { .. }
            | StressVariant::Text { .. } => SIMPLE_CALL_GAS_LIMIT,
            StressVariant::Transfer { .. } => TRANSFER_GAS_LIMIT,
        }
    }
}

/// Submits one chosen variant from a funded ephemeral wallet and waits for
/// its confirmation.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher;

impl Dispatcher {
    pub fn new() -> Self {
        Self
    }

    /// Submit the variant's single transaction and await confirmation.
    ///
    /// Returns the confirmed hash and the variant description. A revert is
    /// surfaced as `TransactionFailed`, never as a panic or retry.
    pub async fn dispatch(
        &self,
        gateway: &dyn LedgerGateway,
        from: &Address,
        variant: StressVariant,
    ) -> Result<(TxHash, String), StressError> {
        let description = variant.describe();
        let label = variant.label();
        let fee = FeeBudget::with_default_rate(variant.gas_limit());
        debug!("dispatching {} from {}", description, from);

        let pending = match variant {
            StressVariant::Payload {
                data,
                call_type,
                note,
                value,
            } => {
                let call = ContractCall::Stress {
                    data,
                    call_type,
                    note,
                };
                gateway.call_contract(from, call, value, fee).await
            }
            StressVariant::MaybeRevert { n } => {
                gateway
                    .call_contract(from, ContractCall::StressMaybeRevert { n }, 0, fee)
                    .await
            }
            StressVariant::Number { n } => {
                gateway
                    .call_contract(from, ContractCall::StressNumber { n }, 0, fee)
                    .await
            }
            StressVariant::Text { s } => {
                gateway
                    .call_contract(from, ContractCall::StressString { s }, 0, fee)
                    .await
            }
            StressVariant::Transfer { to, value } => {
                gateway.submit_transfer(from, &to, value, fee).await
            }
        }
        .map_err(StressError::TransactionFailed)?;

        let hash = gateway
            .await_confirmation(pending)
            .await
            .map_err(StressError::TransactionFailed)?;

        metrics().dispatches.with_label_values(&[label]).inc();
        Ok((hash, description))
    }
}
