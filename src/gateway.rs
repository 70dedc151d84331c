//! Ledger gateway trait
//!
//! The chain itself is an external collaborator. The relayer core only sees
//! this capability surface: create an account, read a balance, read the fee
//! rate, submit a transfer or contract call, await its confirmation, and
//! read the two contract views used by the stats endpoint. Signing lives
//! behind the gateway; the core only handles addresses.

use async_trait::async_trait;

use crate::errors::GatewayError;
use crate::types::{Address, Amount, PendingTx, TxHash};

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Fee budget attached to every submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeBudget {
    /// Hard gas ceiling for the transaction (a constant per variant).
    pub gas_limit: u64,
    /// Explicit fee rate; `None` lets the gateway pick its default.
    pub fee_rate: Option<Amount>,
}

impl FeeBudget {
    pub fn with_default_rate(gas_limit: u64) -> Self {
        Self {
            gas_limit,
            fee_rate: None,
        }
    }

    pub fn with_rate(gas_limit: u64, fee_rate: Amount) -> Self {
        Self {
            gas_limit,
            fee_rate: Some(fee_rate),
        }
    }
}

/// The closed set of stress-contract methods and their arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractCall {
    /// `stress(bytes data, uint256 callType, string note)` — payable.
    Stress {
        data: Vec<u8>,
        call_type: u8,
        note: String,
    },
    /// `stressMaybeRevert(uint256 n)` — may revert contract-side.
    StressMaybeRevert { n: u64 },
    /// `stressNumber(uint256 n)`.
    StressNumber { n: u64 },
    /// `stressString(string s)`.
    StressString { s: String },
}

impl ContractCall {
    pub fn method_name(&self) -> &'static str {
        match self {
            ContractCall::Stress { .. } => "stress",
            ContractCall::StressMaybeRevert { .. } => "stressMaybeRevert",
            ContractCall::StressNumber { .. } => "stressNumber",
            ContractCall::StressString { .. } => "stressString",
        }
    }
}

/// Capability surface of the ledger collaborator.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Address of the shared source (relayer) account.
    fn source_address(&self) -> Address;

    /// Address of the stress-test contract.
    fn contract_address(&self) -> Address;

    /// Create a fresh single-use account. The gateway keeps the key.
    async fn create_account(&self) -> GatewayResult<Address>;

    /// Read an account's current balance.
    async fn balance(&self, address: &Address) -> GatewayResult<Amount>;

    /// Read the current network fee rate. May fail; callers degrade to the
    /// gateway default instead of propagating.
    async fn fee_rate(&self) -> GatewayResult<Amount>;

    /// Submit a plain value transfer.
    async fn submit_transfer(
        &self,
        from: &Address,
        to: &Address,
        amount: Amount,
        fee: FeeBudget,
    ) -> GatewayResult<PendingTx>;

    /// Submit a contract method call, optionally attaching value.
    async fn call_contract(
        &self,
        from: &Address,
        call: ContractCall,
        value: Amount,
        fee: FeeBudget,
    ) -> GatewayResult<PendingTx>;

    /// Wait for a submitted transaction to be confirmed (or fail).
    async fn await_confirmation(&self, pending: PendingTx) -> GatewayResult<TxHash>;

    /// Contract view: total `stress*` invocations recorded on-chain.
    async fn call_count(&self) -> GatewayResult<u64>;

    /// Contract view: invocations attributed to one address.
    async fn user_calls(&self, address: &Address) -> GatewayResult<u64>;
}
