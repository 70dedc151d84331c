//! Ephemeral-wallet stress relayer
//!
//! Drives synthetic transaction traffic against a single stress-test
//! contract through single-use wallets, each funded on demand from one
//! shared source account. The concurrency discipline lives here: funding
//! is strictly serialized (`funding`), operation starts are globally
//! rate-gated (`rate_gate`), balance confirmation is a bounded per-request
//! poll (`poller`), and dispatch picks one of five transaction variants
//! uniformly at random (`dispatcher`). The chain itself is behind the
//! `gateway::LedgerGateway` trait; `sim` provides the in-memory
//! simulation-mode implementation.

pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod funding;
pub mod gateway;
pub mod metrics;
pub mod poller;
pub mod rate_gate;
pub mod relayer;
pub mod sim;
pub mod types;

pub use config::Config;
pub use dispatcher::{Dispatcher, StressVariant};
pub use errors::{GatewayError, StressError};
pub use funding::FundingSerializer;
pub use gateway::{ContractCall, FeeBudget, LedgerGateway};
pub use poller::{BalancePoller, PollOutcome};
pub use rate_gate::StartGate;
pub use relayer::Relayer;
pub use sim::SimGateway;
pub use types::{
    Address, Amount, ContractStats, HealthReport, StressOutcome, StressRequest, TxHash,
};
