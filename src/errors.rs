//! Error types for the stress relayer
//!
//! Two layers: `GatewayError` covers failures of the external ledger
//! collaborator, `StressError` is the taxonomy a single stress request can
//! terminate with. Everything in `StressError` is converted into a failed
//! `StressOutcome` at the orchestrator boundary; nothing here is fatal to
//! the process.

use std::time::Duration;
use thiserror::Error;

use crate::types::Amount;

/// Failures of the ledger gateway collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The fee-rate lookup failed. Recovered locally by falling back to the
    /// gateway-chosen default; never surfaced to the request's caller.
    #[error("fee rate unavailable: {0}")]
    FeeRateUnavailable(String),

    /// The node rejected the submission outright (bad params, underpriced,
    /// insufficient source balance).
    #[error("submission rejected: {0}")]
    Rejected(String),

    /// The transaction was mined but reverted. For `stressMaybeRevert` this
    /// is an expected outcome, not an exceptional one.
    #[error("transaction reverted: {0}")]
    Reverted(String),

    /// The gateway gave up waiting for inclusion.
    #[error("confirmation timed out: {0}")]
    ConfirmationTimeout(String),

    /// Transport-level RPC failure.
    #[error("rpc transport error: {0}")]
    Transport(String),
}

/// Terminal failure of one stress request.
#[derive(Error, Debug)]
pub enum StressError {
    /// Malformed correlation indices; rejected before any funding work.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The ephemeral wallet's balance never reached the confirmation
    /// threshold within the poll bound.
    #[error(
        "ephemeral wallet did not receive sufficient funds in time \
         (last balance {last_balance}, {attempts} polls)"
    )]
    FundingTimeout { last_balance: Amount, attempts: u32 },

    /// The serialized funding transfer failed to submit or confirm. Hard
    /// failure for this request only; the funding queue keeps going.
    #[error("funding submission failed: {0}")]
    FundingSubmission(#[source] GatewayError),

    /// The dispatched stress transaction failed to submit or confirm.
    #[error("stress transaction failed: {0}")]
    TransactionFailed(#[source] GatewayError),

    /// The funding serializer's worker is gone (shutdown).
    #[error("funding queue closed")]
    QueueClosed,

    /// The request-level overall deadline elapsed.
    #[error("request deadline exceeded after {0:?}")]
    DeadlineExceeded(Duration),

    /// Any other gateway failure reaching the orchestrator (e.g. account
    /// creation).
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn funding_submission_keeps_underlying_message() {
        let err = StressError::FundingSubmission(GatewayError::Rejected("nonce too low".into()));
        let msg = err.to_string();
        assert!(msg.contains("funding submission failed"));
        assert!(msg.contains("nonce too low"));
    }

    #[test]
    fn gateway_errors_convert_into_stress_errors() {
        let err: StressError = GatewayError::Transport("connection refused".into()).into();
        assert!(matches!(err, StressError::Gateway(_)));
    }
}
