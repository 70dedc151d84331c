//! In-memory simulation gateway
//!
//! Stands in for the real ledger in simulation mode and in tests: an
//! in-memory balance ledger with configurable confirmation latency, fault
//! injection (failed fee lookups, failed submissions, frozen balances,
//! forced reverts) and the instrumentation the concurrency properties are
//! asserted against (in-flight source submissions, funding order, funding
//! time spans, balance read counts).

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::time::{sleep, Instant};

use crate::errors::GatewayError;
use crate::gateway::{ContractCall, FeeBudget, GatewayResult, LedgerGateway};
use crate::types::{Address, Amount, PendingTx, TxHash};

/// Default simulated network fee rate (1 gwei-scale).
const BASE_FEE_RATE: Amount = 1_000_000_000;

/// State change applied when a pending transaction confirms.
enum Effect {
    Transfer {
        from: Address,
        to: Address,
        amount: Amount,
    },
    ContractCall {
        caller: Address,
        value: Amount,
    },
}

struct PendingRecord {
    effect: Effect,
    outcome: Result<(), GatewayError>,
    from_source: bool,
    submitted_at: Instant,
}

pub struct SimGateway {
    source: Address,
    contract: Address,
    confirm_latency: Duration,
    /// `stressMaybeRevert(n)` reverts when `n % modulus == 0`.
    maybe_revert_modulus: Option<u64>,

    balances: DashMap<Address, Amount>,
    pending: DashMap<TxHash, PendingRecord>,
    call_count: AtomicU64,
    user_calls: DashMap<Address, u64>,

    // Fault injection
    fail_fee_rate: AtomicBool,
    freeze_balances: AtomicBool,
    failed_source_ordinals: Mutex<HashSet<u64>>,

    // Instrumentation
    source_submissions: AtomicU64,
    contract_submissions: AtomicU64,
    source_in_flight: AtomicU64,
    max_source_in_flight: AtomicU64,
    funding_order: Mutex<Vec<Address>>,
    funding_spans: Mutex<Vec<(Instant, Instant)>>,
    balance_read_counts: DashMap<Address, u64>,
}

impl SimGateway {
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();
        let source = Address::random(&mut rng);
        let contract = Address::random(&mut rng);
        let gateway = Self {
            source: source.clone(),
            contract,
            confirm_latency: Duration::ZERO,
            maybe_revert_modulus: None,
            balances: DashMap::new(),
            pending: DashMap::new(),
            call_count: AtomicU64::new(0),
            user_calls: DashMap::new(),
            fail_fee_rate: AtomicBool::new(false),
            freeze_balances: AtomicBool::new(false),
            failed_source_ordinals: Mutex::new(HashSet::new()),
            source_submissions: AtomicU64::new(0),
            contract_submissions: AtomicU64::new(0),
            source_in_flight: AtomicU64::new(0),
            max_source_in_flight: AtomicU64::new(0),
            funding_order: Mutex::new(Vec::new()),
            funding_spans: Mutex::new(Vec::new()),
            balance_read_counts: DashMap::new(),
        };
        // The source starts rich enough to fund any simulated run.
        gateway.balances.insert(source, 1_000_000_000_000_000_000_000);
        gateway
    }

    /// Delay between submission and confirmation.
    pub fn with_confirm_latency(mut self, latency: Duration) -> Self {
        self.confirm_latency = latency;
        self
    }

    /// Make `stressMaybeRevert(n)` revert when `n % modulus == 0`.
    pub fn with_maybe_revert_modulus(mut self, modulus: Option<u64>) -> Self {
        self.maybe_revert_modulus = modulus;
        self
    }

    /// Make every fee-rate lookup fail.
    pub fn set_fail_fee_rate(&self, fail: bool) {
        self.fail_fee_rate.store(fail, Ordering::SeqCst);
    }

    /// Stop confirmed transactions from moving balances, so funded wallets
    /// never reach their threshold.
    pub fn set_freeze_balances(&self, freeze: bool) {
        self.freeze_balances.store(freeze, Ordering::SeqCst);
    }

    /// Reject the n-th (1-based) submission from the source account.
    pub fn fail_funding_submission(&self, ordinal: u64) {
        self.failed_source_ordinals.lock().insert(ordinal);
    }

    /// Test helper: mint an account with a preset balance.
    pub fn create_funded_account(&self, amount: Amount) -> Address {
        let address = Address::random(&mut rand::thread_rng());
        self.balances.insert(address.clone(), amount);
        address
    }

    /// Test helper: credit an account directly.
    pub fn credit(&self, address: &Address, amount: Amount) {
        *self.balances.entry(address.clone()).or_insert(0) += amount;
    }

    pub fn base_fee_rate(&self) -> Amount {
        BASE_FEE_RATE
    }

    /// Targets of source-account transfers, in submission order.
    pub fn funding_order(&self) -> Vec<Address> {
        self.funding_order.lock().clone()
    }

    /// (submitted, confirmed) spans of source-account transfers.
    pub fn funding_spans(&self) -> Vec<(Instant, Instant)> {
        self.funding_spans.lock().clone()
    }

    /// Highest number of source-account submissions ever in flight at once.
    pub fn max_source_in_flight(&self) -> u64 {
        self.max_source_in_flight.load(Ordering::SeqCst)
    }

    /// Total submissions attempted from the source account.
    pub fn source_submissions(&self) -> u64 {
        self.source_submissions.load(Ordering::SeqCst)
    }

    /// Total contract-call submissions.
    pub fn contract_submissions(&self) -> u64 {
        self.contract_submissions.load(Ordering::SeqCst)
    }

    /// Balance reads observed for one address.
    pub fn balance_reads(&self, address: &Address) -> u64 {
        self.balance_read_counts
            .get(address)
            .map(|c| *c)
            .unwrap_or(0)
    }

    fn register_pending(
        &self,
        effect: Effect,
        outcome: Result<(), GatewayError>,
        from_source: bool,
    ) -> PendingTx {
        let hash = TxHash::random(&mut rand::thread_rng());
        self.pending.insert(
            hash.clone(),
            PendingRecord {
                effect,
                outcome,
                from_source,
                submitted_at: Instant::now(),
            },
        );
        PendingTx { hash }
    }

    fn apply_effect(&self, effect: &Effect) {
        if self.freeze_balances.load(Ordering::SeqCst) {
            return;
        }
        match effect {
            Effect::Transfer { from, to, amount } => {
                if let Some(mut balance) = self.balances.get_mut(from) {
                    *balance = balance.saturating_sub(*amount);
                }
                *self.balances.entry(to.clone()).or_insert(0) += amount;
            }
            Effect::ContractCall { caller, value } => {
                if *value > 0 {
                    if let Some(mut balance) = self.balances.get_mut(caller) {
                        *balance = balance.saturating_sub(*value);
                    }
                }
                self.call_count.fetch_add(1, Ordering::SeqCst);
                *self.user_calls.entry(caller.clone()).or_insert(0) += 1;
            }
        }
    }
}

impl Default for SimGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerGateway for SimGateway {
    fn source_address(&self) -> Address {
        self.source.clone()
    }

    fn contract_address(&self) -> Address {
        self.contract.clone()
    }

    async fn create_account(&self) -> GatewayResult<Address> {
        Ok(self.create_funded_account(0))
    }

    async fn balance(&self, address: &Address) -> GatewayResult<Amount> {
        *self
            .balance_read_counts
            .entry(address.clone())
            .or_insert(0) += 1;
        Ok(self.balances.get(address).map(|b| *b).unwrap_or(0))
    }

    async fn fee_rate(&self) -> GatewayResult<Amount> {
        if self.fail_fee_rate.load(Ordering::SeqCst) {
            return Err(GatewayError::FeeRateUnavailable(
                "simulated lookup failure".into(),
            ));
        }
        Ok(BASE_FEE_RATE)
    }

    async fn submit_transfer(
        &self,
        from: &Address,
        to: &Address,
        amount: Amount,
        _fee: FeeBudget,
    ) -> GatewayResult<PendingTx> {
        let from_source = *from == self.source;
        if from_source {
            let ordinal = self.source_submissions.fetch_add(1, Ordering::SeqCst) + 1;
            if self.failed_source_ordinals.lock().remove(&ordinal) {
                return Err(GatewayError::Rejected(format!(
                    "simulated rejection of source submission #{}",
                    ordinal
                )));
            }
            let in_flight = self.source_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_source_in_flight
                .fetch_max(in_flight, Ordering::SeqCst);
            self.funding_order.lock().push(to.clone());
        }
        Ok(self.register_pending(
            Effect::Transfer {
                from: from.clone(),
                to: to.clone(),
                amount,
            },
            Ok(()),
            from_source,
        ))
    }

    async fn call_contract(
        &self,
        from: &Address,
        call: ContractCall,
        value: Amount,
        _fee: FeeBudget,
    ) -> GatewayResult<PendingTx> {
        self.contract_submissions.fetch_add(1, Ordering::SeqCst);
        let outcome = match (&call, self.maybe_revert_modulus) {
            (ContractCall::StressMaybeRevert { n }, Some(modulus))
                if modulus > 0 && n % modulus == 0 =>
            {
                Err(GatewayError::Reverted(format!(
                    "stressMaybeRevert({}) rejected by contract",
                    n
                )))
            }
            _ => Ok(()),
        };
        Ok(self.register_pending(
            Effect::ContractCall {
                caller: from.clone(),
                value,
            },
            outcome,
            false,
        ))
    }

    async fn await_confirmation(&self, pending: PendingTx) -> GatewayResult<TxHash> {
        let (hash, record) = self
            .pending
            .remove(&pending.hash)
            .ok_or_else(|| GatewayError::Transport("unknown pending transaction".into()))?;

        if !self.confirm_latency.is_zero() {
            sleep(self.confirm_latency).await;
        }

        if record.from_source {
            self.source_in_flight.fetch_sub(1, Ordering::SeqCst);
            self.funding_spans
                .lock()
                .push((record.submitted_at, Instant::now()));
        }

        match record.outcome {
            Ok(()) => {
                self.apply_effect(&record.effect);
                Ok(hash)
            }
            Err(err) => Err(err),
        }
    }

    async fn call_count(&self) -> GatewayResult<u64> {
        Ok(self.call_count.load(Ordering::SeqCst))
    }

    async fn user_calls(&self, address: &Address) -> GatewayResult<u64> {
        Ok(self.user_calls.get(address).map(|c| *c).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn transfers_move_balances_on_confirmation() {
        let gateway = SimGateway::new();
        let from = gateway.create_funded_account(1_000);
        let to = gateway.create_funded_account(0);

        let pending = gateway
            .submit_transfer(&from, &to, 400, FeeBudget::with_default_rate(21_000))
            .await
            .unwrap();
        // Nothing moves before confirmation.
        assert_eq!(gateway.balance(&to).await.unwrap(), 0);

        gateway.await_confirmation(pending).await.unwrap();
        assert_eq!(gateway.balance(&to).await.unwrap(), 400);
        assert_eq!(gateway.balance(&from).await.unwrap(), 600);
    }

    #[tokio::test]
    async fn frozen_balances_never_rise() {
        let gateway = SimGateway::new();
        gateway.set_freeze_balances(true);
        let to = gateway.create_funded_account(0);
        let source = gateway.source_address();

        let pending = gateway
            .submit_transfer(&source, &to, 400, FeeBudget::with_default_rate(21_000))
            .await
            .unwrap();
        gateway.await_confirmation(pending).await.unwrap();
        assert_eq!(gateway.balance(&to).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn contract_calls_bump_the_view_counters() {
        let gateway = SimGateway::new();
        let caller = gateway.create_funded_account(1_000);

        let pending = gateway
            .call_contract(
                &caller,
                ContractCall::StressNumber { n: 5 },
                0,
                FeeBudget::with_default_rate(100_000),
            )
            .await
            .unwrap();
        gateway.await_confirmation(pending).await.unwrap();

        assert_eq!(gateway.call_count().await.unwrap(), 1);
        assert_eq!(gateway.user_calls(&caller).await.unwrap(), 1);
        assert_eq!(gateway.user_calls(&gateway.source_address()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unknown_pending_handles_are_rejected() {
        let gateway = SimGateway::new();
        let bogus = PendingTx {
            hash: TxHash::from_hex("0xdead"),
        };
        assert!(gateway.await_confirmation(bogus).await.is_err());
    }
}
