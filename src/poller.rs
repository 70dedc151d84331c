//! Balance confirmation poller
//!
//! After a funding transfer confirms, each request waits for the ephemeral
//! wallet's balance to cross the confirmation threshold. The wait is a
//! bounded loop: at most `max_attempts` balance reads, a fixed interval
//! apart, so no request can hang on this step. Pollers are per-request and
//! fully independent; only the funding step upstream is serialized.

use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::config::PollConfig;
use crate::gateway::LedgerGateway;
use crate::metrics::metrics;
use crate::types::{Address, Amount};

/// How often a progress signal is surfaced while still waiting.
const PROGRESS_EVERY: u32 = 5;

/// Terminal state of one polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    pub confirmed: bool,
    pub last_balance: Amount,
    /// Balance reads actually performed (== `max_attempts` on failure).
    pub attempts: u32,
}

#[derive(Debug, Clone)]
pub struct BalancePoller {
    max_attempts: u32,
    interval: Duration,
}

impl BalancePoller {
    pub fn new(config: &PollConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            interval: Duration::from_millis(config.interval_ms),
        }
    }

    /// Poll until `address` holds at least `threshold`, or the attempt
    /// bound is reached.
    ///
    /// A failed balance read counts as an attempt that observed nothing;
    /// the loop keeps polling rather than propagating the read error.
    pub async fn wait_for_balance(
        &self,
        gateway: &dyn LedgerGateway,
        address: &Address,
        threshold: Amount,
    ) -> PollOutcome {
        let mut last_balance: Amount = 0;
        for attempt in 1..=self.max_attempts {
            metrics().balance_polls.inc();
            match gateway.balance(address).await {
                Ok(balance) => {
                    last_balance = balance;
                    if balance >= threshold {
                        debug!(
                            "balance confirmed for {} after {} polls ({})",
                            address, attempt, balance
                        );
                        return PollOutcome {
                            confirmed: true,
                            last_balance,
                            attempts: attempt,
                        };
                    }
                }
                Err(err) => {
                    debug!("balance read failed for {} (attempt {}): {}", address, attempt, err);
                }
            }

            if attempt % PROGRESS_EVERY == 0 {
                metrics().funding_wait_progress.inc();
                info!(
                    "waiting for ephemeral wallet funding... ({} polls)",
                    attempt
                );
            }
            if attempt < self.max_attempts {
                sleep(self.interval).await;
            }
        }

        PollOutcome {
            confirmed: false,
            last_balance,
            attempts: self.max_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimGateway;
    use tokio::time::Instant;

    fn poller(max_attempts: u32, interval_ms: u64) -> BalancePoller {
        BalancePoller::new(&PollConfig {
            max_attempts,
            interval_ms,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn confirms_immediately_when_balance_is_already_there() {
        let gateway = SimGateway::new();
        let address = gateway.create_funded_account(5_000);

        let outcome = poller(20, 2_000)
            .wait_for_balance(&gateway, &address, 1_000)
            .await;
        assert!(outcome.confirmed);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.last_balance, 5_000);
        assert_eq!(gateway.balance_reads(&address), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_exactly_max_attempts_reads() {
        let gateway = SimGateway::new();
        let address = gateway.create_funded_account(0);
        let interval = Duration::from_millis(2_000);

        let started = Instant::now();
        let outcome = poller(20, 2_000)
            .wait_for_balance(&gateway, &address, 1_000)
            .await;
        let elapsed = started.elapsed();

        assert!(!outcome.confirmed);
        assert_eq!(outcome.attempts, 20);
        assert_eq!(outcome.last_balance, 0);
        assert_eq!(gateway.balance_reads(&address), 20);
        // 20 reads, 19 sleeps between them.
        assert_eq!(elapsed, interval * 19);
    }

    #[tokio::test(start_paused = true)]
    async fn confirms_once_the_balance_crosses_the_threshold() {
        let gateway = std::sync::Arc::new(SimGateway::new());
        let address = gateway.create_funded_account(0);

        let credit_gateway = gateway.clone();
        let credit_address = address.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(4_500)).await;
            credit_gateway.credit(&credit_address, 2_000);
        });

        let outcome = poller(20, 2_000)
            .wait_for_balance(gateway.as_ref(), &address, 1_000)
            .await;
        assert!(outcome.confirmed);
        assert_eq!(outcome.attempts, 4);
        assert_eq!(outcome.last_balance, 2_000);
    }
}
