//! Funding serializer
//!
//! The source account is the system's single serialization bottleneck: the
//! ledger orders its transactions per-account, so two outstanding transfers
//! with ambiguous ordering risk nonce collisions. All funding goes through
//! one worker task owning a FIFO job channel; job N+1 is not submitted
//! until job N has confirmed.
//!
//! Fee policy: the rate is fetched fresh per job and boosted +20% over the
//! observed baseline to bias toward fast inclusion. A failed lookup
//! degrades to the gateway-chosen default instead of failing the job.
//!
//! A job that fails to submit or confirm rejects only its own waiter; the
//! worker continues with the next queued job.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::FundingConfig;
use crate::errors::StressError;
use crate::gateway::{FeeBudget, LedgerGateway};
use crate::metrics::metrics;
use crate::types::{Address, Amount, TxHash};

/// One enqueued transfer from the source account to an ephemeral wallet.
struct FundingJob {
    target: Address,
    amount: Amount,
    /// Pre-fetched fee rate, already boosted. `None` means the worker
    /// fetches one itself.
    fee_hint: Option<Amount>,
    done: oneshot::Sender<Result<TxHash, StressError>>,
}

/// Handle to the single-flight funding worker.
///
/// Cloneable; dropping every handle closes the queue and lets the worker
/// drain and exit.
#[derive(Clone)]
pub struct FundingSerializer {
    jobs: mpsc::Sender<FundingJob>,
}

impl FundingSerializer {
    /// Spawn the worker task and return its handle.
    pub fn spawn(gateway: Arc<dyn LedgerGateway>, config: FundingConfig) -> Self {
        let (jobs, rx) = mpsc::channel(config.queue_depth);
        tokio::spawn(run_worker(gateway, config, rx));
        Self { jobs }
    }

    /// Enqueue a funding transfer and wait until it is confirmed.
    ///
    /// Resolves in enqueue order; an error resolves only this caller's job.
    pub async fn fund(&self, target: Address, amount: Amount) -> Result<TxHash, StressError> {
        self.fund_with_fee_hint(target, amount, None).await
    }

    /// Enqueue a funding transfer with an explicit boosted fee rate.
    pub async fn fund_with_fee_hint(
        &self,
        target: Address,
        amount: Amount,
        fee_hint: Option<Amount>,
    ) -> Result<TxHash, StressError> {
        let (done, wait) = oneshot::channel();
        let job = FundingJob {
            target,
            amount,
            fee_hint,
            done,
        };
        metrics().funding_queue_depth.inc();
        if self.jobs.send(job).await.is_err() {
            metrics().funding_queue_depth.dec();
            return Err(StressError::QueueClosed);
        }
        wait.await.map_err(|_| StressError::QueueClosed)?
    }
}

async fn run_worker(
    gateway: Arc<dyn LedgerGateway>,
    config: FundingConfig,
    mut jobs: mpsc::Receiver<FundingJob>,
) {
    debug!("funding worker started");
    while let Some(job) = jobs.recv().await {
        let target = job.target.clone();
        let result = execute_job(gateway.as_ref(), &config, &job).await;
        metrics().funding_queue_depth.dec();
        match &result {
            Ok(hash) => {
                metrics().funding_submitted.inc();
                info!("funded ephemeral wallet {} (tx: {})", target, hash);
            }
            Err(err) => {
                metrics().funding_failed.inc();
                warn!("funding job for {} failed: {}", target, err);
            }
        }
        // The waiter may have abandoned the request (deadline); fine either way.
        let _ = job.done.send(result);
    }
    debug!("funding worker stopped");
}

async fn execute_job(
    gateway: &dyn LedgerGateway,
    config: &FundingConfig,
    job: &FundingJob,
) -> Result<TxHash, StressError> {
    let fee_rate = match job.fee_hint {
        Some(rate) => Some(rate),
        None => boosted_fee_rate(gateway, config).await,
    };
    let fee = match fee_rate {
        Some(rate) => FeeBudget::with_rate(config.gas_limit, rate),
        None => FeeBudget::with_default_rate(config.gas_limit),
    };

    let source = gateway.source_address();
    let pending = gateway
        .submit_transfer(&source, &job.target, job.amount, fee)
        .await
        .map_err(StressError::FundingSubmission)?;
    gateway
        .await_confirmation(pending)
        .await
        .map_err(StressError::FundingSubmission)
}

/// Fetch the current fee rate and boost it; `None` on lookup failure so the
/// job falls back to the gateway default (degrade, not fail).
pub async fn boosted_fee_rate(
    gateway: &dyn LedgerGateway,
    config: &FundingConfig,
) -> Option<Amount> {
    match gateway.fee_rate().await {
        Ok(base) => Some(apply_boost(
            base,
            config.fee_boost_numerator,
            config.fee_boost_denominator,
        )),
        Err(err) => {
            debug!("fee rate lookup failed, using gateway default: {}", err);
            None
        }
    }
}

fn apply_boost(base: Amount, numerator: u32, denominator: u32) -> Amount {
    if denominator == 0 {
        return base;
    }
    base.saturating_mul(numerator as Amount) / denominator as Amount
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimGateway;

    fn test_config() -> FundingConfig {
        FundingConfig::default()
    }

    #[test]
    fn boost_is_twenty_percent() {
        assert_eq!(apply_boost(10, 12, 10), 12);
        assert_eq!(apply_boost(1_000_000_000, 12, 10), 1_200_000_000);
        assert_eq!(apply_boost(5, 0, 0), 5);
    }

    #[tokio::test]
    async fn fee_lookup_failure_degrades_to_default() {
        let gateway = SimGateway::new();
        gateway.set_fail_fee_rate(true);
        assert_eq!(boosted_fee_rate(&gateway, &test_config()).await, None);

        gateway.set_fail_fee_rate(false);
        let boosted = boosted_fee_rate(&gateway, &test_config()).await;
        assert_eq!(boosted, Some(apply_boost(gateway.base_fee_rate(), 12, 10)));
    }

    #[tokio::test(start_paused = true)]
    async fn jobs_confirm_in_enqueue_order_one_at_a_time() {
        let gateway = Arc::new(
            SimGateway::new().with_confirm_latency(std::time::Duration::from_millis(50)),
        );
        let serializer = FundingSerializer::spawn(gateway.clone(), test_config());

        let mut rng = rand::thread_rng();
        let targets: Vec<Address> = (0..4).map(|_| Address::random(&mut rng)).collect();

        let mut handles = Vec::new();
        for target in &targets {
            let serializer = serializer.clone();
            let target = target.clone();
            handles.push(tokio::spawn(async move {
                serializer.fund(target, 1_000).await
            }));
            // Stagger enqueues so the expected order is well-defined.
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(gateway.funding_order(), targets);
        assert_eq!(gateway.max_source_in_flight(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn a_failed_job_does_not_poison_the_queue() {
        let gateway = Arc::new(SimGateway::new());
        gateway.fail_funding_submission(2);
        let serializer = FundingSerializer::spawn(gateway.clone(), test_config());

        let mut rng = rand::thread_rng();
        let a = Address::random(&mut rng);
        let b = Address::random(&mut rng);
        let c = Address::random(&mut rng);

        assert!(serializer.fund(a, 1_000).await.is_ok());
        let failed = serializer.fund(b, 1_000).await;
        assert!(matches!(failed, Err(StressError::FundingSubmission(_))));
        assert!(serializer.fund(c, 1_000).await.is_ok());
    }

    #[tokio::test]
    async fn cloned_handles_keep_the_queue_alive() {
        let gateway = Arc::new(SimGateway::new());
        let serializer = FundingSerializer::spawn(gateway, test_config());
        let probe = serializer.clone();

        drop(serializer);
        // The worker only exits once every sender is gone, so this probe
        // still succeeds; it documents the handle-clone semantics.
        let mut rng = rand::thread_rng();
        assert!(probe.fund(Address::random(&mut rng), 1).await.is_ok());
    }
}
