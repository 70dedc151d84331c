//! Request orchestrator
//!
//! Drives each stress request through the fixed pipeline:
//! rate gate -> funding serializer -> balance poller -> dispatcher.
//! Transitions are strictly forward; the only cross-request coupling is the
//! start gate and the funding queue. Every failure at or below this
//! boundary is converted into a `success=false` outcome, so a single bad
//! request can never take the process down and no caller is left hanging.

use std::sync::Arc;
use std::time::Instant;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::dispatcher::{Dispatcher, StressVariant};
use crate::errors::{GatewayError, StressError};
use crate::funding::FundingSerializer;
use crate::gateway::LedgerGateway;
use crate::metrics::metrics;
use crate::poller::BalancePoller;
use crate::types::{
    Address, ContractStats, HealthReport, RequestPhase, StressOutcome, StressRequest, TxHash,
};

struct Success {
    tx_hash: TxHash,
    ephemeral: Address,
    method: String,
}

/// Composition root: owns the gate, the funding queue and the dispatch
/// settings, and serves stress requests.
pub struct Relayer {
    gateway: Arc<dyn LedgerGateway>,
    gate: crate::rate_gate::StartGate,
    funding: FundingSerializer,
    poller: BalancePoller,
    dispatcher: Dispatcher,
    config: Config,
}

impl Relayer {
    pub fn new(gateway: Arc<dyn LedgerGateway>, config: Config) -> Self {
        let gate = crate::rate_gate::StartGate::new(config.min_start_interval());
        let funding = FundingSerializer::spawn(gateway.clone(), config.funding.clone());
        let poller = BalancePoller::new(&config.poll);
        Self {
            gateway,
            gate,
            funding,
            poller,
            dispatcher: Dispatcher::new(),
            config,
        }
    }

    /// Serve one stress request end to end. Never fails outward: every
    /// error becomes a `success=false` outcome carrying the request's
    /// correlation indices.
    pub async fn handle(&self, request: StressRequest) -> StressOutcome {
        metrics().requests_total.inc();
        metrics().requests_in_flight.inc();
        let started = Instant::now();

        let result = match self.config.request_deadline() {
            Some(deadline) => match timeout(deadline, self.run(&request)).await {
                Ok(result) => result,
                Err(_) => Err((None, StressError::DeadlineExceeded(deadline))),
            },
            None => self.run(&request).await,
        };

        metrics().requests_in_flight.dec();
        metrics()
            .request_latency
            .observe(started.elapsed().as_secs_f64());

        match result {
            Ok(success) => {
                metrics().requests_success.inc();
                info!(
                    "stress tx {} (wallet {}): {} - {}",
                    request.tx_index, request.wallet_index, success.method, success.tx_hash
                );
                StressOutcome::succeeded(&request, success.tx_hash, success.ephemeral, success.method)
            }
            Err((ephemeral, err)) => {
                metrics().requests_failed.inc();
                warn!(
                    "stress tx {} (wallet {}) failed: {}",
                    request.tx_index, request.wallet_index, err
                );
                StressOutcome::failed(&request, ephemeral, &err)
            }
        }
    }

    async fn run(
        &self,
        request: &StressRequest,
    ) -> Result<Success, (Option<Address>, StressError)> {
        let mut phase = RequestPhase::Created;
        debug!(wallet = request.wallet_index, tx = request.tx_index, %phase, "entering");
        request.validate().map_err(|e| (None, e))?;

        phase = RequestPhase::RateLimited;
        debug!(wallet = request.wallet_index, tx = request.tx_index, %phase, "entering");
        self.gate.acquire().await;

        phase = RequestPhase::Funding;
        debug!(wallet = request.wallet_index, tx = request.tx_index, %phase, "entering");
        let ephemeral = self
            .gateway
            .create_account()
            .await
            .map_err(|e| (None, StressError::from(e)))?;
        self.funding
            .fund(ephemeral.clone(), self.config.funding.amount)
            .await
            .map_err(|e| (Some(ephemeral.clone()), e))?;

        phase = RequestPhase::AwaitingBalance;
        debug!(wallet = request.wallet_index, tx = request.tx_index, %phase, "entering");
        let poll = self
            .poller
            .wait_for_balance(
                self.gateway.as_ref(),
                &ephemeral,
                self.config.funding.confirm_threshold,
            )
            .await;
        if !poll.confirmed {
            return Err((
                Some(ephemeral),
                StressError::FundingTimeout {
                    last_balance: poll.last_balance,
                    attempts: poll.attempts,
                },
            ));
        }

        phase = RequestPhase::Dispatching;
        debug!(wallet = request.wallet_index, tx = request.tx_index, %phase, "entering");
        let variant =
            StressVariant::choose(&mut rand::thread_rng(), self.config.dispatch.value_amount);
        let (tx_hash, method) = self
            .dispatcher
            .dispatch(self.gateway.as_ref(), &ephemeral, variant)
            .await
            .map_err(|e| (Some(ephemeral.clone()), e))?;

        phase = RequestPhase::Completed;
        debug!(wallet = request.wallet_index, tx = request.tx_index, %phase, "entering");
        Ok(Success {
            tx_hash,
            ephemeral,
            method,
        })
    }

    /// Read-only contract statistics through the gateway.
    pub async fn stats(&self) -> Result<ContractStats, GatewayError> {
        let total_calls = self.gateway.call_count().await?;
        let relayer_calls = self
            .gateway
            .user_calls(&self.gateway.source_address())
            .await?;
        Ok(ContractStats {
            total_calls,
            relayer_calls,
            contract_address: self.gateway.contract_address(),
        })
    }

    /// Liveness report; pure reads, no core logic.
    pub fn health(&self) -> HealthReport {
        HealthReport {
            status: "OK".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            source_address: self.gateway.source_address(),
            contract_address: self.gateway.contract_address(),
        }
    }
}
