//! Stress relayer driver binary
//!
//! Runs the relayer against the in-memory simulation gateway and fans a
//! grid of wallets x transactions through it concurrently, then prints the
//! outcome summary, the contract stats and a health report. The real-chain
//! gateway is a separate deployment concern; this binary exists to exercise
//! the orchestration end to end.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stress_relayer::{Config, LedgerGateway, Relayer, SimGateway, StressRequest};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<String>,

    /// Number of simulated wallets
    #[arg(long, default_value = "4")]
    wallets: u32,

    /// Transactions per wallet
    #[arg(long, default_value = "4")]
    txs: u32,

    /// Simulated confirmation latency in milliseconds
    #[arg(long, default_value = "25")]
    confirm_latency_ms: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose)?;

    let config = match &args.config {
        Some(path) => Config::from_file_with_env(path)?,
        None => Config::default(),
    };

    let gateway = Arc::new(
        SimGateway::new()
            .with_confirm_latency(Duration::from_millis(args.confirm_latency_ms))
            .with_maybe_revert_modulus(Some(7)),
    );
    info!("starting stress relayer (simulation gateway)");
    info!("source address: {}", gateway.source_address());
    info!("stress contract: {}", gateway.contract_address());

    let relayer = Arc::new(Relayer::new(gateway.clone(), config));

    let mut handles = Vec::new();
    for wallet in 0..args.wallets {
        for tx in 0..args.txs {
            let relayer = Arc::clone(&relayer);
            handles.push(tokio::spawn(async move {
                relayer
                    .handle(StressRequest::new(wallet as i64, tx as i64))
                    .await
            }));
        }
    }

    let outcomes = futures::future::join_all(handles).await;
    let mut succeeded = 0usize;
    let mut failed = 0usize;
    for outcome in outcomes {
        let outcome = outcome?;
        if outcome.success {
            succeeded += 1;
        } else {
            failed += 1;
        }
    }
    info!(
        "run complete: {} succeeded, {} failed, max concurrent source submissions: {}",
        succeeded,
        failed,
        gateway.max_source_in_flight()
    );

    let stats = relayer.stats().await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    println!("{}", serde_json::to_string_pretty(&relayer.health())?);
    print!("{}", stress_relayer::metrics::metrics().export()?);

    Ok(())
}

fn init_logging(verbose: bool) -> Result<()> {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
    Ok(())
}
