//! Concurrency properties of the funding path under load

use std::sync::Arc;
use std::time::Duration;

use stress_relayer::{Config, Relayer, SimGateway, StressRequest};

#[tokio::test(start_paused = true)]
async fn many_concurrent_requests_never_overlap_source_submissions() {
    let gateway =
        Arc::new(SimGateway::new().with_confirm_latency(Duration::from_millis(10)));
    let mut config = Config::default();
    config.rate.min_start_interval_ms = 5;
    config.poll.interval_ms = 50;
    let relayer = Arc::new(Relayer::new(gateway.clone(), config));

    let mut handles = Vec::new();
    for i in 0..16 {
        let relayer = Arc::clone(&relayer);
        handles.push(tokio::spawn(async move {
            relayer.handle(StressRequest::new(i, 0)).await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        let outcome = handle.await.unwrap();
        assert!(outcome.success, "error: {:?}", outcome.error);
        succeeded += 1;
    }
    assert_eq!(succeeded, 16);

    assert_eq!(gateway.source_submissions(), 16);
    assert_eq!(
        gateway.max_source_in_flight(),
        1,
        "source account had overlapping in-flight submissions"
    );

    // Spans are pairwise non-overlapping in submission order.
    let spans = gateway.funding_spans();
    assert_eq!(spans.len(), 16);
    for pair in spans.windows(2) {
        assert!(pair[1].0 >= pair[0].1);
    }
}

#[tokio::test(start_paused = true)]
async fn one_rejected_funding_job_does_not_stall_the_rest() {
    let gateway =
        Arc::new(SimGateway::new().with_confirm_latency(Duration::from_millis(10)));
    gateway.fail_funding_submission(3);
    let mut config = Config::default();
    config.rate.min_start_interval_ms = 5;
    config.poll.interval_ms = 50;
    let relayer = Arc::new(Relayer::new(gateway.clone(), config));

    let mut handles = Vec::new();
    for i in 0..6 {
        let relayer = Arc::clone(&relayer);
        handles.push(tokio::spawn(async move {
            relayer.handle(StressRequest::new(i, 0)).await
        }));
    }

    let mut succeeded = 0;
    let mut failed = 0;
    for handle in handles {
        let outcome = handle.await.unwrap();
        if outcome.success {
            succeeded += 1;
        } else {
            failed += 1;
            assert!(outcome
                .error
                .unwrap()
                .contains("funding submission failed"));
        }
    }

    // Exactly one request absorbs the rejection; the queue keeps going.
    assert_eq!(failed, 1);
    assert_eq!(succeeded, 5);
    assert_eq!(gateway.source_submissions(), 6);
}
