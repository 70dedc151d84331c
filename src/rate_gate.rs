//! Global inter-operation rate gate
//!
//! Enforces a minimum wall-clock interval between the *starts* of any two
//! stress operations, across all concurrent callers. The read-check-update
//! of the last start time happens under a single async mutex, and the
//! waiting caller keeps the lock while it sleeps out its remainder: the
//! gate is a single-flight admission point, not a delay computed once
//! against a stale timestamp.
//!
//! Admission order is best-effort FIFO (tokio's mutex queue); the contract
//! is only the spacing, never perfect ordering.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

/// How long a caller observing `last_start` at `now` must still wait before
/// it may start. Pure, so the spacing rule is testable without a clock.
pub fn wait_before_start(
    now: Instant,
    last_start: Option<Instant>,
    min_interval: Duration,
) -> Duration {
    match last_start {
        None => Duration::ZERO,
        Some(last) => min_interval.saturating_sub(now.saturating_duration_since(last)),
    }
}

/// Serialized admission gate over the process-wide last-start timestamp.
pub struct StartGate {
    min_interval: Duration,
    last_start: Mutex<Option<Instant>>,
}

impl StartGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_start: Mutex::new(None),
        }
    }

    /// Wait until it is this caller's turn to start, then record the start.
    ///
    /// Never fails; the worst case is a wait proportional to the number of
    /// callers queued ahead times the interval.
    pub async fn acquire(&self) {
        let mut last = self.last_start.lock().await;
        let wait = wait_before_start(Instant::now(), *last, self.min_interval);
        if !wait.is_zero() {
            sleep(wait).await;
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn first_caller_never_waits() {
        let now = Instant::now();
        assert_eq!(
            wait_before_start(now, None, Duration::from_millis(20)),
            Duration::ZERO
        );
    }

    #[test]
    fn wait_is_the_interval_remainder() {
        let interval = Duration::from_millis(20);
        let last = Instant::now();
        let now = last + Duration::from_millis(5);
        assert_eq!(
            wait_before_start(now, Some(last), interval),
            Duration::from_millis(15)
        );
    }

    #[test]
    fn no_wait_once_the_interval_has_passed() {
        let interval = Duration::from_millis(20);
        let last = Instant::now();
        let now = last + Duration::from_millis(25);
        assert_eq!(wait_before_start(now, Some(last), interval), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_starts_are_spaced_by_at_least_the_interval() {
        let interval = Duration::from_millis(20);
        let gate = Arc::new(StartGate::new(interval));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let gate = Arc::clone(&gate);
            handles.push(tokio::spawn(async move {
                gate.acquire().await;
                Instant::now()
            }));
        }

        let mut starts = Vec::new();
        for handle in handles {
            starts.push(handle.await.unwrap());
        }
        starts.sort();

        for pair in starts.windows(2) {
            assert!(
                pair[1].saturating_duration_since(pair[0]) >= interval,
                "starts closer than the minimum interval"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sequential_callers_also_respect_spacing() {
        let interval = Duration::from_millis(50);
        let gate = StartGate::new(interval);

        gate.acquire().await;
        let first = Instant::now();
        gate.acquire().await;
        let second = Instant::now();

        assert!(second.saturating_duration_since(first) >= interval);
    }
}
