#[cfg(test)]
mod tests {
    use actrail::api::RemoteCollector;
    use actrail::libs::activity::{ActivityRecord, ActivityStatus, RecordTrigger, WindowSnapshot};
    use actrail::libs::breaker::BreakerPhase;
    use actrail::libs::dispatcher::{DispatcherConfig, SubmissionDispatcher, SubmissionOutcome};
    use actrail::libs::error::SubmitError;
    use chrono::Utc;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct CollectorState {
        calls: AtomicU32,
        delivered: AtomicU32,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    /// Collector double: fails its first `fail_first` calls, then succeeds
    /// after `delay`.
    #[derive(Clone, Default)]
    struct MockCollector {
        state: Arc<CollectorState>,
        fail_first: u32,
        delay: Duration,
    }

    impl MockCollector {
        fn with_delay(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::default()
            }
        }

        fn failing(fail_first: u32) -> Self {
            Self {
                fail_first,
                ..Self::default()
            }
        }

        fn calls(&self) -> u32 {
            self.state.calls.load(Ordering::SeqCst)
        }
    }

    impl RemoteCollector for MockCollector {
        async fn submit(&self, _record: &ActivityRecord) -> Result<(), SubmitError> {
            let call = self.state.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.state.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.state.in_flight.fetch_sub(1, Ordering::SeqCst);

            if call < self.fail_first {
                return Err(SubmitError::Status(503));
            }
            self.state.delivered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn record() -> ActivityRecord {
        ActivityRecord::new(
            Utc::now(),
            &WindowSnapshot::new("main.rs", "editor"),
            "tester",
            ActivityStatus::Active,
            RecordTrigger::Activated,
        )
    }

    fn config() -> DispatcherConfig {
        DispatcherConfig {
            concurrency: 3,
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            breaker_threshold: 100,
            breaker_cooldown: Duration::from_secs(60),
            max_pending: 1000,
            shutdown_grace: Duration::from_secs(2),
        }
    }

    async fn wait_for(condition: impl Fn() -> bool, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        condition()
    }

    #[test]
    fn test_backoff_doubles() {
        let config = DispatcherConfig {
            base_delay: Duration::from_secs(5),
            ..DispatcherConfig::default()
        };

        assert_eq!(config.backoff(1), Duration::from_secs(5));
        assert_eq!(config.backoff(2), Duration::from_secs(10));
        assert_eq!(config.backoff(3), Duration::from_secs(20));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_delivers_with_bounded_concurrency() {
        let collector = MockCollector::with_delay(Duration::from_millis(30));
        let dispatcher = SubmissionDispatcher::start(collector.clone(), config());

        for _ in 0..20 {
            assert!(dispatcher.submit(record()));
        }
        let report = dispatcher.shutdown().await;

        assert_eq!(report.delivered, 20);
        assert_eq!(report.abandoned, 0);
        let max_in_flight = collector.state.max_in_flight.load(Ordering::SeqCst);
        assert!(max_in_flight <= 3, "saw {} concurrent submissions", max_in_flight);
        assert!(max_in_flight >= 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_retries_until_delivered() {
        let collector = MockCollector::failing(2);
        let dispatcher = SubmissionDispatcher::start(collector.clone(), config());

        dispatcher.submit(record());

        assert!(wait_for(|| dispatcher.stats().delivered == 1, Duration::from_secs(2)).await);
        let stats = dispatcher.stats();
        assert_eq!(stats.failed_attempts, 2);
        assert_eq!(stats.dropped, 0);
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.last_outcome, Some(SubmissionOutcome::Delivered));
        assert!(stats.last_success.is_some());
        assert_eq!(collector.calls(), 3);
        dispatcher.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_drops_after_max_attempts() {
        let collector = MockCollector::failing(u32::MAX);
        let dispatcher = SubmissionDispatcher::start(collector.clone(), config());

        dispatcher.submit(record());

        assert!(wait_for(|| dispatcher.stats().dropped == 1, Duration::from_secs(2)).await);
        let stats = dispatcher.stats();
        assert_eq!(stats.failed_attempts, 3);
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.last_outcome, Some(SubmissionOutcome::Failed));
        assert_eq!(collector.calls(), 3);

        let report = dispatcher.shutdown().await;
        assert_eq!(report.dropped, 1);
        assert_eq!(report.delivered, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_breaker_suspends_attempts() {
        let collector = MockCollector::failing(u32::MAX);
        let dispatcher = SubmissionDispatcher::start(
            collector.clone(),
            DispatcherConfig {
                max_attempts: 10,
                breaker_threshold: 2,
                shutdown_grace: Duration::from_millis(100),
                ..config()
            },
        );

        dispatcher.submit(record());

        assert!(wait_for(|| dispatcher.stats().breaker == BreakerPhase::Open, Duration::from_secs(2)).await);
        tokio::time::sleep(Duration::from_millis(200)).await;

        // No attempt is spent while the breaker is open.
        assert_eq!(collector.calls(), 2);
        let stats = dispatcher.stats();
        assert_eq!(stats.breaker_trips, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.dropped, 0);

        let report = dispatcher.shutdown().await;
        assert_eq!(report.abandoned, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_rejects_beyond_pending_bound() {
        let collector = MockCollector::with_delay(Duration::from_secs(5));
        let dispatcher = SubmissionDispatcher::start(
            collector.clone(),
            DispatcherConfig {
                concurrency: 1,
                max_pending: 2,
                shutdown_grace: Duration::from_millis(50),
                ..config()
            },
        );

        let accepted: Vec<bool> = (0..5).map(|_| dispatcher.submit(record())).collect();

        assert_eq!(accepted, vec![true, true, false, false, false]);
        assert_eq!(dispatcher.stats().rejected, 3);

        let report = dispatcher.shutdown().await;
        assert_eq!(report.abandoned, 2);
        assert_eq!(report.delivered, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shutdown_cancels_in_flight_after_grace() {
        let collector = MockCollector::with_delay(Duration::from_secs(30));
        let dispatcher = SubmissionDispatcher::start(
            collector.clone(),
            DispatcherConfig {
                shutdown_grace: Duration::from_millis(100),
                ..config()
            },
        );

        dispatcher.submit(record());
        assert!(wait_for(|| dispatcher.in_flight() == 1, Duration::from_secs(1)).await);

        let started = Instant::now();
        let report = dispatcher.shutdown().await;

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(report.abandoned, 1);
        assert_eq!(dispatcher.in_flight(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_submit_after_shutdown_is_rejected() {
        let dispatcher = SubmissionDispatcher::start(MockCollector::default(), config());
        dispatcher.shutdown().await;

        assert!(!dispatcher.submit(record()));
        assert_eq!(dispatcher.stats().rejected, 1);
    }
}
