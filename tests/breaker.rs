#[cfg(test)]
mod tests {
    use actrail::libs::breaker::{BreakerPhase, BreakerState, CircuitBreaker, Permit};
    use std::time::{Duration, Instant};

    const COOLDOWN: Duration = Duration::from_secs(60);

    fn tripped(now: Instant) -> CircuitBreaker {
        let mut breaker = CircuitBreaker::new(3, COOLDOWN);
        for _ in 0..3 {
            breaker.record_failure(now);
        }
        breaker
    }

    #[test]
    fn test_starts_closed() {
        let mut breaker = CircuitBreaker::default();

        assert_eq!(breaker.phase(), BreakerPhase::Closed);
        assert_eq!(breaker.try_acquire(Instant::now()), Permit::Allowed);
        assert_eq!(breaker.trips(), 0);
    }

    #[test]
    fn test_opens_after_consecutive_failures() {
        let now = Instant::now();
        let mut breaker = CircuitBreaker::new(3, COOLDOWN);

        assert!(!breaker.record_failure(now));
        assert!(!breaker.record_failure(now));
        assert_eq!(breaker.state(), BreakerState::Closed { consecutive_failures: 2 });
        assert!(breaker.record_failure(now));

        assert_eq!(breaker.phase(), BreakerPhase::Open);
        assert_eq!(breaker.trips(), 1);
        assert_eq!(breaker.try_acquire(now + Duration::from_secs(10)), Permit::Rejected(Duration::from_secs(50)));
    }

    #[test]
    fn test_success_resets_failure_streak() {
        let now = Instant::now();
        let mut breaker = CircuitBreaker::new(3, COOLDOWN);

        breaker.record_failure(now);
        breaker.record_failure(now);
        breaker.record_success();
        breaker.record_failure(now);
        breaker.record_failure(now);

        assert_eq!(breaker.phase(), BreakerPhase::Closed);
    }

    #[test]
    fn test_single_probe_after_cooldown() {
        let now = Instant::now();
        let mut breaker = tripped(now);
        let after = now + COOLDOWN;

        assert_eq!(breaker.try_acquire(after), Permit::Probe);
        assert_eq!(breaker.phase(), BreakerPhase::HalfOpen);
        assert!(matches!(breaker.try_acquire(after), Permit::Rejected(_)));
    }

    #[test]
    fn test_probe_success_closes() {
        let now = Instant::now();
        let mut breaker = tripped(now);
        breaker.try_acquire(now + COOLDOWN);

        breaker.record_success();

        assert_eq!(breaker.phase(), BreakerPhase::Closed);
        assert_eq!(breaker.try_acquire(now + COOLDOWN), Permit::Allowed);
    }

    #[test]
    fn test_probe_failure_reopens() {
        let now = Instant::now();
        let mut breaker = tripped(now);
        let probe_at = now + COOLDOWN;
        breaker.try_acquire(probe_at);

        assert!(breaker.record_failure(probe_at));

        assert_eq!(breaker.state(), BreakerState::Open { until: probe_at + COOLDOWN });
        assert_eq!(breaker.trips(), 2);
    }

    #[test]
    fn test_released_probe_can_be_retaken() {
        let now = Instant::now();
        let mut breaker = tripped(now);
        breaker.try_acquire(now + COOLDOWN);

        breaker.release_probe();

        assert_eq!(breaker.state(), BreakerState::HalfOpen { probe_in_flight: false });
        assert_eq!(breaker.try_acquire(now + COOLDOWN), Permit::Probe);
    }

    #[test]
    fn test_late_failure_while_open_is_ignored() {
        let now = Instant::now();
        let mut breaker = tripped(now);

        assert!(!breaker.record_failure(now + Duration::from_secs(1)));
        assert_eq!(breaker.state(), BreakerState::Open { until: now + COOLDOWN });
        assert_eq!(breaker.trips(), 1);
    }

    #[test]
    fn test_zero_threshold_is_clamped() {
        let mut breaker = CircuitBreaker::new(0, COOLDOWN);

        assert!(breaker.record_failure(Instant::now()));
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(BreakerPhase::HalfOpen.to_string(), "half-open");
        assert_eq!(serde_json::to_string(&BreakerPhase::HalfOpen).unwrap(), "\"half_open\"");
    }
}
