//! Circuit breaker integration tests

#[cfg(test)]
mod tests {
    use modelrouter::config::CircuitBreakerConfig;
    use modelrouter::core::circuit_breaker::{CircuitBreaker, CircuitBreakerManager, CircuitState};
    use modelrouter::core::factory::ComponentFactory;
    use std::sync::Arc;
    use std::time::Duration;

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_rate_threshold: 0.5,
            minimum_request_threshold: 10,
            timeout_secs: 1,
            ..CircuitBreakerConfig::default()
        }
    }

    fn breaker() -> Arc<CircuitBreaker> {
        ComponentFactory::new().create_circuit_breaker("http://10.1.0.1:8000/v1", &config())
    }

    /// 6 failures and 4 successes open a breaker with threshold 10 / 50%
    #[test]
    fn test_sixty_percent_failures_open_breaker() {
        let breaker = breaker();
        for _ in 0..6 {
            breaker.record_failure();
        }
        assert_eq!(breaker.state(), CircuitState::Closed);
        for _ in 0..4 {
            breaker.record_success();
        }

        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.can_execute());
    }

    /// Below the request threshold the breaker never opens
    #[test]
    fn test_below_minimum_requests_stays_closed() {
        let breaker = breaker();
        for _ in 0..9 {
            breaker.record_failure();
            assert!(breaker.can_execute());
        }
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!((breaker.stats().failure_rate() - 1.0).abs() < f64::EPSILON);
    }

    /// force_close resets counters and state
    #[test]
    fn test_force_close_resets() {
        let breaker = breaker();
        for _ in 0..10 {
            breaker.record_failure();
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        breaker.force_close();
        let stats = breaker.stats();
        assert_eq!(stats.state, CircuitState::Closed);
        assert_eq!(stats.request_count, 0);
        assert_eq!(stats.failure_count, 0);
        assert_eq!(stats.success_count, 0);
        assert!(breaker.can_execute());
    }

    /// Open -> half-open after the cool-down, then closed on a successful trial
    #[tokio::test]
    async fn test_recovery_through_half_open() {
        let breaker = breaker();
        breaker.force_open();
        assert!(!breaker.can_execute());

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(breaker.is_available());
        assert!(breaker.can_execute());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        // single trial permit
        assert!(!breaker.can_execute());

        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    /// A failed trial re-opens the breaker
    #[tokio::test]
    async fn test_failed_trial_reopens() {
        let breaker = breaker();
        breaker.force_open();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(breaker.can_execute());

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.can_execute());
    }

    /// The manager keeps one breaker per instance key
    #[test]
    fn test_manager_isolates_instances() {
        let manager = CircuitBreakerManager::new(config());
        let a = manager.get_or_create("http://a/v1");
        let b = manager.get_or_create("http://b/v1");
        for _ in 0..10 {
            a.record_failure();
        }

        assert_eq!(manager.state("http://a/v1"), CircuitState::Open);
        assert_eq!(manager.state("http://b/v1"), CircuitState::Closed);
        assert!(b.can_execute());
        assert_eq!(manager.all_states().len(), 2);

        assert!(manager.reset("http://a/v1"));
        assert_eq!(manager.state("http://a/v1"), CircuitState::Closed);
    }
}
