//! Rate limiting integration tests

#[cfg(test)]
mod tests {
    use modelrouter::config::RateLimitConfig;
    use modelrouter::core::factory::ComponentFactory;
    use modelrouter::core::rate_limiter::{RateLimitContext, RateLimiter};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn limiter(config: RateLimitConfig) -> Arc<dyn RateLimiter> {
        ComponentFactory::new().create_rate_limiter(&config)
    }

    fn one() -> RateLimitContext {
        RateLimitContext::new(1)
    }

    /// capacity=5, rate=5: the sixth immediate call fails, then passes after
    /// about a second
    #[tokio::test]
    async fn test_token_bucket_burst_then_refill() {
        let limiter = limiter(RateLimitConfig::new("token-bucket", 5, 5));
        for i in 0..5 {
            assert!(limiter.try_acquire(&one()), "call {} rejected", i + 1);
        }
        assert!(!limiter.try_acquire(&one()));

        tokio::time::sleep(Duration::from_millis(1050)).await;
        assert!(limiter.try_acquire(&one()));
    }

    /// Draining the full capacity at once, then refilling one token
    #[tokio::test]
    async fn test_token_bucket_full_capacity_acquire() {
        let limiter = limiter(RateLimitConfig::new("token-bucket", 10, 10));
        assert!(limiter.try_acquire(&RateLimitContext::new(10)));
        assert!(!limiter.try_acquire(&one()));

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(limiter.try_acquire(&one()));
    }

    /// The sliding window admits `rate` calls per second
    #[tokio::test]
    async fn test_sliding_window_limits_per_window() {
        let limiter = limiter(RateLimitConfig::new("sliding-window", 3, 3));
        assert!(limiter.try_acquire(&one()));
        assert!(limiter.try_acquire(&one()));
        assert!(limiter.try_acquire(&one()));
        assert!(!limiter.try_acquire(&one()));

        tokio::time::sleep(Duration::from_millis(1050)).await;
        assert!(limiter.try_acquire(&one()));
    }

    /// The leaky bucket drains over time
    #[tokio::test]
    async fn test_leaky_bucket_drains() {
        let limiter = limiter(RateLimitConfig::new("leaky-bucket", 2, 4));
        assert!(limiter.try_acquire(&one()));
        assert!(limiter.try_acquire(&one()));
        assert!(!limiter.try_acquire(&one()));

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(limiter.try_acquire(&one()));
    }

    /// Concurrent callers never get more than the capacity
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_acquires_respect_capacity() {
        for algorithm in ["token-bucket", "leaky-bucket", "sliding-window"] {
            // rate 1 keeps refill negligible during the test
            let capacity = 50;
            let config = if algorithm == "sliding-window" {
                RateLimitConfig::new(algorithm, capacity, capacity)
            } else {
                RateLimitConfig::new(algorithm, capacity, 1)
            };
            let limiter = limiter(config);
            let admitted = Arc::new(AtomicUsize::new(0));

            let mut handles = Vec::new();
            for _ in 0..8 {
                let limiter = Arc::clone(&limiter);
                let admitted = Arc::clone(&admitted);
                handles.push(tokio::spawn(async move {
                    for _ in 0..25 {
                        if limiter.try_acquire(&RateLimitContext::new(1)) {
                            admitted.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }));
            }
            for handle in handles {
                handle.await.unwrap();
            }

            let admitted = admitted.load(Ordering::Relaxed) as u64;
            assert!(
                (capacity..=capacity + 1).contains(&admitted),
                "{} admitted {} of capacity {}",
                algorithm,
                admitted,
                capacity
            );
        }
    }

    /// Per-client-IP scope isolates clients
    #[test]
    fn test_per_client_ip_scope() {
        let limiter = ComponentFactory::new().create_scoped_rate_limiter(
            &RateLimitConfig::new("token-bucket", 1, 1).with_scope("per-client-ip"),
        );
        let alice = RateLimitContext::new(1).with_client_ip("10.0.0.1");
        let bob = RateLimitContext::new(1).with_client_ip("10.0.0.2");

        assert!(limiter.try_acquire(&alice));
        assert!(!limiter.try_acquire(&alice));
        assert!(limiter.try_acquire(&bob));
        assert_eq!(limiter.client_count(), 2);

        assert_eq!(limiter.evict_idle(Duration::ZERO), 2);
        assert!(limiter.try_acquire(&alice));
    }

    /// A disabled configuration never rejects
    #[test]
    fn test_disabled_limiter_allows_everything() {
        let config = RateLimitConfig {
            enabled: false,
            ..RateLimitConfig::new("token-bucket", 1, 1)
        };
        let limiter = limiter(config);
        for _ in 0..100 {
            assert!(limiter.try_acquire(&one()));
        }
    }
}
