//! Traffic manager end-to-end tests

#[cfg(test)]
mod tests {
    use crate::common::{ConfigFactory, InstanceFactory, ScriptedProbe};
    use modelrouter::config::{FallbackConfig, LoadBalanceConfig, RateLimitConfig, ServiceType};
    use modelrouter::core::circuit_breaker::{CircuitEvent, CircuitState};
    use modelrouter::core::load_balancer::LoadBalanceStrategy;
    use modelrouter::core::observability::TrafficObserver;
    use modelrouter::{GatewayError, TrafficManager};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingObserver {
        selections: AtomicUsize,
        events: Mutex<Vec<(String, CircuitEvent)>>,
    }

    impl TrafficObserver for CountingObserver {
        fn on_instance_selected(&self, _service: ServiceType, _strategy: &str, _instance: &str) {
            self.selections.fetch_add(1, Ordering::Relaxed);
        }

        fn on_circuit_event(&self, breaker: &str, _state: CircuitState, event: CircuitEvent) {
            self.events.lock().push((breaker.to_string(), event));
        }
    }

    struct PanickingObserver;

    impl TrafficObserver for PanickingObserver {
        fn on_instance_selected(&self, _service: ServiceType, _strategy: &str, _instance: &str) {
            panic!("collector unavailable");
        }
    }

    /// 40 round-robin selections through the full pipeline over weights [1, 1, 2]
    #[test]
    fn test_weighted_round_robin_through_pipeline() {
        let instances = InstanceFactory::weighted("gpt-4o", &[1, 1, 2]);
        let traffic = TrafficManager::new(ConfigFactory::chat_with_strategy(instances.clone(), "round-robin")).unwrap();

        let mut counts: HashMap<String, i64> = HashMap::new();
        for _ in 0..40 {
            let selection = traffic
                .select_instance(ServiceType::Chat, Some("gpt-4o"), None)
                .unwrap();
            assert_eq!(selection.strategy, LoadBalanceStrategy::RoundRobin);
            traffic.record_success(ServiceType::Chat, &selection.instance);
            *counts.entry(selection.instance.instance_key()).or_insert(0) += 1;
        }

        let heavy = counts[&instances[2].instance_key()];
        assert!((heavy - 2 * counts[&instances[0].instance_key()]).abs() <= 1);
        assert!((heavy - 2 * counts[&instances[1].instance_key()]).abs() <= 1);
    }

    /// A failing instance is cut off once its breaker opens
    #[test]
    fn test_failing_instance_is_isolated() {
        let instances = InstanceFactory::weighted("gpt-4o", &[1, 1]);
        let bad_key = instances[0].instance_key();
        let observer = Arc::new(CountingObserver::default());
        let traffic = TrafficManager::with_observer(
            ConfigFactory::chat_with_strategy(instances, "round-robin"),
            observer.clone(),
        )
        .unwrap();

        let mut bad_hits = 0;
        for _ in 0..60 {
            let selection = traffic.select_instance(ServiceType::Chat, None, None).unwrap();
            if selection.instance.instance_key() == bad_key {
                bad_hits += 1;
                traffic.record_failure(ServiceType::Chat, &selection.instance);
            } else {
                traffic.record_success(ServiceType::Chat, &selection.instance);
            }
        }

        assert_eq!(traffic.circuit_state(&bad_key), CircuitState::Open);
        assert_eq!(bad_hits, 10);
        assert_eq!(observer.selections.load(Ordering::Relaxed), 60);
        assert!(observer
            .events
            .lock()
            .iter()
            .any(|(breaker, event)| breaker == &bad_key && *event == CircuitEvent::Opened));
    }

    /// capacity=5, rate=5 at the service level
    #[tokio::test]
    async fn test_service_rate_limit_recovers() {
        let mut config = ConfigFactory::chat(InstanceFactory::weighted("gpt-4o", &[1]));
        config.rate_limit = Some(RateLimitConfig::new("token-bucket", 5, 5));
        let traffic = TrafficManager::new(config).unwrap();

        for _ in 0..5 {
            assert!(traffic.select_instance(ServiceType::Chat, None, None).is_ok());
        }
        let err = traffic
            .select_instance(ServiceType::Chat, None, None)
            .unwrap_err();
        assert!(matches!(err, GatewayError::RateLimited(_)));

        tokio::time::sleep(std::time::Duration::from_millis(1050)).await;
        assert!(traffic.select_instance(ServiceType::Chat, None, None).is_ok());
    }

    /// An instance limit moves traffic to the next instance
    #[test]
    fn test_instance_rate_limit_reroutes() {
        let limited = InstanceFactory::create("gpt-4o", 1)
            .with_rate_limit(RateLimitConfig::new("token-bucket", 1, 1));
        let open = InstanceFactory::create("gpt-4o", 2);
        let traffic = TrafficManager::new(ConfigFactory::chat(vec![limited.clone(), open.clone()])).unwrap();

        let mut limited_hits = 0;
        for _ in 0..30 {
            let selection = traffic.select_instance(ServiceType::Chat, None, None).unwrap();
            if selection.instance == limited {
                limited_hits += 1;
            }
        }
        assert!(limited_hits <= 1);
    }

    /// Health results feed the candidate filter
    #[tokio::test]
    async fn test_unhealthy_instances_are_skipped() {
        let a = InstanceFactory::local("gpt-4o", 9101);
        let b = InstanceFactory::local("gpt-4o", 9102);
        let probe = Arc::new(ScriptedProbe::with_up(&[9101, 9102]));
        let traffic = TrafficManager::new(ConfigFactory::chat(vec![a.clone(), b.clone()]))
            .unwrap()
            .with_health_probe(probe.clone());

        traffic.run_health_check_now().await;
        assert!(traffic.is_service_healthy(ServiceType::Chat));

        probe.set(9101, false);
        traffic.run_health_check_now().await;
        assert!(!traffic.is_instance_healthy(&a.instance_key()));
        for _ in 0..20 {
            let selection = traffic.select_instance(ServiceType::Chat, None, None).unwrap();
            assert_eq!(selection.instance, b);
        }

        probe.set(9102, false);
        traffic.run_health_check_now().await;
        assert!(!traffic.is_service_healthy(ServiceType::Chat));
        let err = traffic
            .select_instance(ServiceType::Chat, None, None)
            .unwrap_err();
        assert!(matches!(err, GatewayError::NoHealthyInstances(_)));
        assert_eq!(err.status_code(), 503);
    }

    /// Fallback answers routing failures, from cache when configured
    #[test]
    fn test_fallback_after_routing_failure() {
        let instances = InstanceFactory::weighted("gpt-4o", &[1]);
        let mut config = ConfigFactory::chat(instances.clone());
        config.fallback = Some(FallbackConfig::with_strategy("cache"));
        let traffic = TrafficManager::new(config).unwrap();

        traffic.cache_response(
            ServiceType::Chat,
            "10.0.0.1",
            "gpt-4o",
            "hello",
            json!({"choices": [{"message": {"content": "hi"}}]}),
        );
        traffic.force_open(&instances[0].instance_key());

        let err = traffic
            .select_instance(ServiceType::Chat, None, None)
            .unwrap_err();
        assert!(err.is_routing_failure());

        let response = traffic.fallback(ServiceType::Chat, &err).unwrap();
        assert!(response.from_cache);
        assert_eq!(response.body["choices"][0]["message"]["content"], "hi");

        // the global cache holds nothing for embedding
        let degraded = traffic.fallback(ServiceType::Embedding, &err).unwrap();
        assert!(!degraded.from_cache);
        assert_eq!(degraded.status, 503);
    }

    /// A panicking observer never breaks routing
    #[test]
    fn test_panicking_observer_is_contained() {
        let traffic = TrafficManager::with_observer(
            ConfigFactory::chat(InstanceFactory::weighted("gpt-4o", &[1])),
            Arc::new(PanickingObserver),
        )
        .unwrap();
        assert!(traffic.select_instance(ServiceType::Chat, None, None).is_ok());
    }

    /// A rejected reload keeps the running configuration
    #[test]
    fn test_rejected_reload_keeps_previous_state() {
        let instances = InstanceFactory::weighted("gpt-4o", &[1, 1]);
        let traffic = TrafficManager::new(ConfigFactory::chat_with_strategy(instances.clone(), "round-robin")).unwrap();

        let bad = ConfigFactory::chat_with_strategy(instances.clone(), "fastest-first");
        assert!(matches!(traffic.reload(bad), Err(GatewayError::Reconfiguration(_))));
        assert_eq!(
            traffic.load_balancer_status()[&ServiceType::Chat],
            LoadBalanceStrategy::RoundRobin
        );

        let mut bad_limit = ConfigFactory::chat(instances.clone());
        bad_limit.rate_limit = Some(RateLimitConfig::new("token-bucket", 0, 0));
        assert!(traffic.reload(bad_limit).is_err());
        assert!(traffic.rate_limiter_status().is_empty());
        assert_eq!(traffic.registry().instances(ServiceType::Chat).len(), 2);
    }

    /// A successful reload swaps instances, strategies and prunes state
    #[test]
    fn test_reload_replaces_everything() {
        let old = InstanceFactory::weighted("gpt-4o", &[1, 1]);
        let traffic = TrafficManager::new(ConfigFactory::chat(old.clone())).unwrap();
        traffic.force_open(&old[0].instance_key());
        traffic.state().update_instance_health(&old[1].instance_key(), false);

        let fresh = vec![InstanceFactory::create("qwen", 9)];
        let mut config = ConfigFactory::chat_with_strategy(fresh.clone(), "least-connections");
        config.rate_limit = Some(RateLimitConfig::new("sliding-window", 10, 10));
        traffic.reload(config).unwrap();

        assert!(traffic.circuit_states().is_empty());
        assert!(traffic.health_snapshot().instances.is_empty());
        assert_eq!(
            traffic.load_balancer_status()[&ServiceType::Chat],
            LoadBalanceStrategy::LeastConnections
        );
        assert_eq!(traffic.rate_limiter_status()[&ServiceType::Chat].algorithm, "sliding-window");

        let selection = traffic.select_instance(ServiceType::Chat, None, None).unwrap();
        assert_eq!(selection.instance, fresh[0]);
        assert!(matches!(
            traffic.select_instance(ServiceType::Chat, Some("gpt-4o"), None),
            Err(GatewayError::NoInstancesAvailable(_))
        ));
    }

    /// Administrative load balancer updates apply and roll back
    #[test]
    fn test_admin_load_balancer_update() {
        let traffic = TrafficManager::new(ConfigFactory::chat(InstanceFactory::weighted("gpt-4o", &[1, 1]))).unwrap();

        traffic
            .update_service_load_balancer(ServiceType::Chat, LoadBalanceConfig::with_type("ip-hash"))
            .unwrap();
        let first = traffic
            .select_instance(ServiceType::Chat, None, Some("203.0.113.7"))
            .unwrap();
        for _ in 0..10 {
            let again = traffic
                .select_instance(ServiceType::Chat, None, Some("203.0.113.7"))
                .unwrap();
            assert_eq!(again.instance, first.instance);
        }

        assert!(traffic
            .update_service_load_balancer(ServiceType::Chat, LoadBalanceConfig::with_type("nope"))
            .is_err());
        assert_eq!(
            traffic.reinitialize_load_balancer(ServiceType::Chat),
            LoadBalanceStrategy::IpHash
        );
    }

    /// Background tasks start once and stop on shutdown
    #[tokio::test]
    async fn test_start_and_shutdown() {
        let mut config = ConfigFactory::chat(InstanceFactory::weighted("gpt-4o", &[1]));
        config.rate_limit_cleanup.enabled = true;
        let traffic = TrafficManager::new(config).unwrap();

        assert!(!traffic.is_running());
        traffic.start();
        traffic.start();
        assert!(traffic.is_running());
        traffic.shutdown();
        assert!(!traffic.is_running());
    }

    /// A reload can switch on health checking for a running manager
    #[tokio::test]
    async fn test_reload_enables_health_checking() {
        let a = InstanceFactory::local("gpt-4o", 9301);
        let config = ConfigFactory::chat(vec![a.clone()]);
        let traffic = TrafficManager::new(config.clone())
            .unwrap()
            .with_health_probe(Arc::new(ScriptedProbe::default()));
        traffic.start();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(traffic.is_instance_healthy(&a.instance_key()));

        let mut enabled = config;
        enabled.health_check.enabled = true;
        enabled.health_check.interval_secs = 1;
        traffic.reload(enabled).unwrap();

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!traffic.is_instance_healthy(&a.instance_key()));
        traffic.shutdown();
    }
}
