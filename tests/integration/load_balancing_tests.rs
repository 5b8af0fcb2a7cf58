//! Load balancing integration tests

#[cfg(test)]
mod tests {
    use crate::common::assertions::assert_distribution;
    use crate::common::InstanceFactory;
    use modelrouter::config::{LoadBalanceConfig, ModelInstance};
    use modelrouter::core::factory::ComponentFactory;
    use modelrouter::core::load_balancer::{LoadBalanceStrategy, LoadBalancer};
    use modelrouter::GatewayError;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn balancer(lb_type: &str) -> Arc<dyn LoadBalancer> {
        ComponentFactory::new().create_load_balancer(&LoadBalanceConfig::with_type(lb_type))
    }

    fn count_selections(lb: &dyn LoadBalancer, instances: &[ModelInstance], n: usize) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for _ in 0..n {
            let selected = lb.select_instance(instances, None).unwrap();
            *counts.entry(selected.instance_key()).or_insert(0) += 1;
        }
        counts
    }

    /// 40 round-robin selections over weights [1, 1, 2]
    #[test]
    fn test_round_robin_forty_selections() {
        let instances = InstanceFactory::weighted("gpt-4o", &[1, 1, 2]);
        let lb = balancer("round-robin");
        let counts = count_selections(lb.as_ref(), &instances, 40);

        let light_a = counts[&instances[0].instance_key()] as i64;
        let light_b = counts[&instances[1].instance_key()] as i64;
        let heavy = counts[&instances[2].instance_key()] as i64;
        assert!((heavy - 2 * light_a).abs() <= 1, "{:?}", counts);
        assert!((heavy - 2 * light_b).abs() <= 1, "{:?}", counts);
    }

    /// Long-run round-robin shares follow the weights
    #[test]
    fn test_round_robin_proportional_to_weight() {
        let instances = InstanceFactory::weighted("gpt-4o", &[1, 3, 4]);
        let lb = balancer("round-robin");
        let counts = count_selections(lb.as_ref(), &instances, 8000);

        let expected: HashMap<String, f64> = instances
            .iter()
            .map(|i| (i.instance_key(), i.weight as f64 / 8.0))
            .collect();
        assert_distribution(&counts, &expected, 0.01);
    }

    /// Weighted random approaches the configured shares
    #[test]
    fn test_random_proportional_to_weight() {
        let instances = InstanceFactory::weighted("gpt-4o", &[1, 2, 7]);
        let lb = balancer("random");
        let counts = count_selections(lb.as_ref(), &instances, 20_000);

        let expected: HashMap<String, f64> = instances
            .iter()
            .map(|i| (i.instance_key(), i.weight as f64 / 10.0))
            .collect();
        assert_distribution(&counts, &expected, 0.03);
    }

    /// Every strategy rejects an empty candidate list
    #[test]
    fn test_empty_candidates_rejected() {
        for lb_type in ["random", "round-robin", "least-connections", "ip-hash"] {
            let result = balancer(lb_type).select_instance(&[], Some("10.0.0.1"));
            assert!(
                matches!(result, Err(GatewayError::NoInstancesAvailable(_))),
                "{} accepted an empty list",
                lb_type
            );
        }
    }

    /// Least connections prefers the idle instance and counts stay non-negative
    #[test]
    fn test_least_connections_lifecycle() {
        let instances = InstanceFactory::weighted("gpt-4o", &[1, 1]);
        let lb = balancer("least-connections");
        assert_eq!(lb.strategy(), LoadBalanceStrategy::LeastConnections);

        let first = lb.select_instance(&instances, None).unwrap().clone();
        lb.record_call(&first);
        let second = lb.select_instance(&instances, None).unwrap().clone();
        assert_ne!(first, second);

        lb.record_call_complete(&first);
        lb.record_call_complete(&first);
        lb.record_call(&second);
        assert_eq!(lb.select_instance(&instances, None).unwrap(), &first);
    }

    /// IP hash is sticky and only a bounded share of clients move when an
    /// instance is added
    #[test]
    fn test_ip_hash_consistency() {
        let lb = balancer("ip-hash");
        let before = InstanceFactory::weighted("gpt-4o", &[1, 1, 1, 1]);
        let mut after = before.clone();
        after.push(InstanceFactory::create("gpt-4o", 5));

        let ips: Vec<String> = (0..1000).map(|i| format!("172.16.{}.{}", i / 250, i % 250)).collect();
        let mut moved = 0;
        for ip in &ips {
            let a = lb.select_instance(&before, Some(ip)).unwrap().clone();
            assert_eq!(lb.select_instance(&before, Some(ip)).unwrap(), &a);
            let b = lb.select_instance(&after, Some(ip)).unwrap();
            if &a != b {
                moved += 1;
            }
        }

        // ideal remap is 1/5 of clients
        assert!(moved < 350, "{} of 1000 clients moved", moved);
    }

    /// A missing client IP degrades to weighted random instead of failing
    #[test]
    fn test_ip_hash_without_ip() {
        let instances = InstanceFactory::weighted("gpt-4o", &[1, 1]);
        let lb = balancer("ip-hash");
        assert!(lb.select_instance(&instances, None).is_ok());
        assert!(lb.select_instance(&instances, Some("  ")).is_ok());
    }
}
