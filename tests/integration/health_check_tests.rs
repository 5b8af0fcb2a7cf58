//! Health checking integration tests over real sockets

#[cfg(test)]
mod tests {
    use crate::common::{ConfigFactory, InstanceFactory};
    use modelrouter::config::{HealthCheckConfig, ModelInstance, ServiceConfig, ServiceType};
    use modelrouter::core::health::{HealthChecker, ServiceStateManager};
    use modelrouter::core::registry::ModelServiceRegistry;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::net::TcpListener;

    async fn listener() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    async fn closed_port() -> u16 {
        let (listener, port) = listener().await;
        drop(listener);
        port
    }

    fn checker(registry: Arc<ModelServiceRegistry>, state: Arc<ServiceStateManager>) -> HealthChecker {
        HealthChecker::new(
            registry,
            state,
            HealthCheckConfig {
                enabled: true,
                interval_secs: 1,
                connect_timeout_ms: 500,
            },
        )
    }

    /// A malformed URL marks its instance unhealthy without stopping the batch
    #[tokio::test]
    async fn test_bad_url_is_isolated() {
        let (_up, up_port) = listener().await;
        let down_port = closed_port().await;

        let mut config = ConfigFactory::chat(vec![
            ModelInstance::new("gpt-4o", "not a url", "/v1"),
            InstanceFactory::local("gpt-4o", up_port),
            InstanceFactory::local("gpt-4o", down_port),
        ]);
        config.services.insert(
            ServiceType::Embedding,
            ServiceConfig::with_instances(vec![ModelInstance::new("bge", "ftp://10.0.0.1", "")]),
        );

        let registry = Arc::new(ModelServiceRegistry::from_config(&config));
        let state = Arc::new(ServiceStateManager::new());
        let snapshot = checker(Arc::clone(&registry), Arc::clone(&state)).check_all().await;

        assert_eq!(snapshot.instances.get("not a url/v1"), Some(&false));
        assert_eq!(snapshot.instances.get(&format!("http://127.0.0.1:{}/v1", up_port)), Some(&true));
        assert_eq!(snapshot.instances.get(&format!("http://127.0.0.1:{}/v1", down_port)), Some(&false));
        assert!(state.is_service_healthy(ServiceType::Chat));
        assert!(!state.is_service_healthy(ServiceType::Embedding));
    }

    /// The periodic checker picks up an instance going down
    #[tokio::test]
    async fn test_periodic_checker_tracks_changes() {
        let (up, port) = listener().await;
        let config = ConfigFactory::chat(vec![InstanceFactory::local("gpt-4o", port)]);
        let registry = Arc::new(ModelServiceRegistry::from_config(&config));
        let state = Arc::new(ServiceStateManager::new());
        let key = format!("http://127.0.0.1:{}/v1", port);

        let handle = Arc::new(checker(registry, Arc::clone(&state))).start();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(state.is_instance_healthy(&key));

        drop(up);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!state.is_instance_healthy(&key));
        assert!(!state.is_service_healthy(ServiceType::Chat));

        handle.abort();
    }
}
