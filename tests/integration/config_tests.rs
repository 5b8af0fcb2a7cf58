//! Configuration integration tests

#[cfg(test)]
mod tests {
    use modelrouter::config::ServiceType;
    use modelrouter::core::load_balancer::LoadBalanceStrategy;
    use modelrouter::{Config, GatewayError, TrafficManager};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn example_path() -> std::path::PathBuf {
        std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("config/router.yaml.example")
    }

    /// The shipped example configuration loads and builds a traffic manager
    #[tokio::test]
    async fn test_example_config_builds_traffic_manager() {
        let config = Config::from_file(example_path()).await.unwrap();
        assert_eq!(config.gateway.services.len(), 3);

        let traffic = TrafficManager::new(config.gateway).unwrap();
        let status = traffic.load_balancer_status();
        assert_eq!(status[&ServiceType::Chat], LoadBalanceStrategy::RoundRobin);
        assert_eq!(status[&ServiceType::Embedding], LoadBalanceStrategy::IpHash);
        assert_eq!(status[&ServiceType::Rerank], LoadBalanceStrategy::LeastConnections);

        let limits = traffic.rate_limiter_status();
        assert_eq!(limits[&ServiceType::Rerank].algorithm, "warm-up");
        assert_eq!(limits[&ServiceType::Chat].algorithm, "token-bucket");

        let selection = traffic
            .select_instance(ServiceType::Chat, Some("qwen2.5-72b"), Some("10.9.8.7"))
            .unwrap();
        assert_eq!(selection.instance.base_url, "http://10.0.0.13:8000");
    }

    /// camelCase keys and service aliases are accepted
    #[test]
    fn test_camel_case_config() {
        let yaml = r#"
loadBalance:
  type: ip-hash
services:
  imgGen:
    instances:
      - name: sdxl
        baseUrl: http://10.0.5.1:7860
        weight: 3
"#;
        let config = Config::from_yaml_str(yaml).unwrap();
        let img = config.gateway.service(ServiceType::ImgGen).unwrap();
        assert_eq!(img.instances[0].base_url, "http://10.0.5.1:7860");
        assert_eq!(img.instances[0].weight, 3);
    }

    /// Invalid files are reported as configuration errors
    #[tokio::test]
    async fn test_invalid_file_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(
            b"services:\n  chat:\n    instances:\n      - name: gpt-4o\n        base_url: http://a\n        weight: 0\n",
        )
        .unwrap();

        let err = Config::from_file(file.path()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));

        let missing = Config::from_file("/nonexistent/router.yaml").await;
        assert!(matches!(missing, Err(GatewayError::Config(_))));
    }

    /// The serialized configuration parses back to the same value
    #[test]
    fn test_yaml_export() {
        let config = Config::from_yaml_str(&std::fs::read_to_string(example_path()).unwrap()).unwrap();
        let exported = config.to_yaml().unwrap();
        assert_eq!(Config::from_yaml_str(&exported).unwrap(), config);
    }
}
