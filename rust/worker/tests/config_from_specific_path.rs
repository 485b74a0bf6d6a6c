use std::{io::Write, time::Duration};

use chroma_config::{registry::Registry, Configurable};
use figment::Jail;
use serial_test::serial;
use worker::{config::RootConfig, WorkerServer};

#[test]
#[serial]
fn test_config_from_specific_path() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "random_path.yaml",
            r#"
            query_service:
                service_name: "query-service"
                otel_endpoint: "http://jaeger:4317"
                otel_filters:
                    - crate_name: "chroma_log"
                      filter_level: "debug"
                my_port: 50051
                grpc_shutdown_grace_period: 30
                ingest:
                    entries_per_ledger: 1000
                    max_batch_size: 50
                    max_redeliveries: 5
                    redelivery_backoff_ms: 250
            "#,
        )?;
        let config = RootConfig::load_from_path("random_path.yaml");
        let query_service = config.query_service;
        assert_eq!(query_service.service_name, "query-service");
        assert_eq!(query_service.my_port, 50051);
        assert_eq!(query_service.otel_filters.len(), 1);
        assert_eq!(
            query_service.grpc_shutdown_grace_period,
            Duration::from_secs(30)
        );
        let ingest = query_service.ingest.expect("ingest is configured");
        assert_eq!(ingest.entries_per_ledger, 1000);
        assert_eq!(ingest.redelivery_backoff_ms, 250);
        Ok(())
    });
}

#[test]
#[serial]
fn test_config_outside_working_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("worker.yaml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "query_service:\n    my_port: 50100").unwrap();

    let config = RootConfig::try_load_from_path(path.to_str().unwrap()).unwrap();
    assert_eq!(config.query_service.my_port, 50100);
    assert_eq!(config.query_service.service_name, "query-service");
}

#[tokio::test]
#[serial]
async fn test_worker_from_loaded_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("worker.yaml");
    std::fs::write(&path, "query_service:\n    ingest: {}\n").unwrap();

    let config = RootConfig::try_load_from_path(path.to_str().unwrap())
        .unwrap()
        .query_service;
    assert!(config.ingest.is_some());
    let registry = Registry::new();
    WorkerServer::try_from_config(&config, &registry)
        .await
        .unwrap();
    assert!(registry.contains::<chroma_log::Log>());
}
