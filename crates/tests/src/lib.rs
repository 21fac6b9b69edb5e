//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置快照测试
//! - 模拟 e2e 测试（mock 上游 → 导入 → 存储 → 回放）
//! - 并发导入与失败场景

#[cfg(test)]
mod fixtures;

#[cfg(test)]
mod config_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::ServiceConfig;

    #[test]
    fn test_default_config_roundtrips_through_toml() {
        let config = ServiceConfig::default();
        let toml = ConfigLoader::to_toml(&config).unwrap();
        let parsed = ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap();
        assert_eq!(parsed.reconstruction, config.reconstruction);
        assert_eq!(parsed.upstream, config.upstream);
        assert_eq!(parsed.server.bind_addr(), "0.0.0.0:8000");
    }

    #[test]
    fn test_non_increasing_tolerances_rejected() {
        let json = r#"{ "reconstruction": { "tolerances_s": [1.0, 60.0, 60.0] } }"#;
        let err = ConfigLoader::load_from_str(json, ConfigFormat::Json).unwrap_err();
        assert!(err.to_string().contains("tolerances_s"));
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;

    use contracts::{ReconstructionTier, ServiceConfig};
    use ingestion::{IngestOutcome, MockConfig, MockProvider, SessionDetails};
    use server::ReplayService;
    use telemetry_store::{RowCounts, TelemetryStore};

    use crate::fixtures::{
        bahrain_listing, gate_session, grid_session, sparse_session, DRIVERS, T0,
    };

    struct Env {
        service: Arc<ReplayService<MockProvider>>,
        mock: Arc<MockProvider>,
        _dir: tempfile::TempDir,
    }

    fn env(config: MockConfig) -> Env {
        let dir = tempfile::tempdir().unwrap();
        let store = TelemetryStore::open_with(&dir.path().join("e2e.db"), 4, 8).unwrap();
        let mock = Arc::new(MockProvider::with_config(config));
        let service = Arc::new(ReplayService::new(
            store,
            Arc::clone(&mock),
            &ServiceConfig::default(),
        ));
        Env {
            service,
            mock,
            _dir: dir,
        }
    }

    async fn counts(env: &Env, key: &str) -> RowCounts {
        env.service.store().row_counts(key).await.unwrap()
    }

    /// Mock provider -> pipeline -> store -> reconstruction
    #[tokio::test]
    async fn test_full_grid_resolves_in_one_second_window() {
        let env = env(MockConfig::default());
        env.mock.insert_session("9158", grid_session(1200.0));

        let outcome = env
            .service
            .ingest_session("9158", Some("Bahrain GP"), Some("Bahrain"))
            .await
            .unwrap();
        assert!(matches!(outcome, IngestOutcome::Ingested(_)));

        let state = env
            .service
            .get_replay_state("9158", T0 + 400.0)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.tier, ReconstructionTier::Window { tolerance: 1.0 });
        assert_eq!(state.cars.len(), DRIVERS.len());

        let numbers: Vec<u32> = state.cars.iter().map(|c| c.driver_number).collect();
        let mut sorted = DRIVERS.to_vec();
        sorted.sort_unstable();
        assert_eq!(numbers, sorted);

        // DRIVERS[4] = 44 runs P5 with speed 204
        let hamilton = state.cars.iter().find(|c| c.driver_number == 44).unwrap();
        assert_eq!(hamilton.position, 5);
        assert_eq!(hamilton.speed, 204.0);
        assert_eq!(hamilton.gear, 7);
        assert!(!hamilton.brake);
    }

    #[tokio::test]
    async fn test_session_end_uses_last_known_positions() {
        let env = env(MockConfig::default());
        env.mock.insert_session("9158", grid_session(1200.0));
        env.service.ingest_session("9158", None, None).await.unwrap();

        let state = env
            .service
            .get_replay_state("9158", T0 + 1000.0)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.tier, ReconstructionTier::Fallback);
        assert_eq!(state.cars.len(), DRIVERS.len());

        let positions: Vec<u32> = state.cars.iter().map(|c| c.position).collect();
        assert_eq!(positions, (1..=20).collect::<Vec<u32>>());
        assert!(state.cars.iter().all(|c| c.timestamp <= T0 + 1000.0));
        assert_eq!(state.cars[0].timestamp, T0 + 1000.0);
        assert!(state.cars.iter().all(|c| c.speed > 0.0));
    }

    #[tokio::test]
    async fn test_leader_gate_widens_window() {
        let env = env(MockConfig::default());
        env.mock.insert_session("gate", gate_session());
        env.service.ingest_session("gate", None, None).await.unwrap();

        let state = env
            .service
            .get_replay_state("gate", T0 + 100.0)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.tier, ReconstructionTier::Window { tolerance: 10.0 });
        assert_eq!(state.cars.len(), 16);
        assert!(state.cars.iter().any(|c| c.position == 1));
    }

    #[tokio::test]
    async fn test_sparse_session_falls_back() {
        let env = env(MockConfig::default());
        env.mock.insert_session("sparse", sparse_session());
        env.service.ingest_session("sparse", None, None).await.unwrap();

        let state = env
            .service
            .get_replay_state("sparse", T0 + 2000.0)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.tier, ReconstructionTier::Fallback);
        assert_eq!(state.cars.len(), 3);
        assert!(state.cars.iter().all(|c| c.timestamp == T0));
        assert!(state.cars.iter().all(|c| c.speed == 0.0 && c.gear == 1));

        // Nothing at or before t
        let early = env
            .service
            .get_replay_state("sparse", T0 - 5000.0)
            .await
            .unwrap()
            .unwrap();
        assert!(early.cars.is_empty());

        assert!(env
            .service
            .get_replay_state("unknown", T0)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_telemetry_failure_still_ingests() {
        let env = env(MockConfig {
            fail_car_data: true,
            ..Default::default()
        });
        env.mock.insert_session("9158", grid_session(120.0));

        let outcome = env.service.ingest_session("9158", None, None).await.unwrap();
        let IngestOutcome::Ingested(report) = outcome else {
            panic!("expected ingest, got {outcome:?}");
        };
        assert!(!report.telemetry_available);

        let rows = counts(&env, "9158").await;
        assert_eq!(rows.telemetry, 0);
        assert!(rows.positions > 0);
        assert!(rows.laps > 0);
        assert_eq!(env.service.pipeline().metrics().telemetry_failures, 1);
    }

    #[tokio::test]
    async fn test_ingest_is_idempotent() {
        let env = env(MockConfig::default());
        env.mock.insert_session("9158", grid_session(120.0));

        env.service.ingest_session("9158", None, None).await.unwrap();
        let first = counts(&env, "9158").await;

        let second = env.service.ingest_session("9158", None, None).await.unwrap();
        assert_eq!(second, IngestOutcome::AlreadyPresent);
        assert_eq!(counts(&env, "9158").await, first);
        assert_eq!(env.mock.fetch_calls(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_ingest_writes_once() {
        let env = env(MockConfig {
            delay: Some(std::time::Duration::from_millis(50)),
            ..Default::default()
        });
        env.mock.insert_session("9158", grid_session(120.0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let service = Arc::clone(&env.service);
            handles.push(tokio::spawn(async move {
                service.ingest_session("9158", None, None).await.unwrap()
            }));
        }
        let mut ingested = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), IngestOutcome::Ingested(_)) {
                ingested += 1;
            }
        }

        assert_eq!(ingested, 1);
        assert_eq!(env.mock.position_calls(), 1);
        let rows = counts(&env, "9158").await;
        assert_eq!(rows.positions, 31 * DRIVERS.len() as u64);
    }

    #[tokio::test]
    async fn test_position_failure_leaves_nothing() {
        let env = env(MockConfig {
            fail_positions: true,
            ..Default::default()
        });
        env.mock.insert_session("9158", grid_session(120.0));

        assert!(env.service.ingest_session("9158", None, None).await.is_err());
        assert!(!env.service.store().session_exists("9158").await.unwrap());
        assert_eq!(counts(&env, "9158").await, RowCounts::default());
        assert!(env.service.get_timeline("9158").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_timeline_ordering_and_pit_stops() {
        let env = env(MockConfig::default());
        env.mock.insert_session("9158", grid_session(120.0));
        env.service.ingest_session("9158", None, None).await.unwrap();

        let timeline = env.service.get_timeline("9158").await.unwrap().unwrap();
        assert_eq!(timeline.total_laps, 3);
        assert_eq!(timeline.entries.len(), 3 * DRIVERS.len());

        let keys: Vec<(u32, u32)> = timeline
            .entries
            .iter()
            .map(|e| (e.lap, e.driver_number))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort_unstable();
        assert_eq!(keys, sorted);

        let pits: Vec<(u32, u32)> = timeline
            .entries
            .iter()
            .filter(|e| e.pit_stop)
            .map(|e| (e.lap, e.driver_number))
            .collect();
        assert_eq!(pits, vec![(2, 44)]);
    }

    #[tokio::test]
    async fn test_race_name_resolves_and_stores_upstream_metadata() {
        let env = env(MockConfig::default());
        env.mock.add_listing(bahrain_listing("7952", "Qualifying"));
        env.mock.add_listing(bahrain_listing("7953", "Race"));
        env.mock.insert_session("7953", grid_session(120.0));

        let key = env.service.load_demo("Bahrain GP 2023").await;
        assert_eq!(key.as_deref(), Some("7953"));
        assert_eq!(env.service.demo_session().as_deref(), Some("7953"));

        let session = env.service.store().session("7953").await.unwrap().unwrap();
        assert_eq!(session.metadata.country_name, "Bahrain");
        assert_eq!(session.metadata.year, 2023);
        assert_eq!(session.metadata.date_start, "2023-03-05T15:00:00+00:00");
        assert!(!env.service.store().session_exists("7952").await.unwrap());

        assert_eq!(
            env.service.ingest_by_race_name("Monaco 2024").await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_shutdown_closes_provider_and_stops_writes() {
        let env = env(MockConfig::default());
        env.mock.insert_session("9158", grid_session(120.0));
        env.service.shutdown().await.unwrap();

        assert!(env.mock.is_closed());
        assert!(env
            .service
            .pipeline()
            .ingest_session("9158", SessionDetails::default())
            .await
            .is_err());
    }
}
