use std::time::Duration;

use tidewatch::Pipeline;
use tidewatch_config::TidewatchConfig;
use tidewatch_health::Status;

fn test_config(db_path: std::path::PathBuf) -> TidewatchConfig {
    let mut config = TidewatchConfig::default();
    config.device.id = "test-device".to_string();
    config.storage.path = db_path.to_string_lossy().into_owned();
    config.remote.enabled = false;
    config.health.enabled = true;
    config.health.port = 0;
    for name in ["cpu", "memory", "disk", "network", "thermal", "load", "uptime"] {
        config.collectors.entries.insert(
            name.to_string(),
            tidewatch_config::CollectorConfig {
                enabled: true,
                interval: tidewatch_config::HumanDuration::from_secs(1),
            },
        );
    }
    config
}

/// Starts the whole pipeline against a real filesystem store and lets
/// collectors run a couple of ticks against the real `/proc`/`/sys`, then
/// shuts everything down cleanly. This exercises the wiring this crate is
/// responsible for, not collector correctness (that's covered where each
/// collector is unit tested against `FakeReader`).
#[tokio::test]
async fn pipeline_starts_collects_and_shuts_down_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path().join("metrics.db"));

    let pipeline = Pipeline::start(config).await.expect("pipeline starts");
    let health = pipeline.health();

    tokio::time::sleep(Duration::from_millis(1500)).await;

    let report = health.report();
    assert_ne!(report.overall, Status::Error, "pipeline should not be in error state with uploads disabled");

    pipeline.shutdown().await;
}
