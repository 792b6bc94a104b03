use std::{sync::Arc, time::Duration};

use anyhow::Context;
use tracing::{info, warn};

use lockable_core::{LockManager, ManagerConfig, Subscribe};
use lockable_model::{TargetSpec, TaskId};
use lockable_observe::{Journal, LoggerConfig, logger_init};
use lockable_prometheus::PrometheusMetrics;

const CONFIG: &str = r#"{
    "resources": [
        {"name": "r1", "labels": ["build"], "note": "primary build host"},
        {"name": "r2", "labels": ["build"]}
    ]
}"#;

const GRACE: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1) Logger
    let cfg = LoggerConfig {
        level: "info,lockable_observe=debug".to_string(),
        ..Default::default()
    };
    logger_init(&cfg)?;
    info!("logger initialized");

    // 2) Manager
    let config = match std::env::args().nth(1) {
        Some(path) => ManagerConfig::from_path(&path).with_context(|| format!("load {path}"))?,
        None => ManagerConfig::from_json_str(CONFIG)?,
    };
    let metrics = PrometheusMetrics::new()?;
    let subscribers: Vec<Arc<dyn Subscribe>> = vec![Arc::new(Journal::new())];
    let manager = LockManager::builder(config)
        .with_subscribers(subscribers)
        .with_metrics(Arc::new(metrics.clone()))
        .build()?;
    info!("lock manager ready");

    // 3) A task that takes r1 and never lets go, even when asked to stop
    let stuck = TaskId::from("stuck");
    let guard = manager.lock(&stuck, TargetSpec::name("r1")).await?;
    let stop = manager.stop_token(&stuck);
    let hog = tokio::spawn(async move {
        stop.cancelled().await;
        warn!("stuck task saw the stop signal and ignores it");
        tokio::time::sleep(Duration::from_secs(3600)).await;
        drop(guard);
    });

    // 4) A well-behaved task that needs r1
    let waiter = {
        let manager = manager.clone();
        tokio::spawn(async move {
            let task = TaskId::from("waiter");
            let guard = manager.lock(&task, TargetSpec::name("r1")).await?;
            info!(resources = ?guard.resources(), "waiter acquired its lock");
            tokio::time::sleep(Duration::from_millis(50)).await;
            guard.release()?;
            anyhow::Ok(())
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    // 5) Ask nicely, then kill
    manager.request_stop(&stuck);
    tokio::time::sleep(GRACE).await;
    if !manager.task_requests(&stuck).is_empty() {
        let report = manager.force_terminate(&stuck);
        info!(
            released = report.released.len(),
            cancelled = report.cancelled.len(),
            "stuck task terminated"
        );
    }
    hog.abort();

    tokio::time::timeout(Duration::from_secs(5), waiter)
        .await
        .context("waiter did not get r1 after the kill")???;

    // 6) Metrics snapshot
    println!("{}", metrics.encode_text()?);
    Ok(())
}
