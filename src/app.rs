//! Application lifecycle: start the executor, wait for a stop request,
//! drain and release resources in order

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::collaborators::Collaborators;
use crate::config::Config;
use crate::database::Database;
use crate::errors::AppError;
use crate::models::HealthStatus;
use crate::scheduling::{JobContext, JobRegistry, SchedulerExecutor};

pub struct LifecycleController {
    context: JobContext,
    executor: Arc<SchedulerExecutor>,
    stop_token: CancellationToken,
    is_running: AtomicBool,
}

impl LifecycleController {
    pub fn new(
        config: Arc<Config>,
        database: Database,
        collaborators: Arc<Collaborators>,
        registry: JobRegistry,
    ) -> Self {
        let context = JobContext {
            config: config.clone(),
            database,
            collaborators,
        };
        let executor = Arc::new(SchedulerExecutor::new(
            registry,
            context.clone(),
            config.scheduling.misfire_grace_seconds,
        ));
        Self {
            context,
            executor,
            stop_token: CancellationToken::new(),
            is_running: AtomicBool::new(false),
        }
    }

    /// Run the flywheel until a stop is requested, then drain and close
    ///
    /// Idempotent: a second concurrent call returns immediately.
    pub async fn start(&self) -> Result<(), AppError> {
        if self.is_running.swap(true, Ordering::SeqCst) {
            info!("lifecycle start ignored, already running");
            return Ok(());
        }

        self.install_signal_handler();

        if let Err(e) = self.executor.start().await {
            self.record_health(HealthStatus::Fail, &format!("scheduler_start_failed: {e}"))
                .await;
            self.shutdown_resources().await;
            return Err(e);
        }
        self.record_health(HealthStatus::Pass, "scheduler_started").await;
        info!("flywheel running, waiting for stop request");

        self.stop_token.cancelled().await;

        self.shutdown_resources().await;
        Ok(())
    }

    /// Request a stop; safe to call from any task, more than once
    ///
    /// Records a warn health row for the request before the shutdown
    /// sequence begins.
    pub fn stop(&self) {
        if self.stop_token.is_cancelled() {
            return;
        }
        warn!("stop requested");
        record_stop_requested(self.context.database.clone());
        self.stop_token.cancel();
    }

    /// Current scheduler view for operators
    pub fn health_snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "running": self.is_running.load(Ordering::SeqCst),
            "scheduler": self.executor.snapshot(),
        })
    }

    fn install_signal_handler(&self) {
        let token = self.stop_token.clone();
        let database = self.context.database.clone();
        tokio::spawn(async move {
            wait_for_stop_signal().await;
            if token.is_cancelled() {
                return;
            }
            warn!("shutdown signal received");
            record_stop_requested(database);
            token.cancel();
        });
    }

    async fn shutdown_resources(&self) {
        if let Err(e) = self.executor.shutdown().await {
            error!("scheduler shutdown failed: {e}");
        }
        self.context.database.close().await;
        self.is_running.store(false, Ordering::SeqCst);
        info!("flywheel stopped");
    }

    async fn record_health(&self, status: HealthStatus, detail: &str) {
        if let Err(e) = self
            .context
            .database
            .record_health("flywheel", status, Some(detail))
            .await
        {
            error!("failed to record lifecycle health: {e}");
        }
    }
}

fn record_stop_requested(database: Database) {
    tokio::spawn(async move {
        if let Err(e) = database
            .record_health("flywheel", HealthStatus::Warn, Some("stop_requested"))
            .await
        {
            error!("failed to record stop request: {e}");
        }
    });
}

#[cfg(unix)]
async fn wait_for_stop_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            error!("failed to install SIGTERM handler: {e}");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_stop_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::testing::test_collaborators;
    use crate::database::test_database;
    use crate::jobs;
    use std::time::Duration;

    fn test_config(root: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.storage.download_dir = root.join("downloads");
        config.storage.render_dir = root.join("renders");
        config.storage.outbox_dir = root.join("outbox");
        config
    }

    #[tokio::test]
    async fn test_start_runs_until_stop_and_drains() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Arc::new(test_config(tmp.path()));
        let database = test_database().await;
        let registry = jobs::build_registry(&config).expect("registry");
        let controller = Arc::new(LifecycleController::new(
            config,
            database.clone(),
            test_collaborators(),
            registry,
        ));

        let runner = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.start().await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(controller.health_snapshot()["running"].as_bool().unwrap());

        controller.stop();
        tokio::time::timeout(Duration::from_secs(5), runner)
            .await
            .expect("stop within timeout")
            .expect("runner join")
            .expect("clean shutdown");

        assert!(!controller.health_snapshot()["running"].as_bool().unwrap());
    }

    #[tokio::test]
    async fn test_stop_records_warn_health_row() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Arc::new(test_config(tmp.path()));
        let database = test_database().await;
        let registry = jobs::build_registry(&config).expect("registry");
        let controller =
            LifecycleController::new(config, database.clone(), test_collaborators(), registry);

        controller.stop();

        // The row is written on a spawned task; poll for it
        let mut health = None;
        for _ in 0..20 {
            health = database.latest_health("flywheel").await.unwrap();
            if health.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        let health = health.expect("stop must record a health row");
        assert_eq!(health.status, HealthStatus::Warn);
        assert_eq!(health.detail.as_deref(), Some("stop_requested"));
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Arc::new(test_config(tmp.path()));
        let database = test_database().await;
        let registry = jobs::build_registry(&config).expect("registry");
        let controller = LifecycleController::new(config, database, test_collaborators(), registry);

        controller.stop();
        controller.stop();
        assert!(controller.stop_token.is_cancelled());
    }
}
