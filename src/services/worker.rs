use crate::services::lifecycle::{CleanupOutcome, LifecycleManager, remove_path};
use crate::services::staging::StagingArea;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::watch;
use tokio::time::{Duration, sleep};

/// What one pass over the staging directory did
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub removed: usize,
    /// Files still owned by a lifecycle entry or not old enough
    pub skipped: usize,
    pub failed: usize,
    pub tombstones_purged: usize,
}

/// Periodically removes staging files nothing owns anymore, such as
/// outputs whose timers died with a previous process.
pub struct StagingSweeper {
    staging: Arc<StagingArea>,
    lifecycle: Arc<LifecycleManager>,
    shutdown: watch::Receiver<bool>,
}

impl StagingSweeper {
    pub fn new(
        staging: Arc<StagingArea>,
        lifecycle: Arc<LifecycleManager>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            staging,
            lifecycle,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        let interval = self.staging.config().sweep_interval;
        tracing::info!("🚀 Staging sweeper started (every {:?})", interval);

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    tracing::info!("🛑 Staging sweeper shutting down");
                    break;
                }
                _ = sleep(interval) => {
                    self.perform_sweep().await;
                }
            }
        }
    }

    pub async fn perform_sweep(&self) -> SweepReport {
        tracing::info!("🧹 Sweeping staging directory {}", self.staging.dir().display());

        let mut report = SweepReport::default();
        let orphan_age = self.staging.config().orphan_age;

        let mut entries = match tokio::fs::read_dir(self.staging.dir()).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return report,
            Err(e) => {
                tracing::error!("Failed to read staging directory: {}", e);
                return report;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("Failed to read staging entry: {}", e);
                    break;
                }
            };

            let Ok(metadata) = entry.metadata().await else {
                report.failed += 1;
                continue;
            };
            if !metadata.is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            if self.lifecycle.owns(&name) {
                report.skipped += 1;
                continue;
            }

            let age = metadata
                .modified()
                .ok()
                .and_then(|m| SystemTime::now().duration_since(m).ok())
                .unwrap_or(Duration::ZERO);
            if age < orphan_age {
                report.skipped += 1;
                continue;
            }

            match remove_path(&entry.path()).await {
                CleanupOutcome::Removed => {
                    tracing::info!("Swept orphaned file {} (age {:?})", name, age);
                    report.removed += 1;
                }
                CleanupOutcome::AlreadyGone => {}
                CleanupOutcome::Failed(_) => report.failed += 1,
            }
        }

        report.tombstones_purged = self.lifecycle.purge_tombstones(self.lifecycle.retention());

        tracing::info!(
            removed = report.removed,
            skipped = report.skipped,
            failed = report.failed,
            tombstones = report.tombstones_purged,
            "✅ Staging sweep completed"
        );
        report
    }
}
