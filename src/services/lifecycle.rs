//! Ownership of every deletion in the staging directory.
//!
//! Inputs are removed as soon as they are consumed. Converted outputs are
//! tracked per filename through `Pending -> Ready -> Downloaded -> Deleted`
//! and carry at most one pending deletion timer. Whoever moves an entry to
//! `Deleted` (timer, discard, or request cleanup) unlinks the file; the
//! transition happens under the entry lock so it happens exactly once.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::fs;
use tokio::task::AbortHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactState {
    /// Conversion still writing the output
    Pending,
    /// Converted, waiting for a download or expiry
    Ready,
    /// Served at least once, waiting for the serve timer
    Downloaded,
    /// Unlinked (tombstone until the sweeper purges it)
    Deleted,
}

/// Result of a single best-effort removal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    Removed,
    AlreadyGone,
    Failed(String),
}

impl CleanupOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, CleanupOutcome::Failed(_))
    }
}

/// Removes `path`, treating "not found" as success. Failures are logged.
pub async fn remove_path(path: &Path) -> CleanupOutcome {
    match fs::remove_file(path).await {
        Ok(()) => {
            tracing::debug!("Removed temp file {}", path.display());
            CleanupOutcome::Removed
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => CleanupOutcome::AlreadyGone,
        Err(e) => {
            tracing::error!("Failed to delete temp file {}: {}", path.display(), e);
            CleanupOutcome::Failed(e.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionReason {
    Expired,
    Discarded,
}

struct ArtifactEntry {
    path: PathBuf,
    state: ArtifactState,
    generation: u64,
    timer: Option<AbortHandle>,
    updated_at: DateTime<Utc>,
}

impl ArtifactEntry {
    fn new(path: PathBuf, state: ArtifactState) -> Self {
        Self {
            path,
            state,
            generation: 0,
            timer: None,
            updated_at: Utc::now(),
        }
    }

    fn transition(&mut self, state: ArtifactState) {
        self.state = state;
        self.updated_at = Utc::now();
    }
}

pub struct LifecycleManager {
    artifacts: DashMap<String, ArtifactEntry>,
    retention: Duration,
    generations: AtomicU64,
}

impl LifecycleManager {
    pub fn new(retention: Duration) -> Arc<Self> {
        Arc::new(Self {
            artifacts: DashMap::new(),
            retention,
            generations: AtomicU64::new(1),
        })
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Removes files that no entry owns (consumed inputs, partial outputs)
    pub async fn remove_now(&self, paths: &[PathBuf]) -> Vec<CleanupOutcome> {
        let mut outcomes = Vec::with_capacity(paths.len());
        for path in paths {
            outcomes.push(remove_path(path).await);
        }
        outcomes
    }

    pub fn state(&self, name: &str) -> Option<ArtifactState> {
        self.artifacts.get(name).map(|e| e.state)
    }

    /// True while an entry still owns the file (anything but `Deleted`)
    pub fn owns(&self, name: &str) -> bool {
        self.state(name)
            .is_some_and(|state| state != ArtifactState::Deleted)
    }

    pub fn has_pending_timer(&self, name: &str) -> bool {
        self.artifacts
            .get(name)
            .is_some_and(|e| e.timer.as_ref().is_some_and(|t| !t.is_finished()))
    }

    /// Reserves `name` for an output about to be written.
    ///
    /// Returns `false` if the name is already tracked, including tombstones,
    /// so callers pick another name.
    pub fn begin_output(&self, name: &str, path: PathBuf) -> bool {
        match self.artifacts.entry(name.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(ArtifactEntry::new(path, ArtifactState::Pending));
                true
            }
        }
    }

    /// `Pending -> Ready`, arming the expiry timer
    pub fn mark_ready(self: &Arc<Self>, name: &str) -> bool {
        let Some(mut entry) = self.artifacts.get_mut(name) else {
            return false;
        };
        if entry.state != ArtifactState::Pending {
            return false;
        }

        entry.transition(ArtifactState::Ready);
        self.arm_timer(name, &mut entry);
        tracing::info!(
            "Output {} ready, expires in {:?}",
            name,
            self.retention
        );
        true
    }

    /// Claims `name` for serving.
    ///
    /// `Ready` outputs switch to `Downloaded` and their expiry timer is
    /// replaced by a serve timer starting now. Repeat downloads keep the
    /// existing serve timer. Files present on disk but unknown to the
    /// registry are adopted as `Downloaded`; callers check the file exists
    /// first. `Pending` and `Deleted` outputs cannot be served.
    pub fn claim_for_download(self: &Arc<Self>, name: &str, path: PathBuf) -> bool {
        match self.artifacts.entry(name.to_string()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                match entry.state {
                    ArtifactState::Pending | ArtifactState::Deleted => false,
                    ArtifactState::Downloaded => true,
                    ArtifactState::Ready => {
                        entry.transition(ArtifactState::Downloaded);
                        self.arm_timer(name, entry);
                        true
                    }
                }
            }
            Entry::Vacant(vacant) => {
                let mut entry = ArtifactEntry::new(path, ArtifactState::Downloaded);
                self.arm_timer(name, &mut entry);
                vacant.insert(entry);
                true
            }
        }
    }

    /// Deletes a tracked output immediately (failed or abandoned conversion)
    pub async fn discard(&self, name: &str) -> Option<CleanupOutcome> {
        let path = self.claim_deletion(name, None)?;
        let outcome = remove_path(&path).await;
        tracing::info!(
            reason = ?DeletionReason::Discarded,
            "Discarded output {}: {:?}",
            name,
            outcome
        );
        Some(outcome)
    }

    async fn expire(&self, name: &str, generation: u64) {
        if let Some(path) = self.claim_deletion(name, Some(generation)) {
            let outcome = remove_path(&path).await;
            tracing::info!(
                reason = ?DeletionReason::Expired,
                "Expired output {}: {:?}",
                name,
                outcome
            );
        }
    }

    /// Moves the entry to `Deleted` and hands back the path to unlink.
    ///
    /// A timer only wins if its generation is still current; a timer that
    /// was replaced finds a newer generation and backs off.
    fn claim_deletion(&self, name: &str, timer_generation: Option<u64>) -> Option<PathBuf> {
        let mut entry = self.artifacts.get_mut(name)?;
        if entry.state == ArtifactState::Deleted {
            return None;
        }

        match timer_generation {
            Some(generation) => {
                if entry.generation != generation {
                    return None;
                }
                // The running timer is the caller; do not abort it.
                entry.timer = None;
            }
            None => {
                if let Some(timer) = entry.timer.take() {
                    timer.abort();
                }
            }
        }

        entry.transition(ArtifactState::Deleted);
        Some(entry.path.clone())
    }

    fn arm_timer(self: &Arc<Self>, name: &str, entry: &mut ArtifactEntry) {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let manager: Weak<Self> = Arc::downgrade(self);
        let retention = self.retention;
        let key = name.to_string();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(retention).await;
            if let Some(manager) = manager.upgrade() {
                manager.expire(&key, generation).await;
            }
        })
        .abort_handle();

        entry.generation = generation;
        if let Some(previous) = entry.timer.replace(handle) {
            previous.abort();
        }
    }

    /// Drops tombstones older than `age`; returns how many were removed
    pub fn purge_tombstones(&self, age: Duration) -> usize {
        let cutoff = Utc::now() - chrono::Duration::from_std(age).unwrap_or(chrono::Duration::zero());
        let before = self.artifacts.len();
        self.artifacts
            .retain(|_, e| !(e.state == ArtifactState::Deleted && e.updated_at <= cutoff));
        before - self.artifacts.len()
    }

    pub fn guard(self: &Arc<Self>) -> CleanupGuard {
        CleanupGuard {
            lifecycle: Arc::clone(self),
            inputs: Vec::new(),
            output: None,
            armed: true,
        }
    }
}

/// Per-request record of files to remove if the request does not finish.
///
/// Dropping an armed guard (error return, panic, or a cancelled request
/// future) schedules removal of every tracked input and discards the
/// tracked output.
pub struct CleanupGuard {
    lifecycle: Arc<LifecycleManager>,
    inputs: Vec<PathBuf>,
    output: Option<String>,
    armed: bool,
}

impl CleanupGuard {
    pub fn track(&mut self, path: PathBuf) {
        self.inputs.push(path);
    }

    pub fn track_output(&mut self, name: String) {
        self.output = Some(name);
    }

    /// The request finished; nothing will be removed on drop
    pub fn disarm(mut self) {
        self.armed = false;
    }

    /// Removes everything tracked now and waits for it
    pub async fn cleanup_now(mut self) -> Vec<CleanupOutcome> {
        self.armed = false;
        let mut outcomes = self.lifecycle.remove_now(&self.inputs).await;
        if let Some(name) = self.output.take() {
            if let Some(outcome) = self.lifecycle.discard(&name).await {
                outcomes.push(outcome);
            }
        }
        outcomes
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if !self.armed || (self.inputs.is_empty() && self.output.is_none()) {
            return;
        }

        let inputs = std::mem::take(&mut self.inputs);
        let output = self.output.take();
        tracing::warn!(
            "Request ended early, cleaning up {} input(s) and output {:?}",
            inputs.len(),
            output
        );

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let lifecycle = Arc::clone(&self.lifecycle);
                handle.spawn(async move {
                    lifecycle.remove_now(&inputs).await;
                    if let Some(name) = output {
                        lifecycle.discard(&name).await;
                    }
                });
            }
            Err(_) => {
                for path in &inputs {
                    remove_path_blocking(path);
                }
                if let Some(name) = output {
                    if let Some(path) = self.lifecycle.claim_deletion(&name, None) {
                        remove_path_blocking(&path);
                    }
                }
            }
        }
    }
}

/// [`remove_path`] for contexts without a runtime
fn remove_path_blocking(path: &Path) -> CleanupOutcome {
    match std::fs::remove_file(path) {
        Ok(()) => CleanupOutcome::Removed,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => CleanupOutcome::AlreadyGone,
        Err(e) => {
            tracing::error!("Failed to delete temp file {}: {}", path.display(), e);
            CleanupOutcome::Failed(e.to_string())
        }
    }
}
