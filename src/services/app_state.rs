//! Persisted application-state tracker.
//!
//! Keeps run bookkeeping across restarts so an unclean shutdown of the
//! previous run can be reported on the next start.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::services::{Service, ServiceError};

const NAME: &str = "app-state";

/// State written to disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    pub run_count: u64,
    /// Seconds since the Unix epoch.
    pub last_started_at: u64,
    pub clean_shutdown: bool,
}

/// Tracks run count and clean-shutdown status.
pub struct AppStateTracker {
    path: Option<PathBuf>,
    state: Mutex<PersistedState>,
}

impl AppStateTracker {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            state: Mutex::new(PersistedState::default()),
        }
    }

    pub fn snapshot(&self) -> PersistedState {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn io_error(source: std::io::Error) -> ServiceError {
        ServiceError::Io {
            service: NAME.to_string(),
            source,
        }
    }

    async fn load(path: &Path) -> Result<Option<PersistedState>, ServiceError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(state) => Ok(Some(state)),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Discarding unreadable application state");
                    Ok(None)
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::io_error(e)),
        }
    }

    async fn persist(&self, state: &PersistedState) -> Result<(), ServiceError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(Self::io_error)?;
        }
        let bytes = serde_json::to_vec_pretty(state).map_err(|e| ServiceError::Stop {
            service: NAME.to_string(),
            reason: e.to_string(),
        })?;
        tokio::fs::write(path, bytes).await.map_err(Self::io_error)
    }
}

#[async_trait]
impl Service for AppStateTracker {
    fn name(&self) -> &str {
        NAME
    }

    async fn initialize(&self, cancel: CancellationToken) -> Result<(), ServiceError> {
        let previous = match &self.path {
            Some(path) => tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(ServiceError::Cancelled { service: NAME.to_string() });
                }
                loaded = Self::load(path) => loaded?,
            },
            None => None,
        };

        let mut next = previous.clone().unwrap_or_default();
        if let Some(previous) = &previous {
            if !previous.clean_shutdown {
                tracing::warn!(
                    run_count = previous.run_count,
                    "Previous run did not shut down cleanly"
                );
            }
        }
        next.run_count += 1;
        next.last_started_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        next.clean_shutdown = false;

        self.persist(&next).await?;
        tracing::info!(run_count = next.run_count, "Application state loaded");
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
        Ok(())
    }

    async fn stop(&self) -> Result<(), ServiceError> {
        let state = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            // Never initialized: leave the previous run's record untouched.
            if state.run_count == 0 {
                return Ok(());
            }
            state.clean_shutdown = true;
            state.clone()
        };
        self.persist(&state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counts_runs_and_marks_clean() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let first = AppStateTracker::new(Some(path.clone()));
        first.initialize(CancellationToken::new()).await.unwrap();
        assert_eq!(first.snapshot().run_count, 1);
        assert!(!first.snapshot().clean_shutdown);
        first.stop().await.unwrap();

        let second = AppStateTracker::new(Some(path.clone()));
        second.initialize(CancellationToken::new()).await.unwrap();
        assert_eq!(second.snapshot().run_count, 2);

        let on_disk: PersistedState = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert!(!on_disk.clean_shutdown);
    }

    #[tokio::test]
    async fn test_corrupt_state_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, b"{not json").unwrap();

        let tracker = AppStateTracker::new(Some(path));
        tracker.initialize(CancellationToken::new()).await.unwrap();
        assert_eq!(tracker.snapshot().run_count, 1);
    }

    #[tokio::test]
    async fn test_in_memory_only() {
        let tracker = AppStateTracker::new(None);
        tracker.initialize(CancellationToken::new()).await.unwrap();
        tracker.stop().await.unwrap();
        assert!(tracker.snapshot().clean_shutdown);
    }
}
