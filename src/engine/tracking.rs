//! Periodic location reporting for an agent.
//!
//! A tracker runs as its own task and stops when it has sent the configured
//! number of updates, when too many consecutive readings fail, or when its
//! handle is cancelled or dropped.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::coordinator::Coordinator;
use crate::models::agent::Location;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("position unavailable: {0}")]
    Unavailable(String),
}

/// Device geolocation collaborator.
#[async_trait]
pub trait LocationSource: Send + Sync {
    async fn current_location(&self, agent_id: Uuid) -> Result<Location, LocationError>;
}

#[derive(Debug, Clone)]
pub struct TrackingConfig {
    pub interval: Duration,
    pub max_updates: u32,
    pub max_consecutive_failures: u32,
    /// First retry delay after a failed reading; doubles per failure, capped
    /// at `interval`.
    pub failure_backoff: Duration,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(100),
            max_updates: 3,
            max_consecutive_failures: 5,
            failure_backoff: Duration::from_secs(5),
        }
    }
}

impl TrackingConfig {
    fn backoff(&self, failures: u32) -> Duration {
        let factor = 2u32.saturating_pow(failures.saturating_sub(1));
        self.failure_backoff
            .saturating_mul(factor)
            .min(self.interval)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingOutcome {
    Completed { updates: u32 },
    Cancelled { updates: u32 },
    Failed { updates: u32, failures: u32 },
}

pub struct TrackingHandle {
    agent_id: Uuid,
    cancel: watch::Sender<bool>,
    task: JoinHandle<TrackingOutcome>,
}

impl TrackingHandle {
    pub fn agent_id(&self) -> Uuid {
        self.agent_id
    }

    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the tracker to stop.
    pub async fn join(self) -> TrackingOutcome {
        let updates_unknown = TrackingOutcome::Cancelled { updates: 0 };
        // Keep the sender alive until the task is done so it is not read as
        // a cancellation.
        let _cancel = self.cancel;
        self.task.await.unwrap_or(updates_unknown)
    }
}

pub fn spawn_tracker(
    coordinator: Arc<Coordinator>,
    source: Arc<dyn LocationSource>,
    agent_id: Uuid,
    config: TrackingConfig,
) -> TrackingHandle {
    let (cancel, cancel_rx) = watch::channel(false);
    let task = tokio::spawn(run_tracker(coordinator, source, agent_id, config, cancel_rx));

    TrackingHandle {
        agent_id,
        cancel,
        task,
    }
}

async fn run_tracker(
    coordinator: Arc<Coordinator>,
    source: Arc<dyn LocationSource>,
    agent_id: Uuid,
    config: TrackingConfig,
    mut cancel_rx: watch::Receiver<bool>,
) -> TrackingOutcome {
    let metrics = coordinator.metrics.clone();
    metrics.active_trackers.inc();
    info!(agent_id = %agent_id, max_updates = config.max_updates, "location tracking started");

    let mut updates = 0;
    let mut failures = 0;
    let mut delay = config.interval;

    let outcome = loop {
        if updates >= config.max_updates {
            break TrackingOutcome::Completed { updates };
        }

        tokio::select! {
            changed = cancel_rx.changed() => {
                if changed.is_err() || *cancel_rx.borrow() {
                    break TrackingOutcome::Cancelled { updates };
                }
                continue;
            }
            _ = sleep(delay) => {}
        }

        let reported = match source.current_location(agent_id).await {
            Ok(location) => coordinator
                .update_agent_location(agent_id, location)
                .await
                .map_err(|err| err.to_string()),
            Err(err) => Err(err.to_string()),
        };

        match reported {
            Ok(_) => {
                updates += 1;
                failures = 0;
                delay = config.interval;
                debug!(agent_id = %agent_id, updates, "location reported");
            }
            Err(err) => {
                failures += 1;
                warn!(agent_id = %agent_id, failures, error = %err, "location update failed");
                if failures >= config.max_consecutive_failures {
                    break TrackingOutcome::Failed { updates, failures };
                }
                delay = config.backoff(failures);
            }
        }
    };

    metrics.active_trackers.dec();
    info!(agent_id = %agent_id, outcome = ?outcome, "location tracking stopped");
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps_at_interval() {
        let config = TrackingConfig {
            interval: Duration::from_secs(30),
            max_updates: 3,
            max_consecutive_failures: 5,
            failure_backoff: Duration::from_secs(5),
        };
        assert_eq!(config.backoff(1), Duration::from_secs(5));
        assert_eq!(config.backoff(2), Duration::from_secs(10));
        assert_eq!(config.backoff(3), Duration::from_secs(20));
        assert_eq!(config.backoff(4), Duration::from_secs(30));
    }

    #[test]
    fn defaults_follow_three_updates_per_five_minutes() {
        let config = TrackingConfig::default();
        assert_eq!(config.max_updates, 3);
        assert!(config.interval * config.max_updates <= Duration::from_secs(300));
    }
}
