//! Background refresh scheduling.
//!
//! A single interval task drives all periodic reloads. It never restarts
//! when callbacks or filters change: it reads the current targets through a
//! [`Latest`] handle at fire time, so the timer closure cannot go stale.

use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Shared single-slot cell; written on every relevant state change and
/// dereferenced inside timer callbacks at call time.
#[derive(Debug)]
pub struct Latest<T>(Arc<RwLock<T>>);

impl<T> Latest<T> {
    pub fn new(value: T) -> Self {
        Self(Arc::new(RwLock::new(value)))
    }

    pub fn set(&self, value: T) {
        if let Ok(mut slot) = self.0.write() {
            *slot = value;
        }
    }
}

impl<T: Clone> Latest<T> {
    pub fn get(&self) -> T {
        self.0
            .read()
            .map(|slot| slot.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl<T> Clone for Latest<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

/// What the poller needs to know at each fire, kept current by the owner.
#[derive(Debug, Clone, Default)]
pub struct PollTargets {
    /// An execution is streaming; skip the whole tick to avoid redundant
    /// load and flicker.
    pub running: bool,
    /// A task-status filter is active, so the filtered task list is the
    /// visible content instead of the transcript.
    pub task_filter_active: bool,
    /// Nothing to refresh without a selected session.
    pub session_id: Option<String>,
}

/// One poll firing, already resolved against the current targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollTick {
    pub refresh_messages: bool,
    pub refresh_inline_tasks: bool,
    pub refresh_task_counts: bool,
    pub refresh_sessions: bool,
}

/// Spawn the interval task. Callers clamp `period` to their configured
/// bounds; the task itself runs until the receiver drops.
pub fn spawn_poller(
    period: Duration,
    targets: Latest<PollTargets>,
    tx: mpsc::Sender<PollTick>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first interval tick fires immediately; the initial load is the
        // owner's job, not the poller's.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let current = targets.get();
            if current.session_id.is_none() {
                continue;
            }
            if current.running {
                tracing::debug!("poll tick skipped (running)");
                continue;
            }
            let tick = PollTick {
                refresh_messages: !current.task_filter_active,
                refresh_inline_tasks: current.task_filter_active,
                refresh_task_counts: true,
                refresh_sessions: true,
            };
            if tx.send(tick).await.is_err() {
                break;
            }
        }
    })
}
