//! Synthetic upload progress.
//!
//! The service gives no real progress, so while a request is outstanding a
//! background task nudges the session's progress forward by a random step
//! at a fixed interval. It never reaches 100 on its own; only the controller
//! sets 100 once the response is in.

use crate::models::{UploadSession, UploadState};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

/// Timing and bounds of the synthetic progress animation.
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Time between steps.
    pub tick: Duration,
    /// Largest single step; each step is in (0, max_increment].
    pub max_increment: f64,
    /// Value the animation stops at. Below 100.
    pub ceiling: f64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(120),
            max_increment: 12.0,
            ceiling: 95.0,
        }
    }
}

impl From<&crate::config::UploadConfig> for ProgressConfig {
    fn from(config: &crate::config::UploadConfig) -> Self {
        Self {
            tick: Duration::from_millis(config.progress_tick_ms),
            max_increment: config.progress_max_increment,
            ceiling: config.progress_ceiling,
        }
    }
}

/// Apply one progress step to the session owned by `attempt`.
///
/// No-op unless the session is still loading under the same attempt.
/// Returns whether the session changed.
pub fn advance(
    session: &watch::Sender<UploadSession>,
    attempt: u64,
    increment: f64,
    ceiling: f64,
) -> bool {
    session.send_if_modified(|s| {
        if s.attempt != attempt || s.state != UploadState::Loading {
            return false;
        }

        let next = (s.progress + increment).min(ceiling);
        if next > s.progress {
            s.progress = next;
            true
        } else {
            false
        }
    })
}

/// Handle to a running progress animation. Stops the task when dropped.
pub struct ProgressTicker {
    handle: Option<JoinHandle<()>>,
    attempt: u64,
}

impl ProgressTicker {
    /// Start animating the session for `attempt`.
    pub fn start(
        session: Arc<watch::Sender<UploadSession>>,
        attempt: u64,
        config: ProgressConfig,
    ) -> Self {
        debug!("Starting progress ticker for attempt {}", attempt);

        let handle = tokio::spawn(async move {
            let mut rng = StdRng::from_entropy();
            let mut timer = interval_at(Instant::now() + config.tick, config.tick);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                timer.tick().await;
                let increment = config.max_increment - rng.gen_range(0.0..config.max_increment);
                advance(&session, attempt, increment, config.ceiling);
            }
        });

        Self {
            handle: Some(handle),
            attempt,
        }
    }

    /// Stop the animation. Idempotent.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("Stopped progress ticker for attempt {}", self.attempt);
        }
    }

    #[allow(dead_code)] // Utility accessor
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        self.stop();
    }
}
