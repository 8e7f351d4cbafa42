//! Shared lifecycle for long-running relay loops
//!
//! A [`Worker`] is one independently scheduled unit of execution: a spawned
//! tokio task running a caller-supplied body, plus the cancellation token that
//! body must honor. Both relays compose a worker instead of re-implementing
//! start/stop bookkeeping.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──start──► Running ──stop──► Stopping ──join──► Stopped
//!   │                                                    ▲
//!   └────────────────────────stop────────────────────────┘
//! ```
//!
//! Transitions only move forward. `start` outside Idle and `stop` outside
//! Running/Idle are no-ops.

use std::fmt;
use std::future::Future;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayState::Idle => write!(f, "Idle"),
            RelayState::Running => write!(f, "Running"),
            RelayState::Stopping => write!(f, "Stopping"),
            RelayState::Stopped => write!(f, "Stopped"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("{relay} task failed: {source}")]
    Join {
        relay: &'static str,
        #[source]
        source: JoinError,
    },
}

#[derive(Debug)]
pub struct Worker {
    name: &'static str,
    state: RelayState,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: RelayState::Idle,
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    /// Spawns `body` with this worker's cancellation token.
    ///
    /// Returns `false` without spawning unless the worker is Idle. Must be
    /// called from within a tokio runtime.
    pub fn start<F, Fut>(&mut self, body: F) -> bool
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.state != RelayState::Idle {
            warn!("{} start ignored in state {}", self.name, self.state);
            return false;
        }

        let name = self.name;
        let body = body(self.cancel.clone());
        self.task = Some(tokio::spawn(async move {
            debug!("{} task started", name);
            body.await;
            debug!("{} task finished", name);
        }));
        self.state = RelayState::Running;
        info!("{} running", self.name);
        true
    }

    /// Marks a worker that will never run (e.g. its resource failed to open) as Stopped.
    pub fn abandon(&mut self) {
        if self.state == RelayState::Idle {
            self.state = RelayState::Stopped;
        }
    }

    /// Cancels the body, waits for it to finish and ends Stopped.
    ///
    /// Returns `Ok(true)` if this call performed the shutdown, `Ok(false)` if
    /// there was nothing to stop. A panicked task is reported as an error, but
    /// the worker still ends Stopped.
    pub async fn stop(&mut self) -> Result<bool, RelayError> {
        match self.state {
            RelayState::Running => {}
            RelayState::Idle => {
                debug!("{} stopped before it was started", self.name);
                self.state = RelayState::Stopped;
                return Ok(false);
            }
            RelayState::Stopping | RelayState::Stopped => {
                debug!("{} stop ignored in state {}", self.name, self.state);
                return Ok(false);
            }
        }

        self.state = RelayState::Stopping;
        info!("Stopping {}", self.name);
        self.cancel.cancel();

        let result = match self.task.take() {
            Some(handle) => handle.await.map_err(|source| {
                error!("{} task did not finish cleanly: {}", self.name, source);
                RelayError::Join {
                    relay: self.name,
                    source,
                }
            }),
            None => Ok(()),
        };

        self.state = RelayState::Stopped;
        info!("{} stopped", self.name);
        result.map(|_| true)
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        // A worker dropped while running must not leave its task behind.
        self.cancel.cancel();
    }
}
