//! Session lifecycle coordination
//!
//! Owns both relays and sequences them around the session:
//!
//! ```text
//! run:       session.start ──► controller.start ──► frames.start
//! shutdown:  controller.stop (neutralize) ──► frames.stop (detach) ──► session.stop
//! ```
//!
//! Shutdown runs every step even if an earlier one fails and reports the
//! first failure. Both operations take `&self`, so a coordinator shared
//! through an `Arc` can be shut down from any task.

use crate::config::ShellConfig;
use crate::controller::{ControllerDevice, ControllerRelay, ControllerRelayError};
use crate::frame::{FrameRelay, PresentationSurface};
use crate::relay::{RelayError, RelayState};
use crate::session::{SessionError, SessionEvent, SessionHandle};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Controller relay error: {0}")]
    Controller(#[from] ControllerRelayError),

    #[error("Frame relay error: {0}")]
    Frame(#[from] RelayError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorPhase {
    Idle,
    Running,
    Stopped,
}

impl fmt::Display for CoordinatorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordinatorPhase::Idle => write!(f, "Idle"),
            CoordinatorPhase::Running => write!(f, "Running"),
            CoordinatorPhase::Stopped => write!(f, "Stopped"),
        }
    }
}

struct EventForwarder {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl EventForwarder {
    fn spawn(receiver: broadcast::Receiver<SessionEvent>) -> Self {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(forward_events(receiver, cancel.clone()));
        Self { cancel, task }
    }

    async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!("Session event task did not finish cleanly: {}", e);
        }
    }
}

struct Inner {
    phase: CoordinatorPhase,
    controller: ControllerRelay,
    frames: FrameRelay,
    events: Option<EventForwarder>,
}

pub struct SessionCoordinator {
    session: Arc<dyn SessionHandle>,
    inner: Mutex<Inner>,
}

impl SessionCoordinator {
    pub fn new(
        session: Arc<dyn SessionHandle>,
        device: Box<dyn ControllerDevice>,
        surface: Arc<dyn PresentationSurface>,
        config: &ShellConfig,
    ) -> Self {
        let controller =
            ControllerRelay::new(session.clone(), device, config.controller.clone());
        let frames = FrameRelay::new(session.clone(), surface, config.frame.clone());
        Self {
            session,
            inner: Mutex::new(Inner {
                phase: CoordinatorPhase::Idle,
                controller,
                frames,
                events: None,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.session.subscribe()
    }

    pub async fn phase(&self) -> CoordinatorPhase {
        self.inner.lock().await.phase
    }

    /// States of the controller and frame relays, in that order.
    pub async fn relay_states(&self) -> (RelayState, RelayState) {
        let inner = self.inner.lock().await;
        (inner.controller.state(), inner.frames.state())
    }

    /// Starts the session, then the controller relay, then the frame relay.
    ///
    /// If the controller cannot be started everything already started is
    /// torn down again and the error is returned.
    pub async fn run(&self) -> Result<(), CoordinatorError> {
        let mut inner = self.inner.lock().await;
        if inner.phase != CoordinatorPhase::Idle {
            warn!("Coordinator run ignored in phase {}", inner.phase);
            return Ok(());
        }

        info!("Starting session");
        // Subscribe first so the connect events are not missed.
        let events = EventForwarder::spawn(self.session.subscribe());

        if let Err(e) = self.session.start() {
            error!("Session failed to start: {}", e);
            events.stop().await;
            inner.phase = CoordinatorPhase::Stopped;
            return Err(e.into());
        }

        if let Err(e) = inner.controller.start() {
            error!("Controller relay failed to start: {}", e);
            if self.session.is_connected() {
                if let Err(stop_err) = self.session.stop() {
                    warn!("Session stop after failed startup also failed: {}", stop_err);
                }
            }
            // After the session stop, so its final events are still logged.
            events.stop().await;
            inner.phase = CoordinatorPhase::Stopped;
            return Err(e.into());
        }

        inner.frames.start();
        inner.events = Some(events);
        inner.phase = CoordinatorPhase::Running;
        info!("Session running");
        Ok(())
    }

    /// Stops the controller relay, then the frame relay, then the session.
    ///
    /// Safe to call repeatedly; only the first call does any work.
    pub async fn shutdown(&self) -> Result<(), CoordinatorError> {
        let mut inner = self.inner.lock().await;
        match inner.phase {
            CoordinatorPhase::Stopped => {
                debug!("Coordinator already stopped");
                return Ok(());
            }
            CoordinatorPhase::Idle => {
                info!("Coordinator shut down before it ran");
            }
            CoordinatorPhase::Running => info!("Shutting down session"),
        }

        let mut first_error: Option<CoordinatorError> = None;

        if let Err(e) = inner.controller.stop().await {
            error!("Controller relay stop failed: {}", e);
            first_error.get_or_insert(e.into());
        }

        if let Err(e) = inner.frames.stop().await {
            error!("Frame relay stop failed: {}", e);
            first_error.get_or_insert(e.into());
        }

        if self.session.is_connected() {
            if let Err(e) = self.session.stop() {
                error!("Session stop failed: {}", e);
                first_error.get_or_insert(e.into());
            }
        }

        if let Some(events) = inner.events.take() {
            events.stop().await;
        }

        inner.phase = CoordinatorPhase::Stopped;
        info!("Shutdown complete");
        first_error.map_or(Ok(()), Err)
    }
}

fn log_event(event: &SessionEvent) {
    match event {
        SessionEvent::ConnectedChanged(connected) => info!("Session connected: {}", connected),
        SessionEvent::SessionQuit { reason } => info!("Session quit: {}", reason),
        SessionEvent::LoginPinRequested { pin_incorrect } => {
            warn!("Session requests login PIN (previous incorrect: {})", pin_incorrect)
        }
        SessionEvent::NicknameReceived(nickname) => info!("Connected to {}", nickname),
        other => debug!("Session event: {:?}", other),
    }
}

async fn forward_events(mut receiver: broadcast::Receiver<SessionEvent>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = receiver.recv() => match next {
                Ok(event) => log_event(&event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Skipped {} session events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return,
            },
        }
    }

    // Events sent by the final session stop are still queued.
    while let Ok(event) = receiver.try_recv() {
        log_event(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{ControllerSample, DeviceError, DeviceInfo};
    use crate::frame::LogSurface;
    use crate::session::LoopbackSession;
    use std::time::Duration;

    struct IdleDevice;

    impl ControllerDevice for IdleDevice {
        fn open(&mut self) -> Result<DeviceInfo, DeviceError> {
            Ok(DeviceInfo {
                name: "idle".into(),
                id: "0".into(),
            })
        }

        fn poll(&mut self, timeout: Duration) -> Result<Option<ControllerSample>, DeviceError> {
            std::thread::sleep(timeout);
            Ok(None)
        }

        fn close(&mut self) {}
    }

    fn coordinator() -> (Arc<LoopbackSession>, SessionCoordinator) {
        let mut config = ShellConfig::default();
        config.frame.width = 4;
        config.frame.height = 4;
        config.controller.poll_interval_ms = 5;
        let session = Arc::new(LoopbackSession::new(config.session.clone(), 4, 4));
        let coordinator = SessionCoordinator::new(
            session.clone(),
            Box::new(IdleDevice),
            Arc::new(LogSurface::default()),
            &config,
        );
        (session, coordinator)
    }

    #[tokio::test]
    async fn run_then_shutdown_stops_everything() {
        let (session, coordinator) = coordinator();
        coordinator.run().await.unwrap();
        assert_eq!(coordinator.phase().await, CoordinatorPhase::Running);
        assert!(session.is_connected());
        assert_eq!(
            coordinator.relay_states().await,
            (RelayState::Running, RelayState::Running)
        );

        coordinator.shutdown().await.unwrap();
        assert_eq!(coordinator.phase().await, CoordinatorPhase::Stopped);
        assert!(!session.is_connected());
        assert_eq!(
            coordinator.relay_states().await,
            (RelayState::Stopped, RelayState::Stopped)
        );
    }

    #[tokio::test]
    async fn shutdown_before_run_prevents_running() {
        let (session, coordinator) = coordinator();
        coordinator.shutdown().await.unwrap();
        coordinator.run().await.unwrap();
        assert_eq!(coordinator.phase().await, CoordinatorPhase::Stopped);
        assert!(!session.is_connected());
    }
}
