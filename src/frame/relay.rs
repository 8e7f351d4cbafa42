//! Frame relay with statum state machine for the delivery loop
//!
//! # State Machine
//!
//! ```text
//! Waiting ──frame ready──► Emitting ──presented──► Throttling ──interval elapsed──► Waiting
//!    │                                                  │
//!    └──────────────cancelled──────────────┬────────────┘
//!                                          ▼
//!                                        (exit)
//! ```
//!
//! Throttling sleeps for whatever is left of the frame interval after
//! emitting. Frames are never dropped by the limiter itself; a signal that
//! arrives while throttling is picked up by the next Waiting phase, which then
//! presents the newest buffer contents.

use super::{FrameBuffer, FrameSlot, PresentationSurface};
use crate::config::FrameSettings;
use crate::relay::{RelayError, RelayState, Worker};
use crate::session::SessionHandle;
use chrono::Local;
use statum::{machine, state};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Timing of one emit cycle, carried into the Throttling state.
#[derive(Debug, Clone)]
pub struct EmitTiming {
    pub elapsed: Duration,
}

#[state]
#[derive(Debug, Clone)]
pub enum PumpState {
    Waiting,
    Emitting,
    Throttling(EmitTiming),
}

#[derive(Debug, Clone)]
pub struct PumpStats {
    pub emitted: u64,
    pub present_failures: u64,
    window_emitted: u64,
    window_start: chrono::DateTime<Local>,
}

impl Default for PumpStats {
    fn default() -> Self {
        Self {
            emitted: 0,
            present_failures: 0,
            window_emitted: 0,
            window_start: Local::now(),
        }
    }
}

#[machine]
pub struct FramePump<S: PumpState> {
    slot: Arc<FrameSlot>,
    surface: Arc<dyn PresentationSurface>,
    // Relay-owned copy; the surface only ever sees this one.
    frame: FrameBuffer,
    frame_interval: Duration,
    stats: PumpStats,
}

impl<S: PumpState> FramePump<S> {
    pub fn stats(&self) -> &PumpStats {
        &self.stats
    }
}

impl FramePump<Waiting> {
    pub fn create(
        slot: Arc<FrameSlot>,
        surface: Arc<dyn PresentationSurface>,
        settings: &FrameSettings,
    ) -> Self {
        let frame_interval = settings.frame_interval();
        debug!(
            "Creating frame pump {}x{} with {:?} interval",
            settings.width, settings.height, frame_interval
        );
        Self::new(
            slot,
            surface,
            FrameBuffer::new(settings.width, settings.height),
            frame_interval,
            PumpStats::default(),
        )
    }

    /// Blocks until a frame is ready; `None` once cancelled.
    pub async fn wait_for_frame(self, cancel: &CancellationToken) -> Option<FramePump<Emitting>> {
        let slot = self.slot.clone();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            _ = slot.wait_ready() => Some(self.transition()),
        }
    }
}

impl FramePump<Emitting> {
    /// Copies the shared frame out and hands it to the surface.
    ///
    /// Surface failures are logged and counted, never propagated.
    pub fn emit(mut self) -> FramePump<Throttling> {
        let woke_at = Instant::now();

        match self.slot.copy_into(&mut self.frame) {
            Ok(()) => match self.surface.present(&self.frame) {
                Ok(()) => {
                    self.stats.emitted += 1;
                    self.stats.window_emitted += 1;
                }
                Err(e) => {
                    self.stats.present_failures += 1;
                    warn!("Presentation surface rejected frame: {}", e);
                }
            },
            Err(e) => warn!("Could not copy frame out of slot: {}", e),
        }

        self.log_stats();
        let elapsed = woke_at.elapsed();
        self.transition_with(EmitTiming { elapsed })
    }

    fn log_stats(&mut self) {
        let now = Local::now();
        let window = now - self.stats.window_start;
        if window > chrono::Duration::seconds(10) {
            info!(
                "Frame relay stats: {} frames in {} seconds (avg {:.2}/sec), {} surface failures total",
                self.stats.window_emitted,
                window.num_seconds(),
                self.stats.window_emitted as f64 / window.num_seconds().max(1) as f64,
                self.stats.present_failures
            );
            self.stats.window_emitted = 0;
            self.stats.window_start = now;
        }
    }
}

impl FramePump<Throttling> {
    /// Sleeps out the rest of the frame interval; `None` if cancelled meanwhile.
    pub async fn throttle(self, cancel: &CancellationToken) -> Option<FramePump<Waiting>> {
        let elapsed = self
            .get_state_data()
            .map(|timing| timing.elapsed)
            .unwrap_or_default();
        let delay = self.frame_interval.saturating_sub(elapsed);

        if !delay.is_zero() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        Some(self.transition())
    }
}

/// Runs the pump until `cancel` fires and returns the final statistics.
pub async fn run_frame_pump(pump: FramePump<Waiting>, cancel: CancellationToken) -> PumpStats {
    info!("Entering frame relay loop");
    let mut pump = pump;
    let mut last_stats = pump.stats().clone();

    loop {
        let Some(emitting) = pump.wait_for_frame(&cancel).await else {
            break;
        };
        let throttling = emitting.emit();
        last_stats = throttling.stats().clone();
        let Some(waiting) = throttling.throttle(&cancel).await else {
            break;
        };
        pump = waiting;
    }

    info!(
        "Frame relay loop finished: {} frames emitted, {} surface failures",
        last_stats.emitted, last_stats.present_failures
    );
    last_stats
}

/// Forwards session frames to a presentation surface at a capped rate.
pub struct FrameRelay {
    session: Arc<dyn SessionHandle>,
    surface: Arc<dyn PresentationSurface>,
    slot: Arc<FrameSlot>,
    settings: FrameSettings,
    worker: Worker,
}

impl FrameRelay {
    pub fn new(
        session: Arc<dyn SessionHandle>,
        surface: Arc<dyn PresentationSurface>,
        settings: FrameSettings,
    ) -> Self {
        Self {
            session,
            surface,
            slot: Arc::new(FrameSlot::new(settings.width, settings.height)),
            settings,
            worker: Worker::new("Frame relay"),
        }
    }

    pub fn state(&self) -> RelayState {
        self.worker.state()
    }

    /// Hooks the frame handler into the session and starts the delivery loop.
    ///
    /// No-op unless Idle.
    pub fn start(&mut self) -> bool {
        if self.worker.state() != RelayState::Idle {
            warn!("Frame relay start ignored in state {}", self.worker.state());
            return false;
        }

        info!(
            "Starting frame relay at up to {} fps",
            self.settings.max_fps
        );
        let slot = self.slot.clone();
        self.session
            .set_frame_handler(Some(Box::new(move |pixels: &[u8]| {
                // Size mismatches are already logged by the slot.
                let _ = slot.publish(pixels);
            })));

        let pump = FramePump::create(self.slot.clone(), self.surface.clone(), &self.settings);
        self.worker.start(move |cancel| async move {
            run_frame_pump(pump, cancel).await;
        })
    }

    /// Stops the loop even if it is blocked waiting for a frame, then detaches
    /// from the session. Repeated calls are no-ops.
    pub async fn stop(&mut self) -> Result<(), RelayError> {
        let was_running = self.worker.state() == RelayState::Running;
        let result = self.worker.stop().await;
        if was_running {
            self.session.set_frame_handler(None);
            debug!("Frame handler detached from session");
        }
        result.map(|_| ())
    }
}
