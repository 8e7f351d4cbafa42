//! In-process session stand-in
//!
//! Behaves like a connected remote-play session from the core's point of
//! view: keeps the controller state, "sends" every feedback update by logging
//! it, and feeds a moving test pattern into the frame handler. Lets the
//! binary run the full relay pipeline without a console on the network.

use super::{ControllerState, FrameHandler, SessionButton, SessionError, SessionEvent, SessionHandle};
use crate::config::SessionSettings;
use crate::translate::Quaternion;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const EVENT_CAPACITY: usize = 64;

type SharedHandler = Arc<RwLock<Option<FrameHandler>>>;

pub struct LoopbackSession {
    settings: SessionSettings,
    width: usize,
    height: usize,
    connected: AtomicBool,
    state: Mutex<ControllerState>,
    feedback_pushes: AtomicU64,
    frame_handler: SharedHandler,
    events: broadcast::Sender<SessionEvent>,
    pattern_task: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl LoopbackSession {
    pub fn new(settings: SessionSettings, width: usize, height: usize) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            settings,
            width,
            height,
            connected: AtomicBool::new(false),
            state: Mutex::new(ControllerState::idle()),
            feedback_pushes: AtomicU64::new(0),
            frame_handler: Arc::new(RwLock::new(None)),
            events,
            pattern_task: Mutex::new(None),
        }
    }

    /// Snapshot of the state last pushed to the "remote" side.
    pub fn controller_state(&self) -> ControllerState {
        self.lock_state().clone()
    }

    pub fn feedback_pushes(&self) -> u64 {
        self.feedback_pushes.load(Ordering::Relaxed)
    }

    fn lock_state(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update(&self, apply: impl FnOnce(&mut ControllerState)) {
        apply(&mut self.lock_state());
        self.send_feedback_state();
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine; events are informational.
        let _ = self.events.send(event);
    }
}

impl SessionHandle for LoopbackSession {
    fn start(&self) -> Result<(), SessionError> {
        if self.connected.load(Ordering::SeqCst) {
            warn!("Loopback session already started");
            return Ok(());
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SessionError::StartFailed(format!("no tokio runtime: {}", e)))?;

        info!(
            "Starting loopback session for {} ({}) at {}x{}",
            self.settings.host, self.settings.nickname, self.width, self.height
        );

        let cancel = CancellationToken::new();
        let task = runtime.spawn(run_test_pattern(
            self.frame_handler.clone(),
            self.width,
            self.height,
            self.settings.test_pattern_fps,
            cancel.clone(),
        ));
        *self
            .pattern_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some((cancel, task));

        self.connected.store(true, Ordering::SeqCst);
        self.emit(SessionEvent::NicknameReceived(self.settings.nickname.clone()));
        self.emit(SessionEvent::ConnectedChanged(true));
        Ok(())
    }

    fn stop(&self) -> Result<(), SessionError> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Err(SessionError::NotConnected);
        }

        let pattern = self
            .pattern_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some((cancel, _task)) = pattern {
            // The task exits on its own once cancelled; nothing to join from sync code.
            cancel.cancel();
        }

        info!(
            "Loopback session stopped after {} feedback pushes",
            self.feedback_pushes()
        );
        self.emit(SessionEvent::ConnectedChanged(false));
        self.emit(SessionEvent::SessionQuit {
            reason: "stopped".to_string(),
        });
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn press(&self, button: SessionButton) {
        self.update(|state| state.press(button));
    }

    fn release(&self, button: SessionButton) {
        self.update(|state| state.release(button));
    }

    fn set_left(&self, x: i16, y: i16) {
        self.update(|state| state.left = (x, y));
    }

    fn set_right(&self, x: i16, y: i16) {
        self.update(|state| state.right = (x, y));
    }

    fn set_l2(&self, value: u8) {
        self.update(|state| state.l2 = value);
    }

    fn set_r2(&self, value: u8) {
        self.update(|state| state.r2 = value);
    }

    fn set_accelerometer(&self, x: f32, y: f32, z: f32) {
        self.update(|state| state.accel = [x, y, z]);
    }

    fn set_gyroscope(&self, x: f32, y: f32, z: f32) {
        self.update(|state| state.gyro = [x, y, z]);
    }

    fn set_orientation(&self, orientation: Quaternion) {
        self.update(|state| state.orientation = orientation);
    }

    fn send_feedback_state(&self) {
        let count = self.feedback_pushes.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("Feedback state #{}: {}", count, self.lock_state());
    }

    fn set_frame_handler(&self, handler: Option<FrameHandler>) {
        match self.frame_handler.write() {
            Ok(mut slot) => *slot = handler,
            Err(poisoned) => *poisoned.into_inner() = handler,
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

async fn run_test_pattern(
    handler: SharedHandler,
    width: usize,
    height: usize,
    fps: u32,
    cancel: CancellationToken,
) {
    let period = Duration::from_secs_f64(1.0 / f64::from(fps.max(1)));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut pixels = vec![0u8; width * height * 3];
    let mut phase: usize = 0;
    debug!("Test pattern running at {} fps", fps);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        render_pattern(&mut pixels, width, height, phase);
        phase = phase.wrapping_add(4);

        match handler.read() {
            Ok(guard) => {
                if let Some(callback) = guard.as_ref() {
                    callback(&pixels);
                }
            }
            Err(e) => {
                error!("Frame handler lock poisoned: {}", e);
                break;
            }
        }
    }

    debug!("Test pattern stopped");
}

/// Diagonal RGB gradient scrolled by `phase`.
fn render_pattern(pixels: &mut [u8], width: usize, height: usize, phase: usize) {
    for (row, line) in pixels.chunks_exact_mut(width * 3).enumerate().take(height) {
        let g = ((row * 255) / height.max(1)) as u8;
        for (col, px) in line.chunks_exact_mut(3).enumerate() {
            px[0] = ((col + phase) & 0xff) as u8;
            px[1] = g;
            px[2] = ((row + col + phase) & 0xff) as u8;
        }
    }
}
