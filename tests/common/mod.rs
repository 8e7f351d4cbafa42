#![allow(dead_code)]

use playshell::controller::{ControllerDevice, ControllerSample, DeviceError, DeviceInfo};
use playshell::frame::{FrameBuffer, PresentError, PresentationSurface};
use playshell::session::{FrameHandler, SessionButton, SessionError, SessionEvent, SessionHandle};
use playshell::translate::Quaternion;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Start,
    Stop,
    Press(SessionButton),
    Release(SessionButton),
    SetLeft(i16, i16),
    SetRight(i16, i16),
    SetL2(u8),
    SetR2(u8),
    Accelerometer(f32, f32, f32),
    Gyroscope(f32, f32, f32),
    Orientation(Quaternion),
    Feedback,
    /// `true` when a handler was installed, `false` when it was removed.
    FrameHandler(bool),
}

/// Session double that records every call in order.
pub struct RecordingSession {
    calls: Mutex<Vec<Call>>,
    connected: AtomicBool,
    handler: Mutex<Option<FrameHandler>>,
    events: broadcast::Sender<SessionEvent>,
    fail_start: bool,
    fail_stop: bool,
    panic_on_press: bool,
}

impl RecordingSession {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::build())
    }

    pub fn failing_start() -> Arc<Self> {
        Arc::new(Self {
            fail_start: true,
            ..Self::build()
        })
    }

    /// `stop` is recorded but reports a failure and leaves the session connected.
    pub fn failing_stop() -> Arc<Self> {
        Arc::new(Self {
            fail_stop: true,
            ..Self::build()
        })
    }

    /// `press` is recorded, then panics on the calling task.
    pub fn panicking_press() -> Arc<Self> {
        Arc::new(Self {
            panic_on_press: true,
            ..Self::build()
        })
    }

    fn build() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            calls: Mutex::new(Vec::new()),
            connected: AtomicBool::new(false),
            handler: Mutex::new(None),
            events,
            fail_start: false,
            fail_stop: false,
            panic_on_press: false,
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    pub fn position(&self, call: &Call) -> Option<usize> {
        self.calls().iter().position(|c| c == call)
    }

    /// Feeds one frame to the installed handler; `false` if none is installed.
    pub fn push_frame(&self, pixels: &[u8]) -> bool {
        match self.handler.lock().unwrap().as_ref() {
            Some(handler) => {
                handler(pixels);
                true
            }
            None => false,
        }
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl SessionHandle for RecordingSession {
    fn start(&self) -> Result<(), SessionError> {
        self.record(Call::Start);
        if self.fail_start {
            return Err(SessionError::StartFailed("refused".into()));
        }
        self.connected.store(true, Ordering::SeqCst);
        let _ = self.events.send(SessionEvent::ConnectedChanged(true));
        Ok(())
    }

    fn stop(&self) -> Result<(), SessionError> {
        self.record(Call::Stop);
        if self.fail_stop {
            return Err(SessionError::StopFailed("host unreachable".into()));
        }
        self.connected.store(false, Ordering::SeqCst);
        let _ = self.events.send(SessionEvent::SessionQuit {
            reason: "stopped".into(),
        });
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn press(&self, button: SessionButton) {
        self.record(Call::Press(button));
        if self.panic_on_press {
            panic!("press {:?} rejected", button);
        }
    }

    fn release(&self, button: SessionButton) {
        self.record(Call::Release(button));
    }

    fn set_left(&self, x: i16, y: i16) {
        self.record(Call::SetLeft(x, y));
    }

    fn set_right(&self, x: i16, y: i16) {
        self.record(Call::SetRight(x, y));
    }

    fn set_l2(&self, value: u8) {
        self.record(Call::SetL2(value));
    }

    fn set_r2(&self, value: u8) {
        self.record(Call::SetR2(value));
    }

    fn set_accelerometer(&self, x: f32, y: f32, z: f32) {
        self.record(Call::Accelerometer(x, y, z));
    }

    fn set_gyroscope(&self, x: f32, y: f32, z: f32) {
        self.record(Call::Gyroscope(x, y, z));
    }

    fn set_orientation(&self, orientation: Quaternion) {
        self.record(Call::Orientation(orientation));
    }

    fn send_feedback_state(&self) {
        self.record(Call::Feedback);
    }

    fn set_frame_handler(&self, handler: Option<FrameHandler>) {
        self.record(Call::FrameHandler(handler.is_some()));
        *self.handler.lock().unwrap() = handler;
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

/// Device double that replays a fixed list of samples, then idles.
pub struct ScriptedDevice {
    samples: VecDeque<ControllerSample>,
    present: bool,
    fail_when_empty: bool,
    closed: Arc<AtomicBool>,
}

impl ScriptedDevice {
    pub fn new(samples: Vec<ControllerSample>) -> Self {
        Self {
            samples: samples.into(),
            present: true,
            fail_when_empty: false,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Replays `samples`, then fails every read as an unplugged controller would.
    pub fn failing_after(samples: Vec<ControllerSample>) -> Self {
        Self {
            fail_when_empty: true,
            ..Self::new(samples)
        }
    }

    pub fn missing() -> Self {
        Self {
            present: false,
            ..Self::new(Vec::new())
        }
    }

    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        self.closed.clone()
    }
}

impl ControllerDevice for ScriptedDevice {
    fn open(&mut self) -> Result<DeviceInfo, DeviceError> {
        if !self.present {
            return Err(DeviceError::NoDevice);
        }
        Ok(DeviceInfo {
            name: "Scripted controller".into(),
            id: "scripted-0".into(),
        })
    }

    fn poll(&mut self, timeout: Duration) -> Result<Option<ControllerSample>, DeviceError> {
        match self.samples.pop_front() {
            Some(sample) => Ok(Some(sample)),
            None if self.fail_when_empty => {
                Err(DeviceError::ReadError("controller unplugged".into()))
            }
            None => {
                std::thread::sleep(timeout);
                Ok(None)
            }
        }
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct CountingSurface {
    presented: AtomicU64,
}

impl CountingSurface {
    pub fn presented(&self) -> u64 {
        self.presented.load(Ordering::SeqCst)
    }
}

impl PresentationSurface for CountingSurface {
    fn present(&self, _frame: &FrameBuffer) -> Result<(), PresentError> {
        self.presented.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Polls `condition` until it holds or `limit` passes.
pub async fn wait_until(limit: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
