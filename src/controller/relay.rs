//! Controller relay: device samples in, session input calls out
//!
//! ```text
//! ┌───────────────────┐  mpsc (bounded)  ┌──────────────────────┐
//! │ reader (blocking) │ ───TimedSample──►│ dispatch (async task)│──► SessionHandle
//! │ device.poll()     │                  │ button table, scaling│
//! └───────────────────┘                  └──────────────────────┘
//! ```
//!
//! The reader owns the device for the lifetime of the relay and closes it
//! when it exits. Stopping cancels the dispatch loop at once; the reader
//! notices within one poll interval.

use super::device::{ControllerDevice, DeviceError};
use super::sample::{ButtonState, ButtonType, ControllerSample, JoystickType, TimedSample, TriggerType};
use crate::config::ControllerSettings;
use crate::relay::{RelayError, RelayState, Worker};
use crate::session::{SessionButton, SessionHandle};
use crate::translate::{encode_orientation, scale_stick_pair, scale_trigger};
use chrono::Local;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ControllerRelayError {
    #[error("Controller device error: {0}")]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Relay(#[from] RelayError),
}

/// Session calls issued for one physical button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonBinding {
    pub button: ButtonType,
    pub press: SessionButton,
    pub release: SessionButton,
}

const fn bind(button: ButtonType, press: SessionButton, release: SessionButton) -> ButtonBinding {
    ButtonBinding {
        button,
        press,
        release,
    }
}

/// Physical button wiring.
///
/// Options and Create release the Touchpad bit rather than their own.
pub const BUTTON_BINDINGS: &[ButtonBinding] = &[
    bind(ButtonType::Cross, SessionButton::Cross, SessionButton::Cross),
    bind(ButtonType::Circle, SessionButton::Circle, SessionButton::Circle),
    bind(ButtonType::Square, SessionButton::Square, SessionButton::Square),
    bind(ButtonType::Triangle, SessionButton::Triangle, SessionButton::Triangle),
    bind(ButtonType::DPadLeft, SessionButton::DpadLeft, SessionButton::DpadLeft),
    bind(ButtonType::DPadRight, SessionButton::DpadRight, SessionButton::DpadRight),
    bind(ButtonType::DPadUp, SessionButton::DpadUp, SessionButton::DpadUp),
    bind(ButtonType::DPadDown, SessionButton::DpadDown, SessionButton::DpadDown),
    bind(ButtonType::L1, SessionButton::L1, SessionButton::L1),
    bind(ButtonType::R1, SessionButton::R1, SessionButton::R1),
    bind(ButtonType::L3, SessionButton::L3, SessionButton::L3),
    bind(ButtonType::R3, SessionButton::R3, SessionButton::R3),
    bind(ButtonType::Options, SessionButton::Options, SessionButton::Touchpad),
    bind(ButtonType::Create, SessionButton::Create, SessionButton::Touchpad),
    bind(ButtonType::Touchpad, SessionButton::Touchpad, SessionButton::Touchpad),
    bind(ButtonType::Ps, SessionButton::Ps, SessionButton::Ps),
];

pub type ButtonTable = HashMap<ButtonType, ButtonBinding>;

pub fn button_table() -> ButtonTable {
    BUTTON_BINDINGS
        .iter()
        .map(|binding| (binding.button, *binding))
        .collect()
}

/// Forwards one sample to the session, scaling continuous values first.
pub fn dispatch(session: &dyn SessionHandle, bindings: &ButtonTable, sample: &ControllerSample) {
    match *sample {
        ControllerSample::Button { button, state } => {
            let Some(binding) = bindings.get(&button) else {
                debug!("No binding for button {:?}", button);
                return;
            };
            match state {
                ButtonState::Pressed => {
                    info!("Button {:?} pressed -> press {:?}", button, binding.press);
                    session.press(binding.press);
                }
                ButtonState::Released => {
                    info!("Button {:?} released -> release {:?}", button, binding.release);
                    session.release(binding.release);
                }
            }
        }
        ControllerSample::Joystick { stick, x, y } => {
            let (sx, sy) = scale_stick_pair(x, y);
            debug!("Stick {:?} ({:.3}, {:.3}) -> ({}, {})", stick, x, y, sx, sy);
            match stick {
                JoystickType::Left => session.set_left(sx, sy),
                JoystickType::Right => session.set_right(sx, sy),
            }
        }
        ControllerSample::Trigger { trigger, value } => {
            let scaled = scale_trigger(value);
            debug!("Trigger {:?} {:.3} -> {}", trigger, value, scaled);
            match trigger {
                TriggerType::Left => session.set_l2(scaled),
                TriggerType::Right => session.set_r2(scaled),
            }
        }
        ControllerSample::Accelerometer { x, y, z } => {
            debug!("Accelerometer ({:.3}, {:.3}, {:.3})", x, y, z);
            session.set_accelerometer(x, y, z);
        }
        ControllerSample::Gyroscope { x, y, z } => {
            debug!("Gyroscope ({:.3}, {:.3}, {:.3})", x, y, z);
            session.set_gyroscope(x, y, z);
        }
        ControllerSample::Orientation { yaw, pitch, roll } => {
            let orientation = encode_orientation(yaw, pitch, roll);
            debug!(
                "Orientation yaw {:.1} pitch {:.1} roll {:.1} -> {:?}",
                yaw, pitch, roll, orientation
            );
            session.set_orientation(orientation);
        }
    }
}

/// Puts the remote controller back into a resting state.
pub fn neutralize(session: &dyn SessionHandle) {
    info!("Neutralizing controller input");
    session.release(SessionButton::DpadRight);
    session.release(SessionButton::DpadLeft);
    session.set_left(0, 0);
    session.set_right(0, 0);
    session.set_l2(0);
    session.set_r2(0);
    session.send_feedback_state();
}

fn read_device(
    mut device: Box<dyn ControllerDevice>,
    sender: mpsc::Sender<TimedSample>,
    poll_interval: Duration,
    cancel: CancellationToken,
) -> Result<u64, DeviceError> {
    info!("Controller reader started");
    let mut read = 0;
    let mut outcome = Ok(());

    while !cancel.is_cancelled() {
        match device.poll(poll_interval) {
            Ok(Some(sample)) => {
                if sender.blocking_send(TimedSample::now(sample)).is_err() {
                    debug!("Sample channel closed, reader exiting");
                    break;
                }
                read += 1;
            }
            Ok(None) => {}
            Err(e) => {
                error!("Controller read failed: {}", e);
                outcome = Err(e);
                break;
            }
        }
    }

    device.close();
    info!("Controller reader finished after {} samples", read);
    outcome.map(|_| read)
}

async fn dispatch_samples(
    session: Arc<dyn SessionHandle>,
    bindings: ButtonTable,
    mut receiver: mpsc::Receiver<TimedSample>,
    cancel: CancellationToken,
) -> u64 {
    info!("Entering controller dispatch loop");
    let mut total = 0u64;
    let mut window_samples = 0u64;
    let mut window_start = Local::now();
    let stats_interval = chrono::Duration::seconds(10);

    loop {
        let timed = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = receiver.recv() => match next {
                Some(timed) => timed,
                None => {
                    error!("Controller sample stream ended before stop; input is no longer relayed");
                    break;
                }
            },
        };

        if timed.sample.is_button() {
            debug!("Dispatching {}", timed);
        }
        dispatch(session.as_ref(), &bindings, &timed.sample);
        total += 1;
        window_samples += 1;

        let now = Local::now();
        if now - window_start > stats_interval {
            let seconds = (now - window_start).num_seconds().max(1);
            info!(
                "Controller relay stats: {} samples in {} seconds (avg {:.2}/sec)",
                window_samples,
                seconds,
                window_samples as f64 / seconds as f64
            );
            window_samples = 0;
            window_start = now;
        }
    }

    info!("Controller dispatch loop finished after {} samples", total);
    total
}

/// Relays a physical controller into the session.
pub struct ControllerRelay {
    session: Arc<dyn SessionHandle>,
    device: Option<Box<dyn ControllerDevice>>,
    settings: ControllerSettings,
    worker: Worker,
}

impl ControllerRelay {
    pub fn new(
        session: Arc<dyn SessionHandle>,
        device: Box<dyn ControllerDevice>,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            session,
            device: Some(device),
            settings,
            worker: Worker::new("Controller relay"),
        }
    }

    pub fn state(&self) -> RelayState {
        self.worker.state()
    }

    /// Opens the device and starts relaying.
    ///
    /// A device that cannot be opened leaves the relay Stopped; there is no
    /// retry. Calling this outside Idle does nothing.
    pub fn start(&mut self) -> Result<(), ControllerRelayError> {
        if self.worker.state() != RelayState::Idle {
            warn!("Controller relay start ignored in state {}", self.worker.state());
            return Ok(());
        }

        let Some(mut device) = self.device.take() else {
            self.worker.abandon();
            return Err(DeviceError::NotOpen.into());
        };

        let info = match device.open() {
            Ok(info) => info,
            Err(e) => {
                error!("Failed to open controller: {}", e);
                self.worker.abandon();
                return Err(e.into());
            }
        };
        info!("Controller relay attached to {}", info);

        let session = self.session.clone();
        let bindings = button_table();
        let poll_interval = self.settings.poll_interval();
        let capacity = self.settings.channel_capacity.max(1);

        self.worker.start(move |cancel| async move {
            let (sender, receiver) = mpsc::channel(capacity);
            let reader_cancel = cancel.clone();
            let reader = tokio::task::spawn_blocking(move || {
                read_device(device, sender, poll_interval, reader_cancel)
            });

            dispatch_samples(session, bindings, receiver, cancel).await;

            match reader.await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => error!("Controller relay lost its device: {}", e),
                Err(e) => error!("Controller reader did not finish cleanly: {}", e),
            }
        });
        Ok(())
    }

    /// Stops relaying, then neutralizes the remote controller once.
    ///
    /// Neutralization runs even when the loop ended badly. Repeated calls
    /// are no-ops.
    pub async fn stop(&mut self) -> Result<(), ControllerRelayError> {
        let was_running = self.worker.state() == RelayState::Running;
        let result = self.worker.stop().await;
        if was_running {
            neutralize(self.session.as_ref());
        }
        result.map(|_| ()).map_err(Into::into)
    }
}
