//! gilrs-backed controller device
//!
//! Selects one connected gamepad and turns its gilrs events into
//! [`ControllerSample`]s. Stick events arrive per axis from gilrs, so the
//! last value of the companion axis is kept to emit complete x/y pairs.
//!
//! gilrs reports no motion sensors; accelerometer, gyroscope and orientation
//! samples only come from devices that provide them. The same holds for the
//! touchpad click, so the Touchpad binding is never reached through gilrs.

use super::device::{ControllerDevice, DeviceError, DeviceInfo};
use super::sample::{ButtonState, ButtonType, ControllerSample, JoystickType, TriggerType};
use crate::config::ControllerSettings;
use gilrs::{Axis, Button, Event, EventType, Gamepad, GamepadId, Gilrs};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Stateful gilrs-to-sample translation, independent of the gilrs context.
#[derive(Debug, Clone, Default)]
pub struct GilrsMapper {
    joystick_deadzone: f32,
    last_left: (f32, f32),
    last_right: (f32, f32),
}

impl GilrsMapper {
    pub fn new(joystick_deadzone: f32) -> Self {
        Self {
            joystick_deadzone,
            ..Self::default()
        }
    }

    pub fn map_axis(&mut self, axis: Axis, value: f32) -> Option<ControllerSample> {
        let value = apply_deadzone(value, self.joystick_deadzone);
        match axis {
            Axis::LeftStickX => {
                self.last_left.0 = value;
                Some(joystick(JoystickType::Left, self.last_left))
            }
            Axis::LeftStickY => {
                self.last_left.1 = value;
                Some(joystick(JoystickType::Left, self.last_left))
            }
            Axis::RightStickX => {
                self.last_right.0 = value;
                Some(joystick(JoystickType::Right, self.last_right))
            }
            Axis::RightStickY => {
                self.last_right.1 = value;
                Some(joystick(JoystickType::Right, self.last_right))
            }
            Axis::LeftZ => Some(ControllerSample::Trigger {
                trigger: TriggerType::Left,
                value,
            }),
            Axis::RightZ => Some(ControllerSample::Trigger {
                trigger: TriggerType::Right,
                value,
            }),
            _ => {
                debug!("Ignoring unsupported axis: {:?}", axis);
                None
            }
        }
    }

    pub fn map_button_edge(&self, button: Button, state: ButtonState) -> Option<ControllerSample> {
        map_button(button).map(|button| ControllerSample::Button { button, state })
    }

    /// Analog button values; only the two triggers carry meaning here.
    pub fn map_button_value(&self, button: Button, value: f32) -> Option<ControllerSample> {
        let trigger = match button {
            Button::LeftTrigger2 => TriggerType::Left,
            Button::RightTrigger2 => TriggerType::Right,
            _ => return None,
        };
        Some(ControllerSample::Trigger { trigger, value })
    }

    pub fn convert(&mut self, event: EventType) -> Option<ControllerSample> {
        match event {
            EventType::AxisChanged(axis, value, _) => self.map_axis(axis, value),
            EventType::ButtonPressed(button, _) => {
                self.map_button_edge(button, ButtonState::Pressed)
            }
            EventType::ButtonReleased(button, _) => {
                self.map_button_edge(button, ButtonState::Released)
            }
            EventType::ButtonChanged(button, value, _) => self.map_button_value(button, value),
            EventType::ButtonRepeated(button, _) => {
                debug!("Button repeat ignored: {:?}", button);
                None
            }
            EventType::Connected => {
                info!("Controller connected event detected");
                None
            }
            EventType::Disconnected => {
                warn!("Controller disconnected event detected");
                None
            }
            _ => {
                debug!("Unhandled event type: {:?}", event);
                None
            }
        }
    }
}

pub struct GilrsDevice {
    gilrs: Option<Gilrs>,
    active_gamepad: Option<GamepadId>,
    gamepad_index: Option<usize>,
    mapper: GilrsMapper,
}

impl GilrsDevice {
    pub fn new(settings: &ControllerSettings) -> Self {
        Self {
            gilrs: None,
            active_gamepad: None,
            gamepad_index: settings.gamepad_index,
            mapper: GilrsMapper::new(settings.joystick_deadzone),
        }
    }
}

impl ControllerDevice for GilrsDevice {
    fn open(&mut self) -> Result<DeviceInfo, DeviceError> {
        info!("Initializing gilrs controller interface");
        let gilrs = Gilrs::new().map_err(|e| DeviceError::InitializationError(e.to_string()))?;

        let (id, info) = {
            let gamepads: Vec<(GamepadId, Gamepad<'_>)> = gilrs.gamepads().collect();
            if gamepads.is_empty() {
                return Err(DeviceError::NoDevice);
            }

            info!("Found {} gamepads:", gamepads.len());
            for (idx, (id, gamepad)) in gamepads.iter().enumerate() {
                info!(
                    "  [{}] ID: {}, Name: {}, UUID: {:?}",
                    idx,
                    id,
                    gamepad.name(),
                    gamepad.uuid()
                );
            }

            let index = self.gamepad_index.unwrap_or(0);
            let (id, gamepad) = gamepads.get(index).ok_or(DeviceError::IndexOutOfRange {
                index,
                available: gamepads.len(),
            })?;
            let info = DeviceInfo {
                name: gamepad.name().to_string(),
                id: id.to_string(),
            };
            (*id, info)
        };

        info!("Selected gamepad: {}", info);
        self.active_gamepad = Some(id);
        self.gilrs = Some(gilrs);
        Ok(info)
    }

    fn poll(&mut self, timeout: Duration) -> Result<Option<ControllerSample>, DeviceError> {
        let gilrs = self.gilrs.as_mut().ok_or(DeviceError::NotOpen)?;

        let Some(Event { id, event, time, .. }) = gilrs.next_event_blocking(Some(timeout)) else {
            return Ok(None);
        };

        if let Some(active_id) = self.active_gamepad {
            if id != active_id {
                debug!("Skipping event from non-active gamepad: {:?}", id);
                return Ok(None);
            }
        }

        debug!("Processing gilrs event: {:?} at time: {:?}", event, time);
        Ok(self.mapper.convert(event))
    }

    fn close(&mut self) {
        if self.gilrs.take().is_some() {
            info!("Controller closed");
        }
        self.active_gamepad = None;
    }
}

fn joystick(stick: JoystickType, (x, y): (f32, f32)) -> ControllerSample {
    ControllerSample::Joystick { stick, x, y }
}

// gilrs uses positional names; South is Cross on a DualSense
fn map_button(button: Button) -> Option<ButtonType> {
    match button {
        Button::South => Some(ButtonType::Cross),
        Button::East => Some(ButtonType::Circle),
        Button::West => Some(ButtonType::Square),
        Button::North => Some(ButtonType::Triangle),
        Button::DPadUp => Some(ButtonType::DPadUp),
        Button::DPadDown => Some(ButtonType::DPadDown),
        Button::DPadLeft => Some(ButtonType::DPadLeft),
        Button::DPadRight => Some(ButtonType::DPadRight),
        Button::LeftTrigger => Some(ButtonType::L1),
        Button::RightTrigger => Some(ButtonType::R1),
        Button::LeftThumb => Some(ButtonType::L3),
        Button::RightThumb => Some(ButtonType::R3),
        Button::Start => Some(ButtonType::Options),
        Button::Select => Some(ButtonType::Create),
        Button::Mode => Some(ButtonType::Ps),
        _ => None,
    }
}

fn apply_deadzone(value: f32, deadzone: f32) -> f32 {
    if deadzone <= 0.0 {
        return value;
    }
    if value.abs() < deadzone {
        0.0
    } else {
        // Rescale the value to the range outside the deadzone
        let sign = if value < 0.0 { -1.0 } else { 1.0 };
        sign * (value.abs() - deadzone) / (1.0 - deadzone)
    }
}
