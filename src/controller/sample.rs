use chrono::{DateTime, Local};
use std::fmt;

// Physical buttons on a DualSense-style controller
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ButtonType {
    Cross,
    Circle,
    Square,
    Triangle,
    DPadUp,
    DPadDown,
    DPadLeft,
    DPadRight,
    L1,
    R1,
    L3,
    R3,
    Options,
    Create,
    Touchpad,
    Ps,
}

// Button edge
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonState {
    Pressed,
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoystickType {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerType {
    Left,
    Right,
}

/// One reading from the controller, consumed exactly once by the relay.
///
/// Stick axes are normalized to [-1, 1], triggers to [0, 1]. Motion values
/// are in the device's physical units; orientation is in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControllerSample {
    Button {
        button: ButtonType,
        state: ButtonState,
    },
    Joystick {
        stick: JoystickType,
        x: f32,
        y: f32,
    },
    Trigger {
        trigger: TriggerType,
        value: f32,
    },
    Accelerometer {
        x: f32,
        y: f32,
        z: f32,
    },
    Gyroscope {
        x: f32,
        y: f32,
        z: f32,
    },
    Orientation {
        yaw: f32,
        pitch: f32,
        roll: f32,
    },
}

impl ControllerSample {
    pub fn pressed(button: ButtonType) -> Self {
        ControllerSample::Button {
            button,
            state: ButtonState::Pressed,
        }
    }

    pub fn released(button: ButtonType) -> Self {
        ControllerSample::Button {
            button,
            state: ButtonState::Released,
        }
    }

    pub fn is_button(&self) -> bool {
        matches!(self, ControllerSample::Button { .. })
    }
}

/// A sample stamped when the reader picked it up.
#[derive(Debug, Clone)]
pub struct TimedSample {
    pub sample: ControllerSample,
    pub timestamp: DateTime<Local>,
}

impl TimedSample {
    pub fn now(sample: ControllerSample) -> Self {
        Self {
            sample,
            timestamp: Local::now(),
        }
    }
}

impl fmt::Display for TimedSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} at {}", self.sample, self.timestamp.format("%H:%M:%S.%3f"))
    }
}
