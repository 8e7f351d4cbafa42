//! Controller subsystem for gamepad input relaying
//!
//! 1. [`device`] - Device trait, opened once and polled from a blocking thread
//! 2. [`gilrs_device`] - gilrs-backed implementation
//! 3. [`relay`] - Button table, axis scaling and lifecycle
//!
//! # Architecture
//!
//! ```text
//! Gamepad ──► Reader ──► Dispatch ──► SessionHandle
//!             (Samples)  (Scaled calls)
//! ```

pub mod device;
pub mod gilrs_device;
pub mod relay;
pub mod sample;

pub use device::{ControllerDevice, DeviceError, DeviceInfo};
pub use gilrs_device::GilrsDevice;
pub use relay::{ControllerRelay, ControllerRelayError};
pub use sample::{ButtonState, ButtonType, ControllerSample, JoystickType, TimedSample, TriggerType};
