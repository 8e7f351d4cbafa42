//! Numeric translation of raw controller telemetry into session input values
//!
//! Two pure stages sit between a [`ControllerSample`](crate::controller::ControllerSample)
//! and the session setters:
//!
//! 1. [`scaling`] - stick and trigger floats to the session's integer ranges
//! 2. [`orientation`] - yaw/pitch/roll degrees to a unit quaternion
//!
//! Neither stage keeps state or can fail; out-of-range input is clamped.

pub mod orientation;
pub mod scaling;

pub use orientation::{encode_orientation, Quaternion};
pub use scaling::{scale_stick, scale_stick_pair, scale_trigger, STICK_SCALE, TRIGGER_SCALE};
