//! Concurrency core of a remote-play client shell
//!
//! Two relays run beside each other on one session: the [`frame`] relay
//! forwards decoded frames to a presentation surface at a capped rate, the
//! [`controller`] relay turns gamepad samples into session input calls. The
//! [`coordinator`] starts and stops them around the session in a fixed order.

pub mod config;
pub mod controller;
pub mod coordinator;
pub mod frame;
pub mod relay;
pub mod session;
pub mod translate;
