//! Session collaborator boundary
//!
//! The remote-play engine (connection setup, decode, transport) lives outside
//! this crate. Everything here consumes it through [`SessionHandle`], a shared
//! handle that both relays call concurrently. Implementations must be
//! internally synchronized.
//!
//! ```text
//!  ControllerRelay ──press/release/set_*──►┐
//!                                          ├─► SessionHandle ──► remote host
//!  FrameRelay ◄──────frame handler─────────┘        │
//!                                                   └─► SessionEvent (broadcast)
//! ```
//!
//! [`LoopbackSession`] is an in-process stand-in used by the binary when no
//! real engine is linked.

pub mod loopback;
pub mod state;

pub use loopback::LoopbackSession;
pub use state::{ControllerState, SessionButton};

use crate::translate::Quaternion;
use tokio::sync::broadcast;

/// Callback invoked by the session with one decoded RGB24 frame.
///
/// Runs on whatever thread the engine decodes on.
pub type FrameHandler = Box<dyn Fn(&[u8]) + Send + Sync>;

/// Informational notifications from the session.
///
/// The core only forwards these; interpreting them is up to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    ConnectedChanged(bool),
    SessionQuit { reason: String },
    LoginPinRequested { pin_incorrect: bool },
    DataHolepunchProgress { finished: bool },
    NicknameReceived(String),
    MeasuredBitrateChanged(f64),
    AveragePacketLossChanged(f64),
    CantDisplayChanged(bool),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Failed to start session: {0}")]
    StartFailed(String),

    #[error("Failed to stop session: {0}")]
    StopFailed(String),

    #[error("Session is not connected")]
    NotConnected,
}

/// Handle to one remote interactive session.
///
/// Every input setter updates the session's controller state and pushes it to
/// the remote side. Stick values are the signed output of
/// [`scale_stick`](crate::translate::scale_stick), triggers the output of
/// [`scale_trigger`](crate::translate::scale_trigger).
pub trait SessionHandle: Send + Sync + 'static {
    fn start(&self) -> Result<(), SessionError>;

    fn stop(&self) -> Result<(), SessionError>;

    fn is_connected(&self) -> bool;

    fn press(&self, button: SessionButton);

    fn release(&self, button: SessionButton);

    fn set_left(&self, x: i16, y: i16);

    fn set_right(&self, x: i16, y: i16);

    fn set_l2(&self, value: u8);

    fn set_r2(&self, value: u8);

    fn set_accelerometer(&self, x: f32, y: f32, z: f32);

    fn set_gyroscope(&self, x: f32, y: f32, z: f32);

    fn set_orientation(&self, orientation: Quaternion);

    /// Pushes the current controller state to the remote side again.
    fn send_feedback_state(&self);

    /// Installs (or with `None`, removes) the frame-ready handler.
    fn set_frame_handler(&self, handler: Option<FrameHandler>);

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;
}
