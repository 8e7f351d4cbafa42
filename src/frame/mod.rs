//! Frame delivery from the session to the presentation surface
//!
//! ```text
//! session decode thread            FrameRelay task
//!   │ handler(&[u8])                 │ notified()
//!   ▼                                ▼
//! FrameSlot { Mutex<FrameBuffer>, Notify } ──copy──► private FrameBuffer ──► PresentationSurface
//! ```
//!
//! The slot is the only place both sides touch. The writer copies under the
//! lock and then signals; the reader copies out under the same lock before
//! presenting, so a half-written frame is never presented.

pub mod relay;
pub mod surface;

pub use relay::FrameRelay;
pub use surface::{LogSurface, PresentError, PresentationSurface};

use std::sync::{Mutex, MutexGuard};
use tokio::sync::Notify;
use tracing::warn;

/// Interleaved RGB, 8 bits per channel.
pub const CHANNELS: usize = 3;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum FrameError {
    #[error("Frame has {actual} bytes, buffer expects {expected}")]
    ShapeMismatch { expected: usize, actual: usize },
}

/// Fixed-shape `height × width × 3` pixel buffer, row-major.
///
/// Allocated once; the shape never changes after construction.
#[derive(Clone, PartialEq)]
pub struct FrameBuffer {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl FrameBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height * CHANNELS],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn bytes_per_line(&self) -> usize {
        self.width * CHANNELS
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let at = y * self.bytes_per_line() + x * CHANNELS;
        Some([self.data[at], self.data[at + 1], self.data[at + 2]])
    }

    /// Overwrites the buffer with `pixels`, which must match the shape exactly.
    pub fn write(&mut self, pixels: &[u8]) -> Result<(), FrameError> {
        if pixels.len() != self.data.len() {
            return Err(FrameError::ShapeMismatch {
                expected: self.data.len(),
                actual: pixels.len(),
            });
        }
        self.data.copy_from_slice(pixels);
        Ok(())
    }

    pub fn copy_from(&mut self, other: &FrameBuffer) -> Result<(), FrameError> {
        self.write(&other.data)
    }
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Handoff point between the frame-ready handler and the relay.
///
/// `Notify` keeps at most one permit: a signal with no waiter is remembered
/// for the next wait, repeated signals collapse into one.
#[derive(Debug)]
pub struct FrameSlot {
    buffer: Mutex<FrameBuffer>,
    ready: Notify,
}

impl FrameSlot {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            buffer: Mutex::new(FrameBuffer::new(width, height)),
            ready: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FrameBuffer> {
        self.buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Writer side: stores a decoded frame and signals the relay.
    ///
    /// Frames of the wrong size are dropped without a signal.
    pub fn publish(&self, pixels: &[u8]) -> Result<(), FrameError> {
        if let Err(e) = self.lock().write(pixels) {
            warn!("Dropping decoded frame: {}", e);
            return Err(e);
        }
        self.ready.notify_one();
        Ok(())
    }

    /// Waits for the next frame-ready signal, consuming it.
    pub async fn wait_ready(&self) {
        self.ready.notified().await;
    }

    /// Reader side: copies the latest frame into `target`.
    pub fn copy_into(&self, target: &mut FrameBuffer) -> Result<(), FrameError> {
        target.copy_from(&self.lock())
    }
}
