use super::FrameBuffer;
use chrono::{DateTime, Local};
use std::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum PresentError {
    #[error("Failed to present frame: {0}")]
    Failed(String),
}

/// Whatever paints frames for the user.
///
/// Called from the frame relay task, at most `max_fps` times per second.
pub trait PresentationSurface: Send + Sync + 'static {
    fn present(&self, frame: &FrameBuffer) -> Result<(), PresentError>;
}

#[derive(Debug)]
struct SurfaceStats {
    total: u64,
    window_frames: u64,
    window_start: DateTime<Local>,
}

/// Headless surface: counts frames and logs the achieved rate.
#[derive(Debug)]
pub struct LogSurface {
    stats: Mutex<SurfaceStats>,
    log_interval: chrono::Duration,
}

impl LogSurface {
    pub fn new(log_interval_secs: i64) -> Self {
        Self {
            stats: Mutex::new(SurfaceStats {
                total: 0,
                window_frames: 0,
                window_start: Local::now(),
            }),
            log_interval: chrono::Duration::seconds(log_interval_secs.max(1)),
        }
    }

    pub fn frames_presented(&self) -> u64 {
        self.stats
            .lock()
            .map(|stats| stats.total)
            .unwrap_or_else(|poisoned| poisoned.into_inner().total)
    }
}

impl Default for LogSurface {
    fn default() -> Self {
        Self::new(10)
    }
}

impl PresentationSurface for LogSurface {
    fn present(&self, frame: &FrameBuffer) -> Result<(), PresentError> {
        let mut stats = self
            .stats
            .lock()
            .map_err(|e| PresentError::Failed(e.to_string()))?;

        stats.total += 1;
        stats.window_frames += 1;
        debug!(
            "Presenting frame #{} ({}x{})",
            stats.total,
            frame.width(),
            frame.height()
        );

        let now = Local::now();
        let elapsed = now - stats.window_start;
        if elapsed > self.log_interval {
            let seconds = elapsed.num_milliseconds() as f64 / 1000.0;
            info!(
                "Surface stats: {} frames in {:.1} seconds (avg {:.2} fps)",
                stats.window_frames,
                seconds,
                stats.window_frames as f64 / seconds
            );
            stats.window_frames = 0;
            stats.window_start = now;
        }
        Ok(())
    }
}
