//! Shell configuration
//!
//! A single TOML file split into sections for the frame pipeline, the
//! controller pipeline, the session and logging. Every field has a default,
//! so a partial (or empty) file is valid.
//!
//! ```toml
//! [frame]
//! width = 1920
//! height = 1080
//! max_fps = 60
//!
//! [controller]
//! poll_interval_ms = 50
//! joystick_deadzone = 0.0
//!
//! [session]
//! host = "192.168.1.20"
//! nickname = "PS5-083"
//!
//! [logging]
//! level = "info"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const CONFIG_DIR: &str = ".config/playshell";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct ShellConfig {
    pub frame: FrameSettings,
    pub controller: ControllerSettings,
    pub session: SessionSettings,
    pub logging: LogSettings,
}

/// Frame pipeline settings.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct FrameSettings {
    pub width: usize,
    pub height: usize,
    /// Upper bound on frames handed to the presentation surface per second
    pub max_fps: u32,
}

impl FrameSettings {
    /// Minimum spacing between two emitted frames.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.max_fps.max(1)))
    }
}

impl Default for FrameSettings {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            max_fps: 60,
        }
    }
}

/// Controller pipeline settings.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ControllerSettings {
    /// Longest time the device reader blocks before re-checking for shutdown
    pub poll_interval_ms: u64,
    /// Stick deadzone as a fraction; 0.0 passes raw values through
    pub joystick_deadzone: f32,
    /// Which connected gamepad to use; first one if unset
    pub gamepad_index: Option<usize>,
    /// Capacity of the device-to-relay sample queue
    pub channel_capacity: usize,
}

impl ControllerSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
            joystick_deadzone: 0.0,
            gamepad_index: None,
            channel_capacity: 1000,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SessionSettings {
    pub host: String,
    pub nickname: String,
    /// Frame rate of the loopback session's test pattern
    pub test_pattern_fps: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            nickname: "loopback".to_string(),
            test_pattern_fps: 30,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
}

impl LogSettings {
    pub fn max_level(&self) -> tracing::Level {
        self.level.parse().unwrap_or_else(|_| {
            warn!("Unknown log level '{}', using info", self.level);
            tracing::Level::INFO
        })
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ShellConfig {
    /// `~/.config/playshell/config.toml`
    pub fn default_path() -> PathBuf {
        let mut path = dirs::home_dir().unwrap_or_else(|| {
            warn!("Could not determine home directory, using current directory");
            PathBuf::from(".")
        });
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        path
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ShellConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!("Loading config from {}", path.display());
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_toml_str(&content)
    }

    /// Writes a default config to `path` unless a file already exists there.
    pub async fn ensure_default_config(path: &Path) -> Result<(), ConfigError> {
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        if exists {
            return Ok(());
        }

        info!("Creating default configuration at {}", path.display());
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        let content = ShellConfig::default().to_toml_string()?;
        tokio::fs::write(path, content).await.map_err(write_err)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame.max_fps == 0 {
            return Err(ConfigError::Invalid("frame.max_fps must be at least 1".into()));
        }
        if self.frame.width == 0 || self.frame.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "frame size {}x{} is empty",
                self.frame.width, self.frame.height
            )));
        }
        let deadzone = self.controller.joystick_deadzone;
        if !(0.0..1.0).contains(&deadzone) {
            return Err(ConfigError::Invalid(format!(
                "controller.joystick_deadzone {} outside [0, 1)",
                deadzone
            )));
        }
        if self.controller.channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "controller.channel_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
