//! Configuration module for lidar-rt
//!
//! Pipeline configuration is a TOML file. Every section has defaults, so a
//! file only needs to name what it changes:
//!
//! ```toml
//! report_path = "run-report.json"
//!
//! [scheduler]
//! period_ms = 100
//!
//! [source]
//! frames = ["point_cloud1.txt", "point_cloud2.txt", "point_cloud3.txt"]
//!
//! [filters.preprocess]
//! forward = 30.0
//! ```
//!
//! # Config Location
//!
//! Without `--config`, the binary looks for `pipeline.toml` in the
//! platform-appropriate config directory under `dev.hxyulin.lidar-rt`:
//!
//! - **Linux**: `~/.config/dev.hxyulin.lidar-rt/`
//! - **macOS**: `~/Library/Application Support/dev.hxyulin.lidar-rt/`
//! - **Windows**: `%APPDATA%\dev.hxyulin.lidar-rt\`

pub mod settings;

pub use settings::*;

use crate::error::{LidarError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application identifier for config directories
pub const APP_ID: &str = "dev.hxyulin.lidar-rt";

/// Config filename
pub const CONFIG_FILE: &str = "pipeline.toml";

/// Default acquisition period in milliseconds (10 Hz)
pub const DEFAULT_PERIOD_MS: u64 = 100;

/// Default spin tail before each wake, in microseconds
pub const DEFAULT_SPIN_THRESHOLD_US: u64 = 500;

/// Default supervisor polling interval in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;

/// Default tracing filter
pub const DEFAULT_LOG_FILTER: &str = "info,lidar_rt=debug";

/// Get the default config file path
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID).join(CONFIG_FILE))
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Write a JSON run report here on exit
    #[serde(default)]
    pub report_path: Option<PathBuf>,

    /// Acquisition timing
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Stop-request supervision
    #[serde(default)]
    pub supervisor: SupervisorConfig,

    /// Frame files for the acquisition stage
    #[serde(default)]
    pub source: SourceConfig,

    /// Filter stage parameters
    #[serde(default)]
    pub filters: FilterConfig,

    /// Logging output
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PipelineConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            LidarError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            LidarError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration, returning defaults if the file is missing or invalid
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save configuration as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                LidarError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| LidarError::Serialization(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| {
            LidarError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// Check values that would make the pipeline misbehave
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.period_ms == 0 {
            return Err(LidarError::Config("scheduler.period_ms must be > 0".into()));
        }
        if self.scheduler.spin_threshold_us.saturating_mul(1_000)
            >= self.scheduler.period_ms.saturating_mul(1_000_000)
        {
            return Err(LidarError::Config(
                "scheduler.spin_threshold_us must be shorter than the period".into(),
            ));
        }
        if self.supervisor.poll_interval_ms == 0 {
            return Err(LidarError::Config(
                "supervisor.poll_interval_ms must be > 0".into(),
            ));
        }

        let crop = &self.filters.preprocess;
        if crop.forward <= 0.0 || crop.side <= 0.0 || crop.top <= 0.0 {
            return Err(LidarError::Config(
                "filters.preprocess bounds must be positive".into(),
            ));
        }

        let id = &self.filters.identify;
        if id.forward <= 0.0 || id.side <= 0.0 || id.cell_size <= 0.0 {
            return Err(LidarError::Config(
                "filters.identify extents and cell_size must be positive".into(),
            ));
        }
        if id.max_diff < 0.0 || id.max_incline < 0.0 {
            return Err(LidarError::Config(
                "filters.identify limits must not be negative".into(),
            ));
        }
        Ok(())
    }
}

/// Acquisition timing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Period between acquisitions in milliseconds
    pub period_ms: u64,

    /// Busy-wait this long before each wake for accuracy (microseconds)
    pub spin_threshold_us: u64,
}

impl SchedulerConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    pub fn spin_threshold(&self) -> Duration {
        Duration::from_micros(self.spin_threshold_us)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            period_ms: DEFAULT_PERIOD_MS,
            spin_threshold_us: DEFAULT_SPIN_THRESHOLD_US,
        }
    }
}

/// Supervisor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// How often the supervisor checks for a stop request
    pub poll_interval_ms: u64,
}

impl SupervisorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

/// Frame source configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Point-cloud files, loaded in order and repeated
    pub frames: Vec<PathBuf>,
}

/// Parameters of the two filter stages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub preprocess: CropSettings,
    pub identify: DriveableSettings,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,

    /// Also write daily-rotated log files here
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
            log_dir: None,
        }
    }
}
