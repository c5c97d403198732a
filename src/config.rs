//! Configuration management for sentrycam
//!
//! Two persisted surfaces: the TOML agent configuration (detection,
//! recording, storage, shutdown sections) and the legacy three-integer camera
//! tuning file the camera stack shares with other tooling.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::AgentError;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub detection: DetectionConfig,
    pub recording: RecordingConfig,
    pub storage: StorageConfig,
    pub shutdown: ShutdownConfig,
}

/// Model and trigger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Path to the compiled model the accelerator loads
    pub model_path: String,
    /// Line-oriented label vocabulary (index = line number)
    pub labels_path: String,
    /// Score threshold, must be within [0, 1]
    pub score_threshold: f32,
    /// Class names allowed to trigger recording
    pub watch: Vec<String>,
}

/// Capture and session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Video width in pixels
    pub width: u32,
    /// Video height in pixels
    pub height: u32,
    /// Frames per second
    pub fps: u32,
    /// Target bitrate in bits per second
    pub bitrate: u32,
    /// Minimum recording length in seconds
    pub min_secs: u64,
    /// Length of the pre-detection buffer in seconds
    pub pre_roll_secs: u32,
    /// Camera tuning file shared with the camera stack
    pub tuning_path: PathBuf,
}

/// Storage tree and archive sweep configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Fast ephemeral scratch area raw captures are written to
    pub scratch_dir: PathBuf,
    /// Durable local tree distribution files are relocated to
    pub video_dir: PathBuf,
    /// Durable local tree for trigger snapshots
    pub picture_dir: PathBuf,
    /// Root under which removable volumes are mounted
    pub media_root: PathBuf,
    /// Seconds between archive sweeps
    pub sweep_secs: u64,
    /// Offload to removable storage is suppressed at or above this used-percent
    pub high_water_percent: f64,
    /// Recording stops when free RAM falls to this many megabytes
    pub ram_limit_mb: u64,
}

/// Unattended power-off configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    pub enabled: bool,
    /// Wall-clock hour (0-23) after which shutdown is allowed
    pub hour: u32,
    /// Wall-clock minute (0-59)
    pub minute: u32,
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn media_dir() -> PathBuf {
    match std::env::var("USER") {
        Ok(user) => PathBuf::from("/media").join(user),
        Err(_) => PathBuf::from("/media"),
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            detection: DetectionConfig {
                model_path: "/usr/share/hailo-models/yolov8s_h8l.hef".to_string(),
                labels_path: "coco.txt".to_string(),
                score_threshold: 0.5,
                watch: vec![
                    "cat".to_string(),
                    "bear".to_string(),
                    "bird".to_string(),
                    "clock".to_string(),
                ],
            },
            recording: RecordingConfig {
                width: 1456,
                height: 1088,
                fps: 25,
                bitrate: 2_000_000,
                min_secs: 5,
                pre_roll_secs: 5,
                tuning_path: PathBuf::from("Det_Config01.txt"),
            },
            storage: StorageConfig {
                scratch_dir: PathBuf::from("/run/shm"),
                video_dir: home_dir().join("Videos"),
                picture_dir: home_dir().join("Pictures"),
                media_root: media_dir(),
                sweep_secs: 10,
                high_water_percent: 90.0,
                ram_limit_mb: 150,
            },
            shutdown: ShutdownConfig {
                enabled: false,
                hour: 20,
                minute: 0,
            },
        }
    }
}

impl AgentConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, AgentError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| AgentError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: AgentConfig = toml::from_str(&contents)
            .map_err(|e| AgentError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), AgentError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                AgentError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| AgentError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| AgentError::ConfigError(format!("Failed to write config file: {}", e)))?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("sentrycam.toml")
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.detection.score_threshold) {
            return Err("Score threshold must be between 0.0 and 1.0".to_string());
        }
        if self.detection.watch.is_empty() {
            return Err("Watch list must name at least one class".to_string());
        }

        if self.recording.width == 0 || self.recording.height == 0 {
            return Err("Invalid capture resolution".to_string());
        }
        if self.recording.fps == 0 || self.recording.fps > 240 {
            return Err("Invalid FPS (must be 1-240)".to_string());
        }
        if self.recording.min_secs == 0 {
            return Err("Minimum recording length must be at least 1 second".to_string());
        }
        if self.recording.pre_roll_secs == 0 {
            return Err("Pre-roll must be at least 1 second".to_string());
        }

        if self.storage.sweep_secs == 0 {
            return Err("Sweep interval must be at least 1 second".to_string());
        }
        if !(0.0..=100.0).contains(&self.storage.high_water_percent) {
            return Err("High-water mark must be between 0 and 100 percent".to_string());
        }

        if self.shutdown.hour > 23 {
            return Err("Shutdown hour must be 0-23".to_string());
        }
        if self.shutdown.minute > 59 {
            return Err("Shutdown minute must be 0-59".to_string());
        }

        Ok(())
    }

    /// RAM limit in bytes, as compared against FrameSource::free_ram.
    pub fn ram_limit_bytes(&self) -> u64 {
        self.storage.ram_limit_mb * 1024 * 1024
    }
}

/// The three camera tuning integers shared with the camera stack: exposure
/// mode, manual shutter speed, analogue gain. Plain text, one value per line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraTuning {
    /// 0 = manual, 1 = normal, 2 = short, 3 = long
    pub mode: u32,
    /// Manual shutter speed, microseconds. Only meaningful in mode 0.
    pub speed: u32,
    /// Analogue gain, 0 = auto
    pub gain: u32,
}

pub const TUNING_MODES: [&str; 4] = ["manual", "normal", "short", "long"];

const SPEED_MIN: u32 = 1_000;
const SPEED_MAX: u32 = 100_000;
const SPEED_STEP: u32 = 1_000;
const GAIN_MAX: u32 = 64;

impl Default for CameraTuning {
    fn default() -> Self {
        Self {
            mode: 1,
            speed: 1_000,
            gain: 0,
        }
    }
}

impl CameraTuning {
    /// Read the tuning file, creating it with defaults when missing.
    pub fn load_or_create(path: &Path) -> Result<Self, AgentError> {
        if !path.exists() {
            let tuning = Self::default();
            tuning.save(path)?;
            log::info!("Created tuning file {:?} with defaults", path);
            return Ok(tuning);
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| AgentError::ConfigError(format!("Failed to read tuning file: {}", e)))?;
        let values: Vec<u32> = contents
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| l.trim().parse::<u32>())
            .collect::<Result<_, _>>()
            .map_err(|e| AgentError::ConfigError(format!("Malformed tuning file: {}", e)))?;
        if values.len() < 3 {
            return Err(AgentError::ConfigError(format!(
                "Tuning file {:?} has {} values, expected 3",
                path,
                values.len()
            )));
        }

        Ok(Self {
            mode: values[0],
            speed: values[1],
            gain: values[2],
        })
    }

    /// Write the tuning values back, one per line.
    pub fn save(&self, path: &Path) -> Result<(), AgentError> {
        let contents = format!("{}\n{}\n{}\n", self.mode, self.speed, self.gain);
        fs::write(path, contents)
            .map_err(|e| AgentError::ConfigError(format!("Failed to write tuning file: {}", e)))
    }

    pub fn mode_name(&self) -> &'static str {
        TUNING_MODES
            .get(self.mode as usize)
            .copied()
            .unwrap_or("unknown")
    }

    /// Step the exposure mode, wrapping around in either direction.
    pub fn cycle_mode(&mut self, forward: bool) {
        self.mode = if forward {
            (self.mode + 1) % 4
        } else {
            (self.mode + 3) % 4
        };
    }

    pub fn adjust_speed(&mut self, up: bool) {
        self.speed = if up {
            (self.speed + SPEED_STEP).min(SPEED_MAX)
        } else {
            self.speed.saturating_sub(SPEED_STEP).max(SPEED_MIN)
        };
    }

    pub fn adjust_gain(&mut self, up: bool) {
        self.gain = if up {
            (self.gain + 1).min(GAIN_MAX)
        } else {
            self.gain.saturating_sub(1)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AgentConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.recording.fps, 25);
        assert_eq!(config.storage.ram_limit_mb, 150);
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let mut config = AgentConfig::default();
        config.detection.score_threshold = 1.5;
        assert!(config.validate().is_err());
        config.detection.score_threshold = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_watch_list_rejected() {
        let mut config = AgentConfig::default();
        config.detection.watch.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sentrycam.toml");

        let mut config = AgentConfig::default();
        config.storage.sweep_secs = 42;
        config.save_to_file(&path).unwrap();

        let loaded = AgentConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.storage.sweep_secs, 42);
        assert_eq!(loaded.detection.watch, config.detection.watch);
    }

    #[test]
    fn test_load_nonexistent_file_gives_defaults() {
        let config = AgentConfig::load_from_file("no_such_file.toml").unwrap();
        assert_eq!(config.recording.fps, 25);
    }

    #[test]
    fn test_tuning_created_with_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Det_Config01.txt");

        let tuning = CameraTuning::load_or_create(&path).unwrap();
        assert_eq!(tuning, CameraTuning::default());
        assert!(path.exists());

        let reread = CameraTuning::load_or_create(&path).unwrap();
        assert_eq!(reread, tuning);
    }

    #[test]
    fn test_tuning_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tuning.txt");

        let tuning = CameraTuning {
            mode: 0,
            speed: 4_000,
            gain: 12,
        };
        tuning.save(&path).unwrap();
        assert_eq!(CameraTuning::load_or_create(&path).unwrap(), tuning);
    }

    #[test]
    fn test_tuning_malformed_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tuning.txt");
        fs::write(&path, "1\ntwo\n3\n").unwrap();
        let err = CameraTuning::load_or_create(&path).unwrap_err();
        assert!(matches!(err, AgentError::ConfigError(_)));
    }

    #[test]
    fn test_tuning_clamps() {
        let mut tuning = CameraTuning {
            mode: 3,
            speed: 100_000,
            gain: 64,
        };
        tuning.cycle_mode(true);
        assert_eq!(tuning.mode, 0);
        tuning.cycle_mode(false);
        assert_eq!(tuning.mode, 3);

        tuning.adjust_speed(true);
        assert_eq!(tuning.speed, 100_000);
        tuning.speed = 1_000;
        tuning.adjust_speed(false);
        assert_eq!(tuning.speed, 1_000);

        tuning.adjust_gain(true);
        assert_eq!(tuning.gain, 64);
        tuning.gain = 0;
        tuning.adjust_gain(false);
        assert_eq!(tuning.gain, 0);
    }
}
