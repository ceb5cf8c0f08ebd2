// Loop timing, watchdog, and the static drivetrain configuration surface
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::messages::TargetFix;

// Runtime loop frequency (20 ms control cycle)
pub const LOOP_HZ: u64 = 50;

// Command timeout for watchdog
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

// Publish a telemetry line every N cycles by default
pub const TELEMETRY_EVERY: u64 = 10;

/// Error types for loading and validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Sensitivity constants for the shaping curve, all in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensitivityProfile {
    pub rotation_sensitivity_high_gear: f64,
    pub rotation_sensitivity_low_gear: f64,
    pub turning_sensitivity_high_gear: f64,
    pub turning_sensitivity_low_gear: f64,
    pub speed_sensitivity: f64,
    /// Accepted for compatibility with older tuning files; not applied by the mixer
    pub rotation_sensitivity: f64,
}

impl Default for SensitivityProfile {
    fn default() -> Self {
        Self {
            rotation_sensitivity_high_gear: 0.8,
            rotation_sensitivity_low_gear: 0.8,
            turning_sensitivity_high_gear: 0.7,
            turning_sensitivity_low_gear: 0.8,
            speed_sensitivity: 0.9,
            rotation_sensitivity: 1.0,
        }
    }
}

impl SensitivityProfile {
    /// Linear everywhere (k = 0), handy for tuning and tests
    pub fn linear() -> Self {
        Self {
            rotation_sensitivity_high_gear: 0.0,
            rotation_sensitivity_low_gear: 0.0,
            turning_sensitivity_high_gear: 0.0,
            turning_sensitivity_low_gear: 0.0,
            speed_sensitivity: 0.0,
            rotation_sensitivity: 0.0,
        }
    }
}

/// Heading-hold PID gains
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadingHoldConfig {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Corrective rotation is capped to +/- this value
    pub output_limit: f64,
    /// Telemetry only; never gates enable/disable
    pub tolerance_degrees: f64,
    pub period_seconds: f64,
}

impl Default for HeadingHoldConfig {
    fn default() -> Self {
        Self {
            kp: 0.02,
            ki: 0.0,
            kd: 0.001,
            output_limit: 0.15,
            tolerance_degrees: 1.0,
            period_seconds: 1.0 / LOOP_HZ as f64,
        }
    }
}

/// Static drivetrain configuration, fixed for the robot's lifetime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    /// Distance between left and right wheel contact patches (meters)
    pub track_width: f64,
    /// Forward speed magnitude below which the robot turns in place
    pub deadband: f64,
    pub creep_factor: f64,
    /// Rotation scale in turn-in-place when not creeping
    pub turn_in_place_scale: f64,
    /// Forward speed cap applied in high gear
    pub high_gear_speed_limit: f64,
    pub sensitivity: SensitivityProfile,
    pub heading_hold: HeadingHoldConfig,
    /// Vision fixes closer than this (meters) replace the odometry pose
    pub odometry_correction_zone: f64,
    pub target: TargetFix,
    /// Known field position of the landmark the drive camera sights
    pub vision_landmark: TargetFix,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            track_width: 0.6,
            deadband: 0.05,
            creep_factor: 0.25,
            turn_in_place_scale: 0.8,
            high_gear_speed_limit: 0.9,
            sensitivity: SensitivityProfile::default(),
            heading_hold: HeadingHoldConfig::default(),
            odometry_correction_zone: 3.0,
            target: TargetFix::new(15.98, 5.85),
            vision_landmark: TargetFix::new(0.0, 5.85),
        }
    }
}

impl DriveConfig {
    /// Load a JSON config file; missing fields take their defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("Loading drive config from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        let config: DriveConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check ranges so the per-cycle core never sees nonsense constants
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("track_width", self.track_width)?;
        below("deadband", self.deadband, 0.0, 1.0)?;
        in_range("creep_factor", self.creep_factor, 0.0, 1.0)?;
        in_range("turn_in_place_scale", self.turn_in_place_scale, 0.0, 1.0)?;
        in_range("high_gear_speed_limit", self.high_gear_speed_limit, 0.0, 1.0)?;

        let s = &self.sensitivity;
        for (field, value) in [
            ("sensitivity.rotation_sensitivity_high_gear", s.rotation_sensitivity_high_gear),
            ("sensitivity.rotation_sensitivity_low_gear", s.rotation_sensitivity_low_gear),
            ("sensitivity.turning_sensitivity_high_gear", s.turning_sensitivity_high_gear),
            ("sensitivity.turning_sensitivity_low_gear", s.turning_sensitivity_low_gear),
            ("sensitivity.speed_sensitivity", s.speed_sensitivity),
            ("sensitivity.rotation_sensitivity", s.rotation_sensitivity),
        ] {
            in_range(field, value, 0.0, 1.0)?;
        }

        let h = &self.heading_hold;
        finite("heading_hold.kp", h.kp)?;
        finite("heading_hold.ki", h.ki)?;
        finite("heading_hold.kd", h.kd)?;
        in_range("heading_hold.output_limit", h.output_limit, 0.0, 1.0)?;
        finite("heading_hold.tolerance_degrees", h.tolerance_degrees)?;
        positive("heading_hold.period_seconds", h.period_seconds)?;

        finite("odometry_correction_zone", self.odometry_correction_zone)?;
        finite("target.x", self.target.x)?;
        finite("target.y", self.target.y)?;
        finite("vision_landmark.x", self.vision_landmark.x)?;
        finite("vision_landmark.y", self.vision_landmark.y)?;
        Ok(())
    }
}

fn finite(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("{} is not finite", value),
        })
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    finite(field, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("{} must be > 0", value),
        })
    }
}

fn in_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    finite(field, value)?;
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("{} outside [{}, {}]", value, min, max),
        })
    }
}

/// Half-open range [min, max)
fn below(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    finite(field, value)?;
    if (min..max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("{} outside [{}, {})", value, min, max),
        })
    }
}
