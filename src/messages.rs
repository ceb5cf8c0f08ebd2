// Plain data types shared between the drive core, the runtime and telemetry

use std::fmt;

use serde::{Deserialize, Serialize};

/// Planar pose in field coordinates
///
/// `heading` is in degrees and always normalized to (-180, 180].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose2d {
    pub x: f64, // meters
    pub y: f64, // meters
    pub heading: f64,
}

impl Pose2d {
    pub fn new(x: f64, y: f64, heading: f64) -> Self {
        Self {
            x,
            y,
            heading: normalize_degrees(heading),
        }
    }

    pub fn origin() -> Self {
        Self::default()
    }
}

/// Wrap an angle in degrees into (-180, 180]
pub fn normalize_degrees(degrees: f64) -> f64 {
    if !degrees.is_finite() {
        return degrees;
    }
    let wrapped = degrees.rem_euclid(360.0); // [0, 360)
    if wrapped > 180.0 { wrapped - 360.0 } else { wrapped }
}

/// Cumulative wheel travel read from the encoders (meters)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WheelSample {
    pub left_distance: f64,
    pub right_distance: f64,
}

impl WheelSample {
    pub fn new(left_distance: f64, right_distance: f64) -> Self {
        Self {
            left_distance,
            right_distance,
        }
    }
}

/// Absolute yaw reading from the gyro (degrees, wrapped or continuous)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HeadingSample {
    pub yaw: f64,
}

/// Driver intent for one control cycle
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DriveCommand {
    pub speed: f64,
    pub rotation: f64,
    #[serde(default)]
    pub creep: bool,
    #[serde(default, rename = "override")]
    pub override_shaping: bool,
}

impl DriveCommand {
    pub fn new(speed: f64, rotation: f64) -> Self {
        Self {
            speed,
            rotation,
            creep: false,
            override_shaping: false,
        }
    }

    pub fn stop() -> Self {
        Self::default()
    }

    /// Copy with both axes clamped to [-1, 1] (NaN becomes 0)
    pub fn clamped(self) -> Self {
        Self {
            speed: clamp_unit(self.speed),
            rotation: clamp_unit(self.rotation),
            ..self
        }
    }
}

/// Command from teleop/scripts -> runtime
// flatten keeps the wire format a single flat JSON object
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OperatorCommand {
    #[serde(flatten)]
    pub drive: DriveCommand,
    #[serde(default)]
    pub auto_target_drive: bool,
}

impl From<&OperatorCommand> for DriveCommand {
    fn from(cmd: &OperatorCommand) -> Self {
        cmd.drive
    }
}

/// Transmission state reported by the gear selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Gear {
    High,
    Low,
    #[default]
    Unknown,
}

impl fmt::Display for Gear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Gear::High => "High",
            Gear::Low => "Low",
            Gear::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// Left/right power pair, each in [-1, 1]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MotorPowers {
    pub left: f64,
    pub right: f64,
}

impl MotorPowers {
    pub fn new(left: f64, right: f64) -> Self {
        Self {
            left: clamp_unit(left),
            right: clamp_unit(right),
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }
}

/// Fixed point in field coordinates (meters)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TargetFix {
    pub x: f64,
    pub y: f64,
}

impl TargetFix {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Snapshot of the drivetrain published once per telemetry period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveTelemetry {
    pub pose: Pose2d,
    pub powers: MotorPowers,
    pub gear: Gear,
    pub heading_hold_enabled: bool,
    pub heading_setpoint: f64,
    pub heading_at_setpoint: bool,
    pub distance_to_target: f64,
    pub angle_to_target: f64,
    pub paused: bool,
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
}

/// Clamp to [-1, 1]; NaN maps to 0 so it never reaches an actuator
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(-1.0, 1.0)
    }
}
