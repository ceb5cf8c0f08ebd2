// Collaborator interfaces the drive core talks to, and the allocation boundary
//
// Real robots implement these over their motor controllers and sensors;
// `sim` implements them over a simple plant model. Allocation either hands back
// a complete `DriveHardware` or a typed error, never a half-built set.

use std::fmt;

use tracing::{debug, info, warn};

use crate::messages::Gear;

/// Open-loop motor output
pub trait Actuator {
    /// Command a power in [-1, 1]
    fn set_power(&mut self, power: f64);
}

/// Cumulative wheel travel sensor
pub trait DistanceEncoder {
    /// Distance travelled since the last reset (meters)
    fn distance(&self) -> f64;
    /// Current wheel surface speed (meters/second)
    fn rate(&self) -> f64;
    fn reset(&mut self);
}

pub trait Gyroscope {
    /// Yaw in degrees, wrapped or continuous; callers normalize
    fn yaw_degrees(&self) -> f64;
}

/// Camera that reports a single field landmark
pub trait VisionSensor {
    fn is_target_sighted(&self) -> bool;
    fn horizontal_angle_degrees(&self) -> f64;
    /// Distance to the sighted landmark (meters)
    fn target_distance(&self) -> f64;
    fn latency_ms(&self) -> f64;
}

pub trait GearSelector {
    fn gear(&self) -> Gear;
}

/// Which side of the drivetrain a device sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Motor controller positions in the drive gearbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorSlot {
    LeftMaster,
    LeftFollower,
    RightMaster,
    RightFollower,
}

impl ActuatorSlot {
    pub const ALL: [ActuatorSlot; 4] = [
        ActuatorSlot::LeftMaster,
        ActuatorSlot::LeftFollower,
        ActuatorSlot::RightMaster,
        ActuatorSlot::RightFollower,
    ];
}

impl fmt::Display for ActuatorSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActuatorSlot::LeftMaster => "left master",
            ActuatorSlot::LeftFollower => "left follower",
            ActuatorSlot::RightMaster => "right master",
            ActuatorSlot::RightFollower => "right follower",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorSlot {
    LeftEncoder,
    RightEncoder,
    Gyro,
    Vision,
    GearSelector,
}

impl fmt::Display for SensorSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SensorSlot::LeftEncoder => "left encoder",
            SensorSlot::RightEncoder => "right encoder",
            SensorSlot::Gyro => "gyro",
            SensorSlot::Vision => "vision",
            SensorSlot::GearSelector => "gear selector",
        };
        f.write_str(name)
    }
}

/// Error types for hardware allocation
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    #[error("Failed to allocate {slot} motor controller: {reason}")]
    Actuator { slot: ActuatorSlot, reason: String },

    #[error("Failed to allocate {slot}: {reason}")]
    Sensor { slot: SensorSlot, reason: String },
}

/// Source of device handles; each call either yields a working handle or fails
pub trait HardwareProvider {
    fn actuator(&mut self, slot: ActuatorSlot) -> Result<Box<dyn Actuator>, HardwareError>;
    fn encoder(&mut self, side: Side) -> Result<Box<dyn DistanceEncoder>, HardwareError>;
    fn gyro(&mut self) -> Result<Box<dyn Gyroscope>, HardwareError>;
    fn vision(&mut self) -> Result<Box<dyn VisionSensor>, HardwareError>;
    fn gear_selector(&mut self) -> Result<Box<dyn GearSelector>, HardwareError>;
}

/// Master plus follower on one side; the follower always gets the master's power
pub struct MotorGroup {
    master: Box<dyn Actuator>,
    follower: Box<dyn Actuator>,
}

impl MotorGroup {
    pub fn new(master: Box<dyn Actuator>, follower: Box<dyn Actuator>) -> Self {
        Self { master, follower }
    }

    pub fn set(&mut self, power: f64) {
        self.master.set_power(power);
        self.follower.set_power(power);
    }
}

/// Every device the drivetrain needs, fully allocated
pub struct DriveHardware {
    pub left: MotorGroup,
    pub right: MotorGroup,
    pub left_encoder: Box<dyn DistanceEncoder>,
    pub right_encoder: Box<dyn DistanceEncoder>,
    pub gyro: Box<dyn Gyroscope>,
    pub vision: Box<dyn VisionSensor>,
    pub gear_selector: Box<dyn GearSelector>,
}

impl DriveHardware {
    /// Allocate all drive devices from a provider
    ///
    /// The first failure aborts allocation; handles obtained so far are dropped.
    pub fn allocate(provider: &mut dyn HardwareProvider) -> Result<Self, HardwareError> {
        info!("Allocating drive motor controllers");
        let left_master = log_failure(provider.actuator(ActuatorSlot::LeftMaster))?;
        let right_master = log_failure(provider.actuator(ActuatorSlot::RightMaster))?;
        let left_follower = log_failure(provider.actuator(ActuatorSlot::LeftFollower))?;
        let right_follower = log_failure(provider.actuator(ActuatorSlot::RightFollower))?;

        debug!("Allocating drive sensors");
        let left_encoder = log_failure(provider.encoder(Side::Left))?;
        let right_encoder = log_failure(provider.encoder(Side::Right))?;
        let gyro = log_failure(provider.gyro())?;
        let vision = log_failure(provider.vision())?;
        let gear_selector = log_failure(provider.gear_selector())?;

        info!("Drive hardware allocated");
        Ok(Self {
            left: MotorGroup::new(left_master, left_follower),
            right: MotorGroup::new(right_master, right_follower),
            left_encoder,
            right_encoder,
            gyro,
            vision,
            gear_selector,
        })
    }

    /// Drive both sides; callers pass already-clamped powers
    pub fn set_powers(&mut self, left: f64, right: f64) {
        self.left.set(left);
        self.right.set(right);
    }

    pub fn reset_encoders(&mut self) {
        self.left_encoder.reset();
        self.right_encoder.reset();
    }
}

fn log_failure<T>(result: Result<T, HardwareError>) -> Result<T, HardwareError> {
    if let Err(e) = &result {
        warn!("{}", e);
    }
    result
}
