// Drivetrain subsystem
//
// Owns the drive hardware and wires the mixer, heading-hold, odometry and
// target geometry together into one call per control cycle.

use tracing::{debug, info, warn};

use super::heading_hold::HeadingHold;
use super::kinematics::{ChassisSpeeds, DifferentialKinematics, WheelSpeeds};
use super::mixer::DriveMixer;
use crate::config::{ConfigError, DriveConfig};
use crate::hardware::{DriveHardware, HardwareError, HardwareProvider};
use crate::messages::{
    DriveCommand, DriveTelemetry, Gear, HeadingSample, MotorPowers, Pose2d, WheelSample,
    normalize_degrees,
};
use crate::pose::odometry::{OdometryTracker, VisionCorrection, VisionFix};
use crate::pose::target::TargetGeometry;

/// Error types for building a drivetrain
#[derive(Debug, thiserror::Error)]
pub enum DriveError {
    #[error("Invalid drive config: {0}")]
    Config(#[from] ConfigError),

    #[error("Drive hardware unavailable: {0}")]
    Hardware(#[from] HardwareError),
}

/// Differential drivetrain with heading-hold and pose tracking
pub struct Drivetrain {
    hardware: DriveHardware,
    mixer: DriveMixer,
    odometry: OdometryTracker,
    vision_correction: VisionCorrection,
    geometry: TargetGeometry,
    kinematics: DifferentialKinematics,
    // Last powers sent to the actuators
    output: MotorPowers,
    // Powers captured by pause(), restored by resume()
    paused: Option<MotorPowers>,
}

impl Drivetrain {
    /// Allocate hardware from `provider` and start at the field origin
    pub fn new(config: &DriveConfig, provider: &mut dyn HardwareProvider) -> Result<Self, DriveError> {
        config.validate()?;
        let hardware = DriveHardware::allocate(provider)?;
        Self::with_hardware(config, hardware, Pose2d::origin())
    }

    /// Build over already-allocated hardware with a known starting pose
    pub fn with_hardware(
        config: &DriveConfig,
        mut hardware: DriveHardware,
        initial_pose: Pose2d,
    ) -> Result<Self, DriveError> {
        config.validate()?;
        hardware.reset_encoders();
        hardware.set_powers(0.0, 0.0);

        info!(
            "Drivetrain ready: track width {:.3} m, deadband {:.2}, gear {}",
            config.track_width,
            config.deadband,
            hardware.gear_selector.gear()
        );

        Ok(Self {
            hardware,
            mixer: DriveMixer::new(config),
            odometry: OdometryTracker::new(initial_pose),
            vision_correction: VisionCorrection::new(
                config.odometry_correction_zone,
                config.vision_landmark,
            ),
            geometry: TargetGeometry::new(config.target),
            kinematics: DifferentialKinematics::new(config.track_width),
            output: MotorPowers::zero(),
            paused: None,
        })
    }

    /// Mix driver intent and send it to the motors
    ///
    /// While paused the mix still runs (so heading-hold keeps its state) but
    /// nothing is sent; the returned powers are what would have been sent.
    pub fn drive(&mut self, command: DriveCommand) -> MotorPowers {
        let gear = self.gear();
        let powers = self.mixer.mix(command, gear, self.yaw());
        self.set_power(powers);
        powers
    }

    /// Send raw powers to both sides, clamped to [-1, 1]
    pub fn set_power(&mut self, powers: MotorPowers) {
        let powers = MotorPowers::new(powers.left, powers.right);
        if self.paused.is_some() {
            return;
        }
        self.hardware.set_powers(powers.left, powers.right);
        self.output = powers;
    }

    /// Zero all actuators, remembering what they were commanded
    pub fn pause(&mut self) {
        if self.paused.is_some() {
            return;
        }
        debug!(
            "Pausing drive motors (left={:.3}, right={:.3})",
            self.output.left, self.output.right
        );
        self.paused = Some(self.output);
        self.hardware.set_powers(0.0, 0.0);
    }

    /// Reapply the powers captured by `pause`
    pub fn resume(&mut self) {
        if let Some(powers) = self.paused.take() {
            debug!(
                "Resuming drive motors (left={:.3}, right={:.3})",
                powers.left, powers.right
            );
            self.hardware.set_powers(powers.left, powers.right);
            self.output = powers;
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.is_some()
    }

    /// Stop all motors immediately and drop any paused powers
    pub fn stop(&mut self) {
        self.hardware.set_powers(0.0, 0.0);
        self.output = MotorPowers::zero();
        self.paused = None;
    }

    /// Once-per-cycle pose update
    ///
    /// Integrates odometry, then applies a vision fix when a landmark is
    /// sighted inside the correction zone while `auto_target_drive` is held.
    pub fn periodic(&mut self, auto_target_drive: bool) -> Pose2d {
        let heading = HeadingSample { yaw: self.hardware.gyro.yaw_degrees() };
        let wheels = WheelSample::new(self.left_distance(), self.right_distance());
        let pose = self.odometry.update(heading, wheels);

        let vision = &self.hardware.vision;
        let fix = vision.is_target_sighted().then(|| VisionFix {
            horizontal_angle: vision.horizontal_angle_degrees(),
            distance: vision.target_distance(),
            latency_ms: vision.latency_ms(),
        });

        match self.vision_correction.correct(fix, auto_target_drive, pose) {
            Some(corrected) => {
                self.reset_odometry(corrected);
                corrected
            }
            None => pose,
        }
    }

    /// Zero the encoders and replace the pose in one step
    pub fn reset_odometry(&mut self, pose: Pose2d) {
        self.hardware.reset_encoders();
        self.odometry.reset(pose);
    }

    pub fn pose(&self) -> Pose2d {
        self.odometry.pose()
    }

    pub fn distance_to_target(&self) -> f64 {
        self.geometry.distance_to_target(&self.odometry.pose())
    }

    /// Bearing to the target; falls back to the last finite value
    pub fn angle_to_target(&mut self) -> f64 {
        let pose = self.odometry.pose();
        self.geometry.angle_to_target(&pose)
    }

    pub fn heading_hold(&self) -> &HeadingHold {
        self.mixer.heading_hold()
    }

    /// Normalized gyro yaw in degrees
    pub fn yaw(&self) -> f64 {
        normalize_degrees(self.hardware.gyro.yaw_degrees())
    }

    pub fn gear(&self) -> Gear {
        self.hardware.gear_selector.gear()
    }

    pub fn left_distance(&self) -> f64 {
        self.hardware.left_encoder.distance()
    }

    pub fn right_distance(&self) -> f64 {
        self.hardware.right_encoder.distance()
    }

    /// Mean of both sides' travel since the last reset
    pub fn distance(&self) -> f64 {
        (self.left_distance() + self.right_distance()) / 2.0
    }

    pub fn wheel_speeds(&self) -> WheelSpeeds {
        WheelSpeeds::new(
            self.hardware.left_encoder.rate(),
            self.hardware.right_encoder.rate(),
        )
    }

    /// Measured body velocity from encoder rates
    pub fn chassis_speeds(&self) -> ChassisSpeeds {
        self.kinematics.to_chassis_speeds(self.wheel_speeds())
    }

    /// Last powers actually sent to the motors
    pub fn output(&self) -> MotorPowers {
        self.output
    }

    pub fn telemetry(&mut self) -> DriveTelemetry {
        let hold = self.mixer.heading_hold();
        let (enabled, setpoint, at_setpoint) =
            (hold.is_enabled(), hold.setpoint(), hold.at_setpoint());
        DriveTelemetry {
            pose: self.pose(),
            powers: self.output,
            gear: self.gear(),
            heading_hold_enabled: enabled,
            heading_setpoint: setpoint,
            heading_at_setpoint: at_setpoint,
            distance_to_target: self.distance_to_target(),
            angle_to_target: self.angle_to_target(),
            paused: self.is_paused(),
        }
    }
}

impl Drop for Drivetrain {
    fn drop(&mut self) {
        // Never leave the motors running when the subsystem goes away
        self.hardware.set_powers(0.0, 0.0);
        if self.output != MotorPowers::zero() {
            warn!("Drivetrain dropped while driving; motors stopped");
        }
    }
}
