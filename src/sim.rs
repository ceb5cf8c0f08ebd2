// Simulated drive platform
//
// A first-order plant: each side's wheel speed is its master power times a
// free speed. Integrating the two speeds gives encoder distances, yaw and a
// true field pose, which the simulated camera uses to sight a landmark.

use std::cell::RefCell;
use std::rc::Rc;

use crate::drive::kinematics::{DifferentialKinematics, WheelSpeeds};
use crate::hardware::{
    Actuator, ActuatorSlot, DistanceEncoder, GearSelector, Gyroscope, HardwareError,
    HardwareProvider, SensorSlot, Side, VisionSensor,
};
use crate::messages::{Gear, Pose2d, TargetFix, normalize_degrees};

/// Wheel surface speed at full power (meters/second)
pub const FREE_SPEED: f64 = 4.0;

/// Half of the camera's horizontal field of view (degrees)
const CAMERA_HALF_FOV_DEG: f64 = 29.8;

/// Camera cannot resolve the landmark beyond this range (meters)
const CAMERA_MAX_RANGE: f64 = 8.0;

const CAMERA_LATENCY_MS: f64 = 11.0;

/// Shared plant state behind every simulated device
#[derive(Debug, Clone)]
pub struct SimState {
    pub powers: [f64; 4], // indexed like ActuatorSlot::ALL
    pub left_distance: f64,
    pub right_distance: f64,
    pub left_rate: f64,
    pub right_rate: f64,
    /// Continuous (unwrapped) yaw, CCW positive
    pub yaw: f64,
    pub true_pose: Pose2d,
    pub gear: Gear,
    pub track_width: f64,
    pub landmark: TargetFix,
    /// Forces the camera to report nothing
    pub camera_blind: bool,
}

impl SimState {
    pub fn power(&self, slot: ActuatorSlot) -> f64 {
        self.powers[slot_index(slot)]
    }

    /// Advance the plant by `dt` seconds using the master powers
    pub fn step(&mut self, dt: f64) {
        self.left_rate = self.power(ActuatorSlot::LeftMaster) * FREE_SPEED;
        self.right_rate = self.power(ActuatorSlot::RightMaster) * FREE_SPEED;

        self.left_distance += self.left_rate * dt;
        self.right_distance += self.right_rate * dt;

        let chassis = DifferentialKinematics::new(self.track_width)
            .to_chassis_speeds(WheelSpeeds::new(self.left_rate, self.right_rate));
        self.yaw += (chassis.omega * dt).to_degrees();

        let d = chassis.vx * dt;
        let heading = self.yaw.to_radians();
        self.true_pose = Pose2d::new(
            self.true_pose.x + d * heading.cos(),
            self.true_pose.y + d * heading.sin(),
            self.yaw,
        );
    }

    /// (distance, bearing relative to heading) from the true pose to the landmark
    fn landmark_observation(&self) -> (f64, f64) {
        let dx = self.landmark.x - self.true_pose.x;
        let dy = self.landmark.y - self.true_pose.y;
        let distance = dx.hypot(dy);
        let bearing = normalize_degrees(dy.atan2(dx).to_degrees() - self.true_pose.heading);
        (distance, bearing)
    }
}

fn slot_index(slot: ActuatorSlot) -> usize {
    match slot {
        ActuatorSlot::LeftMaster => 0,
        ActuatorSlot::LeftFollower => 1,
        ActuatorSlot::RightMaster => 2,
        ActuatorSlot::RightFollower => 3,
    }
}

/// Hands out simulated devices that all share one plant
pub struct SimPlatform {
    state: Rc<RefCell<SimState>>,
    fail_actuator: Option<ActuatorSlot>,
    fail_sensor: Option<SensorSlot>,
}

impl SimPlatform {
    pub fn new(gear: Gear, track_width: f64, landmark: TargetFix) -> Self {
        let state = SimState {
            powers: [0.0; 4],
            left_distance: 0.0,
            right_distance: 0.0,
            left_rate: 0.0,
            right_rate: 0.0,
            yaw: 0.0,
            true_pose: Pose2d::origin(),
            gear,
            track_width,
            landmark,
            camera_blind: false,
        };
        Self {
            state: Rc::new(RefCell::new(state)),
            fail_actuator: None,
            fail_sensor: None,
        }
    }

    /// Make allocation of `slot` fail, to exercise construction errors
    pub fn failing_actuator(mut self, slot: ActuatorSlot) -> Self {
        self.fail_actuator = Some(slot);
        self
    }

    pub fn failing_sensor(mut self, slot: SensorSlot) -> Self {
        self.fail_sensor = Some(slot);
        self
    }

    pub fn state(&self) -> Rc<RefCell<SimState>> {
        Rc::clone(&self.state)
    }

    fn check_sensor(&self, slot: SensorSlot) -> Result<(), HardwareError> {
        if self.fail_sensor == Some(slot) {
            return Err(HardwareError::Sensor {
                slot,
                reason: "device not responding".to_string(),
            });
        }
        Ok(())
    }
}

impl HardwareProvider for SimPlatform {
    fn actuator(&mut self, slot: ActuatorSlot) -> Result<Box<dyn Actuator>, HardwareError> {
        if self.fail_actuator == Some(slot) {
            return Err(HardwareError::Actuator {
                slot,
                reason: "no response on bus".to_string(),
            });
        }
        Ok(Box::new(SimActuator {
            state: self.state(),
            index: slot_index(slot),
        }))
    }

    fn encoder(&mut self, side: Side) -> Result<Box<dyn DistanceEncoder>, HardwareError> {
        let slot = match side {
            Side::Left => SensorSlot::LeftEncoder,
            Side::Right => SensorSlot::RightEncoder,
        };
        self.check_sensor(slot)?;
        Ok(Box::new(SimEncoder {
            state: self.state(),
            side,
            offset: 0.0,
        }))
    }

    fn gyro(&mut self) -> Result<Box<dyn Gyroscope>, HardwareError> {
        self.check_sensor(SensorSlot::Gyro)?;
        Ok(Box::new(SimGyro { state: self.state() }))
    }

    fn vision(&mut self) -> Result<Box<dyn VisionSensor>, HardwareError> {
        self.check_sensor(SensorSlot::Vision)?;
        Ok(Box::new(SimCamera { state: self.state() }))
    }

    fn gear_selector(&mut self) -> Result<Box<dyn GearSelector>, HardwareError> {
        self.check_sensor(SensorSlot::GearSelector)?;
        Ok(Box::new(SimGearSelector { state: self.state() }))
    }
}

struct SimActuator {
    state: Rc<RefCell<SimState>>,
    index: usize,
}

impl Actuator for SimActuator {
    fn set_power(&mut self, power: f64) {
        self.state.borrow_mut().powers[self.index] = power;
    }
}

struct SimEncoder {
    state: Rc<RefCell<SimState>>,
    side: Side,
    // Plant distance at the last reset
    offset: f64,
}

impl SimEncoder {
    fn raw(&self) -> f64 {
        let state = self.state.borrow();
        match self.side {
            Side::Left => state.left_distance,
            Side::Right => state.right_distance,
        }
    }
}

impl DistanceEncoder for SimEncoder {
    fn distance(&self) -> f64 {
        self.raw() - self.offset
    }

    fn rate(&self) -> f64 {
        let state = self.state.borrow();
        match self.side {
            Side::Left => state.left_rate,
            Side::Right => state.right_rate,
        }
    }

    fn reset(&mut self) {
        self.offset = self.raw();
    }
}

struct SimGyro {
    state: Rc<RefCell<SimState>>,
}

impl Gyroscope for SimGyro {
    fn yaw_degrees(&self) -> f64 {
        self.state.borrow().yaw
    }
}

struct SimCamera {
    state: Rc<RefCell<SimState>>,
}

impl VisionSensor for SimCamera {
    fn is_target_sighted(&self) -> bool {
        let state = self.state.borrow();
        if state.camera_blind {
            return false;
        }
        let (distance, bearing) = state.landmark_observation();
        distance < CAMERA_MAX_RANGE && bearing.abs() < CAMERA_HALF_FOV_DEG
    }

    fn horizontal_angle_degrees(&self) -> f64 {
        // positive to the right, like most targeting cameras
        -self.state.borrow().landmark_observation().1
    }

    fn target_distance(&self) -> f64 {
        self.state.borrow().landmark_observation().0
    }

    fn latency_ms(&self) -> f64 {
        CAMERA_LATENCY_MS
    }
}

struct SimGearSelector {
    state: Rc<RefCell<SimState>>,
}

impl GearSelector for SimGearSelector {
    fn gear(&self) -> Gear {
        self.state.borrow().gear
    }
}
