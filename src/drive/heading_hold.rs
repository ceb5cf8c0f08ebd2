// Heading-hold: lock the heading while the driver asks to go straight
//
// The controller owns a small PID with continuous (wrapping) input over
// [-180, 180) degrees. Its output is capped before it is handed to the mixer.

use tracing::debug;

use crate::config::HeadingHoldConfig;
use crate::messages::normalize_degrees;

/// Fixed-period PID controller on a wrapping angle in degrees
#[derive(Debug, Clone)]
pub struct AnglePid {
    kp: f64,
    ki: f64,
    kd: f64,
    period: f64,
    setpoint: f64,
    integral: f64,
    last_error: f64,
}

impl AnglePid {
    pub fn new(kp: f64, ki: f64, kd: f64, period: f64) -> Self {
        Self {
            kp,
            ki,
            kd,
            period,
            setpoint: 0.0,
            integral: 0.0,
            last_error: 0.0,
        }
    }

    pub fn set_setpoint(&mut self, setpoint: f64) {
        self.setpoint = normalize_degrees(setpoint);
    }

    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    /// Clear the integral and derivative history
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.last_error = 0.0;
    }

    /// Shortest signed angle from `measurement` to the setpoint, in [-180, 180)
    pub fn error_to(&self, measurement: f64) -> f64 {
        let error = normalize_degrees(self.setpoint - measurement);
        if error == 180.0 { -180.0 } else { error }
    }

    /// One control step
    pub fn calculate(&mut self, measurement: f64) -> f64 {
        let error = self.error_to(measurement);
        self.integral += error * self.period;
        let derivative = (error - self.last_error) / self.period;
        self.last_error = error;
        self.kp * error + self.ki * self.integral + self.kd * derivative
    }

    /// Error seen by the last `calculate` call
    pub fn last_error(&self) -> f64 {
        self.last_error
    }
}

/// Explicit state of the heading-hold controller
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadingHoldState {
    pub enabled: bool,
    pub setpoint: f64,
}

/// Closed-loop heading lock feeding a corrective rotation to the mixer
///
/// Headings are CCW-positive while a positive rotation command turns the robot
/// clockwise (left side forward), so the PID output is negated.
///
/// Transitions, evaluated once per cycle in this order:
/// 1. disabled and `rotation == 0`: enable, capture the heading as setpoint,
///    reset the PID. No correction is computed on this edge (output 0).
/// 2. `rotation != 0` while enabled, or `speed == 0`: disable.
/// 3. otherwise, if enabled: output `clamp(-pid(heading), -limit, limit)`.
#[derive(Debug, Clone)]
pub struct HeadingHold {
    pid: AnglePid,
    state: HeadingHoldState,
    output_limit: f64,
    tolerance: f64,
}

impl HeadingHold {
    pub fn new(config: &HeadingHoldConfig) -> Self {
        Self {
            pid: AnglePid::new(config.kp, config.ki, config.kd, config.period_seconds),
            state: HeadingHoldState {
                enabled: false,
                setpoint: 0.0,
            },
            output_limit: config.output_limit.abs(),
            tolerance: config.tolerance_degrees,
        }
    }

    /// Run the state machine for one cycle
    ///
    /// Returns the corrective rotation while enabled, `None` while disabled.
    pub fn update(&mut self, speed: f64, rotation: f64, heading: f64) -> Option<f64> {
        if rotation == 0.0 && !self.state.enabled {
            // just started driving straight
            self.state.enabled = true;
            self.state.setpoint = normalize_degrees(heading);
            self.pid.set_setpoint(heading);
            self.pid.reset();
            debug!("Heading hold enabled at {:.2} deg", self.state.setpoint);
            Some(0.0)
        } else if (rotation != 0.0 && self.state.enabled) || speed == 0.0 {
            if self.state.enabled {
                debug!("Heading hold released");
            }
            self.state.enabled = false;
            None
        } else if self.state.enabled {
            let output = -self.pid.calculate(heading);
            Some(output.clamp(-self.output_limit, self.output_limit))
        } else {
            None
        }
    }

    pub fn state(&self) -> HeadingHoldState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.state.enabled
    }

    pub fn setpoint(&self) -> f64 {
        self.state.setpoint
    }

    /// Whether the last correction step was within tolerance (telemetry only)
    pub fn at_setpoint(&self) -> bool {
        self.state.enabled && self.pid.last_error().abs() <= self.tolerance
    }
}
