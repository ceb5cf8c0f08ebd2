// Differential drive kinematics
// Converts body-frame velocities (forward, yaw rate) to left/right wheel speeds and back.

/// Left/right wheel surface speeds (meters/second)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WheelSpeeds {
    pub left: f64,
    pub right: f64,
}

impl WheelSpeeds {
    pub fn new(left: f64, right: f64) -> Self {
        Self { left, right }
    }

    pub fn zero() -> Self {
        Self::default()
    }
}

/// Body-frame velocity
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChassisSpeeds {
    /// Forward velocity in m/s (positive = forward)
    pub vx: f64,
    /// Yaw rate in rad/s (positive = counter-clockwise)
    pub omega: f64,
}

impl ChassisSpeeds {
    pub fn new(vx: f64, omega: f64) -> Self {
        Self { vx, omega }
    }
}

/// Kinematic model of a two-sided drivetrain
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifferentialKinematics {
    track_width: f64,
}

impl DifferentialKinematics {
    /// `track_width` is the distance between wheel contact patches in meters
    pub fn new(track_width: f64) -> Self {
        Self { track_width }
    }

    pub fn track_width(&self) -> f64 {
        self.track_width
    }

    /// Convert body velocity to wheel speeds
    ///
    /// Each side runs at `vx -/+ omega * track_width / 2`.
    pub fn to_wheel_speeds(&self, chassis: ChassisSpeeds) -> WheelSpeeds {
        let half_turn = chassis.omega * self.track_width / 2.0;
        WheelSpeeds::new(chassis.vx - half_turn, chassis.vx + half_turn)
    }

    /// Convert measured wheel speeds to body velocity
    pub fn to_chassis_speeds(&self, wheels: WheelSpeeds) -> ChassisSpeeds {
        ChassisSpeeds::new(
            (wheels.left + wheels.right) / 2.0,
            (wheels.right - wheels.left) / self.track_width,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_zero_velocity() {
        let kin = DifferentialKinematics::new(0.6);
        let wheels = kin.to_wheel_speeds(ChassisSpeeds::default());
        assert_eq!(wheels, WheelSpeeds::zero());
    }

    #[test]
    fn test_forward_motion() {
        let kin = DifferentialKinematics::new(0.6);
        let wheels = kin.to_wheel_speeds(ChassisSpeeds::new(1.5, 0.0));
        assert!((wheels.left - 1.5).abs() < EPS);
        assert!((wheels.right - 1.5).abs() < EPS);
    }

    #[test]
    fn test_rotation_only() {
        // Pure CCW rotation: right forward, left backward, equal magnitude
        let kin = DifferentialKinematics::new(0.6);
        let wheels = kin.to_wheel_speeds(ChassisSpeeds::new(0.0, 2.0));
        println!("Rotation: left={}, right={}", wheels.left, wheels.right);
        assert!((wheels.left + 0.6).abs() < EPS);
        assert!((wheels.right - 0.6).abs() < EPS);
    }

    #[test]
    fn test_inverse_recovers_chassis_speeds() {
        let kin = DifferentialKinematics::new(0.55);
        let chassis = ChassisSpeeds::new(0.8, -1.3);
        let back = kin.to_chassis_speeds(kin.to_wheel_speeds(chassis));
        assert!((back.vx - chassis.vx).abs() < EPS);
        assert!((back.omega - chassis.omega).abs() < EPS);
    }
}
