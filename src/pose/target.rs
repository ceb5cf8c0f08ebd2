// Distance and bearing from the current pose to the fixed field target

use crate::messages::{Pose2d, TargetFix};

/// Straight-line distance from the pose to the target (meters)
pub fn distance_to_target(pose: &Pose2d, target: &TargetFix) -> f64 {
    (target.x - pose.x).hypot(target.y - pose.y)
}

/// Target bearing with a stale-value fallback
///
/// The bearing is built from `asin(dx / distance)`, which has no answer when
/// the argument leaves [-1, 1] (rounding, zero distance) and is ambiguous when
/// the target is level with the robot (`dy == 0`). In all of those cases the
/// last finite bearing is returned instead.
#[derive(Debug, Clone)]
pub struct TargetGeometry {
    target: TargetFix,
    last_valid_bearing: f64,
}

impl TargetGeometry {
    pub fn new(target: TargetFix) -> Self {
        Self {
            target,
            last_valid_bearing: 0.0,
        }
    }

    pub fn target(&self) -> TargetFix {
        self.target
    }

    pub fn distance_to_target(&self, pose: &Pose2d) -> f64 {
        distance_to_target(pose, &self.target)
    }

    /// Field-relative bearing to the target in degrees
    pub fn angle_to_target(&mut self, pose: &Pose2d) -> f64 {
        let dx = self.target.x - pose.x;
        let dy = self.target.y - pose.y;
        let distance = self.distance_to_target(pose);
        let offset = (dx / distance).asin().to_degrees();

        let angle = if dy > 0.0 {
            90.0 + offset + pose.heading
        } else if dy < 0.0 {
            -(offset + 90.0) + pose.heading
        } else {
            f64::NAN
        };

        if angle.is_finite() {
            self.last_valid_bearing = angle;
            angle
        } else {
            self.last_valid_bearing
        }
    }

    pub fn last_valid_bearing(&self) -> f64 {
        self.last_valid_bearing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_distance() {
        let d = distance_to_target(&Pose2d::new(1.0, 1.0, 0.0), &TargetFix::new(4.0, 5.0));
        assert!((d - 5.0).abs() < EPS);
    }

    #[test]
    fn test_distance_decreases_toward_target() {
        let target = TargetFix::new(8.0, 6.0);
        let mut prev = f64::INFINITY;
        for i in 0..10 {
            let t = i as f64 / 10.0;
            let pose = Pose2d::new(8.0 * t, 6.0 * t, 0.0);
            let d = distance_to_target(&pose, &target);
            assert!(d < prev, "distance did not decrease at t={}", t);
            prev = d;
        }
    }

    #[test]
    fn test_angle_target_ahead_in_y() {
        // dy > 0, dx = 0: 90 + asin(0) + heading
        let mut geo = TargetGeometry::new(TargetFix::new(0.0, 5.0));
        let angle = geo.angle_to_target(&Pose2d::new(0.0, 0.0, 10.0));
        assert!((angle - 100.0).abs() < EPS);
        assert_eq!(geo.last_valid_bearing(), angle);
    }

    #[test]
    fn test_angle_target_behind_in_y() {
        // dy < 0, dx = dy: -(asin(1/sqrt 2) + 90) + heading = -135
        let mut geo = TargetGeometry::new(TargetFix::new(3.0, -3.0));
        let angle = geo.angle_to_target(&Pose2d::origin());
        assert!((angle + 135.0).abs() < 1e-6);
    }

    #[test]
    fn test_level_target_returns_cached() {
        let mut geo = TargetGeometry::new(TargetFix::new(4.0, 4.0));
        let first = geo.angle_to_target(&Pose2d::new(4.0, 0.0, 0.0));
        assert!((first - 90.0).abs() < EPS);

        // dy == 0 is not an error but still falls back
        let level = geo.angle_to_target(&Pose2d::new(0.0, 4.0, 0.0));
        assert_eq!(level, first);
    }

    #[test]
    fn test_zero_distance_returns_cached() {
        let mut geo = TargetGeometry::new(TargetFix::new(2.0, 2.0));
        let first = geo.angle_to_target(&Pose2d::new(2.0, 1.0, 5.0));
        let on_target = geo.angle_to_target(&Pose2d::new(2.0, 2.0, 5.0));
        assert!(!on_target.is_nan());
        assert_eq!(on_target, first);
    }

    #[test]
    fn test_initial_fallback_is_zero() {
        let mut geo = TargetGeometry::new(TargetFix::new(1.0, 0.0));
        assert_eq!(geo.angle_to_target(&Pose2d::origin()), 0.0);
    }
}
