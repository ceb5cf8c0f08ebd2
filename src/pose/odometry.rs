// Dead-reckoning pose estimate with an opportunistic vision override
//
// Each cycle the average wheel displacement since the previous cycle is
// projected along the gyro heading. The gyro is ground truth for heading;
// it is never integrated from the wheel difference.

use tracing::{debug, info, trace};

use crate::messages::{HeadingSample, Pose2d, TargetFix, WheelSample, normalize_degrees};

/// Integrates wheel and heading samples into a field pose
#[derive(Debug, Clone)]
pub struct OdometryTracker {
    pose: Pose2d,
    // Cumulative distances seen by the previous update
    baseline: WheelSample,
}

impl OdometryTracker {
    /// Start at `initial` with a zero distance baseline
    pub fn new(initial: Pose2d) -> Self {
        Self {
            pose: initial,
            baseline: WheelSample::default(),
        }
    }

    pub fn pose(&self) -> Pose2d {
        self.pose
    }

    /// Advance the pose by one control cycle
    ///
    /// `wheels` carries cumulative distances since the last encoder reset.
    pub fn update(&mut self, heading: HeadingSample, wheels: WheelSample) -> Pose2d {
        let d_left = wheels.left_distance - self.baseline.left_distance;
        let d_right = wheels.right_distance - self.baseline.right_distance;
        let d = (d_left + d_right) / 2.0;

        let heading_deg = normalize_degrees(heading.yaw);
        let theta = heading_deg.to_radians();

        // Build the whole pose first so readers never see a half update
        let next = Pose2d::new(
            self.pose.x + d * theta.cos(),
            self.pose.y + d * theta.sin(),
            heading_deg,
        );
        self.pose = next;
        self.baseline = wheels;

        trace!(
            "odometry: d={:.4} -> x={:.3} y={:.3} heading={:.2}",
            d, next.x, next.y, next.heading
        );
        next
    }

    /// Replace the pose and zero the distance baseline
    ///
    /// Call this whenever the encoders are zeroed, otherwise the next update
    /// sees the whole pre-reset distance as one step. The heading is
    /// normalized, since `Pose2d` can be built without `Pose2d::new`.
    pub fn reset(&mut self, pose: Pose2d) {
        let pose = Pose2d::new(pose.x, pose.y, pose.heading);
        info!(
            "Odometry reset to x={:.3} y={:.3} heading={:.2}",
            pose.x, pose.y, pose.heading
        );
        self.pose = pose;
        self.baseline = WheelSample::default();
    }
}

/// One camera observation of the field landmark
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisionFix {
    pub horizontal_angle: f64, // degrees
    pub distance: f64,         // meters
    pub latency_ms: f64,
}

/// Decides when a vision fix overrides odometry and computes the replacement pose
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisionCorrection {
    /// Fixes must be closer than this (meters)
    zone: f64,
    /// Field position of the sighted landmark
    landmark: TargetFix,
}

impl VisionCorrection {
    pub fn new(zone: f64, landmark: TargetFix) -> Self {
        Self { zone, landmark }
    }

    /// Corrected pose, if this fix qualifies
    ///
    /// Qualifies when a target is sighted, the operator holds auto-target-drive
    /// and the fix is inside the correction zone. The result is a hard
    /// replacement for `prior`, not a blend.
    pub fn correct(&self, fix: Option<VisionFix>, auto_target_drive: bool, prior: Pose2d) -> Option<Pose2d> {
        let fix = fix?;
        let in_zone = fix.distance < self.zone; // false for NaN
        if !auto_target_drive || !in_zone {
            return None;
        }
        let corrected = self.triangulate(&fix, prior);
        debug!(
            "Vision fix angle={:.2} distance={:.3} latency={:.0}ms -> x={:.3} y={:.3}",
            fix.horizontal_angle, fix.distance, fix.latency_ms, corrected.x, corrected.y
        );
        Some(corrected)
    }

    /// Position from range and bearing to the landmark
    ///
    /// The landmark sits on the far x side of the robot; the lateral offset
    /// goes to whichever side of the landmark the prior estimate was on.
    pub fn triangulate(&self, fix: &VisionFix, prior: Pose2d) -> Pose2d {
        let alpha = (90.0 - fix.horizontal_angle.abs()).to_radians();
        let along = alpha.sin() * fix.distance;
        let lateral = alpha.cos() * fix.distance;

        let x = self.landmark.x - along;
        let y = if prior.y < self.landmark.y {
            self.landmark.y - lateral
        } else if prior.y > self.landmark.y {
            self.landmark.y + lateral
        } else {
            self.landmark.y
        };
        Pose2d::new(x, y, prior.heading)
    }
}
