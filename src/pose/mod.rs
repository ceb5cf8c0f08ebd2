// Pose estimation and target geometry
//
// Provides:
// - Differential odometry with a vision-fix override
// - Distance and bearing to the fixed field target

pub mod odometry;
pub mod target;

pub use odometry::{OdometryTracker, VisionCorrection, VisionFix};
pub use target::{TargetGeometry, distance_to_target};
