// Drive control for a differential (tank) drivetrain
//
// Provides:
// - Sensitivity shaping and per-gear constants
// - Heading-hold PID for driving straight
// - Drive mixing into left/right power
// - Differential kinematics
// - The Drivetrain subsystem that owns the hardware

mod driver;
pub mod heading_hold;
pub mod kinematics;
pub mod mixer;
pub mod sensitivity;

pub use driver::{DriveError, Drivetrain};
pub use heading_hold::{AnglePid, HeadingHold, HeadingHoldState};
pub use kinematics::{ChassisSpeeds, DifferentialKinematics, WheelSpeeds};
pub use mixer::DriveMixer;
pub use sensitivity::{GearProfile, shape};
