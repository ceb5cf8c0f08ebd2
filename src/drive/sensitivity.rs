// Joystick sensitivity shaping and per-gear constants

use crate::config::SensitivityProfile;
use crate::messages::Gear;

/// Blend of linear and cubic response
///
/// `y = sign(x) * ((1 - k)|x| + k|x|^3)`. Odd, monotonic, fixed at -1, 0 and 1
/// for every `k` in [0, 1]; `k = 0` is the identity. Inputs outside [-1, 1] are
/// clamped first and NaN maps to 0.
pub fn shape(x: f64, k: f64) -> f64 {
    if x.is_nan() {
        return 0.0;
    }
    let x = x.clamp(-1.0, 1.0);
    let k = if k.is_nan() { 0.0 } else { k.clamp(0.0, 1.0) };
    let magnitude = x.abs();
    if magnitude == 1.0 {
        return x; // exact full scale, whatever the rounding of (1 - k) + k
    }
    let y = (1.0 - k) * magnitude + k * magnitude.powi(3);
    y.copysign(x)
}

/// Sensitivity and speed constants for the current gear
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GearProfile {
    /// Applied to rotation before choosing a branch
    pub rotation_sensitivity: f64,
    /// Applied again to rotation while curvature driving
    pub turning_sensitivity: f64,
    pub speed_sensitivity: f64,
    /// Forward speed cap, only set in high gear
    pub speed_limit: Option<f64>,
}

impl GearProfile {
    /// Pick constants for `gear`; an unknown gear uses the low-gear set
    pub fn select(gear: Gear, sensitivity: &SensitivityProfile, high_gear_speed_limit: f64) -> Self {
        match gear {
            Gear::High => Self {
                rotation_sensitivity: sensitivity.rotation_sensitivity_high_gear,
                turning_sensitivity: sensitivity.turning_sensitivity_high_gear,
                speed_sensitivity: sensitivity.speed_sensitivity,
                speed_limit: Some(high_gear_speed_limit),
            },
            Gear::Low | Gear::Unknown => Self {
                rotation_sensitivity: sensitivity.rotation_sensitivity_low_gear,
                turning_sensitivity: sensitivity.turning_sensitivity_low_gear,
                speed_sensitivity: sensitivity.speed_sensitivity,
                speed_limit: None,
            },
        }
    }
}
