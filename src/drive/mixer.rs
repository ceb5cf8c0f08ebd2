// Drive mixing: (speed, rotation, flags, gear) -> left/right power
//
// Two branches: below the deadband the robot turns in place, above it the
// turn authority scales with forward speed (curvature drive) unless the
// driver overrides shaping or heading-hold is steering.

use tracing::trace;

use super::heading_hold::HeadingHold;
use super::sensitivity::{GearProfile, shape};
use crate::config::{DriveConfig, SensitivityProfile};
use crate::messages::{DriveCommand, Gear, MotorPowers};

pub struct DriveMixer {
    deadband: f64,
    creep_factor: f64,
    turn_in_place_scale: f64,
    high_gear_speed_limit: f64,
    sensitivity: SensitivityProfile,
    heading_hold: HeadingHold,
}

impl DriveMixer {
    pub fn new(config: &DriveConfig) -> Self {
        Self {
            deadband: config.deadband,
            creep_factor: config.creep_factor,
            turn_in_place_scale: config.turn_in_place_scale,
            high_gear_speed_limit: config.high_gear_speed_limit,
            sensitivity: config.sensitivity,
            heading_hold: HeadingHold::new(&config.heading_hold),
        }
    }

    pub fn heading_hold(&self) -> &HeadingHold {
        &self.heading_hold
    }

    /// Mix one cycle's command into motor powers
    ///
    /// `heading` is the current yaw in degrees, used by heading-hold.
    /// Both outputs are always in [-1, 1].
    pub fn mix(&mut self, command: DriveCommand, gear: Gear, heading: f64) -> MotorPowers {
        let command = command.clamped();
        let profile = GearProfile::select(gear, &self.sensitivity, self.high_gear_speed_limit);
        let overridden = command.override_shaping;

        let mut speed = command.speed;
        let mut rotation = command.rotation;

        let hold = self.heading_hold.update(speed, rotation, heading);

        if let Some(limit) = profile.speed_limit {
            speed = speed.clamp(-limit, limit);
        }

        match hold {
            Some(correction) => rotation = correction,
            None if !overridden => rotation = shape(rotation, profile.rotation_sensitivity),
            None => {}
        }

        let (left, right) = if speed.abs() < self.deadband {
            // Turning in place
            if hold.is_none() {
                rotation *= if command.creep {
                    self.creep_factor
                } else {
                    self.turn_in_place_scale
                };
            }
            (rotation, -rotation)
        } else {
            // Sign-preserving shaping keeps fine control near zero with full authority at the end
            speed = shape(speed, profile.speed_sensitivity);
            if !overridden && hold.is_none() {
                rotation = shape(rotation, profile.turning_sensitivity);
            }

            let delta = if overridden || hold.is_some() {
                rotation
            } else {
                rotation * speed.abs()
            };

            if overridden {
                // Give up forward speed, never turn rate
                if speed + delta.abs() > 1.0 {
                    speed = 1.0 - delta.abs();
                }
                if speed - delta.abs() < -1.0 {
                    speed = -1.0 + delta.abs();
                }
            }
            (speed + delta, speed - delta)
        };

        let powers = MotorPowers::new(left, right);
        trace!(
            "mix: speed={:.3} rotation={:.3} gear={} hold={:?} -> left={:.3} right={:.3}",
            command.speed,
            command.rotation,
            gear,
            hold,
            powers.left,
            powers.right
        );
        powers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HeadingHoldConfig;

    const EPS: f64 = 1e-9;

    fn linear_config() -> DriveConfig {
        DriveConfig {
            deadband: 0.05,
            high_gear_speed_limit: 1.0,
            sensitivity: SensitivityProfile::linear(),
            ..DriveConfig::default()
        }
    }

    // Every constant distinct so a swapped lookup shows up
    fn shaped_config() -> DriveConfig {
        DriveConfig {
            deadband: 0.05,
            high_gear_speed_limit: 0.9,
            sensitivity: SensitivityProfile {
                rotation_sensitivity_high_gear: 0.9,
                rotation_sensitivity_low_gear: 0.5,
                turning_sensitivity_high_gear: 0.1,
                turning_sensitivity_low_gear: 0.3,
                speed_sensitivity: 0.6,
                rotation_sensitivity: 1.0,
            },
            ..DriveConfig::default()
        }
    }

    #[test]
    fn test_curvature_shapes_speed_and_rotation_twice() {
        let mut mixer = DriveMixer::new(&shaped_config());
        let out = mixer.mix(DriveCommand::new(0.5, 0.5), Gear::Low, 0.0);

        let speed = shape(0.5, 0.6);
        let delta = shape(shape(0.5, 0.5), 0.3) * speed;
        assert!((out.left - (speed + delta)).abs() < EPS);
        assert!((out.right - (speed - delta)).abs() < EPS);
    }

    #[test]
    fn test_gear_selects_shaping_constants() {
        let mut mixer = DriveMixer::new(&shaped_config());
        let low = mixer.mix(DriveCommand::new(0.5, 0.5), Gear::Low, 0.0);
        let high = mixer.mix(DriveCommand::new(0.5, 0.5), Gear::High, 0.0);

        let speed = shape(0.5, 0.6);
        let delta = shape(shape(0.5, 0.9), 0.1) * speed;
        assert!((high.left - (speed + delta)).abs() < EPS);
        assert!((high.right - (speed - delta)).abs() < EPS);
        assert!((high.left - low.left).abs() > 1e-3);

        // Unknown behaves like low gear
        let unknown = mixer.mix(DriveCommand::new(0.5, 0.5), Gear::Unknown, 0.0);
        assert_eq!(unknown, low);
    }

    #[test]
    fn test_override_skips_rotation_shaping() {
        let mut mixer = DriveMixer::new(&shaped_config());
        let cmd = DriveCommand {
            override_shaping: true,
            ..DriveCommand::new(0.5, 0.5)
        };
        let out = mixer.mix(cmd, Gear::Low, 0.0);
        let speed = shape(0.5, 0.6);
        assert!((out.left - (speed + 0.5)).abs() < EPS);
        assert!((out.right - (speed - 0.5)).abs() < EPS);

        // shaped speed plus the raw turn overflows, so speed gives way
        let cmd = DriveCommand {
            override_shaping: true,
            ..DriveCommand::new(0.9, 0.5)
        };
        assert!(shape(0.9, 0.6) + 0.5 > 1.0);
        let out = mixer.mix(cmd, Gear::Low, 0.0);
        assert!((out.left - 1.0).abs() < EPS);
        assert!(out.right.abs() < EPS);
    }

    #[test]
    fn test_turn_in_place_shapes_rotation_once() {
        let mut mixer = DriveMixer::new(&shaped_config());
        let out = mixer.mix(DriveCommand::new(0.0, 0.5), Gear::Low, 0.0);
        let expected = shape(0.5, 0.5) * 0.8;
        assert!((out.left - expected).abs() < EPS);
        assert!((out.right + expected).abs() < EPS);
    }

    #[test]
    fn test_held_heading_below_deadband_is_not_scaled() {
        let config = DriveConfig {
            heading_hold: HeadingHoldConfig {
                kp: 0.01,
                ki: 0.0,
                kd: 0.0,
                ..HeadingHoldConfig::default()
            },
            ..shaped_config()
        };
        let mut mixer = DriveMixer::new(&config);
        let out = mixer.mix(DriveCommand::new(0.02, 0.0), Gear::Low, 0.0);
        assert_eq!(out, MotorPowers::zero());
        assert!(mixer.heading_hold().is_enabled());

        // 5 degrees clockwise of the setpoint: -0.05, no 0.8, creep or sensitivity applied
        let cmd = DriveCommand {
            creep: true,
            ..DriveCommand::new(0.02, 0.0)
        };
        let out = mixer.mix(cmd, Gear::Low, -5.0);
        assert!((out.left + 0.05).abs() < EPS);
        assert!((out.right - 0.05).abs() < EPS);
    }

    #[test]
    fn test_turn_in_place_scales_rotation() {
        let mut mixer = DriveMixer::new(&linear_config());
        let out = mixer.mix(DriveCommand::new(0.0, 0.6), Gear::High, 0.0);
        assert!((out.left - 0.48).abs() < EPS);
        assert!((out.right + 0.48).abs() < EPS);
    }

    #[test]
    fn test_turn_in_place_creep() {
        let config = linear_config();
        let mut mixer = DriveMixer::new(&config);
        let cmd = DriveCommand {
            creep: true,
            ..DriveCommand::new(0.02, 0.8)
        };
        let out = mixer.mix(cmd, Gear::Low, 0.0);
        let expected = 0.8 * config.creep_factor;
        assert!((out.left - expected).abs() < EPS);
        assert!((out.right + expected).abs() < EPS);
    }

    #[test]
    fn test_curvature_scales_turn_by_speed() {
        let mut mixer = DriveMixer::new(&linear_config());
        let out = mixer.mix(DriveCommand::new(0.5, 0.2), Gear::Low, 0.0);
        assert!((out.left - 0.6).abs() < EPS);
        assert!((out.right - 0.4).abs() < EPS);
    }

    #[test]
    fn test_override_trades_speed_for_turn_rate() {
        let mut mixer = DriveMixer::new(&linear_config());
        let cmd = DriveCommand {
            override_shaping: true,
            ..DriveCommand::new(0.9, 0.3)
        };
        let out = mixer.mix(cmd, Gear::Low, 0.0);
        assert!((out.left - 1.0).abs() < EPS);
        assert!((out.right - 0.4).abs() < EPS);

        let cmd = DriveCommand {
            override_shaping: true,
            ..DriveCommand::new(-0.9, 0.3)
        };
        let out = mixer.mix(cmd, Gear::Low, 0.0);
        assert!((out.left + 0.4).abs() < EPS);
        assert!((out.right + 1.0).abs() < EPS);
    }

    #[test]
    fn test_high_gear_speed_limit() {
        let config = DriveConfig {
            high_gear_speed_limit: 0.7,
            ..linear_config()
        };
        let mut mixer = DriveMixer::new(&config);
        // rotation 0 engages heading hold with zero correction on the first cycle
        let out = mixer.mix(DriveCommand::new(1.0, 0.0), Gear::High, 0.0);
        assert!((out.left - 0.7).abs() < EPS);
        assert!((out.right - 0.7).abs() < EPS);

        let out = mixer.mix(DriveCommand::new(1.0, 0.0), Gear::Low, 0.0);
        assert!((out.left - 1.0).abs() < EPS);
    }

    #[test]
    fn test_heading_hold_steers_back() {
        let mut mixer = DriveMixer::new(&linear_config());
        mixer.mix(DriveCommand::new(0.5, 0.0), Gear::Low, 0.0);
        assert!(mixer.heading_hold().is_enabled());

        // Drifted clockwise: correction turns CCW, so the right side runs faster
        let out = mixer.mix(DriveCommand::new(0.5, 0.0), Gear::Low, -5.0);
        assert!(out.right > out.left);
        let delta = (out.left - out.right) / 2.0;
        assert!(delta.abs() <= 0.15 + EPS, "correction exceeded cap: {}", delta);
    }

    #[test]
    fn test_heading_hold_released_by_driver_turn() {
        let mut mixer = DriveMixer::new(&linear_config());
        mixer.mix(DriveCommand::new(0.5, 0.0), Gear::Low, 0.0);
        mixer.mix(DriveCommand::new(0.5, 0.2), Gear::Low, 0.0);
        assert!(!mixer.heading_hold().is_enabled());
    }

    #[test]
    fn test_outputs_always_in_range() {
        let mut mixer = DriveMixer::new(&DriveConfig::default());
        for gear in [Gear::High, Gear::Low, Gear::Unknown] {
            for s in -10..=10 {
                for r in -10..=10 {
                    for flags in 0..4 {
                        let cmd = DriveCommand {
                            speed: s as f64 / 10.0,
                            rotation: r as f64 / 10.0,
                            creep: flags & 1 != 0,
                            override_shaping: flags & 2 != 0,
                        };
                        let out = mixer.mix(cmd, gear, (s * r) as f64);
                        assert!((-1.0..=1.0).contains(&out.left), "{:?} -> {:?}", cmd, out);
                        assert!((-1.0..=1.0).contains(&out.right), "{:?} -> {:?}", cmd, out);
                    }
                }
            }
        }
    }

    #[test]
    fn test_out_of_range_inputs_are_clamped() {
        let mut mixer = DriveMixer::new(&linear_config());
        let out = mixer.mix(DriveCommand::new(5.0, -7.0), Gear::Low, 0.0);
        assert!((-1.0..=1.0).contains(&out.left));
        assert!((-1.0..=1.0).contains(&out.right));
        let out = mixer.mix(DriveCommand::new(f64::NAN, f64::NAN), Gear::Low, 0.0);
        assert!(out.left.is_finite() && out.right.is_finite());
    }
}
