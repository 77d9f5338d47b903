//! Per-agent controller configuration.

use thiserror::Error;

use crate::collision::{
    BodyIndex, Vec3,
    settings::{
        DEFAULT_AIR_CONTROL, DEFAULT_CONTACT_TOLERANCE, DEFAULT_DAMPING, DEFAULT_MASS,
        DEFAULT_MAX_ITERATIONS, DEFAULT_MAX_SLOPE_DEG, DEFAULT_MAX_SPEED, DEFAULT_SKIN_WIDTH,
        DEFAULT_TAU, GRAVITY_MPS2,
    },
};
use crate::integrate::{EventRequest, StepInput};

/// Kinematic character controller settings.
///
/// Values are expressed in meters, seconds, kilograms and degrees (converted to radians at
/// runtime). Call [`ControllerSettings::validate`] when loading them from data.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ControllerSettings {
    /// World up direction. Must be unit length.
    pub up: Vec3,
    /// Gravity acceleration (m/s^2).
    pub gravity: Vec3,
    /// Steepest walkable slope (degrees).
    pub max_slope_deg: f32,
    /// Small gap preserved between the character and its surroundings (meters).
    pub skin_width: f32,
    /// Range of the support probe and penetration query (meters).
    pub contact_tolerance: f32,
    /// Collide-and-integrate iteration cap per step.
    pub max_iterations: u32,
    /// Speed clamp applied before solving (m/s).
    pub max_speed: f32,
    /// Character mass used for impulses on other bodies (kg).
    pub mass: f32,
    /// Penetration recovery factor for impulses, in [0, 1].
    pub tau: f32,
    /// Approach velocity damping for impulses, in [0, 1].
    pub damping: f32,
    /// Input velocity multiplier while not supported, in [0, 1].
    pub air_control: f32,
    /// Whether the character pushes dynamic bodies it touches.
    pub affects_other_bodies: bool,
    /// Which events the integrator records.
    pub events: EventRequest,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            up: Vec3::y(),
            gravity: Vec3::new(0.0, -GRAVITY_MPS2, 0.0),
            max_slope_deg: DEFAULT_MAX_SLOPE_DEG,
            skin_width: DEFAULT_SKIN_WIDTH,
            contact_tolerance: DEFAULT_CONTACT_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_speed: DEFAULT_MAX_SPEED,
            mass: DEFAULT_MASS,
            tau: DEFAULT_TAU,
            damping: DEFAULT_DAMPING,
            air_control: DEFAULT_AIR_CONTROL,
            affects_other_bodies: true,
            events: EventRequest::default(),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("`up` must be a unit vector, got length {0}")]
    UpNotNormalized(f32),

    #[error("`{0}` must be finite")]
    NonFinite(&'static str),

    #[error("skin width {skin_width} must be non-negative and below the contact tolerance {contact_tolerance}")]
    SkinWidth {
        skin_width: f32,
        contact_tolerance: f32,
    },

    #[error("max slope must be within (0, 90) degrees, got {0}")]
    MaxSlope(f32),

    #[error("max_iterations must be at least 1")]
    NoIterations,

    #[error("`{field}` = {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },
}

impl ControllerSettings {
    /// Cosine of the steepest walkable slope.
    #[inline]
    pub fn max_slope_cos(&self) -> f32 {
        self.max_slope_deg.to_radians().cos()
    }

    /// Bundle the per-step integrator input.
    pub fn step_input(&self, dt: f32, self_body: Option<BodyIndex>) -> StepInput {
        StepInput {
            dt,
            up: self.up,
            gravity: self.gravity,
            max_slope_cos: self.max_slope_cos(),
            skin_width: self.skin_width,
            contact_tolerance: self.contact_tolerance,
            max_iterations: self.max_iterations,
            max_speed: self.max_speed,
            tau: self.tau,
            damping: self.damping,
            self_body,
        }
    }

    /// Check every value is usable by the solver.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let finite = [
            ("up", self.up.iter().all(|v| v.is_finite())),
            ("gravity", self.gravity.iter().all(|v| v.is_finite())),
            ("max_speed", self.max_speed.is_finite()),
            ("mass", self.mass.is_finite()),
        ];
        if let Some(&(field, _)) = finite.iter().find(|(_, ok)| !*ok) {
            return Err(SettingsError::NonFinite(field));
        }

        let up_len = self.up.norm();
        if (up_len - 1.0).abs() > 1.0e-3 {
            return Err(SettingsError::UpNotNormalized(up_len));
        }

        if !(self.skin_width >= 0.0 && self.skin_width < self.contact_tolerance) {
            return Err(SettingsError::SkinWidth {
                skin_width: self.skin_width,
                contact_tolerance: self.contact_tolerance,
            });
        }

        if !(self.max_slope_deg > 0.0 && self.max_slope_deg < 90.0) {
            return Err(SettingsError::MaxSlope(self.max_slope_deg));
        }

        if self.max_iterations == 0 {
            return Err(SettingsError::NoIterations);
        }

        check_range("tau", self.tau, 0.0, 1.0)?;
        check_range("damping", self.damping, 0.0, 1.0)?;
        check_range("air_control", self.air_control, 0.0, 1.0)?;
        check_range("max_speed", self.max_speed, 0.0, f32::MAX)?;
        if self.mass <= 0.0 {
            return Err(SettingsError::OutOfRange {
                field: "mass",
                value: self.mass,
                min: f32::MIN_POSITIVE,
                max: f32::MAX,
            });
        }

        Ok(())
    }
}

fn check_range(field: &'static str, value: f32, min: f32, max: f32) -> Result<(), SettingsError> {
    if value >= min && value <= max {
        Ok(())
    } else {
        Err(SettingsError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(ControllerSettings::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_non_unit_up() {
        let settings = ControllerSettings {
            up: Vec3::new(0.0, 2.0, 0.0),
            ..Default::default()
        };
        assert_eq!(settings.validate(), Err(SettingsError::UpNotNormalized(2.0)));
    }

    #[test]
    fn rejects_skin_wider_than_tolerance() {
        let settings = ControllerSettings {
            skin_width: 0.2,
            contact_tolerance: 0.1,
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(SettingsError::SkinWidth { .. })));
    }

    #[test]
    fn rejects_out_of_range_tau_and_mass() {
        let tau = ControllerSettings {
            tau: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            tau.validate(),
            Err(SettingsError::OutOfRange { field: "tau", .. })
        ));

        let mass = ControllerSettings {
            mass: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            mass.validate(),
            Err(SettingsError::OutOfRange { field: "mass", .. })
        ));
    }

    #[test]
    fn rejects_nan_gravity_and_flat_slope() {
        let gravity = ControllerSettings {
            gravity: Vec3::new(0.0, f32::NAN, 0.0),
            ..Default::default()
        };
        assert_eq!(gravity.validate(), Err(SettingsError::NonFinite("gravity")));

        let slope = ControllerSettings {
            max_slope_deg: 90.0,
            ..Default::default()
        };
        assert_eq!(slope.validate(), Err(SettingsError::MaxSlope(90.0)));
    }

    #[test]
    fn slope_cosine_matches_degrees() {
        let settings = ControllerSettings {
            max_slope_deg: 60.0,
            ..Default::default()
        };
        assert!((settings.max_slope_cos() - 0.5).abs() < 1.0e-6);
    }
}
