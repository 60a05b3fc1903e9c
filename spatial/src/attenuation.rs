//! Distance to gain mapping.
//!
//! The coefficient is the exponent dial of a power law anchored at
//! [`REFERENCE_DISTANCE`]: `gain = (REF / d)^(2c)`. A coefficient of 0.5 is the
//! inverse-distance law of a point source (about -6 dB per doubling of
//! distance), 1.0 is inverse-square, and 0 disables falloff entirely.

use stage_core::Error;

/// Distance (meters) at and below which the gain is 1.
pub const REFERENCE_DISTANCE: f32 = 1.0;

/// Coefficient used for entities that never had one set.
pub const DEFAULT_ATTENUATION: f32 = 0.5;

/// Named bands of the attenuation coefficient
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttenuationMode {
    /// 0: no falloff at all
    Broadcast,
    /// (0, 0.5): sound carries farther than in the real world
    Weak,
    /// 0.5: real-world falloff
    Realistic,
    /// (0.5, 1]: sound fades quickly
    Strong,
}

impl AttenuationMode {
    pub fn of(coefficient: f32) -> Self {
        if coefficient <= 0.0 {
            AttenuationMode::Broadcast
        } else if coefficient < DEFAULT_ATTENUATION {
            AttenuationMode::Weak
        } else if coefficient == DEFAULT_ATTENUATION {
            AttenuationMode::Realistic
        } else {
            AttenuationMode::Strong
        }
    }
}

/// Reject coefficients outside [0, 1].
pub fn validate_coefficient(coefficient: f32) -> Result<f32, Error> {
    if coefficient.is_finite() && (0.0..=1.0).contains(&coefficient) {
        Ok(coefficient)
    } else {
        Err(Error::InvalidParameter(format!(
            "attenuation coefficient {} is outside [0, 1]",
            coefficient
        )))
    }
}

/// Gain in [0, 1] for a source `distance` meters away.
pub fn attenuate(distance: f32, coefficient: f32) -> f32 {
    if coefficient <= 0.0 {
        return 1.0;
    }
    let distance = distance.max(REFERENCE_DISTANCE);
    (REFERENCE_DISTANCE / distance)
        .powf(2.0 * coefficient)
        .clamp(0.0, 1.0)
}
