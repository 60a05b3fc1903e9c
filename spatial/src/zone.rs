//! Sound insulation zones.

use crate::attenuation::{validate_coefficient, DEFAULT_ATTENUATION};
use crate::math::{normalize_frame, Vec3, FORWARD, RIGHT, UP};
use log::debug;
use serde::{Deserialize, Serialize};
use stage_core::Error;

/// Slack on box bounds so points on a face count as inside.
const CONTAINMENT_EPSILON: f32 = 1e-5;

fn default_audio_attenuation() -> f32 {
    DEFAULT_ATTENUATION
}

/// An oriented box that partitions sound between its inside and outside.
///
/// Lengths are full side lengths in game units, centred on `center`. Boxes
/// sharing an `id` belong to the same insulation area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: i32,
    pub center: Vec3,
    pub forward: Vec3,
    pub right: Vec3,
    pub up: Vec3,
    pub forward_length: f32,
    pub right_length: f32,
    pub up_length: f32,
    /// Coefficient applied between one party inside and one outside
    #[serde(default = "default_audio_attenuation")]
    pub audio_attenuation: f32,
}

impl Zone {
    /// Axis-aligned box helper, mostly for configuration and tests.
    pub fn aligned(id: i32, center: Vec3, size: Vec3, audio_attenuation: f32) -> Self {
        Self {
            id,
            center,
            forward: FORWARD,
            right: RIGHT,
            up: UP,
            forward_length: size.x,
            right_length: size.y,
            up_length: size.z,
            audio_attenuation,
        }
    }

    /// Point-in-box test. Assumes normalized axes, which [`ZoneSet::new`] guarantees.
    pub fn contains(&self, point: Vec3) -> bool {
        let offset = point - self.center;
        offset.dot(self.forward).abs() <= self.forward_length / 2.0 + CONTAINMENT_EPSILON
            && offset.dot(self.right).abs() <= self.right_length / 2.0 + CONTAINMENT_EPSILON
            && offset.dot(self.up).abs() <= self.up_length / 2.0 + CONTAINMENT_EPSILON
    }

    fn validated(&self) -> Result<Zone, Error> {
        let frame = normalize_frame(self.center, self.forward, self.right, self.up)?;
        for (name, length) in [
            ("forward_length", self.forward_length),
            ("right_length", self.right_length),
            ("up_length", self.up_length),
        ] {
            if !length.is_finite() || length <= 0.0 {
                return Err(Error::InvalidParameter(format!(
                    "zone {}: {} must be > 0, got {}",
                    self.id, name, length
                )));
            }
        }
        validate_coefficient(self.audio_attenuation)?;

        Ok(Zone {
            forward: frame.forward,
            right: frame.right,
            up: frame.up,
            ..self.clone()
        })
    }
}

/// The active set of zones. Replaced as a whole, never edited in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZoneSet {
    zones: Vec<Zone>,
}

impl ZoneSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Validate every zone; nothing is accepted if any zone is invalid.
    pub fn new(zones: &[Zone]) -> Result<Self, Error> {
        let zones = zones
            .iter()
            .map(Zone::validated)
            .collect::<Result<Vec<_>, _>>()?;
        debug!("Validated {} insulation zones", zones.len());
        Ok(Self { zones })
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Zone> {
        self.zones.iter()
    }

    /// First zone, by input order, whose box contains `point`.
    pub fn locate(&self, point: Vec3) -> Option<&Zone> {
        self.zones.iter().find(|zone| zone.contains(point))
    }

    /// Id of the zone containing `point`, if any.
    pub fn classify(&self, point: Vec3) -> Option<i32> {
        self.locate(point).map(|zone| zone.id)
    }
}

/// Outcome of resolving the coefficient for one listener/source pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution {
    /// Attenuate with this coefficient
    Coefficient(f32),
    /// Separated by two insulation areas; inaudible
    Occluded,
}

/// Pick the coefficient governing a pair from their zone membership.
pub fn resolve_coefficient(
    listener_zone: Option<&Zone>,
    entity_zone: Option<&Zone>,
    entity_attenuation: f32,
    entity_force_set: bool,
) -> Resolution {
    if entity_force_set {
        return Resolution::Coefficient(entity_attenuation);
    }

    match (listener_zone, entity_zone) {
        (Some(listener), Some(entity)) if listener.id != entity.id => Resolution::Occluded,
        (Some(zone), None) | (None, Some(zone)) => Resolution::Coefficient(zone.audio_attenuation),
        _ => Resolution::Coefficient(entity_attenuation),
    }
}
