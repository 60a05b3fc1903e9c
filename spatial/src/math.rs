//! Vectors and coordinate frames.
//!
//! Coordinates follow the game convention used throughout the engine: the
//! three components are the forward, right and up coordinates in turn.

use serde::{Deserialize, Serialize};
use stage_core::Error;

pub use glam::Vec3;

/// Axes shorter than this are treated as degenerate.
pub const MIN_AXIS_LENGTH: f32 = 1e-6;

/// Largest |a·b| accepted between two normalized frame axes.
pub const ORTHOGONALITY_TOLERANCE: f32 = 0.01;

/// Game forward axis, `Vec3::X`
pub const FORWARD: Vec3 = Vec3::X;
/// Game right axis, `Vec3::Y`
pub const RIGHT: Vec3 = Vec3::Y;
/// Game up axis, `Vec3::Z`
pub const UP: Vec3 = Vec3::Z;

/// Position plus an orthonormal forward/right/up frame.
///
/// A `Pose` returned by [`normalize_frame`] has unit, mutually orthogonal
/// axes. The fields are public, so code that stores a `Pose` from elsewhere
/// runs it through `normalize_frame` again.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub forward: Vec3,
    pub right: Vec3,
    pub up: Vec3,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            forward: FORWARD,
            right: RIGHT,
            up: UP,
        }
    }
}

/// Where a point sits relative to a listener, in meters and degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Direction {
    /// Straight-line distance in meters
    pub distance: f32,
    /// Horizontal angle, 0 straight ahead, positive to the right
    pub azimuth: f32,
    /// Vertical angle, positive above the listener's horizon
    pub elevation: f32,
    /// Lateral component of the unit direction, -1 (left) to 1 (right)
    pub pan: f32,
}

impl Pose {
    /// Express `point` (game units) in this pose's frame, scaled to meters.
    pub fn direction_to(&self, point: Vec3, distance_unit: f32) -> Direction {
        let offset = (point - self.position) * distance_unit;
        let forward = offset.dot(self.forward);
        let right = offset.dot(self.right);
        let up = offset.dot(self.up);

        let distance = offset.length();
        let horizontal = (forward * forward + right * right).sqrt();
        let pan = if distance > MIN_AXIS_LENGTH {
            (right / distance).clamp(-1.0, 1.0)
        } else {
            0.0
        };

        Direction {
            distance,
            azimuth: right.atan2(forward).to_degrees(),
            elevation: up.atan2(horizontal).to_degrees(),
            pan,
        }
    }
}

/// Position and facing of a remote user or media player.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RemoteVoicePosition {
    pub position: Vec3,
    pub forward: Vec3,
}

impl RemoteVoicePosition {
    pub fn new(position: Vec3, forward: Vec3) -> Self {
        Self { position, forward }
    }

    /// Check the position is finite and normalize the forward axis.
    pub fn validated(self) -> Result<Self, Error> {
        if !self.position.is_finite() {
            return Err(Error::InvalidFrame(format!(
                "position {:?} is not finite",
                self.position
            )));
        }
        Ok(Self {
            position: self.position,
            forward: normalize_axis("forward", self.forward)?,
        })
    }
}

/// Normalize a single axis, rejecting zero-length or non-finite vectors.
pub fn normalize_axis(name: &str, axis: Vec3) -> Result<Vec3, Error> {
    let len = axis.length();
    if !len.is_finite() || len < MIN_AXIS_LENGTH {
        return Err(Error::InvalidFrame(format!(
            "{} axis {:?} is degenerate",
            name, axis
        )));
    }
    // Divide rather than scale by the reciprocal so exact inputs stay exact
    Ok(axis / len)
}

/// Validate a frame and return it with unit-length axes.
pub fn normalize_frame(
    position: Vec3,
    forward: Vec3,
    right: Vec3,
    up: Vec3,
) -> Result<Pose, Error> {
    if !position.is_finite() {
        return Err(Error::InvalidFrame(format!(
            "position {:?} is not finite",
            position
        )));
    }

    let forward = normalize_axis("forward", forward)?;
    let right = normalize_axis("right", right)?;
    let up = normalize_axis("up", up)?;

    for (a_name, a, b_name, b) in [
        ("forward", forward, "right", right),
        ("forward", forward, "up", up),
        ("right", right, "up", up),
    ] {
        let dot = a.dot(b);
        if dot.abs() > ORTHOGONALITY_TOLERANCE {
            return Err(Error::InvalidFrame(format!(
                "{} and {} axes are not orthogonal (dot = {:.4})",
                a_name, b_name, dot
            )));
        }
    }

    Ok(Pose {
        position,
        forward,
        right,
        up,
    })
}
