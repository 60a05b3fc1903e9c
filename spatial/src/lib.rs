//! Spatial math for the soundstage engine
//!
//! Frames and vectors, the distance attenuation law, and sound
//! insulation zones. Everything here is pure and allocation-light so it
//! can run on every position update.

pub mod attenuation;
pub mod math;
pub mod zone;

pub use attenuation::{attenuate, validate_coefficient, AttenuationMode, DEFAULT_ATTENUATION};
pub use math::{
    normalize_axis, normalize_frame, Direction, Pose, RemoteVoicePosition, Vec3, FORWARD, RIGHT, UP,
};
pub use zone::{resolve_coefficient, Resolution, Zone, ZoneSet};
