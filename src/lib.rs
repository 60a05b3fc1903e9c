//! soundstage: local spatial audio positioning
//!
//! Re-exports the workspace crates so applications and the integration
//! tests can depend on a single crate.

pub use audio;
pub use settings_manager;
pub use spatial;
pub use stage;
pub use stage_core;

// Re-export commonly used types for convenience
pub use audio::{MixerTask, SpatialMixer};
pub use settings_manager::{EngineSettings, SettingsManager};
pub use spatial::{RemoteVoicePosition, Vec3, Zone, ZoneSet};
pub use stage::{
    BaseSpatialAudioEngine, EngineCommand, EngineHandler, LocalSpatialAudioEngine, MixSink,
    MixSnapshot, PairParams, TeamDirectory, TeamRoster,
};
pub use stage_core::{result_code, Connection, EngineEvent, EntityId, Error, RtcEvent};
