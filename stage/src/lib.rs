//! Spatial audio engine for soundstage
//!
//! This crate tracks the listener, remote users and media players for each
//! connection, and publishes the per-entity mix parameters the audio
//! renderer applies.

pub mod commands;
pub mod engine;
pub mod handler;
pub mod publisher;
pub mod registry;
pub mod teams;

pub use commands::EngineCommand;
pub use engine::{BaseSpatialAudioEngine, LocalSpatialAudioEngine};
pub use handler::EngineHandler;
pub use publisher::{MixPublisher, MixSink, MixSnapshot, SnapshotFlags};
pub use registry::{Entity, ListenerConfig, PairParams, PositionRegistry};
pub use teams::{NoTeams, TeamDirectory, TeamRoster};
