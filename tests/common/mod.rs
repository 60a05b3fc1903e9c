use soundstage::spatial::{FORWARD, RIGHT, UP};
use soundstage::{BaseSpatialAudioEngine, LocalSpatialAudioEngine, RemoteVoicePosition, Vec3};
use std::sync::{Mutex, MutexGuard};

static ENGINE_LOCK: Mutex<()> = Mutex::new(());

/// Only one engine may be live per process, so engine tests run one at a time.
pub fn engine_guard() -> MutexGuard<'static, ()> {
    ENGINE_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

/// An initialized engine with the listener at the origin facing +x.
#[allow(dead_code)]
pub fn engine_at_origin() -> LocalSpatialAudioEngine {
    let mut engine = LocalSpatialAudioEngine::new();
    engine.initialize().unwrap();
    engine
        .update_self_position(Vec3::ZERO, FORWARD, RIGHT, UP)
        .unwrap();
    engine
}

#[allow(dead_code)]
pub fn at(x: f32, y: f32, z: f32) -> RemoteVoicePosition {
    RemoteVoicePosition::new(Vec3::new(x, y, z), FORWARD)
}
