//! The local spatial audio engine.

use crate::publisher::{MixPublisher, MixSink, MixSnapshot, SnapshotFlags};
use crate::registry::{ListenerConfig, PositionRegistry};
use crate::teams::{NoTeams, TeamDirectory};
use log::{debug, info};
use serde::Deserialize;
use settings_manager::EngineSettings;
use spatial::{
    normalize_frame, validate_coefficient, RemoteVoicePosition, Vec3, Zone, ZoneSet,
    DEFAULT_ATTENUATION,
};
use stage_core::{Connection, EntityId, Error, InstanceId};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Only one engine may be initialized per process.
static LIVE_INSTANCE: AtomicBool = AtomicBool::new(false);

/// Operations shared by every spatial audio engine variant.
///
/// Operations without a connection argument act on the default
/// connection; the `_ex` forms name one explicitly.
pub trait BaseSpatialAudioEngine {
    /// Release all resources. The engine must be initialized again before reuse.
    fn release(&mut self);

    fn set_max_audio_recv_count(&mut self, max_count: u32) -> Result<(), Error>;

    /// Receive range in meters; must be > 0.
    fn set_audio_recv_range(&mut self, range: f32) -> Result<(), Error>;

    /// Meters per game engine distance unit; must be > 0.
    fn set_distance_unit(&mut self, unit: f32) -> Result<(), Error>;

    fn update_self_position(
        &mut self,
        position: Vec3,
        axis_forward: Vec3,
        axis_right: Vec3,
        axis_up: Vec3,
    ) -> Result<(), Error> {
        self.update_self_position_ex(
            position,
            axis_forward,
            axis_right,
            axis_up,
            &Connection::default(),
        )
    }

    fn update_self_position_ex(
        &mut self,
        position: Vec3,
        axis_forward: Vec3,
        axis_right: Vec3,
        axis_up: Vec3,
        connection: &Connection,
    ) -> Result<(), Error>;

    fn update_player_position_info(
        &mut self,
        player_id: i32,
        position_info: RemoteVoicePosition,
    ) -> Result<(), Error>;

    /// Apply a JSON object of spatial audio parameters. `null` or an empty
    /// string restores the defaults.
    fn set_parameters(&mut self, params: &str) -> Result<(), Error>;

    fn mute_local_audio_stream(&mut self, mute: bool) -> Result<(), Error>;

    fn mute_all_remote_audio_streams(&mut self, mute: bool) -> Result<(), Error>;

    /// Replace the whole zone set. The last call wins.
    fn set_zones(&mut self, zones: &[Zone]) -> Result<(), Error>;

    fn set_player_attenuation(
        &mut self,
        player_id: i32,
        attenuation: f32,
        force_set: bool,
    ) -> Result<(), Error>;

    fn mute_remote_audio_stream(&mut self, uid: u32, mute: bool) -> Result<(), Error>;
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SpatialAudioParams {
    enable_blur: Option<bool>,
    enable_air_absorb: Option<bool>,
    speaker_attenuation: Option<f32>,
}

/// Registry and publisher for one connection
struct Session {
    registry: PositionRegistry,
    publisher: MixPublisher,
}

impl Session {
    fn new(connection: Connection, muted_uids: &HashSet<u32>, mute_all: bool) -> Self {
        let mut registry = PositionRegistry::new();
        for &uid in muted_uids {
            registry.set_mute(uid, true);
        }
        registry.set_mute_all(mute_all);
        Self {
            registry,
            publisher: MixPublisher::new(connection),
        }
    }
}

/// Spatial audio engine that computes positions locally.
pub struct LocalSpatialAudioEngine {
    instance: Option<InstanceId>,
    config: ListenerConfig,
    zones: Arc<ZoneSet>,
    teams: Arc<dyn TeamDirectory>,
    sessions: HashMap<Connection, Session>,
    muted_uids: HashSet<u32>,
    mute_all: bool,
    flags: SnapshotFlags,
}

impl Default for LocalSpatialAudioEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalSpatialAudioEngine {
    /// Create an engine. Call [`initialize`](Self::initialize) before anything else.
    pub fn new() -> Self {
        Self {
            instance: None,
            config: ListenerConfig::default(),
            zones: Arc::new(ZoneSet::empty()),
            teams: Arc::new(NoTeams),
            sessions: HashMap::new(),
            muted_uids: HashSet::new(),
            mute_all: false,
            flags: SnapshotFlags::default(),
        }
    }

    pub fn with_team_directory(mut self, teams: Arc<dyn TeamDirectory>) -> Self {
        self.teams = teams;
        self
    }

    /// Swap the team directory. Used from the next recompute on; see
    /// [`refresh_teams`](Self::refresh_teams).
    pub fn set_team_directory(&mut self, teams: Arc<dyn TeamDirectory>) {
        self.teams = teams;
    }

    /// Claim the process-wide engine slot.
    pub fn initialize(&mut self) -> Result<(), Error> {
        if self.instance.is_some() {
            return Err(Error::AlreadyInitialized);
        }
        LIVE_INSTANCE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::AlreadyInitialized)?;

        let id = InstanceId::new();
        self.instance = Some(id);
        let connection = Connection::default();
        let session = Session::new(connection.clone(), &self.muted_uids, self.mute_all);
        self.sessions.insert(connection, session);
        info!("Spatial audio engine {} initialized", id);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.instance.is_some()
    }

    pub fn instance_id(&self) -> Option<InstanceId> {
        self.instance
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    pub fn zones(&self) -> Arc<ZoneSet> {
        Arc::clone(&self.zones)
    }

    /// Push loaded settings into the engine. Nothing changes if any value is invalid.
    pub fn apply_settings(&mut self, settings: &EngineSettings) -> Result<(), Error> {
        self.ensure_initialized()?;
        settings.validate()?;
        let zones = ZoneSet::new(&settings.zones)?;

        self.config = ListenerConfig {
            max_recv_count: settings.max_audio_recv_count,
            recv_range: settings.audio_recv_range,
            distance_unit: settings.distance_unit,
            default_attenuation: settings.default_attenuation,
        };
        self.zones = Arc::new(zones);
        info!(
            "Applied settings: {} zones, range {} m, max {} streams",
            self.zones.len(),
            self.config.recv_range,
            self.config.max_recv_count
        );
        self.republish_all();
        Ok(())
    }

    pub fn update_remote_position(
        &mut self,
        uid: u32,
        position_info: RemoteVoicePosition,
    ) -> Result<(), Error> {
        self.update_remote_position_ex(uid, position_info, &Connection::default())
    }

    pub fn update_remote_position_ex(
        &mut self,
        uid: u32,
        position_info: RemoteVoicePosition,
        connection: &Connection,
    ) -> Result<(), Error> {
        self.ensure_initialized()?;
        let position_info = position_info.validated()?;
        self.session_mut(connection)
            .registry
            .update_remote(uid, position_info)?;
        self.republish(connection);
        Ok(())
    }

    /// Forget a remote user's position. Unknown uids are not an error.
    ///
    /// Returns whether the uid was tracked.
    pub fn remove_remote_position(&mut self, uid: u32) -> Result<bool, Error> {
        self.remove_remote_position_ex(uid, &Connection::default())
    }

    pub fn remove_remote_position_ex(
        &mut self,
        uid: u32,
        connection: &Connection,
    ) -> Result<bool, Error> {
        self.ensure_initialized()?;
        let removed = match self.sessions.get_mut(connection) {
            Some(session) => session.registry.remove(uid),
            None => false,
        };
        if removed {
            self.republish(connection);
        } else {
            debug!("remove_remote_position: uid {} not tracked on {}", uid, connection);
        }
        Ok(removed)
    }

    pub fn clear_remote_positions(&mut self) -> Result<(), Error> {
        self.clear_remote_positions_ex(&Connection::default())
    }

    pub fn clear_remote_positions_ex(&mut self, connection: &Connection) -> Result<(), Error> {
        self.ensure_initialized()?;
        if let Some(session) = self.sessions.get_mut(connection) {
            session.registry.clear_remotes();
            self.republish(connection);
        }
        Ok(())
    }

    /// Forget a media player's position. Unknown ids are not an error.
    ///
    /// Returns whether the player was tracked.
    pub fn remove_player_position(&mut self, player_id: i32) -> Result<bool, Error> {
        self.ensure_initialized()?;
        let connection = Connection::default();
        let removed = match self.sessions.get_mut(&connection) {
            Some(session) => session.registry.remove_player(player_id),
            None => false,
        };
        if removed {
            self.republish(&connection);
        }
        Ok(removed)
    }

    pub fn set_remote_audio_attenuation(
        &mut self,
        uid: u32,
        attenuation: f32,
        force_set: bool,
    ) -> Result<(), Error> {
        self.set_attenuation(EntityId::User(uid), attenuation, force_set)
    }

    /// Recompute after the team directory's contents changed.
    pub fn refresh_teams(&mut self) -> Result<(), Error> {
        self.ensure_initialized()?;
        self.republish_all();
        Ok(())
    }

    pub fn snapshot(&self) -> Result<Arc<MixSnapshot>, Error> {
        self.snapshot_ex(&Connection::default())
    }

    pub fn snapshot_ex(&self, connection: &Connection) -> Result<Arc<MixSnapshot>, Error> {
        self.ensure_initialized()?;
        Ok(match self.sessions.get(connection) {
            Some(session) => session.publisher.snapshot(),
            None => Arc::new(MixSnapshot {
                connection: connection.clone(),
                ..MixSnapshot::default()
            }),
        })
    }

    pub fn subscribe(&mut self) -> Result<watch::Receiver<Arc<MixSnapshot>>, Error> {
        self.subscribe_ex(&Connection::default())
    }

    pub fn subscribe_ex(
        &mut self,
        connection: &Connection,
    ) -> Result<watch::Receiver<Arc<MixSnapshot>>, Error> {
        self.ensure_initialized()?;
        Ok(self.session_mut(connection).publisher.subscribe())
    }

    /// Hand the default connection's snapshot to a mixer.
    pub fn publish_to(&self, sink: &mut dyn MixSink) -> Result<(), Error> {
        self.ensure_initialized()?;
        if let Some(session) = self.sessions.get(&Connection::default()) {
            session.publisher.publish_to(sink);
        }
        Ok(())
    }

    pub fn registry(&self) -> Option<&PositionRegistry> {
        self.registry_ex(&Connection::default())
    }

    pub fn registry_ex(&self, connection: &Connection) -> Option<&PositionRegistry> {
        self.sessions.get(connection).map(|session| &session.registry)
    }

    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.sessions.keys()
    }

    fn ensure_initialized(&self) -> Result<InstanceId, Error> {
        self.instance.ok_or(Error::NotInitialized)
    }

    fn session_mut(&mut self, connection: &Connection) -> &mut Session {
        let muted_uids = &self.muted_uids;
        let mute_all = self.mute_all;
        self.sessions
            .entry(connection.clone())
            .or_insert_with(|| {
                debug!("Opening spatial session on {}", connection);
                Session::new(connection.clone(), muted_uids, mute_all)
            })
    }

    fn set_attenuation(
        &mut self,
        id: EntityId,
        attenuation: f32,
        force_set: bool,
    ) -> Result<(), Error> {
        self.ensure_initialized()?;
        let attenuation = validate_coefficient(attenuation)?;

        let mut found = false;
        for session in self.sessions.values_mut() {
            if session.registry.contains(id) {
                session.registry.set_attenuation(id, attenuation, force_set)?;
                found = true;
            }
        }
        if !found {
            return Err(Error::InvalidId(id));
        }
        self.republish_all();
        Ok(())
    }

    fn republish(&self, connection: &Connection) {
        if let Some(session) = self.sessions.get(connection) {
            let params = session
                .registry
                .compute(&self.config, &self.zones, self.teams.as_ref());
            session.publisher.publish(params, self.flags);
        }
    }

    fn republish_all(&self) {
        for connection in self.sessions.keys() {
            self.republish(connection);
        }
    }

    fn positive(name: &str, value: f32) -> Result<f32, Error> {
        if value.is_finite() && value > 0.0 {
            Ok(value)
        } else {
            Err(Error::InvalidParameter(format!(
                "{} must be > 0, got {}",
                name, value
            )))
        }
    }
}

impl BaseSpatialAudioEngine for LocalSpatialAudioEngine {
    fn release(&mut self) {
        if let Some(id) = self.instance.take() {
            self.sessions.clear();
            self.zones = Arc::new(ZoneSet::empty());
            self.muted_uids.clear();
            self.mute_all = false;
            self.flags = SnapshotFlags::default();
            self.config = ListenerConfig::default();
            LIVE_INSTANCE.store(false, Ordering::Release);
            info!("Spatial audio engine {} released", id);
        }
    }

    fn set_max_audio_recv_count(&mut self, max_count: u32) -> Result<(), Error> {
        self.ensure_initialized()?;
        if max_count == 0 {
            return Err(Error::InvalidParameter(
                "max audio receive count must be > 0".to_string(),
            ));
        }
        self.config.max_recv_count = max_count;
        debug!("Max audio receive count set to {}", max_count);
        self.republish_all();
        Ok(())
    }

    fn set_audio_recv_range(&mut self, range: f32) -> Result<(), Error> {
        self.ensure_initialized()?;
        self.config.recv_range = Self::positive("audio receive range", range)?;
        debug!("Audio receive range set to {} m", range);
        self.republish_all();
        Ok(())
    }

    fn set_distance_unit(&mut self, unit: f32) -> Result<(), Error> {
        self.ensure_initialized()?;
        self.config.distance_unit = Self::positive("distance unit", unit)?;
        debug!("Distance unit set to {} m", unit);
        self.republish_all();
        Ok(())
    }

    fn update_self_position_ex(
        &mut self,
        position: Vec3,
        axis_forward: Vec3,
        axis_right: Vec3,
        axis_up: Vec3,
        connection: &Connection,
    ) -> Result<(), Error> {
        self.ensure_initialized()?;
        let pose = normalize_frame(position, axis_forward, axis_right, axis_up)?;
        self.session_mut(connection).registry.update_self(pose)?;
        self.republish(connection);
        Ok(())
    }

    fn update_player_position_info(
        &mut self,
        player_id: i32,
        position_info: RemoteVoicePosition,
    ) -> Result<(), Error> {
        self.ensure_initialized()?;
        let position_info = position_info.validated()?;
        let connection = Connection::default();
        self.session_mut(&connection)
            .registry
            .update_player(player_id, position_info)?;
        self.republish(&connection);
        Ok(())
    }

    fn set_parameters(&mut self, params: &str) -> Result<(), Error> {
        self.ensure_initialized()?;
        let params = params.trim();
        if params.is_empty() || params == "null" {
            self.flags.blur = false;
            self.flags.air_absorb = false;
            self.config.default_attenuation = DEFAULT_ATTENUATION;
            debug!("Spatial audio parameters reset");
            self.republish_all();
            return Ok(());
        }

        let parsed: SpatialAudioParams = serde_json::from_str(params)
            .map_err(|e| Error::InvalidParameter(format!("spatial audio params: {}", e)))?;
        let attenuation = parsed
            .speaker_attenuation
            .map(validate_coefficient)
            .transpose()?;

        if let Some(blur) = parsed.enable_blur {
            self.flags.blur = blur;
        }
        if let Some(air_absorb) = parsed.enable_air_absorb {
            self.flags.air_absorb = air_absorb;
        }
        if let Some(attenuation) = attenuation {
            self.config.default_attenuation = attenuation;
        }
        debug!("Spatial audio parameters applied: {:?}", parsed);
        self.republish_all();
        Ok(())
    }

    fn mute_local_audio_stream(&mut self, mute: bool) -> Result<(), Error> {
        self.ensure_initialized()?;
        self.flags.local_muted = mute;
        self.republish_all();
        Ok(())
    }

    fn mute_all_remote_audio_streams(&mut self, mute: bool) -> Result<(), Error> {
        self.ensure_initialized()?;
        self.mute_all = mute;
        for session in self.sessions.values_mut() {
            session.registry.set_mute_all(mute);
        }
        self.republish_all();
        Ok(())
    }

    fn set_zones(&mut self, zones: &[Zone]) -> Result<(), Error> {
        self.ensure_initialized()?;
        let zones = ZoneSet::new(zones)?;
        info!("Insulation zones replaced ({} zones)", zones.len());
        self.zones = Arc::new(zones);
        self.republish_all();
        Ok(())
    }

    fn set_player_attenuation(
        &mut self,
        player_id: i32,
        attenuation: f32,
        force_set: bool,
    ) -> Result<(), Error> {
        self.set_attenuation(EntityId::Player(player_id), attenuation, force_set)
    }

    fn mute_remote_audio_stream(&mut self, uid: u32, mute: bool) -> Result<(), Error> {
        self.ensure_initialized()?;
        if mute {
            self.muted_uids.insert(uid);
        } else {
            self.muted_uids.remove(&uid);
        }
        for session in self.sessions.values_mut() {
            session.registry.set_mute(uid, mute);
        }
        self.republish_all();
        Ok(())
    }
}

impl Drop for LocalSpatialAudioEngine {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::MockMixSink;
    use crate::teams::TeamRoster;
    use crate::test_support::engine_guard;
    use spatial::{FORWARD, RIGHT, UP};

    fn at(x: f32, y: f32, z: f32) -> RemoteVoicePosition {
        RemoteVoicePosition::new(Vec3::new(x, y, z), FORWARD)
    }

    fn engine() -> LocalSpatialAudioEngine {
        let mut engine = LocalSpatialAudioEngine::new();
        engine.initialize().unwrap();
        engine
    }

    fn listen_from_origin(engine: &mut LocalSpatialAudioEngine) {
        engine
            .update_self_position(Vec3::ZERO, FORWARD, RIGHT, UP)
            .unwrap();
    }

    #[test]
    fn calls_before_initialize_fail() {
        let _guard = engine_guard();
        let mut engine = LocalSpatialAudioEngine::new();

        assert!(matches!(
            engine.set_audio_recv_range(10.0),
            Err(Error::NotInitialized)
        ));
        assert!(matches!(
            engine.update_remote_position(1, at(1.0, 0.0, 0.0)),
            Err(Error::NotInitialized)
        ));
        assert!(matches!(
            engine.remove_remote_position(1),
            Err(Error::NotInitialized)
        ));
        assert!(matches!(engine.snapshot(), Err(Error::NotInitialized)));
    }

    #[test_log::test]
    fn single_live_instance() {
        let _guard = engine_guard();
        let mut first = engine();
        let mut second = LocalSpatialAudioEngine::new();

        assert!(matches!(second.initialize(), Err(Error::AlreadyInitialized)));
        assert!(matches!(first.initialize(), Err(Error::AlreadyInitialized)));

        first.release();
        assert!(!first.is_initialized());
        second.initialize().unwrap();
        assert!(second.instance_id().is_some());
    }

    #[test]
    fn drop_releases_instance() {
        let _guard = engine_guard();
        {
            let _engine = engine();
        }
        let mut next = LocalSpatialAudioEngine::new();
        assert!(next.initialize().is_ok());
    }

    #[test]
    fn release_drops_state() {
        let _guard = engine_guard();
        let mut engine = engine();
        engine.update_remote_position(1, at(2.0, 0.0, 0.0)).unwrap();
        engine.release();

        engine.initialize().unwrap();
        assert!(engine.registry().unwrap().is_empty());
        assert!(engine.snapshot().unwrap().is_empty());
    }

    #[test]
    fn config_setters_validate() {
        let _guard = engine_guard();
        let mut engine = engine();

        assert!(matches!(
            engine.set_max_audio_recv_count(0),
            Err(Error::InvalidParameter(_))
        ));
        assert!(engine.set_audio_recv_range(0.0).is_err());
        assert!(engine.set_audio_recv_range(f32::NAN).is_err());
        assert!(engine.set_distance_unit(-1.0).is_err());
        assert_eq!(engine.config(), &ListenerConfig::default());

        engine.set_max_audio_recv_count(3).unwrap();
        engine.set_audio_recv_range(20.0).unwrap();
        engine.set_distance_unit(2.0).unwrap();
        assert_eq!(engine.config().max_recv_count, 3);
        assert_eq!(engine.config().recv_range, 20.0);
        assert_eq!(engine.config().distance_unit, 2.0);
    }

    #[test]
    fn each_update_publishes_a_snapshot() {
        let _guard = engine_guard();
        let mut engine = engine();
        engine.set_audio_recv_range(20.0).unwrap();
        listen_from_origin(&mut engine);
        let before = engine.snapshot().unwrap().revision;

        engine.update_remote_position(1, at(10.0, 0.0, 0.0)).unwrap();
        let snapshot = engine.snapshot().unwrap();
        assert_eq!(snapshot.revision, before + 1);
        assert!((snapshot.gain(EntityId::User(1)) - 0.1).abs() < 1e-5);
    }

    #[test]
    fn invalid_frame_is_rejected_without_publishing() {
        let _guard = engine_guard();
        let mut engine = engine();
        let revision = engine.snapshot().unwrap().revision;

        let result = engine.update_self_position(
            Vec3::ZERO,
            FORWARD,
            FORWARD,
            UP,
        );
        assert!(matches!(result, Err(Error::InvalidFrame(_))));
        assert_eq!(engine.snapshot().unwrap().revision, revision);
    }

    #[test]
    fn remove_unknown_remote_is_ok() {
        let _guard = engine_guard();
        let mut engine = engine();
        assert!(!engine.remove_remote_position(999).unwrap());
        assert!(!engine
            .remove_remote_position_ex(999, &Connection::new("other", 5))
            .unwrap());
        assert!(engine.clear_remote_positions().is_ok());
        assert!(!engine.remove_player_position(3).unwrap());
    }

    #[test]
    fn attenuation_on_unknown_entity_fails() {
        let _guard = engine_guard();
        let mut engine = engine();
        assert!(matches!(
            engine.set_remote_audio_attenuation(4, 0.5, false),
            Err(Error::InvalidId(EntityId::User(4)))
        ));
        assert!(matches!(
            engine.set_player_attenuation(2, 0.5, false),
            Err(Error::InvalidId(EntityId::Player(2)))
        ));

        engine.update_remote_position(4, at(1.0, 0.0, 0.0)).unwrap();
        assert!(matches!(
            engine.set_remote_audio_attenuation(4, 1.2, false),
            Err(Error::InvalidParameter(_))
        ));
        engine.set_remote_audio_attenuation(4, 0.0, false).unwrap();
    }

    #[test]
    fn zones_replace_wholesale() {
        let _guard = engine_guard();
        let mut engine = engine();
        let room = |id, x| Zone::aligned(id, Vec3::new(x, 0.0, 0.0), Vec3::new(4.0, 4.0, 4.0), 0.5);

        engine.set_zones(&[room(1, 0.0), room(2, 10.0)]).unwrap();
        assert_eq!(engine.zones().len(), 2);

        engine.set_zones(&[room(3, 20.0)]).unwrap();
        let zones = engine.zones();
        assert_eq!(zones.len(), 1);
        assert_eq!(zones.classify(Vec3::ZERO), None);
        assert_eq!(zones.classify(Vec3::new(20.0, 0.0, 0.0)), Some(3));

        // A bad set leaves the previous one active
        let mut bad = room(4, 0.0);
        bad.up_length = -1.0;
        assert!(engine.set_zones(&[room(5, 0.0), bad]).is_err());
        assert_eq!(engine.zones().classify(Vec3::new(20.0, 0.0, 0.0)), Some(3));
    }

    #[test]
    fn occlusion_between_zones() {
        let _guard = engine_guard();
        let mut engine = engine();
        listen_from_origin(&mut engine);
        engine
            .set_zones(&[
                Zone::aligned(1, Vec3::ZERO, Vec3::new(4.0, 4.0, 4.0), 0.0),
                Zone::aligned(2, Vec3::new(6.0, 0.0, 0.0), Vec3::new(4.0, 4.0, 4.0), 0.0),
            ])
            .unwrap();
        engine.update_remote_position(1, at(6.0, 0.0, 0.0)).unwrap();
        engine.set_remote_audio_attenuation(1, 0.0, false).unwrap();
        assert_eq!(engine.snapshot().unwrap().gain(EntityId::User(1)), 0.0);

        // Forcing the attenuation lifts the zone rules
        engine.set_remote_audio_attenuation(1, 0.0, true).unwrap();
        assert_eq!(engine.snapshot().unwrap().gain(EntityId::User(1)), 1.0);
    }

    #[test]
    fn mutes() {
        let _guard = engine_guard();
        let mut engine = engine();
        listen_from_origin(&mut engine);

        engine.mute_remote_audio_stream(2, true).unwrap();
        engine.update_remote_position(1, at(2.0, 0.0, 0.0)).unwrap();
        engine.update_remote_position(2, at(2.0, 1.0, 0.0)).unwrap();
        engine.update_player_position_info(7, at(3.0, 0.0, 0.0)).unwrap();

        let snapshot = engine.snapshot().unwrap();
        assert!(snapshot.is_audible(EntityId::User(1)));
        assert!(!snapshot.is_audible(EntityId::User(2)));

        engine.mute_all_remote_audio_streams(true).unwrap();
        let snapshot = engine.snapshot().unwrap();
        assert!(!snapshot.is_audible(EntityId::User(1)));
        assert!(snapshot.is_audible(EntityId::Player(7)));
        assert!(engine.registry().unwrap().contains(EntityId::User(1)));

        engine.mute_all_remote_audio_streams(false).unwrap();
        engine.mute_remote_audio_stream(2, false).unwrap();
        assert_eq!(engine.snapshot().unwrap().len(), 3);

        engine.mute_local_audio_stream(true).unwrap();
        assert!(engine.snapshot().unwrap().flags.local_muted);
    }

    #[test]
    fn connections_are_independent() {
        let _guard = engine_guard();
        let mut engine = engine();
        let other = Connection::new("arena", 42);

        engine
            .update_self_position_ex(
                Vec3::new(100.0, 0.0, 0.0),
                FORWARD,
                RIGHT,
                UP,
                &other,
            )
            .unwrap();
        engine
            .update_remote_position_ex(1, at(101.0, 0.0, 0.0), &other)
            .unwrap();

        assert!(engine.snapshot_ex(&other).unwrap().is_audible(EntityId::User(1)));
        assert!(engine.snapshot().unwrap().is_empty());

        engine.clear_remote_positions_ex(&other).unwrap();
        assert!(engine.snapshot_ex(&other).unwrap().is_empty());
        assert_eq!(engine.connections().count(), 2);
    }

    #[test]
    fn mute_reaches_later_connections() {
        let _guard = engine_guard();
        let mut engine = engine();
        engine.mute_remote_audio_stream(9, true).unwrap();

        let other = Connection::new("arena", 1);
        engine
            .update_remote_position_ex(9, at(1.0, 0.0, 0.0), &other)
            .unwrap();
        assert!(engine.snapshot_ex(&other).unwrap().is_empty());
    }

    #[test]
    fn parameters_json() {
        let _guard = engine_guard();
        let mut engine = engine();
        listen_from_origin(&mut engine);
        engine.update_player_position_info(1, at(10.0, 0.0, 0.0)).unwrap();

        engine
            .set_parameters(r#"{"enable_blur": true, "speaker_attenuation": 1.0}"#)
            .unwrap();
        let snapshot = engine.snapshot().unwrap();
        assert!(snapshot.flags.blur);
        assert!(!snapshot.flags.air_absorb);
        assert!((snapshot.gain(EntityId::Player(1)) - 0.01).abs() < 1e-5);

        assert!(matches!(
            engine.set_parameters(r#"{"speaker_attenuation": 3.0}"#),
            Err(Error::InvalidParameter(_))
        ));
        assert!(engine.set_parameters(r#"{"volume": 1}"#).is_err());
        assert!(engine.set_parameters("not json").is_err());
        assert_eq!(engine.config().default_attenuation, 1.0);

        engine.set_parameters("null").unwrap();
        assert!(!engine.snapshot().unwrap().flags.blur);
        assert_eq!(engine.config().default_attenuation, DEFAULT_ATTENUATION);
    }

    #[test]
    fn team_changes_need_refresh() {
        let _guard = engine_guard();
        let roster = Arc::new(TeamRoster::new());
        let mut engine = LocalSpatialAudioEngine::new().with_team_directory(roster.clone());
        engine.initialize().unwrap();
        engine.set_audio_recv_range(5.0).unwrap();
        listen_from_origin(&mut engine);
        engine.update_remote_position(1, at(30.0, 0.0, 0.0)).unwrap();
        assert!(engine.snapshot().unwrap().is_empty());

        roster.set_local_team(Some(1));
        roster.assign(1, Some(1));
        engine.refresh_teams().unwrap();
        assert!(engine.snapshot().unwrap().is_audible(EntityId::User(1)));
    }

    #[test]
    fn apply_settings_is_all_or_nothing() {
        let _guard = engine_guard();
        let mut engine = engine();

        let mut settings = EngineSettings {
            audio_recv_range: 15.0,
            zones: vec![Zone::aligned(1, Vec3::ZERO, Vec3::new(2.0, 2.0, 2.0), 0.5)],
            ..EngineSettings::default()
        };
        settings.zones[0].forward_length = 0.0;
        assert!(engine.apply_settings(&settings).is_err());
        assert_eq!(engine.config().recv_range, ListenerConfig::default().recv_range);

        settings.zones[0].forward_length = 2.0;
        engine.apply_settings(&settings).unwrap();
        assert_eq!(engine.config().recv_range, 15.0);
        assert_eq!(engine.zones().classify(Vec3::ZERO), Some(1));
    }

    #[test]
    fn publish_to_mixer() {
        let _guard = engine_guard();
        let mut engine = engine();
        listen_from_origin(&mut engine);
        engine.update_remote_position(3, at(0.0, 2.0, 0.0)).unwrap();

        let mut sink = MockMixSink::new();
        sink.expect_apply()
            .withf(|snapshot| snapshot.params[&EntityId::User(3)].pan > 0.99)
            .times(1)
            .return_const(());
        engine.publish_to(&mut sink).unwrap();
    }
}
