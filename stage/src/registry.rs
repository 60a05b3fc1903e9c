//! Per-connection position state and pair parameter computation.

use crate::teams::TeamDirectory;
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use spatial::{
    attenuate, normalize_frame, resolve_coefficient, validate_coefficient, AttenuationMode, Pose,
    RemoteVoicePosition, Resolution, ZoneSet, DEFAULT_ATTENUATION,
};
use stage_core::{EntityId, Error};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Listener-wide settings that shape every pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ListenerConfig {
    /// Most remote-user streams received at once
    pub max_recv_count: u32,
    /// Receive range in meters
    pub recv_range: f32,
    /// Meters per game unit
    pub distance_unit: f32,
    /// Coefficient for entities that never had one set
    pub default_attenuation: f32,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            max_recv_count: 10,
            recv_range: 50.0,
            distance_unit: 1.0,
            default_attenuation: DEFAULT_ATTENUATION,
        }
    }
}

/// State tracked for one sound source
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub position: RemoteVoicePosition,
    /// Explicit coefficient; `None` falls back to the listener default
    pub attenuation: Option<f32>,
    pub force_set: bool,
    pub muted: bool,
}

impl Entity {
    fn at(position: RemoteVoicePosition) -> Self {
        Self {
            position,
            attenuation: None,
            force_set: false,
            muted: false,
        }
    }
}

/// Mix parameters for one (listener, entity) pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairParams {
    /// Linear gain in [0, 1]
    pub gain: f32,
    /// Distance in meters
    pub distance: f32,
    /// Degrees, 0 ahead, positive to the right
    pub azimuth: f32,
    /// Degrees above the listener's horizon
    pub elevation: f32,
    /// -1 (left) to 1 (right)
    pub pan: f32,
    /// Coefficient that produced `gain`
    pub coefficient: f32,
    /// Insulation zone the entity is in
    pub zone: Option<i32>,
    pub teammate: bool,
}

/// Positions of the listener and every tracked entity on one connection.
#[derive(Debug, Default)]
pub struct PositionRegistry {
    listener: Pose,
    entities: HashMap<EntityId, Entity>,
    pending_mutes: HashSet<u32>,
    mute_all: bool,
}

impl PositionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listener(&self) -> &Pose {
        &self.listener
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn is_mute_all(&self) -> bool {
        self.mute_all
    }

    /// Move the listener. The frame is checked again, so a hand-built
    /// `Pose` with skewed or unnormalized axes is rejected.
    pub fn update_self(&mut self, pose: Pose) -> Result<(), Error> {
        let pose = normalize_frame(pose.position, pose.forward, pose.right, pose.up)?;
        trace!("Listener moved to {:?}", pose.position);
        self.listener = pose;
        Ok(())
    }

    pub fn update_remote(&mut self, uid: u32, position: RemoteVoicePosition) -> Result<(), Error> {
        self.upsert(EntityId::User(uid), position)
    }

    pub fn update_player(
        &mut self,
        player_id: i32,
        position: RemoteVoicePosition,
    ) -> Result<(), Error> {
        self.upsert(EntityId::Player(player_id), position)
    }

    fn upsert(&mut self, id: EntityId, position: RemoteVoicePosition) -> Result<(), Error> {
        let position = position.validated()?;
        match self.entities.get_mut(&id) {
            Some(entity) => entity.position = position,
            None => {
                let mut entity = Entity::at(position);
                if let EntityId::User(uid) = id {
                    entity.muted = self.pending_mutes.remove(&uid);
                }
                debug!("Tracking {}", id);
                self.entities.insert(id, entity);
            }
        }
        Ok(())
    }

    /// Stop tracking a remote user. Unknown uids are ignored.
    pub fn remove(&mut self, uid: u32) -> bool {
        self.remove_entity(EntityId::User(uid))
    }

    /// Stop tracking a media player. Unknown ids are ignored.
    pub fn remove_player(&mut self, player_id: i32) -> bool {
        self.remove_entity(EntityId::Player(player_id))
    }

    fn remove_entity(&mut self, id: EntityId) -> bool {
        match self.entities.remove(&id) {
            Some(entity) => {
                // The mute preference outlives the position
                if let (EntityId::User(uid), true) = (id, entity.muted) {
                    self.pending_mutes.insert(uid);
                }
                debug!("Stopped tracking {}", id);
                true
            }
            None => false,
        }
    }

    /// Drop every remote user; media players stay.
    pub fn clear_remotes(&mut self) {
        let users: Vec<u32> = self
            .entities
            .keys()
            .filter_map(|id| match id {
                EntityId::User(uid) => Some(*uid),
                EntityId::Player(_) => None,
            })
            .collect();
        for uid in users {
            self.remove(uid);
        }
    }

    /// Drop every entity, media players included.
    ///
    /// Mute state is not reset: it mirrors the engine-wide mute settings, so
    /// muted uids stay pending and mute-all keeps its value. Only the engine
    /// changes those.
    pub fn clear_all(&mut self) {
        let ids: Vec<EntityId> = self.entities.keys().copied().collect();
        for id in ids {
            self.remove_entity(id);
        }
    }

    pub fn set_attenuation(
        &mut self,
        id: EntityId,
        attenuation: f32,
        force_set: bool,
    ) -> Result<(), Error> {
        let attenuation = validate_coefficient(attenuation)?;
        let entity = self.entities.get_mut(&id).ok_or(Error::InvalidId(id))?;
        entity.attenuation = Some(attenuation);
        entity.force_set = force_set;
        debug!(
            "{} attenuation {} ({:?}, force_set = {})",
            id,
            attenuation,
            AttenuationMode::of(attenuation),
            force_set
        );
        Ok(())
    }

    /// Mute or unmute a remote user. A uid without a position yet keeps the
    /// preference until its first update arrives.
    pub fn set_mute(&mut self, uid: u32, muted: bool) {
        match self.entities.get_mut(&EntityId::User(uid)) {
            Some(entity) => entity.muted = muted,
            None if muted => {
                self.pending_mutes.insert(uid);
            }
            None => {
                self.pending_mutes.remove(&uid);
            }
        }
    }

    pub fn set_mute_all(&mut self, muted: bool) {
        self.mute_all = muted;
    }

    /// Parameters for every stream the listener receives.
    ///
    /// Muted, occluded and out-of-range entities are left out, as are users
    /// that lose the ranking for the `max_recv_count` receive slots.
    pub fn compute(
        &self,
        config: &ListenerConfig,
        zones: &ZoneSet,
        teams: &dyn TeamDirectory,
    ) -> BTreeMap<EntityId, PairParams> {
        let listener_zone = zones.locate(self.listener.position);
        let mut params = BTreeMap::new();
        let mut users = Vec::new();

        for (&id, entity) in &self.entities {
            if entity.muted || (self.mute_all && id.is_user()) {
                continue;
            }
            let teammate = match id {
                EntityId::User(uid) => teams.is_teammate(uid),
                EntityId::Player(_) => false,
            };

            let entity_zone = zones.locate(entity.position.position);
            let attenuation = entity.attenuation.unwrap_or(config.default_attenuation);
            let coefficient =
                match resolve_coefficient(listener_zone, entity_zone, attenuation, entity.force_set)
                {
                    Resolution::Coefficient(c) => c,
                    Resolution::Occluded => {
                        trace!("{} occluded", id);
                        continue;
                    }
                };

            let direction = self
                .listener
                .direction_to(entity.position.position, config.distance_unit);
            if direction.distance > config.recv_range && !teammate {
                trace!("{} out of range at {:.1} m", id, direction.distance);
                continue;
            }

            let pair = PairParams {
                gain: attenuate(direction.distance, coefficient),
                distance: direction.distance,
                azimuth: direction.azimuth,
                elevation: direction.elevation,
                pan: direction.pan,
                coefficient,
                zone: entity_zone.map(|zone| zone.id),
                teammate,
            };
            match id {
                EntityId::User(_) => users.push((id, pair)),
                EntityId::Player(_) => {
                    params.insert(id, pair);
                }
            }
        }

        users.sort_by(|(a_id, a), (b_id, b)| {
            b.teammate
                .cmp(&a.teammate)
                .then(a.distance.total_cmp(&b.distance))
                .then(a_id.cmp(b_id))
        });
        users.truncate(config.max_recv_count as usize);
        params.extend(users);
        params
    }
}
