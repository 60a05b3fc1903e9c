//! Scenario files: a listener, the entities around it and their settings.

use serde::Deserialize;
use spatial::{RemoteVoicePosition, Vec3, Zone, FORWARD, RIGHT, UP};
use stage::{EngineCommand, TeamRoster};
use stage_core::Connection;
use std::path::Path;

fn forward() -> Vec3 {
    FORWARD
}

fn right() -> Vec3 {
    RIGHT
}

fn up() -> Vec3 {
    UP
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListenerEntry {
    #[serde(default)]
    pub position: Vec3,
    #[serde(default = "forward")]
    pub forward: Vec3,
    #[serde(default = "right")]
    pub right: Vec3,
    #[serde(default = "up")]
    pub up: Vec3,
    pub team: Option<u32>,
    #[serde(default)]
    pub mute_local: bool,
    #[serde(default)]
    pub mute_all: bool,
}

impl Default for ListenerEntry {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            forward: FORWARD,
            right: RIGHT,
            up: UP,
            team: None,
            mute_local: false,
            mute_all: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserEntry {
    pub uid: u32,
    pub position: Vec3,
    #[serde(default = "forward")]
    pub forward: Vec3,
    pub team: Option<u32>,
    pub attenuation: Option<f32>,
    #[serde(default)]
    pub force_set: bool,
    #[serde(default)]
    pub muted: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlayerEntry {
    pub player_id: i32,
    pub position: Vec3,
    #[serde(default = "forward")]
    pub forward: Vec3,
    pub attenuation: Option<f32>,
    #[serde(default)]
    pub force_set: bool,
}

/// Everything needed to reproduce one mix
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub max_audio_recv_count: Option<u32>,
    pub audio_recv_range: Option<f32>,
    pub distance_unit: Option<f32>,
    /// Replaces the zones from the settings file when present
    pub zones: Option<Vec<Zone>>,
    /// JSON passed to `set_parameters`
    pub parameters: Option<String>,
    #[serde(default)]
    pub listener: ListenerEntry,
    #[serde(default)]
    pub users: Vec<UserEntry>,
    #[serde(default)]
    pub players: Vec<PlayerEntry>,
}

impl Scenario {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Record every team affiliation the scenario names.
    pub fn assign_teams(&self, roster: &TeamRoster) {
        roster.set_local_team(self.listener.team);
        for user in &self.users {
            roster.assign(user.uid, user.team);
        }
    }

    /// Engine commands that build the scenario, in the order they apply.
    pub fn commands(&self) -> Vec<EngineCommand> {
        let mut commands = Vec::new();

        if let Some(count) = self.max_audio_recv_count {
            commands.push(EngineCommand::SetMaxAudioRecvCount(count));
        }
        if let Some(range) = self.audio_recv_range {
            commands.push(EngineCommand::SetAudioRecvRange(range));
        }
        if let Some(unit) = self.distance_unit {
            commands.push(EngineCommand::SetDistanceUnit(unit));
        }
        if let Some(zones) = &self.zones {
            commands.push(EngineCommand::SetZones(zones.clone()));
        }
        if let Some(params) = &self.parameters {
            commands.push(EngineCommand::SetParameters(params.clone()));
        }

        let listener = &self.listener;
        commands.push(EngineCommand::UpdateSelfPosition {
            position: listener.position,
            forward: listener.forward,
            right: listener.right,
            up: listener.up,
            connection: Connection::default(),
        });

        for user in &self.users {
            commands.push(EngineCommand::UpdateRemotePosition {
                uid: user.uid,
                position: RemoteVoicePosition::new(user.position, user.forward),
                connection: Connection::default(),
            });
            if let Some(attenuation) = user.attenuation {
                commands.push(EngineCommand::SetRemoteAudioAttenuation {
                    uid: user.uid,
                    attenuation,
                    force_set: user.force_set,
                });
            }
            if user.muted {
                commands.push(EngineCommand::MuteRemoteAudioStream {
                    uid: user.uid,
                    mute: true,
                });
            }
        }

        for player in &self.players {
            commands.push(EngineCommand::UpdatePlayerPosition {
                player_id: player.player_id,
                position: RemoteVoicePosition::new(player.position, player.forward),
            });
            if let Some(attenuation) = player.attenuation {
                commands.push(EngineCommand::SetPlayerAttenuation {
                    player_id: player.player_id,
                    attenuation,
                    force_set: player.force_set,
                });
            }
        }

        if listener.mute_all {
            commands.push(EngineCommand::MuteAllRemoteAudioStreams(true));
        }
        if listener.mute_local {
            commands.push(EngineCommand::MuteLocalAudioStream(true));
        }

        commands
    }
}
