use spatial::{RemoteVoicePosition, Vec3, Zone};
use stage_core::Connection;

/// Commands that can be sent to the engine handler
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    /// Limit the number of received remote-user streams
    SetMaxAudioRecvCount(u32),

    /// Set the receive range in meters
    SetAudioRecvRange(f32),

    /// Set meters per game unit
    SetDistanceUnit(f32),

    /// Move the local listener
    UpdateSelfPosition {
        position: Vec3,
        forward: Vec3,
        right: Vec3,
        up: Vec3,
        /// Connection the listener belongs to
        connection: Connection,
    },

    /// Move a remote user
    UpdateRemotePosition {
        uid: u32,
        position: RemoteVoicePosition,
        connection: Connection,
    },

    /// Stop tracking a remote user
    RemoveRemotePosition { uid: u32, connection: Connection },

    /// Stop tracking every remote user on a connection
    ClearRemotePositions { connection: Connection },

    /// Move a media player
    UpdatePlayerPosition {
        player_id: i32,
        position: RemoteVoicePosition,
    },

    /// Replace the insulation zones
    SetZones(Vec<Zone>),

    SetRemoteAudioAttenuation {
        uid: u32,
        attenuation: f32,
        force_set: bool,
    },

    SetPlayerAttenuation {
        player_id: i32,
        attenuation: f32,
        force_set: bool,
    },

    MuteLocalAudioStream(bool),

    MuteAllRemoteAudioStreams(bool),

    MuteRemoteAudioStream { uid: u32, mute: bool },

    /// JSON spatial audio parameters
    SetParameters(String),

    /// Release the engine and stop the handler
    Shutdown,
}

impl EngineCommand {
    pub fn name(&self) -> &'static str {
        match self {
            EngineCommand::SetMaxAudioRecvCount(_) => "SetMaxAudioRecvCount",
            EngineCommand::SetAudioRecvRange(_) => "SetAudioRecvRange",
            EngineCommand::SetDistanceUnit(_) => "SetDistanceUnit",
            EngineCommand::UpdateSelfPosition { .. } => "UpdateSelfPosition",
            EngineCommand::UpdateRemotePosition { .. } => "UpdateRemotePosition",
            EngineCommand::RemoveRemotePosition { .. } => "RemoveRemotePosition",
            EngineCommand::ClearRemotePositions { .. } => "ClearRemotePositions",
            EngineCommand::UpdatePlayerPosition { .. } => "UpdatePlayerPosition",
            EngineCommand::SetZones(_) => "SetZones",
            EngineCommand::SetRemoteAudioAttenuation { .. } => "SetRemoteAudioAttenuation",
            EngineCommand::SetPlayerAttenuation { .. } => "SetPlayerAttenuation",
            EngineCommand::MuteLocalAudioStream(_) => "MuteLocalAudioStream",
            EngineCommand::MuteAllRemoteAudioStreams(_) => "MuteAllRemoteAudioStreams",
            EngineCommand::MuteRemoteAudioStream { .. } => "MuteRemoteAudioStream",
            EngineCommand::SetParameters(_) => "SetParameters",
            EngineCommand::Shutdown => "Shutdown",
        }
    }

    /// The connection whose snapshot this command changes, when it names one.
    pub fn connection(&self) -> Option<&Connection> {
        match self {
            EngineCommand::UpdateSelfPosition { connection, .. }
            | EngineCommand::UpdateRemotePosition { connection, .. }
            | EngineCommand::RemoveRemotePosition { connection, .. }
            | EngineCommand::ClearRemotePositions { connection } => Some(connection),
            _ => None,
        }
    }
}
