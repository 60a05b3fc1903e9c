use crate::{Connection, EntityId};

/// Events from the RTC engine collaborator that affect spatial state
#[derive(Debug, Clone, PartialEq)]
pub enum RtcEvent {
    /// A remote user left the channel
    UserOffline {
        /// Connection the user was seen on
        connection: Connection,
        /// ID of the departed user
        uid: u32,
    },

    /// A remote user's team changed
    TeamAssigned {
        /// ID of the remote user
        uid: u32,
        /// New team, `None` when the user has no team
        team: Option<u32>,
    },

    /// The local user's team changed
    LocalTeamAssigned {
        /// New team, `None` when the local user has no team
        team: Option<u32>,
    },

    /// A media player was destroyed
    PlayerDestroyed {
        /// ID of the destroyed player
        player_id: i32,
    },

    /// The local user left a channel
    LeftChannel {
        /// Connection that was left
        connection: Connection,
    },
}

/// Events emitted by the engine handler
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A new mix snapshot is available
    SnapshotPublished {
        /// Connection the snapshot belongs to
        connection: Connection,
        /// Revision of the published snapshot
        revision: u64,
        /// Number of streams the listener currently receives
        audible: usize,
    },

    /// A command was rejected
    CommandFailed {
        /// Name of the rejected command
        command: &'static str,
        /// Signed result code
        code: i32,
        /// Human readable reason
        reason: String,
    },

    /// An entity stopped being tracked
    EntityRemoved(EntityId),

    /// The engine was released
    Released,
}

impl std::fmt::Display for EngineEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineEvent::SnapshotPublished {
                connection,
                revision,
                audible,
            } => write!(
                f,
                "Snapshot r{} on {} ({} audible)",
                revision, connection, audible
            ),
            EngineEvent::CommandFailed {
                command,
                code,
                reason,
            } => write!(f, "{} failed ({}): {}", command, code, reason),
            EngineEvent::EntityRemoved(id) => write!(f, "Removed {}", id),
            EngineEvent::Released => write!(f, "Released"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_display() {
        let event = EngineEvent::SnapshotPublished {
            connection: Connection::default(),
            revision: 3,
            audible: 2,
        };
        assert_eq!(event.to_string(), "Snapshot r3 on <default> (2 audible)");

        let event = EngineEvent::CommandFailed {
            command: "SetAudioRecvRange",
            code: -2,
            reason: "range must be > 0".to_string(),
        };
        assert_eq!(
            event.to_string(),
            "SetAudioRecvRange failed (-2): range must be > 0"
        );
    }
}
