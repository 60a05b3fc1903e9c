use crate::commands::EngineCommand;
use crate::engine::{BaseSpatialAudioEngine, LocalSpatialAudioEngine};
use crate::teams::TeamRoster;
use anyhow::anyhow;
use log::{debug, error, info, warn};
use stage_core::{Connection, EngineEvent, EntityId, Error, RtcEvent};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Drives an engine from a command queue and the RTC event stream
pub struct EngineHandler {
    /// The engine being driven, already initialized
    engine: LocalSpatialAudioEngine,
    /// Team table updated from RTC events
    roster: Arc<TeamRoster>,
    /// Channel for receiving engine commands
    command_rx: mpsc::Receiver<EngineCommand>,
    /// Channel for receiving RTC events
    rtc_rx: mpsc::Receiver<RtcEvent>,
    /// Channel for sending engine events
    event_tx: mpsc::Sender<EngineEvent>,
}

impl EngineHandler {
    /// Create a handler. The engine's team directory is replaced by `roster`.
    pub fn new(
        mut engine: LocalSpatialAudioEngine,
        roster: Arc<TeamRoster>,
        command_rx: mpsc::Receiver<EngineCommand>,
        rtc_rx: mpsc::Receiver<RtcEvent>,
        event_tx: mpsc::Sender<EngineEvent>,
    ) -> Self {
        engine.set_team_directory(roster.clone());
        Self {
            engine,
            roster,
            command_rx,
            rtc_rx,
            event_tx,
        }
    }

    pub fn engine(&self) -> &LocalSpatialAudioEngine {
        &self.engine
    }

    /// Process commands and events until shutdown or until both inputs close.
    pub async fn run(&mut self) -> Result<(), Error> {
        loop {
            tokio::select! {
                Some(command) = self.command_rx.recv() => {
                    if let EngineCommand::Shutdown = command {
                        info!("Received shutdown command, releasing engine");
                        break;
                    }

                    if let Err(e) = self.handle_command(command).await {
                        error!("Error handling engine command: {}", e);
                    }
                }

                Some(event) = self.rtc_rx.recv() => {
                    if let Err(e) = self.handle_rtc_event(event).await {
                        error!("Error handling RTC event: {}", e);
                    }
                }

                else => break,
            }
        }

        self.engine.release();
        // Nobody may be listening any more
        if self.event_tx.send(EngineEvent::Released).await.is_err() {
            debug!("Event receiver gone before release notification");
        }
        Ok(())
    }

    /// Apply one command. Rejections become `CommandFailed` events.
    async fn handle_command(&mut self, command: EngineCommand) -> Result<(), Error> {
        let name = command.name();
        let target = command.connection().cloned();

        match self.apply(command) {
            Ok(()) => match target {
                Some(connection) => self.emit_snapshot(&connection).await,
                None => self.emit_all_snapshots().await,
            },
            Err(e) => {
                warn!("{} rejected: {}", name, e);
                self.emit_event(EngineEvent::CommandFailed {
                    command: name,
                    code: e.code(),
                    reason: e.to_string(),
                })
                .await
            }
        }
    }

    fn apply(&mut self, command: EngineCommand) -> Result<(), Error> {
        let engine = &mut self.engine;
        match command {
            EngineCommand::SetMaxAudioRecvCount(count) => engine.set_max_audio_recv_count(count),
            EngineCommand::SetAudioRecvRange(range) => engine.set_audio_recv_range(range),
            EngineCommand::SetDistanceUnit(unit) => engine.set_distance_unit(unit),
            EngineCommand::UpdateSelfPosition {
                position,
                forward,
                right,
                up,
                connection,
            } => engine.update_self_position_ex(position, forward, right, up, &connection),
            EngineCommand::UpdateRemotePosition {
                uid,
                position,
                connection,
            } => engine.update_remote_position_ex(uid, position, &connection),
            EngineCommand::RemoveRemotePosition { uid, connection } => engine
                .remove_remote_position_ex(uid, &connection)
                .map(|_| ()),
            EngineCommand::ClearRemotePositions { connection } => {
                engine.clear_remote_positions_ex(&connection)
            }
            EngineCommand::UpdatePlayerPosition {
                player_id,
                position,
            } => engine.update_player_position_info(player_id, position),
            EngineCommand::SetZones(zones) => engine.set_zones(&zones),
            EngineCommand::SetRemoteAudioAttenuation {
                uid,
                attenuation,
                force_set,
            } => engine.set_remote_audio_attenuation(uid, attenuation, force_set),
            EngineCommand::SetPlayerAttenuation {
                player_id,
                attenuation,
                force_set,
            } => engine.set_player_attenuation(player_id, attenuation, force_set),
            EngineCommand::MuteLocalAudioStream(mute) => engine.mute_local_audio_stream(mute),
            EngineCommand::MuteAllRemoteAudioStreams(mute) => {
                engine.mute_all_remote_audio_streams(mute)
            }
            EngineCommand::MuteRemoteAudioStream { uid, mute } => {
                engine.mute_remote_audio_stream(uid, mute)
            }
            EngineCommand::SetParameters(params) => engine.set_parameters(&params),
            EngineCommand::Shutdown => {
                // Handled in the run loop
                Ok(())
            }
        }
    }

    /// Handle an event from the RTC engine
    async fn handle_rtc_event(&mut self, event: RtcEvent) -> Result<(), Error> {
        match event {
            RtcEvent::UserOffline { connection, uid } => {
                info!("User {} went offline on {}", uid, connection);
                if self.engine.remove_remote_position_ex(uid, &connection)? {
                    self.emit_event(EngineEvent::EntityRemoved(EntityId::User(uid)))
                        .await?;
                    self.emit_snapshot(&connection).await?;
                } else {
                    debug!("User {} had no position on {}", uid, connection);
                }
            }

            RtcEvent::TeamAssigned { uid, team } => {
                debug!("User {} assigned to team {:?}", uid, team);
                self.roster.assign(uid, team);
                self.engine.refresh_teams()?;
                self.emit_all_snapshots().await?;
            }

            RtcEvent::LocalTeamAssigned { team } => {
                debug!("Local user assigned to team {:?}", team);
                self.roster.set_local_team(team);
                self.engine.refresh_teams()?;
                self.emit_all_snapshots().await?;
            }

            RtcEvent::PlayerDestroyed { player_id } => {
                info!("Media player {} destroyed", player_id);
                if self.engine.remove_player_position(player_id)? {
                    self.emit_event(EngineEvent::EntityRemoved(EntityId::Player(player_id)))
                        .await?;
                    self.emit_snapshot(&Connection::default()).await?;
                } else {
                    debug!("Media player {} had no position", player_id);
                }
            }

            RtcEvent::LeftChannel { connection } => {
                info!("Left channel {}", connection);
                self.engine.clear_remote_positions_ex(&connection)?;
                self.emit_snapshot(&connection).await?;
            }
        }

        Ok(())
    }

    async fn emit_snapshot(&self, connection: &Connection) -> Result<(), Error> {
        let snapshot = self.engine.snapshot_ex(connection)?;
        self.emit_event(EngineEvent::SnapshotPublished {
            connection: connection.clone(),
            revision: snapshot.revision,
            audible: snapshot.len(),
        })
        .await
    }

    /// One `SnapshotPublished` per open connection, in connection order
    async fn emit_all_snapshots(&self) -> Result<(), Error> {
        let mut connections: Vec<Connection> = self.engine.connections().cloned().collect();
        connections.sort();
        for connection in &connections {
            self.emit_snapshot(connection).await?;
        }
        Ok(())
    }

    /// Emit an engine event
    async fn emit_event(&self, event: EngineEvent) -> Result<(), Error> {
        self.event_tx
            .send(event)
            .await
            .map_err(|e| Error::Other(anyhow!("Failed to send engine event: {}", e)))
    }
}
