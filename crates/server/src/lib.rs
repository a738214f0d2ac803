/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/lockstep-rust/lockstep
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */

/*!
# Lockstep Server

The authoritative step server for deterministic lockstep games. Clients send
predicted input steps for the participants they control; the server merges
them into a single totally-ordered authoritative step stream and sends every
client the steps it is still missing. Latecomers bootstrap from the latest
game-state snapshot, transferred as a blob stream.

The server is driven from a single thread by [`Server::update`] and never
interprets a step payload octet.
*/

mod composer;
pub mod err;
pub mod game;
pub mod participant_connection;
pub mod prelude;
mod step_range;
pub mod transport;
pub mod transport_connection;

use crate::err::ServerError;
use crate::game::Game;
use crate::participant_connection::ParticipantConnection;
use crate::transport::MultiTransport;
use crate::transport_connection::{TransportConnection, TransportConnectionPhase};
use datagram_chunker::serialize_to_datagrams;
use err_rs::{ErrorLevel, ErrorLevelProvider};
use flood_rs::prelude::{InOctetStream, OutOctetStream};
use flood_rs::{ReadOctetStream, Serialize, WriteOctetStream};
use freelist_rs::FreeList;
use hexify::format_hex;
use lockstep_blob_stream::prelude::{OutLogicFront, ReceiverToSenderFrontCommands};
use lockstep_ordered_datagram::{DatagramOrderInError, ORDERED_DATAGRAM_HEADER_SIZE};
use lockstep_protocol::client_to_server::{
    ClientToServerCommand, DownloadGameStateRequest, JoinGameRequest, StepsRequest,
};
use lockstep_protocol::server_to_client::{
    DownloadGameStateResponse, JoinGameAccepted, JoinGameParticipant, ServerToClientCommands,
};
use lockstep_steps::step::MAX_SINGLE_STEP_OCTET_COUNT;
use lockstep_steps::StepId;
use log::{debug, error, trace, warn};
use metricator::RateMetric;
use monotonic_time_rs::{Millis, MillisDuration};
use std::collections::HashMap;

pub use crate::step_range::UDP_MAX_SIZE;

/// Hard limit on transport slots; the configured count may be lower.
pub const MAX_TRANSPORT_CONNECTIONS: usize = 64;

/// Datagrams drained from the transport per [`Server::update`] call, bounding
/// the work done in one tick.
pub const DATAGRAM_DRAIN_BATCH: usize = 32;

const BLOB_STREAM_CHUNK_SIZE: u16 = 1024;
const BLOB_STREAM_RESEND_MILLIS: u64 = 32 * 3;
const STATS_OUTPUT_EVERY_UPDATE: u64 = 3000;

/// Flat configuration record. No hidden defaults, no mutation after init.
pub struct ServerSetup {
    pub application_version: app_version::Version,
    pub max_connection_count: usize,
    pub max_participant_count: usize,
    pub max_participant_count_for_each_connection: usize,
    pub max_single_participant_step_octet_count: usize,
    pub max_game_state_octet_count: usize,
    pub now: Millis,
}

/// The server aggregate: one game, the transport slot table and the
/// participant connection pool. All mutable state lives here.
pub struct Server {
    setup: ServerSetup,
    game: Game,
    transport_connections: Vec<TransportConnection>,
    participant_connections: HashMap<u8, ParticipantConnection>,
    participant_connection_ids: FreeList<u8>,
    authoritative_steps_per_second: RateMetric,
    stats_counter: u64,
}

impl Server {
    /// Validates the setup and creates an empty server. Limit violations are
    /// fatal to this call.
    pub fn new(setup: ServerSetup) -> Result<Self, ServerError> {
        if setup.max_connection_count > MAX_TRANSPORT_CONNECTIONS {
            return Err(ServerError::MaxConnectionCountTooHigh {
                requested: setup.max_connection_count,
                maximum: MAX_TRANSPORT_CONNECTIONS,
            });
        }
        if setup.max_participant_count > MAX_TRANSPORT_CONNECTIONS {
            return Err(ServerError::MaxParticipantCountTooHigh {
                requested: setup.max_participant_count,
                maximum: MAX_TRANSPORT_CONNECTIONS,
            });
        }
        if setup.max_single_participant_step_octet_count > MAX_SINGLE_STEP_OCTET_COUNT {
            return Err(ServerError::MaxSingleStepOctetCountTooHigh {
                requested: setup.max_single_participant_step_octet_count,
                maximum: MAX_SINGLE_STEP_OCTET_COUNT,
            });
        }
        if setup.max_game_state_octet_count > game::MAX_GAME_STATE_OCTET_COUNT {
            return Err(ServerError::GameStateOctetCountTooLarge {
                requested: setup.max_game_state_octet_count,
                maximum: game::MAX_GAME_STATE_OCTET_COUNT,
            });
        }

        debug!(
            "starting lockstep server, application version {}.{}.{}",
            setup.application_version.major(),
            setup.application_version.minor(),
            setup.application_version.patch()
        );

        let transport_connections = (0..setup.max_connection_count)
            .map(|index| TransportConnection::new(index as u8))
            .collect();
        let game = Game::new(setup.max_participant_count, setup.max_game_state_octet_count);
        let participant_connection_ids = FreeList::new(setup.max_connection_count);
        let authoritative_steps_per_second = RateMetric::with_interval(setup.now, 0.1);

        Ok(Self {
            setup,
            game,
            transport_connections,
            participant_connections: HashMap::new(),
            participant_connection_ids,
            authoritative_steps_per_second,
            stats_counter: 0,
        })
    }

    /// Restarts the game from a snapshot, dropping all participant
    /// connections. Equivalent to a fresh server with the snapshot preloaded.
    pub fn re_init_with_game(
        &mut self,
        game_state: &[u8],
        step_id: StepId,
        now: Millis,
    ) -> Result<(), ServerError> {
        self.game.re_init(step_id, game_state)?;
        self.participant_connections.clear();
        self.participant_connection_ids = FreeList::new(self.setup.max_connection_count);
        self.authoritative_steps_per_second = RateMetric::with_interval(now, 0.1);
        self.stats_counter = 0;
        Ok(())
    }

    pub fn set_game_state(&mut self, step_id: StepId, octets: &[u8]) -> Result<(), ServerError> {
        self.game.set_game_state(step_id, octets)
    }

    /// True when the host application should push a fresh snapshot so joiners
    /// do not have to replay an excessive step history.
    #[must_use]
    pub fn must_provide_game_state(&self) -> bool {
        self.game.must_provide_game_state()
    }

    #[must_use]
    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn game_mut(&mut self) -> &mut Game {
        &mut self.game
    }

    #[must_use]
    pub fn transport_connection(&self, connection_index: u8) -> Option<&TransportConnection> {
        self.transport_connections.get(connection_index as usize)
    }

    /// The participant connection currently assigned to a transport slot.
    #[must_use]
    pub fn participant_connection_for(
        &self,
        connection_index: u8,
    ) -> Option<&ParticipantConnection> {
        let assigned = self
            .transport_connections
            .get(connection_index as usize)?
            .assigned_participant_connection?;
        self.participant_connections.get(&assigned)
    }

    /// Notifies the server that a transport slot came alive. Also triggered
    /// implicitly when a datagram arrives on an unused slot.
    pub fn connection_connected(&mut self, connection_index: u8) -> Result<(), ServerError> {
        self.check_connection_index(connection_index)?;
        let transport_connection = &mut self.transport_connections[connection_index as usize];
        if transport_connection.is_used {
            warn!("connection {connection_index} already connected");
            return Err(ServerError::ConnectionAlreadyConnected(connection_index));
        }
        debug!("connection {connection_index} connected");
        transport_connection.connect();
        Ok(())
    }

    /// Notifies the server that a transport slot went away. The slot is kept
    /// for a reconnect; the participant connection is freed.
    pub fn connection_disconnected(&mut self, connection_index: u8) -> Result<(), ServerError> {
        self.check_connection_index(connection_index)?;
        let assigned = self.transport_connections[connection_index as usize]
            .assigned_participant_connection;
        let Some(participant_connection_id) = assigned else {
            return Err(ServerError::ConnectionNotFound(connection_index));
        };
        if self
            .participant_connections
            .remove(&participant_connection_id)
            .is_none()
        {
            return Err(ServerError::ConnectionAlreadyFreed(connection_index));
        }
        self.participant_connection_ids
            .free(participant_connection_id)
            .map_err(|error| ServerError::FreeListError {
                connection_index,
                error,
            })?;
        self.game
            .detach_participants_for_connection(participant_connection_id);
        self.transport_connections[connection_index as usize].disconnect();
        debug!("connection {connection_index} disconnected");
        Ok(())
    }

    /// Drops all connections but keeps the game.
    pub fn reset(&mut self) {
        self.participant_connections.clear();
        self.participant_connection_ids = FreeList::new(self.setup.max_connection_count);
        for transport_connection in &mut self.transport_connections {
            *transport_connection = TransportConnection::new(transport_connection.id);
        }
    }

    /// Drains pending datagrams from the transport and replies. Bounded work:
    /// at most [`DATAGRAM_DRAIN_BATCH`] datagrams per call.
    pub fn update(
        &mut self,
        now: Millis,
        transport: &mut impl MultiTransport,
    ) -> Result<(), ServerError> {
        let mut datagram = [0u8; UDP_MAX_SIZE];
        for _ in 0..DATAGRAM_DRAIN_BATCH {
            let received = transport
                .receive(&mut datagram)
                .map_err(ServerError::TransportError)?;
            let Some((connection_index, octet_count)) = received else {
                break;
            };
            if octet_count == 0 {
                break;
            }

            let slot_unused = self
                .transport_connections
                .get(connection_index as usize)
                .map_or(false, |transport_connection| !transport_connection.is_used);
            if slot_unused {
                self.connection_connected(connection_index)?;
            }

            match self.feed(connection_index, &datagram[..octet_count], now) {
                Ok(replies) => {
                    for reply in &replies {
                        transport
                            .send_to(connection_index, reply)
                            .map_err(ServerError::TransportError)?;
                    }
                }
                Err(err) if matches!(err.error_level(), ErrorLevel::Critical) => {
                    error!("feed failed for connection {connection_index}: {err}");
                    return Err(err);
                }
                Err(err) => {
                    warn!(
                        "dropping datagram from connection {connection_index}: {err} (code {})",
                        err.code()
                    );
                }
            }
        }

        self.authoritative_steps_per_second.update(now);
        self.stats_counter += 1;
        if self.stats_counter % STATS_OUTPUT_EVERY_UPDATE == 0 {
            debug!(
                "composed steps: {:.1} steps/s",
                self.authoritative_steps_per_second.rate()
            );
        }
        Ok(())
    }

    /// Handles one inbound datagram for a transport slot and returns the reply
    /// datagrams to send back. Exposed so embedders and tests can drive the
    /// server without a transport.
    pub fn feed(
        &mut self,
        connection_index: u8,
        datagram: &[u8],
        now: Millis,
    ) -> Result<Vec<Vec<u8>>, ServerError> {
        trace!(
            "feed connection {connection_index} octet_count {}:\n{}",
            datagram.len(),
            format_hex(datagram)
        );
        self.check_connection_index(connection_index)?;

        let mut in_stream = InOctetStream::new(datagram);
        {
            let transport_connection = &mut self.transport_connections[connection_index as usize];
            match transport_connection
                .ordered_in
                .read_and_verify(&mut in_stream)
            {
                Ok(dropped) => {
                    if dropped.inner() > 0 {
                        trace!(
                            "connection {connection_index}: {} datagrams were lost or reordered",
                            dropped.inner()
                        );
                    }
                }
                Err(DatagramOrderInError::WrongOrder { expected, received }) => {
                    warn!(
                        "connection {connection_index}: dropping out-of-order datagram {received}, expected {expected}"
                    );
                    return Ok(Vec::new());
                }
                Err(DatagramOrderInError::IoError(err)) => return Err(ServerError::IoError(err)),
            }
        }

        let command_value = in_stream.read_u8()?;
        let Ok(command) = ClientToServerCommand::try_from(command_value) else {
            warn!("unknown command 0x{command_value:02X} from connection {connection_index}, ignoring");
            return Ok(Vec::new());
        };

        let mut out_stream = OutOctetStream::new();
        self.transport_connections[connection_index as usize]
            .ordered_out
            .to_stream(&mut out_stream)?;

        match command {
            ClientToServerCommand::DownloadGameStateStatus => {
                // Special case: a game state ack can cause several reply
                // datagrams from the blob stream, bypassing the single-reply
                // framing below.
                let status = ReceiverToSenderFrontCommands::from_stream(&mut in_stream)?;
                self.ensure_datagram_consumed(&mut in_stream, command_value)?;
                let commands =
                    self.on_download_game_state_status(connection_index, &status, now)?;
                return self.frame_blob_reply_datagrams(connection_index, commands);
            }
            ClientToServerCommand::JoinGame => {
                let request = JoinGameRequest::from_stream(&mut in_stream)?;
                self.on_join_game(connection_index, &request, &mut out_stream)?;
            }
            ClientToServerCommand::GameStep => {
                let request = StepsRequest::from_stream(&mut in_stream)?;
                self.on_game_step(connection_index, &request, &mut out_stream)?;
            }
            ClientToServerCommand::DownloadGameState => {
                let request = DownloadGameStateRequest::from_stream(&mut in_stream)?;
                self.on_download_game_state(connection_index, &request, now, &mut out_stream)?;
            }
        }

        self.ensure_datagram_consumed(&mut in_stream, command_value)?;

        if out_stream.octets_ref().len() <= ORDERED_DATAGRAM_HEADER_SIZE {
            trace!("connection {connection_index}: nothing to reply");
            return Ok(Vec::new());
        }

        self.transport_connections[connection_index as usize]
            .ordered_out
            .commit();
        Ok(vec![out_stream.octets_ref().to_vec()])
    }

    fn check_connection_index(&self, connection_index: u8) -> Result<(), ServerError> {
        if connection_index as usize >= self.transport_connections.len() {
            warn!("illegal connection index: {connection_index}");
            return Err(ServerError::IllegalConnectionIndex {
                connection_index,
                capacity: self.transport_connections.len(),
            });
        }
        Ok(())
    }

    fn ensure_datagram_consumed(
        &self,
        in_stream: &mut InOctetStream,
        command_value: u8,
    ) -> Result<(), ServerError> {
        if in_stream.has_reached_end() {
            Ok(())
        } else {
            error!("not everything was read from datagram for command 0x{command_value:02X}");
            Err(ServerError::LeftoverOctetsInDatagram)
        }
    }

    fn on_join_game(
        &mut self,
        connection_index: u8,
        request: &JoinGameRequest,
        out_stream: &mut OutOctetStream,
    ) -> Result<(), ServerError> {
        debug!("join request from connection {connection_index}: {request:?}");
        if request.local_player_indices.is_empty() {
            return Err(ServerError::JoinWithoutLocalPlayers);
        }
        if request.local_player_indices.len() > self.setup.max_participant_count_for_each_connection
        {
            return Err(ServerError::TooManyLocalPlayers {
                requested: request.local_player_indices.len(),
                maximum: self.setup.max_participant_count_for_each_connection,
            });
        }
        if self.game.latest_snapshot().is_none() {
            // The first joiner needs a state to start from.
            return Err(ServerError::NoGameStateAvailable);
        }

        let existing_id = self.transport_connections[connection_index as usize]
            .assigned_participant_connection
            .filter(|id| self.participant_connections.contains_key(id));

        let participants: Vec<JoinGameParticipant> = match existing_id {
            Some(participant_connection_id) => {
                // The join datagram was resent; answer with what was assigned.
                let connection = self
                    .participant_connections
                    .get(&participant_connection_id)
                    .ok_or(ServerError::NoParticipantConnection(connection_index))?;
                connection
                    .participant_ids
                    .iter()
                    .map(|participant_id| JoinGameParticipant {
                        local_index: self
                            .game
                            .participants()
                            .get(participant_id)
                            .map_or(0, |participant| participant.local_index),
                        participant_id: *participant_id,
                    })
                    .collect()
            }
            None => {
                let participant_connection_id = self
                    .participant_connection_ids
                    .allocate()
                    .ok_or(ServerError::NoFreeParticipantConnectionSlots)?;
                let created = match self
                    .game
                    .create_participants(&request.local_player_indices, participant_connection_id)
                {
                    Ok(created) => created,
                    Err(err) => {
                        let _ = self
                            .participant_connection_ids
                            .free(participant_connection_id);
                        return Err(err);
                    }
                };
                let latest_authoritative_step_id = self.game.authoritative_steps.expected_write_id();
                let connection = ParticipantConnection::new(
                    participant_connection_id,
                    connection_index,
                    latest_authoritative_step_id,
                    created.iter().map(|(_, participant_id)| *participant_id).collect(),
                );
                self.participant_connections
                    .insert(participant_connection_id, connection);

                let transport_connection =
                    &mut self.transport_connections[connection_index as usize];
                transport_connection.assigned_participant_connection =
                    Some(participant_connection_id);
                transport_connection.set_synchronization_point(latest_authoritative_step_id);

                debug!(
                    "connection {connection_index} joined from {latest_authoritative_step_id} with {} participants",
                    created.len()
                );
                created
                    .into_iter()
                    .map(|(local_index, participant_id)| JoinGameParticipant {
                        local_index,
                        participant_id,
                    })
                    .collect()
            }
        };

        let accepted = JoinGameAccepted {
            client_request_id: request.client_request_id,
            participants,
        };
        ServerToClientCommands::JoinGame(accepted).serialize(out_stream)?;
        Ok(())
    }

    fn on_game_step(
        &mut self,
        connection_index: u8,
        request: &StepsRequest,
        out_stream: &mut OutOctetStream,
    ) -> Result<(), ServerError> {
        trace!("incoming predicted steps from connection {connection_index}: {request}");
        let transport_connection = &self.transport_connections[connection_index as usize];
        if transport_connection.phase != TransportConnectionPhase::InitialStateDetermined {
            return Err(ServerError::StepTrafficBeforeSynchronization(
                connection_index,
            ));
        }
        let participant_connection_id = transport_connection
            .assigned_participant_connection
            .ok_or(ServerError::NoParticipantConnection(connection_index))?;

        composer::trim_authoritative_buffer(&mut self.game)?;

        let participant_connection = self
            .participant_connections
            .get_mut(&participant_connection_id)
            .ok_or(ServerError::NoParticipantConnection(connection_index))?;
        composer::ingest_predicted_steps(
            participant_connection,
            &request.predicted_steps,
            self.setup.max_single_participant_step_octet_count,
        )?;

        let composed_count = if self.game.debug_frozen {
            0
        } else {
            composer::compose_authoritative_steps(&mut self.game, &mut self.participant_connections)?
        };
        self.authoritative_steps_per_second.add(composed_count);

        let connection_buffer_count = self
            .participant_connections
            .get(&participant_connection_id)
            .map_or(0, |connection| {
                connection.incoming_steps.len().min(usize::from(u8::MAX)) as u8
            });
        step_range::write_step_ranges(
            out_stream,
            &mut self.transport_connections[connection_index as usize],
            &self.game,
            request.ack.waiting_for_step_id,
            connection_buffer_count,
        )?;
        Ok(())
    }

    fn on_download_game_state(
        &mut self,
        connection_index: u8,
        request: &DownloadGameStateRequest,
        now: Millis,
        out_stream: &mut OutOctetStream,
    ) -> Result<(), ServerError> {
        debug!("connection {connection_index} requested game state download {request:?}");
        let snapshot = self
            .game
            .latest_snapshot()
            .ok_or(ServerError::NoGameStateAvailable)?;
        let transport_connection = &mut self.transport_connections[connection_index as usize];

        let is_new_request = transport_connection.blob_stream_client_request
            != Some(request.request_id)
            || transport_connection.out_blob_stream.is_none();
        if is_new_request {
            let channel = transport_connection.allocate_blob_stream_channel();
            transport_connection.out_blob_stream = Some(OutLogicFront::new(
                channel,
                BLOB_STREAM_CHUNK_SIZE,
                MillisDuration::from_millis(BLOB_STREAM_RESEND_MILLIS),
                &snapshot.octets,
            )?);
            transport_connection.blob_stream_client_request = Some(request.request_id);
            transport_connection.set_synchronization_point(snapshot.step_id);
            debug!(
                "connection {connection_index} downloads game state for {} on {channel}",
                snapshot.step_id
            );
        }

        let blob_stream = transport_connection
            .out_blob_stream
            .as_mut()
            .ok_or(ServerError::NoDownloadInProgress)?;
        let response = DownloadGameStateResponse {
            client_request: request.request_id,
            step_id: snapshot.step_id,
            blob_stream_channel: blob_stream.transfer_id().0,
            octet_count: snapshot.octets.len() as u32,
        };
        ServerToClientCommands::DownloadGameState(response).serialize(out_stream)?;

        // Datagram loss is rare on most transports, so the first blob commands
        // ride along with the response.
        for command in blob_stream.send(now) {
            ServerToClientCommands::BlobStreamChannel(command).serialize(out_stream)?;
        }
        Ok(())
    }

    fn on_download_game_state_status(
        &mut self,
        connection_index: u8,
        status: &ReceiverToSenderFrontCommands,
        now: Millis,
    ) -> Result<Vec<ServerToClientCommands>, ServerError> {
        let transport_connection = &mut self.transport_connections[connection_index as usize];
        let blob_stream = transport_connection
            .out_blob_stream
            .as_mut()
            .ok_or(ServerError::NoDownloadInProgress)?;
        blob_stream.receive(status)?;
        Ok(blob_stream
            .send(now)
            .into_iter()
            .map(ServerToClientCommands::BlobStreamChannel)
            .collect())
    }

    fn frame_blob_reply_datagrams(
        &mut self,
        connection_index: u8,
        commands: Vec<ServerToClientCommands>,
    ) -> Result<Vec<Vec<u8>>, ServerError> {
        let bodies = serialize_to_datagrams(&commands, UDP_MAX_SIZE - ORDERED_DATAGRAM_HEADER_SIZE)?;
        let transport_connection = &mut self.transport_connections[connection_index as usize];
        let mut datagrams = Vec::with_capacity(bodies.len());
        for body in bodies {
            let mut out_stream = OutOctetStream::new();
            transport_connection.ordered_out.to_stream(&mut out_stream)?;
            out_stream.write(body.as_slice())?;
            transport_connection.ordered_out.commit();
            datagrams.push(out_stream.octets_ref().to_vec());
        }
        Ok(datagrams)
    }
}
