/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/lockstep-rust/lockstep
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use flood_rs::prelude::{InOctetStream, OutOctetStream};
use flood_rs::{Deserialize, ReadOctetStream, Serialize};
use lockstep_ordered_datagram::{OrderedOut, ORDERED_DATAGRAM_HEADER_SIZE};
use lockstep_participant::ParticipantId;
use lockstep_protocol::prelude::*;
use lockstep_server::prelude::*;
use lockstep_steps::step::StepOctets;
use monotonic_time_rs::Millis;
use std::collections::VecDeque;
use std::io;
use tick_id::TickId;

pub fn small_setup(max_connection_count: usize, max_participant_count: usize) -> ServerSetup {
    ServerSetup {
        application_version: app_version::Version::new(0, 1, 0),
        max_connection_count,
        max_participant_count,
        max_participant_count_for_each_connection: 2,
        max_single_participant_step_octet_count: 4,
        max_game_state_octet_count: 1024,
        now: Millis::from(0),
    }
}

/// Client side of one transport slot: frames commands the way a real client
/// would, with its own ordered-datagram sequence.
pub struct ClientSession {
    ordered_out: OrderedOut,
}

impl ClientSession {
    pub fn new() -> Self {
        Self {
            ordered_out: OrderedOut::new(),
        }
    }

    pub fn datagram(&mut self, command: &ClientToServerCommands) -> Vec<u8> {
        let mut out_stream = OutOctetStream::new();
        self.ordered_out
            .to_stream(&mut out_stream)
            .expect("write ordered header");
        command.serialize(&mut out_stream).expect("serialize command");
        self.ordered_out.commit();
        out_stream.octets_ref().to_vec()
    }

    pub fn join(&mut self, request_id: u8, local_player_indices: &[u8]) -> Vec<u8> {
        self.datagram(&ClientToServerCommands::JoinGame(JoinGameRequest {
            client_request_id: ClientRequestId(request_id),
            local_player_indices: local_player_indices.to_vec(),
        }))
    }

    pub fn steps(
        &mut self,
        waiting_for: u32,
        start: u32,
        participant_id: u8,
        payloads: &[&[u8]],
    ) -> Vec<u8> {
        let runs = if payloads.is_empty() {
            Vec::new()
        } else {
            vec![PredictedStepRun {
                participant_id: ParticipantId(participant_id),
                delta_step_id: 0,
                payloads: payloads
                    .iter()
                    .map(|payload| StepOctets(payload.to_vec()))
                    .collect(),
            }]
        };
        self.datagram(&ClientToServerCommands::GameStep(StepsRequest {
            ack: StepsAck {
                waiting_for_step_id: TickId(waiting_for),
            },
            predicted_steps: PredictedStepRuns {
                start_step_id: TickId(start),
                runs,
            },
        }))
    }
}

/// Parses a server reply datagram into its commands (the body may carry more
/// than one).
pub fn parse_reply(datagram: &[u8]) -> Vec<ServerToClientCommands> {
    let mut in_stream = InOctetStream::new(&datagram[ORDERED_DATAGRAM_HEADER_SIZE..]);
    let mut commands = Vec::new();
    while !in_stream.has_reached_end() {
        commands.push(ServerToClientCommands::deserialize(&mut in_stream).expect("parse reply"));
    }
    commands
}

/// In-memory transport: tests push datagrams into `incoming` and inspect
/// everything the server sent in `sent`.
#[derive(Default)]
pub struct TestTransport {
    pub incoming: VecDeque<(u8, Vec<u8>)>,
    pub sent: Vec<(u8, Vec<u8>)>,
}

impl TestTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MultiTransport for TestTransport {
    fn receive(&mut self, buf: &mut [u8]) -> io::Result<Option<(u8, usize)>> {
        match self.incoming.pop_front() {
            None => Ok(None),
            Some((connection_index, payload)) => {
                buf[..payload.len()].copy_from_slice(&payload);
                Ok(Some((connection_index, payload.len())))
            }
        }
    }

    fn send_to(&mut self, connection_index: u8, payload: &[u8]) -> io::Result<()> {
        self.sent.push((connection_index, payload.to_vec()));
        Ok(())
    }
}
