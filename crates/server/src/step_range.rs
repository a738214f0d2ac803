/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/lockstep-rust/lockstep
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use crate::err::ServerError;
use crate::game::Game;
use crate::transport_connection::TransportConnection;
use flood_rs::prelude::OutOctetStream;
use flood_rs::Serialize;
use lockstep_protocol::serialize::combined_step_to_stream;
use lockstep_protocol::server_to_client::{
    AuthoritativeStepRange, ServerToClientCommands, StepRangesHeader, StepRangesResponse,
};
use lockstep_steps::step::CombinedStep;
use lockstep_steps::StepId;
use log::{trace, warn};

/// Upper bound for one outgoing datagram, header included.
pub const UDP_MAX_SIZE: usize = 1200;

// command octet + header + range count + range start id + range step count
const STEP_RANGES_BOOKKEEPING: usize = 1 + 6 + 1 + 4 + 1;

/// Writes the authoritative steps the client is still missing, as one
/// contiguous range bounded by the datagram budget.
///
/// Writes nothing when the client has fallen off the back of the ring (it
/// needs a snapshot download instead) or when there is nothing new to send;
/// the caller suppresses header-only datagrams.
pub(crate) fn write_step_ranges(
    out_stream: &mut OutOctetStream,
    transport_connection: &mut TransportConnection,
    game: &Game,
    client_waiting_for_step_id: StepId,
    connection_buffer_count: u8,
) -> Result<(), ServerError> {
    let authoritative_steps = &game.authoritative_steps;

    if client_waiting_for_step_id < authoritative_steps.expected_read_id() {
        warn!(
            "connection {} fell off the authoritative ring: waiting for {} but oldest stored is {}. needs a game state download",
            transport_connection.id,
            client_waiting_for_step_id,
            authoritative_steps.expected_read_id()
        );
        return Ok(());
    }

    let steps_behind = i64::from(authoritative_steps.expected_write_id().0)
        - i64::from(client_waiting_for_step_id.0);
    transport_connection
        .steps_behind_stats
        .add(steps_behind.clamp(0, i64::from(u16::MAX)) as u16);

    let mut start_step_id = transport_connection.next_authoritative_step_id_to_send;
    if client_waiting_for_step_id > start_step_id {
        start_step_id = client_waiting_for_step_id;
    }
    if start_step_id >= authoritative_steps.expected_write_id() {
        transport_connection.no_ranges_to_send_counter += 1;
        trace!(
            "connection {} has no authoritative steps to receive (next:{})",
            transport_connection.id,
            start_step_id
        );
        return Ok(());
    }

    let budget = UDP_MAX_SIZE
        .saturating_sub(out_stream.octets_ref().len())
        .saturating_sub(STEP_RANGES_BOOKKEEPING);

    let mut packed_octet_count = 0usize;
    let mut steps: Vec<CombinedStep> = Vec::new();
    for (_, combined_step) in authoritative_steps.iter_from(start_step_id) {
        let mut step_stream = OutOctetStream::new();
        combined_step_to_stream(combined_step, &mut step_stream)?;
        if packed_octet_count + step_stream.octets_ref().len() > budget
            || steps.len() == usize::from(u8::MAX)
        {
            break;
        }
        packed_octet_count += step_stream.octets_ref().len();
        steps.push(combined_step.clone());
    }
    if steps.is_empty() {
        transport_connection.no_ranges_to_send_counter += 1;
        return Ok(());
    }
    let packed_count = steps.len();

    let response = StepRangesResponse {
        header: StepRangesHeader {
            connection_buffer_count,
            steps_behind: steps_behind.clamp(i64::from(i8::MIN), i64::from(i8::MAX)) as i8,
            next_authoritative_step_id: authoritative_steps.expected_write_id(),
        },
        ranges: vec![AuthoritativeStepRange {
            start_step_id,
            steps,
        }],
    };
    ServerToClientCommands::StepRanges(response).serialize(out_stream)?;

    transport_connection.next_authoritative_step_id_to_send = start_step_id + packed_count as u32;
    trace!(
        "sent {} authoritative steps from {} to connection {}",
        packed_count,
        start_step_id,
        transport_connection.id
    );

    Ok(())
}
