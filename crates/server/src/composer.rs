/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/lockstep-rust/lockstep
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use crate::err::ServerError;
use crate::game::Game;
use crate::participant_connection::ParticipantConnection;
use lockstep_participant::ParticipantId;
use lockstep_protocol::prelude::PredictedStepRuns;
use lockstep_steps::step::{CombinedStep, JoinedData, Step, StepOctets};
use lockstep_steps::StepId;
use log::trace;
use std::collections::HashMap;

/// Keeps the authoritative ring bounded. Clients further behind than a third
/// of the window cannot catch up via steps anyway and must be re-snapshotted.
pub(crate) fn trim_authoritative_buffer(game: &mut Game) -> Result<usize, ServerError> {
    let max_capacity = game.authoritative_steps.capacity() / 3;
    let step_count = game.authoritative_steps.len();
    if step_count <= max_capacity {
        return Ok(0);
    }
    let steps_to_drop = step_count - max_capacity;
    trace!("discarding {steps_to_drop} old authoritative steps, buffer getting full");
    game.authoritative_steps.discard_count(steps_to_drop)?;
    trace!(
        "oldest authoritative step after discard is {} with count {}",
        game.authoritative_steps.expected_read_id(),
        game.authoritative_steps.len()
    );
    Ok(steps_to_drop)
}

/// Appends the client's predicted steps to its connection's incoming ring.
///
/// Ticks already behind the ring's write head are duplicates from the
/// unreliable transport and are silently dropped. A tick beyond the write head
/// is a gap and rejected.
pub(crate) fn ingest_predicted_steps(
    connection: &mut ParticipantConnection,
    predicted_steps: &PredictedStepRuns,
    max_single_step_octet_count: usize,
) -> Result<usize, ServerError> {
    let mut tick_span = 0usize;
    for run in &predicted_steps.runs {
        if !connection.has_participant(run.participant_id) {
            return Err(ServerError::UnknownParticipant(run.participant_id));
        }
        for payload in &run.payloads {
            if payload.len() > max_single_step_octet_count {
                return Err(ServerError::SingleStepOctetCountExceeded {
                    octet_count: payload.len(),
                    maximum: max_single_step_octet_count,
                });
            }
        }
        tick_span = tick_span.max(run.delta_step_id as usize + run.payloads.len());
    }

    let mut appended = 0usize;
    for tick_offset in 0..tick_span {
        let step_id = predicted_steps.start_step_id + tick_offset as u32;
        if step_id < connection.incoming_steps.expected_write_id() {
            // Already ingested earlier; the client resends until acked.
            continue;
        }

        let mut entries: Vec<(ParticipantId, StepOctets)> = predicted_steps
            .runs
            .iter()
            .filter_map(|run| {
                let index = tick_offset.checked_sub(run.delta_step_id as usize)?;
                run.payloads
                    .get(index)
                    .map(|payload| (run.participant_id, payload.clone()))
            })
            .collect();
        entries.sort_by_key(|(participant_id, _)| *participant_id);

        let mut combined = CombinedStep::new();
        for (participant_id, payload) in entries {
            combined
                .insert(participant_id, Step::Custom(payload))
                .map_err(|_| ServerError::ParticipantIdCollision(participant_id))?;
        }
        connection.incoming_steps.append(step_id, combined)?;
        appended += 1;
    }

    connection
        .incoming_buffer_stats
        .add(connection.incoming_steps.len() as u16);
    Ok(appended)
}

impl ParticipantConnection {
    /// Takes this connection's buffered step for `step_id`, discarding any
    /// stale earlier ticks the composer has already passed.
    fn take_step_for(&mut self, step_id: StepId) -> Option<CombinedStep> {
        while let Some((front_id, _)) = self.incoming_steps.read_first() {
            if front_id < step_id {
                self.incoming_steps.pop();
            } else {
                break;
            }
        }
        match self.incoming_steps.read_first() {
            Some((front_id, _)) if front_id == step_id => {
                self.incoming_steps.pop().map(|(_, combined)| combined)
            }
            _ => None,
        }
    }
}

/// Advances the authoritative ring: one combined step per tick, one
/// contribution per participant, as long as at least one connection can
/// provide its step for the write head. Connections with nothing buffered get
/// forced steps and their forced-in-a-row counter rises; when no connection
/// can provide, the composer waits (classical lockstep).
pub(crate) fn compose_authoritative_steps(
    game: &mut Game,
    connections: &mut HashMap<u8, ParticipantConnection>,
) -> Result<u32, ServerError> {
    let mut composed_count = 0u32;

    loop {
        if game.authoritative_steps.len() >= game.authoritative_steps.capacity() {
            break;
        }
        let write_id = game.authoritative_steps.expected_write_id();

        let provider_count = connections
            .values()
            .filter(|connection| connection.incoming_steps.get(write_id).is_some())
            .count();
        if provider_count == 0 {
            if composed_count == 0 {
                trace!("can not produce authoritative step {write_id}, no one can provide it");
            }
            break;
        }

        let mut provided: HashMap<ParticipantId, Step> = HashMap::new();
        for connection in connections.values_mut() {
            match connection.take_step_for(write_id) {
                Some(combined) => {
                    connection.on_provided_step();
                    for participant_id in &connection.participant_ids {
                        let step = combined
                            .get(participant_id)
                            .cloned()
                            .unwrap_or(Step::Forced);
                        provided.insert(*participant_id, step);
                    }
                }
                None => {
                    connection.on_forced_step();
                }
            }
        }

        let participant_ids: Vec<ParticipantId> =
            game.participants().keys().copied().collect();
        let mut entries: Vec<(ParticipantId, Step)> = Vec::with_capacity(participant_ids.len());
        for participant_id in participant_ids {
            let Some(participant) = game.participant_mut(participant_id) else {
                continue;
            };
            let step = if participant.needs_join_announcement {
                participant.needs_join_announcement = false;
                Step::Joined(JoinedData {
                    participant_id,
                    step_id: write_id,
                })
            } else if participant.connection_id.is_none() {
                Step::WaitingForReconnect
            } else {
                provided.remove(&participant_id).unwrap_or(Step::Forced)
            };
            entries.push((participant_id, step));
        }
        entries.sort_by_key(|(participant_id, _)| *participant_id);

        let mut combined = CombinedStep::new();
        for (participant_id, step) in entries {
            combined
                .insert(participant_id, step)
                .map_err(|_| ServerError::ParticipantIdCollision(participant_id))?;
        }
        game.authoritative_steps.append(write_id, combined)?;
        composed_count += 1;
    }

    Ok(composed_count)
}
