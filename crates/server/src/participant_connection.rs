/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/lockstep-rust/lockstep
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use lockstep_participant::ParticipantId;
use lockstep_steps::step::CombinedStep;
use lockstep_steps::{StepId, StepRing};
use metricator::AggregateMetric;

/// Consecutive forced steps a connection may accumulate before it is
/// considered unresponsive.
pub const FORCED_STEP_IN_ROW_THRESHOLD: u32 = 10;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ConnectionState {
    Responsive,
    Unresponsive,
}

/// One client's logical session: the participants it controls and the ring of
/// predicted steps it has sent ahead of the authoritative head.
#[derive(Debug)]
pub struct ParticipantConnection {
    pub id: u8,
    pub transport_connection_id: u8,
    /// Predicted steps, one [`CombinedStep`] per tick covering this
    /// connection's participants.
    pub incoming_steps: StepRing<CombinedStep>,
    pub participant_ids: Vec<ParticipantId>,
    pub forced_step_in_row_counter: u32,
    pub state: ConnectionState,
    pub incoming_buffer_stats: AggregateMetric<u16>,
}

impl ParticipantConnection {
    /// The incoming ring starts at the current authoritative write head, so
    /// the first predicted step the client sends must match it.
    #[must_use]
    pub fn new(
        id: u8,
        transport_connection_id: u8,
        latest_authoritative_step_id: StepId,
        participant_ids: Vec<ParticipantId>,
    ) -> Self {
        Self {
            id,
            transport_connection_id,
            incoming_steps: StepRing::new(latest_authoritative_step_id),
            participant_ids,
            forced_step_in_row_counter: 0,
            state: ConnectionState::Responsive,
            incoming_buffer_stats: AggregateMetric::new(60).expect("stats window size"),
        }
    }

    #[must_use]
    pub fn has_participant(&self, participant_id: ParticipantId) -> bool {
        self.participant_ids.iter().any(|id| *id == participant_id)
    }

    /// Called when the composer had to synthesize a forced step because this
    /// connection had nothing buffered for the tick.
    pub fn on_forced_step(&mut self) {
        self.forced_step_in_row_counter += 1;
        if self.forced_step_in_row_counter > FORCED_STEP_IN_ROW_THRESHOLD {
            self.state = ConnectionState::Unresponsive;
        }
    }

    /// Called when the composer consumed a buffered step from this connection.
    pub fn on_provided_step(&mut self) {
        self.forced_step_in_row_counter = 0;
        self.state = ConnectionState::Responsive;
    }
}
