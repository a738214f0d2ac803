/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/lockstep-rust/lockstep
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use lockstep_blob_stream::prelude::{OutLogicFront, TransferId};
use lockstep_ordered_datagram::{OrderedIn, OrderedOut};
use lockstep_steps::StepId;
use metricator::AggregateMetric;
use tick_id::TickId;

/// First blob channel handed out on a connection; later transfers count down
/// and wrap, so a new transfer never collides with an in-flight one.
const BLOB_STREAM_CHANNEL_START: u16 = 127;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TransportConnectionPhase {
    /// Nothing decided yet. Join and download requests are fine, step traffic
    /// is not.
    Idle,
    /// The server has decided which authoritative step id this client
    /// synchronizes from. Step traffic is legal.
    InitialStateDetermined,
    /// Locally disconnected; a client arriving on this slot starts a fresh
    /// ordered-datagram handshake.
    WaitingForReconnect,
}

/// Per-transport-slot framing and phase state.
#[derive(Debug)]
pub struct TransportConnection {
    pub id: u8,
    pub is_used: bool,
    pub ordered_in: OrderedIn,
    pub ordered_out: OrderedOut,
    pub phase: TransportConnectionPhase,
    pub next_authoritative_step_id_to_send: StepId,
    pub assigned_participant_connection: Option<u8>,
    pub out_blob_stream: Option<OutLogicFront>,
    pub blob_stream_client_request: Option<u8>,
    pub no_ranges_to_send_counter: u32,
    pub steps_behind_stats: AggregateMetric<u16>,
    next_blob_stream_channel: u16,
}

impl TransportConnection {
    #[must_use]
    pub fn new(id: u8) -> Self {
        Self {
            id,
            is_used: false,
            ordered_in: OrderedIn::default(),
            ordered_out: OrderedOut::new(),
            phase: TransportConnectionPhase::Idle,
            next_authoritative_step_id_to_send: TickId(0),
            assigned_participant_connection: None,
            out_blob_stream: None,
            blob_stream_client_request: None,
            no_ranges_to_send_counter: 0,
            steps_behind_stats: AggregateMetric::new(60).expect("stats window size"),
            next_blob_stream_channel: BLOB_STREAM_CHANNEL_START,
        }
    }

    /// Marks the slot as live and resets all per-session state.
    pub fn connect(&mut self) {
        self.is_used = true;
        self.ordered_in = OrderedIn::default();
        self.ordered_out = OrderedOut::new();
        self.phase = TransportConnectionPhase::Idle;
        self.next_authoritative_step_id_to_send = TickId(0);
        self.assigned_participant_connection = None;
        self.out_blob_stream = None;
        self.blob_stream_client_request = None;
        self.no_ranges_to_send_counter = 0;
        self.next_blob_stream_channel = BLOB_STREAM_CHANNEL_START;
    }

    /// The server has decided which authoritative step id this client will
    /// synchronize from: the ring head on join, or the snapshot's step id when
    /// a snapshot transfer starts.
    pub fn set_synchronization_point(&mut self, step_id: StepId) {
        self.phase = TransportConnectionPhase::InitialStateDetermined;
        self.next_authoritative_step_id_to_send = step_id;
    }

    /// Hands out the channel id for a new outgoing blob transfer.
    pub fn allocate_blob_stream_channel(&mut self) -> TransferId {
        let channel = self.next_blob_stream_channel;
        self.next_blob_stream_channel = if channel <= 1 {
            BLOB_STREAM_CHANNEL_START
        } else {
            channel - 1
        };
        TransferId(channel)
    }

    /// Local disconnect: the slot stays reserved for a reconnect, but the
    /// ordered-datagram handshake starts over.
    pub fn disconnect(&mut self) {
        self.phase = TransportConnectionPhase::WaitingForReconnect;
        self.ordered_in.reset();
        self.out_blob_stream = None;
        self.blob_stream_client_request = None;
    }
}
