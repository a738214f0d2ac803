/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/lockstep-rust/lockstep
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
pub use crate::{
    err::ServerError,
    game::{Game, GameStateSnapshot, Participant, REASONABLE_CATCHUP_STEPS},
    participant_connection::{
        ConnectionState, ParticipantConnection, FORCED_STEP_IN_ROW_THRESHOLD,
    },
    transport::MultiTransport,
    transport_connection::{TransportConnection, TransportConnectionPhase},
    Server, ServerSetup, DATAGRAM_DRAIN_BATCH, MAX_TRANSPORT_CONNECTIONS, UDP_MAX_SIZE,
};
