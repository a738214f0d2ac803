/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/lockstep-rust/lockstep
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
pub use crate::{
    client_to_server::{
        ClientToServerCommands, DownloadGameStateRequest, JoinGameRequest, StepsAck, StepsRequest,
    },
    serialize::{PredictedStepRun, PredictedStepRuns},
    server_to_client::{
        AuthoritativeStepRange, DownloadGameStateResponse, JoinGameAccepted, JoinGameParticipant,
        ServerToClientCommands, StepRangesHeader, StepRangesResponse,
    },
    ClientRequestId,
};
