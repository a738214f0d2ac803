/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/lockstep-rust/lockstep
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use crate::serialize::{step_id_from_stream, step_id_to_stream, PredictedStepRuns};
use crate::ClientRequestId;
use flood_rs::{Deserialize, ReadOctetStream, Serialize, WriteOctetStream};
use io::ErrorKind;
use lockstep_blob_stream::prelude::ReceiverToSenderFrontCommands;
use lockstep_steps::StepId;
use std::fmt::{self, Display};
use std::io;

#[repr(u8)]
pub enum ClientToServerCommand {
    JoinGame = 0x01,
    GameStep = 0x02,
    DownloadGameState = 0x03,
    DownloadGameStateStatus = 0x04,
}

impl TryFrom<u8> for ClientToServerCommand {
    type Error = io::Error;

    fn try_from(value: u8) -> io::Result<Self> {
        Ok(match value {
            0x01 => Self::JoinGame,
            0x02 => Self::GameStep,
            0x03 => Self::DownloadGameState,
            0x04 => Self::DownloadGameStateStatus,
            _ => Err(io::Error::new(
                ErrorKind::InvalidData,
                format!("unknown client to server command 0x{value:02X}"),
            ))?,
        })
    }
}

/// Request to add local players on this connection as game participants.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct JoinGameRequest {
    pub client_request_id: ClientRequestId,
    pub local_player_indices: Vec<u8>,
}

impl JoinGameRequest {
    pub fn to_stream(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        self.client_request_id.serialize(stream)?;
        stream.write_u8(self.local_player_indices.len() as u8)?;
        for local_index in &self.local_player_indices {
            stream.write_u8(*local_index)?;
        }
        Ok(())
    }

    pub fn from_stream(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        let client_request_id = ClientRequestId::deserialize(stream)?;
        let count = stream.read_u8()? as usize;
        let mut local_player_indices = Vec::with_capacity(count);
        for _ in 0..count {
            local_player_indices.push(stream.read_u8()?);
        }
        Ok(Self {
            client_request_id,
            local_player_indices,
        })
    }
}

/// The oldest authoritative step the client is still waiting for.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct StepsAck {
    pub waiting_for_step_id: StepId,
}

impl Display for StepsAck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "waiting:{}", self.waiting_for_step_id)
    }
}

impl StepsAck {
    pub fn to_stream(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        step_id_to_stream(self.waiting_for_step_id, stream)
    }

    pub fn from_stream(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        Ok(Self {
            waiting_for_step_id: step_id_from_stream(stream)?,
        })
    }
}

/// Predicted input steps plus the ack that drives the step-range reply.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct StepsRequest {
    pub ack: StepsAck,
    pub predicted_steps: PredictedStepRuns,
}

impl Display for StepsRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "steps {} predicted:{}", self.ack, self.predicted_steps)
    }
}

impl StepsRequest {
    pub fn to_stream(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        self.ack.to_stream(stream)?;
        self.predicted_steps.serialize(stream)
    }

    pub fn from_stream(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        Ok(Self {
            ack: StepsAck::from_stream(stream)?,
            predicted_steps: PredictedStepRuns::deserialize(stream)?,
        })
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct DownloadGameStateRequest {
    pub request_id: u8,
}

impl DownloadGameStateRequest {
    pub fn to_stream(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        stream.write_u8(self.request_id)
    }

    pub fn from_stream(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        Ok(Self {
            request_id: stream.read_u8()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientToServerCommands {
    JoinGame(JoinGameRequest),
    GameStep(StepsRequest),
    DownloadGameState(DownloadGameStateRequest),
    DownloadGameStateStatus(ReceiverToSenderFrontCommands),
}

impl From<&ClientToServerCommands> for u8 {
    fn from(command: &ClientToServerCommands) -> Self {
        match command {
            ClientToServerCommands::JoinGame(_) => ClientToServerCommand::JoinGame as u8,
            ClientToServerCommands::GameStep(_) => ClientToServerCommand::GameStep as u8,
            ClientToServerCommands::DownloadGameState(_) => {
                ClientToServerCommand::DownloadGameState as u8
            }
            ClientToServerCommands::DownloadGameStateStatus(_) => {
                ClientToServerCommand::DownloadGameStateStatus as u8
            }
        }
    }
}

impl Serialize for ClientToServerCommands {
    fn serialize(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        stream.write_u8(self.into())?;
        match self {
            Self::JoinGame(join_game_request) => join_game_request.to_stream(stream),
            Self::GameStep(steps_request) => steps_request.to_stream(stream),
            Self::DownloadGameState(download_request) => download_request.to_stream(stream),
            Self::DownloadGameStateStatus(status) => status.to_stream(stream),
        }
    }
}

impl Deserialize for ClientToServerCommands {
    fn deserialize(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        let command_value = stream.read_u8()?;
        Ok(match ClientToServerCommand::try_from(command_value)? {
            ClientToServerCommand::JoinGame => Self::JoinGame(JoinGameRequest::from_stream(stream)?),
            ClientToServerCommand::GameStep => Self::GameStep(StepsRequest::from_stream(stream)?),
            ClientToServerCommand::DownloadGameState => {
                Self::DownloadGameState(DownloadGameStateRequest::from_stream(stream)?)
            }
            ClientToServerCommand::DownloadGameStateStatus => {
                Self::DownloadGameStateStatus(ReceiverToSenderFrontCommands::from_stream(stream)?)
            }
        })
    }
}

impl Display for ClientToServerCommands {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::JoinGame(join) => write!(f, "join {join:?}"),
            Self::GameStep(steps_request) => write!(f, "{steps_request}"),
            Self::DownloadGameState(download) => write!(f, "download-game-state {download:?}"),
            Self::DownloadGameStateStatus(status) => {
                write!(f, "download-game-state-status {status}")
            }
        }
    }
}
