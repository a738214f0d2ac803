/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/lockstep-rust/lockstep
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use crate::serialize::{
    combined_step_from_stream, combined_step_to_stream, step_id_from_stream, step_id_to_stream,
};
use crate::ClientRequestId;
use flood_rs::{Deserialize, ReadOctetStream, Serialize, WriteOctetStream};
use io::ErrorKind;
use lockstep_blob_stream::prelude::SenderToReceiverFrontCommands;
use lockstep_participant::ParticipantId;
use lockstep_steps::step::CombinedStep;
use lockstep_steps::StepId;
use std::fmt::{self, Display};
use std::io;

#[repr(u8)]
pub enum ServerToClientCommand {
    StepRanges = 0x08,
    JoinGameAccepted = 0x09,
    DownloadGameState = 0x0B,
    BlobStreamChannel = 0x0C,
}

impl TryFrom<u8> for ServerToClientCommand {
    type Error = io::Error;

    fn try_from(value: u8) -> io::Result<Self> {
        Ok(match value {
            0x08 => Self::StepRanges,
            0x09 => Self::JoinGameAccepted,
            0x0B => Self::DownloadGameState,
            0x0C => Self::BlobStreamChannel,
            _ => Err(io::Error::new(
                ErrorKind::InvalidData,
                format!("unknown server to client command 0x{value:02X}"),
            ))?,
        })
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct JoinGameParticipant {
    pub local_index: u8,
    pub participant_id: ParticipantId,
}

impl JoinGameParticipant {
    pub fn to_stream(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        stream.write_u8(self.local_index)?;
        self.participant_id.serialize(stream)
    }

    pub fn from_stream(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        Ok(Self {
            local_index: stream.read_u8()?,
            participant_id: ParticipantId::deserialize(stream)?,
        })
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct JoinGameAccepted {
    pub client_request_id: ClientRequestId,
    pub participants: Vec<JoinGameParticipant>,
}

impl Display for JoinGameAccepted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "join accepted {} participants:{}",
            self.client_request_id,
            self.participants.len()
        )
    }
}

impl JoinGameAccepted {
    pub fn to_stream(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        self.client_request_id.serialize(stream)?;
        stream.write_u8(self.participants.len() as u8)?;
        for participant in &self.participants {
            participant.to_stream(stream)?;
        }
        Ok(())
    }

    pub fn from_stream(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        let client_request_id = ClientRequestId::deserialize(stream)?;
        let count = stream.read_u8()? as usize;
        let mut participants = Vec::with_capacity(count);
        for _ in 0..count {
            participants.push(JoinGameParticipant::from_stream(stream)?);
        }
        Ok(Self {
            client_request_id,
            participants,
        })
    }
}

/// Book-keeping the client uses to tune its own send rate.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct StepRangesHeader {
    /// Steps currently buffered on the server for this connection.
    pub connection_buffer_count: u8,
    /// How far the client's ack lags the authoritative write head.
    pub steps_behind: i8,
    /// The id the server will compose next.
    pub next_authoritative_step_id: StepId,
}

impl StepRangesHeader {
    pub fn to_stream(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        stream.write_u8(self.connection_buffer_count)?;
        stream.write_i8(self.steps_behind)?;
        step_id_to_stream(self.next_authoritative_step_id, stream)
    }

    pub fn from_stream(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        Ok(Self {
            connection_buffer_count: stream.read_u8()?,
            steps_behind: stream.read_i8()?,
            next_authoritative_step_id: step_id_from_stream(stream)?,
        })
    }
}

/// One contiguous run of authoritative combined steps.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct AuthoritativeStepRange {
    pub start_step_id: StepId,
    pub steps: Vec<CombinedStep>,
}

impl Display for AuthoritativeStepRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "range {} count:{}", self.start_step_id, self.steps.len())
    }
}

impl AuthoritativeStepRange {
    pub fn to_stream(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        step_id_to_stream(self.start_step_id, stream)?;
        stream.write_u8(self.steps.len() as u8)?;
        for combined_step in &self.steps {
            combined_step_to_stream(combined_step, stream)?;
        }
        Ok(())
    }

    pub fn from_stream(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        let start_step_id = step_id_from_stream(stream)?;
        let step_count = stream.read_u8()? as usize;
        let mut steps = Vec::with_capacity(step_count);
        for _ in 0..step_count {
            steps.push(combined_step_from_stream(stream)?);
        }
        Ok(Self {
            start_step_id,
            steps,
        })
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct StepRangesResponse {
    pub header: StepRangesHeader,
    pub ranges: Vec<AuthoritativeStepRange>,
}

impl Display for StepRangesResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "step-ranges next:{} range_count:{}",
            self.header.next_authoritative_step_id,
            self.ranges.len()
        )
    }
}

impl StepRangesResponse {
    pub fn to_stream(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        self.header.to_stream(stream)?;
        stream.write_u8(self.ranges.len() as u8)?;
        for range in &self.ranges {
            range.to_stream(stream)?;
        }
        Ok(())
    }

    pub fn from_stream(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        let header = StepRangesHeader::from_stream(stream)?;
        let range_count = stream.read_u8()? as usize;
        let mut ranges = Vec::with_capacity(range_count);
        for _ in 0..range_count {
            ranges.push(AuthoritativeStepRange::from_stream(stream)?);
        }
        Ok(Self { header, ranges })
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct DownloadGameStateResponse {
    pub client_request: u8,
    pub step_id: StepId,
    pub blob_stream_channel: u16,
    pub octet_count: u32,
}

impl Display for DownloadGameStateResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "download-game-state-response {} {} channel:{} octets:{}",
            self.client_request, self.step_id, self.blob_stream_channel, self.octet_count
        )
    }
}

impl DownloadGameStateResponse {
    pub fn to_stream(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        stream.write_u8(self.client_request)?;
        step_id_to_stream(self.step_id, stream)?;
        stream.write_u16(self.blob_stream_channel)?;
        stream.write_u32(self.octet_count)
    }

    pub fn from_stream(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        Ok(Self {
            client_request: stream.read_u8()?,
            step_id: step_id_from_stream(stream)?,
            blob_stream_channel: stream.read_u16()?,
            octet_count: stream.read_u32()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerToClientCommands {
    StepRanges(StepRangesResponse),
    JoinGame(JoinGameAccepted),
    DownloadGameState(DownloadGameStateResponse),
    BlobStreamChannel(SenderToReceiverFrontCommands),
}

impl ServerToClientCommands {
    #[must_use]
    pub const fn to_octet(&self) -> u8 {
        match self {
            Self::StepRanges(_) => ServerToClientCommand::StepRanges as u8,
            Self::JoinGame(_) => ServerToClientCommand::JoinGameAccepted as u8,
            Self::DownloadGameState(_) => ServerToClientCommand::DownloadGameState as u8,
            Self::BlobStreamChannel(_) => ServerToClientCommand::BlobStreamChannel as u8,
        }
    }
}

impl Serialize for ServerToClientCommands {
    fn serialize(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        stream.write_u8(self.to_octet())?;
        match self {
            Self::StepRanges(response) => response.to_stream(stream),
            Self::JoinGame(join_accepted) => join_accepted.to_stream(stream),
            Self::DownloadGameState(response) => response.to_stream(stream),
            Self::BlobStreamChannel(blob_command) => blob_command.to_stream(stream),
        }
    }
}

impl Deserialize for ServerToClientCommands {
    fn deserialize(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        let command_value = stream.read_u8()?;
        Ok(match ServerToClientCommand::try_from(command_value)? {
            ServerToClientCommand::StepRanges => {
                Self::StepRanges(StepRangesResponse::from_stream(stream)?)
            }
            ServerToClientCommand::JoinGameAccepted => {
                Self::JoinGame(JoinGameAccepted::from_stream(stream)?)
            }
            ServerToClientCommand::DownloadGameState => {
                Self::DownloadGameState(DownloadGameStateResponse::from_stream(stream)?)
            }
            ServerToClientCommand::BlobStreamChannel => {
                Self::BlobStreamChannel(SenderToReceiverFrontCommands::from_stream(stream)?)
            }
        })
    }
}

impl Display for ServerToClientCommands {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StepRanges(response) => write!(f, "{response}"),
            Self::JoinGame(join_accepted) => write!(f, "{join_accepted}"),
            Self::DownloadGameState(response) => write!(f, "{response}"),
            Self::BlobStreamChannel(blob_command) => write!(f, "blob {blob_command}"),
        }
    }
}
