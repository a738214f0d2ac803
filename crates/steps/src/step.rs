/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/lockstep-rust/lockstep
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use crate::StepId;
use flood_rs::{Deserialize, ReadOctetStream, Serialize, WriteOctetStream};
use lockstep_participant::{ParticipantId, ParticipantMap};
use std::fmt::{Display, Formatter};
use std::io;
use tick_id::TickId;

/// Hard cap on the payload of a single participant step. The configured limit
/// may be lower, never higher.
pub const MAX_SINGLE_STEP_OCTET_COUNT: usize = 24;

/// Opaque application input for one participant, one tick. The server never
/// interprets the payload.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct StepOctets(pub Vec<u8>);

impl StepOctets {
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for StepOctets {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "octets[{}]", self.0.len())
    }
}

impl Serialize for StepOctets {
    fn serialize(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        if self.0.len() > MAX_SINGLE_STEP_OCTET_COUNT {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("step payload too large: {}", self.0.len()),
            ));
        }
        stream.write_u8(self.0.len() as u8)?;
        stream.write(self.0.as_slice())
    }
}

impl Deserialize for StepOctets {
    fn deserialize(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        let len = stream.read_u8()? as usize;
        if len > MAX_SINGLE_STEP_OCTET_COUNT {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("step payload too large: {len}"),
            ));
        }
        let mut payload = vec![0u8; len];
        stream.read(&mut payload)?;
        Ok(Self(payload))
    }
}

/// Marker data for a participant's first authoritative step.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct JoinedData {
    pub participant_id: ParticipantId,
    pub step_id: StepId,
}

impl Serialize for JoinedData {
    fn serialize(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        self.participant_id.serialize(stream)?;
        stream.write_u32(self.step_id.0)
    }
}

impl Deserialize for JoinedData {
    fn deserialize(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        Ok(Self {
            participant_id: ParticipantId::deserialize(stream)?,
            step_id: TickId(stream.read_u32()?),
        })
    }
}

/// One participant's contribution to one authoritative tick.
///
/// `Custom` carries the client's predicted input; the other forms are
/// synthesized by the server.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Step {
    Forced,
    WaitingForReconnect,
    Joined(JoinedData),
    Left,
    Custom(StepOctets),
}

impl Step {
    #[must_use]
    pub const fn to_octet(&self) -> u8 {
        match self {
            Self::Forced => 0x01,
            Self::WaitingForReconnect => 0x02,
            Self::Joined(_) => 0x03,
            Self::Left => 0x04,
            Self::Custom(_) => 0x05,
        }
    }
}

impl Display for Step {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Forced => write!(f, "forced"),
            Self::WaitingForReconnect => write!(f, "waiting-for-reconnect"),
            Self::Joined(joined) => write!(f, "joined({})", joined.participant_id),
            Self::Left => write!(f, "left"),
            Self::Custom(octets) => write!(f, "custom({octets})"),
        }
    }
}

impl Serialize for Step {
    fn serialize(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        stream.write_u8(self.to_octet())?;
        match self {
            Self::Joined(joined) => joined.serialize(stream),
            Self::Custom(octets) => octets.serialize(stream),
            _ => Ok(()),
        }
    }
}

impl Deserialize for Step {
    fn deserialize(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        let step_type = stream.read_u8()?;
        Ok(match step_type {
            0x01 => Self::Forced,
            0x02 => Self::WaitingForReconnect,
            0x03 => Self::Joined(JoinedData::deserialize(stream)?),
            0x04 => Self::Left,
            0x05 => Self::Custom(StepOctets::deserialize(stream)?),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown step type 0x{step_type:02X}"),
            ))?,
        })
    }
}

/// All participants' steps for one tick, ordered by ascending participant id.
pub type CombinedStep = ParticipantMap<Step>;
