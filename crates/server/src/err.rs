/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/lockstep-rust/lockstep
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use datagram_chunker::DatagramChunkerError;
use err_rs::{ErrorLevel, ErrorLevelProvider};
use freelist_rs::FreeListError;
use lockstep_blob_stream::prelude::OutStreamError;
use lockstep_participant::ParticipantId;
use lockstep_steps::StepRingError;
use std::fmt::{self, Display};
use std::io;

#[derive(Debug)]
pub enum ServerError {
    // setup
    MaxConnectionCountTooHigh { requested: usize, maximum: usize },
    MaxParticipantCountTooHigh { requested: usize, maximum: usize },
    MaxSingleStepOctetCountTooHigh { requested: usize, maximum: usize },

    // state
    IllegalConnectionIndex { connection_index: u8, capacity: usize },
    ConnectionAlreadyConnected(u8),
    ConnectionNotFound(u8),
    ConnectionAlreadyFreed(u8),
    NoParticipantConnection(u8),
    StepTrafficBeforeSynchronization(u8),
    NoGameStateAvailable,
    NoDownloadInProgress,

    // capacity
    NoFreeParticipantSlots,
    NoFreeParticipantConnectionSlots,
    TooManyLocalPlayers { requested: usize, maximum: usize },
    GameStateOctetCountTooLarge { requested: usize, maximum: usize },
    SingleStepOctetCountExceeded { octet_count: usize, maximum: usize },

    // protocol
    JoinWithoutLocalPlayers,
    UnknownParticipant(ParticipantId),
    StepRingError(StepRingError),
    LeftoverOctetsInDatagram,
    IoError(io::Error),

    // internal
    ParticipantIdCollision(ParticipantId),
    FreeListError { connection_index: u8, error: FreeListError },
    BlobStreamError(OutStreamError),
    DatagramChunkerError(DatagramChunkerError),

    // external
    TransportError(io::Error),
}

impl ServerError {
    /// Stable negative code for embedders that report errors as integers.
    #[must_use]
    pub const fn code(&self) -> i32 {
        match self {
            Self::MaxConnectionCountTooHigh { .. }
            | Self::MaxParticipantCountTooHigh { .. }
            | Self::MaxSingleStepOctetCountTooHigh { .. } => -1,
            Self::ConnectionNotFound(_) => -2,
            Self::ConnectionAlreadyFreed(_) => -4,
            Self::IllegalConnectionIndex { .. } => -13,
            Self::NoGameStateAvailable => -21,
            Self::StepTrafficBeforeSynchronization(_) => -22,
            Self::StepRingError(_) => -23,
            Self::SingleStepOctetCountExceeded { .. } => -24,
            Self::LeftoverOctetsInDatagram => -25,
            Self::GameStateOctetCountTooLarge { .. } => -30,
            Self::NoDownloadInProgress => -26,
            Self::BlobStreamError(_) => -27,
            Self::IoError(_) => -28,
            Self::DatagramChunkerError(_) => -29,
            Self::NoFreeParticipantSlots => -32,
            Self::TooManyLocalPlayers { .. } => -33,
            Self::UnknownParticipant(_) => -34,
            Self::NoFreeParticipantConnectionSlots => -35,
            Self::JoinWithoutLocalPlayers => -36,
            Self::NoParticipantConnection(_) => -37,
            Self::ParticipantIdCollision(_) => -40,
            Self::FreeListError { .. } => -41,
            Self::ConnectionAlreadyConnected(_) => -44,
            Self::TransportError(_) => -50,
        }
    }
}

impl ErrorLevelProvider for ServerError {
    fn error_level(&self) -> ErrorLevel {
        match self {
            Self::MaxConnectionCountTooHigh { .. }
            | Self::MaxParticipantCountTooHigh { .. }
            | Self::MaxSingleStepOctetCountTooHigh { .. }
            | Self::ParticipantIdCollision(_)
            | Self::FreeListError { .. }
            | Self::TransportError(_) => ErrorLevel::Critical,

            Self::NoGameStateAvailable
            | Self::NoDownloadInProgress
            | Self::StepTrafficBeforeSynchronization(_) => ErrorLevel::Info,

            Self::IllegalConnectionIndex { .. }
            | Self::ConnectionAlreadyConnected(_)
            | Self::ConnectionNotFound(_)
            | Self::ConnectionAlreadyFreed(_)
            | Self::NoParticipantConnection(_)
            | Self::NoFreeParticipantSlots
            | Self::NoFreeParticipantConnectionSlots
            | Self::TooManyLocalPlayers { .. }
            | Self::GameStateOctetCountTooLarge { .. }
            | Self::SingleStepOctetCountExceeded { .. }
            | Self::JoinWithoutLocalPlayers
            | Self::UnknownParticipant(_)
            | Self::StepRingError(_)
            | Self::LeftoverOctetsInDatagram
            | Self::IoError(_)
            | Self::BlobStreamError(_)
            | Self::DatagramChunkerError(_) => ErrorLevel::Warning,
        }
    }
}

impl Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxConnectionCountTooHigh { requested, maximum } => {
                write!(f, "max connection count {requested} above hard limit {maximum}")
            }
            Self::MaxParticipantCountTooHigh { requested, maximum } => {
                write!(f, "max participant count {requested} above hard limit {maximum}")
            }
            Self::MaxSingleStepOctetCountTooHigh { requested, maximum } => {
                write!(f, "single step octet count {requested} above hard limit {maximum}")
            }
            Self::IllegalConnectionIndex {
                connection_index,
                capacity,
            } => write!(f, "illegal connection index {connection_index} (capacity {capacity})"),
            Self::ConnectionAlreadyConnected(index) => {
                write!(f, "connection {index} already connected")
            }
            Self::ConnectionNotFound(index) => write!(f, "connection {index} not found"),
            Self::ConnectionAlreadyFreed(index) => write!(f, "connection {index} already freed"),
            Self::NoParticipantConnection(index) => {
                write!(f, "transport connection {index} has no participant connection")
            }
            Self::StepTrafficBeforeSynchronization(index) => {
                write!(f, "connection {index} sent steps before synchronization")
            }
            Self::NoGameStateAvailable => write!(f, "no game state available"),
            Self::NoDownloadInProgress => write!(f, "no download in progress"),
            Self::NoFreeParticipantSlots => write!(f, "no free participant slots"),
            Self::NoFreeParticipantConnectionSlots => {
                write!(f, "no free participant connection slots")
            }
            Self::TooManyLocalPlayers { requested, maximum } => {
                write!(f, "too many local players {requested}, maximum {maximum}")
            }
            Self::GameStateOctetCountTooLarge { requested, maximum } => {
                write!(f, "game state of {requested} octets above maximum {maximum}")
            }
            Self::SingleStepOctetCountExceeded {
                octet_count,
                maximum,
            } => write!(f, "step payload of {octet_count} octets above maximum {maximum}"),
            Self::JoinWithoutLocalPlayers => write!(f, "join request without local players"),
            Self::UnknownParticipant(participant_id) => {
                write!(f, "unknown {participant_id}")
            }
            Self::StepRingError(err) => write!(f, "step ring: {err}"),
            Self::LeftoverOctetsInDatagram => {
                write!(f, "octets left unread in datagram")
            }
            Self::IoError(err) => write!(f, "io: {err}"),
            Self::ParticipantIdCollision(participant_id) => {
                write!(f, "participant id collision {participant_id}")
            }
            Self::FreeListError {
                connection_index,
                error,
            } => write!(f, "free list error for connection {connection_index}: {error:?}"),
            Self::BlobStreamError(err) => write!(f, "blob stream: {err}"),
            Self::DatagramChunkerError(err) => write!(f, "datagram chunker: {err:?}"),
            Self::TransportError(err) => write!(f, "transport: {err}"),
        }
    }
}

impl From<StepRingError> for ServerError {
    fn from(err: StepRingError) -> Self {
        Self::StepRingError(err)
    }
}

impl From<io::Error> for ServerError {
    fn from(err: io::Error) -> Self {
        Self::IoError(err)
    }
}

impl From<OutStreamError> for ServerError {
    fn from(err: OutStreamError) -> Self {
        Self::BlobStreamError(err)
    }
}

impl From<DatagramChunkerError> for ServerError {
    fn from(err: DatagramChunkerError) -> Self {
        Self::DatagramChunkerError(err)
    }
}
