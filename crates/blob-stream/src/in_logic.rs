/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/lockstep-rust/lockstep
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use crate::protocol::{AckChunkData, SetChunkData, TransferId};
use crate::protocol_front::{
    AckChunkFrontData, ReceiverToSenderFrontCommands, SenderToReceiverFrontCommands,
};
use bit_array_rs::BitArray;
use err_rs::{ErrorLevel, ErrorLevelProvider};
use log::{debug, trace};
use std::fmt;

#[derive(Debug)]
pub enum InLogicError {
    ChunkIndexOutOfBounds { chunk_index: u32, chunk_count: u32 },
    UnexpectedChunkSize { expected: usize, encountered: usize },
    NoTransferInProgress,
}

impl fmt::Display for InLogicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChunkIndexOutOfBounds {
                chunk_index,
                chunk_count,
            } => write!(f, "chunk index {chunk_index} out of bounds ({chunk_count})"),
            Self::UnexpectedChunkSize {
                expected,
                encountered,
            } => write!(f, "unexpected chunk size {encountered}, expected {expected}"),
            Self::NoTransferInProgress => write!(f, "no transfer in progress"),
        }
    }
}

impl ErrorLevelProvider for InLogicError {
    fn error_level(&self) -> ErrorLevel {
        ErrorLevel::Warning
    }
}

/// Receiver-side chunk assembly for one transfer. Received chunks are tracked
/// in a bit array whose atoms double as the ack's receive mask.
#[derive(Debug)]
pub struct InLogic {
    blob: Vec<u8>,
    chunk_size: u16,
    bit_array: BitArray,
}

impl InLogic {
    #[must_use]
    pub fn new(total_octet_size: u32, chunk_size: u16) -> Self {
        let chunk_count = (total_octet_size as usize).div_ceil(chunk_size as usize);
        Self {
            blob: vec![0u8; total_octet_size as usize],
            chunk_size,
            bit_array: BitArray::new(chunk_count),
        }
    }

    pub fn receive(&mut self, chunk: &SetChunkData) -> Result<(), InLogicError> {
        let chunk_count = self.bit_array.bit_count();
        if chunk.chunk_index as usize >= chunk_count {
            return Err(InLogicError::ChunkIndexOutOfBounds {
                chunk_index: chunk.chunk_index,
                chunk_count: chunk_count as u32,
            });
        }
        let start = chunk.chunk_index as usize * self.chunk_size as usize;
        let expected = (self.blob.len() - start).min(self.chunk_size as usize);
        if chunk.payload.len() != expected {
            return Err(InLogicError::UnexpectedChunkSize {
                expected,
                encountered: chunk.payload.len(),
            });
        }
        self.blob[start..start + expected].copy_from_slice(&chunk.payload);
        self.bit_array.set(chunk.chunk_index as usize);
        trace!("received chunk {} of {}", chunk.chunk_index, chunk_count);
        Ok(())
    }

    /// Index of the first chunk not yet received, plus the receive bitmask for
    /// the 64 chunks after it.
    #[must_use]
    pub fn ack(&self) -> AckChunkData {
        let waiting = self
            .bit_array
            .first_unset_bit()
            .unwrap_or_else(|| self.bit_array.bit_count());
        AckChunkData {
            waiting_for_chunk_index: waiting as u32,
            receive_mask_after_last: self.bit_array.atom_from_index(waiting + 1),
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.bit_array.all_set()
    }

    #[must_use]
    pub fn blob(&self) -> Option<&[u8]> {
        self.is_complete().then_some(self.blob.as_slice())
    }
}

/// Receiver front: answers `StartTransfer` with `AckStart` and chunks with
/// progress acks. This is the client half of the snapshot download; the server
/// only uses it in tests.
#[derive(Debug, Default)]
pub struct FrontLogic {
    transfer: Option<(TransferId, InLogic)>,
}

impl FrontLogic {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn receive(
        &mut self,
        command: &SenderToReceiverFrontCommands,
    ) -> Result<(), InLogicError> {
        match command {
            SenderToReceiverFrontCommands::StartTransfer(start) => {
                let restart = match &self.transfer {
                    Some((transfer_id, _)) => transfer_id.0 != start.transfer_id,
                    None => true,
                };
                if restart {
                    debug!(
                        "starting transfer {} ({} octets)",
                        start.transfer_id, start.total_octet_size
                    );
                    self.transfer = Some((
                        TransferId(start.transfer_id),
                        InLogic::new(start.total_octet_size, start.chunk_size),
                    ));
                }
                Ok(())
            }
            SenderToReceiverFrontCommands::SetChunk(chunk) => {
                let (_, in_logic) = self
                    .transfer
                    .as_mut()
                    .ok_or(InLogicError::NoTransferInProgress)?;
                in_logic.receive(&chunk.data)
            }
        }
    }

    /// The answer to send back to the sender for the current state.
    ///
    /// # Errors
    ///
    /// `InLogicError::NoTransferInProgress` if no transfer was started.
    pub fn send(&mut self) -> Result<ReceiverToSenderFrontCommands, InLogicError> {
        let (transfer_id, in_logic) = self
            .transfer
            .as_ref()
            .ok_or(InLogicError::NoTransferInProgress)?;
        if in_logic.bit_array.count_set_bits() > 0 || in_logic.is_complete() {
            Ok(ReceiverToSenderFrontCommands::AckChunk(AckChunkFrontData {
                transfer_id: *transfer_id,
                data: in_logic.ack(),
            }))
        } else {
            Ok(ReceiverToSenderFrontCommands::AckStart(transfer_id.0))
        }
    }

    #[must_use]
    pub fn blob(&self) -> Option<&[u8]> {
        self.transfer
            .as_ref()
            .and_then(|(_, in_logic)| in_logic.blob())
    }
}
