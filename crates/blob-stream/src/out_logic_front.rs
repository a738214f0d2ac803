/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/lockstep-rust/lockstep
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use crate::out_logic::Logic;
use crate::out_stream::OutStreamError;
use crate::protocol::{StartTransferData, TransferId};
use crate::protocol_front::{ReceiverToSenderFrontCommands, SenderToReceiverFrontCommands};
use log::{debug, trace};
use monotonic_time_rs::{Millis, MillisDuration};

const MAX_CHUNK_COUNT_EACH_SEND: usize = 10;

#[derive(Debug)]
enum Phase {
    StartTransfer,
    Transfer,
}

/// Drives one outgoing blob transfer: announces the transfer until the
/// receiver acknowledges the start, then streams and resends chunks until
/// everything is acknowledged.
#[derive(Debug)]
pub struct OutLogicFront {
    out_stream: Logic,
    phase: Phase,
    transfer_id: TransferId,
}

impl OutLogicFront {
    /// # Errors
    ///
    /// `OutStreamError::BlobIsTooLarge` if the blob cannot be chunked.
    pub fn new(
        transfer_id: TransferId,
        fixed_chunk_size: u16,
        resend_duration: MillisDuration,
        blob: &[u8],
    ) -> Result<Self, OutStreamError> {
        Ok(Self {
            out_stream: Logic::new(transfer_id, fixed_chunk_size, resend_duration, blob)?,
            phase: Phase::StartTransfer,
            transfer_id,
        })
    }

    /// # Errors
    ///
    /// `OutStreamError::ChunkIndexOutOfBounds` on a bogus acknowledge.
    pub fn receive(
        &mut self,
        command: &ReceiverToSenderFrontCommands,
    ) -> Result<(), OutStreamError> {
        match self.phase {
            Phase::StartTransfer => {
                if let ReceiverToSenderFrontCommands::AckStart(ack_transfer_id) = command {
                    if self.transfer_id.0 == *ack_transfer_id {
                        debug!("start of {} acknowledged, transferring", self.transfer_id);
                        self.phase = Phase::Transfer;
                    } else {
                        debug!(
                            "ack for unknown transfer {ack_transfer_id}, expecting {}",
                            self.transfer_id
                        );
                    }
                }
            }
            Phase::Transfer => match command {
                ReceiverToSenderFrontCommands::AckChunk(ack) => {
                    self.out_stream.set_waiting_for_chunk_index(
                        ack.data.waiting_for_chunk_index as usize,
                        ack.data.receive_mask_after_last,
                    )?;
                    if self.out_stream.is_received_by_remote() {
                        trace!("{} fully received by remote", self.transfer_id);
                    }
                }
                ReceiverToSenderFrontCommands::AckStart(_) => {}
            },
        }
        Ok(())
    }

    #[must_use]
    pub fn send(&mut self, now: Millis) -> Vec<SenderToReceiverFrontCommands> {
        match self.phase {
            Phase::StartTransfer => {
                trace!("announcing {}", self.transfer_id);
                vec![SenderToReceiverFrontCommands::StartTransfer(
                    StartTransferData {
                        transfer_id: self.transfer_id.0,
                        total_octet_size: self.out_stream.octet_size(),
                        chunk_size: self.out_stream.chunk_size(),
                    },
                )]
            }
            Phase::Transfer => self
                .out_stream
                .send(now, MAX_CHUNK_COUNT_EACH_SEND)
                .into_iter()
                .map(SenderToReceiverFrontCommands::SetChunk)
                .collect(),
        }
    }

    #[must_use]
    pub fn is_received_by_remote(&self) -> bool {
        self.out_stream.is_received_by_remote()
    }

    #[must_use]
    pub const fn transfer_id(&self) -> TransferId {
        self.transfer_id
    }
}
