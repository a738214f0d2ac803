/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/lockstep-rust/lockstep
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use err_rs::{ErrorLevel, ErrorLevelProvider};
use monotonic_time_rs::{Millis, MillisDuration};
use std::fmt;

#[derive(Debug)]
pub enum OutStreamError {
    BlobIsTooLarge(usize),
    ChunkIndexOutOfBounds { waiting_for: usize, chunk_count: usize },
    UnexpectedStartTransfer,
}

impl fmt::Display for OutStreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BlobIsTooLarge(octet_count) => {
                write!(f, "blob is too large: {octet_count} octets")
            }
            Self::ChunkIndexOutOfBounds {
                waiting_for,
                chunk_count,
            } => write!(
                f,
                "ack waiting index {waiting_for} out of bounds ({chunk_count} chunks)"
            ),
            Self::UnexpectedStartTransfer => write!(f, "unexpected start transfer"),
        }
    }
}

impl ErrorLevelProvider for OutStreamError {
    fn error_level(&self) -> ErrorLevel {
        match self {
            Self::BlobIsTooLarge(_) => ErrorLevel::Critical,
            Self::ChunkIndexOutOfBounds { .. } | Self::UnexpectedStartTransfer => {
                ErrorLevel::Warning
            }
        }
    }
}

#[derive(Debug, Clone)]
struct ChunkSendState {
    last_sent_at: Option<Millis>,
    received_by_remote: bool,
}

/// Tracks which chunks the remote has acknowledged and schedules (re)sends.
///
/// Chunk payloads live in [`crate::out_logic::Logic`]; this type only deals in
/// indices.
#[derive(Debug)]
pub struct BlobStreamOut {
    chunks: Vec<ChunkSendState>,
    waiting_for_chunk_index: usize,
    resend_duration: MillisDuration,
}

impl BlobStreamOut {
    #[must_use]
    pub fn new(chunk_count: u32, resend_duration: MillisDuration) -> Self {
        Self {
            chunks: vec![
                ChunkSendState {
                    last_sent_at: None,
                    received_by_remote: false,
                };
                chunk_count as usize
            ],
            waiting_for_chunk_index: 0,
            resend_duration,
        }
    }

    #[must_use]
    pub fn chunk_count(&self) -> u32 {
        self.chunks.len() as u32
    }

    /// Picks up to `max_count` chunk indices that should go on the wire now:
    /// never-sent chunks first, then chunks whose resend period has elapsed.
    pub fn send(&mut self, now: Millis, max_count: usize) -> Vec<u32> {
        let mut indices = Vec::new();
        for index in self.waiting_for_chunk_index..self.chunks.len() {
            if indices.len() >= max_count {
                break;
            }
            let chunk = &mut self.chunks[index];
            if chunk.received_by_remote {
                continue;
            }
            let due = match chunk.last_sent_at {
                None => true,
                Some(sent_at) => now - sent_at >= self.resend_duration,
            };
            if due {
                chunk.last_sent_at = Some(now);
                indices.push(index as u32);
            }
        }
        indices
    }

    /// Applies a receiver progress report.
    ///
    /// Everything before `waiting_for_index` is received; the mask covers the
    /// 64 chunks after it.
    pub fn set_waiting_for_chunk_index(
        &mut self,
        waiting_for_index: usize,
        receive_mask: u64,
    ) -> Result<(), OutStreamError> {
        if waiting_for_index > self.chunks.len() {
            return Err(OutStreamError::ChunkIndexOutOfBounds {
                waiting_for: waiting_for_index,
                chunk_count: self.chunks.len(),
            });
        }
        self.waiting_for_chunk_index = waiting_for_index;
        for chunk in &mut self.chunks[..waiting_for_index] {
            chunk.received_by_remote = true;
        }
        for bit in 0..64usize {
            if receive_mask & (1 << bit) != 0 {
                let index = waiting_for_index + 1 + bit;
                if let Some(chunk) = self.chunks.get_mut(index) {
                    chunk.received_by_remote = true;
                }
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn is_received_by_remote(&self) -> bool {
        self.waiting_for_chunk_index >= self.chunks.len()
    }
}
