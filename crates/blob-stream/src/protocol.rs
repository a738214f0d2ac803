/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/lockstep-rust/lockstep
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use flood_rs::{ReadOctetStream, WriteOctetStream};
use std::fmt;
use std::io;

/// Identifies one blob transfer on a connection. A new transfer always gets a
/// channel id that differs from any in-flight one on the same connection.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct TransferId(pub u16);

impl TransferId {
    pub fn to_stream(self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        stream.write_u16(self.0)
    }

    pub fn from_stream(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        Ok(Self(stream.read_u16()?))
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transfer({:04X})", self.0)
    }
}

/// Announces a new transfer: total size and the fixed chunk size.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct StartTransferData {
    pub transfer_id: u16,
    pub total_octet_size: u32,
    pub chunk_size: u16,
}

impl StartTransferData {
    pub fn to_stream(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        stream.write_u16(self.transfer_id)?;
        stream.write_u32(self.total_octet_size)?;
        stream.write_u16(self.chunk_size)
    }

    pub fn from_stream(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        Ok(Self {
            transfer_id: stream.read_u16()?,
            total_octet_size: stream.read_u32()?,
            chunk_size: stream.read_u16()?,
        })
    }
}

/// One chunk of blob payload.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SetChunkData {
    pub chunk_index: u32,
    pub payload: Vec<u8>,
}

impl SetChunkData {
    pub fn to_stream(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        stream.write_u32(self.chunk_index)?;
        stream.write_u16(self.payload.len() as u16)?;
        stream.write(self.payload.as_slice())
    }

    pub fn from_stream(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        let chunk_index = stream.read_u32()?;
        let octet_count = stream.read_u16()? as usize;
        let mut payload = vec![0u8; octet_count];
        stream.read(&mut payload)?;
        Ok(Self {
            chunk_index,
            payload,
        })
    }
}

/// Receiver progress report: the first chunk index still missing and a bitmask
/// of the 64 chunks after it (bit set = received).
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AckChunkData {
    pub waiting_for_chunk_index: u32,
    pub receive_mask_after_last: u64,
}

impl AckChunkData {
    pub fn to_stream(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        stream.write_u32(self.waiting_for_chunk_index)?;
        stream.write_u64(self.receive_mask_after_last)
    }

    pub fn from_stream(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        Ok(Self {
            waiting_for_chunk_index: stream.read_u32()?,
            receive_mask_after_last: stream.read_u64()?,
        })
    }
}
