/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/lockstep-rust/lockstep
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */

/*!
Ordered datagram framing.

Every datagram carries a 16-bit sequence id. The receiving side accepts a
datagram only if its id is the expected one or a plausible successor, which
drops duplicates and late reorderings from an unreliable transport. The very
first datagram on a connection is always accepted and synchronizes the
sequence, so a reconnecting peer can start over after [`OrderedIn::reset`].
*/

use flood_rs::{ReadOctetStream, WriteOctetStream};
use std::ops::Sub;
use std::{fmt, io};

/// Octet count of the ordered framing header at the start of each datagram.
pub const ORDERED_DATAGRAM_HEADER_SIZE: usize = 2;

pub struct DatagramIdDiff(u16);

impl DatagramIdDiff {
    const EXPECTED_MAX_DATAGRAMS_PER_SECOND: u16 = 1000;
    const EXPECTED_MAX_LATENCY_MS: u16 = 1000;
    const ACCEPTABLE_DIFF: u16 =
        Self::EXPECTED_MAX_DATAGRAMS_PER_SECOND * (Self::EXPECTED_MAX_LATENCY_MS / 1000);

    #[must_use]
    pub const fn is_equal_or_successor(&self) -> bool {
        self.0 <= Self::ACCEPTABLE_DIFF
    }

    /// Number of datagrams skipped (lost or still in flight).
    #[must_use]
    pub const fn inner(&self) -> u16 {
        self.0
    }
}

#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct DatagramId(u16);

impl DatagramId {
    #[must_use]
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn inner(self) -> u16 {
        self.0
    }

    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    fn to_stream(self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        stream.write_u16(self.0)
    }

    fn from_stream(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        Ok(Self(stream.read_u16()?))
    }
}

impl Sub for DatagramId {
    type Output = DatagramIdDiff;
    fn sub(self, rhs: Self) -> DatagramIdDiff {
        DatagramIdDiff(rhs.0.wrapping_sub(self.0))
    }
}

impl fmt::Display for DatagramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "datagram-id({:04X})", self.0)
    }
}

/// Sending side: stamps each outgoing datagram with the next sequence id.
///
/// `to_stream` writes the id without consuming it; call [`OrderedOut::commit`]
/// once the datagram is actually handed to the transport.
#[derive(Debug, Default, Clone, Copy)]
pub struct OrderedOut {
    sequence_to_send: DatagramId,
}

impl OrderedOut {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sequence_to_send: DatagramId(0),
        }
    }

    pub fn to_stream(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        self.sequence_to_send.to_stream(stream)
    }

    pub fn commit(&mut self) {
        self.sequence_to_send = self.sequence_to_send.next();
    }

    #[must_use]
    pub const fn sequence_to_send(&self) -> DatagramId {
        self.sequence_to_send
    }
}

#[derive(Debug)]
pub enum DatagramOrderInError {
    IoError(io::Error),
    WrongOrder {
        expected: DatagramId,
        received: DatagramId,
    },
}

impl From<io::Error> for DatagramOrderInError {
    fn from(e: io::Error) -> Self {
        Self::IoError(e)
    }
}

impl fmt::Display for DatagramOrderInError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IoError(err) => write!(f, "io error: {err}"),
            Self::WrongOrder { expected, received } => {
                write!(f, "wrong datagram order: received {received}, expected {expected}")
            }
        }
    }
}

/// Receiving side: verifies the sequence id of each incoming datagram.
#[derive(Debug, Default, Clone, Copy)]
pub struct OrderedIn {
    expected_sequence: DatagramId,
    has_received_initial_datagram: bool,
}

impl OrderedIn {
    /// Reads the sequence id and accepts or rejects the datagram.
    ///
    /// The first datagram after construction or [`reset`](Self::reset) is
    /// always accepted and synchronizes the expected sequence.
    ///
    /// # Errors
    ///
    /// `DatagramOrderInError::WrongOrder` for duplicates and stale reorderings.
    pub fn read_and_verify(
        &mut self,
        stream: &mut impl ReadOctetStream,
    ) -> Result<DatagramIdDiff, DatagramOrderInError> {
        let received = DatagramId::from_stream(stream)?;

        if !self.has_received_initial_datagram {
            self.has_received_initial_datagram = true;
            self.expected_sequence = received.next();
            return Ok(DatagramIdDiff(0));
        }

        let diff = self.expected_sequence.sub(received);
        if diff.is_equal_or_successor() {
            self.expected_sequence = received.next();
            Ok(diff)
        } else {
            Err(DatagramOrderInError::WrongOrder {
                received,
                expected: self.expected_sequence,
            })
        }
    }

    /// Forgets the synchronized sequence so the next datagram starts a fresh
    /// handshake. Used when a peer disconnects and may reconnect on the same
    /// transport slot.
    pub fn reset(&mut self) {
        self.has_received_initial_datagram = false;
        self.expected_sequence = DatagramId(0);
    }

    #[must_use]
    pub const fn has_received_initial_datagram(&self) -> bool {
        self.has_received_initial_datagram
    }
}
