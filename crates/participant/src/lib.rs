/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/lockstep-rust/lockstep
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */

/*!
Participant identity for a deterministic lockstep session.

A participant is one controlled entity in the game (one local player on some
client). Ids are assigned by the server and stay unique for the lifetime of a
game. Id zero is reserved.
*/

use flood_rs::{Deserialize, ReadOctetStream, Serialize, WriteOctetStream};
use seq_map::SeqMap;
use std::fmt::Display;

/// Unique identifier for a participant, valid for the lifetime of one game.
#[derive(PartialEq, Eq, Copy, Ord, Hash, Clone, Debug, PartialOrd)]
pub struct ParticipantId(pub u8);

impl Serialize for ParticipantId {
    fn serialize(&self, stream: &mut impl WriteOctetStream) -> std::io::Result<()> {
        stream.write_u8(self.0)
    }
}

impl Deserialize for ParticipantId {
    fn deserialize(stream: &mut impl ReadOctetStream) -> std::io::Result<Self> {
        Ok(Self(stream.read_u8()?))
    }
}

impl Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "participant({})", self.0)
    }
}

/// Map keyed by participant id with deterministic (insertion order) iteration.
///
/// The server always inserts in ascending participant id, so iterating a
/// `ParticipantMap` is iterating by ascending id.
pub type ParticipantMap<T> = SeqMap<ParticipantId, T>;
