/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/lockstep-rust/lockstep
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */

/*!
# Lockstep Blob Stream

Reliable transfer of a byte array (a "blob") over an unreliable datagram
transport. The sender splits the blob into fixed-size chunks on a numbered
channel; the receiver acknowledges with the index of the first chunk it is
still waiting for plus a bitmask of chunks received after that point. Chunks
that stay unacknowledged past the resend period are sent again.

Used by the step server to carry the game-state snapshot to joining clients.
*/

pub mod in_logic;
pub mod out_logic;
pub mod out_logic_front;
pub mod out_stream;
pub mod protocol;
pub mod protocol_front;

pub mod prelude {
    pub use crate::in_logic::FrontLogic;
    pub use crate::out_logic_front::OutLogicFront;
    pub use crate::out_stream::OutStreamError;
    pub use crate::protocol::{AckChunkData, SetChunkData, StartTransferData, TransferId};
    pub use crate::protocol_front::{
        AckChunkFrontData, ReceiverToSenderFrontCommands, SenderToReceiverFrontCommands,
        SetChunkFrontData,
    };
}
