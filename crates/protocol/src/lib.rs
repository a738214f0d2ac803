/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/lockstep-rust/lockstep
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */

/*!
# Lockstep Protocol

Command codec for the datagrams exchanged between lockstep clients and the
authoritative step server. Each datagram body starts with one command octet
(after the ordered-datagram header); the rest is the command payload.
*/

pub mod client_to_server;
pub mod prelude;
pub mod serialize;
pub mod server_to_client;

use flood_rs::{Deserialize, ReadOctetStream, Serialize, WriteOctetStream};
use std::fmt;
use std::io::Result;

/// Client-chosen identifier echoed in the matching response, so the client can
/// pair requests with replies over an unreliable transport.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ClientRequestId(pub u8);

impl fmt::Display for ClientRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request({:X})", self.0)
    }
}

impl Serialize for ClientRequestId {
    fn serialize(&self, stream: &mut impl WriteOctetStream) -> Result<()> {
        stream.write_u8(self.0)
    }
}

impl Deserialize for ClientRequestId {
    fn deserialize(stream: &mut impl ReadOctetStream) -> Result<Self> {
        Ok(Self(stream.read_u8()?))
    }
}
