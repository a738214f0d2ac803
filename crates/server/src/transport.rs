/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/lockstep-rust/lockstep
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use std::io;

/// Datagram transport indexed by connection. The server never names a concrete
/// transport; implementations plug in whatever carries the datagrams.
pub trait MultiTransport {
    /// Receives the next pending datagram into `buf`.
    ///
    /// Returns the source connection index and the octet count, or `None` when
    /// no more datagrams are available right now.
    fn receive(&mut self, buf: &mut [u8]) -> io::Result<Option<(u8, usize)>>;

    /// Sends one datagram to the given connection index.
    fn send_to(&mut self, connection_index: u8, payload: &[u8]) -> io::Result<()>;
}
