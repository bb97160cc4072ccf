//! Receive side of the feed: a byte stream in, whole packets out.
//!
//! The transport can hand back fewer bytes per read than a full packet, so
//! every packet is assembled with an inner fill loop. A zero-byte read at a
//! packet boundary is the peer's clean close; a zero-byte read mid-packet is
//! a truncated packet, and the two are never conflated.
use std::io::{self, Read};

use thiserror::Error;
use tracing::warn;

use crate::record::Packet;
use crate::wire::{PACKET_SIZE, parse_packet_exact};

#[derive(Debug, Error)]
pub enum RecvError {
    /// Peer closed after delivering only part of a packet.
    #[error("truncated packet: stream ended after {got} of 17 bytes")]
    Truncated { got: usize },
    /// Socket-level read failure, including an expired read timeout. `got`
    /// counts the bytes of the in-progress packet that had already arrived;
    /// those bytes are discarded with the error.
    #[error("read failed after {got} of 17 bytes: {source}")]
    Io { got: usize, source: io::Error },
}

/// Read exactly one packet.
///
/// `Ok(None)` is a clean end of stream: the peer closed before the first byte
/// of this packet. Closing mid-packet yields [`RecvError::Truncated`] with
/// the byte count that did arrive; a read error likewise reports how many
/// bytes of the current packet were buffered when it hit.
pub fn read_packet<R: Read>(r: &mut R) -> Result<Option<Packet>, RecvError> {
    let mut buf = [0u8; PACKET_SIZE];
    let mut filled = 0usize;
    while filled < PACKET_SIZE {
        let n = match r.read(&mut buf[filled..]) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(RecvError::Io {
                    got: filled,
                    source: e,
                });
            }
        };
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(RecvError::Truncated { got: filled });
        }
        filled += n;
    }
    Ok(Some(parse_packet_exact(&buf)))
}

/// Drain the full stream into `out` until the peer closes.
///
/// `Ok(())` is the clean close. On a truncated packet or a read failure the
/// drain stops and the error is returned; packets appended so far stay in
/// `out` so the caller can reconcile what it has.
pub fn receive_all<R: Read>(r: &mut R, out: &mut Vec<Packet>) -> Result<(), RecvError> {
    loop {
        match read_packet(r)? {
            Some(p) => out.push(p),
            None => return Ok(()),
        }
    }
}

/// Attempt to read the single reply to a resend request.
///
/// Any failure here (clean close, truncation, read error) is logged and
/// yields `None`; one lost reply never takes the whole session down.
pub fn receive_one<R: Read>(r: &mut R) -> Option<Packet> {
    match read_packet(r) {
        Ok(Some(p)) => Some(p),
        Ok(None) => {
            warn!("resend reply not received: peer closed the stream");
            None
        }
        Err(e) => {
            warn!("resend reply not received: {e}");
            None
        }
    }
}
