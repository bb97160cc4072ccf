//! Wire format for the exchange protocol.
//!
//! Requests are fixed 2-byte messages (opcode + argument). Packets are fixed
//! 17-byte records laid out as `symbol[4] side[1] quantity[4] price[4]
//! sequence[4]`, all integers big-endian. [`encode_packet`] and
//! [`parse_packet`] round-trip; the test servers use the encoder.
use thiserror::Error;

use crate::record::Packet;

/// Exact wire size of one packet record.
pub const PACKET_SIZE: usize = 17;
/// Exact wire size of either request.
pub const REQUEST_SIZE: usize = 2;

const OP_STREAM_ALL: u8 = 1;
const OP_RESEND: u8 = 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    /// Input was not exactly 17 bytes.
    #[error("bad packet length: expected 17 bytes, got {got}")]
    Length { got: usize },
    /// The 1-byte resend field cannot address this sequence.
    #[error("sequence {sequence} outside the resend-addressable range 0..=255")]
    SequenceOutOfRange { sequence: i32 },
}

/// A client-to-server request. Both variants occupy [`REQUEST_SIZE`] bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Ask the server to stream every packet it holds, then close.
    StreamAll,
    /// Ask the server to retransmit the packet with this sequence number.
    Resend { sequence: u8 },
}

impl Request {
    /// Build a resend request, rejecting sequences the wire field cannot
    /// carry instead of silently truncating them.
    pub fn resend(sequence: i32) -> Result<Self, WireError> {
        match u8::try_from(sequence) {
            Ok(s) => Ok(Request::Resend { sequence: s }),
            Err(_) => Err(WireError::SequenceOutOfRange { sequence }),
        }
    }

    /// Encode to the fixed 2-byte wire form.
    pub fn encode(&self) -> [u8; REQUEST_SIZE] {
        match *self {
            Request::StreamAll => [OP_STREAM_ALL, 0],
            Request::Resend { sequence } => [OP_RESEND, sequence],
        }
    }
}

/// Decode one packet from exactly [`PACKET_SIZE`] bytes.
///
/// Integer fields are converted with explicit big-endian reads, so the result
/// is the same on any host. The side byte is passed through undecoded and the
/// symbol is kept verbatim, padding included.
pub fn parse_packet(bytes: &[u8]) -> Result<Packet, WireError> {
    let fixed: &[u8; PACKET_SIZE] = bytes
        .try_into()
        .map_err(|_| WireError::Length { got: bytes.len() })?;
    Ok(parse_packet_exact(fixed))
}

/// Decode from a buffer whose length is already proven by its type.
pub fn parse_packet_exact(bytes: &[u8; PACKET_SIZE]) -> Packet {
    let read_i32 = |o: usize| -> i32 {
        let mut tmp = [0u8; 4];
        tmp.copy_from_slice(&bytes[o..o + 4]);
        i32::from_be_bytes(tmp)
    };
    Packet {
        symbol: String::from_utf8_lossy(&bytes[0..4]).into_owned(),
        side: bytes[4] as char,
        quantity: read_i32(5),
        price: read_i32(9),
        sequence: read_i32(13),
    }
}

/// Encode a packet into its 17-byte wire form. The symbol is truncated or
/// space-padded to exactly 4 bytes; the side char contributes its low byte.
pub fn encode_packet(p: &Packet) -> [u8; PACKET_SIZE] {
    let mut out = [0u8; PACKET_SIZE];
    let mut sym = [b' '; 4];
    for (dst, b) in sym.iter_mut().zip(p.symbol.bytes()) {
        *dst = b;
    }
    out[0..4].copy_from_slice(&sym);
    out[4] = p.side as u8;
    out[5..9].copy_from_slice(&p.quantity.to_be_bytes());
    out[9..13].copy_from_slice(&p.price.to_be_bytes());
    out[13..17].copy_from_slice(&p.sequence.to_be_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_wire_forms() {
        assert_eq!(Request::StreamAll.encode(), [1, 0]);
        assert_eq!(Request::resend(0).unwrap().encode(), [2, 0]);
        assert_eq!(Request::resend(7).unwrap().encode(), [2, 7]);
        assert_eq!(Request::resend(255).unwrap().encode(), [2, 255]);
    }

    #[test]
    fn resend_range_is_enforced() {
        assert_eq!(
            Request::resend(256),
            Err(WireError::SequenceOutOfRange { sequence: 256 })
        );
        assert_eq!(
            Request::resend(-1),
            Err(WireError::SequenceOutOfRange { sequence: -1 })
        );
    }

    #[test]
    fn packet_roundtrip() {
        let p = Packet {
            symbol: "AAPL".into(),
            side: 'S',
            quantity: -3,
            price: i32::MAX,
            sequence: 77,
        };
        let bytes = encode_packet(&p);
        assert_eq!(parse_packet(&bytes).unwrap(), p);
    }

    #[test]
    fn parse_reads_big_endian() {
        let mut bytes = *b"ABCDB\x00\x00\x00\x01\x00\x00\x00\x02\x00\x00\x00\x03";
        let p = parse_packet(&bytes).unwrap();
        assert_eq!(p.symbol, "ABCD");
        assert_eq!(p.side, 'B');
        assert_eq!((p.quantity, p.price, p.sequence), (1, 2, 3));
        // moving a high-order byte moves the value by 2^24
        bytes[5] = 1;
        assert_eq!(parse_packet(&bytes).unwrap().quantity, (1 << 24) + 1);
    }

    #[test]
    fn symbol_padding_is_kept_verbatim() {
        let bytes = *b"AB  S\x00\x00\x00\x01\x00\x00\x00\x02\x00\x00\x00\x03";
        assert_eq!(parse_packet(&bytes).unwrap().symbol, "AB  ");
    }

    #[test]
    fn short_symbol_is_space_padded_on_encode() {
        let p = Packet {
            symbol: "AB".into(),
            side: 'B',
            quantity: 0,
            price: 0,
            sequence: 0,
        };
        assert_eq!(&encode_packet(&p)[0..4], b"AB  ");
    }

    #[test]
    fn wrong_lengths_are_rejected() {
        assert_eq!(parse_packet(&[]), Err(WireError::Length { got: 0 }));
        assert_eq!(parse_packet(&[0u8; 16]), Err(WireError::Length { got: 16 }));
        assert_eq!(parse_packet(&[0u8; 18]), Err(WireError::Length { got: 18 }));
    }
}
