use serde::{Deserialize, Serialize};

/// One trade record as decoded from the 17-byte wire form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    pub symbol: String, // 4 ASCII bytes on the wire, kept verbatim (no trim)
    pub side: char,     // indicator byte from the server, not validated
    pub quantity: i32,
    pub price: i32,
    pub sequence: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureHeader {
    pub version: u16,
    pub created_unix_ns: u128,
    pub host: String, // endpoint the session talked to
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CaptureFrame {
    Header(CaptureHeader),
    Packet(Packet),
}
