//! Exchange feed client library.
//!
//! This crate provides the protocol and session logic used by the
//! `abx_client` binary and the `player` tool:
//!
//! - `record`: the packet data model and the capture frame schema
//! - `wire`: the 2-byte request and 17-byte packet codec
//! - `stream`: framing-aware receive loop over partial reads, separating a
//!   clean close from a truncated packet
//! - `gaps`: missing-sequence and duplicate counting over an unordered
//!   arrival set
//! - `session`: connect, drain, reconcile, resend orchestration
//! - `capture`: length-prefixed, CRC-checked journal the binaries write and
//!   read
//!
//! The binaries in this repository (`src/main.rs` and `src/bin/player.rs`)
//! use these modules to talk to the exchange, persist what arrived, and
//! inspect captures offline.
pub mod capture;
pub mod gaps;
pub mod record;
pub mod session;
pub mod stream;
pub mod wire;
