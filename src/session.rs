//! One full conversation with the exchange: connect, drain the stream,
//! reconcile gaps, request resends, hand back the assembled record set.
//!
//! Failures split two ways. Anything that makes further progress impossible
//! (connect refused, a request that cannot be written) aborts the session as
//! a [`SessionError`]. Anything scoped to a single packet or a single resend
//! (truncation, an unanswered resend, a sequence the wire cannot address) is
//! absorbed, logged, and reflected in the [`SessionReport`] instead.
//!
//! One twist on that split: a drain that dies inside a packet leaves the
//! stream misframed, because the peer may still deliver the rest of the
//! aborted packet. The resend loop is skipped in that state and every gap is
//! reported unrepaired.
use std::io::{self, BufReader, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use crossbeam_channel::Sender;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::gaps::missing_sequences;
use crate::record::Packet;
use crate::stream::{RecvError, receive_all, receive_one};
use crate::wire::Request;

/// Where and how patiently to talk to the exchange.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    /// Cap on each connect attempt; `None` waits forever.
    pub connect_timeout: Option<Duration>,
    /// Cap on each blocking read; `None` waits forever.
    pub read_timeout: Option<Duration>,
}

/// Everything a finished session produced.
#[derive(Debug)]
pub struct SessionReport {
    /// Final record set, sorted by sequence. Duplicates are kept as received.
    pub packets: Vec<Packet>,
    /// Packets delivered by the initial full-stream drain.
    pub streamed: usize,
    /// Gaps identified after the drain, ascending.
    pub missing: Vec<i32>,
    /// Resend requests that produced a packet.
    pub recovered: usize,
    /// Missing sequences that could not be repaired.
    pub unrepaired: Vec<i32>,
}

/// Session-aborting failures. Per-packet trouble never shows up here; it is
/// absorbed into the report.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("resolve {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        source: io::Error,
    },
    #[error("no address found for {host}:{port}")]
    NoAddress { host: String, port: u16 },
    #[error("connect {addr}: {source}")]
    Connect { addr: SocketAddr, source: io::Error },
    #[error("send {what} request: {source}")]
    Send {
        what: &'static str,
        source: io::Error,
    },
}

/// Run one complete session against the configured endpoint.
///
/// Every packet accepted into the record set is also cloned into `tap`, in
/// arrival order, when a sender is given; a closed tap is ignored. The
/// connection lives for exactly the duration of this call.
pub fn run_session(
    cfg: &SessionConfig,
    tap: Option<&Sender<Packet>>,
) -> Result<SessionReport, SessionError> {
    let stream = connect(cfg)?;
    stream.set_nodelay(true).ok();
    if let Err(e) = stream.set_read_timeout(cfg.read_timeout) {
        warn!("read timeout not applied: {e}");
    }

    send_request(&stream, Request::StreamAll, "stream-all")?;
    let mut reader = BufReader::new(&stream);

    let mut packets: Vec<Packet> = Vec::new();
    let mut in_sync = true;
    match receive_all(&mut reader, &mut packets) {
        Ok(()) => debug!("stream closed cleanly after {} packets", packets.len()),
        Err(RecvError::Io { got, source }) if got > 0 => {
            in_sync = false;
            warn!("drain failed {got} bytes into a packet ({source}); resends disabled");
        }
        Err(e) => warn!(
            "full-stream drain stopped early ({e}); reconciling {} packets",
            packets.len()
        ),
    }
    let streamed = packets.len();
    if let Some(tx) = tap {
        for p in &packets {
            tx.send(p.clone()).ok();
        }
    }

    let missing = missing_sequences(&packets);
    info!(
        "drain done: {streamed} packets received, {} missing",
        missing.len()
    );

    let mut recovered = 0usize;
    let mut unrepaired = Vec::new();
    if !in_sync {
        // stale bytes of the aborted packet would misframe every reply
        unrepaired.extend(&missing);
    } else {
        for &seq in &missing {
            let request = match Request::resend(seq) {
                Ok(r) => r,
                Err(e) => {
                    warn!("sequence {seq} not repairable: {e}");
                    unrepaired.push(seq);
                    continue;
                }
            };
            send_request(&stream, request, "resend")?;
            match receive_one(&mut reader) {
                Some(p) => {
                    debug!("resend for {seq} delivered sequence {}", p.sequence);
                    if let Some(tx) = tap {
                        tx.send(p.clone()).ok();
                    }
                    packets.push(p);
                    recovered += 1;
                }
                None => unrepaired.push(seq),
            }
        }
    }

    packets.sort_by_key(|p| p.sequence);
    Ok(SessionReport {
        packets,
        streamed,
        missing,
        recovered,
        unrepaired,
    })
}

fn connect(cfg: &SessionConfig) -> Result<TcpStream, SessionError> {
    let addrs: Vec<SocketAddr> = (cfg.host.as_str(), cfg.port)
        .to_socket_addrs()
        .map_err(|source| SessionError::Resolve {
            host: cfg.host.clone(),
            port: cfg.port,
            source,
        })?
        .collect();

    let mut last: Option<(SocketAddr, io::Error)> = None;
    for addr in addrs {
        let attempt = match cfg.connect_timeout {
            Some(limit) => TcpStream::connect_timeout(&addr, limit),
            None => TcpStream::connect(addr),
        };
        match attempt {
            Ok(stream) => {
                debug!("connected to {addr}");
                return Ok(stream);
            }
            Err(e) => last = Some((addr, e)),
        }
    }
    match last {
        Some((addr, source)) => Err(SessionError::Connect { addr, source }),
        None => Err(SessionError::NoAddress {
            host: cfg.host.clone(),
            port: cfg.port,
        }),
    }
}

fn send_request(
    mut stream: &TcpStream,
    request: Request,
    what: &'static str,
) -> Result<(), SessionError> {
    stream
        .write_all(&request.encode())
        .map_err(|source| SessionError::Send { what, source })
}
