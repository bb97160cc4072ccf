use abx_client::capture::{CAPTURE_VERSION, write_frame};
use abx_client::record::{CaptureFrame, CaptureHeader, Packet};
use abx_client::session::{SessionConfig, run_session};
use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{Receiver, Sender, bounded};
use dotenvy::dotenv;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(version, about = "Exchange feed client: stream, repair gaps, save JSON")]
struct Args {
    /// Exchange host
    #[arg(long, env = "ABX_HOST", default_value = "localhost")]
    host: String,

    /// Exchange TCP port
    #[arg(long, env = "ABX_PORT", default_value_t = 3000)]
    port: u16,

    /// Output path for the final JSON record set
    #[arg(long, env = "ABX_OUT", default_value = "received_packets.json")]
    out: PathBuf,

    /// Optional capture journal (.bin) of packets in arrival order
    #[arg(long, env = "ABX_CAPTURE")]
    capture: Option<PathBuf>,

    /// Connect timeout in milliseconds; 0 waits forever
    #[arg(long, env = "ABX_CONNECT_TIMEOUT_MS", default_value_t = 5000)]
    connect_timeout_ms: u64,

    /// Per-read timeout in milliseconds; 0 waits forever
    #[arg(long, env = "ABX_READ_TIMEOUT_MS", default_value_t = 5000)]
    read_timeout_ms: u64,
}

fn now_unix_ns() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
}

fn writer_thread(out: PathBuf, header: CaptureHeader, rx: Receiver<Packet>) -> Result<()> {
    if let Some(parent) = out.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).ok();
        }
    }
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&out)
        .with_context(|| format!("create capture {:?}", out))?;
    let mut w = BufWriter::with_capacity(1 << 20, file); // 1 MiB buffer
    write_frame(&mut w, &CaptureFrame::Header(header))?;
    for packet in rx {
        write_frame(&mut w, &CaptureFrame::Packet(packet))?;
    }
    w.flush()?;
    Ok(())
}

fn write_json(path: &Path, packets: &[Packet]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).ok();
        }
    }
    let file = File::create(path).with_context(|| format!("create {:?}", path))?;
    let mut w = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut w, packets).context("encode packets as JSON")?;
    w.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    // Load environment variables from .env if present
    let _ = dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();
    let args = Args::parse();

    let cfg = SessionConfig {
        host: args.host.clone(),
        port: args.port,
        connect_timeout: match args.connect_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        },
        read_timeout: match args.read_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        },
    };

    // Optional capture writer, fed in arrival order while the session runs
    let mut capture: Option<(Sender<Packet>, JoinHandle<Result<()>>, PathBuf)> = None;
    if let Some(path) = args.capture.clone() {
        let header = CaptureHeader {
            version: CAPTURE_VERSION,
            created_unix_ns: now_unix_ns(),
            host: args.host.clone(),
            port: args.port,
        };
        let (tx, rx) = bounded::<Packet>(8192);
        let worker_path = path.clone();
        let handle = thread::spawn(move || writer_thread(worker_path, header, rx));
        capture = Some((tx, handle, path));
    }

    info!("connecting to {}:{}", args.host, args.port);
    let tap = capture.as_ref().map(|(tx, _, _)| tx);
    let result = run_session(&cfg, tap);

    // Close the tap and let the writer drain before reporting the outcome
    if let Some((tx, handle, path)) = capture {
        drop(tx);
        match handle.join() {
            Ok(Ok(())) => info!("capture journal written to {:?}", path),
            Ok(Err(e)) => warn!("capture writer failed: {e:#}"),
            Err(_) => warn!("capture writer panicked"),
        }
    }

    let report = result.with_context(|| format!("session with {}:{}", args.host, args.port))?;

    info!(
        "session done: {} streamed, {} missing, {} recovered, {} unrepaired",
        report.streamed,
        report.missing.len(),
        report.recovered,
        report.unrepaired.len()
    );
    if !report.unrepaired.is_empty() {
        warn!("unrepaired sequences: {:?}", report.unrepaired);
    }

    write_json(&args.out, &report.packets)?;
    info!("saved {} packets to {:?}", report.packets.len(), args.out);
    Ok(())
}
