use abx_client::capture::read_frame;
use abx_client::gaps::{duplicate_count, missing_sequences};
use abx_client::record::{CaptureFrame, Packet};
use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(about = "Play a capture journal and report coverage of the sequence range")]
struct Args {
    /// Input file path to read (capture .bin)
    #[arg(long, short = 'i')]
    input: PathBuf,

    /// Print each packet as it is read
    #[arg(long, default_value_t = false)]
    print: bool,

    /// Export the packets, sorted by sequence, to this JSON file
    #[arg(long)]
    json: Option<PathBuf>,
}

fn format_created(created_unix_ns: u128) -> Option<String> {
    let ts = time::OffsetDateTime::from_unix_timestamp_nanos(created_unix_ns as i128).ok()?;
    let fmt = time::macros::format_description!("[year]-[month]-[day] [hour]:[minute]:[second] UTC");
    ts.format(fmt).ok()
}

fn main() -> Result<()> {
    let args = Args::parse();
    let file = File::open(&args.input).with_context(|| format!("open {:?}", args.input))?;
    let mut rdr = BufReader::new(file);

    let mut packets: Vec<Packet> = Vec::new();
    let mut frames = 0usize;
    while let Some(frame) = read_frame(&mut rdr).with_context(|| format!("frame {frames}"))? {
        match frame {
            CaptureFrame::Header(h) => {
                let created = format_created(h.created_unix_ns)
                    .unwrap_or_else(|| format!("{}ns", h.created_unix_ns));
                eprintln!("Header: v{} {}:{} created {}", h.version, h.host, h.port, created);
            }
            CaptureFrame::Packet(p) => {
                if args.print {
                    println!(
                        "seq={} {} {} qty={} price={}",
                        p.sequence, p.symbol, p.side, p.quantity, p.price
                    );
                }
                packets.push(p);
            }
        }
        frames += 1;
    }

    let missing = missing_sequences(&packets);
    let duplicates = duplicate_count(&packets);
    let span = match (
        packets.iter().map(|p| p.sequence).min(),
        packets.iter().map(|p| p.sequence).max(),
    ) {
        (Some(lo), Some(hi)) => format!("{lo}..={hi}"),
        _ => "-".to_string(),
    };

    eprintln!(
        "Read {} frames: {} packets, span {}, {} missing, {} duplicate(s).",
        frames,
        packets.len(),
        span,
        missing.len(),
        duplicates
    );
    if !missing.is_empty() {
        eprintln!("missing sequences: {missing:?}");
    }

    if let Some(path) = args.json {
        packets.sort_by_key(|p| p.sequence);
        let f = File::create(&path).with_context(|| format!("create {:?}", path))?;
        let mut w = BufWriter::new(f);
        serde_json::to_writer_pretty(&mut w, &packets).context("encode packets as JSON")?;
        w.flush()?;
        eprintln!("exported {} packets to {:?}", packets.len(), path);
    }
    Ok(())
}
