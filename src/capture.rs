//! Framed capture journal: the on-disk record of a session, one frame per
//! packet in arrival order, preceded by a header frame.
//!
//! Frame layout is `len: u32 LE | crc32: u32 LE | payload[len]` with the
//! payload a bincode-encoded [`CaptureFrame`]. CRCs are verified on read, and
//! a file that ends mid-frame is reported as truncated rather than decoded
//! partially.
use std::io::{self, Read, Write};

use crc32fast::Hasher as Crc32;
use thiserror::Error;

use crate::record::CaptureFrame;

/// Format version written into the header frame.
pub const CAPTURE_VERSION: u16 = 1;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("frame CRC mismatch: file={file:#010x} computed={computed:#010x}")]
    CrcMismatch { file: u32, computed: u32 },
    #[error("capture ends mid-frame")]
    Truncated,
    #[error("frame codec: {0}")]
    Codec(#[from] bincode::Error),
    #[error("capture I/O: {0}")]
    Io(#[from] io::Error),
}

/// Append one frame.
pub fn write_frame<W: Write>(w: &mut W, frame: &CaptureFrame) -> Result<(), CaptureError> {
    let payload = bincode::serialize(frame)?;
    let mut hasher = Crc32::new();
    hasher.update(&payload);
    let crc = hasher.finalize();

    let len = payload.len() as u32;
    w.write_all(&len.to_le_bytes())?;
    w.write_all(&crc.to_le_bytes())?;
    w.write_all(&payload)?;
    Ok(())
}

/// Read the next frame; `Ok(None)` at a clean end of file.
pub fn read_frame<R: Read>(r: &mut R) -> Result<Option<CaptureFrame>, CaptureError> {
    // len + crc prefix; EOF before the first byte is a clean end
    let mut prefix = [0u8; 8];
    let mut filled = 0usize;
    while filled < prefix.len() {
        let n = match r.read(&mut prefix[filled..]) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(CaptureError::Io(e)),
        };
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(CaptureError::Truncated);
        }
        filled += n;
    }
    let len = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
    let file_crc = u32::from_le_bytes([prefix[4], prefix[5], prefix[6], prefix[7]]);

    let mut payload = vec![0u8; len];
    r.read_exact(&mut payload).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            CaptureError::Truncated
        } else {
            CaptureError::Io(e)
        }
    })?;

    let mut hasher = Crc32::new();
    hasher.update(&payload);
    let computed = hasher.finalize();
    if computed != file_crc {
        return Err(CaptureError::CrcMismatch {
            file: file_crc,
            computed,
        });
    }
    Ok(Some(bincode::deserialize(&payload)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{CaptureHeader, Packet};
    use std::io::Cursor;

    fn header() -> CaptureFrame {
        CaptureFrame::Header(CaptureHeader {
            version: CAPTURE_VERSION,
            created_unix_ns: 12_345,
            host: "localhost".into(),
            port: 3000,
        })
    }

    fn packet(seq: i32) -> CaptureFrame {
        CaptureFrame::Packet(Packet {
            symbol: "ABXC".into(),
            side: 'S',
            quantity: 2,
            price: 9,
            sequence: seq,
        })
    }

    #[test]
    fn roundtrip_preserves_frame_order() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &header()).unwrap();
        for seq in [5, 2, 9] {
            write_frame(&mut buf, &packet(seq)).unwrap();
        }

        let mut r = Cursor::new(buf);
        match read_frame(&mut r).unwrap().unwrap() {
            CaptureFrame::Header(h) => {
                assert_eq!(h.version, CAPTURE_VERSION);
                assert_eq!(h.host, "localhost");
                assert_eq!(h.port, 3000);
            }
            other => panic!("expected header frame, got {other:?}"),
        }
        let mut seqs = Vec::new();
        while let Some(frame) = read_frame(&mut r).unwrap() {
            match frame {
                CaptureFrame::Packet(p) => seqs.push(p.sequence),
                CaptureFrame::Header(_) => panic!("second header frame"),
            }
        }
        assert_eq!(seqs, [5, 2, 9]);
    }

    #[test]
    fn corrupted_payload_fails_crc() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &packet(1)).unwrap();
        let last = buf.len() - 1;
        buf[last] ^= 0xFF;
        let err = read_frame(&mut Cursor::new(buf)).unwrap_err();
        assert!(matches!(err, CaptureError::CrcMismatch { .. }));
    }

    #[test]
    fn truncated_tail_is_detected() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &packet(1)).unwrap();
        write_frame(&mut buf, &packet(2)).unwrap();
        buf.truncate(buf.len() - 4);
        let mut r = Cursor::new(buf);
        assert!(read_frame(&mut r).unwrap().is_some());
        assert!(matches!(
            read_frame(&mut r).unwrap_err(),
            CaptureError::Truncated
        ));
    }

    #[test]
    fn cut_inside_the_prefix_is_truncation_too() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &packet(1)).unwrap();
        buf.truncate(3); // not even a full length word
        assert!(matches!(
            read_frame(&mut Cursor::new(buf)).unwrap_err(),
            CaptureError::Truncated
        ));
    }

    #[test]
    fn empty_file_is_clean_eof() {
        assert!(
            read_frame(&mut Cursor::new(Vec::<u8>::new()))
                .unwrap()
                .is_none()
        );
    }
}
