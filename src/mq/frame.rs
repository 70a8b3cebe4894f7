//! Segment frame format
//!
//! ```text
//! frame := len(u32 LE) timestamp(i64 LE) payload(len bytes) crc32(u32 LE)
//! ```
//!
//! The checksum (CRC32, IEEE polynomial) covers the timestamp and the payload.
//! Any mismatch, or a frame cut short by the end of the file, is corruption.

use std::io::{self, Read};

use crc32fast::Hasher;

use super::errors::{MqError, MqResult};

/// Bytes of fixed overhead per frame
pub const FRAME_OVERHEAD: u64 = 4 + 8 + 4;

/// One decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Append timestamp in milliseconds since the Unix epoch
    pub timestamp: i64,
    /// Record bytes
    pub payload: Vec<u8>,
}

impl Frame {
    /// Bytes this frame occupies on disk
    pub fn encoded_len(&self) -> u64 {
        FRAME_OVERHEAD + self.payload.len() as u64
    }
}

fn checksum(timestamp: i64, payload: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&timestamp.to_le_bytes());
    hasher.update(payload);
    hasher.finalize()
}

/// Serialize a frame.
///
/// # Errors
///
/// Returns `KV_MQ_RECORD_TOO_LARGE` if the payload length does not fit a u32.
pub fn encode_frame(timestamp: i64, payload: &[u8]) -> MqResult<Vec<u8>> {
    let len = u32::try_from(payload.len())
        .map_err(|_| MqError::RecordTooLarge { len: payload.len() })?;

    let mut buf = Vec::with_capacity(FRAME_OVERHEAD as usize + payload.len());
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(&timestamp.to_le_bytes());
    buf.extend_from_slice(payload);
    buf.extend_from_slice(&checksum(timestamp, payload).to_le_bytes());
    Ok(buf)
}

/// Outcome of reading at a frame boundary
#[derive(Debug)]
pub enum FrameRead {
    /// A complete, verified frame
    Frame(Frame),
    /// The reader was exactly at end of input
    End,
}

/// Read one frame.
///
/// Returns `Ok(Err(reason))` for a damaged or truncated frame so the caller
/// can attach its own location; I/O failures come back as `Err`.
pub fn read_frame<R: Read>(reader: &mut R) -> io::Result<Result<FrameRead, String>> {
    let mut len_buf = [0u8; 4];
    match read_full(reader, &mut len_buf)? {
        0 => return Ok(Ok(FrameRead::End)),
        4 => {}
        n => return Ok(Err(format!("truncated frame length ({} of 4 bytes)", n))),
    }
    let len = u32::from_le_bytes(len_buf) as usize;

    let mut ts_buf = [0u8; 8];
    if read_full(reader, &mut ts_buf)? != ts_buf.len() {
        return Ok(Err("truncated frame timestamp".to_string()));
    }
    let timestamp = i64::from_le_bytes(ts_buf);

    let mut payload = vec![0u8; len];
    let got = read_full(reader, &mut payload)?;
    if got != len {
        return Ok(Err(format!("frame declares {} bytes, {} present", len, got)));
    }

    let mut crc_buf = [0u8; 4];
    if read_full(reader, &mut crc_buf)? != crc_buf.len() {
        return Ok(Err("truncated frame checksum".to_string()));
    }
    if u32::from_le_bytes(crc_buf) != checksum(timestamp, &payload) {
        return Ok(Err("checksum mismatch".to_string()));
    }

    Ok(Ok(FrameRead::Frame(Frame { timestamp, payload })))
}

/// Like `read_exact`, but reports how much was read before end of input.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn read(bytes: &[u8]) -> Result<FrameRead, String> {
        read_frame(&mut Cursor::new(bytes)).unwrap()
    }

    #[test]
    fn test_frame_layout() {
        let bytes = encode_frame(7, b"abc").unwrap();
        assert_eq!(bytes.len() as u64, FRAME_OVERHEAD + 3);
        assert_eq!(&bytes[0..4], &3u32.to_le_bytes());
        assert_eq!(&bytes[4..12], &7i64.to_le_bytes());
        assert_eq!(&bytes[12..15], b"abc");
    }

    #[test]
    fn test_frames_read_back_in_sequence() {
        let mut bytes = encode_frame(1, b"first").unwrap();
        bytes.extend(encode_frame(2, b"").unwrap());
        let mut cursor = Cursor::new(bytes);

        match read_frame(&mut cursor).unwrap().unwrap() {
            FrameRead::Frame(frame) => {
                assert_eq!(frame.timestamp, 1);
                assert_eq!(frame.payload, b"first");
                assert_eq!(frame.encoded_len(), FRAME_OVERHEAD + 5);
            }
            FrameRead::End => panic!("expected a frame"),
        }
        assert!(matches!(
            read_frame(&mut cursor).unwrap().unwrap(),
            FrameRead::Frame(Frame { timestamp: 2, .. })
        ));
        assert!(matches!(read_frame(&mut cursor).unwrap().unwrap(), FrameRead::End));
    }

    #[test]
    fn test_every_truncation_is_detected() {
        let bytes = encode_frame(42, b"payload").unwrap();
        for cut in 1..bytes.len() {
            assert!(read(&bytes[..cut]).is_err(), "cut at {} not detected", cut);
        }
    }

    #[test]
    fn test_bit_flip_is_detected() {
        let mut bytes = encode_frame(42, b"payload").unwrap();
        bytes[14] ^= 0x01;
        assert_eq!(read(&bytes).unwrap_err(), "checksum mismatch");
    }
}
