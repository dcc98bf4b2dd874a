//! On-disk frame format.
//!
//! Frame format:
//! - len: u64 (big-endian)
//! - payload: bytes[len]
//!
//! Frames are written back-to-back with no header, padding, or checksum.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Number of bytes used to store a record's length.
pub const LEN_WIDTH: usize = 8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("Incomplete frame")]
    Incomplete,
}

/// Total on-disk size of a frame carrying `record_len` payload bytes.
pub fn frame_len(record_len: usize) -> u64 {
    (LEN_WIDTH + record_len) as u64
}

/// Encodes a record as a single contiguous frame.
pub fn encode(record: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(LEN_WIDTH + record.len());
    buf.put_u64(record.len() as u64);
    buf.put_slice(record);
    buf.freeze()
}

/// Decodes a length prefix.
pub fn decode_len(prefix: [u8; LEN_WIDTH]) -> u64 {
    u64::from_be_bytes(prefix)
}

/// Decodes the frame at the start of `data`.
///
/// Returns the payload and the number of bytes consumed, so a raw store
/// image can be walked frame by frame.
pub fn decode(data: &[u8]) -> Result<(&[u8], usize), FrameError> {
    let Some(prefix) = data.get(..LEN_WIDTH) else {
        return Err(FrameError::Incomplete);
    };
    let mut len_buf = [0u8; LEN_WIDTH];
    len_buf.copy_from_slice(prefix);

    let len = usize::try_from(decode_len(len_buf)).map_err(|_| FrameError::Incomplete)?;
    let end = LEN_WIDTH.checked_add(len).ok_or(FrameError::Incomplete)?;

    match data.get(LEN_WIDTH..end) {
        Some(payload) => Ok((payload, end)),
        None => Err(FrameError::Incomplete),
    }
}
