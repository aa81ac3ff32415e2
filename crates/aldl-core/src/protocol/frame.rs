//! Frame handling
//!
//! ALDL responses have no length prefix or delimiter. A frame starts with
//! the header byte (the first byte of the request) and ends with a checksum
//! byte chosen so that all bytes of the frame sum to zero modulo 256.
//!
//! Response layout:
//! - optional echo of the request (hardware loopback)
//! - `expected_frame_length` bytes: header, data..., checksum

use super::FrameError;

/// Checksum for `data`: the byte that brings the sum to 0 mod 256
pub fn compute_checksum(data: &[u8]) -> u8 {
    let sum = data.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    sum.wrapping_neg()
}

/// Check a frame whose last byte is the checksum of everything before it.
/// Frames shorter than two bytes are never valid.
pub fn validate_checksum(frame: &[u8]) -> bool {
    match frame.split_last() {
        Some((checksum, body)) if !body.is_empty() => compute_checksum(body) == *checksum,
        _ => false,
    }
}

/// Strip a looped-back copy of `request` from the start of `buffer`.
///
/// Only an exact prefix match is removed, and only when `echo_cancel` is
/// set; otherwise the buffer is returned untouched.
pub fn strip_echo<'a>(buffer: &'a [u8], request: &[u8], echo_cancel: bool) -> &'a [u8] {
    if echo_cancel && !request.is_empty() {
        buffer.strip_prefix(request).unwrap_or(buffer)
    } else {
        buffer
    }
}

/// Index of the first occurrence of `header` in `data`
pub fn find_sync(data: &[u8], header: u8) -> Result<usize, FrameError> {
    data.iter()
        .position(|b| *b == header)
        .ok_or(FrameError::NoSync {
            header,
            received: data.len(),
        })
}

/// Take exactly `frame_length` bytes starting at `sync`
pub fn extract_frame(data: &[u8], sync: usize, frame_length: usize) -> Result<&[u8], FrameError> {
    let available = data.len().saturating_sub(sync);
    if available < frame_length {
        return Err(FrameError::ShortFrame {
            expected: frame_length,
            actual: available,
        });
    }
    Ok(&data[sync..sync + frame_length])
}

/// Validate the checksum of an extracted frame
pub fn verify_frame(frame: &[u8]) -> Result<(), FrameError> {
    if validate_checksum(frame) {
        return Ok(());
    }
    let (actual, body) = frame.split_last().map(|(c, b)| (*c, b)).unwrap_or((0, frame));
    Err(FrameError::ChecksumMismatch {
        expected: compute_checksum(body),
        actual,
    })
}

/// Append the checksum byte to a frame body
pub fn seal_frame(mut body: Vec<u8>) -> Vec<u8> {
    let checksum = compute_checksum(&body);
    body.push(checksum);
    body
}
