//! Frame decoding
//!
//! Turns a validated frame into a [`Snapshot`] using the schema's
//! parameter and bit definitions.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use super::Snapshot;
use crate::definition::DecoderSchema;

/// Decode a validated frame.
///
/// Parameters whose bytes fall outside the frame are left out of the
/// snapshot rather than treated as errors. The result depends only on the
/// inputs.
pub fn decode_frame(frame: &[u8], schema: &DecoderSchema, captured_at: DateTime<Utc>) -> Snapshot {
    let values: BTreeMap<String, f64> = schema
        .parameters
        .iter()
        .filter(|p| p.byte_offset < frame.len())
        .filter_map(|p| p.parse(frame).map(|v| (p.id.clone(), v)))
        .collect();

    let flags: BTreeMap<String, bool> = schema
        .bit_flags
        .iter()
        .filter_map(|b| b.read(frame).map(|set| (b.id.clone(), set)))
        .collect();

    Snapshot::new(captured_at, values, flags)
}
