//! Acquisition cycle state machine
//!
//! One cycle runs `Idle → Requesting → AwaitingResponse → Reassembling →
//! Destuffing → Synchronizing → Validating → Decoding` and finishes in
//! either [`CycleState::Emit`] or [`CycleState::Abort`]. The I/O states are
//! driven by the engine; everything after the read phase is a pure
//! transition so each failure path can be exercised without a transport.

use chrono::{DateTime, Utc};

use super::frame::{extract_frame, find_sync, strip_echo, verify_frame};
use super::{CycleFault, FrameError};
use crate::definition::DecoderSchema;
use crate::realtime::{decode_frame, Snapshot};

/// Where a cycle currently is
#[derive(Debug)]
pub enum CycleState {
    /// Between cycles
    Idle,
    /// Writing the request command
    Requesting,
    /// Request sent, nothing received yet
    AwaitingResponse,
    /// Accumulating response bytes until full, deadline or end of stream
    Reassembling {
        /// Bytes received so far
        buffer: Vec<u8>,
    },
    /// Removing an echoed request from the front of the buffer
    Destuffing {
        /// Complete response buffer
        buffer: Vec<u8>,
    },
    /// Looking for the header byte
    Synchronizing {
        /// Response with any echo removed
        data: Vec<u8>,
    },
    /// Checking length and checksum of the candidate frame
    Validating {
        /// Response with any echo removed
        data: Vec<u8>,
        /// Index of the header byte
        sync: usize,
    },
    /// Turning a valid frame into values
    Decoding {
        /// Checksum-valid frame
        frame: Vec<u8>,
    },
    /// Cycle succeeded
    Emit(Snapshot),
    /// Cycle failed; nothing is published
    Abort(CycleFault),
}

impl CycleState {
    /// Whether the cycle has finished
    pub fn is_terminal(&self) -> bool {
        matches!(self, CycleState::Emit(_) | CycleState::Abort(_))
    }

    /// Short state name for logs
    pub fn name(&self) -> &'static str {
        match self {
            CycleState::Idle => "idle",
            CycleState::Requesting => "requesting",
            CycleState::AwaitingResponse => "awaiting-response",
            CycleState::Reassembling { .. } => "reassembling",
            CycleState::Destuffing { .. } => "destuffing",
            CycleState::Synchronizing { .. } => "synchronizing",
            CycleState::Validating { .. } => "validating",
            CycleState::Decoding { .. } => "decoding",
            CycleState::Emit(_) => "emit",
            CycleState::Abort(_) => "abort",
        }
    }

    /// Advance one post-read step. I/O states and terminal states are
    /// returned unchanged.
    pub fn advance(self, schema: &DecoderSchema, captured_at: DateTime<Utc>) -> CycleState {
        match self {
            CycleState::Reassembling { buffer } => CycleState::Destuffing { buffer },
            CycleState::Destuffing { buffer } => destuff(buffer, schema),
            CycleState::Synchronizing { data } => synchronize(data, schema),
            CycleState::Validating { data, sync } => validate(data, sync, schema),
            CycleState::Decoding { frame } => {
                CycleState::Emit(decode_frame(&frame, schema, captured_at))
            }
            other => other,
        }
    }

    /// Run the post-read states to completion
    pub fn finish(mut self, schema: &DecoderSchema, captured_at: DateTime<Utc>) -> CycleState {
        loop {
            match self {
                CycleState::Reassembling { .. }
                | CycleState::Destuffing { .. }
                | CycleState::Synchronizing { .. }
                | CycleState::Validating { .. }
                | CycleState::Decoding { .. } => self = self.advance(schema, captured_at),
                other => return other,
            }
        }
    }
}

fn destuff(buffer: Vec<u8>, schema: &DecoderSchema) -> CycleState {
    let stripped = strip_echo(&buffer, &schema.request_command, schema.echo_cancel);
    let data = if stripped.len() == buffer.len() {
        buffer
    } else {
        stripped.to_vec()
    };
    CycleState::Synchronizing { data }
}

fn synchronize(data: Vec<u8>, schema: &DecoderSchema) -> CycleState {
    let Some(header) = schema.header_byte() else {
        return CycleState::Abort(
            FrameError::NoSync {
                header: 0,
                received: data.len(),
            }
            .into(),
        );
    };
    match find_sync(&data, header) {
        Ok(sync) => CycleState::Validating { data, sync },
        Err(e) => CycleState::Abort(e.into()),
    }
}

fn validate(data: Vec<u8>, sync: usize, schema: &DecoderSchema) -> CycleState {
    let checked = extract_frame(&data, sync, schema.expected_frame_length)
        .and_then(|frame| verify_frame(frame).map(|_| frame.to_vec()));
    match checked {
        Ok(frame) => CycleState::Decoding { frame },
        Err(e) => CycleState::Abort(e.into()),
    }
}

/// Process a raw response buffer into a snapshot
pub fn process_response(
    buffer: Vec<u8>,
    schema: &DecoderSchema,
    captured_at: DateTime<Utc>,
) -> Result<Snapshot, CycleFault> {
    match (CycleState::Destuffing { buffer }).finish(schema, captured_at) {
        CycleState::Emit(snapshot) => Ok(snapshot),
        CycleState::Abort(fault) => Err(fault),
        other => unreachable!("cycle finished in non-terminal state {}", other.name()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::compile;
    use crate::protocol::frame::seal_frame;

    const REQUEST: [u8; 5] = [0xF4, 0x57, 0x01, 0x00, 0xB4];

    fn schema(echo_cancel: bool) -> DecoderSchema {
        let mut schema = compile(
            r#"<ADXFILE>
                <ADXVALUE id="rpm" title="Engine RPM"><packetoffset>1</packetoffset><bytecount>2</bytecount><factor>25</factor></ADXVALUE>
                <ADXVALUE id="tps" title="TPS"><packetoffset>3</packetoffset><factor>0.5</factor><offset>-10</offset></ADXVALUE>
               </ADXFILE>"#,
            "t",
        )
        .unwrap();
        schema.echo_cancel = echo_cancel;
        schema
    }

    fn frame() -> Vec<u8> {
        seal_frame(vec![0xF4, 0x00, 0x20, 100])
    }

    #[test]
    fn test_full_walk_through_states() {
        let schema = schema(true);
        let mut buffer = REQUEST.to_vec();
        buffer.extend(frame());
        let at = Utc::now();

        let state = CycleState::Reassembling { buffer }.advance(&schema, at);
        assert_eq!(state.name(), "destuffing");
        let state = state.advance(&schema, at);
        let CycleState::Synchronizing { ref data } = state else {
            panic!("expected synchronizing, got {}", state.name());
        };
        assert_eq!(data.len(), 5);
        let state = state.advance(&schema, at);
        assert!(matches!(state, CycleState::Validating { sync: 0, .. }));
        let state = state.advance(&schema, at).advance(&schema, at);
        let CycleState::Emit(snapshot) = state else {
            panic!("expected emit");
        };
        assert_eq!(snapshot.get("rpm"), Some(800.0));
        assert_eq!(snapshot.get("tps"), Some(40.0));
    }

    #[test]
    fn test_sync_miss_aborts() {
        let result = process_response(vec![0x01, 0x02, 0x03], &schema(true), Utc::now());
        assert!(matches!(
            result,
            Err(CycleFault::Frame(FrameError::NoSync { header: 0xF4, received: 3 }))
        ));
    }

    #[test]
    fn test_short_read_aborts() {
        let mut partial = frame();
        partial.truncate(3);
        let result = process_response(partial, &schema(true), Utc::now());
        assert!(matches!(
            result,
            Err(CycleFault::Frame(FrameError::ShortFrame { expected: 5, actual: 3 }))
        ));
    }

    #[test]
    fn test_bad_checksum_aborts() {
        let mut bad = frame();
        bad[4] = bad[4].wrapping_add(1);
        let result = process_response(bad, &schema(true), Utc::now());
        assert!(matches!(
            result,
            Err(CycleFault::Frame(FrameError::ChecksumMismatch { .. }))
        ));
    }

    #[test]
    fn test_empty_buffer_aborts() {
        let result = process_response(Vec::new(), &schema(true), Utc::now());
        assert!(matches!(result, Err(CycleFault::Frame(FrameError::NoSync { .. }))));
    }

    #[test]
    fn test_echo_without_cancel_syncs_on_echo() {
        // The mode 1 request is itself checksummed, so with cancellation off
        // an echoed request passes validation and is decoded as the frame.
        let mut buffer = REQUEST.to_vec();
        buffer.extend(frame());
        let snapshot = process_response(buffer, &schema(false), Utc::now()).unwrap();
        assert_eq!(snapshot.get("rpm"), Some((0x5701 * 25) as f64));
        assert_eq!(snapshot.get("tps"), Some(-10.0));
    }

    #[test]
    fn test_leading_noise_is_skipped() {
        let mut buffer = vec![0x00, 0x13];
        buffer.extend(frame());
        let snapshot = process_response(buffer, &schema(false), Utc::now()).unwrap();
        assert_eq!(snapshot.get("tps"), Some(40.0));
    }

    #[test]
    fn test_io_states_do_not_advance() {
        let at = Utc::now();
        let s = schema(true);
        assert!(matches!(CycleState::Idle.advance(&s, at), CycleState::Idle));
        assert!(matches!(CycleState::Requesting.advance(&s, at), CycleState::Requesting));
        assert!(!CycleState::AwaitingResponse.is_terminal());
    }
}
