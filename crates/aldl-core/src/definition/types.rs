//! Compiled definition types

use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};

use super::gauges::GaugeDef;

/// Longest frame a definition may describe, checksum included. Parameter
/// offsets are single bytes on the wire.
pub const MAX_FRAME_LENGTH: usize = 256;

/// A numeric sensor parameter read from the data frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    /// Unique parameter identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// Unit of measurement
    pub units: String,

    /// Byte offset into the frame (after any stripped echo)
    pub byte_offset: usize,

    /// Width of the raw value, 1 or 2 bytes
    pub byte_count: usize,

    /// Scale factor
    pub scale: f64,

    /// Translation offset
    pub offset: f64,
}

impl ParameterDef {
    /// Create a single-byte, unscaled parameter
    pub fn new(id: impl Into<String>, title: impl Into<String>, byte_offset: usize) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            units: String::new(),
            byte_offset,
            byte_count: 1,
            scale: 1.0,
            offset: 0.0,
        }
    }

    /// First byte past this parameter's raw value
    pub fn end(&self) -> usize {
        self.byte_offset.saturating_add(self.byte_count)
    }

    /// Convert a raw value to display value
    pub fn raw_to_display(&self, raw: f64) -> f64 {
        raw * self.scale + self.offset
    }

    /// Read the raw value from a frame. Two-byte values are big-endian.
    pub fn read_raw(&self, frame: &[u8]) -> Option<u16> {
        let bytes = frame.get(self.byte_offset..self.end())?;
        match self.byte_count {
            2 => Some(BigEndian::read_u16(bytes)),
            _ => Some(bytes[0] as u16),
        }
    }

    /// Read and scale the value from a frame
    pub fn parse(&self, frame: &[u8]) -> Option<f64> {
        self.read_raw(frame)
            .map(|raw| self.raw_to_display(raw as f64))
    }
}

/// A single-bit status flag inside the frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitDef {
    /// Flag identifier, synthesized when the definition has none
    pub id: String,
    /// Human-readable title
    pub title: String,
    /// Frame byte holding the flag (the parent parameter's offset)
    pub byte_offset: usize,
    /// Bit position within the byte, 0-7
    pub bit_position: u8,
}

impl BitDef {
    /// Whether the flag is set in `frame`; `None` if the byte is outside it.
    pub fn read(&self, frame: &[u8]) -> Option<bool> {
        frame
            .get(self.byte_offset)
            .map(|byte| (byte >> self.bit_position) & 1 == 1)
    }
}

/// Immutable decoding configuration compiled from an ADX definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecoderSchema {
    /// Fresh random identifier, unique per compile
    pub id: String,

    /// Definition name (root `title`, else the file name)
    pub name: String,

    /// ECM mask identifier
    pub mask: String,

    /// Fixed description text
    pub description: String,

    /// Bytes transmitted at the start of every cycle
    pub request_command: Vec<u8>,

    /// Response frame length including the trailing checksum byte
    pub expected_frame_length: usize,

    /// Line speed, 8192 unless the definition says otherwise
    pub baud_rate: u32,

    /// Strip a looped-back copy of the request from received data
    pub echo_cancel: bool,

    /// Numeric parameters in document order
    pub parameters: Vec<ParameterDef>,

    /// Status bits in document order
    pub bit_flags: Vec<BitDef>,

    /// Display-oriented subset of the parameters
    pub gauges: Vec<GaugeDef>,
}

impl DecoderSchema {
    /// Frame length needed to hold every parameter plus the checksum byte
    pub fn derive_frame_length(parameters: &[ParameterDef]) -> usize {
        parameters
            .iter()
            .map(ParameterDef::end)
            .max()
            .unwrap_or(0)
            .saturating_add(1)
    }

    /// The header byte frames are synchronized on
    pub fn header_byte(&self) -> Option<u8> {
        self.request_command.first().copied()
    }

    /// Number of bytes a full response occupies when the request is echoed
    pub fn max_response_length(&self) -> usize {
        self.request_command
            .len()
            .saturating_add(self.expected_frame_length)
    }

    /// Look up a parameter by id
    pub fn parameter(&self, id: &str) -> Option<&ParameterDef> {
        self.parameters.iter().find(|p| p.id == id)
    }
}
