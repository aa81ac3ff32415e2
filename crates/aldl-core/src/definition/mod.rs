//! ADX Definition Compiler
//!
//! Compiles ADX sensor-map documents into an immutable [`DecoderSchema`].
//! An ADX file describes:
//! - Serial settings (baud rate, echo cancellation)
//! - Parameters (byte offset, width, scale/offset, units)
//! - Status bits nested under parameters
//! - Commands, one of which is the streaming data request

mod compiler;
mod error;
pub mod fields;
mod gauges;
mod markup;
mod types;

pub use compiler::compile;
pub use error::CompileError;
pub use gauges::{derive_gauges, GaugeDef, GAUGE_KEYWORDS, MAX_INITIAL_GAUGES};
pub use types::{BitDef, DecoderSchema, ParameterDef, MAX_FRAME_LENGTH};

use std::path::Path;

/// Compile an ADX file from disk.
///
/// The file is decoded lossily since many ADX files carry a binary header
/// ahead of the markup. The file name is used when the document has no
/// title.
pub fn compile_file<P: AsRef<Path>>(path: P) -> Result<DecoderSchema, CompileError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let content = String::from_utf8_lossy(&bytes);
    let fallback_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    compile(&content, &fallback_name)
}
