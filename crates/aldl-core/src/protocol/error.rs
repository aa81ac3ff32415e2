//! Protocol errors

use thiserror::Error;

/// Errors raised by the transport or while opening it
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The serial driver rejected an operation
    #[error("Serial port error: {0}")]
    SerialError(String),

    /// The port could not be opened or configured
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// No device exists under the given name
    #[error("Port not found: {0}")]
    PortNotFound(String),

    /// The stream ended before any response byte arrived
    #[error("Transport closed")]
    Disconnected,

    /// Read or write failure on the stream
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Reasons a received buffer does not hold a usable frame
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Header byte {header:#04x} not found in {received} received bytes")]
    /// The header byte never appeared
    NoSync {
        /// Header byte searched for
        header: u8,
        /// Bytes received in the cycle
        received: usize,
    },

    #[error("Short frame: expected {expected} bytes, got {actual}")]
    /// Fewer bytes followed the header than a frame needs
    ShortFrame {
        /// Frame length from the schema
        expected: usize,
        /// Bytes available from the sync point
        actual: usize,
    },

    #[error("Checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    /// The trailing checksum byte is wrong
    ChecksumMismatch {
        /// Checksum computed over the frame body
        expected: u8,
        /// Checksum byte received
        actual: u8,
    },
}

/// Why a single acquisition cycle produced no snapshot.
///
/// The streaming loop absorbs these; they surface only from
/// [`AcquisitionEngine::run_cycle`](super::AcquisitionEngine::run_cycle)
/// and in logs.
#[derive(Error, Debug)]
pub enum CycleFault {
    /// Writing the request or reading the response failed
    #[error(transparent)]
    Transport(#[from] ProtocolError),

    /// The response held no valid frame
    #[error(transparent)]
    Frame(#[from] FrameError),
}
