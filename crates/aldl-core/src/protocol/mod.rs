//! ALDL Serial Protocol
//!
//! Implements the request/response streaming cycle used by GM ALDL ECMs:
//! the host sends a data request, the ECM answers with a fixed-length frame
//! that begins with the header byte and ends in a checksum. Some cables
//! loop the request back onto the receive line, so it may precede the
//! frame.

mod connection;
pub mod cycle;
mod engine;
mod error;
pub mod frame;
pub mod serial;
mod stream;

pub use connection::{connect, ConnectionConfig};
pub use cycle::CycleState;
pub use engine::{AcquisitionEngine, CycleStats, EngineConfig, FrameCounter};
pub use error::{CycleFault, FrameError, ProtocolError};
pub use frame::{compute_checksum, validate_checksum};
pub use serial::{list_ports, open_port, PortInfo};
pub use stream::ByteStream;

/// Default read deadline per cycle in milliseconds.
/// ALDL runs at 8192 baud; a full mode 1 frame arrives well within this.
pub const DEFAULT_READ_DEADLINE_MS: u64 = 400;

/// Default pause between cycles in milliseconds
pub const DEFAULT_CYCLE_PAUSE_MS: u64 = 20;
