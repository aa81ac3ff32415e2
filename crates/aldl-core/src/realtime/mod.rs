//! Realtime Telemetry
//!
//! Snapshot model and the pure frame decoder used by the acquisition engine.

mod decoder;
mod snapshot;

pub use decoder::decode_frame;
pub use snapshot::Snapshot;
