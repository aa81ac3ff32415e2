//! # ALDL Core Library
//!
//! Definition compiling and telemetry acquisition for GM ALDL engine
//! control modules.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - ADX definition file compiling into an immutable decoding schema
//! - The ALDL request/response streaming cycle with echo cancellation,
//!   resynchronization and checksum validation
//! - Scaled sensor snapshots
//! - A simulated ECM for demo mode and testing
//!
//! ## Example
//!
//! ```rust,ignore
//! use aldl_core::{definition, protocol::{connect, ConnectionConfig}};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! let schema = Arc::new(definition::compile_file("1227747.adx")?);
//! let engine = connect(&ConnectionConfig::new("/dev/ttyUSB0"), schema)?;
//! let mut latest = engine.subscribe();
//! let cancel = CancellationToken::new();
//! let task = engine.spawn(cancel.clone());
//!
//! latest.changed().await?;
//! if let Some(snapshot) = latest.borrow().as_ref() {
//!     println!("RPM: {:?}", snapshot.get("rpm"));
//! }
//! cancel.cancel();
//! let _port = task.await?;
//! ```

pub mod definition;
pub mod demo;
pub mod protocol;
pub mod realtime;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::definition::{compile, compile_file, CompileError, DecoderSchema};
    pub use crate::demo::SimulatedEcm;
    pub use crate::protocol::{
        AcquisitionEngine, ConnectionConfig, CycleStats, EngineConfig, FrameCounter,
        ProtocolError,
    };
    pub use crate::realtime::Snapshot;
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
