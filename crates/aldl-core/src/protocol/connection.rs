//! Connection setup
//!
//! Opens the serial transport for a compiled definition and wraps it in an
//! [`AcquisitionEngine`].

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_serial::SerialStream;

use super::{open_port, AcquisitionEngine, EngineConfig, ProtocolError};
use crate::definition::DecoderSchema;

/// Connection configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Serial port name
    pub port_name: String,
    /// Baud rate override; the definition's rate is used when unset
    pub baud_rate: Option<u32>,
    /// Engine timing
    pub engine: EngineConfig,
}

impl ConnectionConfig {
    /// Default timing on `port_name`, baud rate from the definition
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            ..Self::default()
        }
    }

    /// Effective baud rate for `schema`
    pub fn baud_rate_for(&self, schema: &DecoderSchema) -> u32 {
        self.baud_rate.unwrap_or(schema.baud_rate)
    }
}

/// Open the configured port and build an engine for `schema`.
///
/// Failing to open the port is reported here; nothing inside the running
/// loop is.
pub fn connect(
    config: &ConnectionConfig,
    schema: Arc<DecoderSchema>,
) -> Result<AcquisitionEngine<SerialStream>, ProtocolError> {
    if config.port_name.is_empty() {
        return Err(ProtocolError::ConnectionFailed("no port selected".to_string()));
    }

    let baud = config.baud_rate_for(&schema);
    let port = open_port(&config.port_name, baud)?;
    tracing::info!("Opened {} at {} baud", config.port_name, baud);

    Ok(AcquisitionEngine::with_config(port, schema, config.engine.clone()))
}
