//! Connection configuration for aldl-monitor

use aldl_core::protocol::ConnectionConfig;
use anyhow::{Context, Result};
use std::path::Path;

/// Load a JSON connection config, or the defaults when no file is given
pub fn load(path: Option<&Path>) -> Result<ConnectionConfig> {
    let Some(path) = path else {
        return Ok(ConnectionConfig::default());
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Apply command-line overrides on top of a loaded config
pub fn merge_with_args(
    mut config: ConnectionConfig,
    port: Option<&str>,
    baud_rate: Option<u32>,
) -> ConnectionConfig {
    if let Some(port) = port {
        config.port_name = port.to_string();
    }
    if baud_rate.is_some() {
        config.baud_rate = baud_rate;
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use aldl_core::protocol::EngineConfig;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_missing_path_gives_defaults() {
        let config = load(None).unwrap();
        assert_eq!(config, ConnectionConfig::default());
        assert_eq!(config.engine.read_deadline_ms, 400);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"port_name": "/dev/ttyUSB1", "engine": {{"cycle_pause_ms": 50}}}}"#
        )
        .unwrap();

        let config = load(Some(file.path())).unwrap();
        assert_eq!(config.port_name, "/dev/ttyUSB1");
        assert_eq!(config.baud_rate, None);
        assert_eq!(
            config.engine,
            EngineConfig {
                cycle_pause_ms: 50,
                ..EngineConfig::default()
            }
        );
    }

    #[test]
    fn test_bad_file_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = load(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_flags_override_file() {
        let mut config = ConnectionConfig::new("/dev/ttyUSB0");
        config.baud_rate = Some(160);

        let merged = merge_with_args(config.clone(), Some("COM3"), None);
        assert_eq!(merged.port_name, "COM3");
        assert_eq!(merged.baud_rate, Some(160));

        let merged = merge_with_args(config, None, Some(8192));
        assert_eq!(merged.port_name, "/dev/ttyUSB0");
        assert_eq!(merged.baud_rate, Some(8192));
    }
}
